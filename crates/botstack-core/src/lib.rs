//! Resource graph, validation and policy linting for the bot backend stack
//!
//! The stack is described as typed resources in an explicit dependency
//! graph. Before anything is handed to the provider it is validated, linted
//! against the permission rules, and rendered as a CloudFormation template.
//!
//! ```no_run
//! use botstack_config::StackConfig;
//! use botstack_core::{synthesize, StackBuilder, SynthOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StackConfig::load()?;
//! let stack = StackBuilder::from_config(&config).build()?;
//! let out = synthesize(&stack, &SynthOptions::default())?;
//! println!("{}", out.to_pretty_json());
//! # Ok(())
//! # }
//! ```

pub mod access_log;
pub mod builder;
pub mod error;
pub mod graph;
pub mod leak;
pub mod lint;
pub mod model;
pub mod stack;
pub mod synth;
pub mod teardown;
pub mod validate;

pub use access_log::{access_log_format, AccessLogField, AccessLogRecord};
pub use builder::{ids, StackBuilder};
pub use error::{ErrorCode, Result, StackError};
pub use graph::{DeletionPolicy, Node, ResourceGraph};
pub use leak::LeakScanner;
pub use lint::{Finding, LintReport, Linter, Rule, ScopeSelector, Severity, Suppression};
pub use model::{LogicalId, Resource, ResourceKind, SecretAddress, Value};
pub use stack::{Output, Stack};
pub use synth::{synthesize, synthesize_with, SynthOptions, Synthesized};
pub use teardown::{TeardownAction, TeardownPlan, TeardownStep};
pub use validate::validate;
