//! botstack command-line tooling
//!
//! Loads the stack config, assembles the bot stack and drives the
//! planner: plan, lint, synth, teardown and (with `aws-deploy`) deploy.

use anyhow::{Context, Result};
use botstack_config::StackConfig;
use botstack_core::{Stack, StackBuilder};
use std::path::Path;
use tracing::debug;

pub mod create;
#[cfg(feature = "aws-deploy")]
pub mod deploy;
mod init;
pub mod names;
pub mod report;

pub use init::init_tracing;

/// Env var checked by default for a real token that must not leak
pub const DEFAULT_SENSITIVE_ENV: &str = "SLACK_BOT_TOKEN";

/// Load the stack config from an explicit file or the default sources.
pub fn load_config(path: Option<&Path>, log_level: Option<&str>) -> Result<StackConfig> {
    let mut config = match path {
        Some(path) => StackConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StackConfig::load().context("Failed to load configuration")?,
    };

    if let Some(level) = log_level {
        config.cli.log_level = level.to_string();
    }
    Ok(config)
}

pub fn build_stack(config: &StackConfig) -> Result<Stack> {
    let stack = StackBuilder::from_config(config)
        .build()
        .context("Failed to assemble stack")?;
    debug!(resources = stack.graph.len(), "Stack assembled");
    Ok(stack)
}

/// Values of the named env vars, for the template leak scan.
pub fn sensitive_values<S: AsRef<str>>(env_names: &[S]) -> Vec<String> {
    env_names
        .iter()
        .filter_map(|name| std::env::var(name.as_ref()).ok())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_path_with_log_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[stack]
name = "support-bot"

[function]
code = "s3://artifacts/handler.zip"

[layer]
code = "s3://artifacts/layer.zip"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path()), Some("debug")).unwrap();
        assert_eq!(config.stack.name, "support-bot");
        assert_eq!(config.cli.log_level, "debug");

        let stack = build_stack(&config).unwrap();
        assert_eq!(stack.name, "support-bot");
    }

    #[test]
    fn test_missing_config_file_reports_path() {
        let err = load_config(Some(Path::new("/nonexistent/botstack.toml")), None).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/botstack.toml"));
    }

    #[test]
    fn test_sensitive_values_skips_unset() {
        assert!(sensitive_values(&["BOTSTACK_TEST_SURELY_UNSET_VAR"]).is_empty());
    }
}
