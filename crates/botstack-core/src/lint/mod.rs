//! Policy linter
//!
//! Rules inspect the assembled stack and emit findings. A finding is
//! silenced only by a suppression record on the same resource whose rule id
//! and scope match. Silenced findings stay in the report next to their
//! justification.

use tracing::{debug, warn};

use crate::error::{Result, StackError};
use crate::model::LogicalId;
use crate::stack::Stack;

pub mod rules;
mod suppression;

pub use suppression::{ScopeSelector, Suppression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// What part of a resource a finding is about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingScope {
    pub actions: Vec<String>,
    pub resource: Option<String>,
    pub policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub resource: LogicalId,
    pub scope: FindingScope,
    pub message: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.rule_id,
            self.severity.as_str(),
            self.resource,
            self.message
        )
    }
}

/// A single lint check
pub trait Rule {
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn check(&self, stack: &Stack) -> Vec<Finding>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressedFinding {
    pub finding: Finding,
    pub justification: String,
}

#[derive(Debug, Clone, Default)]
pub struct LintReport {
    /// Findings no suppression covers
    pub findings: Vec<Finding>,
    /// Findings covered by a suppression, with its justification
    pub suppressed: Vec<SuppressedFinding>,
    /// Suppressions that matched nothing
    pub unused: Vec<(LogicalId, Suppression)>,
}

impl LintReport {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Fail if any unsuppressed error-level finding remains.
    pub fn ensure_clean(&self) -> Result<()> {
        let errors: Vec<String> = self.errors().map(|f| format!("  • {}", f)).collect();
        if errors.is_empty() {
            return Ok(());
        }
        Err(StackError::lint_violation(errors.len(), errors.join("\n")))
    }
}

pub struct Linter {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Linter {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl Linter {
    /// Linter with no rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        Self {
            rules: rules::default_rules(),
        }
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn lint(&self, stack: &Stack) -> Result<LintReport> {
        self.check_suppressions(stack)?;

        let mut report = LintReport::default();
        let mut used: Vec<(LogicalId, usize)> = Vec::new();

        for rule in &self.rules {
            for finding in rule.check(stack) {
                let matched = stack.graph.get(&finding.resource).and_then(|node| {
                    node.suppressions.iter().enumerate().find(|(_, s)| {
                        s.rule_id == finding.rule_id && s.scope.matches(&finding.scope)
                    })
                });

                match matched {
                    Some((i, suppression)) => {
                        debug!(
                            rule = finding.rule_id,
                            resource = %finding.resource,
                            justification = %suppression.justification,
                            "Finding suppressed"
                        );
                        used.push((finding.resource.clone(), i));
                        report.suppressed.push(SuppressedFinding {
                            justification: suppression.justification.clone(),
                            finding,
                        });
                    }
                    None => {
                        if finding.severity == Severity::Warning {
                            warn!(
                                rule = finding.rule_id,
                                resource = %finding.resource,
                                "{}",
                                finding.message
                            );
                        }
                        report.findings.push(finding);
                    }
                }
            }
        }

        for node in stack.graph.nodes() {
            for (i, suppression) in node.suppressions.iter().enumerate() {
                if !used.iter().any(|(id, j)| *id == node.id && *j == i) {
                    debug!(
                        rule = %suppression.rule_id,
                        resource = %node.id,
                        "Suppression matched no finding"
                    );
                    report.unused.push((node.id.clone(), suppression.clone()));
                }
            }
        }

        Ok(report)
    }

    /// Every suppression must name a known rule and carry a justification.
    fn check_suppressions(&self, stack: &Stack) -> Result<()> {
        for node in stack.graph.nodes() {
            for suppression in &node.suppressions {
                if suppression.justification.trim().is_empty() {
                    return Err(StackError::invalid_suppression(
                        node.id.as_str(),
                        &suppression.rule_id,
                        "justification must not be empty",
                    ));
                }
                if !self.rules.iter().any(|r| r.id() == suppression.rule_id) {
                    return Err(StackError::invalid_suppression(
                        node.id.as_str(),
                        &suppression.rule_id,
                        "no such rule",
                    ));
                }
            }
        }
        Ok(())
    }
}
