//! Built-in lint rules

use super::{Finding, FindingScope, Rule, Severity};
use crate::leak::contains_credential;
use crate::model::{EnvValue, SecretOrigin};
use crate::stack::Stack;

/// Rules every linted stack is checked against
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ManagedPolicyRule),
        Box::new(WildcardResourceRule),
        Box::new(SecretRotationRule),
        Box::new(StageAccessLogRule),
        Box::new(EnvironmentCredentialRule),
        Box::new(PendingRotationRule),
    ]
}

/// IAM4: identity uses a provider-managed policy
pub struct ManagedPolicyRule;

impl Rule for ManagedPolicyRule {
    fn id(&self) -> &'static str {
        "IAM4"
    }

    fn description(&self) -> &'static str {
        "Identity attaches a managed policy instead of scoped inline statements"
    }

    fn check(&self, stack: &Stack) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (id, role) in stack.roles() {
            for policy in role.managed_policies() {
                findings.push(Finding {
                    rule_id: self.id(),
                    severity: Severity::Error,
                    resource: id.clone(),
                    scope: FindingScope {
                        policy: Some(policy.text().to_string()),
                        ..FindingScope::default()
                    },
                    message: format!("managed policy attached: {}", policy.text()),
                });
            }
        }
        findings
    }
}

/// IAM5: a statement grants actions on a wildcard resource
pub struct WildcardResourceRule;

impl Rule for WildcardResourceRule {
    fn id(&self) -> &'static str {
        "IAM5"
    }

    fn description(&self) -> &'static str {
        "Policy statement grants access to a wildcard resource"
    }

    fn check(&self, stack: &Stack) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (id, role) in stack.roles() {
            for statement in role.statements().filter(|s| s.has_wildcard_resource()) {
                let resource = statement
                    .resources
                    .iter()
                    .filter_map(|r| r.as_literal())
                    .find(|r| r.contains('*'))
                    .map(str::to_string);
                // one finding per action so each exception names what it allows
                for action in &statement.actions {
                    findings.push(Finding {
                        rule_id: self.id(),
                        severity: Severity::Error,
                        resource: id.clone(),
                        scope: FindingScope {
                            actions: vec![action.clone()],
                            resource: resource.clone(),
                            policy: None,
                        },
                        message: format!(
                            "statement '{}' allows {} on wildcard resource",
                            statement.sid, action
                        ),
                    });
                }
            }
        }
        findings
    }
}

/// SMG4: secret created without automatic rotation
pub struct SecretRotationRule;

impl Rule for SecretRotationRule {
    fn id(&self) -> &'static str {
        "SMG4"
    }

    fn description(&self) -> &'static str {
        "Secret has no automatic rotation configured"
    }

    fn check(&self, stack: &Stack) -> Vec<Finding> {
        stack
            .secrets()
            .filter(|(_, secret)| !secret.is_imported())
            .map(|(id, secret)| Finding {
                rule_id: self.id(),
                severity: Severity::Error,
                resource: id.clone(),
                scope: FindingScope::default(),
                message: format!("secret '{}' is not rotated automatically", secret.name),
            })
            .collect()
    }
}

/// APIG1: gateway stage without access logging
pub struct StageAccessLogRule;

impl Rule for StageAccessLogRule {
    fn id(&self) -> &'static str {
        "APIG1"
    }

    fn description(&self) -> &'static str {
        "Gateway stage does not write access logs"
    }

    fn check(&self, stack: &Stack) -> Vec<Finding> {
        stack
            .stages()
            .filter(|(_, stage)| stage.access_log.is_none())
            .map(|(id, stage)| Finding {
                rule_id: self.id(),
                severity: Severity::Error,
                resource: id.clone(),
                scope: FindingScope::default(),
                message: format!("stage '{}' has no access log destination", stage.name),
            })
            .collect()
    }
}

/// SEC1: function environment carries what looks like a credential
pub struct EnvironmentCredentialRule;

const SENSITIVE_KEY_PARTS: [&str; 5] = ["token", "secret", "password", "api_key", "apikey"];

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

impl Rule for EnvironmentCredentialRule {
    fn id(&self) -> &'static str {
        "SEC1"
    }

    fn description(&self) -> &'static str {
        "Function environment holds a literal credential instead of a secret address"
    }

    fn check(&self, stack: &Stack) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (id, function) in stack.functions() {
            for (key, value) in &function.environment {
                let EnvValue::Literal(literal) = value else {
                    continue;
                };
                let suspicious = contains_credential(literal)
                    || (is_sensitive_key(key) && !literal.starts_with("arn:"));
                if suspicious {
                    // never echo the value itself
                    findings.push(Finding {
                        rule_id: self.id(),
                        severity: Severity::Error,
                        resource: id.clone(),
                        scope: FindingScope::default(),
                        message: format!(
                            "environment key '{}' holds a literal value ({} chars); pass a secret address",
                            key,
                            literal.len()
                        ),
                    });
                }
            }
        }
        findings
    }
}

/// SEC2: secret still holds the generated placeholder
pub struct PendingRotationRule;

impl Rule for PendingRotationRule {
    fn id(&self) -> &'static str {
        "SEC2"
    }

    fn description(&self) -> &'static str {
        "Secret holds a generated placeholder and must be rotated before use"
    }

    fn check(&self, stack: &Stack) -> Vec<Finding> {
        stack
            .secrets()
            .filter(|(_, secret)| matches!(secret.origin, SecretOrigin::PendingRotation { .. }))
            .map(|(id, secret)| Finding {
                rule_id: self.id(),
                severity: Severity::Warning,
                resource: id.clone(),
                scope: FindingScope::default(),
                message: format!(
                    "secret '{}' holds a generated placeholder; store the real token before the bot goes live",
                    secret.name
                ),
            })
            .collect()
    }
}
