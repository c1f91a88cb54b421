//! Auditable exception records attached to resources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::FindingScope;

/// Which findings of a rule a suppression covers.
///
/// String form follows the `appliesTo` convention:
/// `*`, `Action::<action>`, `Resource::<arn>`, `Policy::<name or arn>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScopeSelector {
    All,
    Action(String),
    Resource(String),
    Policy(String),
}

impl ScopeSelector {
    pub fn matches(&self, scope: &FindingScope) -> bool {
        match self {
            ScopeSelector::All => true,
            ScopeSelector::Action(pattern) => scope
                .actions
                .iter()
                .any(|action| action_matches(pattern, action)),
            ScopeSelector::Resource(resource) => scope.resource.as_deref() == Some(resource),
            ScopeSelector::Policy(policy) => scope.policy.as_deref().is_some_and(|p| {
                p == policy || p.ends_with(&format!("/{}", policy))
            }),
        }
    }
}

fn action_matches(pattern: &str, action: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => action.starts_with(prefix),
        None => pattern == action,
    }
}

impl fmt::Display for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSelector::All => f.write_str("*"),
            ScopeSelector::Action(a) => write!(f, "Action::{}", a),
            ScopeSelector::Resource(r) => write!(f, "Resource::{}", r),
            ScopeSelector::Policy(p) => write!(f, "Policy::{}", p),
        }
    }
}

impl FromStr for ScopeSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(ScopeSelector::All);
        }
        let (kind, value) = s
            .split_once("::")
            .ok_or_else(|| format!("Invalid scope selector '{}'", s))?;
        if value.is_empty() {
            return Err(format!("Scope selector '{}' has no value", s));
        }
        match kind {
            "Action" => Ok(ScopeSelector::Action(value.to_string())),
            "Resource" => Ok(ScopeSelector::Resource(value.to_string())),
            "Policy" => Ok(ScopeSelector::Policy(value.to_string())),
            _ => Err(format!(
                "Unknown scope selector kind '{}'. Supported: *, Action::, Resource::, Policy::",
                kind
            )),
        }
    }
}

impl TryFrom<String> for ScopeSelector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScopeSelector> for String {
    fn from(selector: ScopeSelector) -> Self {
        selector.to_string()
    }
}

/// Exception record `{ruleId, justification, scope}` on a specific resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suppression {
    pub rule_id: String,
    pub justification: String,
    pub scope: ScopeSelector,
}

impl Suppression {
    pub fn new(
        rule_id: impl Into<String>,
        scope: ScopeSelector,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            justification: justification.into(),
            scope,
        }
    }
}
