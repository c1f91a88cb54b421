//! What happens to each resource when the stack is removed

use std::fmt;

use crate::error::Result;
use crate::graph::DeletionPolicy;
use crate::model::{LogicalId, Resource, ResourceKind};
use crate::stack::Stack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownAction {
    Delete,
    Retain,
    /// Imported; not owned by this stack
    Skip,
}

impl TeardownAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownAction::Delete => "delete",
            TeardownAction::Retain => "retain",
            TeardownAction::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownStep {
    pub id: LogicalId,
    pub kind: ResourceKind,
    pub type_name: &'static str,
    pub action: TeardownAction,
    /// Log retention in force until the group is deleted
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TeardownPlan {
    pub stack_name: String,
    pub steps: Vec<TeardownStep>,
}

impl TeardownPlan {
    /// Reverse materialization order with each resource's fate.
    pub fn for_stack(stack: &Stack) -> Result<Self> {
        let steps = stack
            .graph
            .teardown_order()?
            .into_iter()
            .map(|node| TeardownStep {
                id: node.id.clone(),
                kind: node.resource.kind(),
                type_name: node.resource.type_name(),
                action: if node.resource.is_external() {
                    TeardownAction::Skip
                } else {
                    match node.deletion_policy {
                        DeletionPolicy::Delete => TeardownAction::Delete,
                        DeletionPolicy::Retain => TeardownAction::Retain,
                    }
                },
                retention_days: match &node.resource {
                    Resource::LogGroup(group) => Some(group.retention_days),
                    _ => None,
                },
            })
            .collect();

        Ok(Self {
            stack_name: stack.name.clone(),
            steps,
        })
    }

    pub fn step(&self, id: &str) -> Option<&TeardownStep> {
        self.steps.iter().find(|s| s.id.as_str() == id)
    }

    pub fn deleted(&self) -> impl Iterator<Item = &TeardownStep> {
        self.steps
            .iter()
            .filter(|s| s.action == TeardownAction::Delete)
    }

    pub fn retained(&self) -> impl Iterator<Item = &TeardownStep> {
        self.steps
            .iter()
            .filter(|s| s.action == TeardownAction::Retain)
    }
}

impl fmt::Display for TeardownPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Teardown plan for stack '{}':", self.stack_name)?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(
                f,
                "  {:>2}. {:<7} {} ({})",
                i + 1,
                step.action.as_str(),
                step.id,
                step.type_name
            )?;
            if let Some(days) = step.retention_days {
                write!(f, ", retention {} days until deletion", days)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
