//! An assembled stack: resource graph plus outputs

use crate::graph::{Node, ResourceGraph};
use crate::model::{
    Function, HttpApi, Integration, LayerVersion, LogGroup, LogicalId, Resource, Role, Route,
    Secret, Stage, Value,
};

/// Value published after materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub key: String,
    pub description: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Stack {
    pub name: String,
    pub description: String,
    pub graph: ResourceGraph,
    pub outputs: Vec<Output>,
}

macro_rules! nodes_of {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> impl Iterator<Item = (&LogicalId, &$ty)> {
            self.graph.nodes().filter_map(|node| match &node.resource {
                Resource::$variant(inner) => Some((&node.id, inner)),
                _ => None,
            })
        }
    };
}

impl Stack {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            graph: ResourceGraph::new(),
            outputs: Vec::new(),
        }
    }

    pub fn add_output(
        &mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        value: Value,
    ) -> &mut Self {
        self.outputs.push(Output {
            key: key.into(),
            description: description.into(),
            value,
        });
        self
    }

    pub fn node(&self, id: &LogicalId) -> Option<&Node> {
        self.graph.get(id)
    }

    nodes_of!(secrets, Secret, Secret);
    nodes_of!(roles, Role, Role);
    nodes_of!(layers, Layer, LayerVersion);
    nodes_of!(functions, Function, Function);
    nodes_of!(log_groups, LogGroup, LogGroup);
    nodes_of!(apis, HttpApi, HttpApi);
    nodes_of!(integrations, Integration, Integration);
    nodes_of!(routes, Route, Route);
    nodes_of!(stages, Stage, Stage);
}
