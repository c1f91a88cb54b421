//! Explicit dependency graph of resource descriptors
//!
//! Nodes keep their declaration order. Materialization order is a
//! topological sort (Kahn) that always picks the earliest-declared ready
//! node, so the same stack yields the same order every time.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Result, StackError};
use crate::lint::Suppression;
use crate::model::{LogicalId, Resource};

/// What happens to a resource when the stack is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: LogicalId,
    pub resource: Resource,
    pub depends_on: Vec<LogicalId>,
    pub deletion_policy: DeletionPolicy,
    pub suppressions: Vec<Suppression>,
}

impl Node {
    /// Add an ordering edge that no property reference implies.
    pub fn depends_on(&mut self, id: &LogicalId) -> &mut Self {
        if !self.depends_on.contains(id) && *id != self.id {
            self.depends_on.push(id.clone());
        }
        self
    }

    pub fn suppress(&mut self, suppression: Suppression) -> &mut Self {
        self.suppressions.push(suppression);
        self
    }

    pub fn deletion_policy(&mut self, policy: DeletionPolicy) -> &mut Self {
        self.deletion_policy = policy;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    index: HashMap<LogicalId, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource. Edges for every property reference are added.
    pub fn add(&mut self, id: impl Into<LogicalId>, resource: Resource) -> Result<&mut Node> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(StackError::duplicate_resource(id.as_str()));
        }

        let depends_on = resource
            .references()
            .into_iter()
            .filter(|dep| *dep != id)
            .collect();

        let position = self.nodes.len();
        self.index.insert(id.clone(), position);
        self.nodes.push(Node {
            id,
            resource,
            depends_on,
            deletion_policy: DeletionPolicy::Delete,
            suppressions: Vec::new(),
        });
        Ok(&mut self.nodes[position])
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, id: &LogicalId) -> Option<&mut Node> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Order in which resources must be created.
    ///
    /// Fails on edges to undeclared resources and on cycles.
    pub fn materialization_order(&self) -> Result<Vec<&Node>> {
        for node in &self.nodes {
            for dep in &node.depends_on {
                if !self.index.contains_key(dep) {
                    return Err(StackError::unknown_dependency(node.id.as_str(), dep.as_str()));
                }
            }
        }

        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for dep in &node.depends_on {
                dependents[self.index[dep]].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = ready.pop_first() {
            order.push(&self.nodes[next]);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck: BTreeSet<usize> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, &d)| d > 0)
                .map(|(i, _)| i)
                .collect();
            return Err(StackError::dependency_cycle(self.find_cycle(&stuck)));
        }

        Ok(order)
    }

    /// Order in which resources are removed on teardown
    pub fn teardown_order(&self) -> Result<Vec<&Node>> {
        let mut order = self.materialization_order()?;
        order.reverse();
        Ok(order)
    }

    /// Position of each resource in the materialization order
    pub fn positions(&self) -> Result<HashMap<LogicalId, usize>> {
        Ok(self
            .materialization_order()?
            .into_iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect())
    }

    /// Walk dependency edges among `stuck` nodes until one repeats.
    fn find_cycle(&self, stuck: &BTreeSet<usize>) -> Vec<String> {
        let Some(&start) = stuck.iter().next() else {
            return Vec::new();
        };

        let mut path: Vec<usize> = vec![start];
        let mut current = start;
        loop {
            let next = self.nodes[current]
                .depends_on
                .iter()
                .map(|dep| self.index[dep])
                .find(|i| stuck.contains(i));
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.nodes[i].id.to_string())
                    .collect();
                cycle.push(self.nodes[next].id.to_string());
                return cycle;
            }
            path.push(next);
            current = next;
        }

        path.iter().map(|&i| self.nodes[i].id.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpApi, InvokePermission, Integration, Route, RouteKey};

    fn api(name: &str) -> Resource {
        Resource::HttpApi(HttpApi {
            name: name.to_string(),
            description: String::new(),
        })
    }

    fn route(api: &str, integration: &str) -> Resource {
        Resource::Route(Route {
            api: LogicalId::new(api),
            key: RouteKey::catch_all(),
            integration: LogicalId::new(integration),
        })
    }

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn test_order_follows_references_then_declaration() {
        let mut graph = ResourceGraph::new();
        graph.add("Route", route("Api", "Integration")).unwrap();
        graph
            .add(
                "Integration",
                Resource::Integration(Integration {
                    api: LogicalId::new("Api"),
                    function: LogicalId::new("Fn"),
                    payload_format_version: "2.0".into(),
                }),
            )
            .unwrap();
        graph.add("Api", api("a")).unwrap();
        graph.add("Fn", api("stand-in")).unwrap();

        let order = graph.materialization_order().unwrap();
        assert_eq!(ids(&order), vec!["Api", "Fn", "Integration", "Route"]);

        let teardown = graph.teardown_order().unwrap();
        assert_eq!(ids(&teardown), vec!["Route", "Integration", "Fn", "Api"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add("Api", api("a")).unwrap();
        let err = graph.add("Api", api("b")).unwrap_err();
        assert_eq!(err.code(), "E106");
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add("Api", api("a")).unwrap();
        graph.add("Route", route("Api", "Missing")).unwrap();
        let err = graph.materialization_order().unwrap_err();
        assert_eq!(
            err,
            StackError::unknown_dependency("Route", "Missing"),
        );
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let mut graph = ResourceGraph::new();
        graph.add("A", api("a")).unwrap().depends_on(&"B".into());
        graph.add("B", api("b")).unwrap().depends_on(&"C".into());
        graph.add("C", api("c")).unwrap().depends_on(&"A".into());
        graph.add("D", api("d")).unwrap();

        match graph.materialization_order().unwrap_err() {
            StackError::DependencyCycle { cycle, .. } => {
                assert_eq!(cycle, vec!["A", "B", "C", "A"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_ignored() {
        let mut graph = ResourceGraph::new();
        graph.add("A", api("a")).unwrap().depends_on(&"A".into());
        assert_eq!(graph.materialization_order().unwrap().len(), 1);
    }

    #[test]
    fn test_permission_depends_on_function_and_api() {
        let mut graph = ResourceGraph::new();
        let node = graph
            .add(
                "Perm",
                Resource::Permission(InvokePermission {
                    function: LogicalId::new("Fn"),
                    api: LogicalId::new("Api"),
                }),
            )
            .unwrap();
        assert_eq!(
            node.depends_on,
            vec![LogicalId::new("Fn"), LogicalId::new("Api")]
        );
    }
}
