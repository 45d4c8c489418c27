// src/resolver/graph.rs

//! Dependency graph over chosen packages
//!
//! Nodes are keyed by the package identity string (`cat/pkg-ver:slot::repo`)
//! so two atoms that resolved to the same package share one node. Ordering
//! and cycle detection are deterministic: ties are broken by identity.

use crate::package::Package;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Result of ordering the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOrder {
    /// Package identities, dependencies before dependents
    pub order: Vec<String>,
    /// Nodes emitted early to break a cycle
    pub broken: Vec<String>,
}

/// Dependency graph for merge ordering
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Arc<Package>>,
    /// Package -> packages it depends on
    edges: BTreeMap<String, BTreeSet<String>>,
    /// Package -> packages that depend on it
    reverse_edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package node; returns its identity
    pub fn add_node(&mut self, pkg: Arc<Package>) -> String {
        let id = pkg.to_string();
        self.nodes.entry(id.clone()).or_insert(pkg);
        id
    }

    /// Record that `from` depends on `to`
    ///
    /// Self edges are ignored; a package never has to wait for itself.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse_edges
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    pub fn get_node(&self, id: &str) -> Option<&Arc<Package>> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a package
    pub fn get_dependencies(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Packages that directly depend on this package
    pub fn get_dependents(&self, id: &str) -> Vec<&str> {
        self.reverse_edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Kahn's algorithm, dependencies first
    ///
    /// Unlike a strict topological sort this never fails: when every
    /// remaining node still waits on something, the smallest remaining
    /// identity is emitted and recorded in `broken`.
    pub fn merge_order(&self) -> MergeOrder {
        let mut waiting: BTreeMap<&str, usize> = self
            .nodes
            .keys()
            .map(|id| {
                let pending = self
                    .edges
                    .get(id)
                    .map(|deps| deps.iter().filter(|d| self.nodes.contains_key(*d)).count())
                    .unwrap_or(0);
                (id.as_str(), pending)
            })
            .collect();

        let mut result = MergeOrder::default();
        let mut ready: BTreeSet<&str> = waiting
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        while !waiting.is_empty() {
            let next = match ready.pop_first() {
                Some(id) => id,
                None => {
                    // Everything left sits on a cycle
                    let Some((&id, _)) = waiting.iter().next() else {
                        break;
                    };
                    result.broken.push(id.to_string());
                    id
                }
            };
            if waiting.remove(next).is_none() {
                continue;
            }
            result.order.push(next.to_string());

            for dependent in self.get_dependents(next) {
                if let Some(count) = waiting.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        result
    }

    /// Detect circular dependencies in the graph
    ///
    /// Returns the identities on one cycle, starting and ending with the
    /// same node, or None if the graph is acyclic.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for id in self.nodes.keys() {
            if !visited.contains(id.as_str())
                && let Some(cycle) = self.dfs_cycle_detect(id, &mut visited, &mut stack)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle_detect<'a>(
        &'a self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(id);
        stack.push(id);

        if let Some(deps) = self.edges.get(id) {
            for dep in deps {
                if let Some(pos) = stack.iter().position(|s| *s == dep.as_str()) {
                    let mut cycle: Vec<String> =
                        stack[pos..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep.as_str())
                    && let Some(cycle) = self.dfs_cycle_detect(dep, visited, stack)
                {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        None
    }
}
