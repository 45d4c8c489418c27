// src/resolver/plan.rs

//! Resolution plan data structures
//!
//! Contains the result types for dependency resolution.

use super::conflict::{Conflict, CycleBreak};
use super::engine::ResolutionEngine;
use super::graph::DependencyGraph;
use crate::atom::Atom;
use crate::package::Package;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of dependency resolution
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    /// Chosen packages in merge order (dependencies first)
    pub merge_order: Vec<Arc<Package>>,
    /// Every resolved atom with the package chosen for it, sorted by atom
    pub choices: Vec<(Atom, Arc<Package>)>,
    /// Dependency cycles broken during the search
    pub cycles: Vec<CycleBreak>,
    /// Recoverable conflicts met along the way
    pub conflicts: Vec<Conflict>,
    /// Atoms handed out for candidate lookup
    pub steps: usize,
}

impl ResolutionPlan {
    /// Snapshot a finished engine
    pub fn from_engine(engine: &ResolutionEngine) -> Self {
        let mut graph = DependencyGraph::new();
        let mut ids: HashMap<&Atom, String> = HashMap::new();
        for (atom, pkg) in engine.resolved() {
            ids.insert(atom, graph.add_node(Arc::clone(pkg)));
        }
        for (atom, from) in &ids {
            for dep in engine.dependencies_of(atom) {
                if let Some(to) = ids.get(dep) {
                    graph.add_edge(from, to);
                }
            }
        }

        let merge_order = graph
            .merge_order()
            .order
            .iter()
            .filter_map(|id| graph.get_node(id).cloned())
            .collect();

        let mut choices: Vec<(Atom, Arc<Package>)> = engine
            .resolved()
            .map(|(atom, pkg)| (atom.clone(), Arc::clone(pkg)))
            .collect();
        choices.sort_by_key(|(atom, _)| atom.to_string());

        Self {
            merge_order,
            choices,
            cycles: engine.cycles().to_vec(),
            conflicts: engine.conflicts().to_vec(),
            steps: engine.steps(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.merge_order.is_empty()
    }

    /// Package chosen for an atom, if it was resolved
    pub fn package_for(&self, atom: &Atom) -> Option<&Arc<Package>> {
        self.choices
            .iter()
            .find(|(a, _)| a == atom)
            .map(|(_, pkg)| pkg)
    }

    /// Whether a package with this `cat/pkg-ver` string is in the plan
    pub fn contains(&self, cpv: &str) -> bool {
        self.merge_order.iter().any(|pkg| pkg.cpv.to_string() == cpv)
    }

    /// `cat/pkg-ver` strings in merge order
    pub fn cpvs(&self) -> Vec<String> {
        self.merge_order.iter().map(|pkg| pkg.cpv.to_string()).collect()
    }
}
