// src/resolver/driver.rs

//! Resolver front-end
//!
//! [`Resolver`] answers the engine's candidate requests from an installed
//! package source plus any number of repositories, in the order chosen by
//! [`ResolverStrategy`], and turns the finished engine into a
//! [`ResolutionPlan`].

use super::engine::ResolutionEngine;
use super::plan::ResolutionPlan;
use crate::atom::Atom;
use crate::config::{ResolverConfig, ResolverStrategy};
use crate::error::{Error, Result};
use crate::observer::{SharedObserver, TracingObserver};
use crate::package::{Package, PackageSource};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Dependency resolver over installed and available packages
pub struct Resolver {
    installed: Arc<dyn PackageSource>,
    repositories: Vec<Arc<dyn PackageSource>>,
    config: ResolverConfig,
    observer: SharedObserver,
}

impl Resolver {
    /// Create a resolver with only the installed source
    pub fn new(installed: Arc<dyn PackageSource>) -> Self {
        Self {
            installed,
            repositories: Vec::new(),
            config: ResolverConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Add a repository; earlier repositories win version ties
    pub fn with_repository(mut self, repository: Arc<dyn PackageSource>) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn strategy(&self) -> ResolverStrategy {
        self.config.strategy
    }

    /// Ordered candidates for an atom
    ///
    /// Duplicate (cpv, slot) pairs keep their first occurrence, so an
    /// installed copy shadows the identical repository copy.
    pub fn candidates(&self, atom: &Atom) -> Vec<Arc<Package>> {
        let installed = self.installed.match_atom(atom);
        let mut available: Vec<Arc<Package>> = self
            .repositories
            .iter()
            .flat_map(|repo| repo.match_atom(atom))
            .collect();
        available.sort_by(|a, b| b.cpv.version.cmp(&a.cpv.version));

        let mut ordered = installed;
        ordered.extend(available);
        if self.config.strategy == ResolverStrategy::PreferHighest {
            ordered.sort_by(|a, b| b.cpv.version.cmp(&a.cpv.version));
        }

        let mut seen = HashSet::new();
        ordered.retain(|pkg| seen.insert((pkg.cpv.clone(), pkg.slot.clone())));
        ordered
    }

    /// Resolve the requested atoms into a merge plan
    pub fn resolve(&self, atoms: &[Atom]) -> Result<ResolutionPlan> {
        let mut engine = ResolutionEngine::new(Arc::clone(&self.observer));
        for atom in atoms {
            engine.add_root_atom(atom.clone())?;
        }

        while let Some(atom) = engine.next_unresolved_atom()? {
            if self.config.max_steps > 0 && engine.steps() > self.config.max_steps {
                return Err(Error::Resolution(format!(
                    "gave up after {} steps",
                    self.config.max_steps
                )));
            }
            let candidates = self.candidates(&atom);
            debug!("{}: {} candidate(s)", atom, candidates.len());
            engine.satisfy_atom(&atom, candidates)?;
        }

        let plan = ResolutionPlan::from_engine(&engine);
        info!(
            "Resolved {} root atom(s) to {} package(s) in {} steps",
            atoms.len(),
            plan.merge_order.len(),
            plan.steps
        );
        for cycle in &plan.cycles {
            self.observer.warn(&format!("dependency cycle: {}", cycle));
        }
        Ok(plan)
    }
}
