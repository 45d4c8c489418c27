// src/resolver/choice_point.rs

//! Per-atom candidate iteration state
//!
//! A [`ChoicePoint`] holds the ordered candidates for one atom. For the
//! current candidate it exposes one "branch": a concrete list of atoms
//! drawn from the DNF expansion of the candidate's depends and rdepends.
//! When an atom turns out to be unsatisfiable the choice point drops every
//! branch that needs it and moves to the next branch, then the next
//! candidate.
//!
//! Branches are computed lazily, once per candidate.

use crate::atom::Atom;
use crate::package::Package;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct ChoicePoint {
    atom: Atom,
    candidates: Vec<Arc<Package>>,
    /// Cached branches per candidate, filled on first visit
    solutions: Vec<Option<Vec<Vec<Atom>>>>,
    candidate: usize,
    branch: usize,
    excluded: HashSet<Atom>,
}

impl ChoicePoint {
    pub fn new(atom: Atom, candidates: Vec<Arc<Package>>) -> Self {
        let solutions = vec![None; candidates.len()];
        let mut choice = Self {
            atom,
            candidates,
            solutions,
            candidate: 0,
            branch: 0,
            excluded: HashSet::new(),
        };
        choice.settle();
        choice
    }

    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    pub fn is_exhausted(&self) -> bool {
        self.candidate >= self.candidates.len()
    }

    /// The package currently chosen
    pub fn current_pkg(&self) -> Option<&Arc<Package>> {
        self.candidates.get(self.candidate)
    }

    /// Atoms required by the current branch, blockers included
    pub fn current_atoms(&self) -> &[Atom] {
        self.solutions
            .get(self.candidate)
            .and_then(|s| s.as_ref())
            .and_then(|branches| branches.get(self.branch))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Candidates not yet rejected, current one included
    pub fn remaining(&self) -> usize {
        self.candidates.len().saturating_sub(self.candidate)
    }

    /// Reject the current candidate outright
    pub fn advance_candidate(&mut self) {
        if !self.is_exhausted() {
            self.candidate += 1;
            self.branch = 0;
            self.settle();
        }
    }

    /// Forget every branch that requires `bad`
    ///
    /// Returns true when the current branch changed.
    pub fn reduce_atoms(&mut self, bad: &Atom) -> bool {
        self.excluded.insert(bad.clone());
        if !self.current_atoms().contains(bad) {
            return false;
        }
        self.branch += 1;
        self.settle();
        true
    }

    /// Move forward until the current branch avoids every excluded atom
    fn settle(&mut self) {
        while self.candidate < self.candidates.len() {
            let excluded = &self.excluded;
            let branches = self.solutions[self.candidate].get_or_insert_with(|| {
                compute_branches(&self.candidates[self.candidate])
            });
            while self.branch < branches.len()
                && branches[self.branch].iter().any(|a| excluded.contains(a))
            {
                self.branch += 1;
            }
            if self.branch < branches.len() {
                return;
            }
            self.candidate += 1;
            self.branch = 0;
        }
    }
}

/// DNF branches of depends x rdepends, evaluated against the package's flags
fn compute_branches(pkg: &Package) -> Vec<Vec<Atom>> {
    let flags = pkg.enabled_flags();
    let depends = pkg.depends.evaluate(&flags).dnf_solutions();
    let rdepends = pkg.rdepends.evaluate(&flags).dnf_solutions();

    let mut branches = Vec::with_capacity(depends.len() * rdepends.len());
    for d in &depends {
        for r in &rdepends {
            let mut seen = HashSet::new();
            let branch: Vec<Atom> = d
                .iter()
                .chain(r.iter())
                .map(|atom| atom.evaluate_conditionals(&flags))
                .filter(|atom| seen.insert(atom.clone()))
                .collect();
            branches.push(branch);
        }
    }
    branches
}
