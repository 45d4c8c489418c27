// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pkgmerge::contents::{ContentSet, DataSource, FsEntry};
use pkgmerge::{Atom, MemoryRepository, Package, ResolutionEngine};
use std::collections::HashMap;
use std::sync::Arc;

pub fn atom(s: &str) -> Atom {
    Atom::parse(s).unwrap()
}

/// Build a repository from `(cpv, rdepends)` pairs.
pub fn repo(name: &str, packages: &[(&str, &str)]) -> Arc<MemoryRepository> {
    let mut repo = MemoryRepository::new(name);
    for (cpv, rdepends) in packages {
        repo.add(
            Package::new(cpv)
                .unwrap()
                .with_repo(name)
                .with_rdepends(rdepends)
                .unwrap(),
        );
    }
    Arc::new(repo)
}

/// Drive an engine to completion by answering every yielded atom from
/// `candidates`, keyed by the atom's text.
///
/// Returns the atoms in the order the engine yielded them.
pub fn drive(
    engine: &mut ResolutionEngine,
    candidates: &HashMap<&str, Vec<Arc<Package>>>,
) -> pkgmerge::Result<Vec<String>> {
    let mut yielded = Vec::new();
    while let Some(atom) = engine.next_unresolved_atom()? {
        let text = atom.to_string();
        let answer = candidates.get(text.as_str()).cloned().unwrap_or_default();
        yielded.push(text);
        engine.satisfy_atom(&atom, answer)?;
    }
    Ok(yielded)
}

/// Content set of regular files whose content is their own path.
pub fn files(paths: &[&str]) -> ContentSet {
    ContentSet::from_entries(
        paths
            .iter()
            .map(|p| FsEntry::file(*p, DataSource::bytes(p.as_bytes().to_vec()))),
    )
    .unwrap()
}

pub fn paths(cset: &ContentSet) -> Vec<String> {
    cset.paths().map(|p| p.display().to_string()).collect()
}
