// src/package.rs

//! Package metadata consumed by the resolver
//!
//! A [`Package`] is one concrete build: its CPV, slot, repository, use
//! configuration and dependency expressions. Candidate lists are handed out
//! as `Arc<Package>` so the resolver, the slot registry and the final plan
//! can share them without copying.

use crate::atom::{Atom, Cpv, Matchable};
use crate::depset::DepSet;
use crate::error::{Error, Result};
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// A concrete, versioned package
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub cpv: Cpv,
    pub slot: String,
    subslot: Option<String>,
    pub repo: String,
    /// Enabled use flags
    pub use_flags: BTreeSet<String>,
    /// Flags the package understands
    pub iuse: BTreeSet<String>,
    /// Build-time dependencies
    pub depends: DepSet<Atom>,
    /// Runtime dependencies
    pub rdepends: DepSet<Atom>,
    /// Virtual names this package provides
    pub provides: DepSet<Atom>,
}

impl Package {
    /// Create a package in slot `0` of the `local` repository
    pub fn new(cpv: &str) -> Result<Self> {
        let cpv = Cpv::parse_versioned(cpv)?;
        Ok(Self {
            cpv,
            slot: "0".to_string(),
            subslot: None,
            repo: "local".to_string(),
            use_flags: BTreeSet::new(),
            iuse: BTreeSet::new(),
            depends: DepSet::default(),
            rdepends: DepSet::default(),
            provides: DepSet::default(),
        })
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    pub fn with_subslot(mut self, subslot: impl Into<String>) -> Self {
        self.subslot = Some(subslot.into());
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    /// Declare flags in IUSE without enabling them
    pub fn with_iuse<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.iuse.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Enable flags (they are added to IUSE as well)
    pub fn with_use<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for flag in flags {
            let flag = flag.into();
            self.iuse.insert(flag.clone());
            self.use_flags.insert(flag);
        }
        self
    }

    /// Parse and set build-time dependencies
    pub fn with_depends(mut self, text: &str) -> Result<Self> {
        self.depends = DepSet::parse_atoms(text)?;
        Ok(self)
    }

    /// Parse and set runtime dependencies
    pub fn with_rdepends(mut self, text: &str) -> Result<Self> {
        self.rdepends = DepSet::parse_atoms(text)?;
        Ok(self)
    }

    pub fn with_provides(mut self, text: &str) -> Result<Self> {
        self.provides = DepSet::parse_atoms(text)?;
        Ok(self)
    }

    /// `category/package`
    pub fn key(&self) -> String {
        self.cpv.key()
    }

    pub fn version(&self) -> Result<&Version> {
        self.cpv
            .version
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("package {} has no version", self.cpv)))
    }

    /// Subslot, defaulting to the slot
    pub fn subslot(&self) -> &str {
        self.subslot.as_deref().unwrap_or(&self.slot)
    }

    /// Enabled flags as a lookup set for depset evaluation
    pub fn enabled_flags(&self) -> HashSet<String> {
        self.use_flags.iter().cloned().collect()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cpv, self.slot)?;
        if let Some(subslot) = &self.subslot {
            write!(f, "/{}", subslot)?;
        }
        write!(f, "::{}", self.repo)
    }
}

/// Anything that can answer "which packages match this atom"
///
/// Implemented by installed databases and repositories alike. Blocker
/// prefixes are ignored when matching.
pub trait PackageSource: Send + Sync {
    /// Human-readable source name for logs
    fn name(&self) -> &str;

    /// Lazily iterate matching packages in source order
    fn itermatch<'a>(&'a self, atom: &'a Atom) -> Box<dyn Iterator<Item = Arc<Package>> + 'a>;

    /// All matches, highest version first
    fn match_atom(&self, atom: &Atom) -> Vec<Arc<Package>> {
        let mut matches: Vec<_> = self.itermatch(atom).collect();
        matches.sort_by(|a, b| b.cpv.version.cmp(&a.cpv.version));
        matches
    }
}

/// In-memory package source keyed by `category/package`
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    name: String,
    packages: BTreeMap<String, Vec<Arc<Package>>>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Add a package; a package with the same CPV and slot is replaced
    pub fn add(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);
        let entries = self.packages.entry(package.key()).or_default();
        entries.retain(|p| !(p.cpv == package.cpv && p.slot == package.slot));
        entries.push(Arc::clone(&package));
        package
    }

    /// Remove a package by CPV, returning it
    pub fn remove(&mut self, cpv: &Cpv) -> Result<Arc<Package>> {
        let key = cpv.key();
        let entries = self
            .packages
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(cpv.to_string()))?;
        let idx = entries
            .iter()
            .position(|p| p.cpv == *cpv)
            .ok_or_else(|| Error::NotFound(cpv.to_string()))?;
        let removed = entries.remove(idx);
        if entries.is_empty() {
            self.packages.remove(&key);
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values().flatten()
    }
}

impl PackageSource for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn itermatch<'a>(&'a self, atom: &'a Atom) -> Box<dyn Iterator<Item = Arc<Package>> + 'a> {
        match self.packages.get(&atom.key()) {
            Some(entries) => Box::new(
                entries
                    .iter()
                    .filter(move |p| atom.matches(p))
                    .map(Arc::clone),
            ),
            None => Box::new(std::iter::empty()),
        }
    }
}
