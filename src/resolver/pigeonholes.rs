// src/resolver/pigeonholes.rs

//! Slot occupancy tracking
//!
//! Every package key (`category/package`) owns a list of occupants: chosen
//! packages, each sitting in one slot, and blocker atoms ("limiters") that
//! forbid matching packages from entering at all.

use crate::atom::{Atom, Matchable};
use crate::error::{Error, Result};
use crate::package::Package;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Something sitting in a key's pigeonhole
#[derive(Debug, Clone)]
pub enum Occupant {
    Package(Arc<Package>),
    Limiter(Arc<Atom>),
}

impl Occupant {
    fn key(&self) -> String {
        match self {
            Occupant::Package(pkg) => pkg.key(),
            Occupant::Limiter(atom) => atom.key(),
        }
    }

    /// Identity comparison; two equal-valued atoms are different limiters
    fn same_object(&self, other: &Occupant) -> bool {
        match (self, other) {
            (Occupant::Package(a), Occupant::Package(b)) => Arc::ptr_eq(a, b),
            (Occupant::Limiter(a), Occupant::Limiter(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occupant::Package(pkg) => write!(f, "{}", pkg),
            Occupant::Limiter(atom) => write!(f, "{}", atom),
        }
    }
}

/// Registry of which package occupies which slot
#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: HashMap<String, Vec<Occupant>>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to place `pkg` in its slot
    ///
    /// Returns the first occupant that conflicts (a limiter matching the
    /// package, or a package in the same slot), in which case nothing was
    /// inserted. Returns `None` after inserting the package.
    pub fn fill_slotting(&mut self, pkg: Arc<Package>) -> Option<Occupant> {
        let occupants = self.slots.entry(pkg.key()).or_default();
        let conflict = occupants.iter().find(|occupant| match occupant {
            Occupant::Limiter(atom) => atom.matches(&pkg),
            Occupant::Package(other) => other.slot == pkg.slot,
        });
        if let Some(conflict) = conflict {
            return Some(conflict.clone());
        }
        occupants.push(Occupant::Package(pkg));
        None
    }

    /// Register a blocker atom under its key
    ///
    /// Registering the very same `Arc` twice is an error; an equal atom in
    /// a different allocation is a separate limiter.
    pub fn add_limiter(&mut self, atom: Arc<Atom>) -> Result<()> {
        let candidate = Occupant::Limiter(atom);
        let occupants = self.slots.entry(candidate.key()).or_default();
        if let Some(existing) = occupants.iter().find(|o| o.same_object(&candidate)) {
            return Err(Error::SlotConflict {
                key: candidate.key(),
                occupant: existing.to_string(),
                candidate: candidate.to_string(),
            });
        }
        occupants.push(candidate);
        Ok(())
    }

    /// Remove an occupant by identity
    pub fn remove_slotting(&mut self, obj: &Occupant) -> Result<()> {
        let key = obj.key();
        let occupants = self
            .slots
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("{} is not slotted", obj)))?;
        let idx = occupants
            .iter()
            .position(|o| o.same_object(obj))
            .ok_or_else(|| Error::NotFound(format!("{} is not slotted", obj)))?;
        occupants.remove(idx);
        if occupants.is_empty() {
            self.slots.remove(&key);
        }
        Ok(())
    }

    /// Occupants of a key in insertion order
    pub fn occupants(&self, key: &str) -> &[Occupant] {
        self.slots.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Packages currently placed, across all keys
    pub fn packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.slots.values().flatten().filter_map(|o| match o {
            Occupant::Package(pkg) => Some(pkg),
            Occupant::Limiter(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(cpv: &str, slot: &str) -> Arc<Package> {
        Arc::new(Package::new(cpv).unwrap().with_slot(slot))
    }

    #[test]
    fn test_same_slot_conflicts() {
        let mut registry = SlotRegistry::new();
        let first = pkg("dev-lang/python-3.11.8", "3.11");
        let second = pkg("dev-lang/python-3.11.9", "3.11");
        assert!(registry.fill_slotting(first.clone()).is_none());
        match registry.fill_slotting(second) {
            Some(Occupant::Package(occupant)) => assert!(Arc::ptr_eq(&occupant, &first)),
            other => panic!("expected package conflict, got {:?}", other),
        }
        assert_eq!(registry.occupants("dev-lang/python").len(), 1);
    }

    #[test]
    fn test_different_slots_coexist() {
        let mut registry = SlotRegistry::new();
        assert!(registry.fill_slotting(pkg("dev-lang/python-3.11.8", "3.11")).is_none());
        assert!(registry.fill_slotting(pkg("dev-lang/python-3.12.2", "3.12")).is_none());
        assert_eq!(registry.packages().count(), 2);
    }

    #[test]
    fn test_limiter_blocks_matching_package() {
        let mut registry = SlotRegistry::new();
        registry
            .add_limiter(Arc::new(Atom::parse("!<app-misc/foo-2").unwrap()))
            .unwrap();
        assert!(matches!(
            registry.fill_slotting(pkg("app-misc/foo-1.5", "0")),
            Some(Occupant::Limiter(_))
        ));
        assert!(registry.fill_slotting(pkg("app-misc/foo-2.1", "0")).is_none());
    }

    #[test]
    fn test_add_limiter_identity_guard() {
        let mut registry = SlotRegistry::new();
        let blocker = Arc::new(Atom::parse("!app-misc/foo").unwrap());
        registry.add_limiter(blocker.clone()).unwrap();
        assert!(matches!(
            registry.add_limiter(blocker),
            Err(Error::SlotConflict { .. })
        ));
        // equal value, different object
        registry
            .add_limiter(Arc::new(Atom::parse("!app-misc/foo").unwrap()))
            .unwrap();
        assert_eq!(registry.occupants("app-misc/foo").len(), 2);
    }

    #[test]
    fn test_remove_slotting() {
        let mut registry = SlotRegistry::new();
        let first = pkg("app-misc/foo-1", "0");
        registry.fill_slotting(first.clone());
        registry.remove_slotting(&Occupant::Package(first.clone())).unwrap();
        assert!(registry.occupants("app-misc/foo").is_empty());
        assert!(matches!(
            registry.remove_slotting(&Occupant::Package(first)),
            Err(Error::NotFound(_))
        ));
    }
}
