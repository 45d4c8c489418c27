// src/atom/restriction.rs

//! Decomposed package predicates
//!
//! An [`Atom`](super::Atom) is a conjunction of independent restrictions, one
//! per dimension. Each restriction can be checked against a [`Package`] on
//! its own, which is what makes atom matching a plain `all()`.

use super::UseDep;
use crate::package::Package;
use crate::version::VersionConstraint;
use std::fmt;

/// Anything that can decide whether a package satisfies it
pub trait Matchable {
    /// Check a concrete package
    fn matches(&self, pkg: &Package) -> bool;

    /// The independent predicates this value is made of
    fn restrictions(&self) -> Vec<Restriction>;
}

/// One dimension of an atom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Restriction {
    Category(String),
    Package(String),
    Version(VersionConstraint),
    Slot {
        slot: Option<String>,
        subslot: Option<String>,
    },
    Use(UseDep),
    Repo(String),
}

impl Restriction {
    pub fn matches(&self, pkg: &Package) -> bool {
        match self {
            Self::Category(category) => pkg.cpv.category == *category,
            Self::Package(package) => pkg.cpv.package == *package,
            Self::Version(constraint) => pkg
                .cpv
                .version
                .as_ref()
                .is_some_and(|v| constraint.satisfies(v)),
            Self::Slot { slot, subslot } => {
                slot.as_ref().is_none_or(|s| pkg.slot == *s)
                    && subslot.as_ref().is_none_or(|s| pkg.subslot() == s.as_str())
            }
            Self::Use(dep) => dep.matches(pkg),
            Self::Repo(repo) => pkg.repo == *repo,
        }
    }
}

impl Matchable for Restriction {
    fn matches(&self, pkg: &Package) -> bool {
        Restriction::matches(self, pkg)
    }

    fn restrictions(&self) -> Vec<Restriction> {
        vec![self.clone()]
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(c) => write!(f, "category={}", c),
            Self::Package(p) => write!(f, "package={}", p),
            Self::Version(v) => write!(f, "version{}", v),
            Self::Slot { slot, subslot } => {
                write!(f, "slot={}", slot.as_deref().unwrap_or("*"))?;
                if let Some(sub) = subslot {
                    write!(f, "/{}", sub)?;
                }
                Ok(())
            }
            Self::Use(dep) => write!(f, "use[{}]", dep),
            Self::Repo(r) => write!(f, "repo={}", r),
        }
    }
}
