// src/lib.rs

//! pkgmerge: dependency resolution and transactional merging for
//! source-based package trees
//!
//! # Architecture
//!
//! - Versions and atoms: Gentoo-style version ordering, package atoms with
//!   slot, repository and use-flag restrictions
//! - DepSets: conditional any-of/all-of dependency trees, evaluated against
//!   a flag set and expanded into concrete alternatives
//! - Resolution: a caller-driven search that yields one unresolved atom at a
//!   time, tracks slot occupancy and blockers, breaks cycles and backtracks
//!   through alternatives
//! - Merging: content sets combined with set algebra and a trigger pipeline
//!   run at fixed hook points of an install, uninstall or replace
//!
//! # Example
//!
//! ```
//! use pkgmerge::{Atom, MemoryRepository, Package, Resolver};
//! use std::sync::Arc;
//!
//! let mut repo = MemoryRepository::new("gentoo");
//! repo.add(Package::new("app-misc/foo-1.0").unwrap().with_rdepends("dev-libs/bar").unwrap());
//! repo.add(Package::new("dev-libs/bar-2.1").unwrap());
//!
//! let resolver = Resolver::new(Arc::new(MemoryRepository::new("installed")))
//!     .with_repository(Arc::new(repo));
//! let plan = resolver.resolve(&[Atom::parse("app-misc/foo").unwrap()]).unwrap();
//! assert_eq!(plan.cpvs(), vec!["dev-libs/bar-2.1", "app-misc/foo-1.0"]);
//! ```

pub mod atom;
pub mod config;
pub mod contents;
pub mod depset;
mod error;
pub mod logging;
pub mod merge;
pub mod observer;
pub mod package;
pub mod resolver;
pub mod version;

pub use atom::{Atom, AtomCache, AtomOptions, Cpv, Matchable, Restriction};
pub use config::{Config, MergeConfig, ResolverConfig, ResolverStrategy};
pub use contents::{ContentSet, DataSource, DiskLiveFs, EntryKind, FsEntry, LiveFs};
pub use depset::{DepNode, DepSet, ParseOptions};
pub use error::{Error, Result};
pub use merge::{
    CsetName, Hook, MergeEngine, MergeMode, MergeOptions, MergeReport, Trigger, TriggerContext,
};
pub use observer::{Observer, SharedObserver, TracingObserver};
pub use package::{MemoryRepository, Package, PackageSource};
pub use resolver::{ResolutionEngine, ResolutionPlan, Resolver};
pub use version::{ver_cmp, Version, VersionConstraint, VersionOp};
