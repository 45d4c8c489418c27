// src/resolver/mod.rs

//! Dependency resolution and conflict detection
//!
//! Layers, bottom up:
//! - [`SlotRegistry`]: which package occupies which slot, plus blockers
//! - [`ChoicePoint`]: ordered candidates for one atom and their DNF branches
//! - [`ResolutionEngine`]: caller-driven iterative search with cycle breaking
//!   and unsatisfiability propagation
//! - [`Resolver`]: answers the engine from package sources and builds a
//!   [`ResolutionPlan`] in dependency-first merge order

mod choice_point;
mod conflict;
mod driver;
mod engine;
mod graph;
mod pigeonholes;
mod plan;

pub use choice_point::ChoicePoint;
pub use conflict::{Conflict, CycleBreak};
pub use driver::Resolver;
pub use engine::{AtomStatus, Dependent, FrameId, ResolutionEngine};
pub use graph::{DependencyGraph, MergeOrder};
pub use pigeonholes::{Occupant, SlotRegistry};
pub use plan::ResolutionPlan;

pub use crate::config::{ResolverConfig, ResolverStrategy};
