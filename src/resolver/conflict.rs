// src/resolver/conflict.rs

//! Conflict types for dependency resolution
//!
//! Conflicts are what the engine ran into while choosing candidates. Most
//! are recoverable (another candidate was tried); they are kept so a caller
//! can explain why the final plan looks the way it does.

use crate::atom::Atom;
use std::fmt;

/// A dependency that points back at an atom already being resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleBreak {
    /// The atom the back-edge targets
    pub atom: Atom,
    /// Search path from the root to the atom that closed the cycle
    pub path: Vec<Atom>,
}

impl fmt::Display for CycleBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.path.iter().map(ToString::to_string).collect();
        write!(f, "{} -> {}", rendered.join(" -> "), self.atom)
    }
}

/// A conflict between package requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Candidate wanted a slot that is already taken
    SlotCollision {
        atom: String,
        candidate: String,
        occupant: String,
    },
    /// Candidate is forbidden by a registered blocker
    Blocked {
        atom: String,
        candidate: String,
        blocker: String,
    },
    /// Candidate's dependencies include a blocker matching a chosen package
    BlocksChosen {
        atom: String,
        blocker: String,
        chosen: String,
    },
    /// Atom ran out of candidates
    Unsatisfiable { atom: String, reasons: Vec<String> },
    /// Dependency cycle, broken at the back-edge
    CircularDependency { cycle: CycleBreak },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::SlotCollision {
                atom,
                candidate,
                occupant,
            } => write!(
                f,
                "{} for {} collides with {} in the same slot",
                candidate, atom, occupant
            ),
            Conflict::Blocked {
                atom,
                candidate,
                blocker,
            } => write!(f, "{} for {} is blocked by {}", candidate, atom, blocker),
            Conflict::BlocksChosen {
                atom,
                blocker,
                chosen,
            } => write!(
                f,
                "candidate for {} carries blocker {} against chosen {}",
                atom, blocker, chosen
            ),
            Conflict::Unsatisfiable { atom, reasons } => {
                write!(f, "{} is unsatisfiable: {}", atom, reasons.join("; "))
            }
            Conflict::CircularDependency { cycle } => {
                write!(f, "Circular dependency: {}", cycle)
            }
        }
    }
}
