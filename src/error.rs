// src/error.rs

//! Crate-wide error type
//!
//! Every fallible operation in the resolver and the merge engine returns
//! [`Result`]. Variants carry structured data (atom text, path lists, trigger
//! names) so callers can render diagnostics without scraping log output.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by atom parsing, resolution and merging
#[derive(Error, Debug)]
pub enum Error {
    /// Atom text failed to parse or validate
    #[error("malformed atom '{atom}': {reason}")]
    MalformedAtom { atom: String, reason: String },

    /// Version string does not follow the version grammar
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Dependency expression failed to parse
    #[error("failed to parse depset at '{token}': {reason}")]
    DepsetParse { token: String, reason: String },

    /// A root atom exhausted every candidate and branch
    #[error("unsatisfiable atom {atom}: {}", reasons.join("; "))]
    UnsatisfiableAtom { atom: String, reasons: Vec<String> },

    /// Two occupants compete for the same slot, or a blocker matched
    #[error("slot conflict for {key}: {candidate} collides with {occupant}")]
    SlotConflict {
        key: String,
        occupant: String,
        candidate: String,
    },

    /// The merge would modify the live filesystem in a forbidden way
    #[error("blocked modification: {reason}: {}", render_paths(paths))]
    BlockModification { reason: String, paths: Vec<PathBuf> },

    /// A non-suppressible trigger failed
    #[error("trigger {trigger} failed during {hook}: {message}")]
    TriggerFailed {
        trigger: String,
        hook: String,
        message: String,
    },

    /// Operation not valid in the current engine state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Resolver misuse or internal resolution failure
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Mutation attempted on an immutable content set
    #[error("content set is immutable")]
    ImmutableContentSet,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("filesystem walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Blocking errors abort a hook even when the trigger suppresses errors
    pub fn is_blocking(&self) -> bool {
        matches!(self, Error::BlockModification { .. })
    }

    pub(crate) fn malformed_atom(atom: &str, reason: impl Into<String>) -> Self {
        Error::MalformedAtom {
            atom: atom.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn depset(token: &str, reason: impl Into<String>) -> Self {
        Error::DepsetParse {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

fn render_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_modification_lists_paths() {
        let err = Error::BlockModification {
            reason: "file collision".to_string(),
            paths: vec![PathBuf::from("/etc/a"), PathBuf::from("/etc/b")],
        };
        assert!(err.is_blocking());
        assert_eq!(
            err.to_string(),
            "blocked modification: file collision: /etc/a, /etc/b"
        );
    }

    #[test]
    fn test_unsatisfiable_renders_reason_chain() {
        let err = Error::UnsatisfiableAtom {
            atom: "app/foo".to_string(),
            reasons: vec!["no candidates".to_string(), "required by root".to_string()],
        };
        assert!(!err.is_blocking());
        assert!(err.to_string().contains("no candidates; required by root"));
    }
}
