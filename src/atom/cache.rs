// src/atom/cache.rs

//! Interning cache for parsed atoms
//!
//! Dependency strings repeat the same atoms across thousands of packages.
//! The cache parses each distinct text once and hands out shared `Arc<Atom>`
//! values afterwards.

use super::{Atom, AtomOptions};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe atom cache keyed by source text
#[derive(Clone)]
pub struct AtomCache {
    entries: Arc<RwLock<HashMap<String, Arc<Atom>>>>,
    options: AtomOptions,
}

impl Default for AtomCache {
    fn default() -> Self {
        Self::new(AtomOptions::default())
    }
}

impl AtomCache {
    pub fn new(options: AtomOptions) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            options,
        }
    }

    /// Return the cached atom for `text`, parsing it on first use
    ///
    /// Parse failures are not cached.
    pub fn get_or_parse(&self, text: &str) -> Result<Arc<Atom>> {
        if let Ok(entries) = self.entries.read()
            && let Some(atom) = entries.get(text)
        {
            return Ok(Arc::clone(atom));
        }

        let atom = Arc::new(Atom::parse_with(text, self.options)?);
        if let Ok(mut entries) = self.entries.write() {
            // another thread may have won the race; keep the first value
            let entry = entries
                .entry(text.to_string())
                .or_insert_with(|| Arc::clone(&atom));
            return Ok(Arc::clone(entry));
        }
        Ok(atom)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
