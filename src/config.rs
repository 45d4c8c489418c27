// src/config.rs
//! Configuration file parsing
//!
//! Supports TOML configuration files with the following sections:
//! - [resolver] - Candidate ordering strategy, step limit
//! - [merge] - Collision protection, masks, permission fixups, locking
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::error::{Error, Result};
use glob::Pattern;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Merge settings
    #[serde(default)]
    pub merge: MergeConfig,
}

/// How candidates for an atom are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverStrategy {
    /// Installed matches first, then repository matches highest-first
    #[default]
    PreferInstalled,
    /// All matches highest-first, installed winning ties
    PreferHighest,
}

/// Resolver configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub strategy: ResolverStrategy,

    /// Hard cap on atoms handed out for lookup (0 = unlimited)
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: ResolverStrategy::default(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    100_000
}

/// Merge configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    /// Refuse to overwrite live files that belong to nothing being replaced
    #[serde(default = "default_true")]
    pub collision_protect: bool,

    /// Glob patterns exempt from collision protection
    #[serde(default)]
    pub collision_ignore: Vec<String>,

    /// Glob patterns never installed
    #[serde(default)]
    pub install_mask: Vec<String>,

    /// Glob patterns never removed on uninstall
    #[serde(default)]
    pub uninstall_ignore: Vec<String>,

    /// Strip the world-writable bit from installed entries
    #[serde(default = "default_true")]
    pub fix_world_writable: bool,

    /// Compute and verify file checksums before merging
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    /// Worker threads for checksumming (0 = rayon default)
    #[serde(default = "default_checksum_threads")]
    pub checksum_threads: usize,

    /// Parent directory for per-transaction temp space
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Exclusive lock held for the duration of a transaction
    #[serde(default)]
    pub lock_path: Option<PathBuf>,

    /// How long to wait for another transaction's lock (0 = fail at once)
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,

    /// Owner remapping applied to installed entries (uid -> uid)
    #[serde(default)]
    pub uid_map: BTreeMap<String, u32>,

    /// Group remapping applied to installed entries (gid -> gid)
    #[serde(default)]
    pub gid_map: BTreeMap<String, u32>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            collision_protect: true,
            collision_ignore: Vec::new(),
            install_mask: Vec::new(),
            uninstall_ignore: Vec::new(),
            fix_world_writable: true,
            verify_checksums: true,
            checksum_threads: default_checksum_threads(),
            temp_root: None,
            lock_path: None,
            lock_wait_ms: default_lock_wait_ms(),
            uid_map: BTreeMap::new(),
            gid_map: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_checksum_threads() -> usize {
    4
}

fn default_lock_wait_ms() -> u64 {
    1500
}

impl MergeConfig {
    /// Parsed uid remapping
    pub fn uid_remap(&self) -> Result<HashMap<u32, u32>> {
        parse_id_map("merge.uid_map", &self.uid_map)
    }

    /// Parsed gid remapping
    pub fn gid_remap(&self) -> Result<HashMap<u32, u32>> {
        parse_id_map("merge.gid_map", &self.gid_map)
    }
}

fn parse_id_map(section: &str, map: &BTreeMap<String, u32>) -> Result<HashMap<u32, u32>> {
    map.iter()
        .map(|(from, to)| {
            from.parse::<u32>().map(|from| (from, *to)).map_err(|_| {
                Error::Config(format!("{} key '{}' is not a numeric id", section, from))
            })
        })
        .collect()
}

/// Compile a list of glob patterns
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(Error::from))
        .collect()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.merge.uid_remap()?;
        self.merge.gid_remap()?;

        for (name, patterns) in [
            ("merge.collision_ignore", &self.merge.collision_ignore),
            ("merge.install_mask", &self.merge.install_mask),
            ("merge.uninstall_ignore", &self.merge.uninstall_ignore),
        ] {
            for pattern in patterns {
                if !pattern.starts_with('/') {
                    return Err(Error::Config(format!(
                        "{} entry '{}' must be an absolute path pattern",
                        name, pattern
                    )));
                }
                Pattern::new(pattern)?;
            }
        }

        if let Some(lock) = &self.merge.lock_path
            && lock.is_relative()
        {
            return Err(Error::Config(format!(
                "merge.lock_path must be absolute, got {}",
                lock.display()
            )));
        }

        Ok(())
    }
}
