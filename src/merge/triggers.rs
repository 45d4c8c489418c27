// src/merge/triggers.rs

//! Trigger interface and the built-in trigger set
//!
//! A trigger binds to one or more hooks, names the content sets it needs
//! for a given mode, and gets those sets (as mutable copies) in the order
//! it asked for them. Whatever it leaves in the slice is written back to
//! the engine once it returns successfully.
//!
//! Triggers run in ascending priority; equal priorities keep registration
//! order. Errors from a trigger with `suppress_errors() == true` are logged
//! and skipped, except blocking errors, which always abort.

use super::hooks::{CsetName, Hook, MergeMode};
use super::ops::{merge_entry, unmerge_entry, LiveFsCounters};
use crate::config::{compile_patterns, MergeConfig};
use crate::contents::{ContentSet, DataSource, EntryKind, LiveFs};
use crate::error::{Error, Result};
use crate::observer::{Observer, SerializedObserver, SharedObserver};
use glob::Pattern;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default trigger priority
pub const DEFAULT_PRIORITY: i32 = 50;

/// What a trigger can see of the running transaction
pub struct TriggerContext<'a> {
    pub mode: MergeMode,
    pub hook: Hook,
    /// Root of the live filesystem being modified
    pub offset: &'a Path,
    /// Transaction-private scratch space
    pub work_dir: &'a Path,
    /// Transaction id, used for temporary names
    pub tag: &'a str,
    pub observer: &'a SharedObserver,
    pub livefs: &'a dyn LiveFs,
    pub counters: &'a LiveFsCounters,
}

impl TriggerContext<'_> {
    /// Directory regular files are staged in before being moved live
    pub fn stage_dir(&self) -> PathBuf {
        self.work_dir.join("stage")
    }
}

/// A pluggable merge step
pub trait Trigger: Send + Sync {
    fn name(&self) -> &str;

    /// Hooks this trigger runs at
    fn hooks(&self) -> &[Hook];

    /// Content sets handed to `run`, in order
    fn required_csets(&self, mode: MergeMode) -> Vec<CsetName>;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Whether a failure is downgraded to an observer warning
    fn suppress_errors(&self) -> bool {
        true
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()>;
}

fn matches_any(patterns: &[Pattern], path: &Path) -> bool {
    patterns.iter().any(|p| p.matches_path(path))
}

/// The new contents must be installable at all
///
/// Every regular file needs a content source and every symlink a target.
#[derive(Debug, Default)]
pub struct ValidateContents;

impl Trigger for ValidateContents {
    fn name(&self) -> &str {
        "validate_contents"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::SanityCheck]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn priority(&self) -> i32 {
        10
    }

    fn suppress_errors(&self) -> bool {
        false
    }

    fn run(&self, _ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let mut broken = Vec::new();
        for entry in csets[0].iter() {
            match &entry.kind {
                EntryKind::File { data: None, .. } => broken.push(entry.path.clone()),
                EntryKind::Symlink { target } if target.as_os_str().is_empty() => {
                    broken.push(entry.path.clone())
                }
                _ => {}
            }
        }
        if broken.is_empty() {
            return Ok(());
        }
        Err(Error::InvalidState(format!(
            "entries without content: {}",
            broken
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// Drop install-masked paths from the install set
pub struct PruneFiles {
    patterns: Vec<Pattern>,
}

impl PruneFiles {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }
}

impl Trigger for PruneFiles {
    fn name(&self) -> &str {
        "prune_files"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::SanityCheck]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn priority(&self) -> i32 {
        20
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let patterns = &self.patterns;
        csets[0].retain(|entry| {
            let masked = matches_any(patterns, &entry.path);
            if masked {
                ctx.observer
                    .info(&format!("install_mask: not installing {}", entry.path.display()));
            }
            !masked
        })
    }
}

/// Keep protected paths out of the uninstall set
pub struct UninstallIgnore {
    patterns: Vec<Pattern>,
}

impl UninstallIgnore {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }
}

impl Trigger for UninstallIgnore {
    fn name(&self) -> &str {
        "uninstall_ignore"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::PreUnmerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Uninstall]
    }

    fn priority(&self) -> i32 {
        20
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let patterns = &self.patterns;
        csets[0].retain(|entry| {
            let keep_live = matches_any(patterns, &entry.path);
            if keep_live {
                ctx.observer
                    .info(&format!("uninstall_ignore: keeping {}", entry.path.display()));
            }
            !keep_live
        })
    }
}

/// Remap entry owners
pub struct FixOwnership {
    uids: HashMap<u32, u32>,
    gids: HashMap<u32, u32>,
}

impl FixOwnership {
    pub fn new(uids: HashMap<u32, u32>, gids: HashMap<u32, u32>) -> Self {
        Self { uids, gids }
    }
}

impl Trigger for FixOwnership {
    fn name(&self) -> &str {
        "fix_ownership"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::PreMerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn priority(&self) -> i32 {
        30
    }

    fn run(&self, _ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        csets[0].for_each_mut(|entry| {
            if let Some(uid) = self.uids.get(&entry.uid) {
                entry.uid = *uid;
            }
            if let Some(gid) = self.gids.get(&entry.gid) {
                entry.gid = *gid;
            }
        })
    }
}

/// Setuid/setgid files must not be group or world writable
#[derive(Debug, Default)]
pub struct FixSetBits;

impl Trigger for FixSetBits {
    fn name(&self) -> &str {
        "fix_set_bits"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::PreMerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn priority(&self) -> i32 {
        30
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        csets[0].for_each_mut(|entry| {
            if entry.is_file() && entry.mode & 0o6000 != 0 && entry.mode & 0o022 != 0 {
                ctx.observer.warn(&format!(
                    "{} is setuid/setgid and writable (mode {:o}), dropping write bits",
                    entry.path.display(),
                    entry.mode
                ));
                entry.mode &= !0o022;
            }
        })
    }
}

/// Report world-writable entries, optionally clearing the bit
pub struct DetectWorldWritable {
    fix: bool,
}

impl DetectWorldWritable {
    pub fn new(fix: bool) -> Self {
        Self { fix }
    }
}

impl Trigger for DetectWorldWritable {
    fn name(&self) -> &str {
        "detect_world_writable"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::PreMerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn priority(&self) -> i32 {
        35
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let fix = self.fix;
        csets[0].for_each_mut(|entry| {
            // sticky directories such as /tmp are meant to be shared
            let sticky_dir = entry.is_dir() && entry.mode & 0o1000 != 0;
            if entry.is_symlink() || sticky_dir || entry.mode & 0o002 == 0 {
                return;
            }
            ctx.observer
                .warn(&format!("{} is world writable", entry.path.display()));
            if fix {
                entry.mode &= !0o002;
            }
        })
    }
}

/// Compute missing checksums and verify declared ones
///
/// Files are hashed on a dedicated rayon pool; workers report through a
/// serialized observer.
pub struct ChecksumContents {
    threads: usize,
}

impl ChecksumContents {
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }
}

impl Trigger for ChecksumContents {
    fn name(&self) -> &str {
        "checksum_contents"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::PreMerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn priority(&self) -> i32 {
        40
    }

    fn suppress_errors(&self) -> bool {
        false
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let work: Vec<(PathBuf, DataSource, Option<String>)> = csets[0]
            .iter_files()
            .filter_map(|entry| {
                entry
                    .data()
                    .map(|data| (entry.path.clone(), data.clone(), entry.chksum().map(String::from)))
            })
            .collect();
        if work.is_empty() {
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| Error::InvalidState(format!("checksum pool: {}", e)))?;
        let observer = SerializedObserver::new(Arc::clone(ctx.observer));

        let results: Vec<Result<(PathBuf, String)>> = pool.install(|| {
            work.par_iter()
                .map(|(path, data, expected)| {
                    let sum = data.sha256()?;
                    if let Some(expected) = expected
                        && *expected != sum
                    {
                        observer.error(&format!(
                            "checksum mismatch for {}: expected {}, got {}",
                            path.display(),
                            expected,
                            sum
                        ));
                        return Err(Error::InvalidState(format!(
                            "checksum mismatch for {}",
                            path.display()
                        )));
                    }
                    observer.debug(&format!("sha256 {} {}", sum, path.display()));
                    Ok((path.clone(), sum))
                })
                .collect()
        });
        let sums: HashMap<PathBuf, String> = results.into_iter().collect::<Result<_>>()?;
        debug!("checksummed {} file(s)", sums.len());

        csets[0].for_each_mut(|entry| {
            if let (Some(sum), EntryKind::File { chksum, .. }) =
                (sums.get(&entry.path), &mut entry.kind)
            {
                *chksum = Some(sum.clone());
            }
        })
    }
}

/// Refuse to overwrite live files owned by nothing being replaced
///
/// Paths present in the old package are the package's own and may be
/// overwritten. Directories never collide.
pub struct CollisionProtect {
    ignore: Vec<Pattern>,
}

impl CollisionProtect {
    pub fn new(ignore: Vec<Pattern>) -> Self {
        Self { ignore }
    }
}

impl Trigger for CollisionProtect {
    fn name(&self) -> &str {
        "collision_protect"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::PreMerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::InstallExisting, CsetName::OldCset]
    }

    fn priority(&self) -> i32 {
        45
    }

    fn suppress_errors(&self) -> bool {
        false
    }

    fn run(&self, _ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let (existing, old) = (&csets[0], &csets[1]);
        let mut collisions: Vec<PathBuf> = existing
            .iter()
            .filter(|entry| !entry.is_dir())
            .filter(|entry| !old.contains(&entry.path))
            .filter(|entry| !matches_any(&self.ignore, &entry.path))
            .map(|entry| entry.path.clone())
            .collect();
        if collisions.is_empty() {
            return Ok(());
        }
        collisions.sort();
        Err(Error::BlockModification {
            reason: "files already exist on the live filesystem".to_string(),
            paths: collisions,
        })
    }
}

/// Write the install set onto the live filesystem
#[derive(Debug, Default)]
pub struct MergeContents;

impl Trigger for MergeContents {
    fn name(&self) -> &str {
        "merge_contents"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::Merge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::Install]
    }

    fn suppress_errors(&self) -> bool {
        false
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let stage_dir = ctx.stage_dir();
        // Path order puts every directory before its children
        for entry in csets[0].iter() {
            merge_entry(entry, ctx.offset, &stage_dir, ctx.tag, ctx.counters)?;
        }
        ctx.observer.info(&format!(
            "merged {} entries into {}",
            csets[0].len(),
            ctx.offset.display()
        ));
        Ok(())
    }
}

/// Remove the uninstall set from the live filesystem
#[derive(Debug, Default)]
pub struct UnmergeContents;

impl Trigger for UnmergeContents {
    fn name(&self) -> &str {
        "unmerge_contents"
    }

    fn hooks(&self) -> &[Hook] {
        &[Hook::Unmerge]
    }

    fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
        vec![CsetName::UninstallExisting]
    }

    fn suppress_errors(&self) -> bool {
        false
    }

    fn run(&self, ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
        let mut removed = 0;
        // Reverse path order removes children before their directory
        for entry in csets[0].iter().rev() {
            if unmerge_entry(entry, ctx.offset, ctx.counters)? {
                removed += 1;
            }
        }
        ctx.observer.info(&format!(
            "removed {} of {} entries from {}",
            removed,
            csets[0].len(),
            ctx.offset.display()
        ));
        Ok(())
    }
}

/// The standard trigger set for a merge configuration
pub fn register_default_triggers(config: &MergeConfig) -> Result<Vec<Arc<dyn Trigger>>> {
    let mut triggers: Vec<Arc<dyn Trigger>> = vec![Arc::new(ValidateContents)];

    if !config.install_mask.is_empty() {
        triggers.push(Arc::new(PruneFiles::new(compile_patterns(&config.install_mask)?)));
    }
    if !config.uninstall_ignore.is_empty() {
        triggers.push(Arc::new(UninstallIgnore::new(compile_patterns(
            &config.uninstall_ignore,
        )?)));
    }
    if !config.uid_map.is_empty() || !config.gid_map.is_empty() {
        triggers.push(Arc::new(FixOwnership::new(
            config.uid_remap()?,
            config.gid_remap()?,
        )));
    }
    triggers.push(Arc::new(FixSetBits));
    triggers.push(Arc::new(DetectWorldWritable::new(config.fix_world_writable)));
    if config.verify_checksums {
        triggers.push(Arc::new(ChecksumContents::new(config.checksum_threads)));
    }
    if config.collision_protect {
        triggers.push(Arc::new(CollisionProtect::new(compile_patterns(
            &config.collision_ignore,
        )?)));
    }
    triggers.push(Arc::new(MergeContents));
    triggers.push(Arc::new(UnmergeContents));

    Ok(triggers)
}
