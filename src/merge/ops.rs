// src/merge/ops.rs

//! Live filesystem operations used by the merge and unmerge triggers
//!
//! Regular files are written into the transaction's stage directory first
//! and then moved into place, so a reader of the live filesystem sees
//! either the old file or the complete new one. Symlinks are created under
//! a temporary sibling name and renamed over the target.

use crate::contents::{safe_join, DeviceKind, EntryKind, FsEntry};
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::{PermissionsExt, lchown, symlink};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// How a staged file reached the live filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Published {
    Renamed,
    /// Stage and target are on different devices
    Copied,
}

/// Hidden sibling of `target` used while an entry is being swapped in
fn swap_name(target: &Path, tag: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}", name, tag))
}

/// Remove a leftover swap file from an interrupted transaction
fn clear_swap(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Move a staged file over `target`
///
/// When the stage directory lives on another device the file is copied to
/// a swap name beside the target, synced, and renamed over it, so the
/// target is never observed half written.
fn publish_staged(staged: &Path, target: &Path, tag: &str) -> io::Result<Published> {
    match fs::rename(staged, target) {
        Ok(()) => Ok(Published::Renamed),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            copy_across(staged, target, &swap_name(target, tag))?;
            Ok(Published::Copied)
        }
        Err(e) => Err(e),
    }
}

fn copy_across(staged: &Path, target: &Path, swap: &Path) -> io::Result<()> {
    clear_swap(swap)?;
    fs::copy(staged, swap)?;
    File::open(swap)?.sync_all()?;
    if let Err(e) = fs::rename(swap, target) {
        let _ = fs::remove_file(swap);
        return Err(e);
    }
    fs::remove_file(staged)
}

/// Counters for what a transaction did to the live filesystem
#[derive(Debug, Default)]
pub struct LiveFsCounters {
    pub files_added: AtomicUsize,
    pub files_replaced: AtomicUsize,
    pub files_removed: AtomicUsize,
    pub dirs_created: AtomicUsize,
    pub dirs_removed: AtomicUsize,
}

impl LiveFsCounters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> FsChanges {
        FsChanges {
            files_added: Self::get(&self.files_added),
            files_replaced: Self::get(&self.files_replaced),
            files_removed: Self::get(&self.files_removed),
            dirs_created: Self::get(&self.dirs_created),
            dirs_removed: Self::get(&self.dirs_removed),
        }
    }
}

/// Summary of live filesystem changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsChanges {
    pub files_added: usize,
    pub files_replaced: usize,
    pub files_removed: usize,
    pub dirs_created: usize,
    pub dirs_removed: usize,
}

impl FsChanges {
    pub fn total_operations(&self) -> usize {
        self.files_added
            + self.files_replaced
            + self.files_removed
            + self.dirs_created
            + self.dirs_removed
    }
}

/// Whether ownership changes can be applied
fn can_chown() -> bool {
    nix::unistd::geteuid().is_root()
}

fn apply_metadata(target: &Path, entry: &FsEntry) -> Result<()> {
    if !entry.is_symlink() {
        fs::set_permissions(target, fs::Permissions::from_mode(entry.mode))?;
    }
    if can_chown() {
        lchown(target, Some(entry.uid), Some(entry.gid))?;
    }
    Ok(())
}

/// Write one entry onto the live filesystem rooted at `root`
///
/// `stage_dir` holds staged copies of regular files; `tag` makes temporary
/// names unique to the transaction.
pub fn merge_entry(
    entry: &FsEntry,
    root: &Path,
    stage_dir: &Path,
    tag: &str,
    counters: &LiveFsCounters,
) -> Result<()> {
    let target = safe_join(root, &entry.path)?;
    let existing = fs::symlink_metadata(&target).ok();

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    match &entry.kind {
        EntryKind::Dir => {
            match &existing {
                Some(meta) if meta.is_dir() => {}
                Some(_) => {
                    return Err(Error::InvalidState(format!(
                        "cannot create directory {}: a non-directory is in the way",
                        target.display()
                    )));
                }
                None => {
                    fs::create_dir(&target)?;
                    LiveFsCounters::bump(&counters.dirs_created);
                }
            }
            apply_metadata(&target, entry)?;
            return Ok(());
        }
        EntryKind::File { data, .. } => {
            let data = data.as_ref().ok_or_else(|| {
                Error::InvalidState(format!("{} has no content source", entry.path.display()))
            })?;
            let relative = entry.path.strip_prefix("/").unwrap_or(&entry.path);
            let staged = stage_dir.join(relative);
            if let Some(parent) = staged.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut reader = data.reader()?;
            let mut out = File::create(&staged)?;
            io::copy(&mut reader, &mut out)?;
            out.sync_all()?;
            drop(out);
            apply_metadata(&staged, entry)?;
            refuse_dir(&target, existing.as_ref())?;
            if publish_staged(&staged, &target, tag)? == Published::Copied {
                debug!("{} copied in from a stage on another device", entry.path.display());
            }
        }
        EntryKind::Symlink { target: link } => {
            refuse_dir(&target, existing.as_ref())?;
            let temp = swap_name(&target, tag);
            clear_swap(&temp)?;
            symlink(link, &temp)?;
            if can_chown() {
                lchown(&temp, Some(entry.uid), Some(entry.gid))?;
            }
            fs::rename(&temp, &target)?;
        }
        EntryKind::Device { kind, major, minor } => {
            refuse_dir(&target, existing.as_ref())?;
            if existing.is_some() {
                fs::remove_file(&target)?;
            }
            let sflag = match kind {
                DeviceKind::Block => nix::sys::stat::SFlag::S_IFBLK,
                DeviceKind::Char => nix::sys::stat::SFlag::S_IFCHR,
            };
            nix::sys::stat::mknod(
                &target,
                sflag,
                nix::sys::stat::Mode::from_bits_truncate(entry.mode),
                nix::sys::stat::makedev(*major, *minor),
            )
            .map_err(io::Error::from)?;
            apply_metadata(&target, entry)?;
        }
        EntryKind::Fifo => {
            refuse_dir(&target, existing.as_ref())?;
            if existing.is_some() {
                fs::remove_file(&target)?;
            }
            nix::unistd::mkfifo(
                &target,
                nix::sys::stat::Mode::from_bits_truncate(entry.mode),
            )
            .map_err(io::Error::from)?;
            apply_metadata(&target, entry)?;
        }
    }

    if existing.is_some() {
        LiveFsCounters::bump(&counters.files_replaced);
    } else {
        LiveFsCounters::bump(&counters.files_added);
    }
    Ok(())
}

fn refuse_dir(target: &Path, existing: Option<&fs::Metadata>) -> Result<()> {
    match existing {
        Some(meta) if meta.is_dir() => Err(Error::InvalidState(format!(
            "cannot replace directory {} with a non-directory",
            target.display()
        ))),
        _ => Ok(()),
    }
}

/// Remove one entry from the live filesystem rooted at `root`
///
/// Directories are only removed when empty. Returns whether anything was
/// removed.
pub fn unmerge_entry(entry: &FsEntry, root: &Path, counters: &LiveFsCounters) -> Result<bool> {
    let target = safe_join(root, &entry.path)?;
    let Ok(meta) = fs::symlink_metadata(&target) else {
        return Ok(false);
    };

    if entry.is_dir() {
        if !meta.is_dir() {
            warn!("{} is no longer a directory, leaving it", target.display());
            return Ok(false);
        }
        if fs::read_dir(&target)?.next().is_some() {
            debug!("keeping non-empty directory {}", target.display());
            return Ok(false);
        }
        fs::remove_dir(&target)?;
        LiveFsCounters::bump(&counters.dirs_removed);
        return Ok(true);
    }

    if meta.is_dir() {
        warn!("{} became a directory, leaving it", target.display());
        return Ok(false);
    }
    fs::remove_file(&target)?;
    LiveFsCounters::bump(&counters.files_removed);
    Ok(true)
}
