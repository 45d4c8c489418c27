// src/contents/livefs.rs

//! Live filesystem probe
//!
//! The merge engine never assumes the in-memory content sets describe what
//! is on disk. Before collision checks and removals it asks a [`LiveFs`]
//! which of a set's paths actually exist right now.

use super::{ContentSet, DataSource, DeviceKind, EntryKind, FsEntry};
use crate::error::Result;
use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Read-only view of a filesystem
pub trait LiveFs: Send + Sync {
    /// Every entry at or below `path`
    fn scan(&self, path: &Path) -> Result<ContentSet>;

    /// The members of `cset` that currently exist, described by their live state
    fn intersect(&self, cset: &ContentSet) -> Result<ContentSet>;
}

/// [`LiveFs`] backed by the real filesystem
#[derive(Debug, Clone, Default)]
pub struct DiskLiveFs {
    checksums: bool,
}

impl DiskLiveFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute SHA-256 for every regular file probed
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.checksums = enabled;
        self
    }

    /// Describe one path from its `lstat` data; `None` if absent or a socket
    pub fn stat(&self, path: &Path) -> Result<Option<FsEntry>> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file_type = meta.file_type();

        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_symlink() {
            EntryKind::Symlink {
                target: fs::read_link(path)?,
            }
        } else if file_type.is_file() {
            let data = DataSource::Path(path.to_path_buf());
            let chksum = if self.checksums {
                Some(data.sha256()?)
            } else {
                None
            };
            EntryKind::File {
                chksum,
                size: meta.len(),
                data: Some(data),
            }
        } else if file_type.is_block_device() || file_type.is_char_device() {
            let rdev = meta.rdev();
            EntryKind::Device {
                kind: if file_type.is_block_device() {
                    DeviceKind::Block
                } else {
                    DeviceKind::Char
                },
                major: nix::sys::stat::major(rdev),
                minor: nix::sys::stat::minor(rdev),
            }
        } else if file_type.is_fifo() {
            EntryKind::Fifo
        } else {
            debug!("skipping unsupported file type at {}", path.display());
            return Ok(None);
        };

        Ok(Some(FsEntry {
            path: path.to_path_buf(),
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            mtime: Some(meta.mtime()),
            kind,
        }))
    }
}

impl LiveFs for DiskLiveFs {
    fn scan(&self, path: &Path) -> Result<ContentSet> {
        let mut cset = ContentSet::new();
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry?;
            if let Some(fs_entry) = self.stat(entry.path())? {
                cset.add(fs_entry)?;
            }
        }
        debug!("scanned {} entries under {}", cset.len(), path.display());
        Ok(cset)
    }

    fn intersect(&self, cset: &ContentSet) -> Result<ContentSet> {
        let mut live = cset.empty_like();
        for path in cset.paths() {
            if let Some(entry) = self.stat(path)? {
                live.entries.insert(path.to_path_buf(), entry);
            }
        }
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_scan_records_types() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("dir")).unwrap();
        fs::write(root.join("dir/file"), b"hello").unwrap();
        symlink("file", root.join("dir/link")).unwrap();
        nix::unistd::mkfifo(&root.join("pipe"), nix::sys::stat::Mode::from_bits_truncate(0o600))
            .unwrap();

        let scanned = DiskLiveFs::new().with_checksums(true).scan(root).unwrap();
        assert_eq!(scanned.len(), 5);
        let file = scanned.get(root.join("dir/file")).unwrap();
        assert_eq!(
            file.chksum(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        match &scanned.get(root.join("dir/link")).unwrap().kind {
            EntryKind::Symlink { target } => assert_eq!(target, Path::new("file")),
            other => panic!("expected symlink, got {:?}", other),
        }
        assert!(scanned.get(root.join("pipe")).unwrap().is_fifo());
    }

    #[test]
    fn test_intersect_reports_only_present_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("present"), b"x").unwrap();

        let wanted = ContentSet::from_entries([
            FsEntry::dir(root.join("present")),
            FsEntry::dir(root.join("absent")),
        ])
        .unwrap();
        let live = DiskLiveFs::new().intersect(&wanted).unwrap();
        assert_eq!(live.len(), 1);
        // live state wins over the in-memory description
        assert!(live.get(root.join("present")).unwrap().is_file());
    }
}
