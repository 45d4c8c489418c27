// src/contents/entry.rs

//! Filesystem entry objects stored in content sets

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a regular file's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Bytes live in a file (build image, binpkg extraction dir, live fs)
    Path(PathBuf),
    /// Bytes held in memory
    Bytes(Arc<Vec<u8>>),
}

impl DataSource {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(Arc::new(data.into()))
    }

    /// Open a reader over the content
    pub fn reader(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            Self::Path(path) => Ok(Box::new(File::open(path)?)),
            Self::Bytes(bytes) => Ok(Box::new(io::Cursor::new(bytes.as_slice()))),
        }
    }

    /// Hex SHA-256 of the content
    pub fn sha256(&self) -> Result<String> {
        let mut reader = self.reader()?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Block,
    Char,
}

/// Type-specific part of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File {
        /// Hex SHA-256, if known
        chksum: Option<String>,
        size: u64,
        data: Option<DataSource>,
    },
    Dir,
    Symlink {
        target: PathBuf,
    },
    Device {
        kind: DeviceKind,
        major: u64,
        minor: u64,
    },
    Fifo,
}

/// One path's worth of package content or live filesystem state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: PathBuf,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Seconds since the epoch
    pub mtime: Option<i64>,
    pub kind: EntryKind,
}

impl FsEntry {
    fn with_kind(path: impl Into<PathBuf>, mode: u32, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            mode,
            uid: 0,
            gid: 0,
            mtime: None,
            kind,
        }
    }

    /// Regular file, mode 0644, content from `data`
    pub fn file(path: impl Into<PathBuf>, data: DataSource) -> Self {
        let size = match &data {
            DataSource::Bytes(bytes) => bytes.len() as u64,
            DataSource::Path(p) => std::fs::metadata(p).map(|m| m.len()).unwrap_or(0),
        };
        Self::with_kind(
            path,
            0o644,
            EntryKind::File {
                chksum: None,
                size,
                data: Some(data),
            },
        )
    }

    /// Directory, mode 0755
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, 0o755, EntryKind::Dir)
    }

    pub fn symlink(path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::with_kind(
            path,
            0o777,
            EntryKind::Symlink {
                target: target.into(),
            },
        )
    }

    pub fn device(path: impl Into<PathBuf>, kind: DeviceKind, major: u64, minor: u64) -> Self {
        Self::with_kind(path, 0o600, EntryKind::Device { kind, major, minor })
    }

    pub fn fifo(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, 0o644, EntryKind::Fifo)
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_mtime(mut self, mtime: i64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_chksum(mut self, sum: impl Into<String>) -> Self {
        if let EntryKind::File { chksum, .. } = &mut self.kind {
            *chksum = Some(sum.into());
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File { .. })
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Dir)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, EntryKind::Symlink { .. })
    }

    pub fn is_device(&self) -> bool {
        matches!(self.kind, EntryKind::Device { .. })
    }

    pub fn is_fifo(&self) -> bool {
        matches!(self.kind, EntryKind::Fifo)
    }

    pub fn data(&self) -> Option<&DataSource> {
        match &self.kind {
            EntryKind::File { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn chksum(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::File { chksum, .. } => chksum.as_deref(),
            _ => None,
        }
    }

    /// Short type tag for logs and reports
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EntryKind::File { .. } => "file",
            EntryKind::Dir => "dir",
            EntryKind::Symlink { .. } => "symlink",
            EntryKind::Device { .. } => "device",
            EntryKind::Fifo => "fifo",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_sha256() {
        let data = DataSource::bytes(b"hello".to_vec());
        assert_eq!(
            data.sha256().unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_data_source_from_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blob");
        std::fs::write(&path, b"hello").unwrap();
        let entry = FsEntry::file("/usr/share/blob", DataSource::Path(path));
        assert!(matches!(entry.kind, EntryKind::File { size: 5, .. }));
        assert_eq!(
            entry.data().unwrap().sha256().unwrap(),
            DataSource::bytes(b"hello".to_vec()).sha256().unwrap()
        );
    }

    #[test]
    fn test_entry_builders() {
        let entry = FsEntry::file("/bin/sh", DataSource::bytes(vec![0u8; 3]))
            .with_mode(0o4755)
            .with_owner(0, 10)
            .with_chksum("abc");
        assert!(entry.is_file());
        assert_eq!(entry.mode, 0o4755);
        assert_eq!(entry.gid, 10);
        assert_eq!(entry.chksum(), Some("abc"));
        assert_eq!(FsEntry::dir("/bin").type_name(), "dir");
        assert!(FsEntry::symlink("/lib", "lib64").is_symlink());
        assert!(FsEntry::fifo("/run/p").is_fifo());
        assert!(FsEntry::device("/dev/null", DeviceKind::Char, 1, 3).is_device());
    }
}
