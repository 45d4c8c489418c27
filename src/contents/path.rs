// src/contents/path.rs

//! Path normalization for content sets
//!
//! Content-set keys are absolute, lexically normalized paths: `.` and empty
//! components are dropped, `..` is rejected outright, and there is never a
//! trailing slash. Two spellings of the same path therefore map to the same
//! member.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize an absolute path for use as a content-set key
///
/// # Examples
///
/// ```
/// use pkgmerge::contents::normalize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(normalize_path("/usr//bin/./foo/").unwrap(), PathBuf::from("/usr/bin/foo"));
/// assert!(normalize_path("usr/bin").is_err());
/// assert!(normalize_path("/usr/../etc").is_err());
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.has_root() {
        return Err(Error::InvalidPath(format!(
            "content paths must be absolute: {}",
            path.display()
        )));
    }

    let mut normalized = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path.display().to_string()));
            }
            Component::Prefix(_) => {
                return Err(Error::InvalidPath(path.display().to_string()));
            }
        }
    }
    Ok(normalized)
}

/// Re-root `path` under `offset`: `/usr/bin/foo` + `/image` = `/image/usr/bin/foo`
pub fn insert_offset(path: &Path, offset: &Path) -> Result<PathBuf> {
    let offset = normalize_path(offset)?;
    let path = normalize_path(path)?;
    let relative = path.strip_prefix("/").unwrap_or(&path);
    if relative.as_os_str().is_empty() {
        return Ok(offset);
    }
    Ok(offset.join(relative))
}

/// Move `path` from under `old` to under `new`
pub fn change_offset(path: &Path, old: &Path, new: &Path) -> Result<PathBuf> {
    let old = normalize_path(old)?;
    let new = normalize_path(new)?;
    let path = normalize_path(path)?;
    let relative = path.strip_prefix(&old).map_err(|_| {
        Error::InvalidPath(format!(
            "{} is not under offset {}",
            path.display(),
            old.display()
        ))
    })?;
    if relative.as_os_str().is_empty() {
        return Ok(new);
    }
    Ok(new.join(relative))
}

/// Join a content path onto a live root, refusing anything that escapes it
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let normalized = normalize_path(path.as_ref())?;
    let joined = insert_offset(&normalized, root)?;

    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}
