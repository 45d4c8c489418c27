// src/contents/mod.rs

//! Content sets: path-keyed collections of filesystem entries
//!
//! A [`ContentSet`] describes a package's files, a live filesystem snapshot
//! or any set-algebra result of those. Membership is decided by normalized
//! absolute path alone; two entries at the same path are the same member and
//! adding the second overwrites the first.
//!
//! Ownership rule for the algebra: `union`, `intersection`, `difference`
//! and `symmetric_difference` never touch their inputs and return a new set
//! with the receiver's mutability. The `*_update` variants mutate the
//! receiver in place and fail on an immutable set.
//!
//! When both sides hold an entry for a path, `intersection` and
//! `difference` keep the receiver's entry while `union` takes the other
//! side's (last write wins).

mod entry;
mod livefs;
mod path;

pub use entry::{DataSource, DeviceKind, EntryKind, FsEntry};
pub use livefs::{DiskLiveFs, LiveFs};
pub use path::{change_offset, insert_offset, normalize_path, safe_join};

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::{Path, PathBuf};

/// Path-keyed set of filesystem entries
#[derive(Debug, Clone)]
pub struct ContentSet {
    entries: BTreeMap<PathBuf, FsEntry>,
    mutable: bool,
}

impl Default for ContentSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ContentSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.keys().all(|k| other.entries.contains_key(k))
    }
}

impl Eq for ContentSet {}

impl ContentSet {
    /// Empty, mutable set
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            mutable: true,
        }
    }

    /// Empty set that refuses mutation
    pub fn frozen() -> Self {
        Self {
            entries: BTreeMap::new(),
            mutable: false,
        }
    }

    /// Build a mutable set from entries, normalizing every path
    pub fn from_entries(entries: impl IntoIterator<Item = FsEntry>) -> Result<Self> {
        let mut set = Self::new();
        for entry in entries {
            set.add(entry)?;
        }
        Ok(set)
    }

    /// Same members under a different mutability
    pub fn clone_with(&self, mutable: bool) -> Self {
        Self {
            entries: self.entries.clone(),
            mutable,
        }
    }

    /// Consume the set and forbid further mutation
    pub fn freeze(mut self) -> Self {
        self.mutable = false;
        self
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(Error::ImmutableContentSet)
        }
    }

    fn empty_like(&self) -> Self {
        Self {
            entries: BTreeMap::new(),
            mutable: self.mutable,
        }
    }

    /// Insert an entry, overwriting any entry at the same path
    pub fn add(&mut self, mut entry: FsEntry) -> Result<()> {
        self.ensure_mutable()?;
        let key = normalize_path(&entry.path)?;
        entry.path = key.clone();
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Remove the entry at `path`; missing paths are an error
    pub fn remove(&mut self, path: impl AsRef<Path>) -> Result<FsEntry> {
        self.ensure_mutable()?;
        let key = normalize_path(path)?;
        self.entries
            .remove(&key)
            .ok_or_else(|| Error::NotFound(key.display().to_string()))
    }

    /// Remove the entry at `path` if present
    pub fn discard(&mut self, path: impl AsRef<Path>) -> Result<Option<FsEntry>> {
        self.ensure_mutable()?;
        let key = normalize_path(path)?;
        Ok(self.entries.remove(&key))
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        normalize_path(path).is_ok_and(|key| self.entries.contains_key(&key))
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FsEntry> {
        normalize_path(path)
            .ok()
            .and_then(|key| self.entries.get(&key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order
    pub fn iter(&self) -> btree_map::Values<'_, PathBuf, FsEntry> {
        self.entries.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    pub fn iter_files(&self) -> impl Iterator<Item = &FsEntry> {
        self.iter().filter(|e| e.is_file())
    }

    pub fn iter_dirs(&self) -> impl Iterator<Item = &FsEntry> {
        self.iter().filter(|e| e.is_dir())
    }

    pub fn iter_links(&self) -> impl Iterator<Item = &FsEntry> {
        self.iter().filter(|e| e.is_symlink())
    }

    pub fn iter_devices(&self) -> impl Iterator<Item = &FsEntry> {
        self.iter().filter(|e| e.is_device())
    }

    pub fn iter_fifos(&self) -> impl Iterator<Item = &FsEntry> {
        self.iter().filter(|e| e.is_fifo())
    }

    /// Direct children of `dir`
    pub fn child_nodes(&self, dir: impl AsRef<Path>) -> Result<Vec<&FsEntry>> {
        let dir = normalize_path(dir)?;
        Ok(self
            .entries
            .range(dir.clone()..)
            .skip_while(|(path, _)| **path == dir)
            .take_while(|(path, _)| path.starts_with(&dir))
            .filter(|(path, _)| path.parent() == Some(dir.as_path()))
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Apply `f` to every entry; paths cannot be changed this way
    pub fn for_each_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut FsEntry),
    {
        self.ensure_mutable()?;
        for (path, entry) in self.entries.iter_mut() {
            f(entry);
            entry.path.clone_from(path);
        }
        Ok(())
    }

    /// Keep only entries for which `keep` returns true
    pub fn retain<F>(&mut self, mut keep: F) -> Result<()>
    where
        F: FnMut(&FsEntry) -> bool,
    {
        self.ensure_mutable()?;
        self.entries.retain(|_, entry| keep(entry));
        Ok(())
    }

    pub fn is_subset(&self, other: &ContentSet) -> bool {
        self.entries.keys().all(|k| other.entries.contains_key(k))
    }

    /// Members of either set; `other`'s entry wins on shared paths
    pub fn union(&self, other: &ContentSet) -> ContentSet {
        let mut result = self.clone();
        result.entries.extend(
            other
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        result
    }

    /// Members of both sets, with the receiver's entries
    pub fn intersection(&self, other: &ContentSet) -> ContentSet {
        let mut result = self.empty_like();
        for (path, entry) in &self.entries {
            if other.entries.contains_key(path) {
                result.entries.insert(path.clone(), entry.clone());
            }
        }
        result
    }

    /// Members of the receiver not in `other`
    pub fn difference(&self, other: &ContentSet) -> ContentSet {
        let mut result = self.empty_like();
        for (path, entry) in &self.entries {
            if !other.entries.contains_key(path) {
                result.entries.insert(path.clone(), entry.clone());
            }
        }
        result
    }

    /// Members of exactly one set
    pub fn symmetric_difference(&self, other: &ContentSet) -> ContentSet {
        let mut result = self.difference(other);
        for (path, entry) in &other.entries {
            if !self.entries.contains_key(path) {
                result.entries.insert(path.clone(), entry.clone());
            }
        }
        result
    }

    pub fn union_update(&mut self, other: &ContentSet) -> Result<()> {
        self.ensure_mutable()?;
        for (path, entry) in &other.entries {
            self.entries.insert(path.clone(), entry.clone());
        }
        Ok(())
    }

    pub fn intersection_update(&mut self, other: &ContentSet) -> Result<()> {
        self.ensure_mutable()?;
        self.entries.retain(|path, _| other.entries.contains_key(path));
        Ok(())
    }

    pub fn difference_update(&mut self, other: &ContentSet) -> Result<()> {
        self.ensure_mutable()?;
        self.entries.retain(|path, _| !other.entries.contains_key(path));
        Ok(())
    }

    pub fn symmetric_difference_update(&mut self, other: &ContentSet) -> Result<()> {
        self.ensure_mutable()?;
        for (path, entry) in &other.entries {
            if self.entries.remove(path).is_none() {
                self.entries.insert(path.clone(), entry.clone());
            }
        }
        Ok(())
    }

    /// Re-root every path under `offset`
    pub fn insert_offset(&self, offset: impl AsRef<Path>) -> Result<ContentSet> {
        let offset = offset.as_ref();
        self.rewrite_paths(|path| insert_offset(path, offset))
    }

    /// Move every path from under `old` to under `new`
    pub fn change_offset(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<ContentSet> {
        let (old, new) = (old.as_ref(), new.as_ref());
        self.rewrite_paths(|path| change_offset(path, old, new))
    }

    fn rewrite_paths<F>(&self, rewrite: F) -> Result<ContentSet>
    where
        F: Fn(&Path) -> Result<PathBuf>,
    {
        let mut result = self.empty_like();
        for entry in self.entries.values() {
            let mut moved = entry.clone();
            moved.path = rewrite(&entry.path)?;
            result.entries.insert(moved.path.clone(), moved);
        }
        Ok(result)
    }
}

impl<'a> IntoIterator for &'a ContentSet {
    type Item = &'a FsEntry;
    type IntoIter = btree_map::Values<'a, PathBuf, FsEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cset(paths: &[&str]) -> ContentSet {
        ContentSet::from_entries(paths.iter().map(|p| FsEntry::dir(*p))).unwrap()
    }

    fn paths(set: &ContentSet) -> Vec<String> {
        set.paths().map(|p| p.display().to_string()).collect()
    }

    #[test]
    fn test_add_normalizes_and_overwrites() {
        let mut set = ContentSet::new();
        set.add(FsEntry::dir("/etc/a")).unwrap();
        set.add(FsEntry::symlink("/etc//a/", "b")).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("/etc/a").unwrap().is_symlink());
        assert!(set.add(FsEntry::dir("relative")).is_err());
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let mut set = cset(&["/a"]).freeze();
        assert!(matches!(set.add(FsEntry::dir("/b")), Err(Error::ImmutableContentSet)));
        assert!(matches!(set.remove("/a"), Err(Error::ImmutableContentSet)));
        assert!(set.union_update(&cset(&["/c"])).is_err());
        assert!(set.for_each_mut(|e| e.mode = 0).is_err());
        // pure operations still work and inherit immutability
        let merged = set.union(&cset(&["/c"]));
        assert_eq!(merged.len(), 2);
        assert!(!merged.is_mutable());
    }

    #[test]
    fn test_remove_missing_is_error() {
        let mut set = cset(&["/a"]);
        assert!(matches!(set.remove("/b"), Err(Error::NotFound(_))));
        assert!(set.discard("/b").unwrap().is_none());
        assert!(set.discard("/a").unwrap().is_some());
    }

    #[test]
    fn test_set_algebra() {
        let a = cset(&["/etc/a", "/etc/b"]);
        let b = cset(&["/etc/b", "/etc/c"]);
        assert_eq!(paths(&a.difference(&b)), vec!["/etc/a"]);
        assert_eq!(paths(&a.intersection(&b)), vec!["/etc/b"]);
        assert_eq!(paths(&a.union(&b)), vec!["/etc/a", "/etc/b", "/etc/c"]);
        assert_eq!(paths(&a.symmetric_difference(&b)), vec!["/etc/a", "/etc/c"]);
        // inputs untouched
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_update_variants_mutate_in_place() {
        let b = cset(&["/b", "/c"]);
        let mut a = cset(&["/a", "/b"]);
        a.symmetric_difference_update(&b).unwrap();
        assert_eq!(paths(&a), vec!["/a", "/c"]);
        a.difference_update(&cset(&["/c"])).unwrap();
        assert_eq!(paths(&a), vec!["/a"]);
        a.union_update(&b).unwrap();
        a.intersection_update(&cset(&["/a", "/b"])).unwrap();
        assert_eq!(paths(&a), vec!["/a", "/b"]);
    }

    #[test]
    fn test_entry_choice_on_shared_paths() {
        let mut left = ContentSet::new();
        left.add(FsEntry::dir("/x")).unwrap();
        let mut right = ContentSet::new();
        right.add(FsEntry::fifo("/x")).unwrap();
        assert!(left.intersection(&right).get("/x").unwrap().is_dir());
        assert!(left.union(&right).get("/x").unwrap().is_fifo());
    }

    #[test]
    fn test_equality_by_path_only() {
        let mut left = ContentSet::new();
        left.add(FsEntry::dir("/x")).unwrap();
        let mut right = ContentSet::frozen().clone_with(true);
        right.add(FsEntry::fifo("/x")).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_offset_roundtrip() {
        let set = cset(&["/", "/usr", "/usr/bin/foo"]);
        let moved = set.insert_offset("/image").unwrap();
        assert_eq!(paths(&moved), vec!["/image", "/image/usr", "/image/usr/bin/foo"]);
        assert_eq!(moved.get("/image/usr").unwrap().path, PathBuf::from("/image/usr"));
        let back = moved.change_offset("/image", "/").unwrap();
        assert_eq!(paths(&back), paths(&set));
    }

    #[test]
    fn test_typed_iterators_and_children() {
        let set = ContentSet::from_entries([
            FsEntry::dir("/usr"),
            FsEntry::dir("/usr/bin"),
            FsEntry::file("/usr/bin/foo", DataSource::bytes(b"x".to_vec())),
            FsEntry::symlink("/usr/lib", "lib64"),
            FsEntry::fifo("/usr/bin/pipe"),
            FsEntry::device("/dev/null", DeviceKind::Char, 1, 3),
            FsEntry::dir("/usr2"),
        ])
        .unwrap();
        assert_eq!(set.iter_files().count(), 1);
        assert_eq!(set.iter_dirs().count(), 3);
        assert_eq!(set.iter_links().count(), 1);
        assert_eq!(set.iter_fifos().count(), 1);
        assert_eq!(set.iter_devices().count(), 1);

        let children: Vec<String> = set
            .child_nodes("/usr")
            .unwrap()
            .iter()
            .map(|e| e.path.display().to_string())
            .collect();
        assert_eq!(children, vec!["/usr/bin", "/usr/lib"]);
    }

    #[test]
    fn test_subset() {
        assert!(cset(&["/a"]).is_subset(&cset(&["/a", "/b"])));
        assert!(!cset(&["/a", "/c"]).is_subset(&cset(&["/a", "/b"])));
    }
}
