// src/merge/hooks.rs

//! Merge modes, hook points and content-set names

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// What a transaction does to the live filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MergeMode {
    Install,
    Uninstall,
    Replace,
}

impl MergeMode {
    /// Hooks in the order this mode executes them
    pub fn hooks(&self) -> &'static [Hook] {
        match self {
            MergeMode::Install => &[
                Hook::SanityCheck,
                Hook::PreMerge,
                Hook::Merge,
                Hook::PostMerge,
                Hook::Final,
            ],
            MergeMode::Uninstall => &[
                Hook::SanityCheck,
                Hook::PreUnmerge,
                Hook::Unmerge,
                Hook::PostUnmerge,
                Hook::Final,
            ],
            MergeMode::Replace => &[
                Hook::SanityCheck,
                Hook::PreMerge,
                Hook::Merge,
                Hook::PostMerge,
                Hook::PreUnmerge,
                Hook::Unmerge,
                Hook::PostUnmerge,
                Hook::Final,
            ],
        }
    }

    pub fn runs(&self, hook: Hook) -> bool {
        self.hooks().contains(&hook)
    }
}

/// Named points in a transaction where triggers run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Hook {
    SanityCheck,
    PreMerge,
    Merge,
    PostMerge,
    PreUnmerge,
    Unmerge,
    PostUnmerge,
    Final,
}

/// Content sets a trigger can ask for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum CsetName {
    /// The new package's declared contents
    NewCset,
    /// The old package's recorded contents
    OldCset,
    /// Everything to be written (`new_cset`)
    Install,
    /// Everything to be removed
    Uninstall,
    /// Paths written over an old package's copy
    Replace,
    /// Members of `install` present on the live filesystem now
    InstallExisting,
    /// Members of `uninstall` present on the live filesystem now
    UninstallExisting,
}

impl CsetName {
    /// Preserved sets are computed once per transaction; the rest are
    /// regenerated at every hook boundary
    pub fn is_preserved(&self) -> bool {
        !matches!(self, CsetName::InstallExisting | CsetName::UninstallExisting)
    }
}
