// src/atom/mod.rs

//! Package atoms: parsed, immutable package constraints
//!
//! Grammar:
//!
//! ```text
//! [!|!!][op]category/package[-version][*][:slot[/subslot][=|*]][::repo][use,...]
//! ```
//!
//! Atoms are value objects. Parsing validates every part up front, and
//! `to_string()` renders the exact inverse of the accepted text (modulo the
//! `-r0` normalization done by [`Version`]).

mod cache;
mod cpv;
mod restriction;

pub use cache::AtomCache;
pub use cpv::{Cpv, valid_category, valid_package};
pub use restriction::{Matchable, Restriction};

use crate::error::{Error, Result};
use crate::package::Package;
use crate::version::{VersionConstraint, VersionOp};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static USE_FLAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9+_@-]*$").expect("use flag regex is valid")
});

static SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_.-]*$").expect("slot regex is valid")
});

static REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").expect("repo regex is valid")
});

/// Grammar switches for dialects that predate some atom features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomOptions {
    /// Accept `(+)` / `(-)` defaults on use deps
    pub use_defaults: bool,
    /// Accept `::repo` pins
    pub repo_pins: bool,
    /// Accept `:=` / `:*` slot operators and subslots
    pub slot_operators: bool,
}

impl Default for AtomOptions {
    fn default() -> Self {
        Self {
            use_defaults: true,
            repo_pins: true,
            slot_operators: true,
        }
    }
}

impl AtomOptions {
    /// Plain slots and use deps only
    pub fn strict() -> Self {
        Self {
            use_defaults: false,
            repo_pins: false,
            slot_operators: false,
        }
    }
}

/// Blocker strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blocker {
    /// `!`: may be resolved by uninstalling the blocked package afterwards
    Weak,
    /// `!!`: the blocked package must never coexist
    Strong,
}

impl Blocker {
    pub fn as_prefix(&self) -> &'static str {
        match self {
            Self::Weak => "!",
            Self::Strong => "!!",
        }
    }
}

/// Slot operator for rebuild tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotOperator {
    /// `=`: rebuild when the slot/subslot changes
    Equal,
    /// `*`: any slot, ignore changes
    Star,
}

/// Slot part of an atom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotDep {
    pub slot: Option<String>,
    pub subslot: Option<String>,
    pub op: Option<SlotOperator>,
}

impl SlotDep {
    fn parse(atom: &str, s: &str, options: &AtomOptions) -> Result<Self> {
        let (body, op) = if let Some(body) = s.strip_suffix('=') {
            (body, Some(SlotOperator::Equal))
        } else if let Some(body) = s.strip_suffix('*') {
            (body, Some(SlotOperator::Star))
        } else {
            (s, None)
        };

        if op.is_some() && !options.slot_operators {
            return Err(Error::malformed_atom(atom, "slot operators are not enabled"));
        }
        if op == Some(SlotOperator::Star) && !body.is_empty() {
            return Err(Error::malformed_atom(atom, "':*' cannot name a slot"));
        }
        if body.is_empty() {
            if op.is_none() {
                return Err(Error::malformed_atom(atom, "empty slot"));
            }
            return Ok(Self {
                slot: None,
                subslot: None,
                op,
            });
        }

        let (slot, subslot) = match body.split_once('/') {
            Some((slot, subslot)) => {
                if !options.slot_operators {
                    return Err(Error::malformed_atom(atom, "subslots are not enabled"));
                }
                (slot, Some(subslot))
            }
            None => (body, None),
        };
        if !SLOT_RE.is_match(slot) {
            return Err(Error::malformed_atom(atom, format!("invalid slot '{}'", slot)));
        }
        if let Some(subslot) = subslot
            && !SLOT_RE.is_match(subslot)
        {
            return Err(Error::malformed_atom(
                atom,
                format!("invalid subslot '{}'", subslot),
            ));
        }

        Ok(Self {
            slot: Some(slot.to_string()),
            subslot: subslot.map(str::to_string),
            op,
        })
    }
}

impl fmt::Display for SlotDep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(slot) = &self.slot {
            write!(f, "{}", slot)?;
        }
        if let Some(subslot) = &self.subslot {
            write!(f, "/{}", subslot)?;
        }
        match self.op {
            Some(SlotOperator::Equal) => write!(f, "="),
            Some(SlotOperator::Star) => write!(f, "*"),
            None => Ok(()),
        }
    }
}

/// What a use dependency requires of a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseDepKind {
    /// `flag`
    Enabled,
    /// `-flag`
    Disabled,
    /// `flag?`: enabled if enabled on the depending package
    IfEnabled,
    /// `!flag?`: disabled if disabled on the depending package
    IfDisabled,
    /// `flag=`: same state as on the depending package
    Equal,
    /// `!flag=`: opposite state to the depending package
    NotEqual,
}

impl UseDepKind {
    /// Conditional kinds need the depending package's flags to mean anything
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Self::Enabled | Self::Disabled)
    }
}

/// Behavior when the target package lacks the flag in IUSE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseDefault {
    /// `(+)`
    Enabled,
    /// `(-)`
    Disabled,
}

/// One entry of an atom's `[...]` use-dependency list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UseDep {
    pub flag: String,
    pub kind: UseDepKind,
    pub default: Option<UseDefault>,
}

impl UseDep {
    pub fn new(flag: impl Into<String>, kind: UseDepKind) -> Self {
        Self {
            flag: flag.into(),
            kind,
            default: None,
        }
    }

    fn parse(atom: &str, token: &str, options: &AtomOptions) -> Result<Self> {
        let (negated, body) = match token.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let (disabled, body) = match body.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        let (kind, body) = if let Some(body) = body.strip_suffix('?') {
            (
                if negated {
                    UseDepKind::IfDisabled
                } else {
                    UseDepKind::IfEnabled
                },
                body,
            )
        } else if let Some(body) = body.strip_suffix('=') {
            (
                if negated {
                    UseDepKind::NotEqual
                } else {
                    UseDepKind::Equal
                },
                body,
            )
        } else if negated {
            return Err(Error::malformed_atom(
                atom,
                format!("'!' use dep '{}' must end in '?' or '='", token),
            ));
        } else if disabled {
            (UseDepKind::Disabled, body)
        } else {
            (UseDepKind::Enabled, body)
        };

        if disabled && kind != UseDepKind::Disabled {
            return Err(Error::malformed_atom(
                atom,
                format!("'-' cannot be combined with a conditional in '{}'", token),
            ));
        }

        let (flag, default) = if let Some(flag) = body.strip_suffix("(+)") {
            (flag, Some(UseDefault::Enabled))
        } else if let Some(flag) = body.strip_suffix("(-)") {
            (flag, Some(UseDefault::Disabled))
        } else {
            (body, None)
        };

        if default.is_some() && !options.use_defaults {
            return Err(Error::malformed_atom(atom, "use dep defaults are not enabled"));
        }
        if !USE_FLAG_RE.is_match(flag) {
            return Err(Error::malformed_atom(
                atom,
                format!("invalid use flag '{}'", token),
            ));
        }

        Ok(Self {
            flag: flag.to_string(),
            kind,
            default,
        })
    }

    /// State of the flag on `pkg`, falling back to the declared default
    fn flag_state(&self, pkg: &Package) -> Option<bool> {
        if pkg.iuse.contains(&self.flag) {
            Some(pkg.use_flags.contains(&self.flag))
        } else {
            self.default.map(|d| d == UseDefault::Enabled)
        }
    }

    /// Conditional kinds are unconstrained until evaluated
    pub fn matches(&self, pkg: &Package) -> bool {
        match self.kind {
            UseDepKind::Enabled => self.flag_state(pkg) == Some(true),
            UseDepKind::Disabled => self.flag_state(pkg) == Some(false),
            _ => true,
        }
    }

    /// Turn a conditional use dep into a concrete one given the depending
    /// package's enabled flags; `None` means the dep falls away
    pub fn evaluate(&self, flags: &HashSet<String>) -> Option<UseDep> {
        let enabled = flags.contains(&self.flag);
        let kind = match self.kind {
            UseDepKind::Enabled | UseDepKind::Disabled => self.kind,
            UseDepKind::IfEnabled if enabled => UseDepKind::Enabled,
            UseDepKind::IfEnabled => return None,
            UseDepKind::IfDisabled if !enabled => UseDepKind::Disabled,
            UseDepKind::IfDisabled => return None,
            UseDepKind::Equal if enabled => UseDepKind::Enabled,
            UseDepKind::Equal => UseDepKind::Disabled,
            UseDepKind::NotEqual if enabled => UseDepKind::Disabled,
            UseDepKind::NotEqual => UseDepKind::Enabled,
        };
        Some(UseDep {
            flag: self.flag.clone(),
            kind,
            default: self.default,
        })
    }
}

impl fmt::Display for UseDep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, suffix) = match self.kind {
            UseDepKind::Enabled => ("", ""),
            UseDepKind::Disabled => ("-", ""),
            UseDepKind::IfEnabled => ("", "?"),
            UseDepKind::IfDisabled => ("!", "?"),
            UseDepKind::Equal => ("", "="),
            UseDepKind::NotEqual => ("!", "="),
        };
        let default = match self.default {
            Some(UseDefault::Enabled) => "(+)",
            Some(UseDefault::Disabled) => "(-)",
            None => "",
        };
        write!(f, "{}{}{}{}", prefix, self.flag, default, suffix)
    }
}

/// A parsed package constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub blocker: Option<Blocker>,
    pub category: String,
    pub package: String,
    pub version: Option<VersionConstraint>,
    pub slot: Option<SlotDep>,
    pub repo: Option<String>,
    pub use_deps: Vec<UseDep>,
}

impl Atom {
    /// Parse with every grammar feature enabled
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, AtomOptions::default())
    }

    /// Parse under the given grammar options
    pub fn parse_with(text: &str, options: AtomOptions) -> Result<Self> {
        let mut rest = text;

        let blocker = if let Some(r) = rest.strip_prefix("!!") {
            rest = r;
            Some(Blocker::Strong)
        } else if let Some(r) = rest.strip_prefix('!') {
            rest = r;
            Some(Blocker::Weak)
        } else {
            None
        };

        let (op, r) = VersionOp::strip_prefix(rest);
        rest = r;
        if rest.starts_with(['!', '<', '>', '=', '~']) {
            return Err(Error::malformed_atom(text, "invalid operator prefix"));
        }

        let mut use_deps = Vec::new();
        if let Some(open) = rest.find('[') {
            let Some(body) = rest[open + 1..].strip_suffix(']') else {
                return Err(Error::malformed_atom(text, "unterminated use dependency"));
            };
            if body.is_empty() {
                return Err(Error::malformed_atom(text, "empty use dependency"));
            }
            let mut seen = HashSet::new();
            for token in body.split(',') {
                let dep = UseDep::parse(text, token, &options)?;
                if !seen.insert(dep.flag.clone()) {
                    return Err(Error::malformed_atom(
                        text,
                        format!("use flag '{}' listed twice", dep.flag),
                    ));
                }
                use_deps.push(dep);
            }
            rest = &rest[..open];
        } else if rest.contains(']') {
            return Err(Error::malformed_atom(text, "stray ']'"));
        }

        let mut repo = None;
        if let Some(idx) = rest.find("::") {
            if !options.repo_pins {
                return Err(Error::malformed_atom(text, "repository pins are not enabled"));
            }
            let name = &rest[idx + 2..];
            if !REPO_RE.is_match(name) {
                return Err(Error::malformed_atom(
                    text,
                    format!("invalid repository '{}'", name),
                ));
            }
            repo = Some(name.to_string());
            rest = &rest[..idx];
        }

        let mut slot = None;
        if let Some(idx) = rest.find(':') {
            let body = &rest[idx + 1..];
            if body.contains(':') {
                return Err(Error::malformed_atom(text, "more than one ':' separator"));
            }
            slot = Some(SlotDep::parse(text, body, &options)?);
            rest = &rest[..idx];
        }

        let (cpv, version) = match op {
            Some(op) => {
                let (cpv_text, glob) = match rest.strip_suffix('*') {
                    Some(stripped) => (stripped, true),
                    None => (rest, false),
                };
                if glob && op != VersionOp::Equal {
                    return Err(Error::malformed_atom(text, "'*' is only valid with '='"));
                }
                let cpv = Cpv::parse_versioned(cpv_text)
                    .map_err(|e| Error::malformed_atom(text, e.to_string()))?;
                let version = cpv.version.clone().ok_or_else(|| {
                    Error::malformed_atom(text, "operator without version")
                })?;
                if op == VersionOp::Approx && version.revision().is_some() {
                    return Err(Error::malformed_atom(text, "'~' does not take a revision"));
                }
                let constraint = if glob {
                    VersionConstraint::glob(version)
                } else {
                    VersionConstraint::new(op, version)
                };
                (cpv, Some(constraint))
            }
            None => {
                if rest.ends_with('*') {
                    return Err(Error::malformed_atom(text, "'*' requires '='"));
                }
                let cpv = Cpv::parse_unversioned(rest)
                    .map_err(|e| Error::malformed_atom(text, e.to_string()))?;
                (cpv, None)
            }
        };

        Ok(Self {
            blocker,
            category: cpv.category,
            package: cpv.package,
            version,
            slot,
            repo,
            use_deps,
        })
    }

    /// Unversioned atom for a package key
    pub fn from_key(category: &str, package: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}", category, package))
    }

    /// `category/package`
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }

    /// `category/package[-version]` without operator or decorations
    pub fn cpvstr(&self) -> String {
        match &self.version {
            Some(c) => format!("{}/{}-{}", self.category, self.package, c.version),
            None => self.key(),
        }
    }

    pub fn is_blocker(&self) -> bool {
        self.blocker.is_some()
    }

    /// No version, slot, use, repo or blocker decorations
    pub fn is_simple(&self) -> bool {
        self.blocker.is_none()
            && self.version.is_none()
            && self.slot.is_none()
            && self.repo.is_none()
            && self.use_deps.is_empty()
    }

    /// The same atom with the blocker prefix dropped
    pub fn unblocked(&self) -> Self {
        Self {
            blocker: None,
            ..self.clone()
        }
    }

    /// Resolve conditional use deps against the depending package's flags
    pub fn evaluate_conditionals(&self, flags: &HashSet<String>) -> Self {
        if !self.use_deps.iter().any(|d| d.kind.is_conditional()) {
            return self.clone();
        }
        Self {
            use_deps: self
                .use_deps
                .iter()
                .filter_map(|d| d.evaluate(flags))
                .collect(),
            ..self.clone()
        }
    }

    /// Whether some package could satisfy both atoms
    ///
    /// Decided per restriction kind without enumerating packages. Blocker
    /// prefixes are ignored: `!a/b` intersects whatever `a/b` intersects.
    pub fn intersects(&self, other: &Atom) -> bool {
        if self.category != other.category || self.package != other.package {
            return false;
        }

        if let (Some(a), Some(b)) = (&self.version, &other.version)
            && !a.intersects(b)
        {
            return false;
        }

        if let (Some(a), Some(b)) = (&self.slot, &other.slot) {
            if let (Some(sa), Some(sb)) = (&a.slot, &b.slot)
                && sa != sb
            {
                return false;
            }
            if let (Some(sa), Some(sb)) = (&a.subslot, &b.subslot)
                && sa != sb
            {
                return false;
            }
        }

        if let (Some(a), Some(b)) = (&self.repo, &other.repo)
            && a != b
        {
            return false;
        }

        let mut required: BTreeMap<&str, bool> = BTreeMap::new();
        for dep in self.use_deps.iter().chain(other.use_deps.iter()) {
            let want = match dep.kind {
                UseDepKind::Enabled => true,
                UseDepKind::Disabled => false,
                _ => continue,
            };
            if let Some(prev) = required.insert(&dep.flag, want)
                && prev != want
            {
                return false;
            }
        }

        true
    }
}

impl Matchable for Atom {
    fn matches(&self, pkg: &Package) -> bool {
        self.restrictions().iter().all(|r| r.matches(pkg))
    }

    fn restrictions(&self) -> Vec<Restriction> {
        let mut restrictions = vec![
            Restriction::Category(self.category.clone()),
            Restriction::Package(self.package.clone()),
        ];
        if let Some(version) = &self.version {
            restrictions.push(Restriction::Version(version.clone()));
        }
        if let Some(slot) = &self.slot
            && (slot.slot.is_some() || slot.subslot.is_some())
        {
            restrictions.push(Restriction::Slot {
                slot: slot.slot.clone(),
                subslot: slot.subslot.clone(),
            });
        }
        for dep in &self.use_deps {
            if !dep.kind.is_conditional() {
                restrictions.push(Restriction::Use(dep.clone()));
            }
        }
        if let Some(repo) = &self.repo {
            restrictions.push(Restriction::Repo(repo.clone()));
        }
        restrictions
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(blocker) = self.blocker {
            write!(f, "{}", blocker.as_prefix())?;
        }
        match &self.version {
            Some(c) => {
                write!(f, "{}{}/{}-{}", c.op, self.category, self.package, c.version)?;
                if c.glob {
                    write!(f, "*")?;
                }
            }
            None => write!(f, "{}/{}", self.category, self.package)?,
        }
        if let Some(slot) = &self.slot {
            write!(f, ":{}", slot)?;
        }
        if let Some(repo) = &self.repo {
            write!(f, "::{}", repo)?;
        }
        if !self.use_deps.is_empty() {
            let deps: Vec<String> = self.use_deps.iter().map(ToString::to_string).collect();
            write!(f, "[{}]", deps.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for Atom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Atom {
        Atom::parse(s).unwrap()
    }

    fn pkg() -> Package {
        Package::new("dev-libs/openssl-3.0.13-r1")
            .unwrap()
            .with_slot("0")
            .with_subslot("3")
            .with_repo("gentoo")
            .with_iuse(["ssl", "static", "test"])
            .with_use(["ssl"])
    }

    #[test]
    fn test_atom_parse_simple() {
        let a = atom("dev-libs/openssl");
        assert!(a.is_simple());
        assert_eq!(a.key(), "dev-libs/openssl");
        assert_eq!(a.to_string(), "dev-libs/openssl");
    }

    #[test]
    fn test_atom_parse_full() {
        let a = atom("!!>=dev-libs/openssl-3.0_rc1-r2:0/3=::gentoo[ssl,-static,test?,!doc=,foo(+)]");
        assert_eq!(a.blocker, Some(Blocker::Strong));
        let version = a.version.as_ref().unwrap();
        assert_eq!(version.op, VersionOp::GreaterOrEqual);
        assert_eq!(version.version.to_string(), "3.0_rc1-r2");
        let slot = a.slot.as_ref().unwrap();
        assert_eq!(slot.slot.as_deref(), Some("0"));
        assert_eq!(slot.subslot.as_deref(), Some("3"));
        assert_eq!(slot.op, Some(SlotOperator::Equal));
        assert_eq!(a.repo.as_deref(), Some("gentoo"));
        assert_eq!(a.use_deps.len(), 5);
        assert_eq!(a.use_deps[3].kind, UseDepKind::NotEqual);
        assert_eq!(a.use_deps[4].default, Some(UseDefault::Enabled));
    }

    #[test]
    fn test_atom_roundtrip() {
        for s in [
            "app-misc/foo",
            "=app-misc/foo-1.0",
            "~app-misc/foo-1.0",
            "=app-misc/foo-1.2*",
            "<app-misc/foo-2:1",
            "!app-misc/foo:=",
            "!!app-misc/foo:*",
            ">=app-misc/foo-1.0-r3:2/2.1::overlay[a,-b,c?,!d?,e=,!f=,g(-)]",
        ] {
            assert_eq!(atom(s).to_string(), s);
        }
    }

    #[test]
    fn test_atom_r0_normalized() {
        assert_eq!(atom("=app-misc/foo-1.0-r0").to_string(), "=app-misc/foo-1.0");
    }

    #[test]
    fn test_atom_parse_errors() {
        for bad in [
            "",
            "foo",
            "app-misc/foo-1.0",
            ">=app-misc/foo",
            "<>app-misc/foo-1",
            ">=app-misc/foo-1*",
            "app-misc/foo:",
            "app-misc/foo:1:2",
            "app-misc/foo[ssl",
            "app-misc/foo[]",
            "app-misc/foo[-ssl?]",
            "app-misc/foo[!ssl]",
            "app-misc/foo[+ssl]",
            "app-misc/foo[ssl,ssl]",
            "app-misc/foo::",
            "~app-misc/foo-1.0-r1",
        ] {
            assert!(Atom::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_atom_strict_options() {
        let strict = AtomOptions::strict();
        assert!(Atom::parse_with("app-misc/foo:1", strict).is_ok());
        assert!(Atom::parse_with("app-misc/foo[ssl(+)]", strict).is_err());
        assert!(Atom::parse_with("app-misc/foo::repo", strict).is_err());
        assert!(Atom::parse_with("app-misc/foo:=", strict).is_err());
        assert!(Atom::parse_with("app-misc/foo:1/2", strict).is_err());
    }

    #[test]
    fn test_atom_match_conjunction() {
        let p = pkg();
        let full = atom(">=dev-libs/openssl-3.0:0/3::gentoo[ssl,-static]");
        assert!(full.matches(&p));

        for violating in [
            ">=dev-libs/openssh-3.0:0/3::gentoo[ssl,-static]",
            ">=sys-libs/openssl-3.0:0/3::gentoo[ssl,-static]",
            ">=dev-libs/openssl-3.1:0/3::gentoo[ssl,-static]",
            ">=dev-libs/openssl-3.0:1/3::gentoo[ssl,-static]",
            ">=dev-libs/openssl-3.0:0/4::gentoo[ssl,-static]",
            ">=dev-libs/openssl-3.0:0/3::other[ssl,-static]",
            ">=dev-libs/openssl-3.0:0/3::gentoo[-ssl,-static]",
        ] {
            assert!(!atom(violating).matches(&p), "{violating} should not match");
        }
    }

    #[test]
    fn test_atom_use_defaults() {
        let p = pkg();
        assert!(!atom("dev-libs/openssl[missing]").matches(&p));
        assert!(atom("dev-libs/openssl[missing(+)]").matches(&p));
        assert!(atom("dev-libs/openssl[-missing(-)]").matches(&p));
    }

    #[test]
    fn test_atom_restrictions_deterministic() {
        let a = atom("=dev-libs/openssl-3*:0[ssl,test?]");
        let first = a.restrictions();
        assert_eq!(first, a.restrictions());
        // conditional use deps are not restrictions until evaluated
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_atom_evaluate_conditionals() {
        let a = atom("app-misc/foo[a?,!b?,c=,!d=]");
        let flags: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        let evaluated = a.evaluate_conditionals(&flags);
        assert_eq!(evaluated.to_string(), "app-misc/foo[a,-b,c,d]");
    }

    #[test]
    fn test_glob_atoms_equal_only_when_text_matches() {
        let short = atom("=app/b-1.01*");
        let long = atom("=app/b-1.010*");
        let candidate = Package::new("app/b-1.012").unwrap();
        assert!(short.matches(&candidate));
        assert!(!long.matches(&candidate));
        assert_ne!(short, long);
        assert_eq!(atom("=app/b-1.01"), atom("=app/b-1.010"));
    }

    #[test]
    fn test_atom_intersects() {
        assert!(atom(">=a/b-1").intersects(&atom("<a/b-2")));
        assert!(!atom(">=a/b-2").intersects(&atom("<a/b-2")));
        assert!(!atom("a/b").intersects(&atom("a/c")));
        assert!(atom("a/b:1").intersects(&atom("a/b")));
        assert!(!atom("a/b:1").intersects(&atom("a/b:2")));
        assert!(!atom("a/b[ssl]").intersects(&atom("a/b[-ssl]")));
        assert!(atom("a/b[ssl]").intersects(&atom("a/b[static]")));
        assert!(!atom("a/b::x").intersects(&atom("a/b::y")));
        assert!(atom("!a/b").intersects(&atom("=a/b-1")));
    }
}
