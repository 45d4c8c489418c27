// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! Versions follow the source-package grammar:
//!
//! ```text
//! [cvs.]1.2.3[a-z][_alpha|_beta|_pre|_rc|_p[N]]...[-rN]
//! ```
//!
//! Comparison is done by [`ver_cmp`], which works on the textual version plus
//! an integer revision. [`Version`] wraps a validated version string and
//! implements `Ord`, `Eq` and `Hash` consistently with `ver_cmp`.

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(cvs\.)?\d+(\.\d+)*[a-z]?(_(alpha|beta|pre|rc|p)\d*)*$")
        .expect("version grammar regex is valid")
});

/// Ordinal of a version suffix keyword; "no suffix" sits at 0
fn suffix_value(kind: &str) -> i8 {
    match kind {
        "alpha" => -4,
        "beta" => -3,
        "pre" => -2,
        "rc" => -1,
        "p" => 1,
        _ => 0,
    }
}

/// Split a suffix token like `rc2` into its keyword and numeric remainder
fn split_suffix(token: &str) -> (&str, &str) {
    for kind in ["alpha", "beta", "pre", "rc", "p"] {
        if let Some(rest) = token.strip_prefix(kind)
            && rest.bytes().all(|b| b.is_ascii_digit())
        {
            return (kind, rest);
        }
    }
    (token, "")
}

/// Compare two digit strings as unbounded non-negative integers
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two dotted components; zero-led components compare as decimals
fn cmp_component(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if !a.starts_with('0') && !b.starts_with('0') {
        cmp_digits(a, b)
    } else {
        // "0." + component as a real number: drop trailing zeros, compare text
        a.trim_end_matches('0').cmp(b.trim_end_matches('0'))
    }
}

/// Compare the numeric remainder of two suffix tokens (absent digits are 0)
fn cmp_suffix_number(a: &str, b: &str) -> Ordering {
    cmp_digits(a, b)
}

/// Compare two version strings plus revisions
///
/// Absent revisions are treated as revision 0. The comparator assumes both
/// versions already passed grammar validation.
pub fn ver_cmp(ver1: &str, rev1: Option<u64>, ver2: &str, rev2: Option<u64>) -> Ordering {
    let rev1 = rev1.unwrap_or(0);
    let rev2 = rev2.unwrap_or(0);

    if ver1 == ver2 {
        return rev1.cmp(&rev2);
    }

    let mut parts1 = ver1.split('_');
    let mut parts2 = ver2.split('_');
    let main1 = parts1.next().unwrap_or("");
    let main2 = parts2.next().unwrap_or("");

    if main1 != main2 {
        let mut comps1: Vec<&str> = main1.split('.').collect();
        let mut comps2: Vec<&str> = main2.split('.').collect();

        let cvs1 = comps1.first() == Some(&"cvs");
        let cvs2 = comps2.first() == Some(&"cvs");
        match (cvs1, cvs2) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (true, true) => {
                comps1.remove(0);
                comps2.remove(0);
            }
            (false, false) => {}
        }

        let letter1 = strip_letter(&mut comps1);
        let letter2 = strip_letter(&mut comps2);

        for (c1, c2) in comps1.iter().zip(comps2.iter()) {
            match cmp_component(c1, c2) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match comps1.len().cmp(&comps2.len()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match letter1.cmp(&letter2) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    let suffixes1: Vec<&str> = parts1.collect();
    let suffixes2: Vec<&str> = parts2.collect();
    let longest = suffixes1.len().max(suffixes2.len());

    for idx in 0..longest {
        match (suffixes1.get(idx), suffixes2.get(idx)) {
            (None, Some(other)) => {
                let (kind, num) = split_suffix(other);
                let val = suffix_value(kind);
                if val != 0 {
                    return 0.cmp(&val);
                }
                return cmp_suffix_number("0", num);
            }
            (Some(own), None) => {
                let (kind, num) = split_suffix(own);
                let val = suffix_value(kind);
                if val != 0 {
                    return val.cmp(&0);
                }
                return cmp_suffix_number(num, "0");
            }
            (Some(s1), Some(s2)) if s1 != s2 => {
                let (kind1, num1) = split_suffix(s1);
                let (kind2, num2) = split_suffix(s2);
                match suffix_value(kind1).cmp(&suffix_value(kind2)) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
                match cmp_suffix_number(num1, num2) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
            _ => {}
        }
    }

    rev1.cmp(&rev2)
}

/// Pull a single trailing letter off the final component
fn strip_letter(comps: &mut [&str]) -> Option<u8> {
    let last = comps.last_mut()?;
    let byte = *last.as_bytes().last()?;
    if byte.is_ascii_alphabetic() {
        *last = &last[..last.len() - 1];
        Some(byte)
    } else {
        None
    }
}

/// A validated package version with optional revision
#[derive(Debug, Clone)]
pub struct Version {
    base: String,
    revision: Option<u64>,
}

impl Version {
    /// Parse a version string such as `1.2.3b_rc1-r2`
    ///
    /// A `-r0` revision is normalized away: `1.0-r0` parses to the same
    /// value (and renders the same) as `1.0`.
    pub fn parse(s: &str) -> Result<Self> {
        let (base, revision) = match s.rsplit_once("-r") {
            Some((base, rev))
                if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let rev: u64 = rev.parse().map_err(|_| Error::InvalidVersion {
                    version: s.to_string(),
                    reason: "revision out of range".to_string(),
                })?;
                (base, if rev == 0 { None } else { Some(rev) })
            }
            _ => (s, None),
        };

        if !VERSION_RE.is_match(base) {
            return Err(Error::InvalidVersion {
                version: s.to_string(),
                reason: "does not match version grammar".to_string(),
            });
        }

        Ok(Self {
            base: base.to_string(),
            revision,
        })
    }

    /// Build a version from an already-validated base and a revision
    pub fn with_revision(&self, revision: Option<u64>) -> Self {
        Self {
            base: self.base.clone(),
            revision: revision.filter(|r| *r != 0),
        }
    }

    /// Version text without the revision
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    /// Version text including a non-zero revision
    pub fn fullver(&self) -> String {
        match self.revision {
            Some(rev) => format!("{}-r{}", self.base, rev),
            None => self.base.clone(),
        }
    }

    /// Compare ignoring revisions
    pub fn cmp_base(&self, other: &Version) -> Ordering {
        ver_cmp(&self.base, None, &other.base, None)
    }

    /// Canonical form used for hashing; equal under `ver_cmp` means equal key
    fn canonical(&self) -> (bool, Vec<(bool, String)>, Option<u8>, Vec<(i8, String)>, u64) {
        let mut parts = self.base.split('_');
        let main = parts.next().unwrap_or("");
        let mut comps: Vec<&str> = main.split('.').collect();
        let cvs = comps.first() == Some(&"cvs");
        if cvs {
            comps.remove(0);
        }
        let letter = strip_letter(&mut comps);
        let comps = comps
            .into_iter()
            .map(|c| {
                if c.starts_with('0') {
                    (true, c.trim_end_matches('0').to_string())
                } else {
                    (false, c.to_string())
                }
            })
            .collect();
        let suffixes = parts
            .map(|s| {
                let (kind, num) = split_suffix(s);
                (suffix_value(kind), num.trim_start_matches('0').to_string())
            })
            .collect();
        (cvs, comps, letter, suffixes, self.revision.unwrap_or(0))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(rev) = self.revision {
            write!(f, "-r{}", rev)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        ver_cmp(&self.base, self.revision, &other.base, other.revision)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

/// Version comparison operators usable in atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionOp {
    Less,
    LessOrEqual,
    Equal,
    /// `~`: same version, any revision
    Approx,
    GreaterOrEqual,
    Greater,
}

impl VersionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "=",
            Self::Approx => "~",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
        }
    }

    /// Split a leading operator off atom text; longer operators first
    pub fn strip_prefix(s: &str) -> (Option<Self>, &str) {
        for (token, op) in [
            ("<=", Self::LessOrEqual),
            (">=", Self::GreaterOrEqual),
            ("<", Self::Less),
            (">", Self::Greater),
            ("=", Self::Equal),
            ("~", Self::Approx),
        ] {
            if let Some(rest) = s.strip_prefix(token) {
                return (Some(op), rest);
            }
        }
        (None, s)
    }
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end of a version interval
#[derive(Debug, Clone)]
enum Bound {
    Unbounded,
    Inclusive(Version),
    Exclusive(Version),
}

impl Bound {
    fn version(&self) -> Option<&Version> {
        match self {
            Bound::Unbounded => None,
            Bound::Inclusive(v) | Bound::Exclusive(v) => Some(v),
        }
    }

    fn is_inclusive(&self) -> bool {
        matches!(self, Bound::Inclusive(_))
    }
}

/// The tighter of two lower bounds
fn max_lower(a: Bound, b: Bound) -> Bound {
    match (a.version(), b.version()) {
        (None, _) => b,
        (_, None) => a,
        (Some(va), Some(vb)) => match va.cmp(vb) {
            Ordering::Greater => a,
            Ordering::Less => b,
            Ordering::Equal if a.is_inclusive() => b,
            Ordering::Equal => a,
        },
    }
}

/// The tighter of two upper bounds
fn min_upper(a: Bound, b: Bound) -> Bound {
    match (a.version(), b.version()) {
        (None, _) => b,
        (_, None) => a,
        (Some(va), Some(vb)) => match va.cmp(vb) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal if a.is_inclusive() => b,
            Ordering::Equal => a,
        },
    }
}

/// A version restriction: operator, version and optional trailing glob
///
/// Glob constraints compare by version text, since `=1.01*` and `=1.010*`
/// accept different packages even though `1.01` and `1.010` are equal.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    pub op: VersionOp,
    pub version: Version,
    /// `=cat/pkg-1.2*`: string-prefix match on the full version
    pub glob: bool,
}

impl VersionConstraint {
    pub fn new(op: VersionOp, version: Version) -> Self {
        Self {
            op,
            version,
            glob: false,
        }
    }

    pub fn glob(version: Version) -> Self {
        Self {
            op: VersionOp::Equal,
            version,
            glob: true,
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        if self.glob {
            return version.fullver().starts_with(&self.version.fullver());
        }
        match self.op {
            VersionOp::Less => version < &self.version,
            VersionOp::LessOrEqual => version <= &self.version,
            VersionOp::Equal => version == &self.version,
            VersionOp::Approx => version.cmp_base(&self.version) == Ordering::Equal,
            VersionOp::GreaterOrEqual => version >= &self.version,
            VersionOp::Greater => version > &self.version,
        }
    }

    fn interval(&self) -> (Bound, Bound) {
        let v = self.version.clone();
        match self.op {
            VersionOp::Less => (Bound::Unbounded, Bound::Exclusive(v)),
            VersionOp::LessOrEqual => (Bound::Unbounded, Bound::Inclusive(v)),
            VersionOp::Equal => (Bound::Inclusive(v.clone()), Bound::Inclusive(v)),
            VersionOp::Approx => (
                Bound::Inclusive(v.with_revision(None)),
                Bound::Inclusive(v.with_revision(Some(u64::MAX))),
            ),
            VersionOp::GreaterOrEqual => (Bound::Inclusive(v), Bound::Unbounded),
            VersionOp::Greater => (Bound::Exclusive(v), Bound::Unbounded),
        }
    }

    /// Decide whether some version could satisfy both constraints
    ///
    /// Plain operators intersect by interval overlap. Glob constraints are
    /// decided by prefix reasoning and err on the side of "may intersect".
    pub fn intersects(&self, other: &VersionConstraint) -> bool {
        match (self.glob, other.glob) {
            (true, true) => {
                let a = self.version.fullver();
                let b = other.version.fullver();
                a.starts_with(&b) || b.starts_with(&a)
            }
            (true, false) => glob_intersects(&self.version, other),
            (false, true) => glob_intersects(&other.version, self),
            (false, false) => {
                let (lo1, hi1) = self.interval();
                let (lo2, hi2) = other.interval();
                let lower = max_lower(lo1, lo2);
                let upper = min_upper(hi1, hi2);
                match (lower.version(), upper.version()) {
                    (Some(lv), Some(uv)) => match lv.cmp(uv) {
                        Ordering::Less => true,
                        Ordering::Equal => lower.is_inclusive() && upper.is_inclusive(),
                        Ordering::Greater => false,
                    },
                    _ => true,
                }
            }
        }
    }
}

/// Can a version with textual prefix `prefix` satisfy the plain constraint?
fn glob_intersects(prefix: &Version, other: &VersionConstraint) -> bool {
    let prefix_text = prefix.fullver();
    let other_text = other.version.fullver();
    match other.op {
        VersionOp::Equal => other_text.starts_with(&prefix_text),
        VersionOp::Approx => {
            let base = other.version.base();
            base.starts_with(&prefix_text)
                || prefix_text
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with("-r"))
        }
        VersionOp::Less => prefix < &other.version,
        VersionOp::LessOrEqual => prefix <= &other.version,
        VersionOp::Greater | VersionOp::GreaterOrEqual => {
            other.satisfies(prefix)
                || other_text.starts_with(&prefix_text)
                || can_extend_past(prefix, &other.version)
        }
    }
}

/// Whether appending digits to the last component of `prefix` can exceed `target`
fn can_extend_past(prefix: &Version, target: &Version) -> bool {
    if prefix.revision().is_some() {
        return false;
    }
    let base = prefix.base();
    if base.contains('_') || !base.ends_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    let comps: Vec<&str> = base.split('.').collect();
    let target_main = target.base().split('_').next().unwrap_or("");
    let target_comps: Vec<&str> = target_main.split('.').collect();
    let Some((last, head)) = comps.split_last() else {
        return false;
    };
    if last.starts_with('0') || head.len() >= target_comps.len() {
        return false;
    }
    head.iter()
        .zip(target_comps.iter())
        .all(|(a, b)| cmp_component(a, b) == Ordering::Equal)
}

impl PartialEq for VersionConstraint {
    fn eq(&self, other: &Self) -> bool {
        if self.op != other.op || self.glob != other.glob {
            return false;
        }
        if self.glob {
            self.version.fullver() == other.version.fullver()
        } else {
            self.version == other.version
        }
    }
}

impl Eq for VersionConstraint {}

impl Hash for VersionConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        self.glob.hash(state);
        if self.glob {
            self.version.fullver().hash(state);
        } else {
            self.version.hash(state);
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)?;
        if self.glob {
            write!(f, "*")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn cmp(a: &str, b: &str) -> Ordering {
        v(a).cmp(&v(b))
    }

    #[test]
    fn test_version_parse_with_revision() {
        let ver = v("1.2.3-r4");
        assert_eq!(ver.base(), "1.2.3");
        assert_eq!(ver.revision(), Some(4));
        assert_eq!(ver.to_string(), "1.2.3-r4");
    }

    #[test]
    fn test_version_parse_r0_normalized() {
        let ver = v("1.0-r0");
        assert_eq!(ver.revision(), None);
        assert_eq!(ver.to_string(), "1.0");
        assert_eq!(ver, v("1.0"));
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        for bad in ["", "a1", "1..2", "1.2_foo", "1.2ab", "1.2-r", "1.2_rc1-rx", ".1"] {
            assert!(Version::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_version_compare_numeric_components() {
        assert_eq!(cmp("1.2.3", "1.2.4"), Ordering::Less);
        assert_eq!(cmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(cmp("2", "1.99"), Ordering::Greater);
        assert_eq!(cmp("1.2", "1.2.0"), Ordering::Less);
    }

    #[test]
    fn test_version_compare_zero_prefixed_as_decimal() {
        assert_eq!(cmp("1.1", "1.02"), Ordering::Greater);
        assert_eq!(cmp("1.02", "1.1"), Ordering::Less);
        assert_eq!(cmp("1.01.0", "1.010.0"), Ordering::Equal);
    }

    #[test]
    fn test_version_compare_letters() {
        assert_eq!(cmp("1.0a", "1.0"), Ordering::Greater);
        assert_eq!(cmp("1.0a", "1.0b"), Ordering::Less);
        assert_eq!(cmp("1.0z", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_version_compare_suffix_ordering() {
        let ordered = ["1.0_alpha", "1.0_beta", "1.0_pre", "1.0_rc", "1.0", "1.0_p"];
        for pair in ordered.windows(2) {
            assert_eq!(cmp(pair[0], pair[1]), Ordering::Less, "{:?}", pair);
        }
        assert_eq!(cmp("1.0_rc2", "1.0_rc10"), Ordering::Less);
        assert_eq!(cmp("1.0_alpha", "1.0_alpha0"), Ordering::Equal);
        assert_eq!(cmp("1.0_p1_alpha", "1.0_p1"), Ordering::Less);
    }

    #[test]
    fn test_version_compare_revisions() {
        assert_eq!(cmp("1.0-r1", "1.0-r2"), Ordering::Less);
        assert_eq!(cmp("1.0-r2", "1.0.1"), Ordering::Less);
        assert_eq!(ver_cmp("1.0", None, "1.0", Some(0)), Ordering::Equal);
    }

    #[test]
    fn test_version_compare_cvs_marker() {
        assert_eq!(cmp("cvs.1.0", "9.9"), Ordering::Greater);
        assert_eq!(cmp("1.0", "cvs.0.1"), Ordering::Less);
        assert_eq!(cmp("cvs.1.1", "cvs.1.02"), Ordering::Greater);
    }

    #[test]
    fn test_version_hash_consistent_with_eq() {
        use std::collections::HashSet;
        let set: HashSet<Version> = ["1.01.0", "1.010.0", "1.0-r0", "1.0"]
            .iter()
            .map(|s| v(s))
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_constraint_satisfies() {
        let ge = VersionConstraint::new(VersionOp::GreaterOrEqual, v("1.2"));
        assert!(ge.satisfies(&v("1.2")));
        assert!(ge.satisfies(&v("1.3")));
        assert!(!ge.satisfies(&v("1.1")));

        let approx = VersionConstraint::new(VersionOp::Approx, v("1.2"));
        assert!(approx.satisfies(&v("1.2-r5")));
        assert!(!approx.satisfies(&v("1.2.1")));

        let exact = VersionConstraint::new(VersionOp::Equal, v("1.2"));
        assert!(exact.satisfies(&v("1.2-r0")));
        assert!(!exact.satisfies(&v("1.2-r1")));

        let glob = VersionConstraint::glob(v("1.2"));
        assert!(glob.satisfies(&v("1.2.7")));
        assert!(glob.satisfies(&v("1.20")));
        assert!(!glob.satisfies(&v("1.3")));
    }

    #[test]
    fn test_glob_constraint_equality_is_textual() {
        use std::collections::HashSet;
        let short = VersionConstraint::glob(v("1.01"));
        let long = VersionConstraint::glob(v("1.010"));
        assert_ne!(short, long);
        assert!(short.satisfies(&v("1.012")));
        assert!(!long.satisfies(&v("1.012")));

        let plain: HashSet<VersionConstraint> = ["1.01", "1.010"]
            .iter()
            .map(|s| VersionConstraint::new(VersionOp::Equal, v(s)))
            .collect();
        assert_eq!(plain.len(), 1);
    }

    #[test]
    fn test_constraint_intersects_ranges() {
        let ge = VersionConstraint::new(VersionOp::GreaterOrEqual, v("1.0"));
        let lt = VersionConstraint::new(VersionOp::Less, v("2.0"));
        let lt_one = VersionConstraint::new(VersionOp::Less, v("1.0"));
        let le_one = VersionConstraint::new(VersionOp::LessOrEqual, v("1.0"));
        assert!(ge.intersects(&lt));
        assert!(!ge.intersects(&lt_one));
        assert!(ge.intersects(&le_one));

        let exact = VersionConstraint::new(VersionOp::Equal, v("1.5"));
        assert!(exact.intersects(&ge));
        assert!(exact.intersects(&lt));
        assert!(!exact.intersects(&lt_one));

        let approx = VersionConstraint::new(VersionOp::Approx, v("1.0"));
        let gt_rev = VersionConstraint::new(VersionOp::Greater, v("1.0-r3"));
        assert!(approx.intersects(&gt_rev));
        assert!(!approx.intersects(&VersionConstraint::new(VersionOp::Greater, v("1.0.1"))));
    }

    #[test]
    fn test_constraint_intersects_globs() {
        let glob = VersionConstraint::glob(v("1.2"));
        assert!(glob.intersects(&VersionConstraint::glob(v("1.2.3"))));
        assert!(!glob.intersects(&VersionConstraint::glob(v("1.3"))));
        assert!(glob.intersects(&VersionConstraint::new(VersionOp::Equal, v("1.2.9"))));
        assert!(glob.intersects(&VersionConstraint::new(VersionOp::Greater, v("1.3"))));
        assert!(!glob.intersects(&VersionConstraint::new(VersionOp::Greater, v("2.0"))));
        assert!(!glob.intersects(&VersionConstraint::new(VersionOp::Less, v("1.1"))));
    }

    #[test]
    fn test_constraint_display() {
        assert_eq!(
            VersionConstraint::new(VersionOp::GreaterOrEqual, v("1.2-r1")).to_string(),
            ">=1.2-r1"
        );
        assert_eq!(VersionConstraint::glob(v("3")).to_string(), "=3*");
    }
}
