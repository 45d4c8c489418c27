// src/atom/cpv.rs

//! Category/package/version triples
//!
//! A CPV names one concrete package build (`dev-libs/openssl-3.0.13-r1`) or,
//! without a version, a package key (`dev-libs/openssl`).

use crate::error::{Error, Result};
use crate::version::Version;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_.-]*$").expect("category regex is valid")
});

static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_-]*$").expect("package regex is valid")
});

/// Validate a category name
pub fn valid_category(category: &str) -> bool {
    CATEGORY_RE.is_match(category)
}

/// Validate a package name
///
/// Names must not end in a hyphen followed by something that parses as a
/// version, otherwise `foo-1` would be ambiguous with `foo` at version 1.
pub fn valid_package(package: &str) -> bool {
    if !PACKAGE_RE.is_match(package) {
        return false;
    }
    !package
        .match_indices('-')
        .any(|(idx, _)| Version::parse(&package[idx + 1..]).is_ok())
}

/// A category/package pair with an optional version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cpv {
    pub category: String,
    pub package: String,
    pub version: Option<Version>,
}

impl Cpv {
    /// Parse `category/package-version`; the version is required
    pub fn parse_versioned(s: &str) -> Result<Self> {
        let (category, rest) = split_category(s)?;

        // Find the hyphen where a valid package name meets a valid version
        for (idx, _) in rest.match_indices('-') {
            let (package, version) = (&rest[..idx], &rest[idx + 1..]);
            if let Ok(version) = Version::parse(version)
                && valid_package(package)
            {
                return Ok(Self {
                    category: category.to_string(),
                    package: package.to_string(),
                    version: Some(version),
                });
            }
        }

        Err(Error::malformed_atom(s, "missing or invalid version"))
    }

    /// Parse a bare `category/package` key
    pub fn parse_unversioned(s: &str) -> Result<Self> {
        let (category, package) = split_category(s)?;
        if !valid_package(package) {
            return Err(Error::malformed_atom(
                s,
                format!("invalid package name '{}' (versioned atoms need an operator)", package),
            ));
        }
        Ok(Self {
            category: category.to_string(),
            package: package.to_string(),
            version: None,
        })
    }

    /// `category/package`
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }

    /// Full version including revision, if versioned
    pub fn fullver(&self) -> Option<String> {
        self.version.as_ref().map(Version::fullver)
    }
}

fn split_category(s: &str) -> Result<(&str, &str)> {
    let (category, package) = s
        .split_once('/')
        .ok_or_else(|| Error::malformed_atom(s, "missing category separator"))?;
    if !valid_category(category) {
        return Err(Error::malformed_atom(
            s,
            format!("invalid category '{}'", category),
        ));
    }
    if package.contains('/') {
        return Err(Error::malformed_atom(s, "more than one '/'"));
    }
    Ok((category, package))
}

impl fmt::Display for Cpv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.package)?;
        if let Some(version) = &self.version {
            write!(f, "-{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for Cpv {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_versioned(s)
    }
}
