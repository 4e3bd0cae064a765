// src/core/identifier.rs

//! Recipe identifiers, names and version numbers.
//!
//! A recipe identifier is `name` or `name@versionQuery`. The name follows a strict
//! lowercase grammar and published version numbers must be plain semantic versions
//! without leading zeros. Both are validated before anything touches the registry.

use lazy_static::lazy_static;
use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{RECIPE_SCOPE, RECIPE_TYPE};
use crate::core::error::{RecipeError, RecipeResult};

lazy_static! {
    static ref NAME_RE: Regex =
        Regex::new(r"^[a-z]+(?:[a-z0-9-][a-z0-9]+)*$").expect("recipe name regex is valid");
}

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$"
    )
    .expect("semantic version regex is valid");
}

// --- Identifier ---

/// A parsed `name[@versionQuery]` string. An empty `version_query` means
/// "the last published version".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeIdentifier {
    /// The recipe name.
    pub name: String,
    /// The raw version range, possibly empty.
    pub version_query: String,
}

impl RecipeIdentifier {
    /// Splits an identifier on its first `@`.
    pub fn parse(identifier: &str) -> Self {
        match identifier.split_once('@') {
            Some((name, query)) => Self {
                name: name.to_string(),
                version_query: query.to_string(),
            },
            None => Self {
                name: identifier.to_string(),
                version_query: String::new(),
            },
        }
    }

    /// `true` if no version range was given.
    pub fn is_latest(&self) -> bool {
        self.version_query.trim().is_empty()
    }
}

impl fmt::Display for RecipeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version_query.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.version_query)
        }
    }
}

/// A query against the registry. `scope` and `recipe_type` are fixed for now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeQuery {
    /// The recipe name.
    pub name: String,
    /// Registry scope (always `public`).
    pub scope: String,
    /// Recipe type (always `gulp`).
    pub recipe_type: String,
    /// Raw version range, possibly empty.
    pub version_query: String,
}

impl RecipeQuery {
    /// Parses a query string into a full query with the default scope and type.
    pub fn parse(query: &str) -> Self {
        let RecipeIdentifier {
            name,
            version_query,
        } = RecipeIdentifier::parse(query);
        Self {
            name,
            scope: RECIPE_SCOPE.to_string(),
            recipe_type: RECIPE_TYPE.to_string(),
            version_query,
        }
    }
}

// --- Validation ---

/// Checks a recipe name against `^[a-z]+(?:[a-z0-9-][a-z0-9]+)*$`.
pub fn is_valid_recipe_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Checks a version number against the semantic version grammar.
pub fn is_valid_version_number(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

/// Fails with [`RecipeError::RecipeInvalid`] unless `name` is a valid recipe name.
pub fn validate_recipe_name(name: &str) -> RecipeResult<()> {
    if is_valid_recipe_name(name) {
        Ok(())
    } else {
        Err(RecipeError::RecipeInvalid {
            reason: format!(
                "name '{}' must contain only lowercase letters, digits and dashes, and start with a letter",
                name
            ),
        })
    }
}

// --- Version numbers ---

/// A validated semantic version number, keeping the raw string it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeVersionNumber {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Dot-separated pre-release identifiers (empty if none).
    pub prerelease: Vec<String>,
    /// Dot-separated build metadata identifiers (empty if none).
    pub build: Vec<String>,
    /// The string as given.
    pub raw: String,
    /// The canonical `major.minor.patch[-pre][+build]` form.
    pub version: String,
}

impl RecipeVersionNumber {
    /// Validates and parses a version number.
    pub fn parse(raw: &str) -> RecipeResult<Self> {
        let semver = parse_version(raw)?;
        let split = |s: &str| -> Vec<String> {
            if s.is_empty() {
                Vec::new()
            } else {
                s.split('.').map(str::to_string).collect()
            }
        };
        Ok(Self {
            major: semver.major,
            minor: semver.minor,
            patch: semver.patch,
            prerelease: split(semver.pre.as_str()),
            build: split(semver.build.as_str()),
            raw: raw.to_string(),
            version: semver.to_string(),
        })
    }
}

impl fmt::Display for RecipeVersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}

/// Validates `raw` with the semantic version grammar and parses it.
pub fn parse_version(raw: &str) -> RecipeResult<Version> {
    if !is_valid_version_number(raw) {
        return Err(RecipeError::RecipeInvalid {
            reason: format!(
                "version '{}' must be a semantic version (major.minor.patch) without leading zeros",
                raw
            ),
        });
    }
    Version::parse(raw).map_err(|e| RecipeError::RecipeInvalid {
        reason: format!("version '{}': {}", raw, e),
    })
}

/// Parses a version range.
///
/// A bare version (`1.2.3`) means exactly that version; everything else uses the
/// range syntax of the `semver` crate (`^1.0.0`, `~1.2`, `>=1.0, <2.0`, `1.x`, `*`).
pub fn parse_version_query(query: &str) -> RecipeResult<VersionReq> {
    let trimmed = query.trim();
    let normalized = if is_valid_version_number(trimmed) {
        format!("={}", trimmed)
    } else {
        trimmed.to_string()
    };
    VersionReq::parse(&normalized).map_err(|source| RecipeError::InvalidVersionQuery {
        query: query.to_string(),
        source,
    })
}

/// Returns the highest version in `versions` satisfying `query`.
///
/// Entries that are not valid version numbers are skipped with a warning; they can
/// only appear if the registry was written by something other than the publish
/// pipeline.
pub fn max_satisfying<'a, I>(versions: I, query: &VersionReq) -> Option<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter_map(|raw| match Version::parse(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Skipping malformed version '{}' in registry: {}", raw, e);
                None
            }
        })
        .filter(|v| query.matches(v))
        .max()
}
