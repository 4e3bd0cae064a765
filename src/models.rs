// src/models.rs

//! Registry record schemas.
//!
//! Every value read from the registry is decoded into one of these types at the
//! deserialization boundary, so a record with the wrong shape fails immediately
//! with a schema error instead of surfacing later as a missing field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, the timestamp unit used by every record.
pub type Timestamp = u64;

/// Current time as a registry timestamp.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// --- Recipes ---

/// `recipes/<type>/<scope>/<name>/info`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInfo {
    pub name: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub recipe_type: String,
    #[serde(default)]
    pub last_published_version: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// `recipes/<type>/<scope>/<name>/collaborators/<userId>`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    #[serde(default)]
    pub owner: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// `recipes/<type>/<scope>/<name>/versions/<escapedVersion>`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeVersionData {
    pub version: String,
    /// Content hash of the package this record was created for.
    pub hash: String,
    #[serde(default)]
    pub published: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub published_at: Option<Timestamp>,
}

/// `recipes/<type>/<scope>/<name>/versionsInfo`
///
/// `all` is used as a set: keys are escaped version numbers, values the raw ones.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecipeVersionsInfo {
    pub last: String,
    #[serde(default)]
    pub all: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

// --- Publishing ---

/// `publishKeys/<key>`: a single-use credential bound to one package.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishKeyData {
    pub key: String,
    pub recipe_name: String,
    pub recipe_version_number: String,
    pub recipe_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub used_at: Option<Timestamp>,
}

// --- Users ---

/// `users/<userId>`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; carries its own salt and parameters.
    pub password_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The public face of a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
}
