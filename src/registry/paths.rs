// src/registry/paths.rs

//! Canonical record paths. Every registry read or write goes through these helpers
//! so the publish pipeline and the resolution pipeline address the same records.

use super::escape_key;

/// `recipes/<type>/<scope>/<name>`
pub fn recipe_root(recipe_type: &str, scope: &str, name: &str) -> String {
    format!("recipes/{}/{}/{}", recipe_type, scope, name)
}

/// `recipes/<type>/<scope>/<name>/info`
pub fn recipe_info(recipe_type: &str, scope: &str, name: &str) -> String {
    format!("{}/info", recipe_root(recipe_type, scope, name))
}

/// `recipes/<type>/<scope>/<name>/versions/<escapedVersion>`
pub fn recipe_version(recipe_type: &str, scope: &str, name: &str, version: &str) -> String {
    format!(
        "{}/versions/{}",
        recipe_root(recipe_type, scope, name),
        escape_key(version)
    )
}

/// `recipes/<type>/<scope>/<name>/versionsInfo`
pub fn versions_info(recipe_type: &str, scope: &str, name: &str) -> String {
    format!("{}/versionsInfo", recipe_root(recipe_type, scope, name))
}

/// `recipes/<type>/<scope>/<name>/collaborators/<userId>`
pub fn collaborator(recipe_type: &str, scope: &str, name: &str, user_id: &str) -> String {
    format!(
        "{}/collaborators/{}",
        recipe_root(recipe_type, scope, name),
        escape_key(user_id)
    )
}

/// `publishKeys/<key>`
pub fn publish_key(key: &str) -> String {
    format!("publishKeys/{}", escape_key(key))
}

/// `users/<userId>`
pub fn user(user_id: &str) -> String {
    format!("users/{}", escape_key(user_id))
}

/// `indexes/usernameToUserId/<username>`
pub fn username_index(username: &str) -> String {
    format!("indexes/usernameToUserId/{}", escape_key(username))
}

/// `indexes/emailToUserId/<email>`
pub fn email_index(email: &str) -> String {
    format!("indexes/emailToUserId/{}", escape_key(&email.to_lowercase()))
}
