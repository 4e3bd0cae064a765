// src/controllers/auth.rs

//! Accounts and the login session.
//!
//! Users live in the registry (`users/<userId>`), with username and e-mail
//! indexes pointing back at the id. The session is just `auth.userId` and
//! `auth.email` in the config file of the chosen target.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::core::config::{ConfigController, ConfigError};
use crate::core::identifier::is_valid_recipe_name;
use crate::models::{CurrentUser, UserData, now_millis};
use crate::registry::entity::EntityManager;
use crate::registry::{RegistryError, RegistryStore, paths};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("e-mail regex is valid");
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("You are not logged in.")]
    NotLoggedIn,
    #[error("Invalid e-mail or password.")]
    InvalidCredentials,
    #[error("Username '{0}' is already in use.")]
    UsernameInUse(String),
    #[error("That is already your username.")]
    UsernameUnchanged,
    #[error(
        "Invalid username '{0}'. Use lowercase letters, digits and dashes, starting with a letter."
    )]
    BadUsername(String),
    #[error("E-mail '{0}' is already in use.")]
    EmailInUse(String),
    #[error("That is already your e-mail.")]
    EmailUnchanged,
    #[error("Invalid e-mail address '{0}'.")]
    BadEmail(String),
    #[error("Could not hash the password: {0}")]
    PasswordHash(String),
    #[error("Registry Error: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// `true` if `email` looks like an e-mail address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_username(username: &str) -> AuthResult<()> {
    if is_valid_recipe_name(username) {
        Ok(())
    } else {
        Err(AuthError::BadUsername(username.to_string()))
    }
}

pub(crate) fn validate_email(email: &str) -> AuthResult<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AuthError::BadEmail(email.to_string()))
    }
}

fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|hash| {
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    })
}

/// Runs a password hash off the async workers.
async fn off_runtime<T, F>(work: F) -> AuthResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

pub(crate) fn current_user(id: &str, data: &UserData) -> CurrentUser {
    CurrentUser {
        id: id.to_string(),
        username: data.username.clone(),
        email: data.email.clone(),
    }
}

/// Where accounts are kept and credentials checked.
#[async_trait]
pub trait AuthBackend: Send + Sync + std::fmt::Debug {
    async fn sign_up(&self, username: &str, email: &str, password: &str) -> AuthResult<CurrentUser>;
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<CurrentUser>;
    async fn user(&self, user_id: &str) -> AuthResult<Option<CurrentUser>>;
    /// Moves the user to a free username.
    async fn set_username(&self, user_id: &str, username: &str) -> AuthResult<CurrentUser>;
    /// Moves the user to a free e-mail address.
    async fn set_email(&self, user_id: &str, email: &str) -> AuthResult<CurrentUser>;
}

/// Accounts stored in the recipe registry itself.
#[derive(Debug)]
pub struct RegistryAuthBackend {
    users: EntityManager<UserData>,
}

impl RegistryAuthBackend {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            users: EntityManager::new(store, "users"),
        }
    }

    async fn index_entry(&self, path: &str) -> AuthResult<Option<String>> {
        let snapshot = self.users.store().get(path).await?;
        Ok(snapshot.val().and_then(Value::as_str).map(str::to_string))
    }

    async fn existing(&self, user_id: &str) -> AuthResult<UserData> {
        self.users
            .get_fresh(&paths::user(user_id))
            .await?
            .ok_or(AuthError::NotLoggedIn)
    }

    /// Points `new_index` at the user, frees `old_index` and rewrites `field` in one update.
    async fn move_index(
        &self,
        user_id: &str,
        field: &str,
        value: &str,
        old_index: Option<String>,
        new_index: String,
    ) -> AuthResult<()> {
        let user_path = paths::user(user_id);
        let mut values = BTreeMap::new();
        values.insert(format!("{}/{}", user_path, field), json!(value));
        values.insert(format!("{}/updatedAt", user_path), json!(now_millis()));
        if let Some(old_index) = old_index {
            values.insert(old_index, Value::Null);
        }
        values.insert(new_index, json!(user_id));
        self.users.store().update(values).await?;
        self.users.invalidate(&user_path);
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for RegistryAuthBackend {
    async fn sign_up(&self, username: &str, email: &str, password: &str) -> AuthResult<CurrentUser> {
        validate_username(username)?;
        validate_email(email)?;

        let username_index = paths::username_index(username);
        let email_index = paths::email_index(email);
        if self.index_entry(&username_index).await?.is_some() {
            return Err(AuthError::UsernameInUse(username.to_string()));
        }
        if self.index_entry(&email_index).await?.is_some() {
            return Err(AuthError::EmailInUse(email.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let secret = password.to_string();
        let password_hash = off_runtime(move || hash_password(&secret)).await??;
        let now = now_millis();
        let data = UserData {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        };

        let user_path = paths::user(&id);
        let mut values = BTreeMap::new();
        values.insert(user_path.clone(), serde_json::to_value(&data).map_err(RegistryError::from)?);
        values.insert(username_index, json!(id));
        values.insert(email_index, json!(id));
        self.users.store().update(values).await?;
        self.users.invalidate(&user_path);

        log::debug!("Created user '{}' ({})", username, id);
        Ok(current_user(&id, &data))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<CurrentUser> {
        let id = self
            .index_entry(&paths::email_index(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let data = self
            .users
            .get(&paths::user(&id))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let secret = password.to_string();
        let stored = data.password_hash.clone();
        if !off_runtime(move || verify_password(&secret, &stored)).await? {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(current_user(&id, &data))
    }

    async fn user(&self, user_id: &str) -> AuthResult<Option<CurrentUser>> {
        Ok(self
            .users
            .get(&paths::user(user_id))
            .await?
            .map(|data| current_user(user_id, &data)))
    }

    async fn set_username(&self, user_id: &str, username: &str) -> AuthResult<CurrentUser> {
        let data = self.existing(user_id).await?;
        let new_index = paths::username_index(username);
        if self.index_entry(&new_index).await?.is_some() {
            return Err(AuthError::UsernameInUse(username.to_string()));
        }
        let old_index = paths::username_index(&data.username);
        self.move_index(user_id, "username", username, Some(old_index), new_index)
            .await?;
        Ok(CurrentUser {
            id: user_id.to_string(),
            username: username.to_string(),
            email: data.email,
        })
    }

    async fn set_email(&self, user_id: &str, email: &str) -> AuthResult<CurrentUser> {
        let data = self.existing(user_id).await?;
        let new_index = paths::email_index(email);
        if self
            .index_entry(&new_index)
            .await?
            .is_some_and(|owner| owner != user_id)
        {
            return Err(AuthError::EmailInUse(email.to_string()));
        }
        // The index is case-insensitive, so a change of case keeps the same entry.
        let old_index = Some(paths::email_index(&data.email)).filter(|old| *old != new_index);
        self.move_index(user_id, "email", email, old_index, new_index)
            .await?;
        Ok(CurrentUser {
            id: user_id.to_string(),
            username: data.username,
            email: email.to_string(),
        })
    }
}

const SESSION_KEY: &str = "auth";
const SESSION_USER_ID: &str = "auth.userId";
const SESSION_EMAIL: &str = "auth.email";

/// Login, sign-up and logout against an [`AuthBackend`], with the session kept in config.
#[derive(Debug)]
pub struct AuthController {
    config: Arc<ConfigController>,
    backend: Arc<dyn AuthBackend>,
}

impl AuthController {
    pub fn new(config: Arc<ConfigController>, backend: Arc<dyn AuthBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &Arc<ConfigController> {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend> {
        &self.backend
    }

    /// The logged-in user, or `None` when there is no session or its user is gone.
    pub async fn current_user(&self) -> AuthResult<Option<CurrentUser>> {
        match self.config.get_string(SESSION_USER_ID)? {
            Some(id) => self.backend.user(&id).await,
            None => Ok(None),
        }
    }

    /// The logged-in user, failing with `NotLoggedIn` when there is none.
    pub async fn require_user(&self) -> AuthResult<CurrentUser> {
        self.current_user().await?.ok_or(AuthError::NotLoggedIn)
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<CurrentUser> {
        let user = self.backend.sign_in(email, password).await?;
        self.save_session(&user)?;
        log::info!("Logged in as '{}'", user.username);
        Ok(user)
    }

    /// Creates an account and logs into it.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<CurrentUser> {
        let user = self.backend.sign_up(username, email, password).await?;
        self.save_session(&user)?;
        Ok(user)
    }

    /// Drops the session of the configured target. Returns `false` if there was none.
    pub fn logout(&self) -> AuthResult<bool> {
        Ok(self.config.delete(SESSION_KEY, self.config.target())?)
    }

    pub(crate) fn save_session(&self, user: &CurrentUser) -> AuthResult<()> {
        let target = self.config.target();
        self.config.set(SESSION_USER_ID, json!(user.id), target)?;
        self.config.set(SESSION_EMAIL, json!(user.email), target)?;
        Ok(())
    }
}
