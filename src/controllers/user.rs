// src/controllers/user.rs

use std::sync::Arc;

use super::auth::{AuthController, AuthError, AuthResult, validate_email, validate_username};
use crate::models::CurrentUser;

/// Profile changes for the logged-in user.
#[derive(Debug)]
pub struct UserController {
    auth: Arc<AuthController>,
}

impl UserController {
    pub fn new(auth: Arc<AuthController>) -> Self {
        Self { auth }
    }

    pub async fn set_username(&self, username: &str) -> AuthResult<CurrentUser> {
        let user = self.auth.require_user().await?;
        if user.username == username {
            return Err(AuthError::UsernameUnchanged);
        }
        validate_username(username)?;
        let updated = self.auth.backend().set_username(&user.id, username).await?;
        log::info!("Username changed from '{}' to '{}'", user.username, username);
        Ok(updated)
    }

    /// Changes the e-mail address and keeps the session in step with it.
    pub async fn set_email(&self, email: &str) -> AuthResult<CurrentUser> {
        let user = self.auth.require_user().await?;
        if user.email == email {
            return Err(AuthError::EmailUnchanged);
        }
        validate_email(email)?;
        let updated = self.auth.backend().set_email(&user.id, email).await?;
        self.auth.save_session(&updated)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::auth::RegistryAuthBackend;
    use crate::controllers::auth::tests::test_config;
    use crate::registry::memory::MemoryRegistry;
    use crate::registry::{RegistryStore, paths};
    use tempfile::TempDir;

    async fn signed_in(dir: &TempDir) -> (Arc<MemoryRegistry>, Arc<AuthController>, UserController) {
        let store = Arc::new(MemoryRegistry::new());
        let auth = Arc::new(AuthController::new(
            test_config(dir.path()),
            Arc::new(RegistryAuthBackend::new(store.clone())),
        ));
        auth.sign_up("bob", "bob@example.com", "pw").await.unwrap();
        auth.logout().unwrap();
        auth.sign_up("alice", "alice@example.com", "pw").await.unwrap();
        (store, auth.clone(), UserController::new(auth))
    }

    #[tokio::test]
    async fn test_set_username_moves_index() {
        let dir = TempDir::new().unwrap();
        let (store, auth, users) = signed_in(&dir).await;

        let updated = users.set_username("alicia").await.unwrap();
        assert_eq!(updated.username, "alicia");
        assert_eq!(auth.require_user().await.unwrap().username, "alicia");
        assert!(!store.exists(&paths::username_index("alice")).await.unwrap());
        assert!(store.exists(&paths::username_index("alicia")).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_username_errors() {
        let dir = TempDir::new().unwrap();
        let (_store, _auth, users) = signed_in(&dir).await;

        assert!(matches!(users.set_username("alice").await, Err(AuthError::UsernameUnchanged)));
        assert!(matches!(users.set_username("bob").await, Err(AuthError::UsernameInUse(_))));
        assert!(matches!(users.set_username("1bad").await, Err(AuthError::BadUsername(_))));
    }

    #[tokio::test]
    async fn test_set_email_updates_session() {
        let dir = TempDir::new().unwrap();
        let (store, auth, users) = signed_in(&dir).await;

        users.set_email("alice@example.org").await.unwrap();
        assert_eq!(
            auth.config().get_string("auth.email").unwrap().as_deref(),
            Some("alice@example.org")
        );
        assert!(!store.exists(&paths::email_index("alice@example.com")).await.unwrap());
        auth.logout().unwrap();
        auth.login("alice@example.org", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn test_set_email_errors() {
        let dir = TempDir::new().unwrap();
        let (_store, _auth, users) = signed_in(&dir).await;

        assert!(matches!(users.set_email("alice@example.com").await, Err(AuthError::EmailUnchanged)));
        assert!(matches!(users.set_email("bob@example.com").await, Err(AuthError::EmailInUse(_))));
        assert!(matches!(users.set_email("not-an-email").await, Err(AuthError::BadEmail(_))));
    }

    #[tokio::test]
    async fn test_changes_require_login() {
        let dir = TempDir::new().unwrap();
        let (_store, auth, users) = signed_in(&dir).await;
        auth.logout().unwrap();
        assert!(matches!(users.set_username("carol").await, Err(AuthError::NotLoggedIn)));
    }
}
