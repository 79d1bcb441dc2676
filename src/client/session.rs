//! Anonymous session id and bearer credentials, kept in durable storage.
//!
//! Every read fails open: a storage error is logged and the provider falls
//! back to a freshly generated id or to the anonymous scope.

use std::sync::Arc;

use parking_lot::Mutex;

use super::storage::{KeyValueStorage, StorageError};
use crate::api::{AuthResponse, UserProfile};
use crate::domain::value_objects::SessionId;

const SESSION_KEY: &str = "session_id";
const TOKEN_KEY: &str = "auth_token";
const USER_KEY: &str = "user";

/// The identity a request is sent under. Exactly one is active at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Anonymous(SessionId),
    Authenticated(String),
}

pub struct SessionProvider {
    storage: Arc<dyn KeyValueStorage>,
    anonymous: Mutex<Option<SessionId>>,
}

impl SessionProvider {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage, anonymous: Mutex::new(None) }
    }

    pub fn get_or_create_anonymous_id(&self) -> SessionId {
        let mut cached = self.anonymous.lock();
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let stored = match self.storage.get(SESSION_KEY) {
            Ok(value) => value.and_then(|v| match SessionId::parse(&v) {
                Ok(id) => Some(id),
                Err(error) => {
                    tracing::warn!(%error, "stored session id is invalid, generating a new one");
                    None
                }
            }),
            Err(error) => {
                tracing::warn!(%error, "could not read session id, generating a new one");
                None
            }
        };

        let id = stored.unwrap_or_else(|| {
            let id = SessionId::generate();
            if let Err(error) = self.storage.set(SESSION_KEY, id.as_str()) {
                tracing::warn!(%error, "could not persist session id");
            }
            tracing::debug!(session = %id, "created anonymous session");
            id
        });
        *cached = Some(id.clone());
        id
    }

    pub fn auth_token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).unwrap_or_else(|error| {
            tracing::warn!(%error, "could not read auth token");
            None
        })
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        let raw = self.storage.get(USER_KEY).unwrap_or_else(|error| {
            tracing::warn!(%error, "could not read stored user");
            None
        })?;
        serde_json::from_str(&raw)
            .map_err(|error| tracing::warn!(%error, "stored user record is corrupt"))
            .ok()
    }

    pub fn is_authenticated(&self) -> bool { self.auth_token().is_some() }

    pub fn scope(&self) -> Scope {
        match self.auth_token() {
            Some(token) => Scope::Authenticated(token),
            None => Scope::Anonymous(self.get_or_create_anonymous_id()),
        }
    }

    pub fn store_login(&self, auth: &AuthResponse) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, &auth.token)?;
        self.storage.set(USER_KEY, &serde_json::to_string(&auth.user)?)?;
        tracing::info!(user = %auth.user.username, "signed in");
        Ok(())
    }

    /// Drops the credentials. The anonymous id is kept.
    pub fn clear_login(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{FileStorage, MemoryStorage};

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn set(&self, _: &str, _: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn remove(&self, _: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    fn login() -> AuthResponse {
        AuthResponse {
            token: "tok".into(),
            user: UserProfile { id: "u1".into(), username: "ada".into(), email: "ada@example.com".into() },
        }
    }

    #[test]
    fn test_anonymous_id_is_stable_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let first = SessionProvider::new(Arc::new(FileStorage::new(&path))).get_or_create_anonymous_id();
        let second = SessionProvider::new(Arc::new(FileStorage::new(&path))).get_or_create_anonymous_id();
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("session_"));
    }

    #[test]
    fn test_storage_failure_fails_open() {
        let provider = SessionProvider::new(Arc::new(BrokenStorage));
        let id = provider.get_or_create_anonymous_id();
        assert_eq!(provider.get_or_create_anonymous_id(), id);
        assert_eq!(provider.auth_token(), None);
        assert_eq!(provider.scope(), Scope::Anonymous(id));
    }

    #[test]
    fn test_invalid_stored_id_is_replaced() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(SESSION_KEY, "bad id!").unwrap();
        let provider = SessionProvider::new(storage.clone());
        let id = provider.get_or_create_anonymous_id();
        assert_eq!(storage.get(SESSION_KEY).unwrap().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_login_switches_scope_and_logout_keeps_session() {
        let provider = SessionProvider::new(Arc::new(MemoryStorage::new()));
        let anonymous = provider.get_or_create_anonymous_id();

        provider.store_login(&login()).unwrap();
        assert_eq!(provider.scope(), Scope::Authenticated("tok".into()));
        assert_eq!(provider.current_user().unwrap().username, "ada");

        provider.clear_login().unwrap();
        assert!(!provider.is_authenticated());
        assert_eq!(provider.current_user(), None);
        assert_eq!(provider.scope(), Scope::Anonymous(anonymous));
    }
}
