use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use super::storage::{MemoryStorage, StorageBackend};
use super::token;
use crate::models::UserProfile;

/// Key holding the raw session token.
pub const TOKEN_KEY: &str = "token";

/// Key holding the JSON-serialized user profile.
pub const USER_KEY: &str = "user";

/// The token and user slots of the signed-in session.
///
/// A store without a backend is *detached*: reads return nothing and writes
/// are dropped. Clones share the same backend, and the last write wins.
#[derive(Clone, Default)]
pub struct SessionStore {
    backend: Option<Arc<dyn StorageBackend>>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn detached() -> Self {
        Self { backend: None }
    }

    pub fn is_attached(&self) -> bool {
        self.backend.is_some()
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        match self.backend {
            Some(ref backend) => backend
                .set(TOKEN_KEY, token)
                .context("Failed to save session token"),
            None => Ok(()),
        }
    }

    pub fn save_user(&self, user: &UserProfile) -> Result<()> {
        match self.backend {
            Some(ref backend) => {
                let json = serde_json::to_string(user)?;
                backend.set(USER_KEY, &json).context("Failed to save user profile")
            }
            None => Ok(()),
        }
    }

    pub fn load_token(&self) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read session token");
                None
            }
        }
    }

    /// Load the stored profile. A record that does not parse (including one
    /// with an unknown role) is erased so the next load reads nothing.
    pub fn load_user(&self) -> Option<UserProfile> {
        let backend = self.backend.as_ref()?;
        let raw = match backend.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read user profile");
                return None;
            }
        };

        match serde_json::from_str::<UserProfile>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user profile is corrupted, erasing it");
                if let Err(e) = backend.remove(USER_KEY) {
                    warn!(error = %e, "Failed to erase corrupted user profile");
                }
                None
            }
        }
    }

    /// Remove both slots. Failures are logged, never returned.
    pub fn clear(&self) {
        let Some(ref backend) = self.backend else {
            return;
        };
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = backend.remove(key) {
                warn!(key = key, error = %e, "Failed to clear session slot");
            }
        }
        debug!("Session cleared");
    }

    /// True when a user is stored and the token has not expired.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.load_user().is_some() && !token::is_expired_at(self.load_token().as_deref(), now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp())
    }

    /// Minutes remaining on the stored token (for display).
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        let token = self.load_token()?;
        token::seconds_until_expiry(&token, Utc::now().timestamp()).map(|s| s / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use serde_json::json;

    fn profile(role: &str) -> UserProfile {
        serde_json::from_value(json!({
            "_id": "665f0c",
            "username": "alice",
            "email": "alice@example.com",
            "firstName": "Alice",
            "lastName": "Smith",
            "role": role,
            "createdAt": "2025-05-16T17:49:27.755Z",
            "preferences": {"newsletter": false, "tags": ["led", 3]}
        }))
        .unwrap()
    }

    #[test]
    fn test_user_round_trip() {
        let store = SessionStore::in_memory();
        let user = profile("admin");
        store.save_user(&user).unwrap();
        assert_eq!(store.load_user(), Some(user));
    }

    #[test]
    fn test_token_overwrite() {
        let store = SessionStore::in_memory();
        store.save_token("first").unwrap();
        store.save_token("second").unwrap();
        assert_eq!(store.load_token().as_deref(), Some("second"));
    }

    #[test]
    fn test_corrupted_user_is_erased() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set(USER_KEY, "{not json").unwrap();
        let store = SessionStore::new(backend.clone());

        assert_eq!(store.load_user(), None);
        assert_eq!(backend.get(USER_KEY).unwrap(), None);
        assert_eq!(store.load_user(), None);
    }

    #[test]
    fn test_unknown_role_is_erased() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set(USER_KEY, r#"{"username":"mallory","role":"superadmin"}"#)
            .unwrap();
        let store = SessionStore::new(backend.clone());

        assert_eq!(store.load_user(), None);
        assert_eq!(backend.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_role_is_normalized_on_load() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set(USER_KEY, r#"{"username":"ann","role":"Admin"}"#)
            .unwrap();
        let store = SessionStore::new(backend);
        assert_eq!(store.load_user().map(|u| u.role), Some(Role::Admin));
    }

    #[test]
    fn test_clear_removes_both_slots() {
        let store = SessionStore::in_memory();
        store.save_token("abc").unwrap();
        store.save_user(&profile("user")).unwrap();
        store.clear();
        assert_eq!(store.load_token(), None);
        assert_eq!(store.load_user(), None);
    }

    #[test]
    fn test_detached_store_is_inert() {
        let store = SessionStore::detached();
        assert!(!store.is_attached());
        store.save_token("abc").unwrap();
        store.save_user(&profile("admin")).unwrap();
        assert_eq!(store.load_token(), None);
        assert_eq!(store.load_user(), None);
        store.clear();
        assert!(!store.is_valid());
    }

    #[test]
    fn test_clones_share_backend() {
        let store = SessionStore::in_memory();
        let other = store.clone();
        store.save_token("abc").unwrap();
        assert_eq!(other.load_token().as_deref(), Some("abc"));
        other.clear();
        assert_eq!(store.load_token(), None);
    }

    #[test]
    fn test_is_valid_at() {
        let store = SessionStore::in_memory();
        let token = token::test_tokens::make(&json!({"exp": 2_000}));
        store.save_token(&token).unwrap();
        assert!(!store.is_valid_at(1_000), "no user stored");

        store.save_user(&profile("user")).unwrap();
        assert!(store.is_valid_at(1_999));
        assert!(!store.is_valid_at(2_000));
    }
}
