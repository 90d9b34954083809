// Session record and its persistence seam.
//
// A `Session` pairs the bearer credential with the identity the server
// returned at login. Persistence goes through the `SessionStore` trait so
// the request client never knows whether the backing store is a keyring,
// a file, or memory.

use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Error;

/// Role of the authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
    #[serde(other)]
    Unknown,
}

/// Who the current credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    #[serde(rename = "name", alias = "full_name", alias = "displayName")]
    pub display_name: String,
    pub role: Role,
    pub email: String,
}

/// The client-side record of an authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: SecretString,
    pub identity: Identity,
}

impl Session {
    /// Convert into the shape written to a [`SessionStore`].
    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            token: self.credential.expose_secret().to_owned(),
            user: self.identity.clone(),
        }
    }
}

/// Persisted form of a session: the credential and the last-known identity.
///
/// Both live in one record so a store can discard them atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: Identity,
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            credential: SecretString::from(stored.token),
            identity: stored.user,
        }
    }
}

/// Opaque key-value persistence for the session across process restarts.
pub trait SessionStore: Send + Sync {
    /// Read the stored session, if any.
    fn load(&self) -> Result<Option<StoredSession>, Error>;

    /// Replace the stored session.
    fn save(&self, session: &StoredSession) -> Result<(), Error>;

    /// Discard the credential and identity together.
    fn clear(&self) -> Result<(), Error>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a session already present, as if a previous run had logged in.
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<StoredSession>, Error> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_accepts_name_aliases() {
        let from_name: Identity = serde_json::from_value(json!({
            "id": 1, "name": "Admin User", "role": "admin", "email": "admin@school.com"
        }))
        .unwrap();
        let from_full_name: Identity = serde_json::from_value(json!({
            "id": 2, "full_name": "John Teacher", "role": "teacher", "email": "t@school.com"
        }))
        .unwrap();

        assert_eq!(from_name.display_name, "Admin User");
        assert_eq!(from_name.role, Role::Admin);
        assert_eq!(from_full_name.display_name, "John Teacher");
        assert_eq!(from_full_name.role, Role::Teacher);
    }

    #[test]
    fn unknown_role_does_not_fail() {
        let identity: Identity = serde_json::from_value(json!({
            "id": 9, "name": "Jan", "role": "janitor", "email": "j@school.com"
        }))
        .unwrap();
        assert_eq!(identity.role, Role::Unknown);
    }

    #[test]
    fn role_displays_lowercase() {
        assert_eq!(Role::Parent.to_string(), "parent");
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
    }

    #[test]
    fn memory_store_round_trip_and_clear() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_none());

        let stored = StoredSession {
            token: "tok".into(),
            user: Identity {
                id: 3,
                display_name: "Alice Student".into(),
                role: Role::Student,
                email: "student@school.com".into(),
            },
        };
        store.save(&stored).unwrap();
        assert_eq!(store.load().unwrap(), Some(stored));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
