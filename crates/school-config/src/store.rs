// Persistent session stores.
//
// Both stores keep the credential and the identity in one JSON record so
// they are written and discarded together.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use school_api::{Error, SessionStore, StoredSession};
use tracing::debug;

const KEYRING_SERVICE: &str = "school";

// ── FileSessionStore ────────────────────────────────────────────────

/// JSON file on disk, readable by the owner only.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<StoredSession>, Error> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read", &self.path, &e)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::Storage(format!("corrupt session file {}: {e}", self.path.display())))
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage_error("create", parent, &e))?;
        }
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| Error::Storage(format!("failed to encode session: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| storage_error("write", &self.path, &e))?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &self.path, &e)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| storage_error("chmod", path, &e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), Error> {
    Ok(())
}

fn storage_error(action: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::Storage(format!("failed to {action} {}: {err}", path.display()))
}

// ── KeyringSessionStore ─────────────────────────────────────────────

/// System keyring entry, one per profile.
#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    account: String,
}

impl KeyringSessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            account: format!("{profile_name}/session"),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, Error> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .map_err(|e| Error::Storage(format!("keyring unavailable: {e}")))
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<StoredSession>, Error> {
        match self.entry()?.get_password() {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::Storage(format!("corrupt keyring entry: {e}"))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!("keyring read failed: {e}"))),
        }
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        let json = serde_json::to_string(session)
            .map_err(|e| Error::Storage(format!("failed to encode session: {e}")))?;
        self.entry()?
            .set_password(&json)
            .map_err(|e| Error::Storage(format!("keyring write failed: {e}")))
    }

    fn clear(&self) -> Result<(), Error> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Storage(format!("keyring delete failed: {e}"))),
        }
    }
}
