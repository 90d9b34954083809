//! Shared configuration for the school client.
//!
//! TOML profiles layered with `SCHOOL_*` environment overrides, persistent
//! session stores, and translation to `school_core::SessionConfig`. The
//! CLI adds `GlobalOpts`-aware overrides on top.

mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use school_api::websocket::{DEFAULT_REJECTION_CLOSE_CODE, websocket_url};
use school_api::{MemorySessionStore, ReconnectConfig, SessionStore, TlsMode, TransportConfig};
use school_core::SessionConfig;
use school_core::config::{DEFAULT_NOTIFICATIONS_RESOURCE, DEFAULT_WS_PATH};

pub use store::{FileSessionStore, KeyringSessionStore};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: explicit choice, else the configured
    /// default, else `"default"`.
    pub fn profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(ToOwned::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request deadline in seconds. 0 disables it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// Where a profile keeps its session between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// System keyring.
    Keyring,
    /// JSON file in the platform data directory.
    #[default]
    File,
    /// Nothing survives the process.
    Memory,
}

/// A named server profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "https://school.example.com").
    pub server: String,

    /// Push socket URL. Derived from `server` + `ws_path` when absent.
    pub ws_url: Option<String>,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Email used by `login` when none is given.
    pub email: Option<String>,

    /// Snapshot resource; `{role}` is replaced with the user's role.
    #[serde(default = "default_notifications_resource")]
    pub notifications_resource: String,

    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Close code that means "credential rejected, do not reconnect".
    #[serde(default = "default_rejection_close_code")]
    pub rejection_close_code: u16,

    #[serde(default)]
    pub session_store: SessionStoreKind,

    /// Mirror read-state changes to the server.
    pub sync_read_state: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    /// A profile for `server` with every other field at its default.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ws_url: None,
            ws_path: default_ws_path(),
            email: None,
            notifications_resource: default_notifications_resource(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            rejection_close_code: default_rejection_close_code(),
            session_store: SessionStoreKind::default(),
            sync_read_state: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_ws_path() -> String {
    DEFAULT_WS_PATH.into()
}
fn default_notifications_resource() -> String {
    DEFAULT_NOTIFICATIONS_RESOURCE.into()
}
fn default_reconnect_base_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_rejection_close_code() -> u16 {
    DEFAULT_REJECTION_CLOSE_CODE
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "school", "school")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("school");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the file store keeps a profile's session.
pub fn session_path(profile_name: &str) -> PathBuf {
    let base = project_dirs().map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf());
    base.join("sessions").join(format!("{profile_name}.json"))
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Layering: built-in defaults, then the TOML file (if present), then
/// `SCHOOL_*` variables with `__` as the nesting separator
/// (`SCHOOL_PROFILES__HOME__SERVER`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SCHOOL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────

/// Build the session store a profile asks for.
pub fn build_session_store(profile: &Profile, profile_name: &str) -> Arc<dyn SessionStore> {
    match profile.session_store {
        SessionStoreKind::Keyring => Arc::new(KeyringSessionStore::new(profile_name)),
        SessionStoreKind::File => Arc::new(FileSessionStore::new(session_path(profile_name))),
        SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
    }
}

/// Build a `SessionConfig` from a profile and global defaults -- no CLI
/// flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let server: url::Url = profile
        .server
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", profile.server),
        })?;

    let ws_url = match profile.ws_url {
        Some(ref raw) => raw.parse().map_err(|_| ConfigError::Validation {
            field: "ws_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?,
        None => websocket_url(&server, &profile.ws_path).map_err(|e| ConfigError::Validation {
            field: "ws_path".into(),
            reason: e.to_string(),
        })?,
    };

    if profile.reconnect_base_ms == 0 {
        return Err(ConfigError::Validation {
            field: "reconnect_base_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let timeout = match profile.timeout.unwrap_or(defaults.timeout) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(SessionConfig {
        server,
        ws_url,
        transport: TransportConfig { tls, timeout },
        reconnect: ReconnectConfig {
            base_delay: Duration::from_millis(profile.reconnect_base_ms),
            max_delay: Duration::from_millis(profile.reconnect_max_ms),
            rejection_close_code: profile.rejection_close_code,
        },
        notifications_resource: profile.notifications_resource.clone(),
        sync_read_state: profile.sync_read_state.unwrap_or(true),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn profile_defaults_fill_in() {
        let profile: Profile = toml::from_str(r#"server = "https://school.example.com""#).unwrap();
        assert_eq!(profile.ws_path, "/ws");
        assert_eq!(profile.notifications_resource, "dashboard/{role}");
        assert_eq!(profile.reconnect_base_ms, 1_000);
        assert_eq!(profile.reconnect_max_ms, 30_000);
        assert_eq!(profile.rejection_close_code, 4001);
        assert_eq!(profile.session_store, SessionStoreKind::File);
    }

    #[test]
    fn session_config_derives_socket_url() {
        let profile = Profile::new("https://school.example.com");
        let config = profile_to_session_config(&profile, &Defaults::default()).unwrap();

        assert_eq!(config.ws_url.as_str(), "wss://school.example.com/ws");
        assert_eq!(config.transport.tls, TlsMode::System);
        assert_eq!(config.transport.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.reconnect.base_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert!(config.sync_read_state);
    }

    #[test]
    fn explicit_ws_url_and_tls_overrides() {
        let mut profile = Profile::new("http://localhost:8000");
        profile.ws_url = Some("ws://localhost:9000/live".into());
        profile.insecure = Some(true);
        profile.timeout = Some(0);

        let config = profile_to_session_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(config.ws_url.as_str(), "ws://localhost:9000/live");
        assert_eq!(config.transport.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(config.transport.timeout, None);
    }

    #[test]
    fn custom_ca_used_when_not_insecure() {
        let mut profile = Profile::new("https://school.example.com");
        profile.ca_cert = Some(PathBuf::from("/etc/school/ca.pem"));
        let config = profile_to_session_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(
            config.transport.tls,
            TlsMode::CustomCa(PathBuf::from("/etc/school/ca.pem"))
        );
    }

    #[test]
    fn invalid_server_is_rejected() {
        let profile = Profile::new("not a url");
        let err = profile_to_session_config(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server"));
    }

    #[test]
    fn zero_base_delay_is_rejected() {
        let mut profile = Profile::new("https://school.example.com");
        profile.reconnect_base_ms = 0;
        assert!(profile_to_session_config(&profile, &Defaults::default()).is_err());
    }

    #[test]
    fn profile_name_resolution() {
        let mut config = Config::default();
        assert_eq!(config.profile_name(None), "default");
        assert_eq!(config.profile_name(Some("home")), "home");

        config.default_profile = Some("school".into());
        assert_eq!(config.profile_name(None), "school");
        assert!(matches!(
            config.profile("school"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn session_path_is_per_profile() {
        let a = session_path("home");
        let b = session_path("work");
        assert_ne!(a, b);
        assert!(a.ends_with("sessions/home.json"));
    }
}
