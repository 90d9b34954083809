//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use school_config::ConfigError;
use school_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the school server at {url}")]
    #[diagnostic(
        code(school::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(school::auth_failed),
        help("Check the email and password, then run: school login")
    )]
    AuthFailed { message: String },

    #[error("Not logged in")]
    #[diagnostic(code(school::not_logged_in), help("Run: school login"))]
    NotLoggedIn,

    #[error("Session ended: {reason}")]
    #[diagnostic(
        code(school::session_ended),
        help("The stored session was discarded. Run: school login")
    )]
    SessionEnded { reason: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Server error{}: {message}", .status.map_or_else(String::new, |s| format!(" (HTTP {s})")))]
    #[diagnostic(code(school::api_error))]
    ApiError { status: Option<u16>, message: String },

    #[error("Unexpected response from server: {message}")]
    #[diagnostic(code(school::invalid_response))]
    InvalidResponse { message: String },

    #[error("Notification '{id}' not found")]
    #[diagnostic(
        code(school::not_found),
        help("Run: school notifications list")
    )]
    NotificationNotFound { id: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(school::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(school::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: school config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(school::no_config),
        help(
            "Create a profile with: school config init\n\
             Or pass --server / set SCHOOL_SERVER.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(school::config))]
    Config(Box<ConfigError>),

    #[error("Session store error: {message}")]
    #[diagnostic(code(school::storage))]
    Storage { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(school::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(school::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NotLoggedIn | Self::SessionEnded { .. } => {
                exit_code::AUTH
            }
            Self::NotificationNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::NotLoggedIn => CliError::NotLoggedIn,
            CoreError::SessionExpired => CliError::SessionEnded {
                reason: "session expired".into(),
            },
            CoreError::SessionRejected { code, reason } => CliError::SessionEnded {
                reason: format!("rejected by server (close code {code}): {reason}"),
            },
            CoreError::Api { message, status } => CliError::ApiError { status, message },
            CoreError::InvalidResponse { message } => CliError::InvalidResponse { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Storage { message } => CliError::Storage { message },
        }
    }
}
