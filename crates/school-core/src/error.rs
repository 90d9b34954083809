// ── Core error types ──
//
// User-facing errors from school-core. Consumers never see reqwest or
// tungstenite failures directly; the `From<school_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach school server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not logged in")]
    NotLoggedIn,

    /// The server answered 401. The session has been ended.
    #[error("Session expired -- log in again")]
    SessionExpired,

    /// The push socket was closed with the rejection code. The session has been ended.
    #[error("Session rejected by server (close code {code}): {reason}")]
    SessionRejected { code: u16, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Unexpected response from server: {message}")]
    InvalidResponse { message: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session store error: {message}")]
    Storage { message: String },
}

impl CoreError {
    /// Whether a fresh login is the only way forward.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::NotLoggedIn | Self::SessionExpired | Self::SessionRejected { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<school_api::Error> for CoreError {
    fn from(err: school_api::Error) -> Self {
        match err {
            school_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            school_api::Error::SessionExpired => CoreError::SessionExpired,
            school_api::Error::SessionRejected { code, reason } => {
                CoreError::SessionRejected { code, reason }
            }
            school_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            school_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            school_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            school_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            school_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            school_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            school_api::Error::MalformedMessage(message) => CoreError::InvalidResponse { message },
            school_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidResponse { message }
            }
            school_api::Error::Storage(message) => CoreError::Storage { message },
        }
    }
}
