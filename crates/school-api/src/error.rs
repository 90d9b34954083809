use thiserror::Error;

/// Top-level error type for the `school-api` crate.
///
/// Covers every failure mode of the transport layer: authentication,
/// resource calls, the push socket, and local session persistence.
/// `school-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, disabled account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The server answered 401: the credential is no longer valid.
    /// The stored session has already been discarded when this is returned.
    #[error("Session expired -- log in again")]
    SessionExpired,

    /// The server closed the push socket with the reserved
    /// authentication-rejection close code.
    #[error("Session rejected by server (close code {code}): {reason}")]
    SessionRejected { code: u16, reason: String },

    // ── Resource API ────────────────────────────────────────────────
    /// Non-success response other than 401, carrying the server's message.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Caller-imposed deadline expired.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Push socket ─────────────────────────────────────────────────
    /// Socket could not be opened or dropped unexpectedly.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Inbound frame was not a JSON object.
    #[error("Malformed socket message: {0}")]
    MalformedMessage(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Local persistence ───────────────────────────────────────────
    /// The session store could not be read or written.
    #[error("Session store error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns `true` if the server no longer accepts the session
    /// and a fresh login is the only way forward.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::SessionRejected { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::SessionExpired => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_invalid_covers_both_layers() {
        assert!(Error::SessionExpired.is_session_invalid());
        assert!(
            Error::SessionRejected {
                code: 4001,
                reason: "bad token".into()
            }
            .is_session_invalid()
        );
        assert!(
            !Error::Api {
                status: 500,
                message: "boom".into()
            }
            .is_session_invalid()
        );
    }

    #[test]
    fn socket_failures_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(!Error::MalformedMessage("not json".into()).is_transient());
    }

    #[test]
    fn status_is_exposed() {
        let err = Error::Api {
            status: 422,
            message: "invalid".into(),
        };
        assert_eq!(err.status(), Some(422));
        assert_eq!(Error::SessionExpired.status(), Some(401));
    }
}
