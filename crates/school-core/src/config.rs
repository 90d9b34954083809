// ── Runtime session configuration ──
//
// Describes *where* the server lives and how to talk to it. Never touches
// disk: the CLI resolves a profile into a `SessionConfig` and hands it in.

use school_api::websocket::websocket_url;
use school_api::{ReconnectConfig, Role, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// Default socket path under the server root.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default resource holding the notification snapshot.
pub const DEFAULT_NOTIFICATIONS_RESOURCE: &str = "dashboard/{role}";

/// Configuration for one session against one server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server root (e.g. `https://school.example.com`).
    pub server: Url,
    /// Push socket endpoint.
    pub ws_url: Url,
    pub transport: TransportConfig,
    pub reconnect: ReconnectConfig,
    /// Snapshot resource; `{role}` is replaced with the identity's role.
    pub notifications_resource: String,
    /// Mirror read-state changes to the server.
    pub sync_read_state: bool,
}

impl SessionConfig {
    /// Defaults for `server`, with the socket at [`DEFAULT_WS_PATH`].
    pub fn new(server: Url) -> Result<Self, CoreError> {
        let ws_url = websocket_url(&server, DEFAULT_WS_PATH)?;
        Ok(Self {
            server,
            ws_url,
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            notifications_resource: DEFAULT_NOTIFICATIONS_RESOURCE.into(),
            sync_read_state: true,
        })
    }

    /// Resolve the snapshot resource for a role.
    pub fn notifications_resource_for(&self, role: Role) -> String {
        self.notifications_resource
            .replace("{role}", &role.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_follows_server_scheme() {
        let secure = SessionConfig::new("https://school.example.com".parse().unwrap()).unwrap();
        assert_eq!(secure.ws_url.as_str(), "wss://school.example.com/ws");

        let local = SessionConfig::new("http://localhost:8000".parse().unwrap()).unwrap();
        assert_eq!(local.ws_url.as_str(), "ws://localhost:8000/ws");
    }

    #[test]
    fn role_is_substituted() {
        let config = SessionConfig::new("http://localhost:8000".parse().unwrap()).unwrap();
        assert_eq!(
            config.notifications_resource_for(Role::Teacher),
            "dashboard/teacher"
        );

        let fixed = SessionConfig {
            notifications_resource: "notifications".into(),
            ..config
        };
        assert_eq!(fixed.notifications_resource_for(Role::Parent), "notifications");
    }
}
