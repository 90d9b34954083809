// school-api: async client for the school server (resource calls + push socket)

pub mod client;
pub mod error;
pub mod session;
pub mod transport;
pub mod websocket;

pub use client::{ApiClient, Payload, SessionStatus};
pub use error::Error;
pub use reqwest::Method;
pub use session::{Identity, MemorySessionStore, Role, Session, SessionStore, StoredSession};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    Backoff, ConnectionManager, ConnectionState, InboundMessage, ReconnectConfig, Subscription,
};
