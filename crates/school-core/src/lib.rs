//! Session layer between `school-api` and consumers (CLI).
//!
//! - **[`SessionController`]**: Owns the request client, the push socket,
//!   and the reconciler for one session. [`login()`](SessionController::login)
//!   and [`resume()`](SessionController::resume) start a session; a 401 on
//!   any call or a rejection close on the socket ends it through a single
//!   teardown path, observable via [`SessionState`].
//!
//! - **[`NotificationReconciler`]**: Newest-first, id-unique notification
//!   collection fed by the snapshot fetch and the live push stream, with
//!   read-state mutation and a derived unread count.
//!
//! - **[`NotificationStream`]**: Subscription handle vended by the
//!   reconciler. Exposes `current()` / `latest()` / `changed()`.
//!
//! - **Domain model** ([`model`]): [`Notification`], [`NotificationCategory`],
//!   and [`NotificationId`], normalizing the server's snapshot rows and push
//!   frames into one shape.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SessionConfig;
pub use controller::{EndReason, SessionController, SessionState};
pub use error::CoreError;
pub use model::{Notification, NotificationCategory, NotificationId};
pub use reconciler::{NotificationReconciler, NotificationSnapshot};
pub use stream::{NotificationStream, NotificationWatchStream};

// Transport types consumers need alongside the controller.
pub use school_api::{ConnectionState, Identity, Method, Payload, Role};
