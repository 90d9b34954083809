// ── Domain model ──
//
// Canonical notification types. Snapshot rows and push frames arrive in
// several shapes; everything here normalizes them into one representation
// the reconciler and the CLI depend on.

pub mod notification;
pub mod notification_id;

// ── Re-exports ──────────────────────────────────────────────────────

pub use notification::{NOTIFICATION_FRAME, Notification, NotificationCategory, parse_snapshot};
pub use notification_id::NotificationId;
