// ── Notification ──
//
// Snapshot rows and push frames disagree on field names (`type` vs
// `category`, `time` vs `timestamp`, `read` vs `is_read`) and on nesting
// (`notification`, `data`, or inline). Parsing goes through a JSON object
// so every shape lands in the same struct.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use school_api::InboundMessage;

use super::NotificationId;

/// Frame `type` that carries a notification.
pub const NOTIFICATION_FRAME: &str = "notification";

const ID_KEYS: &[&str] = &["id", "notification_id"];
const MESSAGE_KEYS: &[&str] = &["message", "text", "title"];
const CATEGORY_KEYS: &[&str] = &["category", "notification_type", "type"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "created_at"];
const READ_KEYS: &[&str] = &["read", "is_read"];

/// Keys that may hold the notification body inside a push frame.
const NESTED_KEYS: &[&str] = &["data", "notification"];

// ── NotificationCategory ─────────────────────────────────────────────

/// What a notification is about. Unrecognized labels fall back to
/// [`Generic`](Self::Generic).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NotificationCategory {
    Homework,
    Attendance,
    Fee,
    Announcement,
    #[default]
    Generic,
}

impl NotificationCategory {
    /// Map a server label onto a category.
    pub fn from_label(label: &str) -> Self {
        label.trim().parse().unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for NotificationCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.as_deref().map_or_else(Self::default, Self::from_label))
    }
}

// ── Notification ─────────────────────────────────────────────────────

/// A single notification as held by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub category: NotificationCategory,
    /// Server-provided time label, verbatim. Often human text ("2 hours ago").
    pub timestamp: Option<String>,
    pub read: bool,
}

impl Notification {
    pub fn new(id: impl Into<NotificationId>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            category: NotificationCategory::Generic,
            timestamp: None,
            read: false,
        }
    }

    pub fn with_category(mut self, category: NotificationCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Build from a snapshot row or a merged push body.
    ///
    /// Fails only when no usable id is present; every other field has a
    /// fallback.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self, String> {
        let id = first(object, ID_KEYS)
            .and_then(|v| NotificationId::deserialize(v).ok())
            .ok_or_else(|| "notification has no id".to_owned())?;

        let message = first(object, MESSAGE_KEYS)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let category = first(object, CATEGORY_KEYS)
            .and_then(Value::as_str)
            .map_or_else(NotificationCategory::default, NotificationCategory::from_label);

        let timestamp = first(object, TIMESTAMP_KEYS).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        let read = first(object, READ_KEYS)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            id,
            message,
            category,
            timestamp,
            read,
        })
    }

    /// Extract the notification carried by a push frame.
    ///
    /// Returns `None` for frames of any other `type`, and for notification
    /// frames without an id (they cannot be deduplicated). Fields nested
    /// under `data` or `notification` win over top-level ones.
    pub fn from_push(message: &InboundMessage) -> Option<Self> {
        if !message.is(NOTIFICATION_FRAME) {
            return None;
        }

        let mut merged: Map<String, Value> = message
            .fields
            .iter()
            .filter(|(key, _)| !NESTED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for key in NESTED_KEYS {
            if let Some(Value::Object(nested)) = message.get(key) {
                merged.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        Self::from_object(&merged).ok()
    }

    /// Best-effort parse of [`timestamp`](Self::timestamp) into UTC.
    ///
    /// Understands RFC 3339 and the server's `YYYY-MM-DD HH:MM` format.
    /// Relative labels yield `None`.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .as_ref()
            .map(NaiveDateTime::and_utc)
    }
}

impl TryFrom<Map<String, Value>> for Notification {
    type Error = String;

    fn try_from(object: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_object(&object)
    }
}

/// Parse a snapshot response: either a bare array or an object holding a
/// `notifications` array. Rows without an id are skipped.
pub fn parse_snapshot(body: &Value) -> Result<Vec<Notification>, String> {
    let rows = match body {
        Value::Null => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        Value::Object(object) => match object.get("notifications") {
            Some(Value::Array(rows)) => rows,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(other) => return Err(format!("`notifications` is not an array: {other}")),
        },
        other => return Err(format!("expected a notification list, got: {other}")),
    };

    Ok(rows
        .iter()
        .filter_map(|row| match row {
            Value::Object(object) => match Notification::from_object(object) {
                Ok(n) => Some(n),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping snapshot row");
                    None
                }
            },
            _ => None,
        })
        .collect())
}

fn first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: Value) -> InboundMessage {
        InboundMessage::parse(&value.to_string()).unwrap()
    }

    #[test]
    fn dashboard_row_parses() {
        let row: Notification = serde_json::from_value(json!({
            "id": 1,
            "message": "Parent-Teacher meeting on Dec 15",
            "type": "info",
            "time": "1 day ago",
            "read": false
        }))
        .unwrap();

        assert_eq!(row.id, NotificationId::from(1));
        assert_eq!(row.category, NotificationCategory::Generic);
        assert_eq!(row.timestamp.as_deref(), Some("1 day ago"));
        assert!(!row.read);
    }

    #[test]
    fn category_labels_are_case_insensitive() {
        assert_eq!(
            NotificationCategory::from_label("Homework"),
            NotificationCategory::Homework
        );
        assert_eq!(NotificationCategory::from_label("FEE"), NotificationCategory::Fee);
        assert_eq!(
            NotificationCategory::from_label("student"),
            NotificationCategory::Generic
        );
    }

    #[test]
    fn is_read_alias_is_honored() {
        let row: Notification =
            serde_json::from_value(json!({ "id": "9", "message": "x", "is_read": true })).unwrap();
        assert!(row.read);
        assert_eq!(row.id, NotificationId::Numeric(9));
    }

    #[test]
    fn row_without_id_is_rejected() {
        let err = serde_json::from_value::<Notification>(json!({ "message": "orphan" }));
        assert!(err.is_err());
    }

    #[test]
    fn push_with_nested_notification_object() {
        let msg = frame(json!({
            "type": "notification",
            "notification": {
                "id": 12,
                "message": "New announcement: Sports day",
                "type": "announcement",
                "time": "Just now",
                "read": false
            }
        }));

        let n = Notification::from_push(&msg).unwrap();
        assert_eq!(n.id, NotificationId::from(12));
        assert_eq!(n.category, NotificationCategory::Announcement);
        assert_eq!(n.message, "New announcement: Sports day");
    }

    #[test]
    fn push_with_data_merges_top_level_message() {
        let msg = frame(json!({
            "type": "notification",
            "message": "Homework due tomorrow",
            "timestamp": "2024-03-01T09:30:00Z",
            "data": { "id": 5, "notification_type": "homework" }
        }));

        let n = Notification::from_push(&msg).unwrap();
        assert_eq!(n.id, NotificationId::from(5));
        assert_eq!(n.message, "Homework due tomorrow");
        assert_eq!(n.category, NotificationCategory::Homework);
        assert!(n.parsed_timestamp().is_some());
    }

    #[test]
    fn push_with_inline_fields() {
        let msg = frame(json!({
            "type": "notification",
            "id": 3,
            "message": "Fee reminder",
            "category": "fee"
        }));
        let n = Notification::from_push(&msg).unwrap();
        assert_eq!(n.category, NotificationCategory::Fee);
    }

    #[test]
    fn push_of_other_type_is_not_a_notification() {
        let msg = frame(json!({ "type": "presence", "id": 3 }));
        assert!(Notification::from_push(&msg).is_none());
    }

    #[test]
    fn push_without_id_is_dropped() {
        let msg = frame(json!({ "type": "notification", "message": "no id", "data": {} }));
        assert!(Notification::from_push(&msg).is_none());
    }

    #[test]
    fn server_time_format_parses() {
        let n = Notification::new(1, "x").with_timestamp("2024-12-15 08:45");
        let parsed = n.parsed_timestamp().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-12-15T08:45:00+00:00");

        let relative = Notification::new(2, "y").with_timestamp("2 hours ago");
        assert!(relative.parsed_timestamp().is_none());
    }

    #[test]
    fn snapshot_accepts_array_and_dashboard_object() {
        let bare = parse_snapshot(&json!([{ "id": 1, "message": "a" }])).unwrap();
        assert_eq!(bare.len(), 1);

        let dashboard = parse_snapshot(&json!({
            "stats": { "students": 120 },
            "notifications": [
                { "id": 2, "message": "b" },
                { "message": "skipped, no id" },
                { "id": 1, "message": "a" }
            ]
        }))
        .unwrap();
        let ids: Vec<_> = dashboard.iter().map(|n| n.id.to_string()).collect();
        assert_eq!(ids, ["2", "1"]);

        assert!(parse_snapshot(&json!({ "stats": {} })).unwrap().is_empty());
        assert!(parse_snapshot(&json!("nope")).is_err());
    }
}
