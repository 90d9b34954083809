// ── Notification identity ──
//
// Ids are server-assigned. Database-backed notifications carry integers,
// but ids also travel through URLs and CLI arguments as text, so `"7"`
// and `7` must compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a notification.
///
/// Numeric-looking strings normalize to [`NotificationId::Numeric`], so a
/// redelivered frame deduplicates against the snapshot row whatever JSON
/// type the server used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawId")]
pub enum NotificationId {
    Numeric(u64),
    Text(String),
}

impl NotificationId {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Numeric(u64),
    Text(String),
}

impl From<RawId> for NotificationId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Numeric(n) => Self::Numeric(n),
            RawId::Text(s) => Self::from(s),
        }
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for NotificationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<u64> for NotificationId {
    fn from(n: u64) -> Self {
        Self::Numeric(n)
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        match s.trim().parse::<u64>() {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Text(s),
        }
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}
