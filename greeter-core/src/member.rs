//! Member identity and lifecycle records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform user id of a chat member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(i64);

impl MemberId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MemberId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle record of a tracked member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Display name at join time.
    pub display_name: String,

    /// Handle at join time, if the member had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// When the member joined.
    pub joined_at: DateTime<Utc>,

    /// Whether the member has been reminded to introduce themselves.
    #[serde(default)]
    pub notified: bool,
}

impl MemberRecord {
    /// Creates a fresh, not yet notified record.
    pub fn new(
        display_name: impl Into<String>,
        handle: Option<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            handle,
            joined_at,
            notified: false,
        }
    }

    /// Time since the member joined, as seen at `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.joined_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_creation() {
        let joined = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let record = MemberRecord::new("Alice", Some("alice".to_string()), joined);

        assert_eq!(record.display_name, "Alice");
        assert_eq!(record.handle.as_deref(), Some("alice"));
        assert!(!record.notified);
    }

    #[test]
    fn test_elapsed() {
        let joined = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let record = MemberRecord::new("Alice", None, joined);
        let now = joined + chrono::Duration::hours(30);

        assert_eq!(record.elapsed(now), chrono::Duration::hours(30));
    }

    #[test]
    fn test_member_id_display() {
        assert_eq!(MemberId::new(-1001).to_string(), "-1001");
        assert_eq!(MemberId::from(42).as_i64(), 42);
    }

    #[test]
    fn test_record_without_handle_omits_field() {
        let joined = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let record = MemberRecord::new("Bob", None, joined);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("handle").is_none());

        let parsed: MemberRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
