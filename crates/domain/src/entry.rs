//! Token history entries
//!
//! Each entry records which token (and account) was authoritative over a
//! window of time. Windows are half-open: an entry applies from its
//! `start_time` until the next entry's `start_time`, and the newest entry
//! applies until it is superseded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded token validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHistoryEntry {
    /// Account the token belongs to. `None` means no authenticated identity.
    pub account_id: Option<String>,
    /// The token value. `None` is an explicit "no token" state, distinct
    /// from an empty string.
    pub token: Option<String>,
    /// When this entry became authoritative. `None` means "since the
    /// beginning of recorded history" and may only appear on the oldest
    /// entry.
    pub start_time: Option<DateTime<Utc>>,
    /// When the token stops being usable, if known.
    pub expires_on: Option<DateTime<Utc>>,
    /// True for entries recorded before any real consumer started the
    /// context. A temporary entry is superseded by, never merged with, the
    /// first real entry.
    #[serde(default)]
    pub temporary: bool,
}

impl TokenHistoryEntry {
    /// Creates a real (non-temporary) entry.
    #[must_use]
    pub const fn new(
        token: Option<String>,
        account_id: Option<String>,
        start_time: Option<DateTime<Utc>>,
        expires_on: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            account_id,
            token,
            start_time,
            expires_on,
            temporary: false,
        }
    }

    /// Creates the placeholder entry synthesized at context construction,
    /// before any token has been observed.
    #[must_use]
    pub const fn placeholder() -> Self {
        Self {
            account_id: None,
            token: None,
            start_time: None,
            expires_on: None,
            temporary: true,
        }
    }

    /// Returns true if consumers must treat the token as invalid at `now`.
    /// Entries without a known expiration never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|expires_on| now >= expires_on)
    }

    /// Returns true if this entry carries exactly the given token/account
    /// pair. A `None` on either side only matches `None`.
    #[must_use]
    pub fn matches_credentials(&self, token: Option<&str>, account_id: Option<&str>) -> bool {
        self.token.as_deref() == token && self.account_id.as_deref() == account_id
    }

    /// Returns true if this entry carries an account.
    #[must_use]
    pub const fn has_account(&self) -> bool {
        self.account_id.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_placeholder_entry() {
        let entry = TokenHistoryEntry::placeholder();
        assert!(entry.temporary);
        assert!(entry.token.is_none());
        assert!(entry.account_id.is_none());
        assert!(entry.start_time.is_none());
        assert!(entry.expires_on.is_none());
    }

    #[test]
    fn test_expiry_predicate() {
        let entry = TokenHistoryEntry::new(
            Some("tok".to_string()),
            Some("acct".to_string()),
            Some(ts(100)),
            Some(ts(200)),
        );
        assert!(!entry.is_expired_at(ts(150)));
        assert!(entry.is_expired_at(ts(200)));
        assert!(entry.is_expired_at(ts(300)));

        let open_ended = TokenHistoryEntry::new(Some("tok".to_string()), None, Some(ts(100)), None);
        assert!(!open_ended.is_expired_at(ts(10_000_000_000)));
    }

    #[test]
    fn test_credential_matching_distinguishes_none_from_empty() {
        let entry = TokenHistoryEntry::new(None, Some("acct".to_string()), Some(ts(1)), None);
        assert!(entry.matches_credentials(None, Some("acct")));
        assert!(!entry.matches_credentials(Some(""), Some("acct")));
        assert!(!entry.matches_credentials(None, None));
    }

    #[test]
    fn test_snapshot_without_temporary_field_still_loads() {
        let json = r#"{"account_id":"acct","token":"tok","start_time":"2024-01-01T00:00:00Z","expires_on":null}"#;
        let entry: TokenHistoryEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.temporary);
        assert_eq!(entry.account_id.as_deref(), Some("acct"));
        assert_eq!(entry.token.as_deref(), Some("tok"));
    }
}
