//! Listener capability for token context notifications.

use chrono::{DateTime, Utc};

/// Receives synchronous notifications from [`AuthTokenContext`].
///
/// All methods have empty default bodies, so implementors opt into only the
/// signals they care about. Callbacks run on the thread that mutated the
/// context, before any further token mutation is admitted; implementations
/// should return promptly and may query the context, but a callback that
/// mutates it is deferred until the current notification round completes.
///
/// [`AuthTokenContext`]: crate::context::AuthTokenContext
pub trait TokenContextDelegate: Send + Sync {
    /// A new token/account pair came into force.
    ///
    /// `None` values are explicit "no token" / "no account" states, not
    /// placeholders for an empty string.
    fn on_token_changed(&self, new_token: Option<&str>, new_account_id: Option<&str>) {
        let _ = (new_token, new_account_id);
    }

    /// The current token's expiration changed without the token itself
    /// changing. No new history entry was recorded.
    fn on_token_expiration_updated(&self, new_expires_on: Option<DateTime<Utc>>) {
        let _ = new_expires_on;
    }

    /// The signed-in account was cleared. Sent after `on_token_changed`
    /// within the same mutation, so account-scoped buffers can be purged.
    fn on_account_cleared(&self) {}
}

/// Get a preview of a token (first 8 chars + ...) safe for logs.
#[must_use]
pub fn token_preview(token: &str) -> String {
    if token.len() > 12 {
        let head: String = token.chars().take(8).collect();
        format!("{head}...")
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_preview_truncates_long_tokens() {
        assert_eq!(token_preview("abcdefghijklmnop"), "abcdefgh...");
        assert_eq!(token_preview("short"), "short");
    }
}
