//! Ordered, bounded token history
//!
//! The history is an append-mostly log of [`TokenHistoryEntry`] values in
//! non-decreasing `start_time` order, with the entry currently in force
//! tracked as an index into the log. It owns the whole transition algorithm
//! for `set` calls: account inheritance, idempotent re-sets, in-place
//! expiration updates, appends, and trimming. Callers learn what happened
//! through the returned [`TokenTransition`] and decide which notifications
//! to fan out; the history itself performs no I/O and knows nothing about
//! listeners.

use chrono::{DateTime, Utc};

use crate::entry::TokenHistoryEntry;
use crate::error::{DomainError, DomainResult};

/// Default maximum number of retained history entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Outcome of applying one `set` call to the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenTransition {
    /// The call matched the current entry exactly; nothing was recorded.
    Unchanged,
    /// Only the expiration of the current entry changed, in place. No new
    /// entry was recorded.
    ExpiryUpdated {
        /// The new expiration, `None` when the update removed it.
        expires_on: Option<DateTime<Utc>>,
    },
    /// A new entry was recorded and became current.
    Changed {
        /// The token now in force.
        token: Option<String>,
        /// The account now in force (possibly inherited from the previous
        /// entry).
        account_id: Option<String>,
        /// True when the previous entry carried an account and the new one
        /// does not, so consumers can purge account-scoped state.
        account_cleared: bool,
    },
}

/// Bounded log of token validity windows with a current-entry index.
///
/// Always holds at least one entry: construction seeds a placeholder that
/// applies "since the beginning of recorded history", so lookups never come
/// up empty.
#[derive(Debug, Clone)]
pub struct TokenHistory {
    entries: Vec<TokenHistoryEntry>,
    current_index: usize,
    limit: usize,
}

impl TokenHistory {
    /// Creates a history seeded with the placeholder entry.
    ///
    /// `limit` caps the number of retained entries; values below 1 behave
    /// as 1 since the current entry is never evicted.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: vec![TokenHistoryEntry::placeholder()],
            current_index: 0,
            limit: limit.max(1),
        }
    }

    /// The entry currently in force.
    #[must_use]
    pub fn current(&self) -> &TokenHistoryEntry {
        &self.entries[self.current_index]
    }

    /// All retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[TokenHistoryEntry] {
        &self.entries
    }

    /// An owned copy of the retained entries, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TokenHistoryEntry> {
        self.entries.clone()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the history holds no entries. Cannot occur through this
    /// type's own operations; present for completeness of the slice-like
    /// surface.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured retention cap.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Applies one `set` call and reports what changed.
    ///
    /// The algorithm, in order:
    /// 1. Setting a token without an explicit account inherits the current
    ///    entry's account, so token rotation keeps the signed-in identity.
    ///    Calls that clear the token never inherit.
    /// 2. If the resulting token/account pair matches the current entry and
    ///    the current entry is real (or the context has not started), the
    ///    call records nothing; a differing `expires_on` is written onto the
    ///    current entry in place and reported as [`TokenTransition::ExpiryUpdated`].
    /// 3. Otherwise a new entry is appended with `start_time = now`. Entries
    ///    recorded before `started` are themselves temporary, and the first
    ///    post-start call always supersedes a temporary current entry, even
    ///    with an identical pair.
    /// 4. The log is trimmed to the retention cap, oldest entries first.
    pub fn apply(
        &mut self,
        token: Option<String>,
        account_id: Option<String>,
        expires_on: Option<DateTime<Utc>>,
        started: bool,
        now: DateTime<Utc>,
    ) -> TokenTransition {
        let account_id = if token.is_some() && account_id.is_none() {
            self.current().account_id.clone()
        } else {
            account_id
        };

        let same_pair = self
            .current()
            .matches_credentials(token.as_deref(), account_id.as_deref());
        let supersedes_placeholder = started && self.current().temporary;
        if same_pair && !supersedes_placeholder {
            if self.current().expires_on == expires_on {
                return TokenTransition::Unchanged;
            }
            self.entries[self.current_index].expires_on = expires_on;
            return TokenTransition::ExpiryUpdated { expires_on };
        }

        let account_cleared = self.current().has_account() && account_id.is_none();
        self.entries.push(TokenHistoryEntry {
            account_id: account_id.clone(),
            token: token.clone(),
            start_time: Some(now),
            expires_on,
            temporary: !started,
        });
        self.current_index = self.entries.len() - 1;
        self.trim_to_limit();
        debug_assert!(
            Self::validate(&self.entries).is_ok(),
            "token history lost its ordering invariant"
        );

        TokenTransition::Changed {
            token,
            account_id,
            account_cleared,
        }
    }

    /// Resolves the entry that was in force at `timestamp`.
    ///
    /// Picks the newest entry whose `start_time` is at or before the
    /// timestamp, treating an absent `start_time` as older than everything.
    /// Timestamps that predate the oldest window resolve to the oldest
    /// entry, so a non-empty history always yields an answer.
    #[must_use]
    pub fn entry_at(&self, timestamp: DateTime<Utc>) -> Option<&TokenHistoryEntry> {
        let idx = self
            .entries
            .partition_point(|entry| entry.start_time.is_none_or(|start| start <= timestamp));
        if idx == 0 {
            self.entries.first()
        } else {
            self.entries.get(idx - 1)
        }
    }

    /// Replaces the log with a previously persisted snapshot.
    ///
    /// The snapshot must satisfy [`TokenHistory::validate`]; the last entry
    /// becomes current and the log is trimmed to the retention cap.
    ///
    /// # Errors
    ///
    /// Returns the validation failure untouched; the log keeps its previous
    /// contents in that case.
    pub fn restore(&mut self, entries: Vec<TokenHistoryEntry>) -> DomainResult<()> {
        Self::validate(&entries)?;
        self.current_index = entries.len() - 1;
        self.entries = entries;
        self.trim_to_limit();
        Ok(())
    }

    /// Checks the ordering invariant of a candidate snapshot: at least one
    /// entry, non-decreasing `start_time`, and an absent `start_time` only
    /// in first position.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyHistory`], [`DomainError::OutOfOrder`],
    /// or [`DomainError::MisplacedOpenStart`] naming the offending index.
    pub fn validate(entries: &[TokenHistoryEntry]) -> DomainResult<()> {
        if entries.is_empty() {
            return Err(DomainError::EmptyHistory);
        }
        for (index, window) in entries.windows(2).enumerate() {
            let position = index + 1;
            if window[1].start_time.is_none() {
                return Err(DomainError::MisplacedOpenStart(position));
            }
            if window[1].start_time < window[0].start_time {
                return Err(DomainError::OutOfOrder(position));
            }
        }
        Ok(())
    }

    /// Evicts oldest entries until the cap holds, never evicting current.
    /// Removing the open-start entry promotes its successor to inherit the
    /// absent start, so lookups before the oldest window keep resolving.
    fn trim_to_limit(&mut self) {
        while self.entries.len() > self.limit && self.current_index > 0 {
            if self.entries[0].start_time.is_none() {
                self.entries[1].start_time = None;
            }
            self.entries.remove(0);
            self.current_index -= 1;
        }
    }
}

impl Default for TokenHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
