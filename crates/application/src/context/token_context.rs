//! Process-wide auth token context.
//!
//! The context tracks which token and account are currently in force,
//! keeps a bounded history of past tokens for retroactive attribution of
//! buffered data, and notifies registered listeners synchronously on the
//! mutating thread. One mutex guards the whole state; an admission gate
//! keeps competing token mutations out until an in-flight notification
//! round has completed, and mutations requested from inside a callback are
//! deferred and applied right after it.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};

use signet_domain::{DEFAULT_HISTORY_LIMIT, TokenHistory, TokenHistoryEntry, TokenTransition};

use crate::context::delegate::{TokenContextDelegate, token_preview};
use crate::error::ApplicationResult;
use crate::ports::Clock;

/// Tuning options for [`AuthTokenContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Maximum number of retained history entries.
    pub history_limit: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Thread-safe coordinator for the process's authentication identity.
///
/// Cloning yields another handle to the same context. Consumers register
/// [`TokenContextDelegate`] listeners; auth-providing services report token
/// changes through [`set_auth_token`](Self::set_auth_token).
#[derive(Clone)]
pub struct AuthTokenContext {
    shared: Arc<Shared>,
}

struct Shared {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    /// Signalled when a notification round and its deferred mutations have
    /// drained, re-admitting parked mutators.
    fan_out_done: Condvar,
}

struct State {
    history: TokenHistory,
    started: bool,
    /// Registration-ordered listener handles. Non-owning; dropped listeners
    /// are pruned on iteration.
    delegates: Vec<Weak<dyn TokenContextDelegate>>,
    /// Thread currently running a notification round, if any.
    notifying: Option<ThreadId>,
    /// Mutations requested from inside a callback on the notifying thread,
    /// applied in order once the round completes.
    deferred: VecDeque<Mutation>,
}

enum Mutation {
    Set {
        token: Option<String>,
        account_id: Option<String>,
        expires_on: Option<DateTime<Utc>>,
    },
    Reset,
}

impl AuthTokenContext {
    /// Creates a context with default options. The current entry starts as
    /// a placeholder that applies since the beginning of recorded history.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, ContextOptions::default())
    }

    /// Creates a context with custom options.
    #[must_use]
    pub fn with_options(clock: Arc<dyn Clock>, options: ContextOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                state: Mutex::new(State {
                    history: TokenHistory::new(options.history_limit),
                    started: false,
                    delegates: Vec::new(),
                    notifying: None,
                    deferred: VecDeque::new(),
                }),
                fan_out_done: Condvar::new(),
            }),
        }
    }

    /// Marks the context as started by a real consumer. Idempotent.
    ///
    /// A temporary current entry survives this call and stays authoritative
    /// until the next [`set_auth_token`](Self::set_auth_token), which then
    /// supersedes it rather than merging with it.
    pub fn start(&self) {
        let mut state = self.lock_state();
        if state.started {
            return;
        }
        state.started = true;
        tracing::debug!("auth token context started");
    }

    /// True once a real consumer has started the context.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.lock_state().started
    }

    /// Registers a listener. The context keeps only a weak handle, so it
    /// never extends the listener's lifetime; a dropped listener is skipped
    /// silently. Registering the same listener twice has no effect.
    pub fn add_delegate(&self, delegate: &Arc<dyn TokenContextDelegate>) {
        let handle = Arc::downgrade(delegate);
        let mut state = self.lock_state();
        if state.delegates.iter().any(|existing| existing.ptr_eq(&handle)) {
            return;
        }
        state.delegates.push(handle);
    }

    /// Unregisters a listener; a silent no-op when it was never registered.
    /// An in-flight notification round keeps delivering to the snapshot it
    /// already took; removal takes effect from the next round.
    pub fn remove_delegate(&self, delegate: &Arc<dyn TokenContextDelegate>) {
        let handle = Arc::downgrade(delegate);
        let mut state = self.lock_state();
        state.delegates.retain(|existing| !existing.ptr_eq(&handle));
    }

    /// Number of live registered listeners. Prunes dropped handles.
    #[must_use]
    pub fn delegate_count(&self) -> usize {
        let mut state = self.lock_state();
        state.delegates.retain(|delegate| delegate.strong_count() > 0);
        state.delegates.len()
    }

    /// Records a token change and notifies listeners before returning.
    ///
    /// Passing `None` for `token` clears it; passing `None` for
    /// `account_id` while setting a token inherits the current account, so
    /// rotation keeps the signed-in identity. Re-setting the identical
    /// token/account pair records nothing; if only `expires_on` differs it
    /// is rewritten onto the current entry in place and announced through
    /// the lighter expiration notification.
    ///
    /// Listener callbacks run synchronously on this thread, and no other
    /// thread's token mutation is admitted until they finish. Calling this
    /// from inside a callback does not deadlock: the nested call returns
    /// immediately and is applied, with its own notification round, after
    /// the current one completes.
    pub fn set_auth_token(
        &self,
        token: Option<String>,
        account_id: Option<String>,
        expires_on: Option<DateTime<Utc>>,
    ) {
        self.submit(Mutation::Set {
            token,
            account_id,
            expires_on,
        });
    }

    /// The token currently in force.
    #[must_use]
    pub fn current_token(&self) -> Option<String> {
        self.lock_state().history.current().token.clone()
    }

    /// The account currently in force.
    #[must_use]
    pub fn current_account_id(&self) -> Option<String> {
        self.lock_state().history.current().account_id.clone()
    }

    /// A copy of the entry currently in force. Never absent: before any
    /// token is observed this is the placeholder entry.
    #[must_use]
    pub fn current_entry(&self) -> TokenHistoryEntry {
        self.lock_state().history.current().clone()
    }

    /// Resolves the entry that was in force at `timestamp`, for retroactive
    /// attribution of buffered data. Returns `None` only for an empty
    /// history, which cannot occur through this type's own operations.
    ///
    /// Queries take the state lock but not the admission gate, so listeners
    /// may call this from inside a callback.
    #[must_use]
    pub fn token_at(&self, timestamp: DateTime<Utc>) -> Option<TokenHistoryEntry> {
        self.lock_state().history.entry_at(timestamp).cloned()
    }

    /// An owned copy of the retained history, oldest first. This is the
    /// form that crosses the persistence port.
    #[must_use]
    pub fn history_snapshot(&self) -> Vec<TokenHistoryEntry> {
        self.lock_state().history.snapshot()
    }

    /// Number of retained history entries.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.lock_state().history.len()
    }

    /// Replaces the in-memory history with a previously persisted snapshot.
    /// The snapshot's last entry becomes current and no notification fires;
    /// this is an owner-side bootstrap step, meant to run before consumers
    /// register.
    ///
    /// # Errors
    ///
    /// Returns the domain validation failure if the snapshot is empty, out
    /// of chronological order, or carries an open-start entry anywhere but
    /// first. The context keeps its previous state in that case.
    pub fn restore_history(&self, entries: Vec<TokenHistoryEntry>) -> ApplicationResult<()> {
        let current_thread = thread::current().id();
        let mut state = self.lock_state();
        if state.notifying != Some(current_thread) {
            while state.notifying.is_some() {
                state = self.wait_for_fan_out(state);
            }
        }
        let count = entries.len();
        state.history.restore(entries)?;
        tracing::info!(entries = count, "token history restored from snapshot");
        Ok(())
    }

    /// Restores the unstarted initial state: placeholder-only history, no
    /// listeners, nothing pending. Intended for test isolation between
    /// cases sharing a context. Deferred mutations queued by the current
    /// notification round are discarded.
    pub fn reset(&self) {
        self.submit(Mutation::Reset);
    }

    /// Routes a mutation through the admission gate. Nested calls from the
    /// notifying thread are queued instead, keeping callbacks deadlock-free
    /// while preserving application order.
    fn submit(&self, mutation: Mutation) {
        let current_thread = thread::current().id();
        let mut state = self.lock_state();
        if state.notifying == Some(current_thread) {
            state.deferred.push_back(mutation);
            return;
        }
        while state.notifying.is_some() {
            state = self.wait_for_fan_out(state);
        }
        self.run_mutations(state, mutation);
    }

    /// Applies `first` plus any mutations its callbacks defer, running one
    /// notification round per recorded change. The state lock is dropped
    /// while callbacks execute; the `notifying` marker keeps competing
    /// mutators parked until the whole round has drained.
    fn run_mutations<'a>(&'a self, mut state: MutexGuard<'a, State>, first: Mutation) {
        let current_thread = thread::current().id();
        let mut next = Some(first);
        while let Some(mutation) = next {
            let transition = state.apply(mutation, self.shared.clock.as_ref());
            if transition == TokenTransition::Unchanged {
                next = state.deferred.pop_front();
                continue;
            }
            let recipients = state.live_delegates();
            state.notifying = Some(current_thread);
            drop(state);

            notify(&recipients, &transition);

            state = self.lock_state();
            state.notifying = None;
            next = state.deferred.pop_front();
        }
        drop(state);
        self.shared.fan_out_done.notify_all();
    }

    /// The lock is never held across listener callbacks or any other user
    /// code, so poisoning can only come from an internal defect; recover
    /// with the guard rather than propagate.
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_for_fan_out<'a>(&'a self, state: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.shared
            .fan_out_done
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AuthTokenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("AuthTokenContext")
            .field("started", &state.started)
            .field("history_len", &state.history.len())
            .field("delegates", &state.delegates.len())
            .finish_non_exhaustive()
    }
}

impl State {
    fn apply(&mut self, mutation: Mutation, clock: &dyn Clock) -> TokenTransition {
        match mutation {
            Mutation::Set {
                token,
                account_id,
                expires_on,
            } => {
                let now = clock.now();
                let transition = self
                    .history
                    .apply(token, account_id, expires_on, self.started, now);
                log_transition(&transition);
                transition
            }
            Mutation::Reset => {
                self.history = TokenHistory::new(self.history.limit());
                self.started = false;
                self.delegates.clear();
                self.deferred.clear();
                tracing::debug!("auth token context reset");
                TokenTransition::Unchanged
            }
        }
    }

    /// Snapshot of the live listeners in registration order; dead handles
    /// are pruned as a side effect.
    fn live_delegates(&mut self) -> Vec<Arc<dyn TokenContextDelegate>> {
        self.delegates.retain(|delegate| delegate.strong_count() > 0);
        self.delegates.iter().filter_map(Weak::upgrade).collect()
    }
}

fn log_transition(transition: &TokenTransition) {
    match transition {
        TokenTransition::Changed {
            token,
            account_id,
            account_cleared,
        } => {
            let preview = token
                .as_deref()
                .map_or_else(|| "<none>".to_string(), token_preview);
            tracing::debug!(
                token = %preview,
                has_account = account_id.is_some(),
                account_cleared = *account_cleared,
                "auth token changed"
            );
        }
        TokenTransition::ExpiryUpdated { expires_on } => {
            tracing::debug!(expires_on = ?expires_on, "auth token expiration updated");
        }
        TokenTransition::Unchanged => {}
    }
}

/// Delivers one transition to every recipient in registration order, one
/// pass per signal kind.
fn notify(recipients: &[Arc<dyn TokenContextDelegate>], transition: &TokenTransition) {
    match transition {
        TokenTransition::Changed {
            token,
            account_id,
            account_cleared,
        } => {
            for delegate in recipients {
                deliver(|| delegate.on_token_changed(token.as_deref(), account_id.as_deref()));
            }
            if *account_cleared {
                for delegate in recipients {
                    deliver(|| delegate.on_account_cleared());
                }
            }
        }
        TokenTransition::ExpiryUpdated { expires_on } => {
            for delegate in recipients {
                deliver(|| delegate.on_token_expiration_updated(*expires_on));
            }
        }
        TokenTransition::Unchanged => {}
    }
}

/// Runs one callback isolated from the rest of the round: a panicking
/// listener is reported and skipped, never allowed to starve later
/// listeners or poison the context.
fn deliver(callback: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
        tracing::error!(
            panic = %panic_message(payload.as_ref()),
            "token context listener panicked during notification"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
