//! Integration tests for the token context lifecycle.
//!
//! These tests drive [`AuthTokenContext`] through full identity flows,
//! wiring the infrastructure clock adapters into the application layer
//! and observing fan-out through a registered delegate.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, Utc};

use signet_application::ports::Clock;
use signet_application::{AuthTokenContext, TokenContextDelegate};
use signet_domain::TokenHistory;
use signet_infrastructure::SystemClock;

/// Clock whose reading only moves when a test says so.
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn at(secs: i64) -> Arc<Self> {
        let now = DateTime::from_timestamp(secs, 0).expect("Failed to build timestamp");
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    fn advance_to(&self, secs: i64) {
        let now = DateTime::from_timestamp(secs, 0).expect("Failed to build timestamp");
        *self.now.lock().expect("Lock poisoned") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("Lock poisoned")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    TokenChanged(Option<String>, Option<String>),
    ExpirationUpdated(Option<DateTime<Utc>>),
    AccountCleared,
}

struct RecordingDelegate {
    observed: Mutex<Vec<Observed>>,
}

impl RecordingDelegate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            observed: Mutex::new(Vec::new()),
        })
    }

    fn observed(&self) -> Vec<Observed> {
        self.observed.lock().expect("Lock poisoned").clone()
    }
}

impl TokenContextDelegate for RecordingDelegate {
    fn on_token_changed(&self, new_token: Option<&str>, new_account_id: Option<&str>) {
        self.observed
            .lock()
            .expect("Lock poisoned")
            .push(Observed::TokenChanged(
                new_token.map(ToString::to_string),
                new_account_id.map(ToString::to_string),
            ));
    }

    fn on_token_expiration_updated(&self, new_expires_on: Option<DateTime<Utc>>) {
        self.observed
            .lock()
            .expect("Lock poisoned")
            .push(Observed::ExpirationUpdated(new_expires_on));
    }

    fn on_account_cleared(&self) {
        self.observed
            .lock()
            .expect("Lock poisoned")
            .push(Observed::AccountCleared);
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("Failed to build timestamp")
}

#[test]
fn test_identity_flow_from_placeholder_to_sign_out() {
    let clock = ManualClock::at(10);
    let context = AuthTokenContext::new(clock.clone());
    let delegate = RecordingDelegate::new();
    let handle: Arc<dyn TokenContextDelegate> = delegate.clone();
    context.add_delegate(&handle);

    // Freshly constructed: an anonymous placeholder is current.
    let initial = context.current_entry();
    assert_eq!(initial.token, None);
    assert_eq!(initial.account_id, None);
    assert!(initial.temporary);

    // Matching the placeholder is a no-op while nothing has signed in.
    context.set_auth_token(None, None, None);
    assert_eq!(context.history_len(), 1);
    assert!(delegate.observed().is_empty());

    // First sign-in appends and notifies once.
    clock.advance_to(20);
    context.set_auth_token(Some("tok1".to_string()), Some("acct1".to_string()), None);
    assert_eq!(context.history_len(), 2);
    assert_eq!(context.current_token().as_deref(), Some("tok1"));
    assert_eq!(context.current_account_id().as_deref(), Some("acct1"));
    assert_eq!(
        delegate.observed(),
        vec![Observed::TokenChanged(
            Some("tok1".to_string()),
            Some("acct1".to_string()),
        )]
    );

    // A refresh without an explicit account inherits the current one.
    clock.advance_to(30);
    context.set_auth_token(Some("tok2".to_string()), None, None);
    assert_eq!(context.history_len(), 3);
    assert_eq!(context.current_token().as_deref(), Some("tok2"));
    assert_eq!(context.current_account_id().as_deref(), Some("acct1"));

    // Sign-out clears both and reports the account loss separately.
    clock.advance_to(40);
    context.set_auth_token(None, None, None);
    assert_eq!(context.current_token(), None);
    assert_eq!(context.current_account_id(), None);
    assert_eq!(
        delegate.observed(),
        vec![
            Observed::TokenChanged(Some("tok1".to_string()), Some("acct1".to_string())),
            Observed::TokenChanged(Some("tok2".to_string()), Some("acct1".to_string())),
            Observed::TokenChanged(None, None),
            Observed::AccountCleared,
        ]
    );
}

#[test]
fn test_started_lifecycle_with_expiry_refresh_and_lookups() {
    let clock = ManualClock::at(100);
    let context = AuthTokenContext::new(clock.clone());
    let delegate = RecordingDelegate::new();
    let handle: Arc<dyn TokenContextDelegate> = delegate.clone();
    context.add_delegate(&handle);

    context.start();
    assert!(context.is_started());

    context.set_auth_token(
        Some("tok1".to_string()),
        Some("acct1".to_string()),
        Some(ts(500)),
    );

    // Same credentials with a fresher deadline update in place.
    clock.advance_to(200);
    context.set_auth_token(
        Some("tok1".to_string()),
        Some("acct1".to_string()),
        Some(ts(900)),
    );
    assert_eq!(context.history_len(), 2);
    assert_eq!(context.current_entry().expires_on, Some(ts(900)));

    clock.advance_to(300);
    context.set_auth_token(Some("tok2".to_string()), None, Some(ts(1200)));

    // Lookups resolve against the recorded validity windows.
    let before_any = context.token_at(ts(50)).expect("Failed to resolve entry");
    assert_eq!(before_any.token, None);
    let first_window = context.token_at(ts(150)).expect("Failed to resolve entry");
    assert_eq!(first_window.token.as_deref(), Some("tok1"));
    let second_window = context.token_at(ts(301)).expect("Failed to resolve entry");
    assert_eq!(second_window.token.as_deref(), Some("tok2"));

    assert_eq!(
        delegate.observed(),
        vec![
            Observed::TokenChanged(Some("tok1".to_string()), Some("acct1".to_string())),
            Observed::ExpirationUpdated(Some(ts(900))),
            Observed::TokenChanged(Some("tok2".to_string()), Some("acct1".to_string())),
        ]
    );
}

#[test]
fn test_concurrent_sign_ins_keep_history_well_formed() {
    let clock = Arc::new(SystemClock::new());
    let context = AuthTokenContext::new(clock);
    context.start();

    let mut workers = Vec::new();
    for worker in 0..4 {
        let context = context.clone();
        workers.push(thread::spawn(move || {
            for round in 0..25 {
                let token = format!("tok-{worker}-{round}");
                let account = format!("acct-{worker}");
                context.set_auth_token(Some(token), Some(account), None);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("Failed to join worker");
    }

    let snapshot = context.history_snapshot();
    TokenHistory::validate(&snapshot).expect("History lost its ordering invariant");
    assert!(context.current_token().is_some());
}
