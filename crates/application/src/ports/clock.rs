//! Clock port for time queries

use chrono::{DateTime, Utc};

/// Port for reading the current time.
///
/// History entries are stamped through this trait so tests can drive the
/// context with a manual clock. Implementations must return promptly and
/// never block; the context calls this while holding its state lock.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}
