//! Signet Domain - Core token identity types
//!
//! This crate defines the domain model for the Signet auth token context:
//! token validity windows and the ordered, bounded history that tracks
//! them. All types here are pure Rust with no I/O dependencies.

pub mod entry;
pub mod error;
pub mod history;

pub use entry::TokenHistoryEntry;
pub use error::{DomainError, DomainResult};
pub use history::{DEFAULT_HISTORY_LIMIT, TokenHistory, TokenTransition};
