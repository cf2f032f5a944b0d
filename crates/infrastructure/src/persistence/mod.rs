//! Persistence adapters for token history snapshots.

mod history_store;

pub use history_store::FileHistoryStore;
