//! History store port
//!
//! Defines the interface for persisting token history snapshots.

use async_trait::async_trait;

use signet_domain::TokenHistoryEntry;

/// Errors that can occur during history store operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryStoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backing storage location could not be determined or opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Repository trait for token history persistence.
///
/// The context never touches storage itself; its owner loads a snapshot at
/// startup and hands it to `AuthTokenContext::restore_history`, and saves a
/// snapshot whenever it sees fit. Adapters live in the infrastructure layer.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Loads the persisted history snapshot.
    ///
    /// # Returns
    /// The stored entries, oldest first. An empty vector means nothing has
    /// been persisted yet.
    ///
    /// # Errors
    /// Returns an error if the snapshot exists but cannot be read or decoded.
    async fn load(&self) -> Result<Vec<TokenHistoryEntry>, HistoryStoreError>;

    /// Persists a history snapshot, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be written.
    async fn save(&self, entries: &[TokenHistoryEntry]) -> Result<(), HistoryStoreError>;
}
