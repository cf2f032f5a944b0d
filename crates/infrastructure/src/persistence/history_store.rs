//! Token history persistence.
//!
//! Stores the history snapshot in the platform-specific config directory:
//! - Linux/macOS: `~/.config/signet/token_history.json`
//! - Windows: `%APPDATA%/signet/token_history.json`
//!
//! The on-disk document is versioned so older snapshots keep loading as
//! the entry shape evolves:
//! ```json
//! {
//!   "schema_version": 1,
//!   "entries": [
//!     {
//!       "account_id": "acct-1",
//!       "token": "token-value",
//!       "start_time": "2024-01-01T00:00:00Z",
//!       "expires_on": null,
//!       "temporary": false
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use signet_application::ports::{HistoryStore, HistoryStoreError};
use signet_domain::TokenHistoryEntry;

use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

/// Version written into new documents.
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    entries: Vec<TokenHistoryEntry>,
}

const fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// File-backed [`HistoryStore`] writing deterministic JSON.
///
/// Token values are stored as given; callers that need at-rest protection
/// should wrap or replace this adapter with one backed by their platform's
/// secret storage.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    /// Creates a store reading and writing an explicit file path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store under the platform config directory
    /// (`signet/token_history.json`).
    ///
    /// # Errors
    ///
    /// Returns [`HistoryStoreError::Unavailable`] when the platform config
    /// directory cannot be determined.
    pub fn in_config_dir() -> Result<Self, HistoryStoreError> {
        let Some(dir) = dirs::config_dir() else {
            return Err(HistoryStoreError::Unavailable(
                "no platform config directory".to_string(),
            ));
        };
        Ok(Self::new(dir.join("signet").join("token_history.json")))
    }

    /// The file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self) -> Result<Vec<TokenHistoryEntry>, HistoryStoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read(&self.path).await?;
        let document: HistoryDocument = from_json_bytes(&content).map_err(serialization_error)?;
        tracing::debug!(
            entries = document.entries.len(),
            schema_version = document.schema_version,
            "token history loaded"
        );
        Ok(document.entries)
    }

    async fn save(&self, entries: &[TokenHistoryEntry]) -> Result<(), HistoryStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let document = HistoryDocument {
            schema_version: SCHEMA_VERSION,
            entries: entries.to_vec(),
        };
        let content = to_json_stable_bytes(&document).map_err(serialization_error)?;
        fs::write(&self.path, content).await?;
        tracing::debug!(entries = entries.len(), "token history saved");
        Ok(())
    }
}

fn serialization_error(err: SerializationError) -> HistoryStoreError {
    HistoryStoreError::Serialization(err.to_string())
}
