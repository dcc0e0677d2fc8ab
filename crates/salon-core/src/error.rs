//! Error types for salon-core

use thiserror::Error;

use crate::models::Table;
use crate::store::StoreError;

/// Result type alias using salon-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in salon-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The remote store refused a write intent; nothing was applied locally
    #[error("Write to {table} rejected: {source}")]
    WriteRejected {
        table: Table,
        #[source]
        source: StoreError,
    },

    /// Record not present in the local mirror
    #[error("Record not found in {table}: {id}")]
    NotFound { table: Table, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The mirror has been torn down
    #[error("Mirror has been shut down")]
    Closed,
}

impl Error {
    /// Returns true when the error came from the remote store refusing a write.
    #[must_use]
    pub const fn is_write_rejected(&self) -> bool {
        matches!(self, Self::WriteRejected { .. })
    }
}
