//! Record store and artifact sink implementations.

use thiserror::Error;

use procura_core::store::StoreError;

pub mod artifact;
pub mod memory;
pub mod record;

pub use artifact::SqlArtifactSink;
pub use memory::{InMemoryArtifactSink, InMemoryRecordStore};
pub use record::SqlRecordStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => StoreError::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}
