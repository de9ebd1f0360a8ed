//! Ports to the external record store and artifact storage.
//!
//! The storage engines themselves live outside the core; `procura-db` ships
//! SQLite and in-memory implementations.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::record::{LooseRecord, RecordBatch};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordDomain {
    PurchaseOrders,
    Invoices,
    PriceList,
}

impl RecordDomain {
    pub const ALL: [RecordDomain; 3] = [Self::PurchaseOrders, Self::Invoices, Self::PriceList];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurchaseOrders => "purchase_orders",
            Self::Invoices => "invoices",
            Self::PriceList => "price_list",
        }
    }
}

impl std::str::FromStr for RecordDomain {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "purchase_orders" | "orders" => Ok(Self::PurchaseOrders),
            "invoices" => Ok(Self::Invoices),
            "price_list" | "prices" => Ok(Self::PriceList),
            other => Err(StoreError::InvalidKey(format!(
                "unknown record domain `{other}` (expected purchase_orders|invoices|price_list)"
            ))),
        }
    }
}

impl fmt::Display for RecordDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one upload batch: `owner/domain/batch`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub owner_id: String,
    pub domain: RecordDomain,
    pub batch_id: String,
}

impl CollectionKey {
    pub fn new(owner_id: impl Into<String>, domain: RecordDomain, batch_id: impl Into<String>) -> Self {
        Self { owner_id: owner_id.into(), domain, batch_id: batch_id.into() }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner_id, self.domain, self.batch_id)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record decode failed: {0}")]
    Decode(String),
    #[error("invalid store key: {0}")]
    InvalidKey(String),
}

/// Opaque handle of a stored artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle(pub String);

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every batch the owner uploaded for `domain`, grouped by batch.
    async fn list_records(
        &self,
        owner_id: &str,
        domain: RecordDomain,
    ) -> Result<Vec<RecordBatch>, StoreError>;

    /// Insert or replace one addressable record inside a batch.
    async fn put_record(
        &self,
        collection: &CollectionKey,
        record_id: &str,
        record: LooseRecord,
    ) -> Result<(), StoreError>;

    /// Remove a whole batch. Returns how many records were deleted.
    async fn delete_batch(&self, collection: &CollectionKey) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn store_artifact(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactHandle, StoreError>;
}
