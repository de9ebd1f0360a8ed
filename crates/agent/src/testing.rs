//! Test doubles shared by the agent's unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use procura_core::{CollectionKey, LooseRecord, RecordBatch, RecordDomain, RecordStore, StoreError};
use procura_db::InMemoryRecordStore;

use crate::llm::{Content, GenerateRequest, GenerativeModel, LlmError, ModelResponse};

pub fn order_row(index: usize, supplier: &str) -> LooseRecord {
    LooseRecord::new(index)
        .with_field("Order Number", format!("PO-{}", 100 + index))
        .with_field("Supplier Name", supplier)
        .with_field("Buyer Name", "Maija Virtanen")
        .with_field("Order Date", "2024-04-02")
        .with_field("Product Description", "Oil filter")
}

pub fn price_row(index: usize, product: &str) -> LooseRecord {
    LooseRecord::new(index)
        .with_field("Product Name", product)
        .with_field("Price List Name", "Spring 2024")
        .with_field("Supplier", "Huolto-Karhu Oy")
        .with_field("Unit Price", 12.5)
}

/// Record store for agent tests. Delegates to the in-memory store and can be
/// switched offline to exercise storage failures.
#[derive(Default)]
pub struct MemoryStore {
    offline: bool,
    seeded: AtomicUsize,
    inner: InMemoryRecordStore,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self { offline: true, ..Self::default() }
    }

    /// Stores `records` as a new upload batch for `owner`.
    pub async fn seed(&self, owner: &str, domain: RecordDomain, records: Vec<LooseRecord>) {
        let upload = self.seeded.fetch_add(1, Ordering::SeqCst);
        let collection = CollectionKey::new(owner, domain, format!("seed-{upload}"));
        for record in records {
            let record_id = format!("row-{}", record.row_index);
            self.inner.put_record(&collection, &record_id, record).await.expect("seed");
        }
    }

    pub async fn count(&self, owner: &str, domain: RecordDomain) -> usize {
        self.inner
            .list_records(owner, domain)
            .await
            .expect("list")
            .iter()
            .map(|batch| batch.records.len())
            .sum()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("test store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_records(
        &self,
        owner_id: &str,
        domain: RecordDomain,
    ) -> Result<Vec<RecordBatch>, StoreError> {
        self.check_online()?;
        self.inner.list_records(owner_id, domain).await
    }

    async fn put_record(
        &self,
        collection: &CollectionKey,
        record_id: &str,
        record: LooseRecord,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.put_record(collection, record_id, record).await
    }

    async fn delete_batch(&self, collection: &CollectionKey) -> Result<usize, StoreError> {
        self.check_online()?;
        self.inner.delete_batch(collection).await
    }
}

/// What the model was asked on one call.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub system_instruction: String,
    pub contents: Vec<Content>,
    pub function_names: Vec<String>,
}

/// Model that replays a fixed script and records every request. Once the
/// script runs out it answers with no candidate.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Option<ModelResponse>, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<Option<ModelResponse>, LlmError>>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<Option<ModelResponse>, LlmError> {
        self.requests.lock().expect("requests lock").push(RecordedRequest {
            system_instruction: request.system_instruction.to_string(),
            contents: request.contents.to_vec(),
            function_names: request.functions.iter().map(|function| function.name.clone()).collect(),
        });
        self.script.lock().expect("script lock").pop_front().unwrap_or(Ok(None))
    }
}
