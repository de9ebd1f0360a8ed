use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use procura_core::domain::record::{LooseRecord, RecordBatch};
use procura_core::services::artifact::artifact_handle;
use procura_core::store::{
    ArtifactHandle, ArtifactSink, CollectionKey, RecordDomain, RecordStore, StoreError,
};

/// Records of one batch in insertion order, addressable by record id.
#[derive(Default)]
struct StoredBatch {
    order: Vec<String>,
    records: HashMap<String, LooseRecord>,
}

impl StoredBatch {
    fn upsert(&mut self, record_id: &str, record: LooseRecord) {
        if self.records.insert(record_id.to_string(), record).is_none() {
            self.order.push(record_id.to_string());
        }
    }

    fn to_batch(&self, batch_id: &str) -> RecordBatch {
        let records =
            self.order.iter().filter_map(|id| self.records.get(id)).cloned().collect();
        RecordBatch::new(batch_id, records)
    }
}

type BatchKey = (String, RecordDomain);

#[derive(Default)]
pub struct InMemoryRecordStore {
    batches: RwLock<HashMap<BatchKey, Vec<(String, StoredBatch)>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_records(
        &self,
        owner_id: &str,
        domain: RecordDomain,
    ) -> Result<Vec<RecordBatch>, StoreError> {
        let batches = self.batches.read().await;
        Ok(batches
            .get(&(owner_id.to_string(), domain))
            .map(|entries| {
                entries.iter().map(|(batch_id, stored)| stored.to_batch(batch_id)).collect()
            })
            .unwrap_or_default())
    }

    async fn put_record(
        &self,
        collection: &CollectionKey,
        record_id: &str,
        record: LooseRecord,
    ) -> Result<(), StoreError> {
        if record_id.trim().is_empty() {
            return Err(StoreError::InvalidKey(format!("empty record id in {collection}")));
        }

        let mut batches = self.batches.write().await;
        let entries =
            batches.entry((collection.owner_id.clone(), collection.domain)).or_default();
        match entries.iter_mut().find(|(batch_id, _)| *batch_id == collection.batch_id) {
            Some((_, stored)) => stored.upsert(record_id, record),
            None => {
                let mut stored = StoredBatch::default();
                stored.upsert(record_id, record);
                entries.push((collection.batch_id.clone(), stored));
            }
        }
        Ok(())
    }

    async fn delete_batch(&self, collection: &CollectionKey) -> Result<usize, StoreError> {
        let mut batches = self.batches.write().await;
        let Some(entries) = batches.get_mut(&(collection.owner_id.clone(), collection.domain))
        else {
            return Ok(0);
        };

        let Some(position) =
            entries.iter().position(|(batch_id, _)| *batch_id == collection.batch_id)
        else {
            return Ok(0);
        };
        let (_, removed) = entries.remove(position);
        Ok(removed.order.len())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredArtifact {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct InMemoryArtifactSink {
    artifacts: RwLock<HashMap<String, StoredArtifact>>,
}

impl InMemoryArtifactSink {
    pub async fn get(&self, handle: &ArtifactHandle) -> Option<StoredArtifact> {
        self.artifacts.read().await.get(&handle.0).cloned()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactSink for InMemoryArtifactSink {
    async fn store_artifact(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactHandle, StoreError> {
        let handle = artifact_handle(name, &bytes);
        let mut artifacts = self.artifacts.write().await;
        artifacts.insert(
            handle.clone(),
            StoredArtifact { name: name.to_string(), content_type: content_type.to_string(), bytes },
        );
        Ok(ArtifactHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use procura_core::domain::record::LooseRecord;
    use procura_core::store::{ArtifactSink, CollectionKey, RecordDomain, RecordStore};

    use super::{InMemoryArtifactSink, InMemoryRecordStore};

    #[tokio::test]
    async fn batches_keep_upload_order_and_stay_separate() {
        let store = InMemoryRecordStore::new();
        let first = CollectionKey::new("owner", RecordDomain::Invoices, "jan");
        let second = CollectionKey::new("owner", RecordDomain::Invoices, "feb");

        store.put_record(&first, "r2", LooseRecord::new(2)).await.expect("put");
        store.put_record(&first, "r1", LooseRecord::new(1)).await.expect("put");
        store.put_record(&second, "r1", LooseRecord::new(1)).await.expect("put");

        let batches = store.list_records("owner", RecordDomain::Invoices).await.expect("list");

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].batch_id, "jan");
        let rows: Vec<usize> = batches[0].records.iter().map(|r| r.row_index).collect();
        assert_eq!(rows, vec![2, 1]);
        assert!(store.list_records("owner", RecordDomain::PriceList).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn put_replaces_records_with_the_same_id() {
        let store = InMemoryRecordStore::new();
        let key = CollectionKey::new("owner", RecordDomain::PurchaseOrders, "order-1");

        store.put_record(&key, "1-1", LooseRecord::new(1).with_field("Qty", 1.0)).await.expect("put");
        store.put_record(&key, "1-1", LooseRecord::new(1).with_field("Qty", 2.0)).await.expect("put");

        let batches = store.list_records("owner", RecordDomain::PurchaseOrders).await.expect("list");
        assert_eq!(batches[0].records.len(), 1);
        assert_eq!(batches[0].records[0].number("Qty"), Some(2.0));
    }

    #[tokio::test]
    async fn delete_batch_reports_removed_rows() {
        let store = InMemoryRecordStore::new();
        let key = CollectionKey::new("owner", RecordDomain::PriceList, "2024");
        store.put_record(&key, "a", LooseRecord::new(0)).await.expect("put");
        store.put_record(&key, "b", LooseRecord::new(1)).await.expect("put");

        assert_eq!(store.delete_batch(&key).await.expect("delete"), 2);
        assert_eq!(store.delete_batch(&key).await.expect("delete"), 0);
    }

    #[tokio::test]
    async fn artifacts_are_retrievable_by_handle() {
        let sink = InMemoryArtifactSink::default();
        let handle = sink.store_artifact("po.csv", "text/csv", b"a,b\r\n".to_vec()).await.expect("store");

        let stored = sink.get(&handle).await.expect("stored");
        assert_eq!(stored.content_type, "text/csv");
        assert_eq!(sink.len().await, 1);
    }
}
