use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use procura_core::domain::record::{LooseRecord, RecordBatch};
use procura_core::store::{CollectionKey, RecordDomain, RecordStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlRecordStore {
    pool: DbPool,
}

impl SqlRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_rows(
        &self,
        owner_id: &str,
        domain: RecordDomain,
    ) -> Result<Vec<(String, LooseRecord)>, RepositoryError> {
        // Batches come back in upload order; rows within a batch in sheet order.
        let rows = sqlx::query(
            "SELECT
                r.batch_id,
                r.record_json
             FROM record_row r
             JOIN (
                SELECT batch_id, MIN(created_at) AS uploaded_at, MIN(rowid) AS first_row
                FROM record_row
                WHERE owner_id = ? AND domain = ?
                GROUP BY batch_id
             ) b ON b.batch_id = r.batch_id
             WHERE r.owner_id = ? AND r.domain = ?
             ORDER BY b.uploaded_at ASC, b.first_row ASC, r.row_index ASC, r.record_id ASC",
        )
        .bind(owner_id)
        .bind(domain.as_str())
        .bind(owner_id)
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn upsert(
        &self,
        collection: &CollectionKey,
        record_id: &str,
        record: &LooseRecord,
    ) -> Result<(), RepositoryError> {
        let record_json = serde_json::to_string(record)
            .map_err(|error| RepositoryError::Decode(format!("record encode failed: {error}")))?;
        let row_index = i64::try_from(record.row_index).map_err(|_| {
            RepositoryError::Decode(format!("row index {} out of range", record.row_index))
        })?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "INSERT INTO record_row (
                owner_id,
                domain,
                batch_id,
                record_id,
                row_index,
                record_json,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(owner_id, domain, batch_id, record_id) DO UPDATE SET
                row_index = excluded.row_index,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at",
        )
        .bind(&collection.owner_id)
        .bind(collection.domain.as_str())
        .bind(&collection.batch_id)
        .bind(record_id)
        .bind(row_index)
        .bind(record_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn list_records(
        &self,
        owner_id: &str,
        domain: RecordDomain,
    ) -> Result<Vec<RecordBatch>, StoreError> {
        let rows = self.load_rows(owner_id, domain).await?;

        let mut batches: Vec<RecordBatch> = Vec::new();
        for (batch_id, record) in rows {
            match batches.last_mut() {
                Some(batch) if batch.batch_id == batch_id => batch.records.push(record),
                _ => batches.push(RecordBatch::new(batch_id, vec![record])),
            }
        }

        tracing::debug!(
            event_name = "db.records_listed",
            owner_id,
            domain = domain.as_str(),
            batches = batches.len(),
            "record batches loaded"
        );
        Ok(batches)
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
        self.upsert(collection, record_id, &record).await?;
        Ok(())
    }

    async fn delete_batch(&self, collection: &CollectionKey) -> Result<usize, StoreError> {
        let result = sqlx::query(
            "DELETE FROM record_row WHERE owner_id = ? AND domain = ? AND batch_id = ?",
        )
        .bind(&collection.owner_id)
        .bind(collection.domain.as_str())
        .bind(&collection.batch_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}

fn record_from_row(row: SqliteRow) -> Result<(String, LooseRecord), RepositoryError> {
    let batch_id: String = row.try_get("batch_id")?;
    let raw: String = row.try_get("record_json")?;
    let record = serde_json::from_str::<LooseRecord>(&raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid record_json in batch `{batch_id}`: {error}"))
    })?;
    Ok((batch_id, record))
}

#[cfg(test)]
mod tests {
    use procura_core::domain::record::{CellValue, LooseRecord};
    use procura_core::store::{CollectionKey, RecordDomain, RecordStore};

    use super::SqlRecordStore;
    use crate::{connect_with_settings, migrations::run_pending};

    async fn store() -> SqlRecordStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        SqlRecordStore::new(pool)
    }

    #[tokio::test]
    async fn records_round_trip_with_column_order() {
        let store = store().await;
        let key = CollectionKey::new("owner", RecordDomain::PurchaseOrders, "upload-1");
        let record = LooseRecord::new(0)
            .with_field("Toimittaja", "Huolto-Karhu Oy")
            .with_field("Amount", 120.5)
            .with_field("Paid", true)
            .with_field("Notes", CellValue::Null);

        store.put_record(&key, "row-00000", record.clone()).await.expect("put");
        let batches = store.list_records("owner", RecordDomain::PurchaseOrders).await.expect("list");

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records, vec![record]);
        let headers: Vec<&str> = batches[0].records[0].headers().collect();
        assert_eq!(headers, vec!["Toimittaja", "Amount", "Paid", "Notes"]);
    }

    #[tokio::test]
    async fn batches_follow_upload_order_and_rows_follow_sheet_order() {
        let store = store().await;
        let a = CollectionKey::new("owner", RecordDomain::Invoices, "a");
        let b = CollectionKey::new("owner", RecordDomain::Invoices, "b");
        store.put_record(&b, "r0", LooseRecord::new(0)).await.expect("put");
        store.put_record(&a, "r1", LooseRecord::new(1)).await.expect("put");
        store.put_record(&a, "r0", LooseRecord::new(0)).await.expect("put");

        let batches = store.list_records("owner", RecordDomain::Invoices).await.expect("list");

        let shape: Vec<(String, Vec<usize>)> = batches
            .iter()
            .map(|b| (b.batch_id.clone(), b.records.iter().map(|r| r.row_index).collect()))
            .collect();
        assert_eq!(shape, vec![("b".to_string(), vec![0]), ("a".to_string(), vec![0, 1])]);
        assert!(store.list_records("other", RecordDomain::Invoices).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn updating_an_early_batch_keeps_its_position() {
        let store = store().await;
        let first = CollectionKey::new("owner", RecordDomain::PurchaseOrders, "z-first");
        let second = CollectionKey::new("owner", RecordDomain::PurchaseOrders, "a-second");
        store.put_record(&first, "r0", LooseRecord::new(0)).await.expect("put");
        store.put_record(&second, "r0", LooseRecord::new(0)).await.expect("put");
        store
            .put_record(&first, "r0", LooseRecord::new(0).with_field("Status", "Approved"))
            .await
            .expect("update");

        let batches =
            store.list_records("owner", RecordDomain::PurchaseOrders).await.expect("list");

        let ids: Vec<&str> = batches.iter().map(|batch| batch.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["z-first", "a-second"]);
        assert_eq!(
            batches[0].records[0].get("Status"),
            Some(&CellValue::from("Approved"))
        );
    }

    #[tokio::test]
    async fn delete_batch_only_touches_one_batch() {
        let store = store().await;
        let a = CollectionKey::new("owner", RecordDomain::PriceList, "a");
        let b = CollectionKey::new("owner", RecordDomain::PriceList, "b");
        store.put_record(&a, "r0", LooseRecord::new(0)).await.expect("put");
        store.put_record(&a, "r1", LooseRecord::new(1)).await.expect("put");
        store.put_record(&b, "r0", LooseRecord::new(0)).await.expect("put");

        assert_eq!(store.delete_batch(&a).await.expect("delete"), 2);

        let batches = store.list_records("owner", RecordDomain::PriceList).await.expect("list");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_id, "b");
    }
}
