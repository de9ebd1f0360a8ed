use async_trait::async_trait;
use chrono::Utc;

use procura_core::services::artifact::{artifact_handle, fingerprint};
use procura_core::store::{ArtifactHandle, ArtifactSink, StoreError};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlArtifactSink {
    pool: DbPool,
}

impl SqlArtifactSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn content(&self, handle: &ArtifactHandle) -> Result<Option<Vec<u8>>, RepositoryError> {
        let content = sqlx::query_scalar::<_, Vec<u8>>("SELECT content FROM artifact WHERE handle = ?")
            .bind(&handle.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(content)
    }
}

#[async_trait]
impl ArtifactSink for SqlArtifactSink {
    /// Identical content under the same name maps to the same handle, so
    /// re-storing it is a no-op.
    async fn store_artifact(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactHandle, StoreError> {
        let handle = artifact_handle(name, &bytes);
        let size_bytes = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO artifact (
                handle,
                name,
                content_type,
                fingerprint,
                size_bytes,
                content,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(handle) DO NOTHING",
        )
        .bind(&handle)
        .bind(name)
        .bind(content_type)
        .bind(fingerprint(&bytes))
        .bind(size_bytes)
        .bind(bytes)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        tracing::info!(
            event_name = "db.artifact_stored",
            handle = %handle,
            content_type,
            size_bytes,
            "artifact stored"
        );
        Ok(ArtifactHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use procura_core::store::ArtifactSink;

    use super::SqlArtifactSink;
    use crate::{connect_with_settings, migrations::run_pending};

    #[tokio::test]
    async fn stored_content_is_readable_and_deduplicated() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        let sink = SqlArtifactSink::new(pool.clone());

        let first = sink.store_artifact("po.csv", "text/csv", b"x,y\r\n".to_vec()).await.expect("store");
        let again = sink.store_artifact("po.csv", "text/csv", b"x,y\r\n".to_vec()).await.expect("store");

        assert_eq!(first, again);
        assert_eq!(sink.content(&first).await.expect("read"), Some(b"x,y\r\n".to_vec()));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifact")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }
}
