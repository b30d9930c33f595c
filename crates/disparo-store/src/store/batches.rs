//! Batch lifecycle: create, list, status, tallies.

use super::Store;
use disparo_core::error::DisparoError;
use uuid::Uuid;

/// One imported contact list.
#[derive(Debug, Clone)]
pub struct BatchRow {
    pub id: String,
    pub name: String,
    pub status: String,
    /// Serialized sender config the batch was imported with.
    pub config: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-status record counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTallies {
    pub pending: i64,
    pub sent: i64,
    pub errors: i64,
    pub skipped: i64,
}

impl BatchTallies {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.errors + self.skipped
    }
}

impl Store {
    /// Create a batch with an optional serialized sender config.
    pub async fn create_batch(
        &self,
        name: &str,
        config: Option<&str>,
    ) -> Result<String, DisparoError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO batches (id, name, config) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(config)
            .execute(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("create batch failed: {e}")))?;
        Ok(id)
    }

    pub async fn get_batch(&self, id: &str) -> Result<Option<BatchRow>, DisparoError> {
        let row: Option<(String, String, String, Option<String>, String, String)> =
            sqlx::query_as(
                "SELECT id, name, status, config, created_at, updated_at \
                 FROM batches WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("get batch failed: {e}")))?;

        Ok(row.map(
            |(id, name, status, config, created_at, updated_at)| BatchRow {
                id,
                name,
                status,
                config,
                created_at,
                updated_at,
            },
        ))
    }

    /// Batches, most recently created first.
    pub async fn list_batches(&self, limit: u32) -> Result<Vec<BatchRow>, DisparoError> {
        let rows: Vec<(String, String, String, Option<String>, String, String)> = sqlx::query_as(
            "SELECT id, name, status, config, created_at, updated_at \
             FROM batches ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DisparoError::Store(format!("list batches failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, status, config, created_at, updated_at)| BatchRow {
                    id,
                    name,
                    status,
                    config,
                    created_at,
                    updated_at,
                },
            )
            .collect())
    }

    /// Update a batch's status, bumping `updated_at`.
    pub async fn set_batch_status(&self, id: &str, status: &str) -> Result<(), DisparoError> {
        sqlx::query("UPDATE batches SET status = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("set batch status failed: {e}")))?;
        Ok(())
    }

    /// Count records per terminal status for a batch.
    pub async fn batch_tallies(&self, batch_id: &str) -> Result<BatchTallies, DisparoError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM records WHERE batch_id = ? GROUP BY status",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DisparoError::Store(format!("batch tallies failed: {e}")))?;

        let mut tallies = BatchTallies::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => tallies.pending = count,
                "sent" => tallies.sent = count,
                "error" => tallies.errors = count,
                "skipped" => tallies.skipped = count,
                _ => {}
            }
        }
        Ok(tallies)
    }
}
