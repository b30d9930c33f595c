//! Record insertion, pending polls, and terminal marks.

use super::Store;
use disparo_core::error::DisparoError;
use disparo_core::record::ContactRecord;
use tracing::warn;

type RecordRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

const RECORD_COLUMNS: &str =
    "id, name, company, email, phone_raw, phone_normalized, fields, template_override";

fn row_to_record(row: RecordRow) -> ContactRecord {
    let (id, name, company, email, phone_raw, phone_normalized, fields, template_override) = row;
    let fields = fields
        .as_deref()
        .and_then(|json| match serde_json::from_str(json) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(record = id, "ignoring malformed fields json: {e}");
                None
            }
        })
        .unwrap_or_default();
    ContactRecord {
        id: Some(id),
        name,
        company,
        email,
        phone_raw,
        phone_normalized,
        fields,
        template_override,
    }
}

impl Store {
    /// Insert records into a batch, preserving list order.
    pub async fn insert_records(
        &self,
        batch_id: &str,
        records: &[ContactRecord],
    ) -> Result<u64, DisparoError> {
        let mut inserted = 0;
        for record in records {
            let fields = if record.fields.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&record.fields)?)
            };
            sqlx::query(
                "INSERT INTO records \
                 (batch_id, name, company, email, phone_raw, phone_normalized, fields, template_override) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(batch_id)
            .bind(&record.name)
            .bind(&record.company)
            .bind(&record.email)
            .bind(&record.phone_raw)
            .bind(&record.phone_normalized)
            .bind(fields)
            .bind(&record.template_override)
            .execute(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("insert record failed: {e}")))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Next pending record of a batch, lowest id first.
    pub async fn next_pending(
        &self,
        batch_id: &str,
    ) -> Result<Option<ContactRecord>, DisparoError> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM records \
             WHERE batch_id = ? AND status = 'pending' \
             ORDER BY id ASC LIMIT 1"
        ))
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DisparoError::Store(format!("next pending failed: {e}")))?;

        Ok(row.map(row_to_record))
    }

    /// Records of a batch filtered by status, in queue order, capped.
    pub async fn list_records(
        &self,
        batch_id: &str,
        status: &str,
        limit: u32,
    ) -> Result<Vec<ContactRecord>, DisparoError> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM records \
             WHERE batch_id = ? AND status = ? \
             ORDER BY id ASC LIMIT ?"
        ))
        .bind(batch_id)
        .bind(status)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DisparoError::Store(format!("list records failed: {e}")))?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    /// Mark a record sent, then re-read its status to confirm the write
    /// actually landed. An unconfirmed sent mark would re-send the record on
    /// the next run, so failure here is escalated by the caller.
    pub async fn mark_sent(
        &self,
        record_id: i64,
        rendered_message: &str,
        attempts: u32,
    ) -> Result<(), DisparoError> {
        sqlx::query(
            "UPDATE records SET status = 'sent', rendered_message = ?, attempts = ?, \
             sent_at = datetime('now') WHERE id = ?",
        )
        .bind(rendered_message)
        .bind(attempts as i64)
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DisparoError::Store(format!("mark sent failed: {e}")))?;

        let check: Option<(String,)> = sqlx::query_as("SELECT status FROM records WHERE id = ?")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("mark sent confirm failed: {e}")))?;

        match check {
            Some((status,)) if status == "sent" => Ok(()),
            Some((status,)) => Err(DisparoError::Sink(format!(
                "record {record_id} not confirmed sent (status: {status})"
            ))),
            None => Err(DisparoError::Sink(format!(
                "record {record_id} not confirmed sent (row missing)"
            ))),
        }
    }

    pub async fn mark_error(
        &self,
        record_id: i64,
        error: &str,
        attempts: u32,
    ) -> Result<(), DisparoError> {
        sqlx::query("UPDATE records SET status = 'error', error = ?, attempts = ? WHERE id = ?")
            .bind(error)
            .bind(attempts as i64)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("mark error failed: {e}")))?;
        Ok(())
    }

    pub async fn mark_skipped(&self, record_id: i64, reason: &str) -> Result<(), DisparoError> {
        sqlx::query("UPDATE records SET status = 'skipped', skip_reason = ? WHERE id = ?")
            .bind(reason)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DisparoError::Store(format!("mark skipped failed: {e}")))?;
        Ok(())
    }
}
