//! Result sink mirroring terminal marks into the store.

use async_trait::async_trait;
use disparo_core::error::DisparoError;
use disparo_core::record::{ContactRecord, ErrorMeta, SentMeta, SkipReason};
use disparo_core::traits::ResultSink;
use tracing::warn;

use crate::store::Store;

/// Mirrors outcomes to SQLite rows. Records without a row id (synthesized
/// 9-variant siblings in a memory queue) have nothing to mirror and are
/// logged instead.
pub struct StoreSink {
    store: Store,
}

impl StoreSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResultSink for StoreSink {
    async fn record_sent(
        &self,
        record: &ContactRecord,
        meta: &SentMeta,
    ) -> Result<(), DisparoError> {
        let Some(id) = record.id else {
            warn!(phone = %record.dial_digits(), "sent record has no store row to mark");
            return Ok(());
        };
        self.store
            .mark_sent(id, &meta.rendered_message, meta.attempts)
            .await
    }

    async fn record_error(
        &self,
        record: &ContactRecord,
        meta: &ErrorMeta,
    ) -> Result<(), DisparoError> {
        let Some(id) = record.id else {
            warn!(phone = %record.dial_digits(), "error record has no store row to mark");
            return Ok(());
        };
        self.store.mark_error(id, &meta.error, meta.attempts).await
    }

    async fn record_skipped(
        &self,
        record: &ContactRecord,
        reason: SkipReason,
    ) -> Result<(), DisparoError> {
        let Some(id) = record.id else {
            warn!(phone = %record.dial_digits(), "skipped record has no store row to mark");
            return Ok(());
        };
        self.store.mark_skipped(id, reason.as_str()).await
    }
}
