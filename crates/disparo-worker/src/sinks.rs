//! Log-backed result sink, the headless default.

use async_trait::async_trait;
use disparo_core::error::DisparoError;
use disparo_core::record::{ContactRecord, ErrorMeta, SentMeta, SkipReason};
use disparo_core::traits::ResultSink;
use tracing::{info, warn};

/// Sink that writes outcomes to the log. Never fails.
pub struct LogSink;

#[async_trait]
impl ResultSink for LogSink {
    async fn record_sent(
        &self,
        record: &ContactRecord,
        meta: &SentMeta,
    ) -> Result<(), DisparoError> {
        info!(
            phone = %record.dial_digits(),
            attempts = meta.attempts,
            "sent"
        );
        Ok(())
    }

    async fn record_error(
        &self,
        record: &ContactRecord,
        meta: &ErrorMeta,
    ) -> Result<(), DisparoError> {
        warn!(
            phone = %record.dial_digits(),
            attempts = meta.attempts,
            error = %meta.error,
            "delivery failed"
        );
        Ok(())
    }

    async fn record_skipped(
        &self,
        record: &ContactRecord,
        reason: SkipReason,
    ) -> Result<(), DisparoError> {
        info!(phone = %record.dial_digits(), reason = %reason, "skipped");
        Ok(())
    }
}
