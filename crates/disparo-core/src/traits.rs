use crate::{
    error::DisparoError,
    record::{ContactRecord, ErrorMeta, Outcome, SentMeta, SkipReason},
};
use async_trait::async_trait;

/// Delivery gateway trait — where messages leave the system.
///
/// Implementations wrap one outbound transport (WAHA today). Calls are
/// opaque network requests with their own timeout; the worker never
/// cancels one mid-flight.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Human-readable gateway name.
    fn name(&self) -> &str;

    /// Send a plain text message to a dialable address (digits only).
    async fn send_text(&self, address: &str, body: &str) -> Result<(), DisparoError>;

    /// Send a URL as a message, requesting a rich preview.
    async fn send_link(&self, address: &str, url_text: &str) -> Result<(), DisparoError>;

    /// Preflight check that the gateway session is usable.
    async fn verify(&self) -> Result<(), DisparoError> {
        Ok(())
    }
}

/// Result sink trait — where per-record outcomes land.
///
/// One operation may fan out to several sinks (store mirror, in-memory
/// registry, log). Each record is reported exactly once per operation.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Record a fully delivered record.
    async fn record_sent(&self, record: &ContactRecord, meta: &SentMeta)
        -> Result<(), DisparoError>;

    /// Record a record that exhausted its delivery attempts.
    async fn record_error(
        &self,
        record: &ContactRecord,
        meta: &ErrorMeta,
    ) -> Result<(), DisparoError>;

    /// Record a record skipped without dialing.
    async fn record_skipped(
        &self,
        record: &ContactRecord,
        reason: SkipReason,
    ) -> Result<(), DisparoError>;
}

/// Record source trait — where the pending queue lives.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Pop the next pending record. `None` means the queue is drained.
    async fn next(&self) -> Result<Option<ContactRecord>, DisparoError>;

    /// Put a popped record back at the front, keeping it visibly pending.
    async fn requeue_front(&self, record: ContactRecord) -> Result<(), DisparoError>;

    /// Records still waiting.
    async fn remaining(&self) -> Result<usize, DisparoError>;

    /// Export the remaining queue for snapshotting. `None` when the queue
    /// is durably held elsewhere (e.g. the store).
    async fn export_pending(&self) -> Result<Option<Vec<ContactRecord>>, DisparoError> {
        Ok(None)
    }
}

/// Progress observer — synchronous notifications for UIs and logs.
///
/// All methods default to no-ops so observers implement only what they
/// watch.
pub trait ProgressObserver: Send + Sync {
    /// An inter-record wait of `total_secs` is starting.
    fn on_interval_start(&self, _total_secs: u64) {}

    /// One countdown tick; `seconds_remaining` reaches 0 on natural expiry.
    fn on_interval_tick(&self, _seconds_remaining: u64) {}

    /// A record reached a terminal status.
    fn on_record_resolved(&self, _record: &ContactRecord, _outcome: &Outcome) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl ProgressObserver for NullObserver {}
