//! Record source polling the store for pending rows.

use std::time::Duration;

use async_trait::async_trait;
use disparo_core::error::DisparoError;
use disparo_core::record::ContactRecord;
use disparo_core::traits::RecordSource;
use tracing::warn;

use crate::store::Store;

/// Wait between retries when a pending fetch fails.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Feeds the worker one pending row at a time, lowest id first.
///
/// Rows stay `pending` until a terminal mark lands, so a popped record does
/// not need explicit requeueing; pair this source with a [`crate::StoreSink`]
/// so marks actually happen.
pub struct StoreSource {
    store: Store,
    batch_id: String,
}

impl StoreSource {
    pub fn new(store: Store, batch_id: impl Into<String>) -> Self {
        Self {
            store,
            batch_id: batch_id.into(),
        }
    }
}

#[async_trait]
impl RecordSource for StoreSource {
    /// A fetch error is logged and retried after a short wait instead of
    /// killing the operation; one flaky query should not stop a batch.
    async fn next(&self) -> Result<Option<ContactRecord>, DisparoError> {
        loop {
            match self.store.next_pending(&self.batch_id).await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    warn!(batch = %self.batch_id, "pending fetch failed, retrying: {e}");
                    tokio::time::sleep(FETCH_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn requeue_front(&self, _record: ContactRecord) -> Result<(), DisparoError> {
        // The row is still pending; nothing to put back.
        Ok(())
    }

    async fn remaining(&self) -> Result<usize, DisparoError> {
        let tallies = self.store.batch_tallies(&self.batch_id).await?;
        Ok(tallies.pending as usize)
    }
}
