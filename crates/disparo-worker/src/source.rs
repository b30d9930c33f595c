//! In-memory record source.

use std::collections::VecDeque;

use async_trait::async_trait;
use disparo_core::error::DisparoError;
use disparo_core::record::ContactRecord;
use disparo_core::traits::RecordSource;
use tokio::sync::Mutex;

/// FIFO queue over an already-prepared record list.
pub struct MemorySource {
    queue: Mutex<VecDeque<ContactRecord>>,
}

impl MemorySource {
    pub fn new(records: Vec<ContactRecord>) -> Self {
        Self {
            queue: Mutex::new(records.into()),
        }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn next(&self) -> Result<Option<ContactRecord>, DisparoError> {
        Ok(self.queue.lock().await.pop_front())
    }

    async fn requeue_front(&self, record: ContactRecord) -> Result<(), DisparoError> {
        self.queue.lock().await.push_front(record);
        Ok(())
    }

    async fn remaining(&self) -> Result<usize, DisparoError> {
        Ok(self.queue.lock().await.len())
    }

    async fn export_pending(&self) -> Result<Option<Vec<ContactRecord>>, DisparoError> {
        Ok(Some(self.queue.lock().await.iter().cloned().collect()))
    }
}
