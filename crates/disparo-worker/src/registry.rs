//! In-memory registry of send operations for live monitoring.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use disparo_core::error::DisparoError;
use disparo_core::record::{ContactRecord, ErrorMeta, Outcome, SentMeta, SkipReason};
use disparo_core::traits::ResultSink;
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::control::OperationStatus;

/// Cap applied to detail list reads.
pub const DEFAULT_LIST_LIMIT: usize = 500;

/// One record with its terminal outcome and when it got there.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecord {
    pub record: ContactRecord,
    pub outcome: Outcome,
    pub resolved_at: DateTime<Utc>,
}

/// Aggregated view of one operation, cheap to clone and publish.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub id: String,
    pub name: String,
    pub status: OperationStatus,
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub errors: usize,
    pub skipped: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Detail view of one operation with capped lists, most recent first.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetail {
    pub summary: ProcessSummary,
    pub pending: Vec<ContactRecord>,
    pub sent: Vec<ResolvedRecord>,
    pub errors: Vec<ResolvedRecord>,
    pub skipped: Vec<ResolvedRecord>,
}

/// Tallies across every operation the registry has seen.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RegistryStats {
    pub operations: usize,
    pub active: usize,
    pub completed: usize,
    pub stopped: usize,
    pub records_sent: usize,
    pub records_failed: usize,
    pub records_skipped: usize,
}

struct ProcessEntry {
    id: String,
    name: String,
    status: OperationStatus,
    total: usize,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    pending: VecDeque<ContactRecord>,
    // Resolution lists keep the newest at the front.
    sent: VecDeque<ResolvedRecord>,
    errors: VecDeque<ResolvedRecord>,
    skipped: VecDeque<ResolvedRecord>,
}

impl ProcessEntry {
    fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            total: self.total,
            pending: self.pending.len(),
            sent: self.sent.len(),
            errors: self.errors.len(),
            skipped: self.skipped.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }

    fn remove_pending(&mut self, record: &ContactRecord) {
        let position = self.pending.iter().position(|p| match (p.id, record.id) {
            (Some(a), Some(b)) => a == b,
            _ => p.phone_raw == record.phone_raw && p.name == record.name,
        });
        if let Some(i) = position {
            self.pending.remove(i);
        }
    }
}

/// Registry of the operations this process has run.
///
/// Every mutation publishes fresh summaries through a watch channel, most
/// recently active first, so UIs follow along without polling.
pub struct ProcessRegistry {
    inner: Mutex<HashMap<String, ProcessEntry>>,
    updates: watch::Sender<Vec<ProcessSummary>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            inner: Mutex::new(HashMap::new()),
            updates,
        }
    }

    /// Start tracking an operation with its initial pending queue.
    pub async fn register(&self, id: &str, name: &str, records: &[ContactRecord]) {
        let now = Utc::now();
        let entry = ProcessEntry {
            id: id.to_string(),
            name: name.to_string(),
            status: OperationStatus::Running,
            total: records.len(),
            created_at: now,
            last_activity: now,
            pending: records.iter().cloned().collect(),
            sent: VecDeque::new(),
            errors: VecDeque::new(),
            skipped: VecDeque::new(),
        };
        let mut inner = self.inner.lock().await;
        inner.insert(id.to_string(), entry);
        self.publish(&inner);
    }

    /// Move a record out of pending into its outcome list.
    ///
    /// When the pending list empties and the operation is still running,
    /// the entry flips to completed on its own.
    pub async fn mark_resolved(&self, id: &str, record: &ContactRecord, outcome: Outcome) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.get_mut(id) else {
            return;
        };
        entry.remove_pending(record);
        let resolved = ResolvedRecord {
            record: record.clone(),
            outcome: outcome.clone(),
            resolved_at: Utc::now(),
        };
        entry.last_activity = resolved.resolved_at;
        match outcome {
            Outcome::Sent(_) => entry.sent.push_front(resolved),
            Outcome::Error(_) => entry.errors.push_front(resolved),
            Outcome::Skipped(_) => entry.skipped.push_front(resolved),
        }
        if entry.pending.is_empty() && entry.status == OperationStatus::Running {
            entry.status = OperationStatus::Completed;
        }
        self.publish(&inner);
    }

    /// Update an operation's status. Terminal entries never change again.
    pub async fn set_status(&self, id: &str, status: OperationStatus) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.get_mut(id) else {
            return;
        };
        if entry.status.is_terminal() {
            return;
        }
        entry.status = status;
        entry.last_activity = Utc::now();
        self.publish(&inner);
    }

    /// Watch channel of summaries; the current value is always available.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ProcessSummary>> {
        self.updates.subscribe()
    }

    pub async fn summaries(&self) -> Vec<ProcessSummary> {
        let inner = self.inner.lock().await;
        Self::sorted_summaries(&inner)
    }

    /// Detail view with lists capped at `limit` (0 = default cap).
    pub async fn detail(&self, id: &str, limit: usize) -> Option<ProcessDetail> {
        let limit = if limit == 0 {
            DEFAULT_LIST_LIMIT
        } else {
            limit.min(DEFAULT_LIST_LIMIT)
        };
        let inner = self.inner.lock().await;
        let entry = inner.get(id)?;
        Some(ProcessDetail {
            summary: entry.summary(),
            pending: entry.pending.iter().take(limit).cloned().collect(),
            sent: entry.sent.iter().take(limit).cloned().collect(),
            errors: entry.errors.iter().take(limit).cloned().collect(),
            skipped: entry.skipped.iter().take(limit).cloned().collect(),
        })
    }

    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().await;
        let mut stats = RegistryStats {
            operations: inner.len(),
            ..Default::default()
        };
        for entry in inner.values() {
            match entry.status {
                OperationStatus::Running | OperationStatus::Paused => stats.active += 1,
                OperationStatus::Completed => stats.completed += 1,
                OperationStatus::Stopped => stats.stopped += 1,
                OperationStatus::Idle => {}
            }
            stats.records_sent += entry.sent.len();
            stats.records_failed += entry.errors.len();
            stats.records_skipped += entry.skipped.len();
        }
        stats
    }

    fn sorted_summaries(inner: &HashMap<String, ProcessEntry>) -> Vec<ProcessSummary> {
        let mut all: Vec<ProcessSummary> = inner.values().map(ProcessEntry::summary).collect();
        all.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        all
    }

    fn publish(&self, inner: &HashMap<String, ProcessEntry>) {
        let _ = self.updates.send(Self::sorted_summaries(inner));
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink adapter feeding a registry. Never fails.
pub struct RegistrySink {
    registry: Arc<ProcessRegistry>,
    operation_id: String,
}

impl RegistrySink {
    pub fn new(registry: Arc<ProcessRegistry>, operation_id: impl Into<String>) -> Self {
        Self {
            registry,
            operation_id: operation_id.into(),
        }
    }
}

#[async_trait]
impl ResultSink for RegistrySink {
    async fn record_sent(
        &self,
        record: &ContactRecord,
        meta: &SentMeta,
    ) -> Result<(), DisparoError> {
        self.registry
            .mark_resolved(&self.operation_id, record, Outcome::Sent(meta.clone()))
            .await;
        Ok(())
    }

    async fn record_error(
        &self,
        record: &ContactRecord,
        meta: &ErrorMeta,
    ) -> Result<(), DisparoError> {
        self.registry
            .mark_resolved(&self.operation_id, record, Outcome::Error(meta.clone()))
            .await;
        Ok(())
    }

    async fn record_skipped(
        &self,
        record: &ContactRecord,
        reason: SkipReason,
    ) -> Result<(), DisparoError> {
        self.registry
            .mark_resolved(&self.operation_id, record, Outcome::Skipped(reason))
            .await;
        Ok(())
    }
}
