//! The send operation: one paced pass over a queue of records.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use disparo_core::config::{NineVariantPolicy, SenderConfig, SlotKind};
use disparo_core::error::DisparoError;
use disparo_core::phone;
use disparo_core::record::{ContactRecord, ErrorMeta, Outcome, SentMeta, SkipReason};
use disparo_core::template;
use disparo_core::traits::{DeliveryGateway, ProgressObserver, RecordSource, ResultSink};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::control::{OperationControl, OperationStatus};
use crate::pacing::{next_delay, Pacer, WaitOutcome};
use crate::snapshot::{OperationSnapshot, SnapshotWriter};

/// Everything an operation needs to run.
pub struct OperationParts {
    pub name: String,
    /// Store batch backing the queue, when there is one.
    pub batch_id: Option<String>,
    pub sender: SenderConfig,
    pub gateway: Arc<dyn DeliveryGateway>,
    pub sinks: Vec<Arc<dyn ResultSink>>,
    pub source: Arc<dyn RecordSource>,
    pub observer: Arc<dyn ProgressObserver>,
}

/// Final tallies of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: u64,
    pub errors: u64,
    pub skipped: u64,
    /// True when the run ended on an explicit stop instead of draining.
    pub stopped: bool,
}

/// One run of the worker over one batch.
///
/// Records are processed strictly one at a time: normalize, duplicate
/// check, render, deliver with retry, report exactly once, wait out the
/// interval, repeat. Pause and stop are honored at every wait and before
/// each pop; an in-flight gateway call is never cancelled.
pub struct SendOperation {
    id: String,
    name: String,
    batch_id: Option<String>,
    sender: SenderConfig,
    gateway: Arc<dyn DeliveryGateway>,
    sinks: Vec<Arc<dyn ResultSink>>,
    source: Arc<dyn RecordSource>,
    observer: Arc<dyn ProgressObserver>,
    control: OperationControl,
    pacer: Pacer,
    snapshots: Option<SnapshotWriter>,
}

struct RenderedSlot {
    kind: SlotKind,
    body: String,
}

enum Resolution {
    Reported(Outcome),
    /// Stop arrived mid-retry; the record went back to the front.
    Requeued,
}

impl SendOperation {
    pub fn new(parts: OperationParts) -> Self {
        let mut sender = parts.sender;
        sender.normalize();
        Self {
            id: Uuid::new_v4().to_string(),
            name: parts.name,
            batch_id: parts.batch_id,
            sender,
            gateway: parts.gateway,
            sinks: parts.sinks,
            source: parts.source,
            observer: parts.observer,
            control: OperationControl::new(),
            pacer: Pacer::default(),
            snapshots: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle for pause/resume/stop and state queries, valid for the
    /// operation's whole life.
    pub fn control(&self) -> OperationControl {
        self.control.clone()
    }

    /// Custom pacing (tests shrink the durations).
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Persist resume snapshots through the writer.
    pub fn with_snapshots(mut self, writer: SnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    /// Drive the queue until it drains, a stop lands, or a sent outcome
    /// cannot be persisted.
    pub async fn run(self) -> Result<RunSummary, DisparoError> {
        let mut summary = RunSummary::default();
        let mut sent_addresses: HashSet<String> = HashSet::new();
        self.control.set_status(OperationStatus::Running);
        self.sync_pending().await;
        self.write_snapshot().await;
        info!(operation = %self.id, name = %self.name, "send operation started");

        match self.drive(&mut summary, &mut sent_addresses).await {
            Ok(terminal) => {
                summary.stopped = terminal == OperationStatus::Stopped;
                self.control.set_status(terminal);
                if let Some(writer) = &self.snapshots {
                    writer.remove(&self.id);
                }
                info!(
                    operation = %self.id,
                    sent = summary.sent,
                    errors = summary.errors,
                    skipped = summary.skipped,
                    status = terminal.as_str(),
                    "send operation finished"
                );
                Ok(summary)
            }
            Err(e) => {
                // The snapshot stays on disk; the operator decides what a
                // restart may re-send.
                self.control.set_status(OperationStatus::Stopped);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        summary: &mut RunSummary,
        sent_addresses: &mut HashSet<String>,
    ) -> Result<OperationStatus, DisparoError> {
        loop {
            if self.pacer.wait_while_paused(&self.control).await == WaitOutcome::Aborted {
                return Ok(OperationStatus::Stopped);
            }

            let Some(mut record) = self.source.next().await? else {
                return Ok(OperationStatus::Completed);
            };
            self.sync_pending().await;

            match self.process_record(&mut record, sent_addresses).await? {
                Resolution::Requeued => {
                    self.sync_pending().await;
                    self.write_snapshot().await;
                    return Ok(OperationStatus::Stopped);
                }
                Resolution::Reported(outcome) => {
                    match &outcome {
                        Outcome::Sent(_) => summary.sent += 1,
                        Outcome::Error(_) => summary.errors += 1,
                        Outcome::Skipped(_) => summary.skipped += 1,
                    }
                    self.control.record_processed();
                    self.observer.on_record_resolved(&record, &outcome);
                    self.write_snapshot().await;
                }
            }

            let delay = next_delay(&self.sender.interval);
            if self
                .pacer
                .countdown(delay, &self.control, self.observer.as_ref())
                .await
                == WaitOutcome::Aborted
            {
                return Ok(OperationStatus::Stopped);
            }
        }
    }

    async fn process_record(
        &self,
        record: &mut ContactRecord,
        sent_addresses: &mut HashSet<String>,
    ) -> Result<Resolution, DisparoError> {
        let normalized = match phone::normalize(record.dial_digits(), &self.sender.phone) {
            Ok(n) => n,
            Err(_) => {
                let reason = SkipReason::InvalidPhone;
                self.report_skipped(record, reason).await;
                return Ok(Resolution::Reported(Outcome::Skipped(reason)));
            }
        };
        if normalized.short {
            let reason = SkipReason::ShortPhone;
            self.report_skipped(record, reason).await;
            return Ok(Resolution::Reported(Outcome::Skipped(reason)));
        }
        record.phone_normalized = normalized.digits;
        let primary = record.phone_normalized.clone();

        if sent_addresses.contains(&primary) {
            let reason = SkipReason::DuplicateInBatch;
            self.report_skipped(record, reason).await;
            return Ok(Resolution::Reported(Outcome::Skipped(reason)));
        }

        let slots = self.render_slots(record);
        if slots.is_empty() {
            return Err(DisparoError::Config(
                "no message slots enabled".to_string(),
            ));
        }

        let alternate = match self.sender.nine_variant {
            NineVariantPolicy::Fallback => phone::nine_variant(&primary),
            _ => None,
        };

        let max_attempts = self.sender.max_attempts;
        // Done flags survive a variant switch: a slot already delivered to
        // the primary is not re-sent when a retry dials the alternate; the
        // retry only delivers what is still missing.
        let mut done = vec![false; slots.len()];
        let mut attempt: u32 = 0;
        let mut last_error = String::new();

        loop {
            // Second attempt dials the alternate variant when the fallback
            // policy derived one and it was not already served.
            let use_alternate = attempt == 1
                && alternate
                    .as_deref()
                    .map_or(false, |alt| !sent_addresses.contains(alt));
            let address = if use_alternate {
                alternate.as_deref().unwrap_or(primary.as_str())
            } else {
                primary.as_str()
            };

            match self.deliver_slots(address, &slots, &mut done).await {
                Ok(()) => {
                    sent_addresses.insert(address.to_string());
                    let meta = SentMeta {
                        rendered_message: slots[0].body.clone(),
                        timestamp: Utc::now(),
                        attempts: attempt + 1,
                    };
                    self.report_sent(record, &meta).await?;
                    return Ok(Resolution::Reported(Outcome::Sent(meta)));
                }
                Err(e) => {
                    attempt += 1;
                    last_error = e.to_string();
                    debug!(
                        phone = %address,
                        attempt,
                        error = %last_error,
                        "delivery attempt failed"
                    );
                    if attempt >= max_attempts {
                        break;
                    }
                    if self
                        .pacer
                        .backoff(attempt, self.sender.retry_base_ms, &self.control)
                        .await
                        == WaitOutcome::Aborted
                    {
                        self.source.requeue_front(record.clone()).await?;
                        return Ok(Resolution::Requeued);
                    }
                }
            }
        }

        let meta = ErrorMeta {
            error: last_error,
            attempts: attempt,
        };
        self.report_error(record, &meta).await;
        Ok(Resolution::Reported(Outcome::Error(meta)))
    }

    /// Templates for this record: the enabled slots, with the per-record
    /// override replacing (or supplying) the primary text.
    fn render_slots(&self, record: &ContactRecord) -> Vec<RenderedSlot> {
        let mut templates: Vec<(SlotKind, String)> = self
            .sender
            .messages
            .enabled()
            .into_iter()
            .map(|(kind, template)| (kind, template.to_string()))
            .collect();

        if let Some(over) = record
            .template_override
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            match templates.iter_mut().find(|(kind, _)| *kind == SlotKind::Text1) {
                Some((_, template)) => *template = over.to_string(),
                None => templates.insert(0, (SlotKind::Text1, over.to_string())),
            }
        }

        templates
            .into_iter()
            .map(|(kind, template)| RenderedSlot {
                kind,
                body: template::render(&template, record),
            })
            .collect()
    }

    /// Deliver every unfinished slot in order, flagging each as it lands so
    /// a retry resumes where the last attempt failed.
    async fn deliver_slots(
        &self,
        address: &str,
        slots: &[RenderedSlot],
        done: &mut [bool],
    ) -> Result<(), DisparoError> {
        for (i, slot) in slots.iter().enumerate() {
            if done[i] {
                continue;
            }
            if slot.kind.is_link() {
                self.gateway.send_link(address, &slot.body).await?;
            } else {
                self.gateway.send_text(address, &slot.body).await?;
            }
            done[i] = true;
        }
        Ok(())
    }

    /// A failed sent-mark is fatal: the message already left the gateway,
    /// so the operation halts rather than risk a re-send on restart.
    async fn report_sent(
        &self,
        record: &ContactRecord,
        meta: &SentMeta,
    ) -> Result<(), DisparoError> {
        for sink in &self.sinks {
            sink.record_sent(record, meta).await?;
        }
        Ok(())
    }

    async fn report_error(&self, record: &ContactRecord, meta: &ErrorMeta) {
        for sink in &self.sinks {
            if let Err(e) = sink.record_error(record, meta).await {
                warn!(phone = %record.dial_digits(), "failed to record error outcome: {e}");
            }
        }
    }

    async fn report_skipped(&self, record: &ContactRecord, reason: SkipReason) {
        for sink in &self.sinks {
            if let Err(e) = sink.record_skipped(record, reason).await {
                warn!(phone = %record.dial_digits(), "failed to record skip: {e}");
            }
        }
    }

    async fn sync_pending(&self) {
        if let Ok(remaining) = self.source.remaining().await {
            self.control.set_pending(remaining as u64);
        }
    }

    async fn write_snapshot(&self) {
        let Some(writer) = &self.snapshots else {
            return;
        };
        let remaining = match self.source.export_pending().await {
            Ok(Some(records)) => records,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("snapshot: failed to export pending queue: {e}");
                return;
            }
        };
        let snapshot = OperationSnapshot {
            operation_id: self.id.clone(),
            name: self.name.clone(),
            batch_id: self.batch_id.clone(),
            sender: self.sender.clone(),
            remaining,
            saved_at: Utc::now(),
        };
        if let Err(e) = writer.write(&snapshot) {
            warn!("snapshot: write failed: {e}");
        }
    }
}
