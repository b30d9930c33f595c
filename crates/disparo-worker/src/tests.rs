use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use disparo_core::config::{
    IntervalPolicy, MessageSlots, NineVariantPolicy, PhoneConfig, SenderConfig,
};
use disparo_core::error::DisparoError;
use disparo_core::record::{ContactRecord, ErrorMeta, SentMeta, SkipReason};
use disparo_core::traits::{
    DeliveryGateway, NullObserver, ProgressObserver, RecordSource, ResultSink,
};
use tokio::sync::Notify;

use crate::control::{OperationControl, OperationStatus};
use crate::dispatcher::Dispatcher;
use crate::operation::{OperationParts, SendOperation};
use crate::pacing::{Pacer, WaitOutcome};
use crate::registry::{ProcessRegistry, RegistrySink};
use crate::source::MemorySource;

// ---- test doubles ----

#[derive(Debug, Clone)]
struct GatewayCall {
    address: String,
    body: String,
    link: bool,
}

/// Gateway double recording every call. Fails according to `fail_plan`
/// (one entry per call, exhausted = success) or unconditionally.
struct MockGateway {
    calls: StdMutex<Vec<GatewayCall>>,
    fail_plan: StdMutex<VecDeque<bool>>,
    always_fail: bool,
    called: Notify,
}

impl MockGateway {
    fn ok() -> Arc<Self> {
        Self::with_plan(&[])
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: StdMutex::new(Vec::new()),
            fail_plan: StdMutex::new(VecDeque::new()),
            always_fail: true,
            called: Notify::new(),
        })
    }

    fn with_plan(plan: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            calls: StdMutex::new(Vec::new()),
            fail_plan: StdMutex::new(plan.iter().copied().collect()),
            always_fail: false,
            called: Notify::new(),
        })
    }

    fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, address: &str, body: &str, link: bool) -> Result<(), DisparoError> {
        self.calls.lock().unwrap().push(GatewayCall {
            address: address.to_string(),
            body: body.to_string(),
            link,
        });
        self.called.notify_one();
        let fail = self.always_fail
            || self
                .fail_plan
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(false);
        if fail {
            Err(DisparoError::Gateway("mock gateway down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeliveryGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_text(&self, address: &str, body: &str) -> Result<(), DisparoError> {
        self.record_call(address, body, false)
    }

    async fn send_link(&self, address: &str, url_text: &str) -> Result<(), DisparoError> {
        self.record_call(address, url_text, true)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SinkEvent {
    Sent { phone: String, attempts: u32 },
    Error { phone: String, attempts: u32 },
    Skipped { phone: String, reason: SkipReason },
}

/// Sink double collecting every terminal report.
#[derive(Default)]
struct CollectSink {
    events: StdMutex<Vec<SinkEvent>>,
}

impl CollectSink {
    fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for CollectSink {
    async fn record_sent(
        &self,
        record: &ContactRecord,
        meta: &SentMeta,
    ) -> Result<(), DisparoError> {
        self.events.lock().unwrap().push(SinkEvent::Sent {
            phone: record.dial_digits().to_string(),
            attempts: meta.attempts,
        });
        Ok(())
    }

    async fn record_error(
        &self,
        record: &ContactRecord,
        meta: &ErrorMeta,
    ) -> Result<(), DisparoError> {
        self.events.lock().unwrap().push(SinkEvent::Error {
            phone: record.dial_digits().to_string(),
            attempts: meta.attempts,
        });
        Ok(())
    }

    async fn record_skipped(
        &self,
        record: &ContactRecord,
        reason: SkipReason,
    ) -> Result<(), DisparoError> {
        self.events.lock().unwrap().push(SinkEvent::Skipped {
            phone: record.dial_digits().to_string(),
            reason,
        });
        Ok(())
    }
}

/// Sink whose sent-mark always fails, as a store with a broken write would.
struct FailingSentSink;

#[async_trait]
impl ResultSink for FailingSentSink {
    async fn record_sent(&self, _: &ContactRecord, _: &SentMeta) -> Result<(), DisparoError> {
        Err(DisparoError::Sink("sent mark rejected".to_string()))
    }

    async fn record_error(&self, _: &ContactRecord, _: &ErrorMeta) -> Result<(), DisparoError> {
        Ok(())
    }

    async fn record_skipped(&self, _: &ContactRecord, _: SkipReason) -> Result<(), DisparoError> {
        Ok(())
    }
}

/// Observer recording every interval start and countdown tick.
#[derive(Default)]
struct TickObserver {
    starts: StdMutex<Vec<u64>>,
    ticks: StdMutex<Vec<u64>>,
}

impl TickObserver {
    fn ticks(&self) -> Vec<u64> {
        self.ticks.lock().unwrap().clone()
    }
}

impl ProgressObserver for TickObserver {
    fn on_interval_start(&self, total_secs: u64) {
        self.starts.lock().unwrap().push(total_secs);
    }

    fn on_interval_tick(&self, seconds_remaining: u64) {
        self.ticks.lock().unwrap().push(seconds_remaining);
    }
}

// ---- helpers ----

fn record(phone: &str) -> ContactRecord {
    ContactRecord {
        name: "Ana".to_string(),
        phone_raw: phone.to_string(),
        ..Default::default()
    }
}

fn sender() -> SenderConfig {
    SenderConfig {
        interval: IntervalPolicy::Fixed { seconds: 1 },
        max_attempts: 3,
        retry_base_ms: 1500,
        remove_duplicates: true,
        nine_variant: NineVariantPolicy::Off,
        phone: PhoneConfig {
            country_code: "55".to_string(),
            auto_fill_area_code: None,
        },
        messages: MessageSlots {
            text_1: Some("Hello {nome}".to_string()),
            ..Default::default()
        },
    }
}

fn build_op(
    records: Vec<ContactRecord>,
    sender: SenderConfig,
    gateway: Arc<MockGateway>,
    sink: Arc<CollectSink>,
) -> (SendOperation, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::new(records));
    let op = SendOperation::new(OperationParts {
        name: "test".to_string(),
        batch_id: None,
        sender,
        gateway: gateway as Arc<dyn DeliveryGateway>,
        sinks: vec![sink as Arc<dyn ResultSink>],
        source: source.clone() as Arc<dyn RecordSource>,
        observer: Arc::new(NullObserver),
    });
    (op, source)
}

fn sent_meta(message: &str, attempts: u32) -> SentMeta {
    SentMeta {
        rendered_message: message.to_string(),
        timestamp: Utc::now(),
        attempts,
    }
}

// ---- operation loop ----

#[tokio::test(start_paused = true)]
async fn test_end_to_end_tallies() {
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());
    let (op, source) = build_op(
        vec![
            record("11999990000"),
            record("123"),
            record("11999990000"),
        ],
        sender(),
        gateway.clone(),
        sink.clone(),
    );

    let summary = op.run().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.errors, 0);
    assert!(!summary.stopped);

    let calls = gateway.calls();
    assert_eq!(calls.len(), 1, "only the first valid record dials out");
    assert_eq!(calls[0].address, "5511999990000");
    assert_eq!(calls[0].body, "Hello Ana");

    let events = sink.events();
    assert_eq!(events.len(), 3, "every record reported exactly once");
    assert_eq!(
        events[1],
        SinkEvent::Skipped {
            phone: "123".to_string(),
            reason: SkipReason::ShortPhone,
        }
    );
    assert_eq!(
        events[2],
        SinkEvent::Skipped {
            phone: "5511999990000".to_string(),
            reason: SkipReason::DuplicateInBatch,
        }
    );

    assert_eq!(source.remaining().await.unwrap(), 0, "queue fully drained");
}

#[tokio::test(start_paused = true)]
async fn test_short_and_invalid_phones_skip_without_dialing() {
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());
    let (op, _) = build_op(
        vec![record("12345"), record("n/a")],
        sender(),
        gateway.clone(),
        sink.clone(),
    );

    let summary = op.run().await.unwrap();
    assert_eq!(summary.skipped, 2);
    assert!(gateway.calls().is_empty(), "unsendable numbers never dial");

    let events = sink.events();
    assert!(matches!(
        events[0],
        SinkEvent::Skipped {
            reason: SkipReason::ShortPhone,
            ..
        }
    ));
    assert!(matches!(
        events[1],
        SinkEvent::Skipped {
            reason: SkipReason::InvalidPhone,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_reports_error() {
    let gateway = MockGateway::failing();
    let sink = Arc::new(CollectSink::default());
    let (op, _) = build_op(
        vec![record("5511999990000")],
        sender(),
        gateway.clone(),
        sink.clone(),
    );

    let started = tokio::time::Instant::now();
    let summary = op.run().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.errors, 1);
    assert_eq!(gateway.calls().len(), 3, "exactly max_attempts dials");
    assert_eq!(
        sink.events(),
        vec![SinkEvent::Error {
            phone: "5511999990000".to_string(),
            attempts: 3,
        }]
    );
    // Backoff between attempts: 1x1500 + 2x1500 = 4.5s (plus one interval).
    assert!(
        elapsed >= Duration::from_millis(4500),
        "backoff too short: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(8),
        "backoff too long: {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_resumes_unfinished_slots_only() {
    let gateway = MockGateway::with_plan(&[false, true]);
    let sink = Arc::new(CollectSink::default());
    let mut cfg = sender();
    cfg.messages.text_2 = Some("Follow-up for {nome}".to_string());
    let (op, _) = build_op(vec![record("5511999990000")], cfg, gateway.clone(), sink.clone());

    let summary = op.run().await.unwrap();
    assert_eq!(summary.sent, 1);

    let calls = gateway.calls();
    assert_eq!(
        calls.iter().map(|c| c.body.as_str()).collect::<Vec<_>>(),
        vec!["Hello Ana", "Follow-up for Ana", "Follow-up for Ana"],
        "the delivered first slot is not re-sent on retry"
    );
    assert_eq!(
        sink.events(),
        vec![SinkEvent::Sent {
            phone: "5511999990000".to_string(),
            attempts: 2,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_slots_request_preview_in_order() {
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());
    let mut cfg = sender();
    cfg.messages.file_link = Some("https://example.com/catalog.pdf".to_string());
    let (op, _) = build_op(vec![record("5511999990000")], cfg, gateway.clone(), sink);

    op.run().await.unwrap();

    let calls = gateway.calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].link, "text slot goes first, as plain text");
    assert!(calls[1].link, "file link is delivered with a preview");
    assert_eq!(calls[1].body, "https://example.com/catalog.pdf");
}

#[tokio::test(start_paused = true)]
async fn test_template_override_replaces_primary_text() {
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());
    let mut r = record("5511999990000");
    r.template_override = Some("Oi {nome}, tudo bem?".to_string());
    let (op, _) = build_op(vec![r], sender(), gateway.clone(), sink);

    op.run().await.unwrap();
    assert_eq!(gateway.calls()[0].body, "Oi Ana, tudo bem?");
}

#[tokio::test(start_paused = true)]
async fn test_fallback_dials_alternate_on_second_attempt() {
    let gateway = MockGateway::with_plan(&[true]);
    let sink = Arc::new(CollectSink::default());
    let mut cfg = sender();
    cfg.nine_variant = NineVariantPolicy::Fallback;
    let (op, _) = build_op(vec![record("5511988887777")], cfg, gateway.clone(), sink.clone());

    let summary = op.run().await.unwrap();
    assert_eq!(summary.sent, 1);

    let calls = gateway.calls();
    assert_eq!(calls[0].address, "5511988887777", "first attempt dials the primary");
    assert_eq!(
        calls[1].address, "551188887777",
        "second attempt dials the 9-toggled variant"
    );
}

#[tokio::test(start_paused = true)]
async fn test_fallback_retry_finishes_remaining_slots_on_alternate() {
    // Slot 1 lands on the primary, slot 2 fails; the retry dials the
    // alternate and delivers only what is still missing.
    let gateway = MockGateway::with_plan(&[false, true, false]);
    let sink = Arc::new(CollectSink::default());
    let mut cfg = sender();
    cfg.nine_variant = NineVariantPolicy::Fallback;
    cfg.messages.text_2 = Some("Follow-up for {nome}".to_string());
    let (op, _) = build_op(
        vec![record("5511988887777")],
        cfg,
        gateway.clone(),
        sink.clone(),
    );

    let summary = op.run().await.unwrap();
    assert_eq!(summary.sent, 1);

    let calls = gateway.calls();
    let seen: Vec<(&str, &str)> = calls
        .iter()
        .map(|c| (c.address.as_str(), c.body.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("5511988887777", "Hello Ana"),
            ("5511988887777", "Follow-up for Ana"),
            ("551188887777", "Follow-up for Ana"),
        ],
        "a delivered slot is never re-sent after the variant switch"
    );
    assert_eq!(
        sink.events(),
        vec![SinkEvent::Sent {
            phone: "5511988887777".to_string(),
            attempts: 2,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_enabled_slots_is_a_config_error() {
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());
    let mut cfg = sender();
    cfg.messages = MessageSlots::default();
    let (op, _) = build_op(vec![record("5511999990000")], cfg, gateway, sink);

    let err = op.run().await.unwrap_err();
    assert!(matches!(err, DisparoError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_sent_mark_stops_the_operation() {
    let gateway = MockGateway::ok();
    let source = Arc::new(MemorySource::new(vec![
        record("5511999990000"),
        record("5511988887777"),
    ]));
    let op = SendOperation::new(OperationParts {
        name: "test".to_string(),
        batch_id: None,
        sender: sender(),
        gateway: gateway.clone() as Arc<dyn DeliveryGateway>,
        sinks: vec![Arc::new(FailingSentSink) as Arc<dyn ResultSink>],
        source: source.clone() as Arc<dyn RecordSource>,
        observer: Arc::new(NullObserver),
    });
    let control = op.control();

    let err = op.run().await.unwrap_err();
    assert!(matches!(err, DisparoError::Sink(_)));
    assert_eq!(control.status(), OperationStatus::Stopped);
    // The message went out before the mark failed; the halt prevents more.
    assert_eq!(gateway.calls().len(), 1);
    assert_eq!(source.remaining().await.unwrap(), 1, "second record untouched");
}

#[tokio::test]
async fn test_stop_during_backoff_requeues_the_record() {
    let gateway = MockGateway::failing();
    let sink = Arc::new(CollectSink::default());
    let mut cfg = sender();
    cfg.retry_base_ms = 200;
    let (op, source) = build_op(
        vec![record("5511999990000")],
        cfg,
        gateway.clone(),
        sink.clone(),
    );
    let op = op.with_pacer(Pacer::with_timing(
        Duration::from_millis(10),
        Duration::from_millis(2),
    ));
    let control = op.control();

    let handle = tokio::spawn(op.run());
    gateway.called.notified().await;
    control.stop();

    let summary = handle.await.unwrap().unwrap();
    assert!(summary.stopped);
    assert_eq!(summary.sent + summary.errors + summary.skipped, 0);
    assert!(sink.events().is_empty(), "no terminal report for the record");
    assert_eq!(
        source.remaining().await.unwrap(),
        1,
        "record stays visibly pending after stop"
    );
}

// ---- pacing ----

#[tokio::test]
async fn test_pause_freezes_countdown() {
    let pacer = Pacer::with_timing(Duration::from_millis(25), Duration::from_millis(5));
    let control = OperationControl::new();
    control.set_status(OperationStatus::Running);
    let observer = Arc::new(TickObserver::default());

    let handle = {
        let control = control.clone();
        let observer = observer.clone();
        tokio::spawn(async move { pacer.countdown(10, &control, observer.as_ref()).await })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    control.pause();
    // Let the in-flight tick settle, then confirm nothing advances.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let frozen = observer.ticks().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        observer.ticks().len(),
        frozen,
        "paused time must not consume the countdown"
    );

    control.resume();
    let outcome = handle.await.unwrap();
    assert_eq!(outcome, WaitOutcome::Elapsed);
    let expected: Vec<u64> = (0..=10).rev().collect();
    assert_eq!(
        observer.ticks(),
        expected,
        "countdown resumes where it froze, skipping nothing"
    );
    assert_eq!(*observer.starts.lock().unwrap(), vec![10]);
}

#[tokio::test]
async fn test_stop_aborts_countdown_without_final_tick() {
    let pacer = Pacer::with_timing(Duration::from_millis(5), Duration::from_millis(2));
    let control = OperationControl::new();
    control.set_status(OperationStatus::Running);
    let observer = TickObserver::default();

    control.stop();
    let outcome = pacer.countdown(10, &control, &observer).await;
    assert_eq!(outcome, WaitOutcome::Aborted);
    assert!(
        observer.ticks().is_empty(),
        "an aborted wait emits no ticks, not even the final 0"
    );
}

// ---- dispatcher ----

#[tokio::test]
async fn test_dispatcher_rejects_second_start_while_active() {
    let dispatcher = Dispatcher::new();
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());

    let mut cfg = sender();
    cfg.interval = IntervalPolicy::Fixed { seconds: 3600 };
    let (first, _) = build_op(
        vec![record("5511999990000")],
        cfg.clone(),
        gateway.clone(),
        sink.clone(),
    );
    let first = first.with_pacer(Pacer::with_timing(
        Duration::from_millis(5),
        Duration::from_millis(2),
    ));

    dispatcher.start(first).await.unwrap();
    while !dispatcher.state().await.map_or(false, |s| s.running) {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let (second, _) = build_op(vec![record("5511988887777")], cfg, gateway, sink);
    let err = dispatcher.start(second).await.unwrap_err();
    assert!(matches!(err, DisparoError::Config(_)));

    dispatcher.stop().await;
    let summary = dispatcher.wait().await.unwrap().unwrap();
    assert!(summary.stopped);
}

#[tokio::test]
async fn test_dispatcher_rejects_back_to_back_starts() {
    let dispatcher = Dispatcher::new();
    let gateway = MockGateway::ok();
    let sink = Arc::new(CollectSink::default());

    let mut cfg = sender();
    cfg.interval = IntervalPolicy::Fixed { seconds: 3600 };
    let (first, _) = build_op(
        vec![record("5511999990000")],
        cfg.clone(),
        gateway.clone(),
        sink.clone(),
    );
    let first = first.with_pacer(Pacer::with_timing(
        Duration::from_millis(5),
        Duration::from_millis(2),
    ));
    let (second, _) = build_op(vec![record("5511988887777")], cfg, gateway, sink);

    // No yield between the two starts: the first task has not been polled
    // yet, so the busy check must not depend on run() having started.
    dispatcher.start(first).await.unwrap();
    let err = dispatcher.start(second).await.unwrap_err();
    assert!(matches!(err, DisparoError::Config(_)));

    dispatcher.stop().await;
    let summary = dispatcher.wait().await.unwrap().unwrap();
    assert!(summary.stopped);
}

// ---- registry ----

#[tokio::test]
async fn test_registry_resolution_flow() {
    let registry = Arc::new(ProcessRegistry::new());
    let records = vec![record("5511999990000"), record("5511988887777")];
    registry.register("op-1", "batch one", &records).await;

    let sink = RegistrySink::new(registry.clone(), "op-1");
    sink.record_sent(&records[0], &sent_meta("hello", 1))
        .await
        .unwrap();

    let detail = registry.detail("op-1", 0).await.unwrap();
    assert_eq!(detail.summary.status, OperationStatus::Running);
    assert_eq!(detail.summary.pending, 1);
    assert_eq!(detail.summary.sent, 1);
    assert_eq!(detail.pending[0].phone_raw, "5511988887777");

    sink.record_skipped(&records[1], SkipReason::DuplicateInBatch)
        .await
        .unwrap();

    let detail = registry.detail("op-1", 0).await.unwrap();
    assert_eq!(
        detail.summary.status,
        OperationStatus::Completed,
        "registry auto-completes when pending empties"
    );

    let stats = registry.stats().await;
    assert_eq!(stats.operations, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.records_sent, 1);
    assert_eq!(stats.records_skipped, 1);
}

#[tokio::test]
async fn test_registry_lists_are_most_recent_first() {
    let registry = Arc::new(ProcessRegistry::new());
    let records = vec![record("5511999990000"), record("5511988887777")];
    registry.register("op-1", "batch", &records).await;

    let sink = RegistrySink::new(registry.clone(), "op-1");
    sink.record_sent(&records[0], &sent_meta("first", 1))
        .await
        .unwrap();
    sink.record_sent(&records[1], &sent_meta("second", 1))
        .await
        .unwrap();

    let detail = registry.detail("op-1", 0).await.unwrap();
    assert_eq!(detail.sent[0].record.phone_raw, "5511988887777");
    assert_eq!(detail.sent[1].record.phone_raw, "5511999990000");
}

#[tokio::test]
async fn test_registry_terminal_status_is_sticky() {
    let registry = ProcessRegistry::new();
    registry.register("op-1", "batch", &[record("5511999990000")]).await;

    registry.set_status("op-1", OperationStatus::Stopped).await;
    registry.set_status("op-1", OperationStatus::Running).await;

    let detail = registry.detail("op-1", 0).await.unwrap();
    assert_eq!(detail.summary.status, OperationStatus::Stopped);
}

#[tokio::test]
async fn test_registry_publishes_summaries_on_change() {
    let registry = Arc::new(ProcessRegistry::new());
    let rx = registry.subscribe();
    assert!(rx.borrow().is_empty());

    registry.register("op-1", "batch", &[record("5511999990000")]).await;
    let summaries = rx.borrow().clone();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "batch");
    assert_eq!(summaries[0].total, 1);
}
