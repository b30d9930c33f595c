//! The `run` and `resume` commands: drive a send operation to completion.

use std::sync::Arc;

use anyhow::{bail, Context};
use disparo_core::config::{self, Config, IntervalPolicy, SenderConfig};
use disparo_core::record::{ContactRecord, Outcome};
use disparo_core::traits::{DeliveryGateway, ProgressObserver, ResultSink};
use disparo_gateway::WahaGateway;
use disparo_store::{Store, StoreSink, StoreSource};
use disparo_worker::pacing::{estimate_remaining, format_duration};
use disparo_worker::prepare_queue;
use disparo_worker::sinks::LogSink;
use disparo_worker::snapshot::{load_latest, SnapshotWriter};
use disparo_worker::{MemorySource, OperationControl, OperationParts, RunSummary, SendOperation};
use tracing::warn;

pub struct RunArgs {
    pub batch: Option<String>,
    pub file: Option<String>,
    pub interval: Option<u64>,
    pub rand: Option<String>,
}

pub async fn run(cfg: &Config, args: RunArgs) -> anyhow::Result<()> {
    if args.batch.is_some() == args.file.is_some() {
        bail!("exactly one of --batch or --file is required");
    }
    config::ensure_layout(&cfg.app.data_dir);

    let gateway = connect_gateway(cfg).await?;

    if let Some(batch_id) = &args.batch {
        run_batch(cfg, gateway, batch_id, &args).await
    } else {
        run_file(cfg, gateway, args.file.as_deref().unwrap_or_default(), &args).await
    }
}

/// Pick up the most recently interrupted operation and drive it again.
pub async fn resume(cfg: &Config) -> anyhow::Result<()> {
    config::ensure_layout(&cfg.app.data_dir);
    let Some(snapshot) = load_latest(&cfg.app.data_dir)? else {
        println!("Nothing to resume.");
        return Ok(());
    };
    println!(
        "Resuming '{}' ({} saved {})",
        snapshot.name,
        snapshot.operation_id,
        snapshot.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let gateway = connect_gateway(cfg).await?;
    let writer = SnapshotWriter::new(&cfg.app.data_dir);

    // Batch-backed operations keep their queue in the store; file runs carry
    // it in the snapshot itself.
    let outcome = if let Some(batch_id) = snapshot.batch_id.clone() {
        let store = Store::new(&cfg.store).await?;
        let Some(batch) = store.get_batch(&batch_id).await? else {
            bail!("batch {batch_id} from the snapshot no longer exists");
        };
        let tallies = store.batch_tallies(&batch_id).await?;
        if tallies.pending == 0 {
            writer.remove(&snapshot.operation_id);
            println!("Batch '{}' has no pending records left.", batch.name);
            return Ok(());
        }
        announce_eta(tallies.pending as usize, &snapshot.sender);
        writer.remove(&snapshot.operation_id);
        drive_batch(cfg, store, batch_id, batch.name, snapshot.sender, gateway).await
    } else {
        if snapshot.remaining.is_empty() {
            writer.remove(&snapshot.operation_id);
            println!("Snapshot queue is empty; nothing to send.");
            return Ok(());
        }
        announce_eta(snapshot.remaining.len(), &snapshot.sender);
        writer.remove(&snapshot.operation_id);
        drive_memory(
            cfg,
            snapshot.name.clone(),
            snapshot.remaining.clone(),
            snapshot.sender,
            gateway,
        )
        .await
    };
    finish(outcome)
}

async fn run_batch(
    cfg: &Config,
    gateway: Arc<WahaGateway>,
    batch_id: &str,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let store = Store::new(&cfg.store).await?;
    let Some(batch) = store.get_batch(batch_id).await? else {
        bail!("batch {batch_id} not found; run 'disparo status' to list batches");
    };

    // Replays keep the settings the batch was imported with; the CLI flags
    // still win over both.
    let mut sender = batch
        .config
        .as_deref()
        .and_then(|json| serde_json::from_str::<SenderConfig>(json).ok())
        .unwrap_or_else(|| cfg.sender.clone());
    apply_overrides(&mut sender, args)?;

    let tallies = store.batch_tallies(batch_id).await?;
    if tallies.pending == 0 {
        println!("Batch '{}' has no pending records.", batch.name);
        return Ok(());
    }
    println!("Sending batch '{}'", batch.name);
    announce_eta(tallies.pending as usize, &sender);

    let outcome = drive_batch(
        cfg,
        store,
        batch_id.to_string(),
        batch.name,
        sender,
        gateway,
    )
    .await;
    finish(outcome)
}

async fn run_file(
    cfg: &Config,
    gateway: Arc<WahaGateway>,
    file: &str,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let mut sender = cfg.sender.clone();
    apply_overrides(&mut sender, args)?;

    let records = read_contacts(file)?;
    let prepared = prepare_queue(records, &sender);
    if prepared.siblings_added > 0 {
        println!("9-variant siblings added: {}", prepared.siblings_added);
    }
    if prepared.duplicates_removed > 0 {
        println!("Duplicates removed: {}", prepared.duplicates_removed);
    }
    if prepared.records.is_empty() {
        println!("Nothing to send.");
        return Ok(());
    }
    println!("Sending {} contacts from {file}", prepared.records.len());
    announce_eta(prepared.records.len(), &sender);

    let name = std::path::Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ad-hoc")
        .to_string();
    let outcome = drive_memory(cfg, name, prepared.records, sender, gateway).await;
    finish(outcome)
}

async fn drive_batch(
    cfg: &Config,
    store: Store,
    batch_id: String,
    name: String,
    sender: SenderConfig,
    gateway: Arc<WahaGateway>,
) -> anyhow::Result<RunSummary> {
    store.set_batch_status(&batch_id, "running").await?;

    let operation = SendOperation::new(OperationParts {
        name,
        batch_id: Some(batch_id.clone()),
        sender,
        gateway,
        sinks: vec![
            Arc::new(StoreSink::new(store.clone())) as Arc<dyn ResultSink>,
            Arc::new(LogSink),
        ],
        source: Arc::new(StoreSource::new(store.clone(), batch_id.clone())),
        observer: Arc::new(ConsoleObserver),
    })
    .with_snapshots(SnapshotWriter::new(&cfg.app.data_dir));

    wire_ctrl_c(operation.control());

    match operation.run().await {
        Ok(summary) => {
            let status = if summary.stopped { "stopped" } else { "completed" };
            store.set_batch_status(&batch_id, status).await?;
            Ok(summary)
        }
        Err(e) => {
            if let Err(mark) = store.set_batch_status(&batch_id, "stopped").await {
                warn!("failed to mark batch stopped: {mark}");
            }
            Err(e.into())
        }
    }
}

async fn drive_memory(
    cfg: &Config,
    name: String,
    records: Vec<ContactRecord>,
    sender: SenderConfig,
    gateway: Arc<WahaGateway>,
) -> anyhow::Result<RunSummary> {
    let operation = SendOperation::new(OperationParts {
        name,
        batch_id: None,
        sender,
        gateway,
        sinks: vec![Arc::new(LogSink) as Arc<dyn ResultSink>],
        source: Arc::new(MemorySource::new(records)),
        observer: Arc::new(ConsoleObserver),
    })
    .with_snapshots(SnapshotWriter::new(&cfg.app.data_dir));

    wire_ctrl_c(operation.control());
    Ok(operation.run().await?)
}

async fn connect_gateway(cfg: &Config) -> anyhow::Result<Arc<WahaGateway>> {
    let gateway = WahaGateway::new(cfg.gateway.clone())?;
    gateway
        .verify()
        .await
        .context("gateway session check failed; is WAHA up and the session connected?")?;
    println!(
        "Gateway session '{}' connected at {}",
        cfg.gateway.session, cfg.gateway.base_url
    );
    Ok(Arc::new(gateway))
}

fn finish(outcome: anyhow::Result<RunSummary>) -> anyhow::Result<()> {
    let summary = outcome?;
    let verdict = if summary.stopped { "Stopped" } else { "Done" };
    println!(
        "{verdict}: sent {}, errors {}, skipped {}",
        summary.sent, summary.errors, summary.skipped
    );
    Ok(())
}

fn announce_eta(pending: usize, sender: &SenderConfig) {
    let eta = estimate_remaining(pending, &sender.interval);
    if eta.min_secs == eta.max_secs {
        println!("{pending} pending, ETA ~{}", format_duration(eta.avg_secs));
    } else {
        println!(
            "{pending} pending, ETA {}-{} (avg {})",
            format_duration(eta.min_secs),
            format_duration(eta.max_secs),
            format_duration(eta.avg_secs)
        );
    }
}

fn read_contacts(file: &str) -> anyhow::Result<Vec<ContactRecord>> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))?;
    let records: Vec<ContactRecord> =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {file}"))?;
    if records.is_empty() {
        bail!("{file} contains no contacts");
    }
    Ok(records)
}

fn apply_overrides(sender: &mut SenderConfig, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(seconds) = args.interval {
        sender.interval = IntervalPolicy::Fixed { seconds };
    } else if let Some(range) = &args.rand {
        let (min, max) = range
            .split_once(',')
            .with_context(|| format!("--rand expects <min,max> seconds, got '{range}'"))?;
        let min: u64 = min
            .trim()
            .parse()
            .with_context(|| format!("--rand minimum '{min}' is not a number"))?;
        let max: u64 = max
            .trim()
            .parse()
            .with_context(|| format!("--rand maximum '{max}' is not a number"))?;
        sender.interval = IntervalPolicy::Random { min, max };
    }
    sender.normalize();
    Ok(())
}

/// Ctrl-C requests a stop; the operation finishes the in-flight record and
/// halts at the next checkpoint.
fn wire_ctrl_c(control: OperationControl) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping after the current record...");
            control.stop();
        }
    });
}

/// Narrates progress to stdout, one line per resolved record.
struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn on_interval_start(&self, total_secs: u64) {
        if total_secs > 0 {
            println!("  waiting {}", format_duration(total_secs));
        }
    }

    fn on_record_resolved(&self, record: &ContactRecord, outcome: &Outcome) {
        let who = if record.name.is_empty() {
            record.dial_digits().to_string()
        } else {
            record.name.clone()
        };
        match outcome {
            Outcome::Sent(meta) => {
                println!(
                    "  {} {who} ({}, attempt {})",
                    console::style("sent").green(),
                    record.phone_normalized,
                    meta.attempts
                );
            }
            Outcome::Error(meta) => {
                println!(
                    "  {} {who}: {}",
                    console::style("error").red(),
                    meta.error
                );
            }
            Outcome::Skipped(reason) => {
                println!("  {} {who}: {reason}", console::style("skip").yellow());
            }
        }
    }
}
