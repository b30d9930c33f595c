//! The `import` command: load a JSON contact list into the store as a batch.

use anyhow::{bail, Context};
use disparo_core::config::Config;
use disparo_core::record::ContactRecord;
use disparo_store::Store;
use disparo_worker::prepare_queue;

pub async fn run(cfg: &Config, file: &str, name: &str) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))?;
    let records: Vec<ContactRecord> =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {file}"))?;
    if records.is_empty() {
        bail!("{file} contains no contacts");
    }
    let uploaded = records.len();

    // Preparation happens at import time so the stored queue is exactly what
    // a run will send: normalized, expanded, deduplicated.
    let prepared = prepare_queue(records, &cfg.sender);

    let store = Store::new(&cfg.store).await?;
    let config_json = serde_json::to_string(&cfg.sender)?;
    let batch_id = store.create_batch(name, Some(&config_json)).await?;
    let inserted = store.insert_records(&batch_id, &prepared.records).await?;

    println!("Batch '{name}' created: {batch_id}");
    println!("  uploaded:  {uploaded}");
    if prepared.siblings_added > 0 {
        println!("  siblings:  +{} (9-variant expand)", prepared.siblings_added);
    }
    if prepared.duplicates_removed > 0 {
        println!("  duplicates dropped: {}", prepared.duplicates_removed);
    }
    println!("  queued:    {inserted}");
    println!("Send it with: disparo run --batch {batch_id}");
    Ok(())
}
