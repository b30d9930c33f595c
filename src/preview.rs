//! The `preview` command: render messages for pending records, sending nothing.

use anyhow::bail;
use console::style;
use disparo_core::config::{Config, SenderConfig, SlotKind};
use disparo_core::template;
use disparo_store::Store;

pub async fn run(cfg: &Config, batch_id: &str, limit: u32) -> anyhow::Result<()> {
    let store = Store::new(&cfg.store).await?;
    let Some(batch) = store.get_batch(batch_id).await? else {
        bail!("batch {batch_id} not found");
    };

    // Render with the settings the batch will actually send with.
    let sender = batch
        .config
        .as_deref()
        .and_then(|json| serde_json::from_str::<SenderConfig>(json).ok())
        .unwrap_or_else(|| cfg.sender.clone());
    let records = store.list_records(batch_id, "pending", limit).await?;
    if records.is_empty() {
        println!("No pending records in '{}'.", batch.name);
        return Ok(());
    }

    println!(
        "Previewing {} of batch '{}' (nothing is sent)",
        records.len(),
        batch.name
    );
    for record in &records {
        println!(
            "{} <{}>",
            style(if record.name.is_empty() {
                "(unnamed)"
            } else {
                record.name.as_str()
            })
            .bold(),
            record.dial_digits()
        );
        // Mirror delivery: the per-record override replaces (or supplies)
        // the primary text slot.
        let mut slots: Vec<(SlotKind, String)> = sender
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
            match slots.iter_mut().find(|(kind, _)| *kind == SlotKind::Text1) {
                Some((_, template)) => *template = over.to_string(),
                None => slots.insert(0, (SlotKind::Text1, over.to_string())),
            }
        }
        if slots.is_empty() {
            println!(
                "  {}",
                style("no message slots enabled and no per-record override").red()
            );
            continue;
        }
        for (kind, template) in &slots {
            println!(
                "  {} {}",
                style(format!("[{}]", kind.label())).dim(),
                template::render(template, record)
            );
        }
    }
    Ok(())
}
