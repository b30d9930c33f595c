//! The `status` command: batches and their send tallies.

use anyhow::bail;
use console::style;
use disparo_core::config::Config;
use disparo_store::{BatchRow, Store};

const LIST_LIMIT: u32 = 20;

pub async fn run(cfg: &Config, batch: Option<&str>) -> anyhow::Result<()> {
    let store = Store::new(&cfg.store).await?;
    match batch {
        Some(id) => {
            let Some(row) = store.get_batch(id).await? else {
                bail!("batch {id} not found");
            };
            print_batch(&store, &row).await
        }
        None => {
            let batches = store.list_batches(LIST_LIMIT).await?;
            if batches.is_empty() {
                println!("No batches yet.");
                println!("Import one with: disparo import contacts.json --name \"my leads\"");
                return Ok(());
            }
            for row in &batches {
                print_batch(&store, row).await?;
            }
            Ok(())
        }
    }
}

async fn print_batch(store: &Store, row: &BatchRow) -> anyhow::Result<()> {
    let tallies = store.batch_tallies(&row.id).await?;
    println!(
        "{}  {}  [{}]",
        style(&row.name).bold(),
        style(&row.id).dim(),
        row.status
    );
    println!(
        "  pending {}  sent {}  errors {}  skipped {}  (total {})",
        tallies.pending,
        style(tallies.sent).green(),
        style(tallies.errors).red(),
        tallies.skipped,
        tallies.total()
    );
    println!("  created {} UTC", row.created_at);
    Ok(())
}
