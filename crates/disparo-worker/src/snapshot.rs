//! Operation snapshots for best-effort resume after a crash or stop.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use disparo_core::config::{shellexpand, SenderConfig};
use disparo_core::error::DisparoError;
use disparo_core::record::ContactRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What survives a restart: enough to rebuild the pending queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub operation_id: String,
    pub name: String,
    /// Store batch backing the operation, when there is one.
    pub batch_id: Option<String>,
    pub sender: SenderConfig,
    /// Remaining in-memory queue; empty when `batch_id` holds the state.
    #[serde(default)]
    pub remaining: Vec<ContactRecord>,
    pub saved_at: DateTime<Utc>,
}

/// Writes one JSON file per operation under `{data_dir}/snapshots/`.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(data_dir: &str) -> Self {
        Self {
            dir: Path::new(&shellexpand(data_dir)).join("snapshots"),
        }
    }

    pub fn path_for(&self, operation_id: &str) -> PathBuf {
        self.dir.join(format!("{operation_id}.json"))
    }

    pub fn write(&self, snapshot: &OperationSnapshot) -> Result<(), DisparoError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.path_for(&snapshot.operation_id), json)?;
        Ok(())
    }

    /// Drop a terminal operation's snapshot. Missing files are fine.
    pub fn remove(&self, operation_id: &str) {
        let _ = std::fs::remove_file(self.path_for(operation_id));
    }
}

/// Most recently saved snapshot under `{data_dir}/snapshots/`, if any.
///
/// Corrupt files are skipped with a warning so one bad write never blocks
/// a resume.
pub fn load_latest(data_dir: &str) -> Result<Option<OperationSnapshot>, DisparoError> {
    let dir = Path::new(&shellexpand(data_dir)).join("snapshots");
    if !dir.exists() {
        return Ok(None);
    }
    let mut latest: Option<OperationSnapshot> = None;
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let snapshot: OperationSnapshot = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!("ignoring corrupt snapshot {}: {e}", path.display());
                continue;
            }
        };
        if latest
            .as_ref()
            .map_or(true, |cur| snapshot.saved_at > cur.saved_at)
        {
            latest = Some(snapshot);
        }
    }
    Ok(latest)
}
