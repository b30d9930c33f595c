//! Shared control state for one send operation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle of a send operation. `Stopped` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        }
    }
}

/// Point-in-time view of an operation's control state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub running: bool,
    pub paused: bool,
    pub completed: bool,
    pub processed_count: u64,
    pub pending_count: u64,
}

/// Cloneable handle over one operation's pause/stop flags and counters.
///
/// The flags are consulted at every suspension point: before a record is
/// popped, during the interval countdown, and during retry backoff. They
/// never interrupt an in-flight gateway call.
#[derive(Debug, Clone)]
pub struct OperationControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug)]
struct ControlInner {
    paused: AtomicBool,
    stopped: AtomicBool,
    status: Mutex<OperationStatus>,
    processed: AtomicU64,
    pending: AtomicU64,
}

impl OperationControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                paused: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                status: Mutex::new(OperationStatus::Idle),
                processed: AtomicU64::new(0),
                pending: AtomicU64::new(0),
            }),
        }
    }

    /// Request suspension at the next checkpoint. No-op on a terminal state.
    pub fn pause(&self) {
        let mut status = self.inner.status.lock().unwrap();
        if *status == OperationStatus::Running {
            self.inner.paused.store(true, Ordering::SeqCst);
            *status = OperationStatus::Paused;
        }
    }

    /// Resume a paused operation.
    pub fn resume(&self) {
        let mut status = self.inner.status.lock().unwrap();
        if *status == OperationStatus::Paused {
            self.inner.paused.store(false, Ordering::SeqCst);
            *status = OperationStatus::Running;
        }
    }

    /// Request a cooperative abort. The worker exits at the next checkpoint,
    /// letting any in-flight gateway call finish naturally.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> OperationStatus {
        *self.inner.status.lock().unwrap()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let status = self.status();
        StateSnapshot {
            running: matches!(status, OperationStatus::Running | OperationStatus::Paused),
            paused: status == OperationStatus::Paused,
            completed: status == OperationStatus::Completed,
            processed_count: self.inner.processed.load(Ordering::Relaxed),
            pending_count: self.inner.pending.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_status(&self, status: OperationStatus) {
        *self.inner.status.lock().unwrap() = status;
    }

    pub(crate) fn record_processed(&self) {
        self.inner.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_pending(&self, pending: u64) {
        self.inner.pending.store(pending, Ordering::Relaxed);
    }
}

impl Default for OperationControl {
    fn default() -> Self {
        Self::new()
    }
}
