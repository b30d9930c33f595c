//! Inter-record pacing: countdown waits, retry backoff, ETA math.

use std::time::Duration;

use disparo_core::config::IntervalPolicy;
use disparo_core::traits::ProgressObserver;
use rand::Rng;

use crate::control::OperationControl;

/// How a cooperative wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Aborted,
}

/// Drives the pause-aware waits of an operation.
///
/// `tick` is the countdown granularity (one second in production), `poll`
/// how often a frozen or sliced wait re-checks the control flags.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    tick: Duration,
    poll: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            poll: Duration::from_millis(300),
        }
    }
}

impl Pacer {
    /// Pacer with custom timing. Tests shrink the durations to keep real
    /// time low.
    pub fn with_timing(tick: Duration, poll: Duration) -> Self {
        Self { tick, poll }
    }

    /// Count `total_secs` down, ticking once per second.
    ///
    /// Pause freezes the current second without a tick; stop aborts the
    /// wait. The observer sees every remaining value down to 1, then 0 on
    /// natural expiry only.
    pub async fn countdown(
        &self,
        total_secs: u64,
        control: &OperationControl,
        observer: &dyn ProgressObserver,
    ) -> WaitOutcome {
        observer.on_interval_start(total_secs);
        let mut t = total_secs;
        while t > 0 {
            if control.stop_requested() {
                return WaitOutcome::Aborted;
            }
            if control.is_paused() {
                tokio::time::sleep(self.poll).await;
                continue;
            }
            observer.on_interval_tick(t);
            tokio::time::sleep(self.tick).await;
            t -= 1;
        }
        if control.stop_requested() {
            return WaitOutcome::Aborted;
        }
        observer.on_interval_tick(0);
        WaitOutcome::Elapsed
    }

    /// Hold while paused; returns immediately when running.
    pub async fn wait_while_paused(&self, control: &OperationControl) -> WaitOutcome {
        loop {
            if control.stop_requested() {
                return WaitOutcome::Aborted;
            }
            if !control.is_paused() {
                return WaitOutcome::Elapsed;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Backoff before retrying: `attempt x base_ms`, sliced so pause and
    /// stop take effect within one poll.
    pub async fn backoff(
        &self,
        attempt: u32,
        base_ms: u64,
        control: &OperationControl,
    ) -> WaitOutcome {
        let mut remaining = Duration::from_millis(base_ms.saturating_mul(attempt as u64));
        while !remaining.is_zero() {
            if control.stop_requested() {
                return WaitOutcome::Aborted;
            }
            if control.is_paused() {
                tokio::time::sleep(self.poll).await;
                continue;
            }
            let step = remaining.min(self.poll);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
        if control.stop_requested() {
            return WaitOutcome::Aborted;
        }
        WaitOutcome::Elapsed
    }
}

/// Draw the next inter-record delay in seconds. Random policies redraw on
/// every call.
pub fn next_delay(policy: &IntervalPolicy) -> u64 {
    match *policy {
        IntervalPolicy::Fixed { seconds } => seconds.max(1),
        IntervalPolicy::Random { min, max } => {
            let lo = min.max(1);
            let hi = max.max(lo);
            rand::thread_rng().gen_range(lo..=hi)
        }
    }
}

/// Estimated time to drain a queue under a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtaEstimate {
    pub min_secs: u64,
    pub avg_secs: u64,
    pub max_secs: u64,
}

/// Seconds to drain `pending` records, ignoring send time and retries.
pub fn estimate_remaining(pending: usize, policy: &IntervalPolicy) -> EtaEstimate {
    let n = pending as u64;
    match *policy {
        IntervalPolicy::Fixed { seconds } => {
            let total = n * seconds.max(1);
            EtaEstimate {
                min_secs: total,
                avg_secs: total,
                max_secs: total,
            }
        }
        IntervalPolicy::Random { min, max } => {
            let lo = min.max(1);
            let hi = max.max(lo);
            EtaEstimate {
                min_secs: n * lo,
                avg_secs: n * (lo + hi) / 2,
                max_secs: n * hi,
            }
        }
    }
}

/// `mm:ss`, or `hh:mm:ss` once hours are involved.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
