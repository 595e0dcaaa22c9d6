use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub total_ticks: u64,
    pub paused_ticks: u64,
    pub hook_faults: u64,
    pub furniture_count: usize,
}

/// Latest loop metrics, readable from any thread while the loop runs.
/// A writer that panicked mid-update leaves the last complete snapshot.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

/// Wall-clock window over which simulation steps are counted.
#[derive(Debug)]
pub(crate) struct TickRateWindow {
    opened_at: Instant,
    length: Duration,
    steps: u32,
}

impl TickRateWindow {
    pub(crate) fn new(length: Duration) -> Self {
        Self {
            opened_at: Instant::now(),
            length,
            steps: 0,
        }
    }

    pub(crate) fn count_step(&mut self) {
        self.steps = self.steps.saturating_add(1);
    }

    /// Steps per second once the window has closed; reopens it at `now`.
    pub(crate) fn close_if_elapsed(&mut self, now: Instant) -> Option<f32> {
        let elapsed = now.saturating_duration_since(self.opened_at);
        if elapsed < self.length {
            return None;
        }
        let rate = self.steps as f32 / elapsed.as_secs_f32().max(f32::EPSILON);
        self.opened_at = now;
        self.steps = 0;
        Some(rate)
    }
}
