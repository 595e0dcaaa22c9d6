mod loop_runner;
mod metrics;

pub use loop_runner::{
    run_headless, run_headless_with_metrics, LoopConfig, LoopSummary, SimControl, StopReason,
    TickDirective,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
