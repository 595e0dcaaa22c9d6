use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::sim::{TickReport, World};

use super::metrics::{LoopMetricsSnapshot, TickRateWindow};
use super::MetricsHandle;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Pace ticks against the wall clock; otherwise run them back to back.
    pub realtime: bool,
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            realtime: true,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDirective {
    Run,
    /// Skip `World::update` for this step but keep the loop going.
    Pause,
    Stop,
}

/// Call-site control over whether simulation steps actually tick the world.
pub trait SimControl {
    fn before_tick(&mut self, world: &mut World, step: u64) -> TickDirective;

    fn after_tick(&mut self, _world: &mut World, _report: &TickReport) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Control,
    MaxTicks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub steps: u64,
    pub simulated_ticks: u64,
    pub paused_ticks: u64,
    pub hook_faults: u64,
    pub commands_failed: u64,
    pub stop_reason: StopReason,
}

pub fn run_headless(
    config: &LoopConfig,
    world: &mut World,
    control: &mut dyn SimControl,
) -> LoopSummary {
    run_headless_with_metrics(config, world, control, &MetricsHandle::default())
}

pub fn run_headless_with_metrics(
    config: &LoopConfig,
    world: &mut World,
    control: &mut dyn SimControl,
    metrics_handle: &MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let max_ticks = config.max_ticks.filter(|limit| *limit > 0);
    let fixed_dt = Duration::from_secs_f64(1.0 / f64::from(target_tps));
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        realtime = config.realtime,
        max_ticks = ?max_ticks,
        "loop_config"
    );

    let mut summary = LoopSummary {
        steps: 0,
        simulated_ticks: 0,
        paused_ticks: 0,
        hook_faults: 0,
        commands_failed: 0,
        stop_reason: StopReason::Control,
    };
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut rate_window = TickRateWindow::new(metrics_log_interval);

    'frames: loop {
        let frame_dt = if config.realtime {
            let now = Instant::now();
            let raw = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            clamp_frame_delta(raw, max_frame_delta)
        } else {
            fixed_dt
        };
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            match control.before_tick(world, summary.steps) {
                TickDirective::Stop => {
                    summary.stop_reason = StopReason::Control;
                    break 'frames;
                }
                TickDirective::Pause => {
                    summary.paused_ticks = summary.paused_ticks.saturating_add(1);
                }
                TickDirective::Run => {
                    let report = world.update(fixed_dt_seconds);
                    summary.simulated_ticks = summary.simulated_ticks.saturating_add(1);
                    summary.hook_faults = summary
                        .hook_faults
                        .saturating_add(u64::from(report.hook_faults));
                    summary.commands_failed = summary
                        .commands_failed
                        .saturating_add(u64::from(report.commands_failed));
                    control.after_tick(world, &report);
                }
            }
            summary.steps = summary.steps.saturating_add(1);
            rate_window.count_step();

            if max_ticks.is_some_and(|limit| summary.steps >= limit) {
                summary.stop_reason = StopReason::MaxTicks;
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;
        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(tps) = rate_window.close_if_elapsed(Instant::now()) {
            let snapshot = LoopMetricsSnapshot {
                tps,
                total_ticks: summary.steps,
                paused_ticks: summary.paused_ticks,
                hook_faults: summary.hook_faults,
                furniture_count: world.furniture_count(),
            };
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                total_ticks = snapshot.total_ticks,
                paused_ticks = snapshot.paused_ticks,
                hook_faults = snapshot.hook_faults,
                furniture_count = snapshot.furniture_count,
                "loop_metrics"
            );
        }

        if config.realtime {
            let until_next_tick = fixed_dt.saturating_sub(accumulator);
            if !until_next_tick.is_zero() {
                thread::sleep(until_next_tick);
            }
        }
    }

    metrics_handle.publish(LoopMetricsSnapshot {
        tps: metrics_handle.snapshot().tps,
        total_ticks: summary.steps,
        paused_ticks: summary.paused_ticks,
        hook_faults: summary.hook_faults,
        furniture_count: world.furniture_count(),
    });
    info!(
        steps = summary.steps,
        simulated_ticks = summary.simulated_ticks,
        paused_ticks = summary.paused_ticks,
        hook_faults = summary.hook_faults,
        commands_failed = summary.commands_failed,
        stop_reason = ?summary.stop_reason,
        "loop_summary"
    );
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
