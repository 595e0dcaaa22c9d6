use std::time::Duration;

use engine::{ContentLoadRequest, LoopConfig, WorldConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ENABLED_MODS_ENV_VAR: &str = "COLONY_ENABLED_MODS";
const WORLD_SIZE_ENV_VAR: &str = "COLONY_WORLD_SIZE";
const MAX_TICKS_ENV_VAR: &str = "COLONY_MAX_TICKS";
const HOOK_BUDGET_ENV_VAR: &str = "COLONY_HOOK_BUDGET_MS";

const DEFAULT_MAX_TICKS: u64 = 600;

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) world_config: WorldConfig,
    pub(crate) content_request: ContentLoadRequest,
    pub(crate) hook_budget: Option<Duration>,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Colony Startup ===");

    let mut world_config = WorldConfig::default();
    if let Some((width, height)) = read_env(WORLD_SIZE_ENV_VAR, parse_world_size) {
        world_config.width = width;
        world_config.height = height;
    }
    let max_ticks = read_env(MAX_TICKS_ENV_VAR, |raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_TICKS);
    let hook_budget = read_env(HOOK_BUDGET_ENV_VAR, |raw| raw.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis);

    info!(
        width = world_config.width,
        height = world_config.height,
        max_ticks,
        hook_budget_ms = ?hook_budget.map(|budget| budget.as_millis() as u64),
        "app_config"
    );

    AppWiring {
        loop_config: LoopConfig {
            max_ticks: Some(max_ticks),
            ..LoopConfig::default()
        },
        world_config,
        content_request: ContentLoadRequest {
            enabled_mods: parse_enabled_mods_from_env(),
        },
        hook_budget,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Unset yields `None`; a value `parse` rejects is logged and also yields `None`.
fn read_env<T>(var: &'static str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(var, value = %raw, "env_value_ignored");
    }
    parsed
}

fn parse_enabled_mods_from_env() -> Vec<String> {
    std::env::var(ENABLED_MODS_ENV_VAR)
        .ok()
        .map(|raw| parse_enabled_mods(&raw))
        .unwrap_or_default()
}

fn parse_enabled_mods(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parses `WIDTHxHEIGHT`, e.g. `64x48`. Both sides must be non-zero.
fn parse_world_size(raw: &str) -> Option<(u32, u32)> {
    let (width, height) = raw.trim().split_once(['x', 'X'])?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}
