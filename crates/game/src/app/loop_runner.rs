use std::process::ExitCode;

use engine::{
    load_furniture_prototypes, resolve_app_paths, run_headless, ContentPipelineError,
    PlacementError, StartupError, TileGridError, World,
};
use thiserror::Error;
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::demo::{build_layout, subscribe_observers, DemoControl};
use super::hooks::native_hook_table;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentPipelineError),
    #[error("invalid world dimensions: {0}")]
    World(#[from] TileGridError),
    #[error("demo layout could not be placed: {0}")]
    Layout(#[from] PlacementError),
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app(app) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_app(app: AppWiring) -> Result<(), AppError> {
    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "app_paths_resolved");

    let registry = load_furniture_prototypes(&paths, &app.content_request)?;
    let hooks = native_hook_table(app.hook_budget);
    let mut world = World::new(app.world_config, registry, Box::new(hooks))?;

    let (log, _subscriptions) = subscribe_observers(&mut world);
    let layout = build_layout(&mut world)?;
    let mut control = DemoControl::new(layout, log);

    let summary = run_headless(&app.loop_config, &mut world, &mut control);
    let counts = world.event_counts();
    info!(
        ticks = summary.simulated_ticks,
        furniture_count = world.furniture_count(),
        tile_changed = counts.tile_changed,
        furniture_created = counts.furniture_created,
        furniture_changed = counts.furniture_changed,
        furniture_removed = counts.furniture_removed,
        "demo_finished"
    );
    Ok(())
}
