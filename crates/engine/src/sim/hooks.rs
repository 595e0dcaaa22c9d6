use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::content::FurniturePrototypeRegistry;

use super::furniture::{Furniture, FurnitureId, FurniturePrototype, FurnitureStore};
use super::tile::{Enterability, Tile, TileCoord, TileGrid, TileType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("hook '{name}' does not resolve to a runnable function")]
    NotFound { name: String },
    #[error("hook '{name}' faulted: {message}")]
    Fault { name: String, message: String },
    #[error("hook '{name}' ran for {elapsed:?}, over its {budget:?} budget")]
    BudgetExceeded {
        name: String,
        elapsed: Duration,
        budget: Duration,
    },
}

/// Call-by-name dispatch for scripted furniture behaviour.
///
/// Names resolve at call time, so a prototype may reference a hook that is
/// registered later or never; the latter surfaces as [`HookError::NotFound`].
pub trait ScriptHookRunner {
    /// Runs one update hook. `Ok(Some(_))` carries a diagnostic string.
    fn call_update(
        &self,
        name: &str,
        furniture: &mut Furniture,
        delta_seconds: f32,
        context: &mut HookContext<'_>,
    ) -> Result<Option<String>, HookError>;

    /// Evaluates an enterability predicate and returns its raw code.
    fn call_enterability(
        &self,
        name: &str,
        furniture: &Furniture,
        view: &WorldView<'_>,
    ) -> Result<i64, HookError>;
}

/// Read-only world query surface handed to hook code.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    grid: &'a TileGrid,
    furniture: &'a FurnitureStore,
    prototypes: &'a FurniturePrototypeRegistry,
}

impl<'a> WorldView<'a> {
    pub(crate) fn new(
        grid: &'a TileGrid,
        furniture: &'a FurnitureStore,
        prototypes: &'a FurniturePrototypeRegistry,
    ) -> Self {
        Self {
            grid,
            furniture,
            prototypes,
        }
    }

    pub fn grid(&self) -> &'a TileGrid {
        self.grid
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<&'a Tile> {
        self.grid.tile_at(x, y)
    }

    pub fn furniture(&self, id: FurnitureId) -> Option<&'a Furniture> {
        self.furniture.get(&id)
    }

    pub fn furniture_at(&self, coord: TileCoord) -> Option<&'a Furniture> {
        self.grid
            .tile(coord)
            .and_then(Tile::furniture)
            .and_then(|id| self.furniture.get(&id))
    }

    pub fn prototype(&self, object_type: &str) -> Option<&'a FurniturePrototype> {
        self.prototypes.get_prototype(object_type).map(|proto| &**proto)
    }
}

impl fmt::Debug for WorldView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldView")
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("furniture", &self.furniture.len())
            .finish()
    }
}

/// Structural mutations requested by hooks, applied after the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum HookCommand {
    PlaceFurniture {
        object_type: String,
        origin: TileCoord,
    },
    RemoveFurniture {
        id: FurnitureId,
    },
    SetTileType {
        coord: TileCoord,
        tile_type: TileType,
    },
}

#[derive(Debug)]
pub struct HookContext<'a> {
    view: WorldView<'a>,
    commands: &'a mut Vec<HookCommand>,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(view: WorldView<'a>, commands: &'a mut Vec<HookCommand>) -> Self {
        Self { view, commands }
    }

    pub fn view(&self) -> &WorldView<'a> {
        &self.view
    }

    pub fn place_furniture(&mut self, object_type: impl Into<String>, origin: TileCoord) {
        self.commands.push(HookCommand::PlaceFurniture {
            object_type: object_type.into(),
            origin,
        });
    }

    pub fn remove_furniture(&mut self, id: FurnitureId) {
        self.commands.push(HookCommand::RemoveFurniture { id });
    }

    pub fn set_tile_type(&mut self, coord: TileCoord, tile_type: TileType) {
        self.commands
            .push(HookCommand::SetTileType { coord, tile_type });
    }
}

type UpdateHookFn =
    Box<dyn Fn(&mut Furniture, f32, &mut HookContext<'_>) -> Result<Option<String>, String>>;
type EnterabilityHookFn = Box<dyn Fn(&Furniture, &WorldView<'_>) -> Enterability>;

/// Compiled strategy registry: hooks are plain Rust closures keyed by name.
#[derive(Default)]
pub struct NativeHookTable {
    update_hooks: HashMap<String, UpdateHookFn>,
    enterability_hooks: HashMap<String, EnterabilityHookFn>,
    budget: Option<Duration>,
}

impl NativeHookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations slower than `budget` are reported as faults once they return.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = (!budget.is_zero()).then_some(budget);
        self
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    pub fn register_update_hook<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&mut Furniture, f32, &mut HookContext<'_>) -> Result<Option<String>, String>
            + 'static,
    {
        self.update_hooks.insert(name.into(), Box::new(hook));
    }

    pub fn register_enterability_hook<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&Furniture, &WorldView<'_>) -> Enterability + 'static,
    {
        self.enterability_hooks.insert(name.into(), Box::new(hook));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.update_hooks.contains_key(name) || self.enterability_hooks.contains_key(name)
    }

    fn check_budget(&self, name: &str, started: Instant) -> Result<(), HookError> {
        let Some(budget) = self.budget else {
            return Ok(());
        };
        let elapsed = started.elapsed();
        if elapsed > budget {
            return Err(HookError::BudgetExceeded {
                name: name.to_string(),
                elapsed,
                budget,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for NativeHookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut update: Vec<&str> = self.update_hooks.keys().map(String::as_str).collect();
        let mut enterability: Vec<&str> = self
            .enterability_hooks
            .keys()
            .map(String::as_str)
            .collect();
        update.sort_unstable();
        enterability.sort_unstable();
        f.debug_struct("NativeHookTable")
            .field("update_hooks", &update)
            .field("enterability_hooks", &enterability)
            .field("budget", &self.budget)
            .finish()
    }
}

impl ScriptHookRunner for NativeHookTable {
    fn call_update(
        &self,
        name: &str,
        furniture: &mut Furniture,
        delta_seconds: f32,
        context: &mut HookContext<'_>,
    ) -> Result<Option<String>, HookError> {
        let hook = self
            .update_hooks
            .get(name)
            .ok_or_else(|| HookError::NotFound {
                name: name.to_string(),
            })?;

        let started = Instant::now();
        let outcome = hook(furniture, delta_seconds, context);
        self.check_budget(name, started)?;
        outcome.map_err(|message| HookError::Fault {
            name: name.to_string(),
            message,
        })
    }

    fn call_enterability(
        &self,
        name: &str,
        furniture: &Furniture,
        view: &WorldView<'_>,
    ) -> Result<i64, HookError> {
        let hook = self
            .enterability_hooks
            .get(name)
            .ok_or_else(|| HookError::NotFound {
                name: name.to_string(),
            })?;

        let started = Instant::now();
        let enterability = hook(furniture, view);
        self.check_budget(name, started)?;
        Ok(enterability.code())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::furniture::{FurnitureIdAllocator, ParamValue};

    struct Fixture {
        grid: TileGrid,
        store: FurnitureStore,
        registry: FurniturePrototypeRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                grid: TileGrid::new(4, 4, TileType::Grass).expect("grid"),
                store: FurnitureStore::new(),
                registry: FurniturePrototypeRegistry::default(),
            }
        }

        fn view(&self) -> WorldView<'_> {
            WorldView::new(&self.grid, &self.store, &self.registry)
        }
    }

    fn lamp() -> Furniture {
        let mut ids = FurnitureIdAllocator::default();
        Arc::new(FurniturePrototype::new("Lamp")).instantiate(ids.allocate())
    }

    #[test]
    fn unknown_names_report_not_found() {
        let fixture = Fixture::new();
        let table = NativeHookTable::new();
        let mut commands = Vec::new();
        let mut context = HookContext::new(fixture.view(), &mut commands);
        let mut furniture = lamp();

        let err = table
            .call_update("Missing", &mut furniture, 0.1, &mut context)
            .expect_err("missing update");
        assert_eq!(
            err,
            HookError::NotFound {
                name: "Missing".to_string()
            }
        );
        assert!(matches!(
            table.call_enterability("Missing", &furniture, &fixture.view()),
            Err(HookError::NotFound { .. })
        ));
    }

    #[test]
    fn update_hooks_mutate_and_queue_commands() {
        let fixture = Fixture::new();
        let mut table = NativeHookTable::new();
        table.register_update_hook("Grow", |furniture, dt, context| {
            let size = furniture.number_parameter("size", 0.0) + f64::from(dt);
            furniture.set_parameter("size", size);
            context.set_tile_type(TileCoord::new(0, 0), TileType::Floor);
            Ok(Some(format!("size={size}")))
        });
        let mut commands = Vec::new();
        let mut furniture = lamp();
        {
            let mut context = HookContext::new(fixture.view(), &mut commands);
            let diagnostic = table
                .call_update("Grow", &mut furniture, 0.5, &mut context)
                .expect("grow");
            assert_eq!(diagnostic.as_deref(), Some("size=0.5"));
        }
        assert_eq!(furniture.parameter("size"), Some(&ParamValue::Number(0.5)));
        assert_eq!(
            commands,
            vec![HookCommand::SetTileType {
                coord: TileCoord::new(0, 0),
                tile_type: TileType::Floor
            }]
        );
    }

    #[test]
    fn hook_errors_become_faults() {
        let fixture = Fixture::new();
        let mut table = NativeHookTable::new();
        table.register_update_hook("Broken", |_, _, _| Err("boom".to_string()));
        let mut commands = Vec::new();
        let mut context = HookContext::new(fixture.view(), &mut commands);
        let mut furniture = lamp();
        assert_eq!(
            table.call_update("Broken", &mut furniture, 0.1, &mut context),
            Err(HookError::Fault {
                name: "Broken".to_string(),
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn overrunning_hook_reports_budget_fault_after_running() {
        let fixture = Fixture::new();
        let mut table = NativeHookTable::new().with_budget(Duration::from_millis(1));
        table.register_update_hook("Slow", |furniture, _, _| {
            std::thread::sleep(Duration::from_millis(20));
            furniture.set_parameter("ran", true);
            Ok(None)
        });
        let mut commands = Vec::new();
        let mut context = HookContext::new(fixture.view(), &mut commands);
        let mut furniture = lamp();

        let err = table
            .call_update("Slow", &mut furniture, 0.1, &mut context)
            .expect_err("overrun");
        assert!(matches!(err, HookError::BudgetExceeded { .. }));
        assert_eq!(furniture.parameter("ran"), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn enterability_hooks_return_codes() {
        let fixture = Fixture::new();
        let mut table = NativeHookTable::new();
        table.register_enterability_hook("Never", |_, _| Enterability::NotEnterable);
        let code = table
            .call_enterability("Never", &lamp(), &fixture.view())
            .expect("code");
        assert_eq!(code, Enterability::NotEnterable.code());
        assert!(table.contains("Never"));
    }

    #[test]
    fn zero_budget_disables_the_check() {
        assert_eq!(NativeHookTable::new().with_budget(Duration::ZERO).budget(), None);
    }
}
