use std::fmt;

use tracing::warn;

use crate::content::FurniturePrototypeRegistry;

use super::events::{SubscriptionId, WorldEventCounts, WorldEvents};
use super::furniture::{Furniture, FurnitureId, FurniturePrototype, FurnitureStore, ParamValue};
use super::hooks::{HookCommand, HookContext, ScriptHookRunner, WorldView};
use super::placement::{
    neighbour_links, NeighbourLinks, PendingRecalculations, PlacementEngine, PlacementError,
    PlacementTarget, RemovalError,
};
use super::tile::{Enterability, Tile, TileCoord, TileGrid, TileGridError, TileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    pub default_tile_type: TileType,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            default_tile_type: TileType::Grass,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick_index: u64,
    pub furniture_ticked: u32,
    pub hooks_invoked: u32,
    pub hook_faults: u32,
    pub furniture_changed: u32,
    pub commands_applied: u32,
    pub commands_failed: u32,
}

/// Composition root owning the grid, the live furniture and the event streams.
pub struct World {
    grid: TileGrid,
    furniture: FurnitureStore,
    prototypes: FurniturePrototypeRegistry,
    hooks: Box<dyn ScriptHookRunner>,
    placement: PlacementEngine,
    events: WorldEvents,
    tick_index: u64,
}

impl World {
    pub fn new(
        config: WorldConfig,
        prototypes: FurniturePrototypeRegistry,
        hooks: Box<dyn ScriptHookRunner>,
    ) -> Result<Self, TileGridError> {
        let grid = TileGrid::new(config.width, config.height, config.default_tile_type)?;
        Ok(Self {
            grid,
            furniture: FurnitureStore::new(),
            prototypes,
            hooks,
            placement: PlacementEngine::default(),
            events: WorldEvents::default(),
            tick_index: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn view(&self) -> WorldView<'_> {
        WorldView::new(&self.grid, &self.furniture, &self.prototypes)
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.grid.tile_at(x, y)
    }

    /// Returns `None` out of bounds, otherwise whether the type changed.
    /// Only a real change publishes tile-changed.
    pub fn set_tile_type(&mut self, coord: TileCoord, tile_type: TileType) -> Option<bool> {
        let changed = self.grid.set_tile_type(coord, tile_type)?;
        if changed {
            if let Some(tile) = self.grid.tile(coord) {
                self.events.publish_tile_changed(tile);
            }
        }
        Some(changed)
    }

    pub fn prototypes(&self) -> &FurniturePrototypeRegistry {
        &self.prototypes
    }

    pub fn furniture_prototype(&self, object_type: &str) -> Option<&FurniturePrototype> {
        self.prototypes
            .get_prototype(object_type)
            .map(|prototype| &**prototype)
    }

    pub fn is_furniture_placement_valid(&self, object_type: &str, origin: TileCoord) -> bool {
        self.placement
            .is_placement_valid(&self.grid, &self.prototypes, object_type, origin)
    }

    pub fn place_furniture(
        &mut self,
        object_type: &str,
        origin: TileCoord,
    ) -> Result<FurnitureId, PlacementError> {
        let target = PlacementTarget {
            grid: &mut self.grid,
            store: &mut self.furniture,
            events: &mut self.events,
        };
        self.placement
            .try_place(target, &self.prototypes, object_type, origin)
    }

    pub fn remove_furniture(&mut self, id: FurnitureId) -> Result<(), RemovalError> {
        let target = PlacementTarget {
            grid: &mut self.grid,
            store: &mut self.furniture,
            events: &mut self.events,
        };
        self.placement.remove(target, id).map(drop)
    }

    pub fn furniture(&self, id: FurnitureId) -> Option<&Furniture> {
        self.furniture.get(&id)
    }

    pub fn furniture_at(&self, coord: TileCoord) -> Option<&Furniture> {
        self.grid
            .tile(coord)
            .and_then(Tile::furniture)
            .and_then(|id| self.furniture.get(&id))
    }

    pub fn furnitures(&self) -> impl Iterator<Item = &Furniture> {
        self.furniture.values()
    }

    pub fn furniture_count(&self) -> usize {
        self.furniture.len()
    }

    /// Returns `None` for an untracked id, otherwise whether the value changed.
    pub fn set_furniture_parameter(
        &mut self,
        id: FurnitureId,
        key: &str,
        value: impl Into<ParamValue>,
    ) -> Option<bool> {
        let furniture = self.furniture.get_mut(&id)?;
        let changed = furniture.set_parameter(key, value);
        furniture.take_changed();
        if changed {
            self.events.publish_furniture_changed(furniture);
        }
        Some(changed)
    }

    pub fn subscribe_update_hook(&mut self, id: FurnitureId, name: &str) -> bool {
        match self.furniture.get_mut(&id) {
            Some(furniture) => {
                furniture.subscribe_update_hook(name);
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe_update_hook(&mut self, id: FurnitureId, name: &str) -> bool {
        self.furniture
            .get_mut(&id)
            .is_some_and(|furniture| furniture.unsubscribe_update_hook(name))
    }

    pub fn furniture_enterability(&self, id: FurnitureId) -> Option<Enterability> {
        let furniture = self.furniture.get(&id)?;
        Some(furniture.enterability(self.hooks.as_ref(), &self.view()))
    }

    /// Base terrain cost scaled by the occupant's multiplier; zero is impassable.
    pub fn tile_movement_cost(&self, coord: TileCoord) -> Option<f32> {
        let tile = self.grid.tile(coord)?;
        let base = tile.base_movement_cost();
        let multiplier = tile
            .furniture()
            .and_then(|id| self.furniture.get(&id))
            .map_or(1.0, Furniture::movement_cost);
        Some(base * multiplier)
    }

    pub fn tile_enterability(&self, coord: TileCoord) -> Option<Enterability> {
        if self.tile_movement_cost(coord)? == 0.0 {
            return Some(Enterability::NotEnterable);
        }
        match self.furniture_at(coord) {
            Some(furniture) => Some(furniture.enterability(self.hooks.as_ref(), &self.view())),
            None => Some(Enterability::Enterable),
        }
    }

    pub fn neighbour_links(&self, id: FurnitureId) -> Option<NeighbourLinks> {
        let furniture = self.furniture.get(&id)?;
        Some(neighbour_links(&self.grid, &self.furniture, furniture))
    }

    pub fn subscribe_tile_changed(
        &mut self,
        subscriber: impl FnMut(&Tile) + 'static,
    ) -> SubscriptionId {
        self.events.tile_changed().subscribe(subscriber)
    }

    pub fn subscribe_furniture_created(
        &mut self,
        subscriber: impl FnMut(&Furniture) + 'static,
    ) -> SubscriptionId {
        self.events.furniture_created().subscribe(subscriber)
    }

    pub fn subscribe_furniture_changed(
        &mut self,
        subscriber: impl FnMut(&Furniture) + 'static,
    ) -> SubscriptionId {
        self.events.furniture_changed().subscribe(subscriber)
    }

    pub fn subscribe_furniture_removed(
        &mut self,
        subscriber: impl FnMut(&Furniture) + 'static,
    ) -> SubscriptionId {
        self.events.furniture_removed().subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn event_counts(&self) -> WorldEventCounts {
        self.events.counts()
    }

    pub fn take_pending_recalculations(&mut self) -> PendingRecalculations {
        self.placement.take_pending()
    }

    /// Ticks every live instance once, then applies hook commands in FIFO order.
    pub fn update(&mut self, delta_seconds: f32) -> TickReport {
        let mut report = TickReport {
            tick_index: self.tick_index,
            ..TickReport::default()
        };
        let mut commands = Vec::new();

        let ids: Vec<FurnitureId> = self.furniture.keys().copied().collect();
        for id in ids {
            let Some(mut furniture) = self.furniture.remove(&id) else {
                continue;
            };
            let hook_report = {
                let view = WorldView::new(&self.grid, &self.furniture, &self.prototypes);
                let mut context = HookContext::new(view, &mut commands);
                furniture.update(delta_seconds, self.hooks.as_ref(), &mut context)
            };
            report.furniture_ticked = report.furniture_ticked.saturating_add(1);
            report.hooks_invoked = report.hooks_invoked.saturating_add(hook_report.invoked);
            report.hook_faults = report
                .hook_faults
                .saturating_add(u32::try_from(hook_report.faults.len()).unwrap_or(u32::MAX));

            let changed = furniture.take_changed();
            self.furniture.insert(id, furniture);
            if changed {
                report.furniture_changed = report.furniture_changed.saturating_add(1);
                if let Some(furniture) = self.furniture.get(&id) {
                    self.events.publish_furniture_changed(furniture);
                }
            }
        }

        for command in commands {
            if self.apply_command(&command) {
                report.commands_applied = report.commands_applied.saturating_add(1);
            } else {
                report.commands_failed = report.commands_failed.saturating_add(1);
            }
        }

        self.tick_index = self.tick_index.saturating_add(1);
        report
    }

    fn apply_command(&mut self, command: &HookCommand) -> bool {
        let outcome = match command {
            HookCommand::PlaceFurniture {
                object_type,
                origin,
            } => self
                .place_furniture(object_type, *origin)
                .map(drop)
                .map_err(|error| error.to_string()),
            HookCommand::RemoveFurniture { id } => self
                .remove_furniture(*id)
                .map_err(|error| error.to_string()),
            HookCommand::SetTileType { coord, tile_type } => self
                .set_tile_type(*coord, *tile_type)
                .map(drop)
                .ok_or_else(|| format!("tile {coord} is outside the grid")),
        };

        match outcome {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    tick = self.tick_index,
                    command = ?command,
                    error = %error,
                    "hook_command_failed"
                );
                false
            }
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("furniture", &self.furniture.len())
            .field("prototypes", &self.prototypes.len())
            .field("events", &self.events)
            .field("tick_index", &self.tick_index)
            .finish()
    }
}
