use std::cell::RefCell;
use std::rc::Rc;

use engine::{
    Enterability, FurnitureId, PlacementError, SimControl, SubscriptionId, TickDirective,
    TickReport, TileCoord, World,
};
use tracing::{debug, info, warn};

use super::hooks::IS_OPENING;
use super::sprite_keys::furniture_sprite_key;

const WALL: &str = "Wall";
const DOOR: &str = "Door";
const WORKBENCH: &str = "Workbench";

/// Outer size of the square demo room, walls included.
const ROOM_SIZE: i32 = 6;
const DOOR_TOGGLE_STEPS: u64 = 120;
const RENOVATE_STEP: u64 = 300;
const RENOVATE_DURATION_STEPS: u64 = 60;

#[derive(Debug, Clone)]
pub(crate) struct DemoLayout {
    pub door: FurnitureId,
    pub workbench: FurnitureId,
    pub walls: Vec<FurnitureId>,
    /// Wall segment that gets knocked out and rebuilt mid-run.
    pub renovated_wall: TileCoord,
}

/// A walled room with a door in the south wall and a workbench inside,
/// centred on the world.
pub(crate) fn build_layout(world: &mut World) -> Result<DemoLayout, PlacementError> {
    let origin = TileCoord::new(
        (world.width() as i32 - ROOM_SIZE) / 2,
        (world.height() as i32 - ROOM_SIZE) / 2,
    );
    let last = ROOM_SIZE - 1;
    let door_tile = origin.offset(ROOM_SIZE / 2, 0);

    let mut walls = Vec::new();
    for dy in 0..ROOM_SIZE {
        for dx in 0..ROOM_SIZE {
            let on_edge = dx == 0 || dy == 0 || dx == last || dy == last;
            let coord = origin.offset(dx, dy);
            if on_edge && coord != door_tile {
                walls.push(world.place_furniture(WALL, coord)?);
            }
        }
    }
    let door = world.place_furniture(DOOR, door_tile)?;
    let workbench = world.place_furniture(WORKBENCH, origin.offset(1, 2))?;

    info!(x = origin.x, y = origin.y, size = ROOM_SIZE, "demo_layout_built");
    Ok(DemoLayout {
        door,
        workbench,
        walls,
        renovated_wall: origin.offset(last, last / 2),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ObservedEvent {
    TileChanged(TileCoord),
    FurnitureCreated(FurnitureId),
    FurnitureChanged(FurnitureId),
    FurnitureRemoved { id: FurnitureId, object_type: String },
}

pub(crate) type EventLog = Rc<RefCell<Vec<ObservedEvent>>>;

/// Records every world event so it can be rendered to the log after the
/// mutation that raised it has finished.
pub(crate) fn subscribe_observers(world: &mut World) -> (EventLog, Vec<SubscriptionId>) {
    let log = EventLog::default();
    let mut subscriptions = Vec::with_capacity(4);

    let sink = Rc::clone(&log);
    subscriptions.push(world.subscribe_tile_changed(move |tile| {
        sink.borrow_mut()
            .push(ObservedEvent::TileChanged(tile.coord()));
    }));
    let sink = Rc::clone(&log);
    subscriptions.push(world.subscribe_furniture_created(move |furniture| {
        sink.borrow_mut()
            .push(ObservedEvent::FurnitureCreated(furniture.id()));
    }));
    let sink = Rc::clone(&log);
    subscriptions.push(world.subscribe_furniture_changed(move |furniture| {
        sink.borrow_mut()
            .push(ObservedEvent::FurnitureChanged(furniture.id()));
    }));
    let sink = Rc::clone(&log);
    subscriptions.push(world.subscribe_furniture_removed(move |furniture| {
        sink.borrow_mut().push(ObservedEvent::FurnitureRemoved {
            id: furniture.id(),
            object_type: furniture.object_type().to_string(),
        });
    }));

    (log, subscriptions)
}

/// Logs and clears recorded events; returns how many were drained.
pub(crate) fn drain_observed(world: &World, log: &EventLog) -> usize {
    let events = std::mem::take(&mut *log.borrow_mut());
    for event in &events {
        match event {
            ObservedEvent::TileChanged(coord) => {
                let tile_type = world.tile_at(coord.x, coord.y).map(|tile| tile.tile_type());
                debug!(x = coord.x, y = coord.y, tile_type = ?tile_type, "tile_changed");
            }
            ObservedEvent::FurnitureCreated(id) | ObservedEvent::FurnitureChanged(id) => {
                let Some(furniture) = world.furniture(*id) else {
                    continue;
                };
                let links = world.neighbour_links(*id).unwrap_or_default();
                match furniture_sprite_key(furniture, links) {
                    Ok(sprite) => debug!(
                        furniture = %id,
                        object_type = %furniture.object_type(),
                        created = matches!(event, ObservedEvent::FurnitureCreated(_)),
                        sprite = %sprite,
                        "furniture_sprite_updated"
                    ),
                    Err(error) => warn!(
                        furniture = %id,
                        object_type = %furniture.object_type(),
                        error = %error,
                        "furniture_sprite_key_invalid"
                    ),
                }
            }
            ObservedEvent::FurnitureRemoved { id, object_type } => {
                debug!(furniture = %id, object_type = %object_type, "furniture_sprite_released");
            }
        }
    }
    events.len()
}

/// Drives the demo: swings the door and rebuilds one wall segment.
#[derive(Debug)]
pub(crate) struct DemoControl {
    layout: DemoLayout,
    log: EventLog,
    door_opening: bool,
    door_enterability: Option<Enterability>,
    knocked_out: Option<FurnitureId>,
}

impl DemoControl {
    pub(crate) fn new(layout: DemoLayout, log: EventLog) -> Self {
        info!(
            door = %layout.door,
            workbench = %layout.workbench,
            wall_count = layout.walls.len(),
            "demo_control_ready"
        );
        Self {
            layout,
            log,
            door_opening: false,
            door_enterability: None,
            knocked_out: None,
        }
    }

    fn renovate(&mut self, world: &mut World, step: u64) {
        let coord = self.layout.renovated_wall;
        if step == RENOVATE_STEP {
            let Some(wall) = world.furniture_at(coord).map(|wall| wall.id()) else {
                return;
            };
            match world.remove_furniture(wall) {
                Ok(()) => {
                    info!(x = coord.x, y = coord.y, "demo_wall_removed");
                    self.knocked_out = Some(wall);
                }
                Err(error) => warn!(error = %error, "demo_wall_remove_failed"),
            }
        } else if step == RENOVATE_STEP + RENOVATE_DURATION_STEPS && self.knocked_out.is_some() {
            match world.place_furniture(WALL, coord) {
                Ok(wall) => {
                    info!(furniture = %wall, x = coord.x, y = coord.y, "demo_wall_rebuilt");
                    self.knocked_out = None;
                }
                Err(error) => warn!(error = %error, "demo_wall_rebuild_failed"),
            }
        }
    }
}

impl SimControl for DemoControl {
    fn before_tick(&mut self, world: &mut World, step: u64) -> TickDirective {
        if step > 0 && step % DOOR_TOGGLE_STEPS == 0 {
            self.door_opening = !self.door_opening;
            world.set_furniture_parameter(self.layout.door, IS_OPENING, self.door_opening);
            info!(step, opening = self.door_opening, "demo_door_toggled");
        }
        self.renovate(world, step);
        TickDirective::Run
    }

    fn after_tick(&mut self, world: &mut World, report: &TickReport) {
        drain_observed(world, &self.log);

        let enterability = world.furniture_enterability(self.layout.door);
        if enterability != self.door_enterability {
            info!(
                tick = report.tick_index,
                enterability = ?enterability,
                "door_enterability_changed"
            );
            self.door_enterability = enterability;
        }

        let pending = world.take_pending_recalculations();
        if !pending.is_empty() {
            debug!(
                tick = report.tick_index,
                rooms = pending.rooms,
                tile_graph = pending.tile_graph,
                "recalculation_requested"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use engine::{
        FurniturePrototype, FurniturePrototypeRegistry, ParamValue, TileOffset, WorldConfig,
    };

    use super::*;
    use crate::app::hooks::{
        native_hook_table, DOOR_ENTERABILITY_HOOK, DOOR_UPDATE_HOOK, OPEN_PERCENT,
    };

    fn demo_world() -> World {
        let mut wall = FurniturePrototype::new(WALL);
        wall.can_link_to_neighbour = true;
        wall.can_enclose_rooms = true;
        wall.movement_cost = 0.0;
        let mut door = FurniturePrototype::new(DOOR);
        door.update_hooks = vec![DOOR_UPDATE_HOOK.to_string()];
        door.enterability_hook = Some(DOOR_ENTERABILITY_HOOK.to_string());
        door.parameters
            .insert(OPEN_PERCENT.to_string(), ParamValue::Number(0.0));
        let mut bench = FurniturePrototype::new(WORKBENCH);
        bench.width = 2;
        bench.height = 2;
        bench.work_spot_offset = TileOffset::new(0, -1);
        let registry =
            FurniturePrototypeRegistry::from_prototypes([wall, door, bench]).expect("registry");
        let config = WorldConfig {
            width: 12,
            height: 12,
            ..WorldConfig::default()
        };
        World::new(config, registry, Box::new(native_hook_table(None))).expect("world")
    }

    #[test]
    fn layout_builds_a_closed_room() {
        let mut world = demo_world();
        let layout = build_layout(&mut world).expect("layout");
        assert_eq!(layout.walls.len(), 19);
        assert_eq!(world.furniture_count(), 21);

        let bench = world.furniture(layout.workbench).expect("bench");
        let work_spot = bench.work_spot_tile(world.grid()).expect("work spot");
        assert!(work_spot.furniture().is_none());

        assert_eq!(
            world.furniture_enterability(layout.door),
            Some(Enterability::Busy)
        );
    }

    #[test]
    fn corner_walls_link_two_ways() {
        let mut world = demo_world();
        let layout = build_layout(&mut world).expect("layout");
        let corner = layout.walls[0];
        let links = world.neighbour_links(corner).expect("links");
        assert_eq!(links.suffix(), "NE");
        let sprite = furniture_sprite_key(world.furniture(corner).expect("corner"), links)
            .expect("sprite");
        assert_eq!(sprite, "furniture/wall_ne");
    }

    #[test]
    fn observers_record_and_drain_events() {
        let mut world = demo_world();
        let (log, subscriptions) = subscribe_observers(&mut world);
        assert_eq!(subscriptions.len(), 4);
        world
            .place_furniture(WALL, TileCoord::new(0, 0))
            .expect("wall");
        world
            .place_furniture(WALL, TileCoord::new(0, 1))
            .expect("wall");

        assert_eq!(drain_observed(&world, &log), 3);
        assert!(log.borrow().is_empty());
        for id in subscriptions {
            assert!(world.unsubscribe(id));
        }
    }

    #[test]
    fn control_renovates_and_toggles_door() {
        let mut world = demo_world();
        let layout = build_layout(&mut world).expect("layout");
        let (log, _) = subscribe_observers(&mut world);
        let coord = layout.renovated_wall;
        let door = layout.door;
        let mut control = DemoControl::new(layout, log);

        control.before_tick(&mut world, RENOVATE_STEP);
        assert!(world.furniture_at(coord).is_none());
        control.before_tick(&mut world, RENOVATE_STEP + RENOVATE_DURATION_STEPS);
        assert!(world.furniture_at(coord).is_some());

        control.before_tick(&mut world, DOOR_TOGGLE_STEPS);
        assert_eq!(
            world.furniture(door).and_then(|door| door.parameter(IS_OPENING)).cloned(),
            Some(ParamValue::Bool(true))
        );
    }
}
