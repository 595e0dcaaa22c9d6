use std::time::Duration;

use engine::{Enterability, NativeHookTable};

pub(crate) const DOOR_UPDATE_HOOK: &str = "OnUpdate_Door";
pub(crate) const DOOR_ENTERABILITY_HOOK: &str = "IsEnterable_Door";

pub(crate) const OPEN_PERCENT: &str = "openPercent";
pub(crate) const IS_OPENING: &str = "isOpening";

/// Fraction of a full swing per second.
const DOOR_SWING_SPEED: f64 = 2.0;
/// Below this the door blocks until it has opened further.
const DOOR_PASSABLE_THRESHOLD: f64 = 0.1;

pub(crate) fn native_hook_table(budget: Option<Duration>) -> NativeHookTable {
    let mut table = match budget {
        Some(budget) => NativeHookTable::new().with_budget(budget),
        None => NativeHookTable::new(),
    };

    table.register_update_hook(DOOR_UPDATE_HOOK, |door, delta_seconds, _| {
        let opening = door
            .parameter(IS_OPENING)
            .is_some_and(|value| value.is_truthy());
        let current = door.number_parameter(OPEN_PERCENT, 0.0);
        let step = f64::from(delta_seconds) * DOOR_SWING_SPEED;
        let next = if opening {
            (current + step).min(1.0)
        } else {
            (current - step).max(0.0)
        };
        door.set_parameter(OPEN_PERCENT, next);

        if next >= 1.0 && current < 1.0 {
            return Ok(Some(format!("door {} fully open", door.id())));
        }
        if next <= 0.0 && current > 0.0 {
            return Ok(Some(format!("door {} closed", door.id())));
        }
        Ok(None)
    });

    table.register_enterability_hook(DOOR_ENTERABILITY_HOOK, |door, _| {
        if door.number_parameter(OPEN_PERCENT, 0.0) < DOOR_PASSABLE_THRESHOLD {
            Enterability::Busy
        } else {
            Enterability::Enterable
        }
    });

    table
}

#[cfg(test)]
mod tests {
    use engine::{
        FurniturePrototype, FurniturePrototypeRegistry, ParamValue, TileCoord, World, WorldConfig,
    };

    use super::*;

    fn door_world() -> (World, engine::FurnitureId) {
        let mut door = FurniturePrototype::new("Door");
        door.update_hooks = vec![DOOR_UPDATE_HOOK.to_string()];
        door.enterability_hook = Some(DOOR_ENTERABILITY_HOOK.to_string());
        door.parameters
            .insert(OPEN_PERCENT.to_string(), ParamValue::Number(0.0));
        door.parameters
            .insert(IS_OPENING.to_string(), ParamValue::Bool(false));
        let registry = FurniturePrototypeRegistry::from_prototypes([door]).expect("registry");
        let config = WorldConfig {
            width: 10,
            height: 10,
            ..WorldConfig::default()
        };
        let mut world =
            World::new(config, registry, Box::new(native_hook_table(None))).expect("world");
        let id = world
            .place_furniture("Door", TileCoord::new(3, 3))
            .expect("door");
        (world, id)
    }

    #[test]
    fn closed_door_is_busy_until_it_opens() {
        let (mut world, door) = door_world();
        assert_eq!(world.furniture_enterability(door), Some(Enterability::Busy));

        world.set_furniture_parameter(door, IS_OPENING, true);
        world.update(0.25);
        let open = world
            .furniture(door)
            .map(|door| door.number_parameter(OPEN_PERCENT, 0.0))
            .expect("door");
        assert!((open - 0.5).abs() < 1e-6);
        assert_eq!(
            world.furniture_enterability(door),
            Some(Enterability::Enterable)
        );
        assert_eq!(
            world.tile_enterability(TileCoord::new(3, 3)),
            Some(Enterability::Enterable)
        );
    }

    #[test]
    fn door_clamps_at_fully_open_and_closes_again() {
        let (mut world, door) = door_world();
        world.set_furniture_parameter(door, IS_OPENING, true);
        for _ in 0..10 {
            world.update(0.25);
        }
        let open_percent = |world: &World| {
            world
                .furniture(door)
                .map(|door| door.number_parameter(OPEN_PERCENT, 0.0))
                .expect("door")
        };
        assert_eq!(open_percent(&world), 1.0);

        world.set_furniture_parameter(door, IS_OPENING, false);
        for _ in 0..10 {
            world.update(0.25);
        }
        assert_eq!(open_percent(&world), 0.0);
        assert_eq!(world.furniture_enterability(door), Some(Enterability::Busy));
    }

    #[test]
    fn idle_closed_door_publishes_no_changes() {
        let (mut world, _) = door_world();
        let report = world.update(0.25);
        assert_eq!(report.furniture_changed, 0);
        assert_eq!(report.hook_faults, 0);
    }
}
