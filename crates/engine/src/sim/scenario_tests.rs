use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;

use super::*;
use crate::content::{load_furniture_prototypes, ContentLoadRequest};
use crate::AppPaths;

const FURNITURE_JSON: &str = r#"{
  "furnitures": [
    { "objectType": "Wall", "movementCost": 0, "canLinkToNeighbour": true, "canEncloseRooms": true },
    { "objectType": "Fence", "width": 2, "canLinkToNeighbour": true },
    {
      "objectType": "Door",
      "updateHooks": ["OnUpdate_Door"],
      "isEnterableHook": "IsEnterable_Door",
      "parameters": { "openPercent": 0, "isOpening": false }
    }
  ]
}"#;

const WORKSHOP_XML: &str = r#"<Defs>
  <FurnitureDef>
    <objectType>Workbench</objectType>
    <width>2</width>
    <height>2</height>
    <workSpotOffsetY>-1</workSpotOffsetY>
  </FurnitureDef>
</Defs>"#;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

fn door_hooks() -> NativeHookTable {
    let mut hooks = NativeHookTable::new();
    hooks.register_update_hook("OnUpdate_Door", |door, delta_seconds, _| {
        let opening = door
            .parameter("isOpening")
            .is_some_and(ParamValue::is_truthy);
        let step = f64::from(delta_seconds) * 2.0;
        let current = door.number_parameter("openPercent", 0.0);
        let next = if opening {
            (current + step).min(1.0)
        } else {
            (current - step).max(0.0)
        };
        door.set_parameter("openPercent", next);
        Ok(None)
    });
    hooks.register_enterability_hook("IsEnterable_Door", |door, _| {
        if door.number_parameter("openPercent", 0.0) < 0.1 {
            Enterability::Busy
        } else {
            Enterability::Enterable
        }
    });
    hooks
}

/// Loads content from a temp root the same way the binary does.
fn loaded_world(width: u32, height: u32) -> (TempDir, World) {
    let temp = TempDir::new().expect("temp");
    let root = temp.path();
    let app = AppPaths {
        root: root.to_path_buf(),
        base_content_dir: root.join("assets").join("base"),
        mods_dir: root.join("mods"),
    };
    write_file(&app.base_content_dir.join("furniture.json"), FURNITURE_JSON);
    write_file(
        &app.base_content_dir.join("defs").join("workshop.xml"),
        WORKSHOP_XML,
    );
    let registry =
        load_furniture_prototypes(&app, &ContentLoadRequest::default()).expect("content");
    let config = WorldConfig {
        width,
        height,
        default_tile_type: TileType::Grass,
    };
    let world = World::new(config, registry, Box::new(door_hooks())).expect("world");
    (temp, world)
}

fn record_changed(world: &mut World) -> Rc<RefCell<Vec<FurnitureId>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    world.subscribe_furniture_changed(move |furniture| sink.borrow_mut().push(furniture.id()));
    seen
}

#[test]
fn single_tile_placement_then_rejection_on_same_tile() {
    let (_temp, mut world) = loaded_world(10, 10);
    let origin = TileCoord::new(4, 4);
    let wall = world.place_furniture("Wall", origin).expect("wall");
    assert_eq!(
        world.tile_at(4, 4).and_then(Tile::furniture),
        Some(wall)
    );
    assert!(!world.is_furniture_placement_valid("Wall", origin));

    let err = world
        .place_furniture("Door", origin)
        .expect_err("occupied");
    assert!(matches!(
        err,
        PlacementError::InvalidPosition {
            reason: InvalidPositionReason::Occupied { occupant, .. },
            ..
        } if occupant == wall
    ));
    assert_eq!(
        world.tile_at(4, 4).and_then(Tile::furniture),
        Some(wall)
    );
    assert_eq!(world.furniture_count(), 1);
    assert_eq!(world.event_counts().furniture_created, 1);
}

#[test]
fn workbench_overlapping_one_occupied_tile_claims_nothing() {
    let (_temp, mut world) = loaded_world(10, 10);
    world
        .place_furniture("Wall", TileCoord::new(3, 3))
        .expect("wall");
    world
        .place_furniture("Workbench", TileCoord::new(2, 2))
        .expect_err("overlap");
    for coord in [TileCoord::new(2, 2), TileCoord::new(3, 2), TileCoord::new(2, 3)] {
        assert!(world.furniture_at(coord).is_none(), "coord={coord}");
    }

    let bench = world
        .place_furniture("Workbench", TileCoord::new(5, 5))
        .expect("bench");
    let footprint = world
        .furniture(bench)
        .and_then(Furniture::footprint)
        .expect("footprint");
    for coord in footprint.coords() {
        assert_eq!(world.tile_at(coord.x, coord.y).and_then(Tile::furniture), Some(bench));
    }
    let work_spot = world
        .furniture(bench)
        .and_then(|bench| bench.work_spot_tile(world.grid()))
        .expect("work spot");
    assert_eq!(work_spot.coord(), TileCoord::new(5, 4));
}

#[test]
fn wall_next_to_wall_notifies_only_the_existing_neighbour() {
    let (_temp, mut world) = loaded_world(10, 10);
    let upper = world
        .place_furniture("Wall", TileCoord::new(5, 6))
        .expect("upper");
    let changed = record_changed(&mut world);

    let lower = world
        .place_furniture("Wall", TileCoord::new(5, 5))
        .expect("lower");
    assert_eq!(*changed.borrow(), vec![upper]);
    assert_eq!(
        world.neighbour_links(lower).map(NeighbourLinks::suffix),
        Some("N".to_string())
    );
    assert_eq!(
        world.neighbour_links(upper).map(NeighbourLinks::suffix),
        Some("S".to_string())
    );
}

#[test]
fn centre_wall_notifies_neighbours_in_nesw_order() {
    let (_temp, mut world) = loaded_world(10, 10);
    let north = world
        .place_furniture("Wall", TileCoord::new(5, 6))
        .expect("north");
    let east = world
        .place_furniture("Wall", TileCoord::new(6, 5))
        .expect("east");
    let south = world
        .place_furniture("Wall", TileCoord::new(5, 4))
        .expect("south");
    let west = world
        .place_furniture("Wall", TileCoord::new(4, 5))
        .expect("west");
    let changed = record_changed(&mut world);

    let centre = world
        .place_furniture("Wall", TileCoord::new(5, 5))
        .expect("centre");
    assert_eq!(*changed.borrow(), vec![north, east, south, west]);
    assert_eq!(
        world.neighbour_links(centre).map(NeighbourLinks::suffix),
        Some("NESW".to_string())
    );
}

#[test]
fn wide_linkable_furniture_does_not_link_to_itself() {
    let (_temp, mut world) = loaded_world(10, 10);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    world.subscribe_furniture_created(move |furniture| {
        sink.borrow_mut().push(("created", furniture.id()));
    });
    let sink = Rc::clone(&events);
    world.subscribe_furniture_changed(move |furniture| {
        sink.borrow_mut().push(("changed", furniture.id()));
    });

    let fence = world
        .place_furniture("Fence", TileCoord::new(3, 3))
        .expect("fence");
    assert_eq!(*events.borrow(), vec![("created", fence)]);
    assert_eq!(
        world.neighbour_links(fence).map(NeighbourLinks::suffix),
        Some(String::new())
    );

    let next = world
        .place_furniture("Fence", TileCoord::new(5, 3))
        .expect("next fence");
    assert_eq!(
        world.neighbour_links(next).map(NeighbourLinks::suffix),
        Some("W".to_string())
    );
    assert_eq!(events.borrow().last().copied(), Some(("created", next)));
    let above = world
        .place_furniture("Fence", TileCoord::new(3, 4))
        .expect("above");
    assert_eq!(
        world.neighbour_links(above).map(NeighbourLinks::suffix),
        Some("S".to_string())
    );

    world.remove_furniture(fence).expect("remove");
    assert_eq!(
        events.borrow().last().copied(),
        Some(("changed", above))
    );
}

#[test]
fn removal_frees_tiles_and_second_removal_is_silent() {
    let (_temp, mut world) = loaded_world(10, 10);
    let bench = world
        .place_furniture("Workbench", TileCoord::new(1, 1))
        .expect("bench");
    world.remove_furniture(bench).expect("remove");
    assert!(world.furniture_at(TileCoord::new(2, 2)).is_none());
    assert_eq!(world.event_counts().furniture_removed, 1);

    assert_eq!(
        world.remove_furniture(bench),
        Err(RemovalError::NotTracked { id: bench })
    );
    assert_eq!(world.event_counts().furniture_removed, 1);
    assert!(world.is_furniture_placement_valid("Workbench", TileCoord::new(1, 1)));
}

#[test]
fn water_blocks_placement_and_unchanged_tile_type_is_silent() {
    let (_temp, mut world) = loaded_world(10, 10);
    let coord = TileCoord::new(2, 7);
    assert_eq!(world.set_tile_type(coord, TileType::Grass), Some(false));
    assert_eq!(world.event_counts().tile_changed, 0);
    assert_eq!(world.set_tile_type(coord, TileType::Water), Some(true));
    assert_eq!(world.event_counts().tile_changed, 1);

    let err = world.place_furniture("Wall", coord).expect_err("water");
    assert!(matches!(
        err,
        PlacementError::InvalidPosition {
            reason: InvalidPositionReason::NotBuildable { .. },
            ..
        }
    ));
}

#[test]
fn door_opens_over_ticks_and_becomes_enterable() {
    let (_temp, mut world) = loaded_world(10, 10);
    let door = world
        .place_furniture("Door", TileCoord::new(3, 3))
        .expect("door");
    assert_eq!(world.furniture_enterability(door), Some(Enterability::Busy));
    assert_eq!(
        world.tile_enterability(TileCoord::new(3, 3)),
        Some(Enterability::Busy)
    );

    let changed = record_changed(&mut world);
    world.set_furniture_parameter(door, "isOpening", true);
    let report = world.update(0.25);
    assert_eq!(report.furniture_changed, 1);
    assert_eq!(report.hook_faults, 0);
    assert_eq!(changed.borrow().len(), 2);

    let open = world
        .furniture(door)
        .map(|door| door.number_parameter("openPercent", 0.0))
        .expect("door");
    assert!((open - 0.5).abs() < 1e-6);
    assert_eq!(
        world.furniture_enterability(door),
        Some(Enterability::Enterable)
    );
}

#[test]
fn walls_make_tiles_impassable_and_everything_else_keeps_cost() {
    let (_temp, mut world) = loaded_world(10, 10);
    world
        .place_furniture("Wall", TileCoord::new(0, 0))
        .expect("wall");
    assert_eq!(world.tile_movement_cost(TileCoord::new(0, 0)), Some(0.0));
    assert_eq!(
        world.tile_enterability(TileCoord::new(0, 0)),
        Some(Enterability::NotEnterable)
    );
    assert_eq!(world.tile_movement_cost(TileCoord::new(1, 0)), Some(1.0));
    assert_eq!(world.tile_movement_cost(TileCoord::new(10, 0)), None);
}
