use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::content::FurniturePrototypeRegistry;

use super::events::WorldEvents;
use super::furniture::{Furniture, FurnitureId, FurnitureIdAllocator, FurnitureStore};
use super::tile::{Direction, TileCoord, TileGrid, TileType};

/// Width x height block of tiles whose lower-left corner is `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub origin: TileCoord,
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(origin: TileCoord, width: u32, height: u32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    pub fn coords(self) -> impl Iterator<Item = TileCoord> {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        (0..height).flat_map(move |dy| (0..width).map(move |dx| self.origin.offset(dx, dy)))
    }

    pub fn contains(self, coord: TileCoord) -> bool {
        let dx = i64::from(coord.x) - i64::from(self.origin.x);
        let dy = i64::from(coord.y) - i64::from(self.origin.y);
        (0..i64::from(self.width)).contains(&dx) && (0..i64::from(self.height)).contains(&dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidPositionReason {
    #[error("tile {coord} is outside the grid")]
    OutOfBounds { coord: TileCoord },
    #[error("tile {coord} is {} and cannot be built on", tile_type.as_token())]
    NotBuildable { coord: TileCoord, tile_type: TileType },
    #[error("tile {coord} is occupied by furniture {occupant}")]
    Occupied {
        coord: TileCoord,
        occupant: FurnitureId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("unknown furniture prototype '{object_type}'")]
    UnknownPrototype { object_type: String },
    #[error("cannot place '{object_type}' at {origin}: {reason}")]
    InvalidPosition {
        object_type: String,
        origin: TileCoord,
        reason: InvalidPositionReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RemovalError {
    #[error("furniture {id} is not tracked by this world")]
    NotTracked { id: FurnitureId },
}

/// Which orthogonal neighbours of an origin tile hold a same-type linkable instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighbourLinks {
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

impl NeighbourLinks {
    pub fn is_linked(self, direction: Direction) -> bool {
        match direction {
            Direction::North => self.north,
            Direction::East => self.east,
            Direction::South => self.south,
            Direction::West => self.west,
        }
    }

    fn set(&mut self, direction: Direction) {
        match direction {
            Direction::North => self.north = true,
            Direction::East => self.east = true,
            Direction::South => self.south = true,
            Direction::West => self.west = true,
        }
    }

    /// Linked directions as letters in `NESW` order, e.g. `"NS"`.
    pub fn suffix(self) -> String {
        Direction::ALL
            .into_iter()
            .filter(|direction| self.is_linked(*direction))
            .map(Direction::letter)
            .collect()
    }
}

impl fmt::Display for NeighbourLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix())
    }
}

/// Recalculations owed to systems outside the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingRecalculations {
    pub rooms: bool,
    pub tile_graph: bool,
}

impl PendingRecalculations {
    pub fn is_empty(self) -> bool {
        !self.rooms && !self.tile_graph
    }
}

/// Checks every tile of `footprint` without touching any state.
pub fn validate_footprint(
    grid: &TileGrid,
    footprint: Footprint,
) -> Result<(), InvalidPositionReason> {
    for coord in footprint.coords() {
        let Some(tile) = grid.tile(coord) else {
            return Err(InvalidPositionReason::OutOfBounds { coord });
        };
        if !tile.tile_type().is_buildable() {
            return Err(InvalidPositionReason::NotBuildable {
                coord,
                tile_type: tile.tile_type(),
            });
        }
        if let Some(occupant) = tile.furniture() {
            return Err(InvalidPositionReason::Occupied { coord, occupant });
        }
    }
    Ok(())
}

fn links_to(candidate: &Furniture, object_type: &str) -> bool {
    candidate.can_link_to_neighbour() && candidate.object_type() == object_type
}

/// Same-type linkable instances on the four tiles around `origin`, in NESW order.
/// Tiles still covered by `own` (a multi-tile footprint) are not neighbours.
pub fn linked_neighbours(
    grid: &TileGrid,
    store: &FurnitureStore,
    own: FurnitureId,
    origin: TileCoord,
    object_type: &str,
) -> Vec<(Direction, FurnitureId)> {
    Direction::ALL
        .into_iter()
        .filter_map(|direction| {
            let id = grid.neighbour(origin, direction)?.furniture()?;
            if id == own {
                return None;
            }
            let neighbour = store.get(&id)?;
            links_to(neighbour, object_type).then_some((direction, id))
        })
        .collect()
}

pub fn neighbour_links(
    grid: &TileGrid,
    store: &FurnitureStore,
    furniture: &Furniture,
) -> NeighbourLinks {
    let mut links = NeighbourLinks::default();
    let Some(origin) = furniture.tile() else {
        return links;
    };
    for (direction, _) in
        linked_neighbours(grid, store, furniture.id(), origin, furniture.object_type())
    {
        links.set(direction);
    }
    links
}

/// Mutable state the placement engine commits into.
pub(crate) struct PlacementTarget<'a> {
    pub grid: &'a mut TileGrid,
    pub store: &'a mut FurnitureStore,
    pub events: &'a mut WorldEvents,
}

#[derive(Debug, Default)]
pub(crate) struct PlacementEngine {
    ids: FurnitureIdAllocator,
    pending: PendingRecalculations,
}

impl PlacementEngine {
    pub(crate) fn is_placement_valid(
        &self,
        grid: &TileGrid,
        registry: &FurniturePrototypeRegistry,
        object_type: &str,
        origin: TileCoord,
    ) -> bool {
        registry.get_prototype(object_type).is_some_and(|prototype| {
            validate_footprint(grid, Footprint::new(origin, prototype.width, prototype.height))
                .is_ok()
        })
    }

    /// All-or-nothing: no tile changes unless the whole footprint is valid.
    pub(crate) fn try_place(
        &mut self,
        target: PlacementTarget<'_>,
        registry: &FurniturePrototypeRegistry,
        object_type: &str,
        origin: TileCoord,
    ) -> Result<FurnitureId, PlacementError> {
        let Some(prototype) = registry.get_prototype(object_type) else {
            debug!(object_type, "placement_unknown_prototype");
            return Err(PlacementError::UnknownPrototype {
                object_type: object_type.to_string(),
            });
        };

        let footprint = Footprint::new(origin, prototype.width, prototype.height);
        if let Err(reason) = validate_footprint(target.grid, footprint) {
            debug!(
                object_type,
                x = origin.x,
                y = origin.y,
                reason = %reason,
                "placement_rejected"
            );
            return Err(PlacementError::InvalidPosition {
                object_type: object_type.to_string(),
                origin,
                reason,
            });
        }

        let id = self.ids.allocate();
        let mut furniture = prototype.instantiate(id);
        furniture.place_at(origin);

        for coord in footprint.coords() {
            let tile = target.grid.tile_mut(coord);
            debug_assert!(tile.is_some(), "validated footprint tile {coord} missing");
            if let Some(tile) = tile {
                tile.set_furniture(Some(id));
            }
        }

        if prototype.can_enclose_rooms {
            self.pending.rooms = true;
        }
        if (prototype.movement_cost - 1.0).abs() > f32::EPSILON {
            self.pending.tile_graph = true;
        }

        let linkable = furniture.can_link_to_neighbour();
        target.store.insert(id, furniture);

        if linkable {
            notify_linked_neighbours(
                target.grid,
                target.store,
                target.events,
                id,
                origin,
                object_type,
            );
        }

        info!(
            furniture = %id,
            object_type,
            x = origin.x,
            y = origin.y,
            "furniture_placed"
        );
        if let Some(placed) = target.store.get(&id) {
            target.events.publish_furniture_created(placed);
        }
        Ok(id)
    }

    /// Destroys the instance and hands it back; the id is never reused.
    pub(crate) fn remove(
        &mut self,
        target: PlacementTarget<'_>,
        id: FurnitureId,
    ) -> Result<Furniture, RemovalError> {
        let Some(furniture) = target.store.remove(&id) else {
            debug!(furniture = %id, "removal_not_tracked");
            return Err(RemovalError::NotTracked { id });
        };

        if let Some(footprint) = furniture.footprint() {
            for coord in footprint.coords() {
                if let Some(tile) = target.grid.tile_mut(coord) {
                    if tile.furniture() == Some(id) {
                        tile.set_furniture(None);
                    }
                }
            }
        }

        if furniture.can_enclose_rooms() {
            self.pending.rooms = true;
        }

        info!(
            furniture = %id,
            object_type = %furniture.object_type(),
            "furniture_removed"
        );
        target.events.publish_furniture_removed(&furniture);

        if furniture.can_link_to_neighbour() {
            if let Some(origin) = furniture.tile() {
                notify_linked_neighbours(
                    target.grid,
                    target.store,
                    target.events,
                    id,
                    origin,
                    furniture.object_type(),
                );
            }
        }
        Ok(furniture)
    }

    pub(crate) fn take_pending(&mut self) -> PendingRecalculations {
        std::mem::take(&mut self.pending)
    }
}

fn notify_linked_neighbours(
    grid: &TileGrid,
    store: &FurnitureStore,
    events: &mut WorldEvents,
    own: FurnitureId,
    origin: TileCoord,
    object_type: &str,
) {
    for (_, neighbour_id) in linked_neighbours(grid, store, own, origin, object_type) {
        if let Some(neighbour) = store.get(&neighbour_id) {
            events.publish_furniture_changed(neighbour);
        }
    }
}
