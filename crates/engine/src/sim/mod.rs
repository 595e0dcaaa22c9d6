mod events;
mod furniture;
mod hooks;
mod placement;
#[cfg(test)]
mod scenario_tests;
mod tile;
mod world;

pub use events::{Broadcast, EventKind, SubscriptionId, WorldEventCounts, WorldEvents};
pub use furniture::{
    Furniture, FurnitureId, FurniturePrototype, FurnitureStore, HookRunReport, ParamValue,
    TileOffset,
};
pub use hooks::{HookCommand, HookContext, HookError, NativeHookTable, ScriptHookRunner, WorldView};
pub use placement::{
    linked_neighbours, neighbour_links, validate_footprint, Footprint, InvalidPositionReason,
    NeighbourLinks, PendingRecalculations, PlacementError, RemovalError,
};
pub use tile::{Direction, Enterability, Tile, TileCoord, TileGrid, TileGridError, TileType};
pub use world::{TickReport, World, WorldConfig};
