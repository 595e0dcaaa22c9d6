use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::furniture::FurnitureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn neighbour(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Orthogonal directions with `y` growing northwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Neighbour-link notification order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::North => 'N',
            Self::East => 'E',
            Self::South => 'S',
            Self::West => 'W',
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    #[default]
    Grass,
    Water,
    Floor,
}

impl TileType {
    pub fn is_buildable(self) -> bool {
        matches!(self, Self::Grass | Self::Floor)
    }

    /// Zero means the tile cannot be walked on.
    pub fn base_movement_cost(self) -> f32 {
        match self {
            Self::Grass | Self::Floor => 1.0,
            Self::Water => 0.0,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Grass => "grass",
            Self::Water => "water",
            Self::Floor => "floor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Enterability {
    Enterable,
    NotEnterable,
    /// Enterable once whatever occupies the tile has finished its work.
    Busy,
}

impl Enterability {
    pub fn code(self) -> i64 {
        match self {
            Self::Enterable => 0,
            Self::NotEnterable => 1,
            Self::Busy => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Enterable),
            1 => Some(Self::NotEnterable),
            2 => Some(Self::Busy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    coord: TileCoord,
    tile_type: TileType,
    furniture: Option<FurnitureId>,
}

impl Tile {
    fn new(coord: TileCoord, tile_type: TileType) -> Self {
        Self {
            coord,
            tile_type,
            furniture: None,
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn x(&self) -> i32 {
        self.coord.x
    }

    pub fn y(&self) -> i32 {
        self.coord.y
    }

    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    /// Occupant back-reference. The furniture's footprint is authoritative.
    pub fn furniture(&self) -> Option<FurnitureId> {
        self.furniture
    }

    pub fn is_occupied(&self) -> bool {
        self.furniture.is_some()
    }

    pub fn base_movement_cost(&self) -> f32 {
        self.tile_type.base_movement_cost()
    }

    pub(crate) fn set_furniture(&mut self, furniture: Option<FurnitureId>) {
        self.furniture = furniture;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileGridError {
    #[error("tile grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("tile grid dimensions {width}x{height} exceed the addressable range")]
    TooLarge { width: u32, height: u32 },
}

/// Fixed-size grid of tiles stored row-major.
/// - Tile (x,y) is valid for `0 <= x < width` and `0 <= y < height`.
/// - The grid is never resized after construction.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_type: TileType) -> Result<Self, TileGridError> {
        if width == 0 || height == 0 {
            return Err(TileGridError::EmptyGrid { width, height });
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(TileGridError::TooLarge { width, height });
        }

        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                tiles.push(Tile::new(TileCoord::new(x, y), tile_type));
            }
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.index_of(coord).is_some()
    }

    fn index_of(&self, coord: TileCoord) -> Option<usize> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        let (x, y) = (coord.x as u32, coord.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tile(TileCoord::new(x, y))
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.index_of(coord).and_then(|index| self.tiles.get(index))
    }

    pub(crate) fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        let index = self.index_of(coord)?;
        self.tiles.get_mut(index)
    }

    pub fn neighbour(&self, coord: TileCoord, direction: Direction) -> Option<&Tile> {
        self.tile(coord.neighbour(direction))
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Returns `None` out of bounds, otherwise whether the type actually changed.
    pub(crate) fn set_tile_type(&mut self, coord: TileCoord, tile_type: TileType) -> Option<bool> {
        let tile = self.tile_mut(coord)?;
        if tile.tile_type == tile_type {
            return Some(false);
        }
        tile.tile_type = tile_type;
        Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_in_bounds_coordinate_maps_to_its_own_tile() {
        let grid = TileGrid::new(7, 4, TileType::Grass).expect("grid");
        for y in 0..4 {
            for x in 0..7 {
                let tile = grid.tile_at(x, y).expect("tile");
                assert_eq!(tile.coord(), TileCoord::new(x, y));
            }
        }
        assert_eq!(grid.tiles().count(), 28);
    }

    #[test]
    fn bounds_are_exclusive_on_both_axes() {
        let grid = TileGrid::new(5, 3, TileType::Grass).expect("grid");
        assert!(grid.tile_at(5, 0).is_none());
        assert!(grid.tile_at(0, 3).is_none());
        assert!(grid.tile_at(-1, 0).is_none());
        assert!(grid.tile_at(0, -1).is_none());
        assert!(grid.tile_at(i32::MAX, 0).is_none());
        assert!(grid.tile_at(i32::MIN, i32::MIN).is_none());
        assert!(grid.tile_at(4, 2).is_some());
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        let err = TileGrid::new(0, 10, TileType::Grass).expect_err("empty");
        assert_eq!(
            err,
            TileGridError::EmptyGrid {
                width: 0,
                height: 10
            }
        );
    }

    #[test]
    fn set_tile_type_reports_only_real_changes() {
        let mut grid = TileGrid::new(2, 2, TileType::Grass).expect("grid");
        let coord = TileCoord::new(1, 1);
        assert_eq!(grid.set_tile_type(coord, TileType::Grass), Some(false));
        assert_eq!(grid.set_tile_type(coord, TileType::Water), Some(true));
        assert_eq!(grid.tile(coord).expect("tile").tile_type(), TileType::Water);
        assert_eq!(grid.set_tile_type(TileCoord::new(2, 0), TileType::Water), None);
    }

    #[test]
    fn north_is_positive_y() {
        let grid = TileGrid::new(3, 3, TileType::Grass).expect("grid");
        let center = TileCoord::new(1, 1);
        assert_eq!(
            grid.neighbour(center, Direction::North).map(Tile::coord),
            Some(TileCoord::new(1, 2))
        );
        assert_eq!(
            grid.neighbour(center, Direction::West).map(Tile::coord),
            Some(TileCoord::new(0, 1))
        );
        assert!(grid
            .neighbour(TileCoord::new(0, 0), Direction::South)
            .is_none());
    }

    #[test]
    fn enterability_codes_round_trip_and_reject_unknown() {
        for value in [
            Enterability::Enterable,
            Enterability::NotEnterable,
            Enterability::Busy,
        ] {
            assert_eq!(Enterability::from_code(value.code()), Some(value));
        }
        assert_eq!(Enterability::from_code(7), None);
    }

    #[test]
    fn water_is_neither_buildable_nor_walkable() {
        assert!(!TileType::Water.is_buildable());
        assert_eq!(TileType::Water.base_movement_cost(), 0.0);
        assert!(TileType::Floor.is_buildable());
    }
}
