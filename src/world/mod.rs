//! World contract: grid cells, terrain, walkability, footprints, positions.

#![allow(clippy::cast_precision_loss)] // Grid coordinates are small; i32->f32 is exact.
#![allow(clippy::cast_possible_truncation)] // floor() before casting back to a cell index.

pub mod nodes;
pub mod pathfinding;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// === Constants ===

/// Size of one grid cell in world units.
pub const CELL_SIZE: f32 = 32.0;

/// Default map size in cells.
pub const DEFAULT_MAP_CELLS: i32 = 64;

/// Farthest ring searched for a walkable cell next to an unwalkable goal.
const APPROACH_RING_LIMIT: i32 = 6;

// === Grid ===

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (king-move) distance.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        if dx > dy { dx } else { dy }
    }

    /// Squared Euclidean distance in cells.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Cells at exactly Chebyshev distance `radius`, clockwise from the top-left corner.
    /// Radius 0 yields the cell itself.
    #[must_use]
    pub fn ring(self, radius: i32) -> Vec<Self> {
        if radius <= 0 {
            return vec![self];
        }
        let mut cells = Vec::with_capacity((radius * 8) as usize);
        for x in -radius..=radius {
            cells.push(self.offset(x, -radius));
        }
        for y in (-radius + 1)..=radius {
            cells.push(self.offset(radius, y));
        }
        for x in (-radius..radius).rev() {
            cells.push(self.offset(x, radius));
        }
        for y in ((-radius + 1)..radius).rev() {
            cells.push(self.offset(-radius, y));
        }
        cells
    }
}

/// Terrain of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum TerrainType {
    #[default]
    Grass,
    Water,
    Rock,
}

impl TerrainType {
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self, Self::Grass)
    }
}

/// What the world reports about one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub terrain: TerrainType,
    pub occupied: bool,
}

// === World contract ===

/// Walkability, tile lookup, grid/world conversion and footprint occupancy.
pub trait WorldQuery: Send + Sync + 'static {
    fn is_walkable(&self, cell: GridCell) -> bool;

    /// `None` outside the map.
    fn tile(&self, cell: GridCell) -> Option<Tile>;

    fn world_to_grid(&self, pos: Vec2) -> GridCell;

    fn grid_to_world_center(&self, cell: GridCell) -> Vec2;

    /// Marks cells as blocked (or clear) by a structure footprint.
    fn set_occupied(&mut self, cells: &[GridCell], occupied: bool);
}

/// The world the simulation runs on.
#[derive(Resource, Deref, DerefMut)]
pub struct Terrain(pub Box<dyn WorldQuery>);

impl Terrain {
    pub fn new(world: impl WorldQuery) -> Self {
        Self(Box::new(world))
    }

    #[must_use]
    pub fn query(&self) -> &dyn WorldQuery {
        self.0.as_ref()
    }

    pub fn query_mut(&mut self) -> &mut dyn WorldQuery {
        self.0.as_mut()
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Self::new(TileGrid::new(DEFAULT_MAP_CELLS, DEFAULT_MAP_CELLS))
    }
}

/// Rectangular tile map with an occupancy layer.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: i32,
    height: i32,
    terrain: Vec<TerrainType>,
    occupied: Vec<bool>,
}

impl TileGrid {
    /// All-grass map of `width` x `height` cells.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            terrain: vec![TerrainType::Grass; len],
            occupied: vec![false; len],
        }
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        let inside = cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height;
        inside.then(|| (cell.y * self.width + cell.x) as usize)
    }

    pub fn set_terrain(&mut self, cell: GridCell, terrain: TerrainType) {
        if let Some(i) = self.index(cell) {
            self.terrain[i] = terrain;
        }
    }

    /// Builder form of [`TileGrid::set_terrain`] for a rectangle of cells.
    #[must_use]
    pub fn with_terrain(mut self, min: GridCell, max: GridCell, terrain: TerrainType) -> Self {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                self.set_terrain(GridCell::new(x, y), terrain);
            }
        }
        self
    }
}

impl WorldQuery for TileGrid {
    fn is_walkable(&self, cell: GridCell) -> bool {
        self.index(cell)
            .is_some_and(|i| self.terrain[i].is_passable() && !self.occupied[i])
    }

    fn tile(&self, cell: GridCell) -> Option<Tile> {
        self.index(cell).map(|i| Tile {
            terrain: self.terrain[i],
            occupied: self.occupied[i],
        })
    }

    fn world_to_grid(&self, pos: Vec2) -> GridCell {
        GridCell::new(
            (pos.x / CELL_SIZE).floor() as i32,
            (pos.y / CELL_SIZE).floor() as i32,
        )
    }

    fn grid_to_world_center(&self, cell: GridCell) -> Vec2 {
        Vec2::new(
            (cell.x as f32).mul_add(CELL_SIZE, CELL_SIZE / 2.0),
            (cell.y as f32).mul_add(CELL_SIZE, CELL_SIZE / 2.0),
        )
    }

    fn set_occupied(&mut self, cells: &[GridCell], occupied: bool) {
        for &cell in cells {
            if let Some(i) = self.index(cell) {
                self.occupied[i] = occupied;
            }
        }
    }
}

// === Footprints ===

/// Cells covered by a square footprint whose lower-left cell is `origin`.
#[must_use]
pub fn footprint_cells(origin: GridCell, size: i32) -> Vec<GridCell> {
    let mut cells = Vec::with_capacity((size.max(0) * size.max(0)) as usize);
    for y in 0..size {
        for x in 0..size {
            cells.push(origin.offset(x, y));
        }
    }
    cells
}

/// World-space center of a square footprint.
#[must_use]
pub fn footprint_center(world: &dyn WorldQuery, origin: GridCell, size: i32) -> Vec2 {
    let first = world.grid_to_world_center(origin);
    let last = world.grid_to_world_center(origin.offset(size - 1, size - 1));
    (first + last) / 2.0
}

/// The goal itself when walkable, else the nearest walkable cell around it (closest to `from`).
#[must_use]
pub fn approach_cell(world: &dyn WorldQuery, goal: GridCell, from: GridCell) -> Option<GridCell> {
    if world.is_walkable(goal) {
        return Some(goal);
    }
    (1..=APPROACH_RING_LIMIT).find_map(|radius| {
        goal.ring(radius)
            .into_iter()
            .filter(|&cell| world.is_walkable(cell))
            .min_by_key(|&cell| cell.distance_squared(from))
    })
}

// === Spatial components ===

/// Continuous world position of an agent, structure, node or projectile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Reflect, Deref, DerefMut)]
#[reflect(Component)]
pub struct Position(pub Vec2);

/// Collision radius used for surface-to-surface distances.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct BodyRadius(pub f32);

/// Gap between two circles; 0 when they overlap.
#[must_use]
pub fn surface_distance(pos1: Vec2, radius1: f32, pos2: Vec2, radius2: f32) -> f32 {
    (pos1.distance(pos2) - radius1 - radius2).max(0.0)
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Position>()
        .register_type::<BodyRadius>()
        .init_resource::<Terrain>();

    nodes::plugin(app);
    pathfinding::plugin(app);
}
