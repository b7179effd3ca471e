//! Path planning contract plus a grid A* reference planner.
//!
//! Agents never wait on a path: they file a request, keep the [`PathTicket`],
//! and pick the result up on whatever later tick the planner delivers it.

use std::collections::{HashMap, VecDeque};

use bevy::prelude::*;
use pathfinding::prelude::astar;

use super::{GridCell, WorldQuery};

/// Cost of a straight step; diagonals cost `DIAGONAL_COST`.
const STRAIGHT_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Handle for one outstanding path request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct PathTicket(pub u64);

/// A delivered answer: the cells from start to end, or `None` when unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    pub ticket: PathTicket,
    pub path: Option<Vec<GridCell>>,
}

/// Asynchronous path finding between two grid cells.
pub trait PathPlanner: Send + Sync + 'static {
    /// Queues a request. The answer arrives through a later [`PathPlanner::poll`].
    fn request(&mut self, ticket: PathTicket, from: GridCell, to: GridCell, world: &dyn WorldQuery);

    /// Appends every result that is ready.
    fn poll(&mut self, out: &mut Vec<PathResult>);
}

// === Grid A* ===

/// Shortest 8-connected walkable path (no corner cutting). Includes `from` and `to`.
#[must_use]
pub fn find_grid_path(
    world: &dyn WorldQuery,
    from: GridCell,
    to: GridCell,
) -> Option<Vec<GridCell>> {
    if from == to {
        return Some(vec![from]);
    }
    if !world.is_walkable(to) {
        return None;
    }
    astar(
        &from,
        |&cell| successors(world, cell),
        |&cell| octile(cell, to),
        |&cell| cell == to,
    )
    .map(|(path, _cost)| path)
}

fn successors(world: &dyn WorldQuery, cell: GridCell) -> Vec<(GridCell, u32)> {
    NEIGHBORS
        .iter()
        .filter_map(|&(dx, dy)| {
            let next = cell.offset(dx, dy);
            if !world.is_walkable(next) {
                return None;
            }
            if dx != 0 && dy != 0 {
                // Both orthogonal neighbours must be open to step diagonally.
                if !world.is_walkable(cell.offset(dx, 0))
                    || !world.is_walkable(cell.offset(0, dy))
                {
                    return None;
                }
                return Some((next, DIAGONAL_COST));
            }
            Some((next, STRAIGHT_COST))
        })
        .collect()
}

const fn octile(a: GridCell, b: GridCell) -> u32 {
    let dx = (a.x - b.x).unsigned_abs();
    let dy = (a.y - b.y).unsigned_abs();
    let (low, high) = if dx < dy { (dx, dy) } else { (dy, dx) };
    STRAIGHT_COST * high + (DIAGONAL_COST - STRAIGHT_COST) * low
}

struct PendingPath {
    ticket: PathTicket,
    path: Option<Vec<GridCell>>,
    polls_left: u32,
}

/// Reference planner: solves with A* at request time and holds the answer
/// back for `latency` polls.
#[derive(Default)]
pub struct GridPathPlanner {
    latency: u32,
    pending: VecDeque<PendingPath>,
}

impl GridPathPlanner {
    /// `latency` 0 delivers on the first poll after the request.
    #[must_use]
    pub const fn new(latency: u32) -> Self {
        Self {
            latency,
            pending: VecDeque::new(),
        }
    }
}

impl PathPlanner for GridPathPlanner {
    fn request(
        &mut self,
        ticket: PathTicket,
        from: GridCell,
        to: GridCell,
        world: &dyn WorldQuery,
    ) {
        self.pending.push_back(PendingPath {
            ticket,
            path: find_grid_path(world, from, to),
            polls_left: self.latency,
        });
    }

    fn poll(&mut self, out: &mut Vec<PathResult>) {
        let mut waiting = VecDeque::with_capacity(self.pending.len());
        while let Some(mut pending) = self.pending.pop_front() {
            if pending.polls_left == 0 {
                out.push(PathResult {
                    ticket: pending.ticket,
                    path: pending.path,
                });
            } else {
                pending.polls_left -= 1;
                waiting.push_back(pending);
            }
        }
        self.pending = waiting;
    }
}

// === Service ===

/// Owns the planner and remembers which entity each ticket belongs to.
#[derive(Resource)]
pub struct PathService {
    planner: Box<dyn PathPlanner>,
    next_ticket: u64,
    owners: HashMap<PathTicket, Entity>,
}

impl Default for PathService {
    fn default() -> Self {
        Self::new(GridPathPlanner::new(0))
    }
}

impl PathService {
    pub fn new(planner: impl PathPlanner) -> Self {
        Self {
            planner: Box::new(planner),
            next_ticket: 0,
            owners: HashMap::new(),
        }
    }

    /// Files a request on behalf of `owner`.
    pub fn request(
        &mut self,
        owner: Entity,
        from: GridCell,
        to: GridCell,
        world: &dyn WorldQuery,
    ) -> PathTicket {
        let ticket = PathTicket(self.next_ticket);
        self.next_ticket += 1;
        self.owners.insert(ticket, owner);
        self.planner.request(ticket, from, to, world);
        ticket
    }

    /// Forgets a ticket; its result is dropped when it arrives.
    pub fn cancel(&mut self, ticket: PathTicket) {
        self.owners.remove(&ticket);
    }

    /// Number of requests still awaiting delivery to a live owner.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.owners.len()
    }

    /// Ready results paired with their owners. Cancelled tickets are skipped.
    pub fn collect(&mut self) -> Vec<(Entity, PathResult)> {
        let mut ready = Vec::new();
        self.planner.poll(&mut ready);
        ready
            .into_iter()
            .filter_map(|result| {
                self.owners
                    .remove(&result.ticket)
                    .map(|owner| (owner, result))
            })
            .collect()
    }
}

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<PathService>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{TerrainType, TileGrid};
    use pretty_assertions::assert_eq;

    fn cell(x: i32, y: i32) -> GridCell {
        GridCell::new(x, y)
    }

    #[test]
    fn straight_path_includes_both_ends() {
        let grid = TileGrid::new(8, 8);
        let path = find_grid_path(&grid, cell(0, 0), cell(3, 0)).unwrap();
        assert_eq!(path, vec![cell(0, 0), cell(1, 0), cell(2, 0), cell(3, 0)]);
    }

    #[test]
    fn path_to_self_is_single_cell() {
        let grid = TileGrid::new(4, 4);
        assert_eq!(find_grid_path(&grid, cell(1, 1), cell(1, 1)), Some(vec![cell(1, 1)]));
    }

    #[test]
    fn path_routes_around_wall() {
        // Wall at x=2 from y=0..=3, gap at y=4.
        let grid = TileGrid::new(6, 6).with_terrain(cell(2, 0), cell(2, 3), TerrainType::Rock);
        let path = find_grid_path(&grid, cell(0, 0), cell(4, 0)).unwrap();

        assert!(path.iter().all(|&c| grid.is_walkable(c)));
        assert!(path.contains(&cell(2, 4)));
        assert_eq!(path.first(), Some(&cell(0, 0)));
        assert_eq!(path.last(), Some(&cell(4, 0)));
    }

    #[test]
    fn diagonal_steps_do_not_cut_corners() {
        let grid = TileGrid::new(3, 3).with_terrain(cell(1, 0), cell(1, 0), TerrainType::Rock);
        let path = find_grid_path(&grid, cell(0, 0), cell(1, 1)).unwrap();
        // (0,0) -> (1,1) directly would squeeze past the rock at (1,0).
        assert_eq!(path, vec![cell(0, 0), cell(0, 1), cell(1, 1)]);
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let grid = TileGrid::new(5, 5).with_terrain(cell(0, 2), cell(4, 2), TerrainType::Water);
        assert_eq!(find_grid_path(&grid, cell(0, 0), cell(0, 4)), None);
    }

    #[test]
    fn unwalkable_goal_is_unreachable() {
        let grid = TileGrid::new(5, 5).with_terrain(cell(4, 4), cell(4, 4), TerrainType::Rock);
        assert_eq!(find_grid_path(&grid, cell(0, 0), cell(4, 4)), None);
    }

    #[test]
    fn latency_holds_results_back() {
        let grid = TileGrid::new(4, 4);
        let mut planner = GridPathPlanner::new(2);
        planner.request(PathTicket(7), cell(0, 0), cell(1, 0), &grid);

        let mut out = Vec::new();
        planner.poll(&mut out);
        planner.poll(&mut out);
        assert!(out.is_empty());

        planner.poll(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ticket, PathTicket(7));
    }

    #[test]
    fn cancelled_tickets_are_not_delivered() {
        let grid = TileGrid::new(4, 4);
        let mut service = PathService::default();
        let owner = Entity::PLACEHOLDER;
        let kept = service.request(owner, cell(0, 0), cell(2, 0), &grid);
        let dropped = service.request(owner, cell(0, 0), cell(3, 0), &grid);
        service.cancel(dropped);

        let ready = service.collect();

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].1.ticket, kept);
        assert_eq!(service.outstanding(), 0);
    }
}
