//! Path following with stuck and timeout recovery.
//!
//! Entering `Idle` through [`enter_idle`] is the one place that clears paths,
//! pending requests and recovery counters, whatever state failed.

use bevy::prelude::*;

use super::{AgentState, MoveIntent, Movement};
use crate::SimSet;
use crate::combat::Aerial;
use crate::config::SimConfig;
use crate::world::pathfinding::{PathService, PathTicket};
use crate::world::{GridCell, Position, Terrain, WorldQuery, approach_cell};

// === Components ===

/// Active path plus the counters used to detect stuck and runaway moves.
#[derive(Component, Debug, Clone, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct PathFollower {
    /// World-space waypoints, excluding the start cell.
    pub waypoints: Vec<Vec2>,
    /// Index of the next waypoint to steer toward.
    pub cursor: usize,
    /// Final destination of the current move.
    pub goal: Option<Vec2>,
    /// Request awaiting a planner answer.
    pub pending: Option<PathTicket>,
    /// Position the stuck clock measures displacement from.
    pub stuck_anchor: Vec2,
    pub stuck_secs: f32,
    /// Re-path attempts spent on the current move.
    pub retries: u32,
    /// Time spent in the current move.
    pub moving_secs: f32,
    /// Arrivals that still left the agent out of its task target's reach.
    pub short_arrivals: u32,
}

impl PathFollower {
    /// A path is in progress or on its way.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.pending.is_some() || self.cursor < self.waypoints.len()
    }

    #[must_use]
    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.waypoints.get(self.cursor).copied()
    }

    pub const fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Nothing pending and every waypoint consumed.
    #[must_use]
    pub fn has_arrived(&self) -> bool {
        !self.is_active()
    }

    fn drop_path(&mut self, paths: &mut PathService) {
        if let Some(ticket) = self.pending.take() {
            paths.cancel(ticket);
        }
        self.waypoints.clear();
        self.cursor = 0;
    }

    /// Clears the path, the goal and every recovery counter.
    pub fn reset(&mut self, paths: &mut PathService) {
        self.finish(paths);
        self.short_arrivals = 0;
    }

    /// Ends the current move. Short arrivals outlive it.
    fn finish(&mut self, paths: &mut PathService) {
        self.drop_path(paths);
        self.goal = None;
        self.stuck_anchor = Vec2::ZERO;
        self.stuck_secs = 0.0;
        self.retries = 0;
        self.moving_secs = 0.0;
    }

    /// Starts a move toward `goal`. Re-issuing the current goal keeps the
    /// timeout and retry counters. Returns false when no approach exists.
    fn head_to(
        &mut self,
        agent: Entity,
        from: Vec2,
        goal: Vec2,
        aerial: bool,
        nav: &mut Nav,
    ) -> bool {
        if self.goal != Some(goal) {
            self.reset(nav.paths);
            self.goal = Some(goal);
        }
        self.request(agent, from, aerial, nav)
    }

    /// Points the current move at a new goal, keeping every counter.
    fn retarget(
        &mut self,
        agent: Entity,
        from: Vec2,
        goal: Vec2,
        aerial: bool,
        nav: &mut Nav,
    ) -> bool {
        self.goal = Some(goal);
        self.request(agent, from, aerial, nav)
    }

    /// Asks for a new path to the current goal from `from`, keeping the counters.
    fn request(&mut self, agent: Entity, from: Vec2, aerial: bool, nav: &mut Nav) -> bool {
        self.drop_path(nav.paths);
        self.stuck_anchor = from;
        let Some(goal) = self.goal else {
            return false;
        };
        if aerial {
            self.waypoints.push(goal);
            return true;
        }
        let start = nav.terrain.world_to_grid(from);
        let Some(target) = approach_cell(nav.terrain, nav.terrain.world_to_grid(goal), start) else {
            return false;
        };
        self.pending = Some(nav.paths.request(agent, start, target, nav.terrain));
        true
    }

    /// Installs a delivered path of grid cells (start cell first).
    pub fn accept(&mut self, cells: &[GridCell], world: &dyn WorldQuery) {
        self.pending = None;
        self.cursor = 0;
        self.waypoints = cells
            .iter()
            .skip(1)
            .map(|&cell| world.grid_to_world_center(cell))
            .collect();
        let Some(goal) = self.goal else {
            return;
        };
        // Land exactly on the goal when the path ends in its cell.
        if cells.last() == Some(&world.world_to_grid(goal)) {
            match self.waypoints.last_mut() {
                Some(last) => *last = goal,
                None => self.waypoints.push(goal),
            }
        }
    }
}

// === Transitions ===

/// Borrowed world access for issuing moves.
pub struct Nav<'a> {
    pub terrain: &'a dyn WorldQuery,
    pub paths: &'a mut PathService,
}

impl<'a> Nav<'a> {
    pub fn new(terrain: &'a Terrain, paths: &'a mut PathService) -> Self {
        Self {
            terrain: terrain.query(),
            paths,
        }
    }
}

/// The single reset point: clears path, request, counters and (by construction) task fields.
pub fn enter_idle(state: &mut AgentState, follower: &mut PathFollower, paths: &mut PathService) {
    *state = AgentState::Idle;
    follower.reset(paths);
}

/// One agent's movement-relevant parts, borrowed from a query item.
pub struct Mover<'s> {
    pub entity: Entity,
    pub position: Vec2,
    pub aerial: bool,
    pub state: &'s mut AgentState,
    pub follower: &'s mut PathFollower,
}

impl Mover<'_> {
    pub fn idle(&mut self, nav: &mut Nav) {
        enter_idle(self.state, self.follower, nav.paths);
    }

    /// Enters `Moving` toward `goal`. An unreachable goal drops straight to `Idle`.
    pub fn move_to(&mut self, nav: &mut Nav, goal: Vec2, intent: Option<MoveIntent>) -> bool {
        *self.state = AgentState::Moving { intent };
        if self
            .follower
            .head_to(self.entity, self.position, goal, self.aerial, nav)
        {
            return true;
        }
        debug!("Agent {}: no approach to {goal}, idling", self.entity);
        self.idle(nav);
        false
    }

    /// Follows toward `goal` without changing the behavioral state.
    /// The move clock keeps running across chase legs.
    pub fn chase(&mut self, nav: &mut Nav, goal: Vec2) -> bool {
        if self
            .follower
            .retarget(self.entity, self.position, goal, self.aerial, nav)
        {
            return true;
        }
        debug!("Agent {}: cannot chase to {goal}, idling", self.entity);
        self.idle(nav);
        false
    }

    /// Heads back toward a task target the last move stopped short of.
    /// More than `max_attempts` short arrivals in a row idle the agent.
    pub fn approach(
        &mut self,
        nav: &mut Nav,
        goal: Vec2,
        intent: MoveIntent,
        max_attempts: u32,
    ) -> bool {
        let attempts = self.follower.short_arrivals + 1;
        if attempts > max_attempts {
            debug!("Agent {}: {goal} still out of reach, idling", self.entity);
            self.idle(nav);
            return false;
        }
        if !self.move_to(nav, goal, Some(intent)) {
            return false;
        }
        self.follower.short_arrivals = attempts;
        true
    }
}

/// Hands a finished move over to the state its intent names.
pub fn arrive(state: &mut AgentState, follower: &mut PathFollower, paths: &mut PathService) {
    let AgentState::Moving { intent } = *state else {
        return;
    };
    let next = match intent {
        None | Some(MoveIntent::AttackMove) => AgentState::Idle,
        Some(MoveIntent::Gather { node, kind }) => AgentState::Gathering {
            node,
            kind,
            elapsed: 0.0,
        },
        Some(MoveIntent::Return { base, resume, kind }) => {
            AgentState::Returning { base, resume, kind }
        }
        Some(MoveIntent::Construct { site }) => AgentState::Constructing { site },
    };
    follower.finish(paths);
    *state = next;
}

// === Systems ===

/// Hands delivered paths to the agents that asked for them.
/// An empty answer means the goal is unreachable: the command is dropped.
/// Runs in `SimSet::Paths`.
fn deliver_paths(
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut agents: Query<(&mut AgentState, &mut PathFollower)>,
) {
    for (owner, result) in paths.collect() {
        let Ok((mut state, mut follower)) = agents.get_mut(owner) else {
            continue;
        };
        if follower.pending != Some(result.ticket) {
            continue;
        }
        match result.path {
            Some(cells) if !cells.is_empty() => follower.accept(&cells, terrain.query()),
            _ => {
                debug!("Agent {owner}: unreachable goal, idling");
                enter_idle(&mut state, &mut follower, &mut paths);
            }
        }
    }
}

/// Steps agents along their waypoints, detects stuck and runaway moves,
/// and completes arrivals.
/// Runs in `SimSet::Movement`.
fn follow_paths(
    time: Res<Time>,
    config: Res<SimConfig>,
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut agents: Query<(
        Entity,
        &mut Position,
        &Movement,
        &mut AgentState,
        &mut PathFollower,
        Has<Aerial>,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut position, movement, mut state, mut follower, aerial) in &mut agents {
        let moving = matches!(*state, AgentState::Moving { .. });
        let chasing = matches!(*state, AgentState::Attacking { .. }) && follower.is_active();
        if !moving && !chasing {
            continue;
        }

        follower.moving_secs += dt;
        if follower.moving_secs > config.move_timeout_secs {
            debug!("Agent {entity}: move timed out, idling");
            enter_idle(&mut state, &mut follower, &mut paths);
            continue;
        }

        if let Some(waypoint) = follower.current_waypoint() {
            let next = step_toward(position.0, waypoint, movement.speed * dt);
            if aerial || !is_blocked(terrain.query(), position.0, next) {
                position.0 = next;
                if next.distance(waypoint) <= config.waypoint_radius {
                    follower.advance();
                }
            }

            if position.distance(follower.stuck_anchor) >= config.stuck_displacement {
                follower.stuck_anchor = position.0;
                follower.stuck_secs = 0.0;
            } else {
                follower.stuck_secs += dt;
            }

            if follower.stuck_secs >= config.stuck_secs {
                follower.stuck_secs = 0.0;
                follower.retries += 1;
                if follower.retries > config.max_stuck_retries {
                    debug!(
                        "Agent {entity}: stuck after {} retries, idling",
                        config.max_stuck_retries
                    );
                    enter_idle(&mut state, &mut follower, &mut paths);
                    continue;
                }
                debug!("Agent {entity}: stuck, re-pathing (attempt {})", follower.retries);
                let mut nav = Nav::new(&terrain, &mut paths);
                if !follower.request(entity, position.0, aerial, &mut nav) {
                    enter_idle(&mut state, &mut follower, &mut paths);
                    continue;
                }
            }
        }

        if moving && follower.has_arrived() {
            arrive(&mut state, &mut follower, &mut paths);
        }
    }
}

fn step_toward(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let offset = to - from;
    let distance = offset.length();
    if distance <= max_step || distance < f32::EPSILON {
        to
    } else {
        from + offset / distance * max_step
    }
}

/// A ground agent cannot step into a different cell that is not walkable.
fn is_blocked(world: &dyn WorldQuery, from: Vec2, to: Vec2) -> bool {
    let from_cell = world.world_to_grid(from);
    let to_cell = world.world_to_grid(to);
    from_cell != to_cell && !world.is_walkable(to_cell)
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<PathFollower>();

    app.add_systems(Update, deliver_paths.in_set(SimSet::Paths));
    app.add_systems(Update, follow_paths.in_set(SimSet::Movement));
}
