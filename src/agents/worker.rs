//! Worker task cycle: gather, return, deposit, construct.

use bevy::prelude::*;

use super::movement::{Mover, Nav, PathFollower};
use super::{Agent, AgentState, MoveIntent};
use crate::combat::{Aerial, Health};
use crate::config::SimConfig;
use crate::economy::{Ledgers, ResourceKind, Stockpile};
use crate::structures::Storage;
use crate::structures::construction::Construction;
use crate::world::nodes::{ResourceNode, find_nearest_node};
use crate::world::pathfinding::PathService;
use crate::world::{BodyRadius, Position, Terrain, surface_distance};
use crate::{SimSet, Team};

/// Share of a structure's maximum health restored over a full build.
const BUILD_HEALTH_SHARE: f32 = 0.9;

// === Inventory ===

/// Resources a worker is carrying, bounded by its capacity.
#[derive(Component, Debug, Clone, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Inventory {
    held: Stockpile,
    capacity: u32,
}

impl Inventory {
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        Self {
            held: Stockpile::EMPTY,
            capacity,
        }
    }

    /// Stores up to `amount`, never past capacity. Returns what was accepted.
    pub fn add(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let accepted = amount.min(self.room());
        self.held.add(kind, accepted);
        accepted
    }

    #[must_use]
    pub const fn held(&self) -> &Stockpile {
        &self.held
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.held.total()
    }

    #[must_use]
    pub fn room(&self) -> u32 {
        self.capacity.saturating_sub(self.total())
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.room() == 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn take_all(&mut self) -> Stockpile {
        self.held.take_all()
    }
}

/// Empties the inventory into the faction ledger. Returns what was moved.
pub fn deposit(inventory: &mut Inventory, ledgers: &mut Ledgers, team: Team) -> Stockpile {
    let carried = inventory.take_all();
    ledgers.deposit(team, &carried);
    carried
}

// === Shared helpers ===

/// Complete structures that accept deposits.
pub type StorageQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Team,
        &'static Position,
        &'static BodyRadius,
    ),
    (With<Storage>, Without<Construction>),
>;

fn nearest_storage(storage: &StorageQuery, team: Team, from: Vec2) -> Option<(Entity, Vec2)> {
    storage
        .iter()
        .filter(|&(_, &owner, _, _)| owner == team)
        .map(|(entity, _, position, _)| (entity, position.0))
        .min_by(|(_, a), (_, b)| from.distance(*a).total_cmp(&from.distance(*b)))
}

/// Sends a worker to the nearest friendly storage. With none standing, the
/// worker turns to `Returning` with no base and deposits where it stands.
pub fn head_home(
    mover: &mut Mover,
    nav: &mut Nav,
    team: Team,
    storage: &StorageQuery,
    resume: Option<Entity>,
    kind: Option<ResourceKind>,
) {
    match nearest_storage(storage, team, mover.position) {
        Some((base, position)) => {
            let intent = MoveIntent::Return {
                base: Some(base),
                resume,
                kind,
            };
            mover.move_to(nav, position, Some(intent));
        }
        None => {
            mover.idle(nav);
            *mover.state = AgentState::Returning {
                base: None,
                resume,
                kind,
            };
        }
    }
}

/// Walks to the nearest live node of `kind`. Returns false when none is in reach.
fn seek_node(
    mover: &mut Mover,
    nav: &mut Nav,
    nodes: &[(Entity, &ResourceNode, &Position)],
    config: &SimConfig,
    kind: ResourceKind,
) -> bool {
    let found = find_nearest_node(
        nodes.iter().copied(),
        mover.position,
        config.node_search_radius,
        |_, node| node.kind == kind,
    );
    let Some(&(node, _, position)) =
        found.and_then(|found| nodes.iter().find(|(entity, ..)| *entity == found))
    else {
        return false;
    };
    debug!("Agent {}: re-targeting {kind:?} node {node}", mover.entity);
    mover.move_to(nav, position.0, Some(MoveIntent::Gather { node, kind }))
}

// === Systems ===

/// Withdraws from the node on the gather timer and decides what comes next.
/// Runs in `SimSet::Tasks`.
fn gather_resources(
    time: Res<Time>,
    config: Res<SimConfig>,
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut workers: Query<
        (
            Entity,
            &Position,
            &Team,
            &mut AgentState,
            &mut PathFollower,
            &mut Inventory,
            Has<Aerial>,
        ),
        With<Agent>,
    >,
    mut nodes: Query<(Entity, &mut ResourceNode, &Position)>,
    storage: StorageQuery,
) {
    let dt = time.delta_secs();
    for (entity, position, &team, mut state, mut follower, mut inventory, aerial) in &mut workers {
        let AgentState::Gathering {
            node,
            kind,
            elapsed,
        } = *state
        else {
            continue;
        };
        let mut nav = Nav::new(&terrain, &mut paths);
        let mut mover = Mover {
            entity,
            position: position.0,
            aerial,
            state: &mut state,
            follower: &mut follower,
        };

        let live = nodes
            .get(node)
            .is_ok_and(|(_, resource, _)| !resource.is_depleted());
        if !live {
            debug!("Agent {entity}: node {node} is gone");
            let candidates: Vec<_> = nodes.iter().collect();
            if !seek_node(&mut mover, &mut nav, &candidates, &config, kind) {
                finish_harvest(&mut mover, &mut nav, team, &storage, &inventory, kind);
            }
            continue;
        }
        let Ok((_, mut resource, node_position)) = nodes.get_mut(node) else {
            continue;
        };
        let node_position = node_position.0;

        let reach = if kind.is_liquid() {
            config.liquid_gather_radius
        } else {
            config.gather_radius
        };
        if mover.position.distance(node_position) > reach {
            let intent = MoveIntent::Gather { node, kind };
            if !mover.approach(&mut nav, node_position, intent, config.max_stuck_retries) {
                finish_harvest(&mut mover, &mut nav, team, &storage, &inventory, kind);
            }
            continue;
        }

        let elapsed = elapsed + dt;
        if elapsed < config.gather_secs {
            *mover.state = AgentState::Gathering {
                node,
                kind,
                elapsed,
            };
            continue;
        }

        let wanted = config.gather_amount.min(inventory.room());
        let taken = resource.withdraw(wanted);
        inventory.add(kind, taken);
        let depleted = resource.is_depleted();

        if inventory.is_full() {
            head_home(&mut mover, &mut nav, team, &storage, Some(node), Some(kind));
        } else if depleted {
            let candidates: Vec<_> = nodes.iter().collect();
            if !seek_node(&mut mover, &mut nav, &candidates, &config, kind) {
                finish_harvest(&mut mover, &mut nav, team, &storage, &inventory, kind);
            }
        } else {
            *mover.state = AgentState::Gathering {
                node,
                kind,
                elapsed: 0.0,
            };
        }
    }
}

/// No node left to work: bank the partial load or stand down.
fn finish_harvest(
    mover: &mut Mover,
    nav: &mut Nav,
    team: Team,
    storage: &StorageQuery,
    inventory: &Inventory,
    kind: ResourceKind,
) {
    if inventory.is_empty() {
        mover.idle(nav);
    } else {
        head_home(mover, nav, team, storage, None, Some(kind));
    }
}

/// Deposits at the base, then heads back out.
/// A base that is gone, even mid-walk, is treated as an always-reachable sink.
/// Runs in `SimSet::Tasks`.
fn return_resources(
    config: Res<SimConfig>,
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut ledgers: ResMut<Ledgers>,
    mut workers: Query<
        (
            Entity,
            &Position,
            &BodyRadius,
            &Team,
            &mut AgentState,
            &mut PathFollower,
            &mut Inventory,
            Has<Aerial>,
        ),
        With<Agent>,
    >,
    nodes: Query<(Entity, &ResourceNode, &Position)>,
    storage: StorageQuery,
) {
    for (entity, position, radius, &team, mut state, mut follower, mut inventory, aerial) in
        &mut workers
    {
        let (base, resume, kind) = match *state {
            AgentState::Returning { base, resume, kind } => (base, resume, kind),
            AgentState::Moving {
                intent:
                    Some(MoveIntent::Return {
                        base: Some(base),
                        resume,
                        kind,
                    }),
            } if storage.get(base).is_err() => {
                debug!("Agent {entity}: base {base} lost on the way");
                (None, resume, kind)
            }
            _ => continue,
        };
        let mut nav = Nav::new(&terrain, &mut paths);
        let mut mover = Mover {
            entity,
            position: position.0,
            aerial,
            state: &mut state,
            follower: &mut follower,
        };

        let standing = base.and_then(|base| storage.get(base).ok());
        if let Some((base, &owner, base_position, base_radius)) = standing {
            let gap = surface_distance(position.0, radius.0, base_position.0, base_radius.0);
            if owner == team && gap > config.deposit_radius {
                let intent = MoveIntent::Return {
                    base: Some(base),
                    resume,
                    kind,
                };
                mover.approach(&mut nav, base_position.0, intent, config.max_stuck_retries);
                continue;
            }
        }

        let carried = deposit(&mut inventory, &mut ledgers, team);
        debug!("Agent {entity}: deposited {carried:?} for {team:?}");

        let resumed = resume
            .and_then(|node| nodes.get(node).ok())
            .filter(|(_, resource, _)| !resource.is_depleted());
        if let Some((node, resource, node_position)) = resumed {
            let intent = MoveIntent::Gather {
                node,
                kind: resource.kind,
            };
            mover.move_to(&mut nav, node_position.0, Some(intent));
        } else {
            let candidates: Vec<_> = nodes.iter().collect();
            let sought = kind
                .is_some_and(|kind| seek_node(&mut mover, &mut nav, &candidates, &config, kind));
            if !sought {
                mover.idle(&mut nav);
            }
        }
    }
}

/// Adds build progress to a friendly site in reach; health rises with it.
/// Runs in `SimSet::Tasks`.
fn construct_sites(
    time: Res<Time>,
    config: Res<SimConfig>,
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut workers: Query<
        (
            Entity,
            &Position,
            &BodyRadius,
            &Team,
            &mut AgentState,
            &mut PathFollower,
            Has<Aerial>,
        ),
        (With<Agent>, With<Inventory>),
    >,
    mut sites: Query<(&Team, &Position, &BodyRadius, &mut Construction, &mut Health)>,
) {
    let dt = time.delta_secs();
    for (entity, position, radius, &team, mut state, mut follower, aerial) in &mut workers {
        let AgentState::Constructing { site } = *state else {
            continue;
        };
        let mut nav = Nav::new(&terrain, &mut paths);
        let mut mover = Mover {
            entity,
            position: position.0,
            aerial,
            state: &mut state,
            follower: &mut follower,
        };

        let Ok((&owner, site_position, site_radius, mut construction, mut health)) =
            sites.get_mut(site)
        else {
            debug!("Agent {entity}: site {site} is gone");
            mover.idle(&mut nav);
            continue;
        };
        if owner != team || construction.is_complete() {
            mover.idle(&mut nav);
            continue;
        }

        let gap = surface_distance(position.0, radius.0, site_position.0, site_radius.0);
        if gap > config.construct_radius {
            let intent = MoveIntent::Construct { site };
            mover.approach(&mut nav, site_position.0, intent, config.max_stuck_retries);
            continue;
        }

        let before = construction.progress();
        construction.add_progress(config.construct_rate * dt);
        let gained = construction.progress() - before;
        health.current = BUILD_HEALTH_SHARE
            .mul_add(health.max * gained / 100.0, health.current)
            .min(health.max);

        if construction.is_complete() {
            mover.idle(&mut nav);
        }
    }
}

/// Node worker lists mirror who is in `Gathering` right now.
fn sync_node_gatherers(
    workers: Query<(Entity, &AgentState), With<Inventory>>,
    mut nodes: Query<&mut ResourceNode>,
) {
    for mut node in &mut nodes {
        if !node.gatherers.is_empty() {
            node.gatherers.clear();
        }
    }
    for (entity, state) in &workers {
        if let AgentState::Gathering { node, .. } = *state {
            if let Ok(mut resource) = nodes.get_mut(node) {
                resource.gatherers.push(entity);
            }
        }
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Inventory>();

    app.add_systems(
        Update,
        (
            gather_resources,
            return_resources,
            construct_sites,
            sync_node_gatherers,
        )
            .chain()
            .in_set(SimSet::Tasks),
    );
}
