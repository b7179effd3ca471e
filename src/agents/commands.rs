//! Commands issued to agents by the player or the opponent.
//!
//! A new command is the only form of cancellation: the current task is unwound
//! (carried resources are banked, node membership lapses with the state) and
//! the agent enters whatever state the command calls for.

use bevy::prelude::*;

use super::movement::{Mover, Nav, PathFollower};
use super::worker::{Inventory, StorageQuery, head_home};
use super::{Agent, AgentState, MoveIntent};
use crate::combat::{Aerial, CombatStats, TargetQuery, is_valid_target};
use crate::economy::Ledgers;
use crate::structures::construction::Construction;
use crate::world::nodes::ResourceNode;
use crate::world::pathfinding::PathService;
use crate::world::{Position, Terrain};
use crate::{SimSet, Team};

// === Messages ===

/// What an agent is told to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Order {
    /// Walk to a point, then idle.
    MoveTo(Vec2),
    /// Harvest a resource node (workers).
    Gather(Entity),
    /// Help build a construction site (workers).
    Construct(Entity),
    /// Attack a specific enemy (combat agents).
    Engage(Entity),
    /// Walk to a point, engaging enemies met on the way.
    AttackMove(Vec2),
    /// Bring carried resources to the nearest storage (workers).
    ReturnToBase,
    /// Drop everything and idle.
    Stop,
}

impl Order {
    /// Orders that end the economic task and bank what is carried.
    const fn abandons_harvest(self) -> bool {
        !matches!(self, Self::Gather(_) | Self::ReturnToBase)
    }
}

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct AgentCommand {
    pub agent: Entity,
    pub order: Order,
}

impl AgentCommand {
    #[must_use]
    pub const fn new(agent: Entity, order: Order) -> Self {
        Self { agent, order }
    }
}

// === Systems ===

/// Applies queued commands in the order they were written.
/// Runs in `SimSet::Commands`.
fn apply_agent_commands(
    mut commands_in: MessageReader<AgentCommand>,
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut ledgers: ResMut<Ledgers>,
    mut agents: Query<
        (
            &Position,
            &Team,
            &mut AgentState,
            &mut PathFollower,
            Option<&mut Inventory>,
            Option<&CombatStats>,
            Has<Aerial>,
        ),
        With<Agent>,
    >,
    nodes: Query<(&ResourceNode, &Position)>,
    storage: StorageQuery,
    sites: Query<(&Team, &Position, &Construction)>,
    targets: TargetQuery,
) {
    for &AgentCommand { agent, order } in commands_in.read() {
        let Ok((position, &team, mut state, mut follower, inventory, combat, aerial)) =
            agents.get_mut(agent)
        else {
            debug!("Command {order:?} for missing agent {agent} dropped");
            continue;
        };
        let is_worker = inventory.is_some();

        if order.abandons_harvest() {
            if let Some(mut inventory) = inventory.filter(|inventory| !inventory.is_empty()) {
                let carried = inventory.take_all();
                debug!("Agent {agent}: banking {carried:?} on cancel");
                ledgers.deposit(team, &carried);
            }
        }

        let mut nav = Nav::new(&terrain, &mut paths);
        let mut mover = Mover {
            entity: agent,
            position: position.0,
            aerial,
            state: &mut state,
            follower: &mut follower,
        };

        match order {
            Order::MoveTo(goal) => {
                mover.move_to(&mut nav, goal, None);
            }
            Order::AttackMove(goal) => {
                let intent = combat.map(|_| MoveIntent::AttackMove);
                mover.move_to(&mut nav, goal, intent);
            }
            Order::Stop => mover.idle(&mut nav),
            Order::Gather(node) => {
                if !is_worker {
                    debug!("Agent {agent} cannot gather");
                    continue;
                }
                let Ok((resource, node_pos)) = nodes.get(node) else {
                    debug!("Agent {agent}: gather target {node} is gone");
                    continue;
                };
                if resource.is_depleted() {
                    continue;
                }
                let intent = MoveIntent::Gather {
                    node,
                    kind: resource.kind,
                };
                mover.move_to(&mut nav, node_pos.0, Some(intent));
            }
            Order::Construct(site) => {
                if !is_worker {
                    debug!("Agent {agent} cannot build");
                    continue;
                }
                match sites.get(site) {
                    Ok((&site_team, site_pos, construction))
                        if site_team == team && !construction.is_complete() =>
                    {
                        mover.move_to(&mut nav, site_pos.0, Some(MoveIntent::Construct { site }));
                    }
                    _ => debug!("Agent {agent}: {site} is not an open construction site"),
                }
            }
            Order::Engage(target) => {
                let Some(combat) = combat else {
                    debug!("Agent {agent} has no weapon");
                    continue;
                };
                if !is_valid_target(&targets, target, team, combat) {
                    debug!("Agent {agent}: {target} is not a valid target");
                    continue;
                }
                mover.idle(&mut nav);
                *mover.state = AgentState::Attacking {
                    target,
                    ordered: true,
                };
            }
            Order::ReturnToBase => {
                if !is_worker {
                    continue;
                }
                let (resume, kind) = match *mover.state {
                    AgentState::Gathering { node, kind, .. }
                    | AgentState::Moving {
                        intent: Some(MoveIntent::Gather { node, kind }),
                    } => (Some(node), Some(kind)),
                    AgentState::Returning { resume, kind, .. }
                    | AgentState::Moving {
                        intent: Some(MoveIntent::Return { resume, kind, .. }),
                    } => (resume, kind),
                    _ => (None, None),
                };
                head_home(&mut mover, &mut nav, team, &storage, resume, kind);
            }
        }
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.add_message::<AgentCommand>();

    app.add_systems(Update, apply_agent_commands.in_set(SimSet::Commands));
}
