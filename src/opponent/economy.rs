//! Economic duties: builders first, then gatherers, and a steady worker supply.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use bevy::prelude::*;

use super::expansion::next_build;
use super::{Opponent, OpponentMode, StructureQuery};
use crate::Team;
use crate::agents::commands::{AgentCommand, Order};
use crate::agents::worker::Inventory;
use crate::agents::{Agent, AgentState, SpawnOrder, UnitKind};
use crate::combat::{Damageable, Health};
use crate::config::{OpponentConfig, SimConfig};
use crate::economy::{Ledgers, ResourceKind, Stockpile};
use crate::structures::construction::Construction;
use crate::structures::production::{TrainingQueue, enqueue_training};
use crate::structures::{BuildingKind, Disabled, building_stats};
use crate::world::Position;
use crate::world::nodes::{ResourceNode, find_nearest_node};

/// Most workers that may be building, out of `workforce`.
#[must_use]
pub fn construction_quota(workforce: usize, share: f32) -> usize {
    (workforce as f32 * share).ceil() as usize
}

/// Kinds still short for `cost`; all base kinds when nothing is short.
#[must_use]
pub fn needed_kinds(held: &Stockpile, cost: Option<&Stockpile>) -> Vec<ResourceKind> {
    let short: Vec<ResourceKind> = cost
        .map(|cost| {
            ResourceKind::ALL
                .into_iter()
                .filter(|&kind| held.get(kind) < cost.get(kind))
                .collect()
        })
        .unwrap_or_default();
    if short.is_empty() {
        ResourceKind::BASE.to_vec()
    } else {
        short
    }
}

/// Sends idle workers to open construction sites up to the quota, and the
/// rest to the nearest node of a kind the economy needs.
pub(super) fn allocate_workers(
    config: Res<OpponentConfig>,
    sim: Res<SimConfig>,
    opponent: Res<Opponent>,
    ledgers: Res<Ledgers>,
    mut orders: MessageWriter<AgentCommand>,
    workers: Query<
        (Entity, &Team, &SpawnOrder, &Position, &AgentState, &Health),
        (With<Agent>, With<Inventory>),
    >,
    sites: Query<(Entity, &Team, &SpawnOrder, &Position, &Construction)>,
    nodes: Query<(Entity, &ResourceNode, &Position)>,
    structures: StructureQuery,
) {
    let team = opponent.team;
    let mut crew: Vec<(SpawnOrder, Entity, Vec2, AgentState)> = workers
        .iter()
        .filter(|&(_, &owner, .., health)| owner == team && health.is_active())
        .map(|(entity, _, &order, position, &state, _)| (order, entity, position.0, state))
        .collect();
    crew.sort_unstable_by_key(|&(order, ..)| order);

    let quota = construction_quota(crew.len(), config.construction_share);
    let mut builders = crew
        .iter()
        .filter(|(.., state)| state.is_constructing())
        .count();

    let mut open_sites: Vec<(SpawnOrder, Entity, Vec2)> = sites
        .iter()
        .filter(|&(_, &owner, .., construction)| owner == team && !construction.is_complete())
        .map(|(entity, _, &order, position, _)| (order, entity, position.0))
        .collect();
    open_sites.sort_unstable_by_key(|&(order, ..)| order);

    let owned = structures
        .iter()
        .filter(|&(_, _, &owner, ..)| owner == team)
        .map(|(_, &kind, ..)| kind);
    let next_cost = next_build(&config.build_order, owned).map(|kind| building_stats(kind).cost);
    let wanted = needed_kinds(ledgers.get(team), next_cost.as_ref());
    let node_list: Vec<_> = nodes.iter().collect();

    for (_, worker, position, state) in crew {
        if !state.is_idle() {
            continue;
        }
        if builders < quota {
            let nearest_site = open_sites
                .iter()
                .min_by(|a, b| position.distance(a.2).total_cmp(&position.distance(b.2)));
            if let Some(&(_, site, _)) = nearest_site {
                debug!("Opponent: worker {worker} to build {site}");
                orders.write(AgentCommand::new(worker, Order::Construct(site)));
                builders += 1;
                continue;
            }
        }
        let node = find_nearest_node(
            node_list.iter().copied(),
            position,
            sim.node_search_radius,
            |_, node| wanted.contains(&node.kind),
        );
        match node {
            Some(node) => {
                debug!("Opponent: worker {worker} to gather at {node}");
                orders.write(AgentCommand::new(worker, Order::Gather(node)));
            }
            None => debug!("Opponent: no node in reach for worker {worker}"),
        }
    }
}

/// Keeps the workforce topped up from the main base while not under threat.
pub(super) fn train_workers(
    config: Res<OpponentConfig>,
    opponent: Res<Opponent>,
    mut ledgers: ResMut<Ledgers>,
    workers: Query<(&Team, &Health), (With<Agent>, With<Inventory>)>,
    mut hives: Query<
        (
            &BuildingKind,
            &Team,
            &SpawnOrder,
            &mut TrainingQueue,
            Has<Construction>,
        ),
        Without<Disabled>,
    >,
) {
    if opponent.mode == OpponentMode::Defending {
        return;
    }
    let team = opponent.team;
    let live = workers
        .iter()
        .filter(|&(&owner, health)| owner == team && health.is_active())
        .count();
    let queued: usize = hives
        .iter()
        .filter(|&(_, &owner, ..)| owner == team)
        .map(|(.., queue, _)| queue.queue.iter().filter(|&&unit| unit == UnitKind::Worker).count())
        .sum();
    if live + queued >= config.target_workers {
        return;
    }

    let Some((&kind, _, _, mut queue, site)) = hives
        .iter_mut()
        .filter(|(kind, owner, .., site)| **kind == BuildingKind::Hive && **owner == team && !site)
        .min_by_key(|(_, _, order, ..)| **order)
    else {
        return;
    };
    match enqueue_training(&mut ledgers, team, kind, !site, &mut queue, UnitKind::Worker) {
        Ok(()) => debug!("Opponent: queued a worker ({live} live, {queued} queued)"),
        Err(err) => debug!("Opponent: cannot queue a worker: {err}"),
    }
}
