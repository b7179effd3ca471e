//! Read-only, serializable view of the simulation for tooling and replays.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::Team;
use crate::agents::{Agent, AgentState, SpawnOrder, UnitKind};
use crate::combat::Health;
use crate::economy::{Ledgers, Stockpile};
use crate::opponent::{Opponent, OpponentMode};
use crate::structures::construction::{Construction, FULL_PROGRESS};
use crate::structures::{Building, BuildingKind};
use crate::world::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u64,
    pub team: Team,
    pub kind: UnitKind,
    pub position: [f32; 2],
    pub health: f32,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub id: u64,
    pub team: Team,
    pub kind: BuildingKind,
    /// Construction percent; finished structures report 100.
    pub progress: f32,
    pub health: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub agents: Vec<AgentSnapshot>,
    pub structures: Vec<StructureSnapshot>,
    pub player_resources: Stockpile,
    pub enemy_resources: Stockpile,
    pub opponent_mode: Option<OpponentMode>,
}

/// Captures the current state, agents and structures in creation order.
pub fn take_snapshot(world: &mut World) -> SimSnapshot {
    let mut agents = world.query_filtered::<(
        Entity,
        &SpawnOrder,
        &Team,
        &UnitKind,
        &Position,
        &Health,
        &AgentState,
    ), With<Agent>>();
    let mut agents: Vec<(SpawnOrder, AgentSnapshot)> = agents
        .iter(world)
        .map(|(entity, &order, &team, &kind, position, health, state)| {
            (
                order,
                AgentSnapshot {
                    id: entity.to_bits(),
                    team,
                    kind,
                    position: position.to_array(),
                    health: health.current,
                    state: state.label().to_owned(),
                },
            )
        })
        .collect();
    agents.sort_unstable_by_key(|&(order, _)| order);

    let mut structures = world.query_filtered::<(
        Entity,
        &SpawnOrder,
        &Team,
        &BuildingKind,
        &Health,
        Option<&Construction>,
    ), With<Building>>();
    let mut structures: Vec<(SpawnOrder, StructureSnapshot)> = structures
        .iter(world)
        .map(|(entity, &order, &team, &kind, health, site)| {
            (
                order,
                StructureSnapshot {
                    id: entity.to_bits(),
                    team,
                    kind,
                    progress: site.map_or(FULL_PROGRESS, Construction::progress),
                    health: health.current,
                },
            )
        })
        .collect();
    structures.sort_unstable_by_key(|&(order, _)| order);

    let ledgers = world.get_resource::<Ledgers>();
    SimSnapshot {
        agents: agents.into_iter().map(|(_, agent)| agent).collect(),
        structures: structures.into_iter().map(|(_, structure)| structure).collect(),
        player_resources: ledgers.map_or(Stockpile::EMPTY, |l| *l.get(Team::Player)),
        enemy_resources: ledgers.map_or(Stockpile::EMPTY, |l| *l.get(Team::Enemy)),
        opponent_mode: world.get_resource::<Opponent>().map(|opponent| opponent.mode),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::testing::*;
    use crate::world::GridCell;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_lists_agents_structures_and_ledgers() {
        let mut app = create_sim_app();
        let worker = spawn_agent_at(
            &mut app,
            UnitKind::Worker,
            Team::Player,
            Vec2::new(48.0, 80.0),
        );
        let site = spawn_site_at(
            &mut app,
            BuildingKind::Storehouse,
            Team::Player,
            GridCell::new(10, 2),
        );
        let hive = spawn_structure_at(
            &mut app,
            BuildingKind::Hive,
            Team::Enemy,
            GridCell::new(40, 40),
        );
        set_ledger(&mut app, Team::Enemy, Stockpile::from_amounts(1, 2, 3, 4));

        let snapshot = take_snapshot(app.world_mut());

        assert_eq!(
            snapshot.agents,
            vec![AgentSnapshot {
                id: worker.to_bits(),
                team: Team::Player,
                kind: UnitKind::Worker,
                position: [48.0, 80.0],
                health: 60.0,
                state: "Idle".to_owned(),
            }]
        );
        let ids: Vec<u64> = snapshot.structures.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![site.to_bits(), hive.to_bits()]);
        assert_eq!(snapshot.structures[0].progress, 0.0);
        assert_eq!(snapshot.structures[1].progress, 100.0);
        assert_eq!(snapshot.enemy_resources, Stockpile::from_amounts(1, 2, 3, 4));
        assert_eq!(snapshot.opponent_mode, Some(OpponentMode::Gathering));
    }

    #[test]
    fn snapshot_survives_json() {
        let mut app = create_sim_app();
        spawn_agent_at(&mut app, UnitKind::Archer, Team::Enemy, Vec2::new(300.0, 300.0));
        spawn_structure_at(&mut app, BuildingKind::Barracks, Team::Player, GridCell::new(4, 4));

        let snapshot = take_snapshot(app.world_mut());
        let json = serde_json::to_string(&snapshot).unwrap();

        assert!(json.contains("\"Archer\""));
        assert_eq!(serde_json::from_str::<SimSnapshot>(&json).unwrap(), snapshot);
    }
}
