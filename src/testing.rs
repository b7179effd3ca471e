//! Testing utilities for simulation systems.

#![cfg(test)]

use std::time::Duration;

use bevy::ecs::query::QueryFilter;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;

use crate::Team;
use crate::agents::commands::{AgentCommand, Order};
use crate::agents::movement::PathFollower;
use crate::agents::{AgentState, SpawnCounter, UnitKind, spawn_agent};
use crate::economy::{Ledgers, ResourceKind, Stockpile};
use crate::structures::{BuildingKind, spawn_structure};
use crate::world::nodes::spawn_resource_node;
use crate::world::{GridCell, Position, Terrain, TileGrid};

/// Simulated seconds per test tick.
pub const TICK: Duration = Duration::from_millis(250);

/// Creates a headless app running the whole simulation on a fixed clock.
/// The first update only starts the clock, so it is taken here.
pub fn create_sim_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(TICK))
        .add_plugins(crate::plugin);
    app.update();
    app
}

/// Helper to advance the app by one tick.
pub fn tick(app: &mut App) {
    app.update();
}

/// Helper to advance the app by multiple ticks.
pub fn tick_many(app: &mut App, count: usize) {
    for _ in 0..count {
        app.update();
    }
}

/// Replaces the map. Call before spawning structures.
pub fn insert_terrain(app: &mut App, grid: TileGrid) {
    app.insert_resource(Terrain::new(grid));
}

pub fn spawn_agent_at(app: &mut App, kind: UnitKind, team: Team, position: Vec2) -> Entity {
    let world = app.world_mut();
    let entity = world.resource_scope(|world, mut counter: Mut<SpawnCounter>| {
        let mut commands = world.commands();
        spawn_agent(&mut commands, &mut counter, kind, team, position)
    });
    world.flush();
    entity
}

/// A finished structure with its footprint blocked.
pub fn spawn_structure_at(
    app: &mut App,
    kind: BuildingKind,
    team: Team,
    origin: GridCell,
) -> Entity {
    place(app, kind, team, origin, true)
}

/// A construction site at zero progress.
pub fn spawn_site_at(app: &mut App, kind: BuildingKind, team: Team, origin: GridCell) -> Entity {
    place(app, kind, team, origin, false)
}

fn place(
    app: &mut App,
    kind: BuildingKind,
    team: Team,
    origin: GridCell,
    complete: bool,
) -> Entity {
    let world = app.world_mut();
    let entity = world.resource_scope(|world, mut counter: Mut<SpawnCounter>| {
        world.resource_scope(|world, mut terrain: Mut<Terrain>| {
            let mut commands = world.commands();
            spawn_structure(
                &mut commands,
                &mut counter,
                terrain.query_mut(),
                kind,
                team,
                origin,
                complete,
            )
        })
    });
    world.flush();
    entity
}

pub fn spawn_node_at(app: &mut App, kind: ResourceKind, amount: u32, position: Vec2) -> Entity {
    let world = app.world_mut();
    let entity = spawn_resource_node(&mut world.commands(), kind, amount, position);
    world.flush();
    entity
}

/// Queues an order; it applies on the next tick.
pub fn command(app: &mut App, agent: Entity, order: Order) {
    app.world_mut().write_message(AgentCommand::new(agent, order));
}

pub fn position_of(app: &App, entity: Entity) -> Vec2 {
    app.world().get::<Position>(entity).unwrap().0
}

pub fn state_of(app: &App, agent: Entity) -> AgentState {
    *app.world().get::<AgentState>(agent).unwrap()
}

pub fn follower_of(app: &App, agent: Entity) -> PathFollower {
    app.world().get::<PathFollower>(agent).unwrap().clone()
}

pub fn set_state(app: &mut App, agent: Entity, state: AgentState) {
    *app.world_mut().get_mut::<AgentState>(agent).unwrap() = state;
}

pub fn set_ledger(app: &mut App, team: Team, pile: Stockpile) {
    app.world_mut().resource_mut::<Ledgers>().set(team, pile);
}

pub fn ledger(app: &App, team: Team) -> Stockpile {
    *app.world().resource::<Ledgers>().get(team)
}

/// Asserts that exactly `expected` entities match the filter.
pub fn assert_entity_count<F: QueryFilter>(app: &mut App, expected: usize) {
    let mut query = app.world_mut().query_filtered::<Entity, F>();
    let actual = query.iter(app.world()).count();
    assert_eq!(actual, expected, "expected {expected} entities, found {actual}");
}

/// Every `M` written since [`watch_messages`] was called.
#[derive(Resource)]
pub struct Received<M: Message>(pub Vec<M>);

fn record<M: Message + Clone>(mut reader: MessageReader<M>, mut received: ResMut<Received<M>>) {
    received.0.extend(reader.read().cloned());
}

/// Starts recording `M` at the end of every tick.
pub fn watch_messages<M: Message + Clone>(app: &mut App) {
    app.insert_resource(Received::<M>(Vec::new()))
        .add_systems(Last, record::<M>);
}

pub fn received<M: Message + Clone>(app: &App) -> Vec<M> {
    app.world().resource::<Received<M>>().0.clone()
}
