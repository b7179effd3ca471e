//! Crate-level scenarios driving the full simulation through its public API.

mod battles;
mod economy_loop;
mod opponent;
mod state_transitions;

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use skirmish::Team;
use skirmish::agents::commands::{AgentCommand, Order};
use skirmish::agents::{AgentState, SpawnCounter, UnitKind, spawn_agent};
use skirmish::economy::ResourceKind;
use skirmish::structures::{BuildingKind, spawn_structure};
use skirmish::world::nodes::spawn_resource_node;
use skirmish::world::{GridCell, Terrain};

/// Headless app on a 250 ms fixed clock, warmed up by one update.
pub fn create_app(configure: impl FnOnce(&mut App)) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(250)));
    configure(&mut app);
    app.add_plugins(skirmish::plugin);
    app.update();
    app
}

pub fn run(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        app.update();
    }
}

pub fn agent(app: &mut App, kind: UnitKind, team: Team, position: Vec2) -> Entity {
    let world = app.world_mut();
    let entity = world.resource_scope(|world, mut counter: Mut<SpawnCounter>| {
        spawn_agent(&mut world.commands(), &mut counter, kind, team, position)
    });
    world.flush();
    entity
}

pub fn structure(app: &mut App, kind: BuildingKind, team: Team, origin: GridCell) -> Entity {
    let world = app.world_mut();
    let entity = world.resource_scope(|world, mut counter: Mut<SpawnCounter>| {
        world.resource_scope(|world, mut terrain: Mut<Terrain>| {
            spawn_structure(
                &mut world.commands(),
                &mut counter,
                terrain.query_mut(),
                kind,
                team,
                origin,
                true,
            )
        })
    });
    world.flush();
    entity
}

pub fn node(app: &mut App, kind: ResourceKind, amount: u32, position: Vec2) -> Entity {
    let world = app.world_mut();
    let entity = spawn_resource_node(&mut world.commands(), kind, amount, position);
    world.flush();
    entity
}

pub fn order(app: &mut App, agent: Entity, order: Order) {
    app.world_mut().write_message(AgentCommand::new(agent, order));
}

pub fn state(app: &App, agent: Entity) -> AgentState {
    *app.world().get::<AgentState>(agent).unwrap()
}
