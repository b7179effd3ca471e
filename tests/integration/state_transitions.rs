//! Tests for simulation state transitions.

use bevy::prelude::*;
use pretty_assertions::assert_eq;
use skirmish::structures::production::{TrainOrder, TrainingQueue};
use skirmish::structures::BuildingKind;
use skirmish::world::GridCell;
use skirmish::{SimState, Team};

use crate::{create_app, run, structure};

#[test]
fn simulation_starts_running() {
    let app = create_app(|_| {});
    let state = app.world().resource::<State<SimState>>();
    assert_eq!(*state.get(), SimState::Running);
}

#[test]
fn pausing_freezes_training_and_resuming_continues_it() {
    let mut app = create_app(|_| {});
    let hive = structure(&mut app, BuildingKind::Hive, Team::Player, GridCell::new(4, 4));
    app.world_mut().write_message(TrainOrder {
        building: hive,
        unit: skirmish::agents::UnitKind::Worker,
    });
    run(&mut app, 4);
    let elapsed = app.world().get::<TrainingQueue>(hive).unwrap().elapsed;
    assert!(elapsed > 0.0);

    app.world_mut()
        .resource_mut::<NextState<SimState>>()
        .set(SimState::Paused);
    run(&mut app, 1);
    let paused_at = app.world().get::<TrainingQueue>(hive).unwrap().elapsed;
    run(&mut app, 8);
    assert_eq!(app.world().get::<TrainingQueue>(hive).unwrap().elapsed, paused_at);

    app.world_mut()
        .resource_mut::<NextState<SimState>>()
        .set(SimState::Running);
    run(&mut app, 2);
    assert!(app.world().get::<TrainingQueue>(hive).unwrap().elapsed > paused_at);
}
