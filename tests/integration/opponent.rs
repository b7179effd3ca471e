//! The computer-controlled faction running on its own.

use bevy::prelude::*;
use pretty_assertions::assert_eq;
use skirmish::Team;
use skirmish::agents::UnitKind;
use skirmish::config::OpponentConfig;
use skirmish::opponent::OpponentMode;
use skirmish::snapshot::take_snapshot;
use skirmish::structures::BuildingKind;
use skirmish::structures::production::TrainingQueue;
use skirmish::world::GridCell;

use crate::{agent, create_app, run, structure};

fn quick_opponent(app: &mut App) {
    let config = OpponentConfig::from_json_str(r#"{ "decision_interval_secs": 1.0 }"#).unwrap();
    app.insert_resource(config);
}

#[test]
fn first_decision_expands_and_trains() {
    let mut app = create_app(quick_opponent);
    let hive = structure(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));

    run(&mut app, 4);

    let snapshot = take_snapshot(app.world_mut());
    let enemy_kinds: Vec<BuildingKind> = snapshot
        .structures
        .iter()
        .filter(|s| s.team == Team::Enemy)
        .map(|s| s.kind)
        .collect();
    assert_eq!(enemy_kinds, vec![BuildingKind::Hive, BuildingKind::Storehouse]);
    let queue = app.world().get::<TrainingQueue>(hive).unwrap();
    assert_eq!(queue.queue.front(), Some(&UnitKind::Worker));
}

#[test]
fn intruder_near_the_hive_puts_it_on_the_defensive() {
    let mut app = create_app(quick_opponent);
    structure(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));
    agent(&mut app, UnitKind::Warrior, Team::Player, Vec2::new(1150.0, 1328.0));

    run(&mut app, 4);

    assert_eq!(
        take_snapshot(app.world_mut()).opponent_mode,
        Some(OpponentMode::Defending)
    );
}

#[test]
fn config_loaded_after_startup_sets_the_cadence() {
    let mut app = create_app(|_| {});
    quick_opponent(&mut app);
    structure(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));
    agent(&mut app, UnitKind::Warrior, Team::Player, Vec2::new(1150.0, 1328.0));

    run(&mut app, 3);
    assert_eq!(
        take_snapshot(app.world_mut()).opponent_mode,
        Some(OpponentMode::Gathering)
    );

    run(&mut app, 1);
    assert_eq!(
        take_snapshot(app.world_mut()).opponent_mode,
        Some(OpponentMode::Defending)
    );
}
