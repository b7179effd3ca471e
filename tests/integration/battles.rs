//! Engagements from order to removal.

use bevy::prelude::*;
use pretty_assertions::assert_eq;
use skirmish::Team;
use skirmish::agents::{AgentState, UnitKind};
use skirmish::agents::commands::Order;

use crate::{agent, create_app, order, run, state};

#[test]
fn ordered_warrior_destroys_its_target_then_idles() {
    let mut app = create_app(|_| {});
    let warrior = agent(&mut app, UnitKind::Warrior, Team::Player, Vec2::new(100.0, 100.0));
    let worker = agent(&mut app, UnitKind::Worker, Team::Enemy, Vec2::new(300.0, 100.0));

    order(&mut app, warrior, Order::Engage(worker));
    run(&mut app, 120);

    assert!(app.world().get_entity(worker).is_err());
    assert_eq!(state(&app, warrior), AgentState::Idle);
}

#[test]
fn attack_move_engages_what_it_meets() {
    let mut app = create_app(|_| {});
    let archer = agent(&mut app, UnitKind::Archer, Team::Player, Vec2::new(100.0, 400.0));
    let worker = agent(&mut app, UnitKind::Worker, Team::Enemy, Vec2::new(500.0, 400.0));

    order(&mut app, archer, Order::AttackMove(Vec2::new(900.0, 400.0)));
    run(&mut app, 24);

    assert_eq!(state(&app, archer).attack_target(), Some(worker));
}
