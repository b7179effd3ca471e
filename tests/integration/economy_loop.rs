//! Workers gathering into the ledger and raising structures.

use bevy::prelude::*;
use pretty_assertions::assert_eq;
use skirmish::Team;
use skirmish::agents::UnitKind;
use skirmish::agents::commands::Order;
use skirmish::economy::{Ledgers, ResourceKind};
use skirmish::structures::BuildingKind;
use skirmish::structures::construction::Construction;
use skirmish::structures::placement::BuildOrder;
use skirmish::world::GridCell;
use skirmish::world::nodes::ResourceNode;

use crate::{agent, create_app, node, order, run, structure};

fn food(app: &App) -> u32 {
    app.world()
        .resource::<Ledgers>()
        .get(Team::Player)
        .get(ResourceKind::Food)
}

#[test]
fn worker_keeps_the_ledger_supplied() {
    let mut app = create_app(|_| {});
    structure(&mut app, BuildingKind::Hive, Team::Player, GridCell::new(4, 4));
    let worker = agent(&mut app, UnitKind::Worker, Team::Player, Vec2::new(240.0, 176.0));
    let field = node(&mut app, ResourceKind::Food, 100, Vec2::new(400.0, 176.0));
    let before = food(&app);

    order(&mut app, worker, Order::Gather(field));
    run(&mut app, 160);

    assert!(food(&app) > before);
    assert!(app.world().get::<ResourceNode>(field).unwrap().remaining < 100);
}

#[test]
fn ordered_site_is_built_by_a_worker() {
    let mut app = create_app(|_| {});
    let worker = agent(&mut app, UnitKind::Worker, Team::Player, Vec2::new(240.0, 240.0));
    app.world_mut().write_message(BuildOrder {
        team: Team::Player,
        kind: BuildingKind::Storehouse,
        origin: GridCell::new(10, 4),
    });
    run(&mut app, 1);

    let mut sites = app
        .world_mut()
        .query_filtered::<(Entity, &BuildingKind), With<Construction>>();
    let found: Vec<(Entity, BuildingKind)> = sites
        .iter(app.world())
        .map(|(entity, &kind)| (entity, kind))
        .collect();
    assert_eq!(found.len(), 1);
    let (site, kind) = found[0];
    assert_eq!(kind, BuildingKind::Storehouse);
    assert_eq!(
        app.world()
            .resource::<Ledgers>()
            .get(Team::Player)
            .get(ResourceKind::Sticks),
        100
    );

    order(&mut app, worker, Order::Construct(site));
    run(&mut app, 80);

    assert!(app.world().get::<Construction>(site).is_none());
}
