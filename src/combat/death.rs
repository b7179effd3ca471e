//! Death detection: removes destroyed agents and structures at the end of the tick.
//!
//! Health reaching zero only marks an entity inactive; everything else in the
//! tick treats it as gone. Removal happens here, once per tick.

use bevy::prelude::*;

use super::Health;
use crate::agents::UnitKind;
use crate::notifications::{Casualty, UnitDestroyed};
use crate::structures::{BuildingKind, Footprint};
use crate::world::Terrain;
use crate::{SimSet, Team};

/// Despawns anything at zero health or below. Destroyed structures release
/// their footprint.
fn check_death(
    mut commands: Commands,
    mut terrain: ResMut<Terrain>,
    mut destroyed: MessageWriter<UnitDestroyed>,
    query: Query<(
        Entity,
        &Health,
        &Team,
        Option<&UnitKind>,
        Option<&BuildingKind>,
        Option<&Footprint>,
    )>,
) {
    for (entity, health, &team, unit, building, footprint) in &query {
        if health.current > 0.0 {
            continue;
        }
        if let Some(footprint) = footprint {
            terrain.query_mut().set_occupied(&footprint.cells(), false);
        }
        let what = match (unit, building) {
            (Some(&unit), _) => Some(Casualty::Unit(unit)),
            (None, Some(&building)) => Some(Casualty::Structure(building)),
            (None, None) => None,
        };
        if let Some(what) = what {
            info!("{team:?} {what:?} destroyed");
            destroyed.write(UnitDestroyed { entity, team, what });
        }
        commands.entity(entity).despawn();
    }
}

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Update, check_death.in_set(SimSet::Death));
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::structures::Building;
    use crate::testing::*;
    use crate::world::GridCell;
    use pretty_assertions::assert_eq;

    fn damage(app: &mut App, entity: Entity, current: f32) {
        app.world_mut().get_mut::<Health>(entity).unwrap().current = current;
    }

    #[test]
    fn agent_despawned_at_zero_hp() {
        let mut app = create_sim_app();
        let agent = spawn_agent_at(&mut app, UnitKind::Worker, Team::Player, Vec2::splat(48.0));
        watch_messages::<UnitDestroyed>(&mut app);
        damage(&mut app, agent, 0.0);

        tick(&mut app);

        assert_entity_count::<With<Health>>(&mut app, 0);
        assert_eq!(
            received::<UnitDestroyed>(&app),
            vec![UnitDestroyed {
                entity: agent,
                team: Team::Player,
                what: Casualty::Unit(UnitKind::Worker),
            }]
        );
    }

    #[test]
    fn agent_despawned_at_negative_hp() {
        let mut app = create_sim_app();
        let agent = spawn_agent_at(&mut app, UnitKind::Warrior, Team::Enemy, Vec2::splat(48.0));
        damage(&mut app, agent, -10.0);

        tick(&mut app);

        assert_entity_count::<With<Health>>(&mut app, 0);
    }

    #[test]
    fn agent_survives_above_zero_hp() {
        let mut app = create_sim_app();
        let agent = spawn_agent_at(&mut app, UnitKind::Worker, Team::Player, Vec2::splat(48.0));
        damage(&mut app, agent, 1.0);

        tick(&mut app);

        assert_entity_count::<With<Health>>(&mut app, 1);
    }

    #[test]
    fn destroyed_structure_frees_its_footprint() {
        let mut app = create_sim_app();
        let origin = GridCell::new(5, 5);
        let barracks = spawn_structure_at(&mut app, BuildingKind::Barracks, Team::Enemy, origin);
        assert!(!app.world().resource::<Terrain>().query().is_walkable(origin));
        damage(&mut app, barracks, 0.0);

        tick(&mut app);

        assert_entity_count::<With<Building>>(&mut app, 0);
        let world = app.world().resource::<Terrain>().query();
        assert!(crate::world::footprint_cells(origin, 3)
            .into_iter()
            .all(|cell| world.is_walkable(cell)));
    }
}
