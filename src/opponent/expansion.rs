//! Construction duty: works through the build order one entry at a time.

use std::collections::HashMap;

use bevy::prelude::*;

use super::{Opponent, StructureQuery, base_of};
use crate::agents::SpawnCounter;
use crate::config::OpponentConfig;
use crate::economy::Ledgers;
use crate::structures::placement::{SiteSearch, node_cells, place_structure, prerequisite_met};
use crate::structures::{BuildingKind, building_stats};
use crate::world::nodes::ResourceNode;
use crate::world::{Position, Terrain};

/// First build-order entry not yet covered by an owned structure or site.
/// Repeated entries need as many structures of that kind.
pub fn next_build(
    order: &[BuildingKind],
    owned: impl IntoIterator<Item = BuildingKind>,
) -> Option<BuildingKind> {
    let mut available: HashMap<BuildingKind, usize> = HashMap::new();
    for kind in owned {
        *available.entry(kind).or_default() += 1;
    }
    order.iter().copied().find(|kind| match available.get_mut(kind) {
        Some(count) if *count > 0 => {
            *count -= 1;
            false
        }
        _ => true,
    })
}

/// Places the next structure of the build order around the main base once
/// its prerequisite stands and it is affordable. Entries are never skipped.
pub(super) fn expand_base(
    config: Res<OpponentConfig>,
    opponent: Res<Opponent>,
    mut commands: Commands,
    mut counter: ResMut<SpawnCounter>,
    mut terrain: ResMut<Terrain>,
    mut ledgers: ResMut<Ledgers>,
    structures: StructureQuery,
    nodes: Query<&Position, With<ResourceNode>>,
) {
    let team = opponent.team;
    let owned = structures
        .iter()
        .filter(|&(_, _, &owner, ..)| owner == team)
        .map(|(_, &kind, ..)| kind);
    let Some(kind) = next_build(&config.build_order, owned) else {
        return;
    };
    let Some((_, home)) = base_of(&structures, team) else {
        debug!("Opponent: no main base to build {kind:?} around");
        return;
    };

    let ready = prerequisite_met(
        structures
            .iter()
            .map(|(_, kind, owner, .., site)| (kind, owner, site)),
        team,
        kind,
    );
    if !ready {
        debug!("Opponent: {kind:?} waits for {:?}", building_stats(kind).requires);
        return;
    }
    if !ledgers.can_afford(team, &building_stats(kind).cost) {
        debug!("Opponent: saving up for {kind:?}");
        return;
    }

    let reserved = node_cells(terrain.query(), &nodes);
    let search = SiteSearch {
        center: terrain.query().world_to_grid(home),
        radius: config.site_search_radius,
        clearance: config.site_clearance,
        reserved: &reserved,
    };
    match place_structure(
        &mut commands,
        &mut counter,
        terrain.query_mut(),
        &mut ledgers,
        team,
        kind,
        ready,
        search,
    ) {
        Ok(site) => info!("Opponent started {kind:?} ({site})"),
        Err(err) => debug!("Opponent cannot place {kind:?}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use BuildingKind::{Aerie, Barracks, Hive, Storehouse, Watchtower};

    #[test]
    fn first_missing_entry_is_next() {
        let order = [Storehouse, Barracks, Watchtower, Aerie];
        assert_eq!(next_build(&order, [Hive]), Some(Storehouse));
        assert_eq!(next_build(&order, [Hive, Storehouse]), Some(Barracks));
        assert_eq!(next_build(&order, [Barracks]), Some(Storehouse));
        assert_eq!(
            next_build(&order, [Storehouse, Barracks, Watchtower, Aerie]),
            None
        );
    }

    #[test]
    fn repeated_entries_need_repeated_structures() {
        let order = [Barracks, Barracks];
        assert_eq!(next_build(&order, [Barracks]), Some(Barracks));
        assert_eq!(next_build(&order, [Barracks, Barracks]), None);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::Team;
    use crate::economy::{ResourceKind, Stockpile};
    use crate::structures::construction::Construction;
    use crate::testing::*;
    use crate::world::GridCell;
    use pretty_assertions::assert_eq;

    fn enemy_sites(app: &mut App) -> Vec<BuildingKind> {
        let mut query = app
            .world_mut()
            .query_filtered::<(&BuildingKind, &Team), With<Construction>>();
        query
            .iter(app.world())
            .filter(|&(_, &team)| team == Team::Enemy)
            .map(|(&kind, _)| kind)
            .collect()
    }

    #[test]
    fn storehouse_is_placed_near_the_hive() {
        let mut app = create_sim_app();
        spawn_structure_at(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));

        tick_many(&mut app, 8);

        assert_eq!(enemy_sites(&mut app), vec![BuildingKind::Storehouse]);
        assert_eq!(ledger(&app, Team::Enemy).get(ResourceKind::Sticks), 100);
    }

    fn first_site_position(app: &mut App) -> Vec2 {
        let mut query = app
            .world_mut()
            .query_filtered::<&Position, With<Construction>>();
        query.single(app.world()).unwrap().0
    }

    #[test]
    fn storehouse_is_not_laid_over_a_node() {
        let mut app = create_sim_app();
        spawn_structure_at(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));
        tick_many(&mut app, 8);
        let usual = first_site_position(&mut app);

        let mut app = create_sim_app();
        spawn_structure_at(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));
        let terrain = app.world().resource::<Terrain>().query();
        let spot = terrain.grid_to_world_center(terrain.world_to_grid(usual));
        spawn_node_at(&mut app, ResourceKind::Stone, 100, spot);
        tick_many(&mut app, 8);

        let moved = first_site_position(&mut app);
        assert_ne!(moved, usual);
        assert!(moved.distance(spot) > 32.0);
    }

    #[test]
    fn unaffordable_entry_blocks_the_order() {
        let mut app = create_sim_app();
        spawn_structure_at(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));
        set_ledger(&mut app, Team::Enemy, Stockpile::from_amounts(0, 500, 50, 0));

        tick_many(&mut app, 8);

        assert!(enemy_sites(&mut app).is_empty());
        assert_eq!(ledger(&app, Team::Enemy), Stockpile::from_amounts(0, 500, 50, 0));
    }

    #[test]
    fn aerie_waits_for_a_finished_barracks() {
        let mut app = create_sim_app();
        app.world_mut().resource_mut::<OpponentConfig>().build_order = vec![BuildingKind::Aerie];
        spawn_structure_at(&mut app, BuildingKind::Hive, Team::Enemy, GridCell::new(40, 40));
        spawn_site_at(&mut app, BuildingKind::Barracks, Team::Enemy, GridCell::new(30, 30));
        set_ledger(&mut app, Team::Enemy, Stockpile::from_amounts(900, 900, 900, 0));

        tick_many(&mut app, 8);

        assert_eq!(enemy_sites(&mut app), vec![BuildingKind::Barracks]);
    }
}
