//! Build-site search and transactional placement.

use bevy::prelude::*;
use thiserror::Error;

use super::construction::Construction;
use super::{BuildingKind, building_stats, spawn_structure};
use crate::agents::SpawnCounter;
use crate::economy::{EconomyError, Ledgers};
use crate::world::nodes::ResourceNode;
use crate::world::{GridCell, Position, Terrain, TerrainType, WorldQuery, footprint_cells};
use crate::{SimSet, Team};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("{0:?} must be built first")]
    MissingPrerequisite(BuildingKind),
    #[error(transparent)]
    Economy(#[from] EconomyError),
    #[error("no free site for {0:?}")]
    NoSite(BuildingKind),
}

/// Where to look for a site: rings around `center` out to `radius`, keeping
/// `clearance` free cells between the footprint and any structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteSearch<'a> {
    pub center: GridCell,
    pub radius: i32,
    pub clearance: i32,
    /// Cells no footprint may cover, such as resource node cells.
    pub reserved: &'a [GridCell],
}

impl<'a> SiteSearch<'a> {
    /// Exactly `origin`, no margin.
    #[must_use]
    pub const fn exact(origin: GridCell) -> Self {
        Self {
            center: origin,
            radius: 0,
            clearance: 0,
            reserved: &[],
        }
    }

    #[must_use]
    pub const fn avoiding(self, reserved: &'a [GridCell]) -> Self {
        Self { reserved, ..self }
    }

    fn covers_reserved(&self, origin: GridCell, size: i32) -> bool {
        footprint_cells(origin, size)
            .iter()
            .any(|cell| self.reserved.contains(cell))
    }
}

/// Grid cells holding resource nodes.
pub fn node_cells<'a>(
    world: &dyn WorldQuery,
    nodes: impl IntoIterator<Item = &'a Position>,
) -> Vec<GridCell> {
    nodes
        .into_iter()
        .map(|position| world.world_to_grid(position.0))
        .collect()
}

/// Footprint cells are open grass and the margin around them holds no structure.
#[must_use]
pub fn is_site_clear(world: &dyn WorldQuery, origin: GridCell, size: i32, clearance: i32) -> bool {
    let open = footprint_cells(origin, size).into_iter().all(|cell| {
        world.is_walkable(cell)
            && world
                .tile(cell)
                .is_some_and(|tile| tile.terrain == TerrainType::Grass)
    });
    if !open {
        return false;
    }
    let margin = origin.offset(-clearance, -clearance);
    footprint_cells(margin, size + 2 * clearance)
        .into_iter()
        .all(|cell| world.tile(cell).is_none_or(|tile| !tile.occupied))
}

/// First clear footprint origin off the reserved cells, searching outward ring by ring.
#[must_use]
pub fn find_build_site(world: &dyn WorldQuery, size: i32, search: SiteSearch) -> Option<GridCell> {
    (0..=search.radius).find_map(|radius| {
        search.center.ring(radius).into_iter().find(|&origin| {
            !search.covers_reserved(origin, size)
                && is_site_clear(world, origin, size, search.clearance)
        })
    })
}

/// Pays for a structure, finds its site and lays it down as a construction
/// site. A failed site search refunds the payment.
pub fn place_structure(
    commands: &mut Commands,
    counter: &mut SpawnCounter,
    world: &mut dyn WorldQuery,
    ledgers: &mut Ledgers,
    team: Team,
    kind: BuildingKind,
    prerequisite_met: bool,
    search: SiteSearch,
) -> Result<Entity, PlacementError> {
    let stats = building_stats(kind);
    if let Some(required) = stats.requires {
        if !prerequisite_met {
            return Err(PlacementError::MissingPrerequisite(required));
        }
    }
    ledgers.spend(team, &stats.cost)?;

    let Some(origin) = find_build_site(world, stats.footprint, search) else {
        ledgers.refund(team, &stats.cost);
        return Err(PlacementError::NoSite(kind));
    };
    Ok(spawn_structure(commands, counter, world, kind, team, origin, false))
}

/// Whether `team` has a complete structure `kind` requires.
pub fn prerequisite_met<'a>(
    structures: impl IntoIterator<Item = (&'a BuildingKind, &'a Team, bool)>,
    team: Team,
    kind: BuildingKind,
) -> bool {
    let Some(required) = building_stats(kind).requires else {
        return true;
    };
    structures
        .into_iter()
        .any(|(&built, &owner, site)| built == required && owner == team && !site)
}

/// Request to lay down a construction site with its lower-left cell at `origin`.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOrder {
    pub team: Team,
    pub kind: BuildingKind,
    pub origin: GridCell,
}

/// Runs in `SimSet::Commands`.
fn apply_build_orders(
    mut orders: MessageReader<BuildOrder>,
    mut commands: Commands,
    mut counter: ResMut<SpawnCounter>,
    mut terrain: ResMut<Terrain>,
    mut ledgers: ResMut<Ledgers>,
    structures: Query<(&BuildingKind, &Team, Has<Construction>)>,
    nodes: Query<&Position, With<ResourceNode>>,
) {
    let reserved = node_cells(terrain.query(), &nodes);
    for &BuildOrder { team, kind, origin } in orders.read() {
        let prerequisite = prerequisite_met(&structures, team, kind);
        let placed = place_structure(
            &mut commands,
            &mut counter,
            terrain.query_mut(),
            &mut ledgers,
            team,
            kind,
            prerequisite,
            SiteSearch::exact(origin).avoiding(&reserved),
        );
        match placed {
            Ok(site) => debug!("{team:?} started {kind:?} ({site}) at {origin:?}"),
            Err(err) => debug!("{team:?} cannot build {kind:?} at {origin:?}: {err}"),
        }
    }
}

pub(super) fn plugin(app: &mut App) {
    app.add_message::<BuildOrder>();

    app.add_systems(Update, apply_build_orders.in_set(SimSet::Commands));
}
