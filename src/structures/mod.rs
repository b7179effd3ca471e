//! Structures: building presets, footprints, capabilities and the spawn factory.

pub mod construction;
pub mod placement;
pub mod production;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agents::{SpawnCounter, SpawnOrder, UnitKind};
use crate::combat::Health;
use crate::economy::Stockpile;
use crate::world::{
    BodyRadius, CELL_SIZE, GridCell, Position, WorldQuery, footprint_cells, footprint_center,
};
use crate::{SimSet, Team};
use construction::Construction;
use production::TrainingQueue;

// === Constants ===

/// Share of maximum health a fresh construction site starts with.
pub const SITE_HEALTH_SHARE: f32 = 0.1;

// === Building kinds ===

/// Marker for structure entities.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Building;

/// Data-driven building presets.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize,
)]
#[reflect(Component)]
pub enum BuildingKind {
    /// Main base: storage, trains workers, detects stealth.
    Hive,
    Storehouse,
    /// Trains warriors, archers and saboteurs.
    Barracks,
    Watchtower,
    /// Trains hornets. Needs a barracks first.
    Aerie,
}

impl BuildingKind {
    pub const ALL: &[Self] = &[
        Self::Hive,
        Self::Storehouse,
        Self::Barracks,
        Self::Watchtower,
        Self::Aerie,
    ];
}

/// Stats for a building kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingStats {
    pub hp: f32,
    /// Side length of the square footprint, in cells.
    pub footprint: i32,
    pub cost: Stockpile,
    /// Accepts worker deposits.
    pub storage: bool,
    /// Stealth detection radius; zero for non-detectors.
    pub detector_radius: f32,
    pub trains: &'static [UnitKind],
    /// Another complete building of this kind must stand before placement.
    pub requires: Option<BuildingKind>,
}

#[must_use]
pub const fn building_stats(kind: BuildingKind) -> BuildingStats {
    match kind {
        BuildingKind::Hive => BuildingStats {
            hp: 1000.0,
            footprint: 3,
            cost: Stockpile::from_amounts(300, 100, 300, 50),
            storage: true,
            detector_radius: 160.0,
            trains: &[UnitKind::Worker],
            requires: None,
        },
        BuildingKind::Storehouse => BuildingStats {
            hp: 400.0,
            footprint: 2,
            cost: Stockpile::from_amounts(0, 0, 100, 0),
            storage: true,
            detector_radius: 0.0,
            trains: &[],
            requires: None,
        },
        BuildingKind::Barracks => BuildingStats {
            hp: 600.0,
            footprint: 3,
            cost: Stockpile::from_amounts(50, 0, 150, 0),
            storage: false,
            detector_radius: 0.0,
            trains: &[UnitKind::Warrior, UnitKind::Archer, UnitKind::Saboteur],
            requires: None,
        },
        BuildingKind::Watchtower => BuildingStats {
            hp: 300.0,
            footprint: 1,
            cost: Stockpile::from_amounts(0, 20, 80, 0),
            storage: false,
            detector_radius: 240.0,
            trains: &[],
            requires: None,
        },
        BuildingKind::Aerie => BuildingStats {
            hp: 500.0,
            footprint: 3,
            cost: Stockpile::from_amounts(100, 50, 120, 0),
            storage: false,
            detector_radius: 0.0,
            trains: &[UnitKind::Hornet],
            requires: Some(BuildingKind::Barracks),
        },
    }
}

// === Components ===

/// Grid cells a structure covers and blocks.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Footprint {
    pub origin: GridCell,
    pub size: i32,
}

impl Footprint {
    #[must_use]
    pub fn cells(&self) -> Vec<GridCell> {
        footprint_cells(self.origin, self.size)
    }
}

/// Accepts worker deposits once complete.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Storage;

/// Reveals stealthed enemies within `radius` once complete.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Detector {
    pub radius: f32,
}

/// Sabotage effect: training pauses and detection is suppressed.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Disabled {
    pub remaining: f32,
}

/// Spawns a structure and blocks its footprint. Sites start at reduced health
/// with a [`Construction`] component; complete structures start at full health.
pub fn spawn_structure(
    commands: &mut Commands,
    counter: &mut SpawnCounter,
    world: &mut dyn WorldQuery,
    kind: BuildingKind,
    team: Team,
    origin: GridCell,
    complete: bool,
) -> Entity {
    let stats = building_stats(kind);
    let footprint = Footprint {
        origin,
        size: stats.footprint,
    };
    world.set_occupied(&footprint.cells(), true);

    let mut health = Health::new(stats.hp);
    if !complete {
        health.current = stats.hp * SITE_HEALTH_SHARE;
    }

    let mut entity = commands.spawn((
        Name::new(format!("{team:?} {kind:?}")),
        Building,
        kind,
        team,
        counter.issue(),
        footprint,
        Position(footprint_center(world, origin, stats.footprint)),
        BodyRadius(stats.footprint as f32 * CELL_SIZE / 2.0),
        health,
    ));

    if !complete {
        entity.insert(Construction::default());
    }
    if stats.storage {
        entity.insert(Storage);
    }
    if stats.detector_radius > 0.0 {
        entity.insert(Detector {
            radius: stats.detector_radius,
        });
    }
    if !stats.trains.is_empty() {
        entity.insert(TrainingQueue::default());
    }
    debug!("Spawned {team:?} {kind:?} at {origin:?} (complete: {complete})");
    entity.id()
}

/// A faction's main base: its oldest complete hive. The flag marks sites.
pub fn main_base<'a>(
    structures: impl IntoIterator<
        Item = (Entity, &'a BuildingKind, &'a Team, &'a SpawnOrder, bool),
    >,
    team: Team,
) -> Option<Entity> {
    structures
        .into_iter()
        .filter(|&(_, &kind, &owner, _, site)| kind == BuildingKind::Hive && owner == team && !site)
        .min_by_key(|&(_, _, _, &order, _)| order)
        .map(|(entity, ..)| entity)
}

// === Systems ===

/// Counts down sabotage effects.
/// Runs in `SimSet::Production`.
fn tick_disabled(
    time: Res<Time>,
    mut commands: Commands,
    mut disabled: Query<(Entity, &mut Disabled)>,
) {
    let dt = time.delta_secs();
    for (entity, mut effect) in &mut disabled {
        effect.remaining -= dt;
        if effect.remaining <= 0.0 {
            debug!("Structure {entity} back online");
            commands.entity(entity).try_remove::<Disabled>();
        }
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Building>()
        .register_type::<BuildingKind>()
        .register_type::<Footprint>()
        .register_type::<Storage>()
        .register_type::<Detector>()
        .register_type::<Disabled>();

    app.add_systems(Update, tick_disabled.in_set(SimSet::Production));

    construction::plugin(app);
    production::plugin(app);
    placement::plugin(app);
}
