//! Unit training: queues, costs paid up front, and spawning next to the structure.

use std::collections::VecDeque;

use bevy::prelude::*;
use thiserror::Error;

use super::construction::Construction;
use super::{BuildingKind, Disabled, Footprint, building_stats};
use crate::agents::{SpawnCounter, UnitKind, spawn_agent, unit_stats};
use crate::economy::{EconomyError, Ledgers};
use crate::notifications::UnitTrained;
use crate::world::{Position, Terrain, approach_cell};
use crate::{SimSet, Team};

/// Most units a structure can have waiting.
pub const QUEUE_CAP: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrainError {
    #[error("structure is still under construction")]
    Incomplete,
    #[error("{building:?} cannot train {unit:?}")]
    CannotTrain {
        building: BuildingKind,
        unit: UnitKind,
    },
    #[error("training queue is full")]
    QueueFull,
    #[error(transparent)]
    Economy(#[from] EconomyError),
}

/// Units waiting to be trained, front first.
#[derive(Component, Debug, Clone, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct TrainingQueue {
    pub queue: VecDeque<UnitKind>,
    /// Seconds spent on the front unit.
    pub elapsed: f32,
}

impl TrainingQueue {
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Checks the structure and pays for `unit`, then queues it.
/// Nothing is deducted when any check fails.
pub fn enqueue_training(
    ledgers: &mut Ledgers,
    team: Team,
    building: BuildingKind,
    complete: bool,
    queue: &mut TrainingQueue,
    unit: UnitKind,
) -> Result<(), TrainError> {
    if !complete {
        return Err(TrainError::Incomplete);
    }
    if !building_stats(building).trains.contains(&unit) {
        return Err(TrainError::CannotTrain { building, unit });
    }
    if queue.len() >= QUEUE_CAP {
        return Err(TrainError::QueueFull);
    }
    ledgers.spend(team, &unit_stats(unit).cost)?;
    queue.queue.push_back(unit);
    Ok(())
}

/// Request to train one unit at a structure.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainOrder {
    pub building: Entity,
    pub unit: UnitKind,
}

// === Systems ===

/// Runs in `SimSet::Commands`.
fn apply_train_orders(
    mut orders: MessageReader<TrainOrder>,
    mut ledgers: ResMut<Ledgers>,
    mut structures: Query<(&BuildingKind, &Team, &mut TrainingQueue, Has<Construction>)>,
) {
    for &TrainOrder { building, unit } in orders.read() {
        let Ok((&kind, &team, mut queue, site)) = structures.get_mut(building) else {
            debug!("Train order for missing structure {building} dropped");
            continue;
        };
        match enqueue_training(&mut ledgers, team, kind, !site, &mut queue, unit) {
            Ok(()) => debug!("{team:?} {kind:?} queued {unit:?}"),
            Err(err) => debug!("{team:?} {kind:?} cannot queue {unit:?}: {err}"),
        }
    }
}

/// Advances the front of every working queue and spawns finished units.
/// Runs in `SimSet::Production`.
fn tick_training(
    time: Res<Time>,
    terrain: Res<Terrain>,
    mut counter: ResMut<SpawnCounter>,
    mut commands: Commands,
    mut trained: MessageWriter<UnitTrained>,
    mut structures: Query<
        (Entity, &Team, &Footprint, &Position, &mut TrainingQueue),
        (Without<Construction>, Without<Disabled>),
    >,
) {
    let dt = time.delta_secs();
    for (building, &team, footprint, position, mut queue) in &mut structures {
        let Some(&unit) = queue.queue.front() else {
            continue;
        };
        queue.elapsed += dt;
        if queue.elapsed < unit_stats(unit).train_secs {
            continue;
        }
        queue.queue.pop_front();
        queue.elapsed = 0.0;

        let world = terrain.query();
        let center = world.world_to_grid(position.0);
        let spawn_at = approach_cell(world, center, footprint.origin.offset(-1, -1))
            .map_or(position.0, |cell| world.grid_to_world_center(cell));
        let agent = spawn_agent(&mut commands, &mut counter, unit, team, spawn_at);
        info!("{team:?} trained {unit:?}");
        trained.write(UnitTrained {
            agent,
            kind: unit,
            team,
            building,
        });
    }
}

pub(super) fn plugin(app: &mut App) {
    app.register_type::<TrainingQueue>()
        .add_message::<TrainOrder>();

    app.add_systems(Update, apply_train_orders.in_set(SimSet::Commands));
    app.add_systems(Update, tick_training.in_set(SimSet::Production));
}
