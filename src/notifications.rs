//! Fire-and-forget notices for presentation, audio and UI layers.
//!
//! The simulation writes these and never reads them back.

use bevy::prelude::*;

use crate::Team;
use crate::agents::UnitKind;
use crate::economy::Stockpile;
use crate::structures::BuildingKind;

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructionCompleted {
    pub structure: Entity,
    pub kind: BuildingKind,
    pub team: Team,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitTrained {
    pub agent: Entity,
    pub kind: UnitKind,
    pub team: Team,
    /// The structure that trained it.
    pub building: Entity,
}

/// What was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casualty {
    Unit(UnitKind),
    Structure(BuildingKind),
}

/// An agent or structure was destroyed. The entity is already gone when this is read.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDestroyed {
    pub entity: Entity,
    pub team: Team,
    pub what: Casualty,
}

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct SabotageApplied {
    pub agent: Entity,
    pub structure: Entity,
    /// The saboteur's faction.
    pub team: Team,
    pub duration: f32,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcesStolen {
    pub agent: Entity,
    pub structure: Entity,
    pub thief: Team,
    pub victim: Team,
    pub amounts: Stockpile,
}

pub(super) fn plugin(app: &mut App) {
    app.add_message::<ConstructionCompleted>()
        .add_message::<UnitTrained>()
        .add_message::<UnitDestroyed>()
        .add_message::<SabotageApplied>()
        .add_message::<ResourcesStolen>();
}
