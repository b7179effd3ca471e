//! Headless RTS agent simulation: unit behavior, combat, and a rule-based opponent.
//!
//! Add [`plugin`] to any Bevy `App`. One `App::update()` is one simulation tick.

pub mod agents;
pub mod combat;
pub mod config;
pub mod economy;
pub mod notifications;
pub mod opponent;
pub mod snapshot;
pub mod structures;
#[cfg(test)]
pub mod testing;
pub mod world;

use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use serde::{Deserialize, Serialize};

/// Top-level simulation state.
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimState {
    /// Agents and the opponent advance every tick.
    #[default]
    Running,
    /// Nothing advances.
    Paused,
}

/// Ordered phases of one simulation tick.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSet {
    /// Opponent decision tick (issues commands like a player would).
    Opponent,
    /// Player/opponent commands are applied to agents and structures.
    Commands,
    /// Path results are handed to the agents that asked for them.
    Paths,
    /// Combat agents validate or acquire targets.
    Targeting,
    /// Path following, stuck and timeout recovery.
    Movement,
    /// Worker gather/return/construct cycle.
    Tasks,
    /// Attacks and projectile resolution.
    Combat,
    /// Stealth detection and special abilities.
    Abilities,
    /// Training queues, construction completion, status effects.
    Production,
    /// Destroyed entities are removed.
    Death,
}

/// The two simulated factions.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize,
)]
#[reflect(Component)]
pub enum Team {
    Player,
    Enemy,
}

impl Team {
    pub const ALL: [Self; 2] = [Self::Player, Self::Enemy];

    /// The other faction.
    #[must_use]
    pub const fn opposing(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }
}

/// Run condition: true while the simulation is not paused.
pub fn sim_running(state: Option<Res<State<SimState>>>) -> bool {
    state.is_some_and(|s| *s.get() == SimState::Running)
}

/// Registers the whole simulation on an app.
pub fn plugin(app: &mut App) {
    if !app.is_plugin_added::<StatesPlugin>() {
        app.add_plugins(StatesPlugin);
    }
    app.init_state::<SimState>();
    app.register_type::<Team>();

    app.configure_sets(
        Update,
        (
            SimSet::Opponent,
            SimSet::Commands,
            SimSet::Paths,
            SimSet::Targeting,
            SimSet::Movement,
            SimSet::Tasks,
            SimSet::Combat,
            SimSet::Abilities,
            SimSet::Production,
            SimSet::Death,
        )
            .chain()
            .run_if(sim_running),
    );

    app.add_plugins((
        config::plugin,
        notifications::plugin,
        world::plugin,
        economy::plugin,
        agents::plugin,
        structures::plugin,
        combat::plugin,
        opponent::plugin,
    ));
}
