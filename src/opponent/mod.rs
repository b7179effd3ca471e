//! Rule-based opponent: a four-mode decision machine on a fixed interval,
//! plus economic, military and construction duties that issue the same
//! commands a player would.

mod economy;
mod expansion;
mod military;

use std::time::Duration;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::agents::{Agent, SpawnOrder};
use crate::combat::stealth::Stealth;
use crate::combat::{CombatStats, Damageable, Health};
use crate::config::OpponentConfig;
use crate::economy::Ledgers;
use crate::structures::construction::Construction;
use crate::structures::{BuildingKind, main_base};
use crate::world::Position;
use crate::{SimSet, Team};

// === Mode machine ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize)]
pub enum OpponentMode {
    #[default]
    Gathering,
    Building,
    Defending,
    Attacking,
}

/// Everything a mode transition depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeInputs {
    /// Food + water + sticks in the opponent's ledger.
    pub base_resources: u32,
    /// Live combat agents.
    pub army_size: usize,
    /// A live enemy agent is near the main base.
    pub threatened: bool,
}

/// The next mode. A threat always wins; otherwise each mode has its own exit.
#[must_use]
pub fn next_mode(
    current: OpponentMode,
    inputs: ModeInputs,
    config: &OpponentConfig,
) -> OpponentMode {
    if inputs.threatened {
        return OpponentMode::Defending;
    }
    match current {
        OpponentMode::Defending => OpponentMode::Gathering,
        OpponentMode::Gathering if inputs.base_resources > config.build_threshold => {
            OpponentMode::Building
        }
        OpponentMode::Building if inputs.army_size >= config.target_army => {
            OpponentMode::Attacking
        }
        OpponentMode::Building if inputs.base_resources < config.gather_threshold => {
            OpponentMode::Gathering
        }
        OpponentMode::Attacking if inputs.army_size == 0 => OpponentMode::Gathering,
        mode => mode,
    }
}

// === Resources ===

/// Controller state for the computer-controlled faction.
#[derive(Resource, Debug, Clone, Reflect)]
#[reflect(Resource)]
pub struct Opponent {
    pub team: Team,
    pub mode: OpponentMode,
    pub timer: Timer,
    /// Combat units queued so far; its parity picks the next unit kind.
    pub trained: u32,
}

impl Opponent {
    #[must_use]
    pub fn new(team: Team, decision_interval_secs: f32) -> Self {
        Self {
            team,
            mode: OpponentMode::default(),
            timer: Timer::from_seconds(decision_interval_secs, TimerMode::Repeating),
            trained: 0,
        }
    }
}

impl Default for Opponent {
    fn default() -> Self {
        Self::new(Team::Enemy, OpponentConfig::default().decision_interval_secs)
    }
}

/// Seeded generator for patrol points, so matches replay identically.
#[derive(Resource, Debug, Clone)]
pub struct SimRng {
    rng: StdRng,
    seed: u64,
}

impl SimRng {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform point in the disc of `radius` around `center`.
    pub fn point_within(&mut self, center: Vec2, radius: f32) -> Vec2 {
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let distance = radius * self.rng.random::<f32>().sqrt();
        center + Vec2::from_angle(angle) * distance
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::from_seed(OpponentConfig::default().seed)
    }
}

/// Shared lookup for the structures the opponent reasons about.
pub(crate) type StructureQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static BuildingKind,
        &'static Team,
        &'static SpawnOrder,
        &'static Position,
        Has<Construction>,
    ),
>;

/// Main base of `team` and where it stands.
pub(crate) fn base_of(structures: &StructureQuery, team: Team) -> Option<(Entity, Vec2)> {
    let base = main_base(
        structures
            .iter()
            .map(|(entity, kind, owner, order, _, site)| (entity, kind, owner, order, site)),
        team,
    )?;
    structures.get(base).ok().map(|(.., position, _)| (base, position.0))
}

// === Systems ===

/// Brings the controller in line with the current `OpponentConfig`: a new
/// interval applies to the running timer, a new seed restarts the generator.
/// Runs in `SimSet::Opponent`, before [`decide`].
fn apply_config(
    config: Res<OpponentConfig>,
    mut opponent: ResMut<Opponent>,
    mut rng: ResMut<SimRng>,
) {
    if !config.is_changed() {
        return;
    }
    match Duration::try_from_secs_f32(config.decision_interval_secs) {
        Ok(interval) if !interval.is_zero() => {
            if opponent.timer.duration() != interval {
                debug!("Opponent: deciding every {interval:?}");
                opponent.timer.set_duration(interval);
            }
        }
        _ => warn!(
            "Opponent: ignoring decision interval {}",
            config.decision_interval_secs
        ),
    }
    if rng.seed() != config.seed {
        debug!("Opponent: reseeding with {}", config.seed);
        *rng = SimRng::from_seed(config.seed);
    }
}

/// Advances the decision timer and, when due, re-evaluates the mode.
/// Runs in `SimSet::Opponent`.
fn decide(
    time: Res<Time>,
    config: Res<OpponentConfig>,
    ledgers: Res<Ledgers>,
    mut opponent: ResMut<Opponent>,
    structures: StructureQuery,
    agents: Query<
        (&Team, &Position, &Health, Has<CombatStats>, Option<&Stealth>),
        With<Agent>,
    >,
) {
    opponent.timer.tick(time.delta());
    if !opponent.timer.just_finished() {
        return;
    }
    let team = opponent.team;

    let army_size = agents
        .iter()
        .filter(|&(&owner, _, health, armed, _)| owner == team && armed && health.is_active())
        .count();
    let threatened = base_of(&structures, team).is_some_and(|(_, home)| {
        agents.iter().any(|(&owner, position, health, _, stealth)| {
            owner != team
                && health.is_active()
                && !stealth.is_some_and(Stealth::is_hidden)
                && position.distance(home) <= config.threat_radius
        })
    });
    let inputs = ModeInputs {
        base_resources: ledgers.get(team).base_total(),
        army_size,
        threatened,
    };

    let next = next_mode(opponent.mode, inputs, &config);
    if next != opponent.mode {
        info!("Opponent {:?} -> {next:?} ({inputs:?})", opponent.mode);
        opponent.mode = next;
    }
}

/// Run condition: a decision tick fired this frame.
fn decision_due(opponent: Res<Opponent>) -> bool {
    opponent.timer.just_finished()
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Opponent>()
        .init_resource::<Opponent>()
        .init_resource::<SimRng>();

    app.add_systems(
        Update,
        (
            apply_config,
            decide,
            (
                expansion::expand_base,
                economy::allocate_workers,
                economy::train_workers,
                military::train_forces,
                military::command_forces,
            )
                .chain()
                .run_if(decision_due),
        )
            .chain()
            .in_set(SimSet::Opponent),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn inputs(base_resources: u32, army_size: usize, threatened: bool) -> ModeInputs {
        ModeInputs {
            base_resources,
            army_size,
            threatened,
        }
    }

    #[test]
    fn crossing_the_build_threshold_starts_building() {
        let config = OpponentConfig::default();
        let mode = OpponentMode::Gathering;

        let mode = next_mode(mode, inputs(480, 0, false), &config);
        assert_eq!(mode, OpponentMode::Gathering);

        let mode = next_mode(mode, inputs(520, 0, false), &config);
        assert_eq!(mode, OpponentMode::Building);
    }

    #[test]
    fn threat_overrides_every_mode() {
        let config = OpponentConfig::default();
        for mode in [
            OpponentMode::Gathering,
            OpponentMode::Building,
            OpponentMode::Defending,
            OpponentMode::Attacking,
        ] {
            assert_eq!(
                next_mode(mode, inputs(900, 10, true), &config),
                OpponentMode::Defending
            );
        }
    }

    #[test]
    fn defending_relaxes_to_gathering() {
        let config = OpponentConfig::default();
        assert_eq!(
            next_mode(OpponentMode::Defending, inputs(900, 10, false), &config),
            OpponentMode::Gathering
        );
    }

    #[test]
    fn building_exits() {
        let config = OpponentConfig::default();
        assert_eq!(
            next_mode(OpponentMode::Building, inputs(300, 6, false), &config),
            OpponentMode::Attacking
        );
        assert_eq!(
            next_mode(OpponentMode::Building, inputs(150, 2, false), &config),
            OpponentMode::Gathering
        );
        assert_eq!(
            next_mode(OpponentMode::Building, inputs(300, 2, false), &config),
            OpponentMode::Building
        );
    }

    #[test]
    fn army_wiped_out_ends_the_attack() {
        let config = OpponentConfig::default();
        assert_eq!(
            next_mode(OpponentMode::Attacking, inputs(900, 1, false), &config),
            OpponentMode::Attacking
        );
        assert_eq!(
            next_mode(OpponentMode::Attacking, inputs(900, 0, false), &config),
            OpponentMode::Gathering
        );
    }

    #[test]
    fn same_inputs_same_transition() {
        let config = OpponentConfig::default();
        let first = next_mode(OpponentMode::Gathering, inputs(700, 3, false), &config);
        let second = next_mode(OpponentMode::Gathering, inputs(700, 3, false), &config);
        assert_eq!(first, second);
    }

    #[test]
    fn patrol_points_are_seeded_and_bounded() {
        let mut first = SimRng::from_seed(7);
        let mut second = SimRng::from_seed(7);
        for _ in 0..16 {
            let a = first.point_within(Vec2::new(100.0, 100.0), 50.0);
            let b = second.point_within(Vec2::new(100.0, 100.0), 50.0);
            assert_eq!(a, b);
            assert!(a.distance(Vec2::new(100.0, 100.0)) <= 50.0 + 1e-3);
        }
    }
}
