//! Stealth, detection, and the saboteur's special abilities.
//!
//! A stealthed agent is invisible to opposing targeting and threat checks.
//! Attacking or using an ability reveals it for a grace period; so does a
//! periodic sweep that finds a live opposing agent or a working detector nearby.

use bevy::prelude::*;
use thiserror::Error;

use super::Health;
use crate::agents::Agent;
use crate::config::{SimConfig, StealthConfig};
use crate::economy::{Ledgers, ResourceKind, Stockpile};
use crate::notifications::{ResourcesStolen, SabotageApplied};
use crate::structures::construction::Construction;
use crate::structures::{Building, Detector, Disabled, Storage};
use crate::world::{BodyRadius, Position, surface_distance};
use crate::{SimSet, Team};

// === Components ===

#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Stealth {
    hidden: bool,
    /// Seconds left before a revealed agent hides again.
    reveal_timer: f32,
    /// Seconds until the next detection sweep.
    check_timer: f32,
}

impl Default for Stealth {
    fn default() -> Self {
        Self {
            hidden: true,
            reveal_timer: 0.0,
            check_timer: 0.0,
        }
    }
}

impl Stealth {
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Breaks stealth and restarts the grace period.
    pub const fn reveal(&mut self, grace_secs: f32) {
        self.hidden = false;
        self.reveal_timer = grace_secs;
    }

    /// Counts down the grace period. Returns true when stealth is re-entered.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.reveal_timer = (self.reveal_timer - dt).max(0.0);
        if !self.hidden && self.reveal_timer <= 0.0 {
            self.hidden = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum Ability {
    /// Disables a structure for a while.
    Sabotage,
    /// Moves resources from the victim's ledger to the thief's.
    Steal,
}

/// Independent cooldowns for each ability; zero means ready.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct AbilityCooldowns {
    pub sabotage: f32,
    pub steal: f32,
}

impl AbilityCooldowns {
    #[must_use]
    pub const fn remaining(&self, ability: Ability) -> f32 {
        match ability {
            Ability::Sabotage => self.sabotage,
            Ability::Steal => self.steal,
        }
    }

    fn start(&mut self, ability: Ability, config: &StealthConfig) {
        match ability {
            Ability::Sabotage => self.sabotage = config.sabotage_cooldown_secs,
            Ability::Steal => self.steal = config.steal_cooldown_secs,
        }
    }

    fn tick(&mut self, dt: f32) {
        self.sabotage = (self.sabotage - dt).max(0.0);
        self.steal = (self.steal - dt).max(0.0);
    }
}

// === Ability commands ===

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityCommand {
    pub agent: Entity,
    pub ability: Ability,
    /// The structure to act on.
    pub target: Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum AbilityError {
    #[error("agent has no special abilities")]
    NotStealthCapable,
    #[error("{ability:?} ready in {remaining:.1}s")]
    OnCooldown { ability: Ability, remaining: f32 },
    #[error("target is {gap:.0} away, range is {range:.0}")]
    OutOfRange { gap: f32, range: f32 },
    #[error("cannot target own faction")]
    OwnFaction,
    #[error("target is not a live structure")]
    InvalidTarget,
    #[error("target does not store resources")]
    NotStorage,
    #[error("target is still under construction")]
    UnderConstruction,
}

/// What an ability check needs to know about the target structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityTarget {
    pub team: Team,
    /// Surface distance from the acting agent.
    pub gap: f32,
    pub storage: bool,
    pub site: bool,
}

/// Faction, target type, range, then cooldown.
pub fn validate_ability(
    ability: Ability,
    team: Team,
    cooldowns: &AbilityCooldowns,
    target: &AbilityTarget,
    config: &StealthConfig,
) -> Result<(), AbilityError> {
    if target.team == team {
        return Err(AbilityError::OwnFaction);
    }
    let range = match ability {
        Ability::Sabotage => config.sabotage_range,
        Ability::Steal => {
            if !target.storage {
                return Err(AbilityError::NotStorage);
            }
            if target.site {
                return Err(AbilityError::UnderConstruction);
            }
            config.steal_range
        }
    };
    if target.gap > range {
        return Err(AbilityError::OutOfRange {
            gap: target.gap,
            range,
        });
    }
    let remaining = cooldowns.remaining(ability);
    if remaining > 0.0 {
        return Err(AbilityError::OnCooldown { ability, remaining });
    }
    Ok(())
}

/// Takes up to `cap` of every kind from `victim` and credits it to `thief`.
pub fn steal_resources(ledgers: &mut Ledgers, thief: Team, victim: Team, cap: u32) -> Stockpile {
    let mut stolen = Stockpile::EMPTY;
    for kind in ResourceKind::ALL {
        let taken = ledgers.remove(victim, kind, cap);
        stolen.add(kind, taken);
    }
    ledgers.deposit(thief, &stolen);
    stolen
}

// === Systems ===

/// Grace countdown, periodic detection sweeps and ability cooldowns.
/// Runs in `SimSet::Abilities`.
fn update_stealth(
    time: Res<Time>,
    config: Res<SimConfig>,
    mut stealthy: Query<(
        Entity,
        &Team,
        &Position,
        &mut Stealth,
        Option<&mut AbilityCooldowns>,
    )>,
    observers: Query<(&Team, &Position, &Health), With<Agent>>,
    detectors: Query<
        (&Team, &Position, &Detector, &Health),
        (Without<Construction>, Without<Disabled>),
    >,
) {
    let dt = time.delta_secs();
    let settings = &config.stealth;
    for (entity, &team, position, mut stealth, cooldowns) in &mut stealthy {
        if let Some(mut cooldowns) = cooldowns {
            cooldowns.tick(dt);
        }

        stealth.check_timer -= dt;
        if stealth.check_timer <= 0.0 {
            stealth.check_timer += settings.detection_interval_secs;
            let spotted_by_agent = observers.iter().any(|(&owner, observer, health)| {
                owner != team
                    && health.current > 0.0
                    && observer.distance(position.0) <= settings.detection_radius
            });
            let spotted_by_structure = detectors.iter().any(|(&owner, tower, detector, health)| {
                owner != team
                    && health.current > 0.0
                    && tower.distance(position.0) <= detector.radius
            });
            if spotted_by_agent || spotted_by_structure {
                if stealth.is_hidden() {
                    debug!("Agent {entity} detected");
                }
                stealth.reveal(settings.reveal_grace_secs);
                continue;
            }
        }

        if stealth.tick(dt) {
            debug!("Agent {entity} back in stealth");
        }
    }
}

/// Validates and carries out sabotage and steal requests.
/// Runs in `SimSet::Abilities`, after [`update_stealth`].
fn apply_ability_commands(
    mut requests: MessageReader<AbilityCommand>,
    config: Res<SimConfig>,
    mut ledgers: ResMut<Ledgers>,
    mut commands: Commands,
    mut sabotaged: MessageWriter<SabotageApplied>,
    mut stolen: MessageWriter<ResourcesStolen>,
    mut agents: Query<
        (
            &Team,
            &Position,
            &BodyRadius,
            &Health,
            Option<&mut Stealth>,
            Option<&mut AbilityCooldowns>,
        ),
        With<Agent>,
    >,
    structures: Query<
        (
            &Team,
            &Position,
            &BodyRadius,
            &Health,
            Has<Storage>,
            Has<Construction>,
        ),
        With<Building>,
    >,
) {
    let settings = &config.stealth;
    for &AbilityCommand {
        agent,
        ability,
        target,
    } in requests.read()
    {
        let Ok((&team, position, radius, health, stealth, cooldowns)) = agents.get_mut(agent)
        else {
            debug!("{ability:?} for missing agent {agent} dropped");
            continue;
        };
        if health.current <= 0.0 {
            continue;
        }
        let (Some(mut stealth), Some(mut cooldowns)) = (stealth, cooldowns) else {
            debug!("Agent {agent}: {}", AbilityError::NotStealthCapable);
            continue;
        };
        let Some(target_info) = structures
            .get(target)
            .ok()
            .filter(|(.., health, _, _)| health.current > 0.0)
            .map(|(&owner, target_pos, target_radius, _, storage, site)| AbilityTarget {
                team: owner,
                gap: surface_distance(position.0, radius.0, target_pos.0, target_radius.0),
                storage,
                site,
            })
        else {
            debug!("Agent {agent}: {}", AbilityError::InvalidTarget);
            continue;
        };
        if let Err(err) = validate_ability(ability, team, &cooldowns, &target_info, settings) {
            debug!("Agent {agent}: {ability:?} on {target} refused: {err}");
            continue;
        }

        cooldowns.start(ability, settings);
        stealth.reveal(settings.reveal_grace_secs);
        match ability {
            Ability::Sabotage => {
                let duration = settings.sabotage_duration_secs;
                commands
                    .entity(target)
                    .try_insert(Disabled { remaining: duration });
                info!("{team:?} saboteur disabled {target} for {duration}s");
                sabotaged.write(SabotageApplied {
                    agent,
                    structure: target,
                    team,
                    duration,
                });
            }
            Ability::Steal => {
                let victim = target_info.team;
                let amounts = steal_resources(&mut ledgers, team, victim, settings.steal_cap);
                info!("{team:?} saboteur stole {amounts:?} from {victim:?}");
                stolen.write(ResourcesStolen {
                    agent,
                    structure: target,
                    thief: team,
                    victim,
                    amounts,
                });
            }
        }
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Stealth>()
        .register_type::<AbilityCooldowns>()
        .add_message::<AbilityCommand>();

    app.add_systems(
        Update,
        (update_stealth, apply_ability_commands)
            .chain()
            .in_set(SimSet::Abilities),
    );
}
