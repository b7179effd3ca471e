//! Agents: unit presets, the behavioral state, and the spawn factory.

pub mod commands;
pub mod movement;
pub mod worker;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::Team;
use crate::combat::stealth::{AbilityCooldowns, Stealth};
use crate::combat::{Aerial, AttackCooldown, CombatStats, Health};
use crate::economy::{ResourceKind, Stockpile};
use crate::world::{BodyRadius, Position};
use movement::PathFollower;
use worker::Inventory;

// === Constants ===

/// Body radius of every agent.
pub const AGENT_RADIUS: f32 = 6.0;

// === Unit kinds ===

/// Marker for agent entities.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Agent;

/// Data-driven unit presets.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize,
)]
#[reflect(Component)]
pub enum UnitKind {
    /// Gathers, returns and builds. No weapon.
    Worker,
    /// Melee infantry.
    Warrior,
    /// Ranged, hits aerial targets.
    Archer,
    /// Aerial melee that hits other aerial targets.
    Hornet,
    /// Stealthed infiltrator with sabotage and steal abilities.
    Saboteur,
}

impl UnitKind {
    pub const ALL: &[Self] = &[
        Self::Worker,
        Self::Warrior,
        Self::Archer,
        Self::Hornet,
        Self::Saboteur,
    ];

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Worker => "Worker",
            Self::Warrior => "Warrior",
            Self::Archer => "Archer",
            Self::Hornet => "Hornet",
            Self::Saboteur => "Saboteur",
        }
    }
}

/// Weapon portion of a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    pub damage: f32,
    pub range: f32,
    pub cooldown_secs: f32,
    pub engagement_radius: f32,
    pub ranged: bool,
    pub hits_air: bool,
    pub auto_engage: bool,
}

/// Stats for a unit kind. All values are compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitStats {
    pub hp: f32,
    pub move_speed: f32,
    pub vision: f32,
    pub cost: Stockpile,
    pub train_secs: f32,
    /// Zero for units that cannot carry resources.
    pub carry_capacity: u32,
    pub weapon: Option<WeaponStats>,
    pub aerial: bool,
    pub stealth: bool,
}

/// Look up stats for a unit kind.
#[must_use]
pub const fn unit_stats(kind: UnitKind) -> UnitStats {
    match kind {
        UnitKind::Worker => UnitStats {
            hp: 60.0,
            move_speed: 60.0,
            vision: 160.0,
            cost: Stockpile::from_amounts(50, 0, 0, 0),
            train_secs: 8.0,
            carry_capacity: 20,
            weapon: None,
            aerial: false,
            stealth: false,
        },
        UnitKind::Warrior => UnitStats {
            hp: 100.0,
            move_speed: 55.0,
            vision: 200.0,
            cost: Stockpile::from_amounts(60, 0, 40, 0),
            train_secs: 10.0,
            carry_capacity: 0,
            weapon: Some(WeaponStats {
                damage: 15.0,
                range: 4.0,
                cooldown_secs: 1.5,
                engagement_radius: 160.0,
                ranged: false,
                hits_air: false,
                auto_engage: true,
            }),
            aerial: false,
            stealth: false,
        },
        UnitKind::Archer => UnitStats {
            hp: 70.0,
            move_speed: 55.0,
            vision: 240.0,
            cost: Stockpile::from_amounts(50, 0, 60, 0),
            train_secs: 12.0,
            carry_capacity: 0,
            weapon: Some(WeaponStats {
                damage: 10.0,
                range: 120.0,
                cooldown_secs: 2.0,
                engagement_radius: 200.0,
                ranged: true,
                hits_air: true,
                auto_engage: true,
            }),
            aerial: false,
            stealth: false,
        },
        UnitKind::Hornet => UnitStats {
            hp: 80.0,
            move_speed: 90.0,
            vision: 240.0,
            cost: Stockpile::from_amounts(80, 60, 20, 0),
            train_secs: 14.0,
            carry_capacity: 0,
            weapon: Some(WeaponStats {
                damage: 12.0,
                range: 6.0,
                cooldown_secs: 1.2,
                engagement_radius: 200.0,
                ranged: false,
                hits_air: true,
                auto_engage: true,
            }),
            aerial: true,
            stealth: false,
        },
        UnitKind::Saboteur => UnitStats {
            hp: 60.0,
            move_speed: 70.0,
            vision: 200.0,
            cost: Stockpile::from_amounts(70, 50, 30, 0),
            train_secs: 15.0,
            carry_capacity: 0,
            weapon: Some(WeaponStats {
                damage: 8.0,
                range: 4.0,
                cooldown_secs: 1.5,
                engagement_radius: 120.0,
                ranged: false,
                hits_air: false,
                auto_engage: false,
            }),
            aerial: false,
            stealth: true,
        },
    }
}

// === Behavioral state ===

/// What a move should turn into once the destination is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum MoveIntent {
    Gather {
        node: Entity,
        kind: ResourceKind,
    },
    Return {
        base: Option<Entity>,
        resume: Option<Entity>,
        kind: Option<ResourceKind>,
    },
    Construct {
        site: Entity,
    },
    /// Engage anything met on the way.
    AttackMove,
}

/// Per-agent behavior. Each variant carries exactly the fields that state needs,
/// so leaving a state drops its references.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Reflect)]
#[reflect(Component)]
pub enum AgentState {
    #[default]
    Idle,
    Moving {
        intent: Option<MoveIntent>,
    },
    Gathering {
        node: Entity,
        kind: ResourceKind,
        /// Seconds accumulated toward the next withdrawal.
        elapsed: f32,
    },
    Returning {
        base: Option<Entity>,
        resume: Option<Entity>,
        kind: Option<ResourceKind>,
    },
    Constructing {
        site: Entity,
    },
    Attacking {
        target: Entity,
        /// Set by an explicit `Engage` order.
        ordered: bool,
    },
}

impl AgentState {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Moving { .. } => "Moving",
            Self::Gathering { .. } => "Gathering",
            Self::Returning { .. } => "Returning",
            Self::Constructing { .. } => "Constructing",
            Self::Attacking { .. } => "Attacking",
        }
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The enemy an attacking agent is committed to.
    #[must_use]
    pub const fn attack_target(&self) -> Option<Entity> {
        match self {
            Self::Attacking { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Whether this agent is building or on its way to build.
    #[must_use]
    pub const fn is_constructing(&self) -> bool {
        matches!(
            self,
            Self::Constructing { .. }
                | Self::Moving {
                    intent: Some(MoveIntent::Construct { .. })
                }
        )
    }
}

// === Spawn order ===

/// Creation order. Agent updates that must be ordered use this, not query order.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect)]
#[reflect(Component)]
pub struct SpawnOrder(pub u64);

/// Hands out [`SpawnOrder`]s.
#[derive(Resource, Debug, Default)]
pub struct SpawnCounter(u64);

impl SpawnCounter {
    pub const fn issue(&mut self) -> SpawnOrder {
        self.0 += 1;
        SpawnOrder(self.0)
    }
}

/// Movement speed in world units per second.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Movement {
    pub speed: f32,
}

/// Sight radius.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Vision(pub f32);

/// Spawn an agent entity with the components its preset calls for.
/// Single source of truth for the agent archetype.
pub fn spawn_agent(
    commands: &mut Commands,
    counter: &mut SpawnCounter,
    kind: UnitKind,
    team: Team,
    position: Vec2,
) -> Entity {
    let stats = unit_stats(kind);
    let mut entity = commands.spawn((
        Name::new(format!("{team:?} {}", kind.display_name())),
        Agent,
        kind,
        team,
        counter.issue(),
        Position(position),
        BodyRadius(AGENT_RADIUS),
        Health::new(stats.hp),
        Movement {
            speed: stats.move_speed,
        },
        Vision(stats.vision),
        AgentState::Idle,
        PathFollower::default(),
    ));

    if stats.carry_capacity > 0 {
        entity.insert(Inventory::new(stats.carry_capacity));
    }
    if let Some(weapon) = stats.weapon {
        entity.insert((CombatStats::from(weapon), AttackCooldown::default()));
    }
    if stats.aerial {
        entity.insert(Aerial);
    }
    if stats.stealth {
        entity.insert((Stealth::default(), AbilityCooldowns::default()));
    }
    entity.id()
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Agent>()
        .register_type::<UnitKind>()
        .register_type::<AgentState>()
        .register_type::<SpawnOrder>()
        .register_type::<Movement>()
        .register_type::<Vision>()
        .init_resource::<SpawnCounter>();

    commands::plugin(app);
    movement::plugin(app);
    worker::plugin(app);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_presets_are_positive() {
        for &kind in UnitKind::ALL {
            let stats = unit_stats(kind);
            assert!(stats.hp > 0.0, "{kind:?}");
            assert!(stats.move_speed > 0.0, "{kind:?}");
            assert!(stats.train_secs > 0.0, "{kind:?}");
            assert!(!stats.cost.is_empty(), "{kind:?}");
        }
    }

    #[test]
    fn only_workers_carry_resources() {
        for &kind in UnitKind::ALL {
            let carries = unit_stats(kind).carry_capacity > 0;
            assert_eq!(carries, kind == UnitKind::Worker, "{kind:?}");
        }
    }

    #[test]
    fn warrior_cannot_hit_air_but_archer_can() {
        let warrior = unit_stats(UnitKind::Warrior).weapon.unwrap();
        let archer = unit_stats(UnitKind::Archer).weapon.unwrap();
        assert!(!warrior.hits_air);
        assert!(archer.hits_air && archer.ranged);
    }

    #[test]
    fn saboteur_is_stealthed_and_passive() {
        let stats = unit_stats(UnitKind::Saboteur);
        assert!(stats.stealth);
        assert!(!stats.weapon.unwrap().auto_engage);
    }

    #[test]
    fn state_labels() {
        assert_eq!(AgentState::Idle.label(), "Idle");
        assert_eq!(
            AgentState::Attacking {
                target: Entity::PLACEHOLDER,
                ordered: false,
            }
            .label(),
            "Attacking"
        );
        assert_eq!(
            AgentState::Attacking {
                target: Entity::PLACEHOLDER,
                ordered: false,
            }
            .attack_target(),
            Some(Entity::PLACEHOLDER)
        );
    }

    #[test]
    fn moving_to_build_counts_as_constructing() {
        let state = AgentState::Moving {
            intent: Some(MoveIntent::Construct {
                site: Entity::PLACEHOLDER,
            }),
        };
        assert!(state.is_constructing());
        assert!(!AgentState::Moving { intent: None }.is_constructing());
    }

    #[test]
    fn spawn_counter_is_monotonic() {
        let mut counter = SpawnCounter::default();
        let first = counter.issue();
        let second = counter.issue();
        assert!(first < second);
    }
}
