//! Combat: health, targeting, and the engagement protocol shared by every armed agent.

pub mod attack;
pub mod death;
pub mod stealth;

use bevy::prelude::*;

use crate::agents::movement::{PathFollower, enter_idle};
use crate::agents::{Agent, AgentState, MoveIntent, SpawnOrder, WeaponStats};
use crate::world::pathfinding::PathService;
use crate::world::{BodyRadius, Position, surface_distance};
use crate::{SimSet, Team};
pub use attack::AttackCooldown;
use stealth::Stealth;

// === Constants ===

/// Chase radius as a multiple of the engagement radius.
pub const CHASE_FACTOR: f32 = 1.5;

// === Components ===

#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    #[must_use]
    pub const fn new(max: f32) -> Self {
        Self { current: max, max }
    }
}

/// Anything that can be attacked: agents and structures alike.
pub trait Damageable {
    fn current(&self) -> f32;

    fn maximum(&self) -> f32;

    /// Applies a hit. Returns true when this hit destroyed the target.
    /// Hits on something already destroyed do nothing.
    fn take_damage(&mut self, amount: f32) -> bool;

    /// Destroyed things stay inactive until removed at the end of the tick.
    fn is_active(&self) -> bool {
        self.current() > 0.0
    }
}

impl Damageable for Health {
    fn current(&self) -> f32 {
        self.current
    }

    fn maximum(&self) -> f32 {
        self.max
    }

    fn take_damage(&mut self, amount: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        self.current -= amount;
        !self.is_active()
    }
}

/// Weapon of a combat-capable agent.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct CombatStats {
    pub damage: f32,
    /// Surface-to-surface reach.
    pub range: f32,
    pub cooldown_secs: f32,
    /// Idle agents auto-engage enemies within this radius.
    pub engagement_radius: f32,
    /// Damage lands on projectile arrival instead of immediately.
    pub ranged: bool,
    pub hits_air: bool,
    pub auto_engage: bool,
}

impl CombatStats {
    /// Targets beyond this are abandoned, ordered or not.
    #[must_use]
    pub fn chase_radius(&self) -> f32 {
        self.engagement_radius * CHASE_FACTOR
    }

    #[must_use]
    pub const fn can_hit(&self, aerial: bool) -> bool {
        !aerial || self.hits_air
    }
}

impl From<WeaponStats> for CombatStats {
    fn from(weapon: WeaponStats) -> Self {
        Self {
            damage: weapon.damage,
            range: weapon.range,
            cooldown_secs: weapon.cooldown_secs,
            engagement_radius: weapon.engagement_radius,
            ranged: weapon.ranged,
            hits_air: weapon.hits_air,
            auto_engage: weapon.auto_engage,
        }
    }
}

/// Flies: ignores terrain and can only be hit by anti-air weapons.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Aerial;

// === Target validation ===

/// What it takes to judge whether an entity can be attacked.
pub type TargetQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static Team,
        &'static Health,
        Has<Aerial>,
        Option<&'static Stealth>,
    ),
>;

/// Live, hostile, visible, and reachable by this weapon.
pub fn is_valid_target(
    targets: &TargetQuery,
    target: Entity,
    team: Team,
    combat: &CombatStats,
) -> bool {
    targets
        .get(target)
        .is_ok_and(|(&owner, health, aerial, stealth)| {
            owner != team
                && health.is_active()
                && !stealth.is_some_and(Stealth::is_hidden)
                && combat.can_hit(aerial)
        })
}

/// One attackable entity, as seen by the nearest-enemy scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub entity: Entity,
    pub team: Team,
    pub position: Vec2,
    pub radius: f32,
    pub aerial: bool,
}

/// Nearest contact of the opposing faction this weapon can hit, within
/// `max_radius` (surface distance). Ties keep the first contact in the slice.
#[must_use]
pub fn nearest_enemy(
    contacts: &[Contact],
    team: Team,
    from: Vec2,
    radius: f32,
    combat: &CombatStats,
    max_radius: f32,
) -> Option<Entity> {
    let mut best: Option<(Entity, f32)> = None;
    for contact in contacts {
        if contact.team == team || !combat.can_hit(contact.aerial) {
            continue;
        }
        let gap = surface_distance(from, radius, contact.position, contact.radius);
        if gap > max_radius {
            continue;
        }
        if best.is_none_or(|(_, closest)| gap < closest) {
            best = Some((contact.entity, gap));
        }
    }
    best.map(|(entity, _)| entity)
}

// === Systems ===

/// Idle and attack-moving agents pick up enemies; attacking agents re-check
/// theirs, re-target when it is gone, and give up when it runs too far.
/// Runs in `SimSet::Targeting`.
fn acquire_targets(
    mut paths: ResMut<PathService>,
    mut attackers: Query<
        (
            Entity,
            &Team,
            &Position,
            &BodyRadius,
            &CombatStats,
            &mut AgentState,
            &mut PathFollower,
        ),
        With<Agent>,
    >,
    candidates: Query<(
        Entity,
        &SpawnOrder,
        &Team,
        &Position,
        &BodyRadius,
        &Health,
        Has<Aerial>,
        Option<&Stealth>,
    )>,
) {
    let mut roster: Vec<(SpawnOrder, Contact)> = candidates
        .iter()
        .filter(|(.., health, _, stealth)| {
            health.is_active() && !stealth.is_some_and(Stealth::is_hidden)
        })
        .map(|(entity, &order, &team, position, radius, _, aerial, _)| {
            (
                order,
                Contact {
                    entity,
                    team,
                    position: position.0,
                    radius: radius.0,
                    aerial,
                },
            )
        })
        .collect();
    roster.sort_by_key(|&(order, _)| order);
    let contacts: Vec<Contact> = roster.into_iter().map(|(_, contact)| contact).collect();

    for (entity, &team, position, radius, combat, mut state, mut follower) in &mut attackers {
        let scan = |max_radius: f32| {
            nearest_enemy(&contacts, team, position.0, radius.0, combat, max_radius)
        };
        match *state {
            AgentState::Idle if combat.auto_engage => {
                if let Some(target) = scan(combat.engagement_radius) {
                    debug!("Agent {entity}: engaging {target}");
                    *state = AgentState::Attacking {
                        target,
                        ordered: false,
                    };
                }
            }
            AgentState::Moving {
                intent: Some(MoveIntent::AttackMove),
            } => {
                if let Some(target) = scan(combat.engagement_radius) {
                    debug!("Agent {entity}: engaging {target} en route");
                    follower.reset(&mut paths);
                    *state = AgentState::Attacking {
                        target,
                        ordered: false,
                    };
                }
            }
            AgentState::Attacking { target, .. } => {
                let current = contacts
                    .iter()
                    .find(|contact| contact.entity == target)
                    .filter(|contact| contact.team != team && combat.can_hit(contact.aerial));
                match current {
                    Some(contact) => {
                        let gap = surface_distance(
                            position.0,
                            radius.0,
                            contact.position,
                            contact.radius,
                        );
                        if gap > combat.chase_radius() {
                            debug!("Agent {entity}: {target} out of chase range");
                            enter_idle(&mut state, &mut follower, &mut paths);
                        }
                    }
                    None => {
                        enter_idle(&mut state, &mut follower, &mut paths);
                        if let Some(next) = scan(combat.engagement_radius) {
                            debug!("Agent {entity}: {target} gone, switching to {next}");
                            *state = AgentState::Attacking {
                                target: next,
                                ordered: false,
                            };
                        } else {
                            debug!("Agent {entity}: {target} gone, standing down");
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Health>()
        .register_type::<CombatStats>()
        .register_type::<Aerial>();

    app.add_systems(Update, acquire_targets.in_set(SimSet::Targeting));

    attack::plugin(app);
    death::plugin(app);
    stealth::plugin(app);
}
