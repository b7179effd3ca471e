//! Attack cadence, melee hits and two-phase ranged projectiles.

use bevy::prelude::*;

use super::stealth::Stealth;
use super::{Aerial, CombatStats, Damageable, Health};
use crate::agents::movement::{Mover, Nav, PathFollower};
use crate::agents::{Agent, AgentState, SpawnOrder};
use crate::config::SimConfig;
use crate::world::pathfinding::PathService;
use crate::world::{BodyRadius, Position, Terrain, surface_distance};
use crate::{SimSet, Team};

// === Components ===

/// Seconds until the next attack; zero means ready.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct AttackCooldown(pub f32);

impl AttackCooldown {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0 <= 0.0
    }
}

/// A committed ranged attack in flight. Damage resolves when `time_left` runs out.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Projectile {
    pub source: Entity,
    pub target: Entity,
    pub team: Team,
    pub damage: f32,
    pub time_left: f32,
}

// === Systems ===

/// Attacks on cooldown in creation order; out-of-range attackers close in.
/// A target killed earlier in the same pass reads as inactive to later attackers.
/// Runs in `SimSet::Combat`.
fn resolve_attacks(
    time: Res<Time>,
    config: Res<SimConfig>,
    terrain: Res<Terrain>,
    mut paths: ResMut<PathService>,
    mut commands: Commands,
    mut attackers: Query<
        (
            Entity,
            &SpawnOrder,
            &Team,
            &Position,
            &BodyRadius,
            &CombatStats,
            &mut AttackCooldown,
            &mut AgentState,
            &mut PathFollower,
            Has<Aerial>,
            Option<&mut Stealth>,
        ),
        With<Agent>,
    >,
    mut victims: Query<(&Position, &BodyRadius, &mut Health)>,
) {
    let dt = time.delta_secs();
    let mut order: Vec<(SpawnOrder, Entity)> = attackers
        .iter()
        .map(|(entity, &spawn_order, ..)| (spawn_order, entity))
        .collect();
    order.sort_unstable();

    for (_, entity) in order {
        let Ok((
            _,
            _,
            &team,
            position,
            radius,
            combat,
            mut cooldown,
            mut state,
            mut follower,
            aerial,
            stealth,
        )) = attackers.get_mut(entity)
        else {
            continue;
        };
        cooldown.0 = (cooldown.0 - dt).max(0.0);

        let alive = victims
            .get(entity)
            .is_ok_and(|(_, _, health)| health.is_active());
        if !alive {
            continue;
        }
        let AgentState::Attacking { target, .. } = *state else {
            continue;
        };
        let Some((target_position, target_radius)) = victims
            .get(target)
            .ok()
            .filter(|(_, _, health)| health.is_active())
            .map(|(target_position, target_radius, _)| (target_position.0, target_radius.0))
        else {
            continue;
        };

        let gap = surface_distance(position.0, radius.0, target_position, target_radius);
        if gap > combat.range {
            if !follower.is_active() {
                let mut nav = Nav::new(&terrain, &mut paths);
                let mut mover = Mover {
                    entity,
                    position: position.0,
                    aerial,
                    state: &mut state,
                    follower: &mut follower,
                };
                mover.chase(&mut nav, target_position);
            }
            continue;
        }

        if follower.is_active() {
            follower.reset(&mut paths);
        }
        if !cooldown.is_ready() {
            continue;
        }
        cooldown.0 = combat.cooldown_secs;
        if let Some(mut stealth) = stealth {
            stealth.reveal(config.stealth.reveal_grace_secs);
        }

        if combat.ranged {
            let travel = position.0.distance(target_position) / config.projectile_speed;
            commands.spawn((
                Name::new("Projectile"),
                Projectile {
                    source: entity,
                    target,
                    team,
                    damage: combat.damage,
                    time_left: travel,
                },
                Position(position.0),
            ));
        } else if let Ok((_, _, mut health)) = victims.get_mut(target) {
            if health.take_damage(combat.damage) {
                debug!("Agent {entity} destroyed {target}");
            }
        }
    }
}

/// Lands projectiles whose travel time has elapsed. Hits on targets that
/// died or left play are dropped.
/// Runs in `SimSet::Combat`, before [`resolve_attacks`] so a fresh launch
/// starts travelling on the next tick.
fn resolve_projectiles(
    time: Res<Time>,
    mut commands: Commands,
    mut projectiles: Query<(Entity, &mut Projectile)>,
    mut targets: Query<&mut Health>,
) {
    let dt = time.delta_secs();
    for (entity, mut projectile) in &mut projectiles {
        projectile.time_left -= dt;
        if projectile.time_left > 0.0 {
            continue;
        }
        commands.entity(entity).despawn();
        match targets.get_mut(projectile.target) {
            Ok(mut health) if health.is_active() => {
                if health.take_damage(projectile.damage) {
                    debug!("Projectile from {} destroyed {}", projectile.source, projectile.target);
                }
            }
            _ => debug!("Projectile for {} discarded", projectile.target),
        }
    }
}

pub(super) fn plugin(app: &mut App) {
    app.register_type::<AttackCooldown>()
        .register_type::<Projectile>();

    app.add_systems(
        Update,
        (resolve_projectiles, resolve_attacks)
            .chain()
            .in_set(SimSet::Combat),
    );
}
