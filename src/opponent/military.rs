//! Military duties: training by parity, attacking the enemy base, defending home.

use bevy::prelude::*;

use super::{Opponent, OpponentMode, SimRng, StructureQuery, base_of};
use crate::Team;
use crate::agents::commands::{AgentCommand, Order};
use crate::agents::{Agent, AgentState, MoveIntent, SpawnOrder, UnitKind};
use crate::combat::{CombatStats, Damageable, Health};
use crate::config::OpponentConfig;
use crate::economy::Ledgers;
use crate::structures::construction::Construction;
use crate::structures::production::{QUEUE_CAP, TrainError, TrainingQueue, enqueue_training};
use crate::structures::{BuildingKind, Disabled, building_stats};
use crate::world::Position;

/// Alternates the two basic combat units.
#[must_use]
pub const fn parity_unit(trained: u32) -> UnitKind {
    if trained % 2 == 0 {
        UnitKind::Warrior
    } else {
        UnitKind::Archer
    }
}

/// While building up or attacking, spends on combat units until the army
/// (live plus queued) reaches its cap or the money runs out.
pub(super) fn train_forces(
    config: Res<OpponentConfig>,
    mut opponent: ResMut<Opponent>,
    mut ledgers: ResMut<Ledgers>,
    army: Query<(&Team, &Health), (With<Agent>, With<CombatStats>)>,
    mut yards: Query<
        (
            Entity,
            &BuildingKind,
            &Team,
            &SpawnOrder,
            &mut TrainingQueue,
            Has<Construction>,
        ),
        Without<Disabled>,
    >,
) {
    if !matches!(opponent.mode, OpponentMode::Building | OpponentMode::Attacking) {
        return;
    }
    let team = opponent.team;
    let live = army
        .iter()
        .filter(|&(&owner, health)| owner == team && health.is_active())
        .count();
    let queued: usize = yards
        .iter()
        .filter(|&(_, _, &owner, ..)| owner == team)
        .map(|(.., queue, _)| queue.queue.iter().filter(|&&unit| unit != UnitKind::Worker).count())
        .sum();
    let mut strength = live + queued;

    let mut barracks: Vec<(SpawnOrder, Entity)> = yards
        .iter()
        .filter(|&(_, &kind, &owner, _, _, site)| {
            owner == team && !site && building_stats(kind).trains.contains(&UnitKind::Warrior)
        })
        .map(|(entity, _, _, &order, ..)| (order, entity))
        .collect();
    barracks.sort_unstable();

    while strength < config.army_cap {
        let unit = parity_unit(opponent.trained);
        let Some(&(_, yard)) = barracks.iter().min_by_key(|&&(order, entity)| {
            let waiting = yards.get(entity).map_or(QUEUE_CAP, |(.., queue, _)| queue.len());
            (waiting, order)
        }) else {
            return;
        };
        let Ok((_, &kind, _, _, mut queue, site)) = yards.get_mut(yard) else {
            return;
        };
        match enqueue_training(&mut ledgers, team, kind, !site, &mut queue, unit) {
            Ok(()) => {
                debug!("Opponent: queued {unit:?} at {yard}");
                opponent.trained += 1;
                strength += 1;
            }
            Err(TrainError::Economy(_)) => {
                debug!("Opponent: cannot afford {unit:?}");
                return;
            }
            Err(err) => {
                debug!("Opponent: {err}");
                return;
            }
        }
    }
}

/// Attacking: sends every free combat agent at the enemy base.
/// Defending: recalls stragglers and patrols idle agents around home.
pub(super) fn command_forces(
    config: Res<OpponentConfig>,
    opponent: Res<Opponent>,
    mut rng: ResMut<SimRng>,
    mut orders: MessageWriter<AgentCommand>,
    structures: StructureQuery,
    forces: Query<
        (Entity, &Team, &SpawnOrder, &Position, &AgentState, &CombatStats, &Health),
        With<Agent>,
    >,
) {
    let team = opponent.team;
    let mut squad: Vec<(SpawnOrder, Entity, Vec2, AgentState)> = forces
        .iter()
        .filter(|&(_, &owner, .., combat, health)| {
            owner == team && combat.auto_engage && health.is_active()
        })
        .map(|(entity, _, &order, position, &state, ..)| (order, entity, position.0, state))
        .collect();
    squad.sort_unstable_by_key(|&(order, ..)| order);

    let attack_moving = |state: &AgentState| {
        matches!(
            state,
            AgentState::Moving {
                intent: Some(MoveIntent::AttackMove)
            }
        )
    };

    match opponent.mode {
        OpponentMode::Attacking => {
            let target = base_of(&structures, team.opposing())
                .map(|(_, position)| position)
                .or_else(|| {
                    structures
                        .iter()
                        .filter(|&(_, _, &owner, ..)| owner == team.opposing())
                        .min_by_key(|&(_, _, _, &order, ..)| order)
                        .map(|(.., position, _)| position.0)
                });
            let Some(target) = target else {
                debug!("Opponent: nothing left to attack");
                return;
            };
            for (_, agent, _, state) in squad {
                if state.attack_target().is_some() || attack_moving(&state) {
                    continue;
                }
                orders.write(AgentCommand::new(agent, Order::AttackMove(target)));
            }
        }
        OpponentMode::Defending => {
            let Some((_, home)) = base_of(&structures, team) else {
                return;
            };
            for (_, agent, position, state) in squad {
                if state.attack_target().is_some() || attack_moving(&state) {
                    continue;
                }
                if position.distance(home) > config.patrol_radius {
                    orders.write(AgentCommand::new(agent, Order::AttackMove(home)));
                } else if state.is_idle() {
                    let point = rng.point_within(home, config.patrol_radius);
                    orders.write(AgentCommand::new(agent, Order::AttackMove(point)));
                }
            }
        }
        OpponentMode::Gathering | OpponentMode::Building => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parity_alternates_warriors_and_archers() {
        let picks: Vec<UnitKind> = (0..4).map(parity_unit).collect();
        assert_eq!(
            picks,
            vec![
                UnitKind::Warrior,
                UnitKind::Archer,
                UnitKind::Warrior,
                UnitKind::Archer
            ]
        );
    }
}
