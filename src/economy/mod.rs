//! Economy: resource kinds, stockpiles, and the per-faction ledgers.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Team;

// === Constants ===

/// Each faction's ledger at the start of a match.
pub const STARTING_STOCKPILE: Stockpile = Stockpile::from_amounts(200, 100, 200, 0);

// === Resource kinds ===

/// Harvestable resource types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
pub enum ResourceKind {
    Food,
    Water,
    Sticks,
    Stone,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [Self::Food, Self::Water, Self::Sticks, Self::Stone];

    /// The kinds counted toward the opponent's stockpile thresholds.
    pub const BASE: [Self; 3] = [Self::Food, Self::Water, Self::Sticks];

    const fn index(self) -> usize {
        match self {
            Self::Food => 0,
            Self::Water => 1,
            Self::Sticks => 2,
            Self::Stone => 3,
        }
    }

    /// Liquid nodes sit on unwalkable tiles and are gathered from an adjacent one.
    #[must_use]
    pub const fn is_liquid(self) -> bool {
        matches!(self, Self::Water)
    }
}

// === Stockpile ===

/// Quantity per resource kind. Used for ledgers, inventories and costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub struct Stockpile([u32; 4]);

impl Stockpile {
    pub const EMPTY: Self = Self([0; 4]);

    #[must_use]
    pub const fn from_amounts(food: u32, water: u32, sticks: u32, stone: u32) -> Self {
        Self([food, water, sticks, stone])
    }

    /// A stockpile holding `amount` of a single kind.
    #[must_use]
    pub fn single(kind: ResourceKind, amount: u32) -> Self {
        let mut pile = Self::EMPTY;
        pile.add(kind, amount);
        pile
    }

    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> u32 {
        self.0[kind.index()]
    }

    pub fn add(&mut self, kind: ResourceKind, amount: u32) {
        let slot = &mut self.0[kind.index()];
        *slot = slot.saturating_add(amount);
    }

    /// Removes up to `amount`, returning how much was actually removed.
    pub fn take(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let slot = &mut self.0[kind.index()];
        let taken = amount.min(*slot);
        *slot -= taken;
        taken
    }

    pub fn merge(&mut self, other: &Self) {
        for (kind, amount) in other.iter() {
            self.add(kind, amount);
        }
    }

    /// Empties the stockpile and returns what it held.
    pub fn take_all(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Every kind added up, saturating at `u32::MAX`.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().fold(0, |sum, &amount| sum.saturating_add(amount))
    }

    /// Food + water + sticks, saturating like [`Self::total`].
    #[must_use]
    pub fn base_total(&self) -> u32 {
        ResourceKind::BASE
            .iter()
            .fold(0, |sum, &kind| sum.saturating_add(self.get(kind)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&amount| amount == 0)
    }

    /// Whether every kind in `cost` is covered.
    #[must_use]
    pub fn covers(&self, cost: &Self) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= cost.get(kind))
    }

    /// Non-zero entries in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .filter(|&(_, amount)| amount > 0)
    }
}

// === Ledgers ===

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("{team:?} cannot afford {cost:?}")]
    Insufficient { team: Team, cost: Stockpile },
}

/// Independent resource pools, one per faction.
#[derive(Resource, Debug, Clone, PartialEq, Eq, Reflect)]
#[reflect(Resource)]
pub struct Ledgers {
    player: Stockpile,
    enemy: Stockpile,
}

impl Default for Ledgers {
    fn default() -> Self {
        Self {
            player: STARTING_STOCKPILE,
            enemy: STARTING_STOCKPILE,
        }
    }
}

impl Ledgers {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            player: Stockpile::EMPTY,
            enemy: Stockpile::EMPTY,
        }
    }

    #[must_use]
    pub const fn get(&self, team: Team) -> &Stockpile {
        match team {
            Team::Player => &self.player,
            Team::Enemy => &self.enemy,
        }
    }

    fn get_mut(&mut self, team: Team) -> &mut Stockpile {
        match team {
            Team::Player => &mut self.player,
            Team::Enemy => &mut self.enemy,
        }
    }

    /// Replaces a faction's whole pool.
    pub fn set(&mut self, team: Team, pile: Stockpile) {
        *self.get_mut(team) = pile;
    }

    #[must_use]
    pub fn can_afford(&self, team: Team, cost: &Stockpile) -> bool {
        self.get(team).covers(cost)
    }

    /// Deducts `cost` all-or-nothing.
    pub fn spend(&mut self, team: Team, cost: &Stockpile) -> Result<(), EconomyError> {
        if !self.can_afford(team, cost) {
            return Err(EconomyError::Insufficient { team, cost: *cost });
        }
        let pile = self.get_mut(team);
        for (kind, amount) in cost.iter() {
            pile.take(kind, amount);
        }
        Ok(())
    }

    pub fn add(&mut self, team: Team, kind: ResourceKind, amount: u32) {
        self.get_mut(team).add(kind, amount);
    }

    /// Removes up to `amount`; returns the amount actually removed.
    pub fn remove(&mut self, team: Team, kind: ResourceKind, amount: u32) -> u32 {
        self.get_mut(team).take(kind, amount)
    }

    /// Credits a whole stockpile (deposits, transfers).
    pub fn deposit(&mut self, team: Team, amounts: &Stockpile) {
        self.get_mut(team).merge(amounts);
    }

    /// Gives back a previously spent cost.
    pub fn refund(&mut self, team: Team, cost: &Stockpile) {
        debug!("Refunding {cost:?} to {team:?}");
        self.deposit(team, cost);
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Ledgers>().init_resource::<Ledgers>();
}
