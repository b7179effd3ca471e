//! Tunable simulation parameters, loadable from JSON.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::structures::BuildingKind;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("gather threshold {lower} must be below build threshold {upper}")]
    Thresholds { lower: u32, upper: u32 },
    #[error("construction share {0} must be within 0..=1")]
    Share(f32),
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

// === Agent / combat tunables ===

/// Per-agent behavior and combat tunables.
#[derive(Resource, Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Resource)]
#[serde(default)]
pub struct SimConfig {
    /// Seconds without meaningful displacement before a move counts as stuck.
    pub stuck_secs: f32,
    /// Displacement (world units) that resets the stuck clock.
    pub stuck_displacement: f32,
    /// Re-path attempts per move command before giving up.
    pub max_stuck_retries: u32,
    /// Ceiling on time spent in one move command.
    pub move_timeout_secs: f32,
    /// Distance at which a waypoint counts as reached.
    pub waypoint_radius: f32,
    /// Worker must be this close to a solid resource node.
    pub gather_radius: f32,
    /// Wider radius for liquid nodes reached from an adjacent tile.
    pub liquid_gather_radius: f32,
    /// Surface distance to a storage structure for deposits.
    pub deposit_radius: f32,
    /// Surface distance to a construction site for building.
    pub construct_radius: f32,
    /// Quantity withdrawn per completed gather.
    pub gather_amount: u32,
    /// Seconds per gather.
    pub gather_secs: f32,
    /// Construction progress (percent) one worker adds per second.
    pub construct_rate: f32,
    /// Search radius when re-targeting a resource node.
    pub node_search_radius: f32,
    /// Ranged projectile speed; travel time is distance / speed.
    pub projectile_speed: f32,
    /// Stealth agent tunables.
    pub stealth: StealthConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            stuck_secs: 1.0,
            stuck_displacement: 1.0,
            max_stuck_retries: 3,
            move_timeout_secs: 30.0,
            waypoint_radius: 2.0,
            gather_radius: 24.0,
            liquid_gather_radius: 48.0,
            deposit_radius: 48.0,
            construct_radius: 48.0,
            gather_amount: 10,
            gather_secs: 2.0,
            construct_rate: 10.0,
            node_search_radius: 640.0,
            projectile_speed: 240.0,
            stealth: StealthConfig::default(),
        }
    }
}

/// Stealth and special-ability tunables.
#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    /// Seconds revealed before stealth is re-entered.
    pub reveal_grace_secs: f32,
    /// Period of the detection sweep.
    pub detection_interval_secs: f32,
    /// Opposing units within this radius reveal a stealthed agent.
    pub detection_radius: f32,
    pub sabotage_range: f32,
    pub sabotage_cooldown_secs: f32,
    /// How long a sabotaged structure stays disabled.
    pub sabotage_duration_secs: f32,
    pub steal_range: f32,
    pub steal_cooldown_secs: f32,
    /// Maximum stolen per resource kind.
    pub steal_cap: u32,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            reveal_grace_secs: 3.0,
            detection_interval_secs: 0.5,
            detection_radius: 48.0,
            sabotage_range: 40.0,
            sabotage_cooldown_secs: 20.0,
            sabotage_duration_secs: 10.0,
            steal_range: 40.0,
            steal_cooldown_secs: 30.0,
            steal_cap: 25,
        }
    }
}

impl SimConfig {
    /// Parses and validates a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("stuck_secs", self.stuck_secs)?;
        positive("move_timeout_secs", self.move_timeout_secs)?;
        positive("waypoint_radius", self.waypoint_radius)?;
        positive("gather_secs", self.gather_secs)?;
        positive("construct_rate", self.construct_rate)?;
        positive("projectile_speed", self.projectile_speed)?;
        positive(
            "stealth.detection_interval_secs",
            self.stealth.detection_interval_secs,
        )?;
        Ok(())
    }
}

// === Opponent tunables ===

/// Thresholds, ratios and build order of the rule-based opponent.
#[derive(Resource, Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Resource)]
#[serde(default)]
pub struct OpponentConfig {
    /// Seconds between decision ticks.
    pub decision_interval_secs: f32,
    /// `Gathering -> Building` once base resources exceed this.
    pub build_threshold: u32,
    /// `Building -> Gathering` once base resources fall below this.
    pub gather_threshold: u32,
    /// Enemy agents this close to the main base count as a threat.
    pub threat_radius: f32,
    /// Worker count the economy trains toward.
    pub target_workers: usize,
    /// Army size that triggers `Building -> Attacking`.
    pub target_army: usize,
    /// Upper bound on trained combat agents (live plus queued).
    pub army_cap: usize,
    /// Largest fraction of the workforce assigned to construction.
    pub construction_share: f32,
    /// Patrol radius around the main base while defending.
    pub patrol_radius: f32,
    /// Ring search limit (in cells) for build sites.
    pub site_search_radius: i32,
    /// Free cells kept between structures.
    pub site_clearance: i32,
    /// Strictly ordered structures to build.
    pub build_order: Vec<BuildingKind>,
    /// Seed for patrol point selection.
    pub seed: u64,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        Self {
            decision_interval_secs: 2.0,
            build_threshold: 500,
            gather_threshold: 200,
            threat_radius: 320.0,
            target_workers: 8,
            target_army: 6,
            army_cap: 12,
            construction_share: 0.3,
            patrol_radius: 160.0,
            site_search_radius: 12,
            site_clearance: 1,
            build_order: vec![
                BuildingKind::Storehouse,
                BuildingKind::Barracks,
                BuildingKind::Watchtower,
                BuildingKind::Aerie,
            ],
            seed: 0x5eed,
        }
    }
}

impl OpponentConfig {
    /// Parses and validates a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("decision_interval_secs", self.decision_interval_secs)?;
        positive("threat_radius", self.threat_radius)?;
        if self.gather_threshold >= self.build_threshold {
            return Err(ConfigError::Thresholds {
                lower: self.gather_threshold,
                upper: self.build_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.construction_share) {
            return Err(ConfigError::Share(self.construction_share));
        }
        Ok(())
    }
}

// === Plugin ===

pub(super) fn plugin(app: &mut App) {
    app.register_type::<SimConfig>()
        .register_type::<OpponentConfig>()
        .init_resource::<SimConfig>()
        .init_resource::<OpponentConfig>();
}
