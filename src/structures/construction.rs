//! Construction progress and the completion notification.

use bevy::prelude::*;

use super::BuildingKind;
use crate::notifications::ConstructionCompleted;
use crate::{SimSet, Team};

/// Progress ceiling, in percent.
pub const FULL_PROGRESS: f32 = 100.0;

/// An unfinished structure. Removed once the completion notice has gone out.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Construction {
    progress: f32,
}

impl Construction {
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= FULL_PROGRESS
    }

    /// Adds progress, clamped at the ceiling. Returns true only on the call
    /// that reaches it; later calls change nothing.
    pub fn add_progress(&mut self, amount: f32) -> bool {
        if self.is_complete() || amount <= 0.0 {
            return false;
        }
        self.progress = (self.progress + amount).min(FULL_PROGRESS);
        self.is_complete()
    }
}

/// Announces finished sites and promotes them to working structures.
/// Runs in `SimSet::Production`.
fn complete_construction(
    mut commands: Commands,
    mut completed: MessageWriter<ConstructionCompleted>,
    sites: Query<(Entity, &BuildingKind, &Team, &Construction)>,
) {
    for (entity, &kind, &team, construction) in &sites {
        if !construction.is_complete() {
            continue;
        }
        info!("{team:?} {kind:?} construction complete");
        completed.write(ConstructionCompleted {
            structure: entity,
            kind,
            team,
        });
        commands.entity(entity).try_remove::<Construction>();
    }
}

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Construction>();

    app.add_systems(Update, complete_construction.in_set(SimSet::Production));
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::Team;
    use crate::agents::{AgentState, UnitKind};
    use crate::combat::Health;
    use crate::structures::Storage;
    use crate::testing::*;
    use crate::world::GridCell;
    use pretty_assertions::assert_eq;

    #[test]
    fn finished_site_is_announced_exactly_once() {
        let mut app = create_sim_app();
        let site = spawn_site_at(
            &mut app,
            BuildingKind::Storehouse,
            Team::Player,
            GridCell::new(10, 2),
        );
        let worker = spawn_agent_at(
            &mut app,
            UnitKind::Worker,
            Team::Player,
            Vec2::new(352.0, 40.0),
        );
        set_state(&mut app, worker, AgentState::Constructing { site });
        watch_messages::<ConstructionCompleted>(&mut app);

        // 10% per second at 0.25 s per tick.
        tick_many(&mut app, 40);

        assert_eq!(
            received::<ConstructionCompleted>(&app),
            vec![ConstructionCompleted {
                structure: site,
                kind: BuildingKind::Storehouse,
                team: Team::Player,
            }]
        );
        assert!(!app.world().entity(site).contains::<Construction>());
        assert_eq!(state_of(&app, worker), AgentState::Idle);
        let health = app.world().get::<Health>(site).unwrap();
        assert!((health.current - health.max).abs() < 1e-3);

        tick_many(&mut app, 4);
        assert_eq!(received::<ConstructionCompleted>(&app).len(), 1);
    }

    #[test]
    fn incomplete_storage_does_not_take_deposits() {
        let mut app = create_sim_app();
        let site = spawn_site_at(
            &mut app,
            BuildingKind::Storehouse,
            Team::Player,
            GridCell::new(10, 2),
        );
        let mut query = app
            .world_mut()
            .query_filtered::<Entity, (With<Storage>, Without<Construction>)>();
        assert!(!query.iter(app.world()).any(|entity| entity == site));
    }
}
