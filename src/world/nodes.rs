//! Harvestable resource nodes and the nearest-node index.

use bevy::prelude::*;

use super::{BodyRadius, Position};
use crate::SimSet;
use crate::economy::ResourceKind;

/// Visual/body radius of a node.
pub const NODE_RADIUS: f32 = 8.0;

/// A harvestable resource with finite remaining yield.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub struct ResourceNode {
    pub kind: ResourceKind,
    pub remaining: u32,
    /// Workers currently in the gathering state on this node. Rebuilt every tick.
    pub gatherers: Vec<Entity>,
}

impl ResourceNode {
    #[must_use]
    pub const fn new(kind: ResourceKind, remaining: u32) -> Self {
        Self {
            kind,
            remaining,
            gatherers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.remaining == 0
    }

    /// Removes up to `amount` from the node.
    pub fn withdraw(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.remaining);
        self.remaining -= taken;
        taken
    }
}

/// Spawns a resource node at a world position.
pub fn spawn_resource_node(
    commands: &mut Commands,
    kind: ResourceKind,
    amount: u32,
    position: Vec2,
) -> Entity {
    commands
        .spawn((
            Name::new(format!("{kind:?} node")),
            ResourceNode::new(kind, amount),
            Position(position),
            BodyRadius(NODE_RADIUS),
        ))
        .id()
}

/// Nearest live, non-depleted node within `max_radius` of `origin` accepted by `predicate`.
/// Ties keep the first node encountered.
pub fn find_nearest_node<'a>(
    nodes: impl IntoIterator<Item = (Entity, &'a ResourceNode, &'a Position)>,
    origin: Vec2,
    max_radius: f32,
    mut predicate: impl FnMut(Entity, &ResourceNode) -> bool,
) -> Option<Entity> {
    let mut best: Option<(Entity, f32)> = None;
    for (entity, node, position) in nodes {
        if node.is_depleted() || !predicate(entity, node) {
            continue;
        }
        let distance = origin.distance(position.0);
        if distance > max_radius {
            continue;
        }
        if best.is_none_or(|(_, closest)| distance < closest) {
            best = Some((entity, distance));
        }
    }
    best.map(|(entity, _)| entity)
}

/// Depleted nodes are removed at the end of the tick.
fn clear_depleted_nodes(mut commands: Commands, nodes: Query<(Entity, &ResourceNode)>) {
    for (entity, node) in &nodes {
        if node.is_depleted() {
            debug!("Resource node {entity} depleted");
            commands.entity(entity).despawn();
        }
    }
}

pub(super) fn plugin(app: &mut App) {
    app.register_type::<ResourceNode>();

    app.add_systems(Update, clear_depleted_nodes.in_set(SimSet::Death));
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::testing::assert_entity_count;

    fn spawn_node(world: &mut World, kind: ResourceKind, remaining: u32, x: f32) -> Entity {
        world
            .spawn((ResourceNode::new(kind, remaining), Position(Vec2::new(x, 0.0))))
            .id()
    }

    fn nearest(world: &mut World, origin: Vec2, radius: f32, kind: ResourceKind) -> Option<Entity> {
        let mut query = world.query::<(Entity, &ResourceNode, &Position)>();
        find_nearest_node(query.iter(world), origin, radius, |_, node| node.kind == kind)
    }

    #[test]
    fn nearest_node_matches_predicate() {
        let mut world = World::new();
        spawn_node(&mut world, ResourceKind::Sticks, 50, 10.0);
        let food = spawn_node(&mut world, ResourceKind::Food, 50, 40.0);
        spawn_node(&mut world, ResourceKind::Food, 50, 90.0);

        assert_eq!(
            nearest(&mut world, Vec2::ZERO, 500.0, ResourceKind::Food),
            Some(food)
        );
    }

    #[test]
    fn depleted_and_distant_nodes_are_skipped() {
        let mut world = World::new();
        spawn_node(&mut world, ResourceKind::Food, 0, 10.0);
        spawn_node(&mut world, ResourceKind::Food, 50, 900.0);

        assert_eq!(
            nearest(&mut world, Vec2::ZERO, 500.0, ResourceKind::Food),
            None
        );
    }

    #[test]
    fn depleted_nodes_are_despawned() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_systems(Update, clear_depleted_nodes);
        spawn_node(app.world_mut(), ResourceKind::Water, 0, 0.0);
        spawn_node(app.world_mut(), ResourceKind::Water, 5, 0.0);

        app.update();

        assert_entity_count::<With<ResourceNode>>(&mut app, 1);
    }
}
