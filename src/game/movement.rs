//! Straight-line movement, building relocation and resource capture

use super::entity::{EntityId, EntityKind};
use super::world::World;

/// Distance at which a node is captured by a touching unit
pub const CAPTURE_RADIUS: f32 = 30.0;
/// Buildings snap to their move target when this close
const ARRIVAL_EPSILON: f32 = 2.0;

/// Movement helpers
pub struct MovementSystem;

impl MovementSystem {
    /// Move from (x, y) toward (tx, ty) by at most `max_step`, never overshooting.
    /// Returns (new_x, new_y, arrived)
    pub fn step_toward(x: f32, y: f32, tx: f32, ty: f32, max_step: f32) -> (f32, f32, bool) {
        let dx = tx - x;
        let dy = ty - y;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist <= max_step || dist <= f32::EPSILON {
            return (tx, ty, true);
        }

        let scale = max_step / dist;
        (x + dx * scale, y + dy * scale, false)
    }

    /// Keep a point inside the map
    pub fn clamp_to_map(x: f32, y: f32, width: f32, height: f32) -> (f32, f32) {
        (x.clamp(0.0, width), y.clamp(0.0, height))
    }
}

impl World {
    /// Move an entity toward a point at its effective speed
    pub fn move_entity_toward(&mut self, id: EntityId, tx: f32, ty: f32, delta: f32) -> bool {
        let now = self.clock_ms;
        let (width, height) = (self.map.width, self.map.height);
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        let step = entity.effective_speed(now) * delta;
        let (x, y, arrived) = MovementSystem::step_toward(entity.x, entity.y, tx, ty, step);
        let (x, y) = MovementSystem::clamp_to_map(x, y, width, height);
        entity.x = x;
        entity.y = y;
        arrived
    }

    /// Bases and factories only move when commanded
    pub fn move_buildings(&mut self, delta: f32) {
        let moving: Vec<(EntityId, f32, f32)> = self
            .entities
            .values()
            .filter(|e| e.kind.is_building())
            .filter_map(|e| e.move_target.map(|(tx, ty)| (e.id, tx, ty)))
            .collect();

        for (id, tx, ty) in moving {
            let close = self
                .entities
                .get(&id)
                .map(|e| e.distance_to(tx, ty) <= ARRIVAL_EPSILON)
                .unwrap_or(false);
            let arrived = if close {
                if let Some(e) = self.entities.get_mut(&id) {
                    e.x = tx;
                    e.y = ty;
                }
                true
            } else {
                self.move_entity_toward(id, tx, ty, delta)
            };
            if arrived {
                if let Some(e) = self.entities.get_mut(&id) {
                    e.move_target = None;
                }
            }
        }
    }

    /// Hand each node to the nearest owned unit touching it
    pub fn capture_resource_nodes(&mut self) {
        let nodes: Vec<(EntityId, f32, f32)> = self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::ResourceNode)
            .map(|e| (e.id, e.x, e.y))
            .collect();

        for (node_id, x, y) in nodes {
            let capturer = self
                .entities
                .values()
                .filter(|e| e.kind == EntityKind::Unit && e.owner.is_some())
                .map(|e| (e.owner, e.distance_to(x, y)))
                .filter(|(_, d)| *d < CAPTURE_RADIUS)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .and_then(|(owner, _)| owner);

            let Some(capturer) = capturer else {
                continue;
            };
            let Some(node) = self.entities.get_mut(&node_id) else {
                continue;
            };
            if node.owner == Some(capturer) {
                continue;
            }
            node.owner = Some(capturer);
            if let Some(player) = self.players.get_mut(&capturer) {
                player.stats.resources_captured += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::UnitKind;
    use uuid::Uuid;

    #[test]
    fn step_toward_never_overshoots() {
        let (x, y, arrived) = MovementSystem::step_toward(0.0, 0.0, 10.0, 0.0, 4.0);
        assert_eq!((x, y, arrived), (4.0, 0.0, false));

        let (x, y, arrived) = MovementSystem::step_toward(8.0, 0.0, 10.0, 0.0, 4.0);
        assert_eq!((x, y, arrived), (10.0, 0.0, true));
    }

    #[test]
    fn building_moves_to_commanded_point_then_stops() {
        let mut world = World::new(3);
        let a = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        let base = world.base_of(a).unwrap().id;
        world.entities.get_mut(&base).unwrap().move_target = Some((160.0, 400.0));

        world.move_buildings(0.5);
        let b = &world.entities[&base];
        assert!((b.x - 157.5).abs() < 1e-3);
        assert!(b.move_target.is_some());

        world.move_buildings(0.5);
        let b = &world.entities[&base];
        assert_eq!(b.x, 160.0);
        assert!(b.move_target.is_none());
    }

    fn node_near(world: &World, x: f32, y: f32) -> EntityId {
        world
            .entities
            .values()
            .find(|e| e.kind == EntityKind::ResourceNode && e.x == x && e.y == y)
            .unwrap()
            .id
    }

    #[test]
    fn nearest_unit_captures_node_once() {
        let mut world = World::new(3);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        world.add_player(b, None, "b".into(), None);
        let node = node_near(&world, 800.0, 300.0);

        world.spawn_unit(a, UnitKind::Scout, UnitKind::Scout.stats(), 820.0, 300.0);
        world.spawn_unit(b, UnitKind::Scout, UnitKind::Scout.stats(), 810.0, 300.0);
        world.capture_resource_nodes();
        assert_eq!(world.entities[&node].owner, Some(b));

        world.capture_resource_nodes();
        assert_eq!(world.players[&b].stats.resources_captured, 1);
        assert_eq!(world.players[&a].stats.resources_captured, 0);
    }

    #[test]
    fn units_outside_radius_do_not_capture() {
        let mut world = World::new(3);
        let a = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        let node = node_near(&world, 800.0, 500.0);
        world.spawn_unit(a, UnitKind::Scout, UnitKind::Scout.stats(), 840.0, 500.0);
        world.capture_resource_nodes();
        assert_eq!(world.entities[&node].owner, None);
    }
}
