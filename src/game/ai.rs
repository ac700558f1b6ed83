//! Per-unit combat AI: target acquisition, chase, attack

use super::catalog::UnitKind;
use super::combat::CombatSystem;
use super::entity::{AiState, Effect, Entity, EntityId, EntityKind, PlayerId};
use super::world::World;

const GUARD_RADIUS: f32 = 150.0;
/// Gatherers stop walking once this close to a node
const GATHER_STOP_DISTANCE: f32 = 25.0;

impl World {
    /// Best enemy for `unit`: units before factories before bases, then by distance.
    /// Hidden entities are skipped.
    pub fn find_nearest_enemy(&self, unit: &Entity) -> Option<EntityId> {
        let owner = unit.owner?;
        let now = self.clock_ms;
        self.entities
            .values()
            .filter(|e| e.is_enemy_of(owner) && e.kind != EntityKind::ResourceNode)
            .filter(|e| !e.effects.has(Effect::Hidden, now))
            .min_by(|a, b| {
                a.kind
                    .target_priority()
                    .cmp(&b.kind.target_priority())
                    .then(unit.distance(a).total_cmp(&unit.distance(b)))
            })
            .map(|e| e.id)
    }

    /// Closest node not owned by `owner`, neutral included
    pub fn nearest_capturable_node(&self, owner: PlayerId, x: f32, y: f32) -> Option<(EntityId, f32, f32)> {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::ResourceNode && e.owner != Some(owner))
            .min_by(|a, b| a.distance_to(x, y).total_cmp(&b.distance_to(x, y)))
            .map(|e| (e.id, e.x, e.y))
    }

    fn is_valid_target(&self, owner: PlayerId, target: EntityId) -> bool {
        let now = self.clock_ms;
        self.entities.get(&target).is_some_and(|e| {
            e.is_enemy_of(owner)
                && e.kind != EntityKind::ResourceNode
                && !e.effects.has(Effect::Hidden, now)
        })
    }

    /// Attack `target` if the attacker's timer allows it
    fn attack_if_ready(&mut self, unit_id: EntityId, target: EntityId) {
        let now = self.clock_ms;
        let Some(unit) = self.entities.get_mut(&unit_id) else {
            return;
        };
        unit.ai_state = AiState::Attacking;
        unit.attacking_target_id = Some(target);
        let Some(interval) = unit.attack_interval_ms(now) else {
            return;
        };
        if CombatSystem::can_attack(unit.last_attack_ms, now, interval) {
            self.perform_attack(unit_id, target);
        }
    }

    /// Node defenders hold position near an owned node; returns false when there is none to guard
    fn guard_node(&mut self, unit_id: EntityId) -> bool {
        let now = self.clock_ms;
        let Some(unit) = self.entities.get(&unit_id) else {
            return false;
        };
        let Some(owner) = unit.owner else {
            return false;
        };
        let guarding = self.entities.values().any(|e| {
            e.kind == EntityKind::ResourceNode
                && e.owner == Some(owner)
                && unit.distance(e) < GUARD_RADIUS
        });
        if !guarding {
            return false;
        }

        let range = unit.attack_range(now);
        let intruder = self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Unit && e.is_enemy_of(owner))
            .filter(|e| !e.effects.has(Effect::Hidden, now))
            .filter(|e| unit.distance(e) <= range)
            .min_by(|a, b| unit.distance(a).total_cmp(&unit.distance(b)))
            .map(|e| e.id);

        match intruder {
            Some(target) => self.attack_if_ready(unit_id, target),
            None => {
                if let Some(unit) = self.entities.get_mut(&unit_id) {
                    unit.ai_state = AiState::Idle;
                    unit.attacking_target_id = None;
                }
            }
        }
        true
    }

    /// One AI step for a single unit
    pub fn run_unit_ai(&mut self, unit_id: EntityId, delta: f32) {
        let now = self.clock_ms;
        let Some(unit) = self.entities.get(&unit_id) else {
            return;
        };
        let (Some(owner), Some(kind)) = (unit.owner, unit.unit_kind) else {
            return;
        };
        let current = unit.target_id;

        if kind == UnitKind::NodeDefender && self.guard_node(unit_id) {
            self.try_ability(unit_id);
            return;
        }

        let target = match current.filter(|t| self.is_valid_target(owner, *t)) {
            Some(t) => Some(t),
            None => {
                let found = self
                    .entities
                    .get(&unit_id)
                    .and_then(|unit| self.find_nearest_enemy(unit));
                if let Some(unit) = self.entities.get_mut(&unit_id) {
                    unit.target_id = found;
                }
                found
            }
        };

        match target {
            None => self.wander(unit_id, owner, kind, delta),
            Some(target_id) => {
                let (tx, ty) = match self.entities.get(&target_id) {
                    Some(t) => (t.x, t.y),
                    None => return,
                };
                let (dist, range) = match self.entities.get(&unit_id) {
                    Some(u) => (u.distance_to(tx, ty), u.attack_range(now)),
                    None => return,
                };

                if dist <= range {
                    if let Some(unit) = self.entities.get_mut(&unit_id) {
                        unit.move_target = None;
                    }
                    self.attack_if_ready(unit_id, target_id);
                } else {
                    if let Some(unit) = self.entities.get_mut(&unit_id) {
                        unit.ai_state = AiState::MovingToTarget;
                        unit.move_target = Some((tx, ty));
                        unit.attacking_target_id = None;
                    }
                    self.move_entity_toward(unit_id, tx, ty, delta);
                }
            }
        }

        self.try_ability(unit_id);
    }

    /// No enemy left: gatherers walk to nodes, everyone else idles
    fn wander(&mut self, unit_id: EntityId, owner: PlayerId, kind: UnitKind, delta: f32) {
        let Some((x, y)) = self.entities.get(&unit_id).map(|u| (u.x, u.y)) else {
            return;
        };

        let node = if kind.gathers_resources() {
            self.nearest_capturable_node(owner, x, y)
        } else {
            None
        };

        match node {
            Some((_, nx, ny)) if (nx - x).hypot(ny - y) > GATHER_STOP_DISTANCE => {
                if let Some(unit) = self.entities.get_mut(&unit_id) {
                    unit.ai_state = AiState::MovingToTarget;
                    unit.move_target = Some((nx, ny));
                    unit.attacking_target_id = None;
                }
                self.move_entity_toward(unit_id, nx, ny, delta);
            }
            _ => {
                if let Some(unit) = self.entities.get_mut(&unit_id) {
                    unit.ai_state = AiState::Idle;
                    unit.attacking_target_id = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn world() -> (World, PlayerId, PlayerId) {
        let mut world = World::new(5);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        world.add_player(b, None, "b".into(), None);
        (world, a, b)
    }

    #[test]
    fn units_are_preferred_over_closer_buildings() {
        let (mut world, a, b) = world();
        let hunter = world.spawn_unit(a, UnitKind::Tank, UnitKind::Tank.stats(), 1300.0, 400.0);
        let far_unit = world.spawn_unit(b, UnitKind::Scout, UnitKind::Scout.stats(), 200.0, 100.0);
        let hunter = world.entities[&hunter].clone();
        assert_eq!(world.find_nearest_enemy(&hunter), Some(far_unit));
    }

    #[test]
    fn hidden_enemies_are_skipped() {
        let (mut world, a, b) = world();
        let hunter = world.spawn_unit(a, UnitKind::Tank, UnitKind::Tank.stats(), 800.0, 400.0);
        let hidden = world.spawn_unit(b, UnitKind::Scout, UnitKind::Scout.stats(), 820.0, 400.0);
        world
            .entities
            .get_mut(&hidden)
            .unwrap()
            .effects
            .apply(Effect::Hidden, 10_000);
        let hunter = world.entities[&hunter].clone();
        let found = world.find_nearest_enemy(&hunter).unwrap();
        assert_ne!(found, hidden);
        assert_eq!(world.entities[&found].kind, EntityKind::Factory);
    }

    #[test]
    fn unit_chases_then_attacks() {
        let (mut world, a, b) = world();
        let hunter = world.spawn_unit(a, UnitKind::Tank, UnitKind::Tank.stats(), 700.0, 400.0);
        let prey = world.spawn_unit(b, UnitKind::Tank, UnitKind::Tank.stats(), 800.0, 400.0);

        world.run_unit_ai(hunter, 0.5);
        let h = &world.entities[&hunter];
        assert_eq!(h.ai_state, AiState::MovingToTarget);
        assert_eq!(h.target_id, Some(prey));
        assert!((h.x - 725.0).abs() < 1e-3);

        world.entities.get_mut(&hunter).unwrap().x = 760.0;
        world.run_unit_ai(hunter, 0.5);
        assert_eq!(world.entities[&hunter].ai_state, AiState::Attacking);
        assert_eq!(world.entities[&prey].hp, 140);

        // attack interval has not elapsed
        world.run_unit_ai(hunter, 0.5);
        assert_eq!(world.entities[&prey].hp, 140);
    }

    #[test]
    fn gatherer_heads_for_nearest_free_node_without_enemies() {
        let mut world = World::new(5);
        let a = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        let miner = world.spawn_unit(a, UnitKind::MemoryMiner, UnitKind::MemoryMiner.stats(), 400.0, 300.0);

        world.run_unit_ai(miner, 0.5);
        let m = &world.entities[&miner];
        assert_eq!(m.ai_state, AiState::MovingToTarget);
        assert_eq!(m.move_target, Some((400.0, 200.0)));
        assert!((m.y - 265.0).abs() < 1e-3);
    }

    #[test]
    fn non_gatherer_idles_without_enemies() {
        let mut world = World::new(5);
        let a = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        let tank = world.spawn_unit(a, UnitKind::Tank, UnitKind::Tank.stats(), 400.0, 300.0);
        world.run_unit_ai(tank, 0.5);
        let t = &world.entities[&tank];
        assert_eq!(t.ai_state, AiState::Idle);
        assert_eq!((t.x, t.y), (400.0, 300.0));
    }

    #[test]
    fn node_defender_stays_on_guard() {
        let (mut world, a, b) = world();
        let node = world
            .entities
            .values()
            .find(|e| e.kind == EntityKind::ResourceNode && e.x == 800.0 && e.y == 300.0)
            .unwrap()
            .id;
        world.entities.get_mut(&node).unwrap().owner = Some(a);
        let defender = world.spawn_unit(a, UnitKind::NodeDefender, UnitKind::NodeDefender.stats(), 800.0, 350.0);

        world.run_unit_ai(defender, 0.5);
        let d = &world.entities[&defender];
        assert_eq!((d.x, d.y), (800.0, 350.0));
        assert_eq!(d.ai_state, AiState::Idle);

        let intruder = world.spawn_unit(b, UnitKind::Scout, UnitKind::Scout.stats(), 850.0, 350.0);
        world.run_unit_ai(defender, 0.5);
        assert_eq!(world.entities[&defender].attacking_target_id, Some(intruder));
        assert_eq!(world.entities[&intruder].hp, 21);
    }

    #[test]
    fn node_defender_ignores_hidden_intruders() {
        let (mut world, a, b) = world();
        let node = world
            .entities
            .values()
            .find(|e| e.kind == EntityKind::ResourceNode && e.x == 800.0 && e.y == 300.0)
            .unwrap()
            .id;
        world.entities.get_mut(&node).unwrap().owner = Some(a);
        let defender = world.spawn_unit(a, UnitKind::NodeDefender, UnitKind::NodeDefender.stats(), 800.0, 350.0);
        let intruder = world.spawn_unit(b, UnitKind::Scout, UnitKind::Scout.stats(), 850.0, 350.0);
        world
            .entities
            .get_mut(&intruder)
            .unwrap()
            .effects
            .apply(Effect::Hidden, 10_000);
        let hp = world.entities[&intruder].hp;

        world.run_unit_ai(defender, 0.5);
        let d = &world.entities[&defender];
        assert_eq!(d.ai_state, AiState::Idle);
        assert_eq!(d.attacking_target_id, None);
        assert_eq!(world.entities[&intruder].hp, hp);
    }
}
