//! Combat system - attack timing and damage resolution

use rand::Rng;

use super::catalog::UnitKind;
use super::entity::{Effect, Entity, EntityId, EntityKind};
use super::world::{DamageSource, World};

/// Combat system for attack gating and damage modifiers
pub struct CombatSystem;

impl CombatSystem {
    /// Check if an attacker may strike again
    pub fn can_attack(last_attack_ms: Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
        match last_attack_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= interval_ms,
        }
    }

    /// Multiplier from the attacker's own kind
    fn attacker_multiplier(kind: Option<UnitKind>, target: &Entity, cast_hits: bool) -> f32 {
        match kind {
            Some(UnitKind::PolymorphWarrior) => match target.kind {
                EntityKind::Unit => 1.3,
                EntityKind::Factory => 1.5,
                EntityKind::Base => 2.0,
                EntityKind::ResourceNode => 1.0,
            },
            Some(UnitKind::CoroutineArcher) => 1.3,
            Some(UnitKind::DynamicCast) => {
                if cast_hits {
                    2.0
                } else {
                    0.0
                }
            }
            _ => 1.0,
        }
    }

    /// Damage of one basic attack; modifiers stack multiplicatively and the product is floored
    pub fn calculate_damage(attacker: &Entity, target: &Entity, now_ms: u64, cast_hits: bool) -> i32 {
        let mut multiplier = Self::attacker_multiplier(attacker.unit_kind, target, cast_hits);

        if attacker.effects.has(Effect::Commanded, now_ms) {
            multiplier *= 1.2;
        }
        if target.effects.has(Effect::Indexed, now_ms) {
            multiplier *= 1.25;
        }
        let pierces = attacker.unit_kind == Some(UnitKind::CoroutineArcher);
        if !pierces && target.effects.has(Effect::Shielded, now_ms) {
            multiplier *= 0.5;
        }

        (attacker.damage as f32 * multiplier).floor().max(0.0) as i32
    }
}

impl World {
    /// Resolve a basic attack and stamp the attacker's timer
    pub fn perform_attack(&mut self, attacker_id: EntityId, target_id: EntityId) -> Option<i32> {
        let now = self.clock_ms;
        let cast_hits = self.rng.gen_bool(0.5);
        let attacker = self.entities.get(&attacker_id)?;
        let target = self.entities.get(&target_id)?;
        let owner = attacker.owner?;

        let damage = CombatSystem::calculate_damage(attacker, target, now, cast_hits);
        let source = DamageSource {
            owner,
            unit_kind: attacker.unit_kind,
        };

        if let Some(attacker) = self.entities.get_mut(&attacker_id) {
            attacker.last_attack_ms = Some(now);
            attacker.attacking_target_id = Some(target_id);
        }
        self.deal_damage(target_id, damage, Some(source));
        Some(damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::FactoryKind;
    use uuid::Uuid;

    fn unit(kind: UnitKind) -> Entity {
        Entity::unit(EntityId(1), Uuid::new_v4(), kind, kind.stats(), 0.0, 0.0)
    }

    #[test]
    fn attack_gate_respects_interval() {
        assert!(CombatSystem::can_attack(None, 0, 1000));
        assert!(!CombatSystem::can_attack(Some(500), 1000, 1000));
        assert!(CombatSystem::can_attack(Some(500), 1500, 1000));
    }

    #[test]
    fn polymorph_scales_by_target_kind() {
        let warrior = unit(UnitKind::PolymorphWarrior);
        let owner = Uuid::new_v4();
        let base = Entity::base(EntityId(2), owner, 0.0, 0.0);
        let factory = Entity::factory(EntityId(3), owner, FactoryKind::Standard, 0.0, 0.0);
        let target = unit(UnitKind::Scout);

        assert_eq!(CombatSystem::calculate_damage(&warrior, &base, 0, true), 24);
        assert_eq!(CombatSystem::calculate_damage(&warrior, &factory, 0, true), 18);
        assert_eq!(CombatSystem::calculate_damage(&warrior, &target, 0, true), 15);
    }

    #[test]
    fn modifiers_multiply_then_floor() {
        let mut tank = unit(UnitKind::Tank);
        let mut target = unit(UnitKind::Scout);
        tank.effects.apply(Effect::Commanded, 100);
        target.effects.apply(Effect::Indexed, 100);
        // 10 * 1.2 * 1.25
        assert_eq!(CombatSystem::calculate_damage(&tank, &target, 0, true), 15);

        target.effects.apply(Effect::Shielded, 100);
        assert_eq!(CombatSystem::calculate_damage(&tank, &target, 0, true), 7);
    }

    #[test]
    fn coroutine_archer_ignores_shield() {
        let archer = unit(UnitKind::CoroutineArcher);
        let mut target = unit(UnitKind::Tank);
        target.effects.apply(Effect::Shielded, 100);
        assert_eq!(CombatSystem::calculate_damage(&archer, &target, 0, true), 23);
    }

    #[test]
    fn dynamic_cast_doubles_or_misses() {
        let cast = unit(UnitKind::DynamicCast);
        let target = unit(UnitKind::Tank);
        assert_eq!(CombatSystem::calculate_damage(&cast, &target, 0, true), 40);
        assert_eq!(CombatSystem::calculate_damage(&cast, &target, 0, false), 0);
    }
}
