//! Data-driven unit abilities

use rand::Rng;

use super::catalog::UnitKind;
use super::entity::{AiState, Effect, Entity, EntityId, EntityKind, PlayerId};
use super::world::{DamageSource, World};

pub const DEFAULT_ABILITY_COOLDOWN_MS: u64 = 3000;

const ABSORB_HP_SHARE: f32 = 0.2;
const ABSORB_SPEED_SHARE: f32 = 0.1;
const WORKER_JITTER: f32 = 20.0;
const BLINK_MARGIN: f32 = 5.0;

/// What an ability does when it fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbilityEffect {
    /// Grow from allies that fell nearby this tick
    AbsorbFallen,
    TagAllies { effect: Effect, include_self: bool },
    /// Tag enemy units in the radius, only when at least `min_targets` are present
    TagEnemies {
        effect: Effect,
        min_targets: usize,
        strip_buffs: bool,
    },
    TagAllEnemyUnits { effect: Effect },
    TagTarget { effect: Effect },
    StrikeTarget { damage: i32 },
    SabotageFactory { damage: i32, effect: Effect },
    HealAllies { amount: i32, cleanse: bool },
    /// Finish off a unit at or below the given hp fraction
    ExecuteTarget { threshold: f32 },
    BlinkToTarget,
    SpawnWorkers { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ability {
    pub effect: AbilityEffect,
    /// Reach in map units; infinite for abilities aimed at the current target anywhere
    pub radius: f32,
    pub cooldown_ms: u64,
    pub duration_ms: u64,
}

impl Ability {
    const fn new(effect: AbilityEffect, radius: f32, duration_ms: u64) -> Self {
        Self {
            effect,
            radius,
            cooldown_ms: DEFAULT_ABILITY_COOLDOWN_MS,
            duration_ms,
        }
    }

    const fn with_cooldown(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }
}

impl UnitKind {
    pub fn ability(self) -> Option<Ability> {
        use AbilityEffect::*;
        use UnitKind::*;
        let ability = match self {
            InheritanceDrone => Ability::new(AbsorbFallen, 70.0, 0),
            EncapsulationShield => Ability::new(
                TagAllies {
                    effect: Effect::Shielded,
                    include_self: false,
                },
                80.0,
                2000,
            ),
            Buffer => Ability::new(
                TagAllies {
                    effect: Effect::Shielded,
                    include_self: false,
                },
                70.0,
                2000,
            ),
            AbstractionAgent => Ability::new(
                TagAllies {
                    effect: Effect::Hidden,
                    include_self: true,
                },
                90.0,
                3000,
            ),
            ReflectionSpy => Ability::new(
                TagTarget {
                    effect: Effect::Scanned,
                },
                f32::INFINITY,
                5000,
            ),
            CodeInjector => Ability::new(
                SabotageFactory {
                    damage: 20,
                    effect: Effect::Infected,
                },
                100.0,
                5000,
            ),
            DynamicDispatcher => Ability::new(
                TagAllies {
                    effect: Effect::Boosted,
                    include_self: false,
                },
                100.0,
                2000,
            ),
            DeadlockTrap => Ability::new(
                TagEnemies {
                    effect: Effect::Deadlocked,
                    min_targets: 2,
                    strip_buffs: false,
                },
                70.0,
                3000,
            ),
            LambdaSniper => {
                Ability::new(StrikeTarget { damage: 50 }, f32::INFINITY, 0).with_cooldown(8000)
            }
            HigherOrderCommander => Ability::new(
                TagAllies {
                    effect: Effect::Commanded,
                    include_self: true,
                },
                120.0,
                3000,
            ),
            ApiGateway => Ability::new(
                TagAllies {
                    effect: Effect::RangeBoosted,
                    include_self: true,
                },
                100.0,
                4000,
            ),
            WebsocketScout => Ability::new(
                TagAllEnemyUnits {
                    effect: Effect::Revealed,
                },
                f32::INFINITY,
                5000,
            ),
            RestfulHealer => Ability::new(
                HealAllies {
                    amount: 15,
                    cleanse: true,
                },
                90.0,
                0,
            ),
            Healer => Ability::new(
                HealAllies {
                    amount: 10,
                    cleanse: false,
                },
                80.0,
                0,
            ),
            Indexer => Ability::new(
                TagTarget {
                    effect: Effect::Indexed,
                },
                f32::INFINITY,
                4000,
            ),
            Assert => Ability::new(ExecuteTarget { threshold: 0.2 }, 60.0, 0),
            StaticCast => Ability::new(
                TagEnemies {
                    effect: Effect::Throttled,
                    min_targets: 1,
                    strip_buffs: true,
                },
                90.0,
                3000,
            ),
            SemaphoreController => Ability::new(
                TagEnemies {
                    effect: Effect::Throttled,
                    min_targets: 1,
                    strip_buffs: false,
                },
                80.0,
                3000,
            ),
            MutexGuardian => Ability::new(
                TagTarget {
                    effect: Effect::Deadlocked,
                },
                70.0,
                2000,
            )
            .with_cooldown(4000),
            Pointer => Ability::new(BlinkToTarget, 150.0, 0).with_cooldown(5000),
            ThreadPool => Ability::new(SpawnWorkers { count: 2 }, 0.0, 0).with_cooldown(8000),
            _ => return None,
        };
        Some(ability)
    }
}

/// Snapshot of the caster taken before mutating the world
#[derive(Debug, Clone, Copy)]
struct Caster {
    id: EntityId,
    owner: PlayerId,
    kind: UnitKind,
    x: f32,
    y: f32,
    attack_range: f32,
    target: Option<EntityId>,
}

impl World {
    fn units_within(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        pred: impl Fn(&Entity) -> bool,
    ) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::Unit && e.distance_to(x, y) < radius && pred(e))
            .map(|e| e.id)
            .collect()
    }

    /// Fire the unit's ability if it is off cooldown and has something to act on
    pub fn try_ability(&mut self, unit_id: EntityId) -> bool {
        let now = self.clock_ms;
        let Some(unit) = self.entities.get(&unit_id) else {
            return false;
        };
        let (Some(owner), Some(kind)) = (unit.owner, unit.unit_kind) else {
            return false;
        };
        let Some(ability) = kind.ability() else {
            return false;
        };
        if now < unit.next_ability_ms {
            return false;
        }

        let caster = Caster {
            id: unit_id,
            owner,
            kind,
            x: unit.x,
            y: unit.y,
            attack_range: unit.attack_range(now),
            target: unit.target_id.filter(|id| self.entities.contains_key(id)),
        };

        let fired = self.apply_ability(&caster, &ability, now);
        if fired {
            if let Some(unit) = self.entities.get_mut(&unit_id) {
                unit.next_ability_ms = now + ability.cooldown_ms;
                unit.ai_state = AiState::UsingAbility;
            }
        }
        fired
    }

    fn apply_ability(&mut self, caster: &Caster, ability: &Ability, now: u64) -> bool {
        let until = now + ability.duration_ms;
        let source = DamageSource {
            owner: caster.owner,
            unit_kind: Some(caster.kind),
        };
        let owner = caster.owner;

        match ability.effect {
            AbilityEffect::AbsorbFallen => {
                let absorbed: Vec<(i32, f32)> = self
                    .fallen
                    .iter()
                    .filter(|f| {
                        f.owner == owner && distance(f.x, f.y, caster.x, caster.y) < ability.radius
                    })
                    .map(|f| ((f.max_hp as f32 * ABSORB_HP_SHARE) as i32, f.speed))
                    .collect();
                if absorbed.is_empty() {
                    return false;
                }
                self.fallen.retain(|f| {
                    !(f.owner == owner && distance(f.x, f.y, caster.x, caster.y) < ability.radius)
                });
                if let Some(unit) = self.entities.get_mut(&caster.id) {
                    for (hp, speed) in absorbed {
                        unit.max_hp += hp;
                        unit.hp += hp;
                        unit.speed += speed * ABSORB_SPEED_SHARE;
                    }
                }
                true
            }

            AbilityEffect::TagAllies {
                effect,
                include_self,
            } => {
                let allies = self.units_within(caster.x, caster.y, ability.radius, |e| {
                    e.owner == Some(owner) && (include_self || e.id != caster.id)
                });
                for id in &allies {
                    if let Some(ally) = self.entities.get_mut(id) {
                        ally.effects.apply(effect, until);
                    }
                }
                !allies.is_empty()
            }

            AbilityEffect::TagEnemies {
                effect,
                min_targets,
                strip_buffs,
            } => {
                let enemies = self.units_within(caster.x, caster.y, ability.radius, |e| {
                    e.is_enemy_of(owner)
                });
                if enemies.len() < min_targets.max(1) {
                    return false;
                }
                for id in &enemies {
                    if let Some(enemy) = self.entities.get_mut(id) {
                        if strip_buffs {
                            enemy.effects.strip_buffs();
                        }
                        enemy.effects.apply(effect, until);
                    }
                }
                true
            }

            AbilityEffect::TagAllEnemyUnits { effect } => {
                let enemies = self.units_within(caster.x, caster.y, ability.radius, |e| {
                    e.is_enemy_of(owner)
                });
                for id in &enemies {
                    if let Some(enemy) = self.entities.get_mut(id) {
                        enemy.effects.apply(effect, until);
                    }
                }
                !enemies.is_empty()
            }

            AbilityEffect::TagTarget { effect } => {
                let Some(target) = self.target_in_reach(caster, ability.radius) else {
                    return false;
                };
                if let Some(target) = self.entities.get_mut(&target) {
                    target.effects.apply(effect, until);
                }
                true
            }

            AbilityEffect::StrikeTarget { damage } => {
                let Some(target) = self.target_in_reach(caster, ability.radius) else {
                    return false;
                };
                self.deal_damage(target, damage, Some(source));
                true
            }

            AbilityEffect::SabotageFactory { damage, effect } => {
                let factory = self
                    .entities
                    .values()
                    .find(|e| {
                        e.kind == EntityKind::Factory
                            && e.is_enemy_of(owner)
                            && e.distance_to(caster.x, caster.y) < ability.radius
                    })
                    .map(|e| e.id);
                let Some(factory) = factory else {
                    return false;
                };
                if let Some(entity) = self.entities.get_mut(&factory) {
                    entity.effects.apply(effect, until);
                }
                self.deal_damage(factory, damage, Some(source));
                true
            }

            AbilityEffect::HealAllies { amount, cleanse } => {
                let allies = self.units_within(caster.x, caster.y, ability.radius, |e| {
                    e.owner == Some(owner) && e.id != caster.id
                });
                for id in &allies {
                    if let Some(ally) = self.entities.get_mut(id) {
                        ally.heal(amount);
                        if cleanse {
                            ally.effects.cleanse();
                        }
                    }
                }
                !allies.is_empty()
            }

            AbilityEffect::ExecuteTarget { threshold } => {
                let Some(target) = self.target_in_reach(caster, ability.radius) else {
                    return false;
                };
                let Some(entity) = self.entities.get(&target) else {
                    return false;
                };
                let low = entity.kind == EntityKind::Unit
                    && entity.hp as f32 <= entity.max_hp as f32 * threshold;
                if !low {
                    return false;
                }
                let hp = entity.hp;
                self.deal_damage(target, hp, Some(source));
                true
            }

            AbilityEffect::BlinkToTarget => {
                let Some(target) = self.target_in_reach(caster, ability.radius) else {
                    return false;
                };
                let Some(entity) = self.entities.get(&target) else {
                    return false;
                };
                let dist = entity.distance_to(caster.x, caster.y);
                if dist <= caster.attack_range || dist <= f32::EPSILON {
                    return false;
                }
                let keep = (caster.attack_range - BLINK_MARGIN).max(0.0);
                let (tx, ty) = (entity.x, entity.y);
                let nx = tx + (caster.x - tx) / dist * keep;
                let ny = ty + (caster.y - ty) / dist * keep;
                if let Some(unit) = self.entities.get_mut(&caster.id) {
                    unit.x = nx;
                    unit.y = ny;
                }
                true
            }

            AbilityEffect::SpawnWorkers { count } => {
                let stats = UnitKind::WorkerThread.stats();
                for _ in 0..count {
                    let x = caster.x + self.rng.gen_range(-WORKER_JITTER..WORKER_JITTER);
                    let y = caster.y + self.rng.gen_range(-WORKER_JITTER..WORKER_JITTER);
                    self.spawn_unit(owner, UnitKind::WorkerThread, stats, x, y);
                }
                count > 0
            }
        }
    }

    /// The caster's current enemy target, if it is within `radius`
    fn target_in_reach(&self, caster: &Caster, radius: f32) -> Option<EntityId> {
        let target = self.entities.get(&caster.target?)?;
        (target.is_enemy_of(caster.owner) && target.distance_to(caster.x, caster.y) <= radius)
            .then_some(target.id)
    }
}

fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x1 - x2;
    let dy = y1 - y2;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::FallenUnit;
    use uuid::Uuid;

    fn world() -> (World, PlayerId, PlayerId) {
        let mut world = World::new(11);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        world.add_player(b, None, "b".into(), None);
        (world, a, b)
    }

    fn spawn(world: &mut World, owner: PlayerId, kind: UnitKind, x: f32, y: f32) -> EntityId {
        world.spawn_unit(owner, kind, kind.stats(), x, y)
    }

    #[test]
    fn shield_covers_allies_but_not_caster() {
        let (mut world, a, _) = world();
        let shield = spawn(&mut world, a, UnitKind::EncapsulationShield, 800.0, 400.0);
        let ally = spawn(&mut world, a, UnitKind::Tank, 830.0, 400.0);
        let far = spawn(&mut world, a, UnitKind::Tank, 1000.0, 400.0);

        assert!(world.try_ability(shield));
        let now = world.clock_ms;
        assert!(world.entities[&ally].effects.has(Effect::Shielded, now));
        assert!(!world.entities[&far].effects.has(Effect::Shielded, now));
        assert!(!world.entities[&shield].effects.has(Effect::Shielded, now));

        // on cooldown
        assert!(!world.try_ability(shield));
    }

    #[test]
    fn lone_caster_does_not_burn_cooldown() {
        let (mut world, a, _) = world();
        let dispatcher = spawn(&mut world, a, UnitKind::DynamicDispatcher, 800.0, 400.0);
        assert!(!world.try_ability(dispatcher));
        assert_eq!(world.entities[&dispatcher].next_ability_ms, 0);
    }

    #[test]
    fn deadlock_needs_two_enemies() {
        let (mut world, a, b) = world();
        let trap = spawn(&mut world, a, UnitKind::DeadlockTrap, 800.0, 400.0);
        let first = spawn(&mut world, b, UnitKind::Scout, 820.0, 400.0);
        assert!(!world.try_ability(trap));

        let second = spawn(&mut world, b, UnitKind::Scout, 780.0, 400.0);
        assert!(world.try_ability(trap));
        let now = world.clock_ms;
        assert_eq!(world.entities[&first].effective_speed(now), 0.0);
        assert_eq!(world.entities[&second].effective_speed(now), 0.0);
    }

    #[test]
    fn lambda_sniper_strikes_and_waits_longer() {
        let (mut world, a, b) = world();
        let sniper = spawn(&mut world, a, UnitKind::LambdaSniper, 600.0, 400.0);
        let tank = spawn(&mut world, b, UnitKind::Tank, 1000.0, 400.0);
        world.entities.get_mut(&sniper).unwrap().target_id = Some(tank);

        assert!(world.try_ability(sniper));
        assert_eq!(world.entities[&tank].hp, 100);
        assert_eq!(world.entities[&sniper].next_ability_ms, 8000);
    }

    #[test]
    fn assert_executes_only_low_hp_units() {
        let (mut world, a, b) = world();
        let assert_unit = spawn(&mut world, a, UnitKind::Assert, 800.0, 400.0);
        let victim = spawn(&mut world, b, UnitKind::Tank, 840.0, 400.0);
        world.entities.get_mut(&assert_unit).unwrap().target_id = Some(victim);

        assert!(!world.try_ability(assert_unit));
        world.entities.get_mut(&victim).unwrap().hp = 30;
        assert!(world.try_ability(assert_unit));
        world.resolve_deaths();
        assert!(!world.entities.contains_key(&victim));
        assert_eq!(world.players[&a].stats.units_killed, 1);
    }

    #[test]
    fn static_cast_strips_buffs_and_throttles() {
        let (mut world, a, b) = world();
        let cast = spawn(&mut world, a, UnitKind::StaticCast, 800.0, 400.0);
        let enemy = spawn(&mut world, b, UnitKind::Ranged, 850.0, 400.0);
        world
            .entities
            .get_mut(&enemy)
            .unwrap()
            .effects
            .apply(Effect::Boosted, 10_000);

        assert!(world.try_ability(cast));
        let enemy = &world.entities[&enemy];
        assert!(!enemy.effects.has(Effect::Boosted, 0));
        assert!(enemy.effects.has(Effect::Throttled, 0));
    }

    #[test]
    fn inheritance_drone_absorbs_fallen_allies() {
        let (mut world, a, _) = world();
        let drone = spawn(&mut world, a, UnitKind::InheritanceDrone, 800.0, 400.0);
        world.fallen.push(FallenUnit {
            owner: a,
            x: 820.0,
            y: 400.0,
            max_hp: 150,
            speed: 50.0,
        });

        assert!(world.try_ability(drone));
        let drone = &world.entities[&drone];
        assert_eq!(drone.max_hp, 75);
        assert_eq!(drone.hp, 75);
        assert!((drone.speed - 90.0).abs() < 1e-3);
        assert!(world.fallen.is_empty());
    }

    #[test]
    fn code_injector_damages_and_infects_factory() {
        let (mut world, a, b) = world();
        let factory = world
            .entities
            .values()
            .find(|e| e.kind == EntityKind::Factory && e.owner == Some(b))
            .unwrap()
            .id;
        let (fx, fy) = (world.entities[&factory].x, world.entities[&factory].y);
        let injector = spawn(&mut world, a, UnitKind::CodeInjector, fx - 50.0, fy);

        assert!(world.try_ability(injector));
        let factory = &world.entities[&factory];
        assert_eq!(factory.hp, 180);
        assert!(factory.effects.has(Effect::Infected, 0));
    }

    #[test]
    fn thread_pool_spawns_workers() {
        let (mut world, a, _) = world();
        let pool = spawn(&mut world, a, UnitKind::ThreadPool, 800.0, 400.0);
        assert!(world.try_ability(pool));
        let workers = world
            .entities
            .values()
            .filter(|e| e.unit_kind == Some(UnitKind::WorkerThread))
            .count();
        assert_eq!(workers, 2);
    }

    #[test]
    fn pointer_blinks_into_range() {
        let (mut world, a, b) = world();
        let pointer = spawn(&mut world, a, UnitKind::Pointer, 800.0, 400.0);
        let target = spawn(&mut world, b, UnitKind::Tank, 920.0, 400.0);
        world.entities.get_mut(&pointer).unwrap().target_id = Some(target);

        assert!(world.try_ability(pointer));
        let pointer = &world.entities[&pointer];
        assert!((pointer.x - 885.0).abs() < 1e-3);
    }
}
