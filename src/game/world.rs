//! Authoritative world state for one match

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use super::catalog::{FactoryKind, ResourceKind, UnitKind, UnitStats};
use super::economy::{default_deck, deck_from_selection, PlayerState};
use super::entity::{Entity, EntityId, EntityKind, PlayerId};
use super::production::ProductionQueue;

pub const MAX_PLAYERS: usize = 2;

const PROMISE_BLAST_RADIUS: f32 = 80.0;
const PROMISE_BLAST_DAMAGE: i32 = 15;
const MAX_SPLIT_DEPTH: u8 = 2;
const SPLIT_JITTER: f32 = 20.0;
const ROLLBACK_RADIUS: f32 = 100.0;
const GC_REFUND_MEMORY: i32 = 3;
const GC_REFUND_CPU: i32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct MapConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 800.0,
        }
    }
}

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    BaseDestroyed,
    Surrender,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub winner: Option<PlayerId>,
    pub reason: EndReason,
}

/// A unit that died this tick, kept for inheritance
#[derive(Debug, Clone)]
pub struct FallenUnit {
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub max_hp: i32,
    pub speed: f32,
}

/// Who dealt the killing blow
#[derive(Debug, Clone, Copy)]
pub struct DamageSource {
    pub owner: PlayerId,
    pub unit_kind: Option<UnitKind>,
}

/// Match world (owned by the match task)
pub struct World {
    pub map: MapConfig,
    pub seed: u64,
    pub tick: u64,
    /// Simulated milliseconds since the match started
    pub clock_ms: u64,
    pub entities: BTreeMap<EntityId, Entity>,
    pub players: HashMap<PlayerId, PlayerState>,
    /// Join order, first entry plays from the left
    pub player_order: Vec<PlayerId>,
    pub queues: BTreeMap<EntityId, ProductionQueue>,
    pub fallen: Vec<FallenUnit>,
    pub rng: ChaCha8Rng,
    pub outcome: Option<MatchOutcome>,
    next_id: u64,
    elapsed_micros: u64,
    next_income_micros: u64,
    dying: Vec<(EntityId, Option<DamageSource>)>,
}

impl World {
    pub fn new(seed: u64) -> Self {
        let mut world = Self {
            map: MapConfig::default(),
            seed,
            tick: 0,
            clock_ms: 0,
            entities: BTreeMap::new(),
            players: HashMap::new(),
            player_order: Vec::new(),
            queues: BTreeMap::new(),
            fallen: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            outcome: None,
            next_id: 1,
            elapsed_micros: 0,
            next_income_micros: 1_000_000,
            dying: Vec::new(),
        };
        world.seed_resource_nodes();
        world
    }

    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    fn seed_resource_nodes(&mut self) {
        let nodes = [
            (ResourceKind::Memory, 400.0, 200.0),
            (ResourceKind::Memory, 1200.0, 600.0),
            (ResourceKind::Cpu, 400.0, 600.0),
            (ResourceKind::Cpu, 1200.0, 200.0),
            (ResourceKind::Memory, 800.0, 300.0),
            (ResourceKind::Cpu, 800.0, 500.0),
        ];
        for (resource, x, y) in nodes {
            let id = self.next_entity_id();
            self.entities
                .insert(id, Entity::resource_node(id, resource, x, y));
        }
    }

    /// Add a player with base, factory and opening hand. Returns false when full or already present.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        profile_id: Option<Uuid>,
        name: String,
        selected_deck: Option<&[String]>,
    ) -> bool {
        if self.players.contains_key(&id) || self.players.len() >= MAX_PLAYERS {
            return false;
        }

        let deck = match selected_deck {
            Some(selected) if !selected.is_empty() => deck_from_selection(selected, &mut self.rng),
            _ => default_deck(&mut self.rng),
        };
        let mut player = PlayerState::new(id, profile_id, name, deck, &mut self.rng);
        player.draw_card(&mut self.rng);

        let (base_x, factory_x) = if self.player_order.is_empty() {
            (150.0, 210.0)
        } else {
            (1450.0, 1390.0)
        };
        let y = self.map.height / 2.0;

        let base_id = self.next_entity_id();
        self.entities.insert(base_id, Entity::base(base_id, id, base_x, y));
        self.spawn_factory(id, FactoryKind::Standard, factory_x, y);

        self.players.insert(id, player);
        self.player_order.push(id);
        info!(player_id = %id, "Player seeded into world");
        true
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.player_order.iter().copied().find(|p| *p != player)
    }

    pub fn base_of(&self, player: PlayerId) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| e.kind == EntityKind::Base && e.owner == Some(player))
    }

    pub fn spawn_factory(
        &mut self,
        owner: PlayerId,
        factory_kind: FactoryKind,
        x: f32,
        y: f32,
    ) -> EntityId {
        let id = self.next_entity_id();
        self.entities
            .insert(id, Entity::factory(id, owner, factory_kind, x, y));
        self.queues.insert(id, ProductionQueue::default());
        id
    }

    pub fn spawn_unit(
        &mut self,
        owner: PlayerId,
        unit_kind: UnitKind,
        stats: UnitStats,
        x: f32,
        y: f32,
    ) -> EntityId {
        let id = self.next_entity_id();
        self.entities
            .insert(id, Entity::unit(id, owner, unit_kind, stats, x, y));
        if let Some(player) = self.players.get_mut(&owner) {
            player.stats.units_created += 1;
        }
        id
    }

    /// Subtract hp, queueing the entity for removal once it reaches zero
    pub fn deal_damage(&mut self, target: EntityId, amount: i32, source: Option<DamageSource>) {
        let Some(entity) = self.entities.get_mut(&target) else {
            return;
        };
        if !entity.is_alive() {
            return;
        }
        entity.hp -= amount;
        if !entity.is_alive() {
            self.dying.push((target, source));
        }
    }

    /// Remove every entity at zero hp, running on-death effects until none are left
    pub fn resolve_deaths(&mut self) {
        while let Some((id, source)) = self.dying.pop() {
            let Some(dead) = self.entities.remove(&id) else {
                continue;
            };
            self.queues.remove(&id);

            if dead.kind == EntityKind::Unit {
                if let Some(owner) = dead.owner {
                    self.fallen.push(FallenUnit {
                        owner,
                        x: dead.x,
                        y: dead.y,
                        max_hp: dead.max_hp,
                        speed: dead.speed,
                    });
                    if let Some(player) = self.players.get_mut(&owner) {
                        player.stats.units_lost += 1;
                    }
                }
                if let Some(source) = source {
                    if let Some(killer) = self.players.get_mut(&source.owner) {
                        killer.stats.units_killed += 1;
                    }
                }
                self.on_unit_death(&dead);
            }

            if let Some(source) = source {
                if source.unit_kind == Some(UnitKind::GarbageCollector) {
                    if let Some(player) = self.players.get_mut(&source.owner) {
                        player.refund(GC_REFUND_MEMORY, GC_REFUND_CPU);
                    }
                }
            }

            debug!(entity_id = %id, kind = ?dead.kind, "Entity destroyed");

            if dead.kind == EntityKind::Base {
                self.check_base_victory();
            }
        }
    }

    fn on_unit_death(&mut self, dead: &Entity) {
        let Some(owner) = dead.owner else {
            return;
        };
        match dead.unit_kind {
            Some(UnitKind::PromiseKnight) => {
                let victims: Vec<EntityId> = self
                    .entities
                    .values()
                    .filter(|e| {
                        e.kind == EntityKind::Unit
                            && e.is_enemy_of(owner)
                            && e.distance(dead) < PROMISE_BLAST_RADIUS
                    })
                    .map(|e| e.id)
                    .collect();
                let source = DamageSource {
                    owner,
                    unit_kind: dead.unit_kind,
                };
                for victim in victims {
                    self.deal_damage(victim, PROMISE_BLAST_DAMAGE, Some(source));
                }
            }
            Some(UnitKind::RecursiveBomb) if dead.split_depth < MAX_SPLIT_DEPTH => {
                let base = UnitKind::RecursiveBomb.stats();
                let stats = UnitStats {
                    max_hp: base.max_hp / 2,
                    damage: base.damage / 2,
                    ..base
                };
                for _ in 0..2 {
                    let x = dead.x + self.rng.gen_range(-SPLIT_JITTER..SPLIT_JITTER);
                    let y = dead.y + self.rng.gen_range(-SPLIT_JITTER..SPLIT_JITTER);
                    let id = self.spawn_unit(owner, UnitKind::RecursiveBomb, stats, x, y);
                    if let Some(bomb) = self.entities.get_mut(&id) {
                        bomb.split_depth = dead.split_depth + 1;
                    }
                }
            }
            Some(UnitKind::TransactionGuard) => {
                for node in self.entities.values_mut().filter(|e| {
                    e.kind == EntityKind::ResourceNode
                        && e.owner == Some(owner)
                        && e.distance_to(dead.x, dead.y) < ROLLBACK_RADIUS
                }) {
                    node.owner = None;
                }
            }
            _ => {}
        }
    }

    /// Declare the winner once a single base remains; fires at most once
    fn check_base_victory(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let mut bases = self.entities.values().filter(|e| e.kind == EntityKind::Base);
        if let (Some(survivor), None) = (bases.next(), bases.next()) {
            self.outcome = Some(MatchOutcome {
                winner: survivor.owner,
                reason: EndReason::BaseDestroyed,
            });
            info!(winner = ?survivor.owner, "Last base standing");
        }
    }

    /// End the match early with the other player as winner
    pub fn forfeit(&mut self, loser: PlayerId, reason: EndReason) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(MatchOutcome {
            winner: self.opponent_of(loser),
            reason,
        });
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Advance the simulation by `delta` seconds
    pub fn step(&mut self, delta: f32) {
        if self.is_over() {
            return;
        }
        self.tick += 1;
        self.elapsed_micros += (delta * 1_000_000.0).round() as u64;
        self.clock_ms = self.elapsed_micros / 1000;
        self.fallen.clear();

        for player in self.players.values_mut() {
            player.tick_cooldown(delta);
        }

        while self.elapsed_micros >= self.next_income_micros {
            self.next_income_micros += 1_000_000;
            self.apply_passive_income();
        }

        self.tick_production(delta);

        let unit_ids: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Unit)
            .map(|e| e.id)
            .collect();
        for unit_id in unit_ids {
            if self.is_over() {
                break;
            }
            self.run_unit_ai(unit_id, delta);
            self.resolve_deaths();
        }

        self.move_buildings(delta);
        self.capture_resource_nodes();
        self.resolve_deaths();

        let now = self.clock_ms;
        for entity in self.entities.values_mut() {
            entity.effects.prune(now);
            entity.hp = entity.hp.clamp(0, entity.max_hp);
        }
        for player in self.players.values_mut() {
            player.memory = player.memory.max(0);
            player.cpu = player.cpu.max(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_world() -> (World, PlayerId, PlayerId) {
        let mut world = World::new(7);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(world.add_player(a, None, "a".into(), None));
        assert!(world.add_player(b, None, "b".into(), None));
        (world, a, b)
    }

    #[test]
    fn seeding_places_nodes_bases_and_factories() {
        let (world, a, b) = two_player_world();
        let count = |kind| world.entities.values().filter(|e| e.kind == kind).count();
        assert_eq!(count(EntityKind::ResourceNode), 6);
        assert_eq!(count(EntityKind::Base), 2);
        assert_eq!(count(EntityKind::Factory), 2);
        assert_eq!(world.base_of(a).unwrap().x, 150.0);
        assert_eq!(world.base_of(b).unwrap().x, 1450.0);
        assert!(world
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::ResourceNode)
            .all(|e| e.owner.is_none() && e.resource_amount == 1000));
    }

    #[test]
    fn third_player_is_rejected() {
        let (mut world, a, _) = two_player_world();
        assert!(!world.add_player(Uuid::new_v4(), None, "c".into(), None));
        assert!(!world.add_player(a, None, "a".into(), None));
    }

    #[test]
    fn passive_income_accrues_per_simulated_second() {
        let (mut world, a, _) = two_player_world();
        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        let player = &world.players[&a];
        assert_eq!(player.memory, 210);
        assert_eq!(player.cpu, 110);
    }

    #[test]
    fn base_victory_fires_exactly_once() {
        let (mut world, a, b) = two_player_world();
        let base_b = world.base_of(b).unwrap().id;
        world.deal_damage(base_b, 5000, None);
        world.resolve_deaths();
        assert_eq!(
            world.outcome,
            Some(MatchOutcome {
                winner: Some(a),
                reason: EndReason::BaseDestroyed
            })
        );

        let base_a = world.base_of(a).unwrap().id;
        world.deal_damage(base_a, 5000, None);
        world.resolve_deaths();
        assert_eq!(world.outcome.unwrap().winner, Some(a));
    }

    #[test]
    fn recursive_bomb_splits_twice_at_most() {
        let (mut world, a, b) = two_player_world();
        let stats = UnitKind::RecursiveBomb.stats();
        let bomb = world.spawn_unit(a, UnitKind::RecursiveBomb, stats, 800.0, 400.0);
        let killer = Some(DamageSource {
            owner: b,
            unit_kind: Some(UnitKind::Tank),
        });

        world.deal_damage(bomb, 100, killer);
        world.resolve_deaths();
        let children: Vec<EntityId> = world
            .entities
            .values()
            .filter(|e| e.unit_kind == Some(UnitKind::RecursiveBomb))
            .map(|e| e.id)
            .collect();
        assert_eq!(children.len(), 2);
        assert!(world.entities.values().all(|e| e.unit_kind != Some(UnitKind::RecursiveBomb)
            || (e.max_hp == stats.max_hp / 2 && e.split_depth == 1)));

        for child in children {
            world.deal_damage(child, 100, killer);
        }
        world.resolve_deaths();
        assert_eq!(
            world
                .entities
                .values()
                .filter(|e| e.split_depth == 2)
                .count(),
            4
        );

        let grandchildren: Vec<EntityId> = world
            .entities
            .values()
            .filter(|e| e.split_depth == 2)
            .map(|e| e.id)
            .collect();
        for id in grandchildren {
            world.deal_damage(id, 100, killer);
        }
        world.resolve_deaths();
        assert!(world
            .entities
            .values()
            .all(|e| e.unit_kind != Some(UnitKind::RecursiveBomb)));
        assert_eq!(world.players[&b].stats.units_killed, 7);
        assert_eq!(world.players[&a].stats.units_lost, 7);
    }

    #[test]
    fn transaction_guard_death_reverts_nearby_nodes() {
        let (mut world, a, _) = two_player_world();
        let node_id = *world
            .entities
            .iter()
            .find(|(_, e)| e.kind == EntityKind::ResourceNode)
            .unwrap()
            .0;
        let (nx, ny) = {
            let node = world.entities.get_mut(&node_id).unwrap();
            node.owner = Some(a);
            (node.x, node.y)
        };
        let guard = world.spawn_unit(
            a,
            UnitKind::TransactionGuard,
            UnitKind::TransactionGuard.stats(),
            nx + 50.0,
            ny,
        );
        world.deal_damage(guard, 500, None);
        world.resolve_deaths();
        assert_eq!(world.entities[&node_id].owner, None);
    }

    #[test]
    fn garbage_collector_kill_refunds_resources() {
        let (mut world, a, b) = two_player_world();
        let victim = world.spawn_unit(b, UnitKind::Scout, UnitKind::Scout.stats(), 800.0, 400.0);
        let before = (world.players[&a].memory, world.players[&a].cpu);
        world.deal_damage(
            victim,
            100,
            Some(DamageSource {
                owner: a,
                unit_kind: Some(UnitKind::GarbageCollector),
            }),
        );
        world.resolve_deaths();
        let after = (world.players[&a].memory, world.players[&a].cpu);
        assert_eq!(after, (before.0 + 3, before.1 + 2));
    }
}
