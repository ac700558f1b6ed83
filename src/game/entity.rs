//! Entities living on the battlefield and their timed status effects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{FactoryKind, ResourceKind, UnitKind, UnitStats};

/// Player identity inside a match (the connecting session's id)
pub type PlayerId = Uuid;

/// Entity id, unique and increasing within one match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Base,
    Factory,
    Unit,
    ResourceNode,
}

impl EntityKind {
    /// Targeting priority, lower is preferred
    pub fn target_priority(self) -> u8 {
        match self {
            EntityKind::Unit => 1,
            EntityKind::Factory => 2,
            EntityKind::Base => 3,
            EntityKind::ResourceNode => u8::MAX,
        }
    }

    pub fn is_building(self) -> bool {
        matches!(self, EntityKind::Base | EntityKind::Factory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiState {
    #[default]
    Idle,
    MovingToTarget,
    Attacking,
    UsingAbility,
}

/// Timed status effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Incoming damage halved
    Shielded,
    /// Not targetable
    Hidden,
    Scanned,
    /// Factory production at half speed
    Infected,
    /// Attack rate x1.5
    Boosted,
    /// Cannot move
    Deadlocked,
    /// +20% damage
    Commanded,
    /// +30 attack range
    RangeBoosted,
    Revealed,
    /// +25% damage taken
    Indexed,
    /// Attack rate x0.5
    Throttled,
}

impl Effect {
    pub fn is_buff(self) -> bool {
        matches!(
            self,
            Effect::Shielded
                | Effect::Hidden
                | Effect::Boosted
                | Effect::Commanded
                | Effect::RangeBoosted
        )
    }

    /// Effects a cleanse removes
    pub fn is_cleansable(self) -> bool {
        matches!(self, Effect::Deadlocked | Effect::Infected | Effect::Throttled)
    }
}

/// Set of (effect, expiry) pairs; an effect is active while `now < until`
#[derive(Debug, Clone, Default)]
pub struct StatusEffects {
    active: Vec<(Effect, u64)>,
}

impl StatusEffects {
    /// Apply an effect, keeping the later expiry if it is already active
    pub fn apply(&mut self, effect: Effect, until_ms: u64) {
        match self.active.iter_mut().find(|(e, _)| *e == effect) {
            Some((_, until)) => *until = (*until).max(until_ms),
            None => self.active.push((effect, until_ms)),
        }
    }

    pub fn has(&self, effect: Effect, now_ms: u64) -> bool {
        self.active
            .iter()
            .any(|(e, until)| *e == effect && now_ms < *until)
    }

    pub fn remove(&mut self, effect: Effect) {
        self.active.retain(|(e, _)| *e != effect);
    }

    /// Drop expired effects
    pub fn prune(&mut self, now_ms: u64) {
        self.active.retain(|(_, until)| now_ms < *until);
    }

    /// Remove every buff, returns how many were removed
    pub fn strip_buffs(&mut self) -> usize {
        let before = self.active.len();
        self.active.retain(|(e, _)| !e.is_buff());
        before - self.active.len()
    }

    pub fn cleanse(&mut self) {
        self.active.retain(|(e, _)| !e.is_cleansable());
    }

    pub fn active(&self, now_ms: u64) -> impl Iterator<Item = Effect> + '_ {
        self.active
            .iter()
            .filter(move |(_, until)| now_ms < *until)
            .map(|(e, _)| *e)
    }
}

/// Anything on the map
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    /// `None` for neutral
    pub owner: Option<PlayerId>,
    pub hp: i32,
    pub max_hp: i32,

    pub resource: Option<ResourceKind>,
    pub resource_amount: i32,
    pub unit_kind: Option<UnitKind>,
    pub factory_kind: Option<FactoryKind>,

    pub move_target: Option<(f32, f32)>,
    pub speed: f32,
    /// Per-entity so factory modifiers and inheritance survive
    pub damage: i32,

    pub ai_state: AiState,
    pub target_id: Option<EntityId>,
    pub attacking_target_id: Option<EntityId>,
    pub last_attack_ms: Option<u64>,
    /// Earliest time the next ability may fire
    pub next_ability_ms: u64,
    pub effects: StatusEffects,
    /// Recursion depth for splitting units
    pub split_depth: u8,
}

impl Entity {
    fn blank(id: EntityId, kind: EntityKind, x: f32, y: f32, owner: Option<PlayerId>) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            owner,
            hp: 0,
            max_hp: 0,
            resource: None,
            resource_amount: 0,
            unit_kind: None,
            factory_kind: None,
            move_target: None,
            speed: 0.0,
            damage: 0,
            ai_state: AiState::Idle,
            target_id: None,
            attacking_target_id: None,
            last_attack_ms: None,
            next_ability_ms: 0,
            effects: StatusEffects::default(),
            split_depth: 0,
        }
    }

    pub fn base(id: EntityId, owner: PlayerId, x: f32, y: f32) -> Self {
        Self {
            hp: 1000,
            max_hp: 1000,
            speed: 15.0,
            ..Self::blank(id, EntityKind::Base, x, y, Some(owner))
        }
    }

    pub fn factory(id: EntityId, owner: PlayerId, factory_kind: FactoryKind, x: f32, y: f32) -> Self {
        Self {
            hp: 200,
            max_hp: 200,
            speed: 35.0,
            factory_kind: Some(factory_kind),
            ..Self::blank(id, EntityKind::Factory, x, y, Some(owner))
        }
    }

    pub fn resource_node(id: EntityId, resource: ResourceKind, x: f32, y: f32) -> Self {
        Self {
            hp: 100,
            max_hp: 100,
            resource: Some(resource),
            resource_amount: 1000,
            ..Self::blank(id, EntityKind::ResourceNode, x, y, None)
        }
    }

    /// A unit using the given (possibly factory-modified) stats
    pub fn unit(
        id: EntityId,
        owner: PlayerId,
        unit_kind: UnitKind,
        stats: UnitStats,
        x: f32,
        y: f32,
    ) -> Self {
        Self {
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            speed: stats.speed,
            damage: stats.damage,
            unit_kind: Some(unit_kind),
            ..Self::blank(id, EntityKind::Unit, x, y, Some(owner))
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn is_enemy_of(&self, player: PlayerId) -> bool {
        matches!(self.owner, Some(owner) if owner != player)
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance(&self, other: &Entity) -> f32 {
        self.distance_to(other.x, other.y)
    }

    /// Catalog stats for units, `None` for everything else
    pub fn stats(&self) -> Option<UnitStats> {
        self.unit_kind.map(UnitKind::stats)
    }

    /// Attack range including a range boost
    pub fn attack_range(&self, now_ms: u64) -> f32 {
        let base = self.stats().map(|s| s.attack_range).unwrap_or(0.0);
        if self.effects.has(Effect::RangeBoosted, now_ms) {
            base + 30.0
        } else {
            base
        }
    }

    /// Milliseconds between attacks after boost and throttle
    pub fn attack_interval_ms(&self, now_ms: u64) -> Option<u64> {
        let stats = self.stats()?;
        if stats.attack_speed <= 0.0 {
            return None;
        }
        let mut rate = stats.attack_speed;
        if self.effects.has(Effect::Boosted, now_ms) {
            rate *= 1.5;
        }
        if self.effects.has(Effect::Throttled, now_ms) {
            rate *= 0.5;
        }
        Some((1000.0 / rate) as u64)
    }

    /// Movement speed, zero while deadlocked
    pub fn effective_speed(&self, now_ms: u64) -> f32 {
        if self.effects.has(Effect::Deadlocked, now_ms) {
            0.0
        } else {
            self.speed
        }
    }

    pub fn heal(&mut self, amount: i32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }
}
