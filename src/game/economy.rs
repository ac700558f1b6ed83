//! Player resources, cards and passive income

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::catalog::{CardKind, ResourceKind, UnitKind};
use super::entity::{EntityKind, PlayerId};
use super::world::World;

pub const STARTING_MEMORY: i32 = 200;
pub const STARTING_CPU: i32 = 100;
pub const PASSIVE_MEMORY_PER_SEC: i32 = 5;
pub const PASSIVE_CPU_PER_SEC: i32 = 5;
/// Seconds between accepted card plays
pub const GLOBAL_COOLDOWN_SECS: f32 = 1.5;
/// Consumable cards held besides the permanent factory card
pub const HAND_SIZE: usize = 4;

const CLONER_RADIUS: f32 = 100.0;
const MINER_RADIUS: f32 = 150.0;

/// One card instance, alive for a single match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub kind: CardKind,
    pub memory_cost: i32,
    pub cpu_cost: i32,
    pub production_time: f32,
    /// Never consumed, always held in slot 0
    #[serde(default)]
    pub permanent: bool,
}

impl Card {
    pub fn new<R: Rng + ?Sized>(kind: CardKind, rng: &mut R) -> Self {
        let def = kind.definition();
        Self {
            id: Uuid::from_u128(rng.gen()),
            kind,
            memory_cost: def.memory_cost,
            cpu_cost: def.cpu_cost,
            production_time: def.production_time,
            permanent: false,
        }
    }

    pub fn permanent_factory<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            permanent: true,
            ..Self::new(CardKind::BuildFactory, rng)
        }
    }
}

/// A card taken from the hand, remembering where it sat
#[derive(Debug, Clone)]
pub struct PlayedCard {
    pub card: Card,
    pub slot: usize,
}

/// End-of-game counters per player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub units_created: u32,
    pub units_lost: u32,
    pub units_killed: u32,
    pub factories_built: u32,
    pub resources_captured: u32,
    pub cards_played: u32,
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    /// Persistent profile, when the session logged in
    pub profile_id: Option<Uuid>,
    pub name: String,
    pub memory: i32,
    pub cpu: i32,
    pub deck: VecDeque<Card>,
    pub hand: Vec<Card>,
    pub discard: Vec<Card>,
    /// Seconds until the next card may be played
    pub global_cooldown: f32,
    pub stats: PlayerStats,
}

impl PlayerState {
    pub fn new<R: Rng + ?Sized>(
        id: PlayerId,
        profile_id: Option<Uuid>,
        name: String,
        deck: Vec<Card>,
        rng: &mut R,
    ) -> Self {
        Self {
            id,
            profile_id,
            name,
            memory: STARTING_MEMORY,
            cpu: STARTING_CPU,
            deck: deck.into_iter().filter(|c| !c.permanent).collect(),
            hand: vec![Card::permanent_factory(rng)],
            discard: Vec::new(),
            global_cooldown: 0.0,
            stats: PlayerStats::default(),
        }
    }

    pub fn can_afford(&self, memory_cost: i32, cpu_cost: i32) -> bool {
        self.memory >= memory_cost && self.cpu >= cpu_cost
    }

    /// Deduct a cost, leaving the player untouched when it cannot be paid
    pub fn deduct_cost(&mut self, memory_cost: i32, cpu_cost: i32) -> bool {
        if !self.can_afford(memory_cost, cpu_cost) {
            return false;
        }
        self.memory -= memory_cost;
        self.cpu -= cpu_cost;
        true
    }

    pub fn refund(&mut self, memory: i32, cpu: i32) {
        self.memory += memory;
        self.cpu += cpu;
    }

    pub fn tick_cooldown(&mut self, delta: f32) {
        self.global_cooldown = (self.global_cooldown - delta).max(0.0);
    }

    pub fn on_cooldown(&self) -> bool {
        self.global_cooldown > 0.0
    }

    fn consumables_in_hand(&self) -> usize {
        self.hand.iter().filter(|c| !c.permanent).count()
    }

    /// Refill the hand up to its cap, reshuffling the discard pile when the deck runs dry
    pub fn draw_card<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !self.hand.first().map(|c| c.permanent).unwrap_or(false) {
            match self.hand.iter().position(|c| c.permanent) {
                Some(pos) => {
                    let card = self.hand.remove(pos);
                    self.hand.insert(0, card);
                }
                None => self.hand.insert(0, Card::permanent_factory(rng)),
            }
        }

        while self.consumables_in_hand() < HAND_SIZE {
            if self.deck.is_empty() {
                if self.discard.is_empty() {
                    return;
                }
                let mut recycled: Vec<Card> = self.discard.drain(..).collect();
                recycled.shuffle(rng);
                self.deck.extend(recycled);
            }

            match self.deck.pop_front() {
                Some(card) => self.hand.push(card),
                None => return,
            }
        }
    }

    /// Take a card out of the hand; consumables move to the discard pile
    pub fn play_card(&mut self, card_id: Uuid) -> Option<PlayedCard> {
        let slot = self.hand.iter().position(|c| c.id == card_id)?;
        let card = self.hand.remove(slot);
        if !card.permanent {
            self.discard.push(card.clone());
        }
        Some(PlayedCard { card, slot })
    }

    /// Undo a `play_card`, putting the card back where it was
    pub fn refund_card(&mut self, played: PlayedCard) {
        if !played.card.permanent {
            if let Some(pos) = self.discard.iter().rposition(|c| c.id == played.card.id) {
                self.discard.remove(pos);
            }
        }
        let slot = played.slot.min(self.hand.len());
        self.hand.insert(slot, played.card);
    }
}

/// The fixed mixed deck used when no cards are selected
pub fn default_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    use CardKind::*;
    let kinds = [
        SpawnScout,
        SpawnTank,
        SpawnRanged,
        SpawnAllocator,
        SpawnAllocator,
        SpawnGarbageCollector,
        SpawnBasicProcess,
        SpawnBasicProcess,
        SpawnInheritanceDrone,
        SpawnPolymorphWarrior,
        SpawnEncapsulationShield,
        SpawnAbstractionAgent,
        SpawnReflectionSpy,
        SpawnCodeInjector,
        SpawnDynamicDispatcher,
        SpawnCoroutineArcher,
        SpawnPromiseKnight,
        SpawnDeadlockTrap,
        SpawnLambdaSniper,
        SpawnRecursiveBomb,
        SpawnHigherOrderCommander,
        SpawnApiGateway,
        SpawnWebsocketScout,
        SpawnRestfulHealer,
        SpawnCacheRunner,
        SpawnIndexer,
        SpawnTransactionGuard,
    ];
    let mut deck: Vec<Card> = kinds.iter().map(|k| Card::new(*k, rng)).collect();
    deck.shuffle(rng);
    deck
}

pub const MAX_SELECTED_CARDS: usize = 10;
pub const MIN_DECK_SIZE: usize = 20;

/// Two copies of each selected card, padded with basic processes
pub fn deck_from_selection<R: Rng + ?Sized>(selected: &[String], rng: &mut R) -> Vec<Card> {
    let mut deck = Vec::new();
    for kind in selected
        .iter()
        .filter_map(|name| CardKind::parse(name))
        .filter(|kind| *kind != CardKind::BuildFactory)
        .take(MAX_SELECTED_CARDS)
    {
        deck.push(Card::new(kind, rng));
        deck.push(Card::new(kind, rng));
    }
    while deck.len() < MIN_DECK_SIZE {
        deck.push(Card::new(CardKind::SpawnBasicProcess, rng));
    }
    deck.shuffle(rng);
    deck
}

impl World {
    /// Once per simulated second: trickle, node income and unit generation
    pub fn apply_passive_income(&mut self) {
        let mut income: Vec<(PlayerId, i32, i32)> = Vec::new();

        for player_id in self.players.keys() {
            income.push((*player_id, PASSIVE_MEMORY_PER_SEC, PASSIVE_CPU_PER_SEC));
        }

        let nodes: Vec<_> = self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::ResourceNode)
            .filter_map(|e| Some((e.owner?, e.resource?, e.x, e.y)))
            .collect();

        for (owner, resource, x, y) in &nodes {
            let cloned = self.entities.values().any(|e| {
                e.owner == Some(*owner)
                    && e.unit_kind == Some(UnitKind::ResourceCloner)
                    && e.distance_to(*x, *y) < CLONER_RADIUS
            });
            let amount = if cloned { 2 } else { 1 };
            match resource {
                ResourceKind::Memory => income.push((*owner, amount, 0)),
                ResourceKind::Cpu => income.push((*owner, 0, amount)),
            }
        }

        for unit in self.entities.values().filter(|e| e.kind == EntityKind::Unit) {
            let (Some(owner), Some(kind)) = (unit.owner, unit.unit_kind) else {
                continue;
            };
            match kind {
                UnitKind::Allocator => income.push((owner, 2, 0)),
                UnitKind::MemoryMiner | UnitKind::CpuHarvester => {
                    let nearby = nodes
                        .iter()
                        .filter(|(node_owner, _, x, y)| {
                            *node_owner == owner && unit.distance_to(*x, *y) < MINER_RADIUS
                        })
                        .count() as i32;
                    if kind == UnitKind::MemoryMiner {
                        income.push((owner, 2 * nearby, 0));
                    } else {
                        income.push((owner, 0, 2 * nearby));
                    }
                }
                _ => {}
            }
        }

        for (owner, memory, cpu) in income {
            if let Some(player) = self.players.get_mut(&owner) {
                player.refund(memory, cpu);
            }
        }
    }
}
