//! Per-factory production queues

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::catalog::{FactoryKind, UnitKind};
use super::entity::{Effect, EntityId, EntityKind, PlayerId};
use super::world::World;

/// Spawn offset from the producing factory
const SPAWN_OFFSET_X: f32 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionItem {
    pub unit_kind: UnitKind,
    /// Seconds left
    pub remaining: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub target_entity: Option<EntityId>,
}

/// Strictly sequential queue: only the head item counts down
#[derive(Debug, Clone, Default)]
pub struct ProductionQueue {
    items: VecDeque<ProductionItem>,
}

impl ProductionQueue {
    pub fn push(&mut self, item: ProductionItem) {
        self.items.push_back(item);
    }

    /// Advance the head item, returning it once finished
    pub fn tick(&mut self, delta: f32) -> Option<ProductionItem> {
        let head = self.items.front_mut()?;
        head.remaining -= delta;
        if head.remaining <= 0.0 {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Summed remaining time of every queued item
    pub fn total_remaining(&self) -> f32 {
        self.items.iter().map(|i| i.remaining).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &ProductionItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl World {
    /// Owned factory with the lowest total queued time, first in id order on ties
    pub fn least_loaded_factory(&self, owner: PlayerId) -> Option<EntityId> {
        let mut best: Option<(EntityId, f32)> = None;
        for factory in self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Factory && e.owner == Some(owner))
        {
            let load = self
                .queues
                .get(&factory.id)
                .map(ProductionQueue::total_remaining)
                .unwrap_or(0.0);
            if best.map(|(_, b)| load < b).unwrap_or(true) {
                best = Some((factory.id, load));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Where a fresh unit heads: the chosen entity, else the enemy base, else map centre
    pub fn production_target(
        &self,
        owner: PlayerId,
        target_entity: Option<EntityId>,
    ) -> (f32, f32) {
        if let Some(target) = target_entity.and_then(|id| self.entities.get(&id)) {
            return (target.x, target.y);
        }
        self.entities
            .values()
            .find(|e| e.kind == EntityKind::Base && e.is_enemy_of(owner))
            .map(|base| (base.x, base.y))
            .unwrap_or((self.map.width / 2.0, self.map.height / 2.0))
    }

    /// Queue a unit on a specific factory
    pub fn enqueue_on(
        &mut self,
        factory_id: EntityId,
        unit_kind: UnitKind,
        target_entity: Option<EntityId>,
    ) -> bool {
        let Some(factory) = self.entities.get(&factory_id) else {
            return false;
        };
        let Some(owner) = factory.owner else {
            return false;
        };
        let factory_kind = factory.factory_kind.unwrap_or_default();
        let (target_x, target_y) = self.production_target(owner, target_entity);

        self.queues.entry(factory_id).or_default().push(ProductionItem {
            unit_kind,
            remaining: factory_kind.build_time(unit_kind.stats().production_time),
            target_x,
            target_y,
            target_entity,
        });
        true
    }

    /// Queue a unit on the owner's least loaded factory
    pub fn enqueue_production(
        &mut self,
        owner: PlayerId,
        unit_kind: UnitKind,
        target_entity: Option<EntityId>,
    ) -> Option<EntityId> {
        let factory_id = self.least_loaded_factory(owner)?;
        self.enqueue_on(factory_id, unit_kind, target_entity)
            .then_some(factory_id)
    }

    /// Advance every queue and spawn finished units next to their factory
    pub fn tick_production(&mut self, delta: f32) {
        let now = self.clock_ms;
        let mut finished = Vec::new();

        for (factory_id, queue) in self.queues.iter_mut() {
            let Some(factory) = self.entities.get(factory_id) else {
                continue;
            };
            let step = if factory.effects.has(Effect::Infected, now) {
                delta * 0.5
            } else {
                delta
            };
            if let Some(item) = queue.tick(step) {
                finished.push((*factory_id, item));
            }
        }

        for (factory_id, item) in finished {
            let Some(factory) = self.entities.get(&factory_id) else {
                continue;
            };
            let Some(owner) = factory.owner else {
                continue;
            };
            let factory_kind: FactoryKind = factory.factory_kind.unwrap_or_default();
            let stats = factory_kind.apply(item.unit_kind.stats());
            let (x, y) = (factory.x + SPAWN_OFFSET_X, factory.y);

            let unit_id = self.spawn_unit(owner, item.unit_kind, stats, x, y);
            if let Some(unit) = self.entities.get_mut(&unit_id) {
                unit.move_target = Some((item.target_x, item.target_y));
                unit.target_id = item.target_entity;
            }
        }
    }
}
