//! Snapshot building

use crate::ws::protocol::{
    EntitySnapshot, FactorySnapshot, GameEndStats, PlayerSnapshot, ServerMsg,
};

use super::entity::{Entity, EntityKind, PlayerId};
use super::world::World;

/// Builds state updates for network transmission
pub struct SnapshotBuilder {
    /// Ticks since the last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        let snapshot_interval = snapshot_interval.max(1);
        Self {
            // first tick always sends
            ticks_since_snapshot: snapshot_interval - 1,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Full state update
    pub fn build(&self, world: &World, server_time: u64) -> ServerMsg {
        let now = world.clock_ms;
        let entities = world
            .entities
            .values()
            .map(|e| entity_snapshot(e, now))
            .collect();

        let players = world
            .player_order
            .iter()
            .filter_map(|id| world.players.get(id))
            .map(|p| PlayerSnapshot {
                id: p.id,
                name: p.name.clone(),
                memory: p.memory,
                cpu: p.cpu,
                hand: p.hand.clone(),
                global_cooldown: p.global_cooldown,
                deck_size: p.deck.len(),
                discard_size: p.discard.len(),
            })
            .collect();

        let factories = world
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Factory)
            .map(|f| FactorySnapshot {
                id: f.id,
                owner_id: f.owner,
                factory_type: f.factory_kind.unwrap_or_default(),
                x: f.x,
                y: f.y,
                production_queue: world
                    .queues
                    .get(&f.id)
                    .map(|q| q.items().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();

        ServerMsg::StateUpdate {
            tick: world.tick,
            entities,
            players,
            factories,
            server_time,
        }
    }
}

fn entity_snapshot(e: &Entity, now: u64) -> EntitySnapshot {
    EntitySnapshot {
        id: e.id,
        kind: e.kind,
        x: e.x,
        y: e.y,
        owner_id: e.owner,
        hp: e.hp,
        max_hp: e.max_hp,
        resource_type: e.resource,
        resource_amount: e.resource_amount,
        unit_type: e.unit_kind,
        factory_type: e.factory_kind,
        ai_state: e.ai_state,
        attacking_target_id: e.attacking_target_id,
        target_x: e.move_target.map(|(x, _)| x),
        target_y: e.move_target.map(|(_, y)| y),
        effects: e.effects.active(now).collect(),
    }
}

/// End-of-game numbers for one player
pub fn end_stats(world: &World, player: PlayerId, duration_secs: u32) -> GameEndStats {
    let mine = world.players.get(&player).map(|p| p.stats).unwrap_or_default();
    let theirs = world
        .opponent_of(player)
        .and_then(|id| world.players.get(&id))
        .map(|p| p.stats)
        .unwrap_or_default();

    GameEndStats {
        game_duration_seconds: duration_secs,
        your_units_created: mine.units_created,
        your_units_killed: mine.units_killed,
        your_units_lost: mine.units_lost,
        enemy_units_killed: theirs.units_killed,
        factories_built: mine.factories_built,
        resources_captured: mine.resources_captured,
        cards_played: mine.cards_played,
    }
}
