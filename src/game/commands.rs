//! Player commands applied inside the match loop

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::catalog::{CardKind, FactoryKind, UnitKind, UnitStats};
use super::economy::{PlayedCard, GLOBAL_COOLDOWN_SECS};
use super::entity::{EntityId, EntityKind, PlayerId};
use super::world::World;

/// Factory cards must be placed this close to the player's base
pub const FACTORY_BUILD_RADIUS: f32 = 200.0;
const UPGRADE_RADIUS: f32 = 100.0;
const BUILD_FACTORY_MEMORY: i32 = 100;
const BUILD_PROCESS_CPU: i32 = 50;
const BUILD_JITTER: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Move,
    Build,
    PlayCard,
}

/// Inbound command from a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameCommand {
    pub kind: CommandKind,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub target_x: f32,
    #[serde(default)]
    pub target_y: f32,
    #[serde(default)]
    pub card_id: Option<Uuid>,
    #[serde(default)]
    pub target_entity_id: Option<EntityId>,
}

/// Why a command was dropped
#[derive(Debug, Error, PartialEq)]
pub enum CommandRejection {
    #[error("match is over")]
    MatchOver,

    #[error("player not in this match")]
    UnknownPlayer,

    #[error("entity {0} not found")]
    UnknownEntity(EntityId),

    #[error("entity {0} is not owned by the player")]
    NotOwner(EntityId),

    #[error("entity {0} cannot be commanded")]
    NotCommandable(EntityId),

    #[error("command requires an entity id")]
    MissingEntity,

    #[error("command requires a card id")]
    MissingCard,

    #[error("card {0} not in hand")]
    UnknownCard(Uuid),

    #[error("global cooldown active")]
    OnCooldown,

    #[error("insufficient resources")]
    InsufficientResources,

    #[error("build site too far from base")]
    OutOfRange,

    #[error("no factory available")]
    NoFactory,

    #[error("not enough units to combine")]
    NotEnoughUnits,
}

impl World {
    /// Apply a command for `player`; a rejection leaves hand, deck and resources as they were
    pub fn apply_command(
        &mut self,
        player: PlayerId,
        cmd: &GameCommand,
    ) -> Result<(), CommandRejection> {
        if self.is_over() {
            return Err(CommandRejection::MatchOver);
        }
        if !self.players.contains_key(&player) {
            return Err(CommandRejection::UnknownPlayer);
        }

        let result = match cmd.kind {
            CommandKind::Move => self.command_move(player, cmd),
            CommandKind::Build => self.command_build(player, cmd),
            CommandKind::PlayCard => self.command_play_card(player, cmd),
        };
        if let Err(ref reason) = result {
            debug!(player_id = %player, kind = ?cmd.kind, %reason, "Command rejected");
        }
        result
    }

    fn owned_entity(&self, player: PlayerId, id: Option<EntityId>) -> Result<EntityId, CommandRejection> {
        let id = id.ok_or(CommandRejection::MissingEntity)?;
        let entity = self
            .entities
            .get(&id)
            .ok_or(CommandRejection::UnknownEntity(id))?;
        if entity.owner != Some(player) {
            return Err(CommandRejection::NotOwner(id));
        }
        Ok(id)
    }

    fn command_move(&mut self, player: PlayerId, cmd: &GameCommand) -> Result<(), CommandRejection> {
        let id = self.owned_entity(player, cmd.entity_id)?;
        let (width, height) = (self.map.width, self.map.height);
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(CommandRejection::UnknownEntity(id))?;
        if !entity.kind.is_building() {
            return Err(CommandRejection::NotCommandable(id));
        }
        entity.move_target = Some((
            cmd.target_x.clamp(0.0, width),
            cmd.target_y.clamp(0.0, height),
        ));
        Ok(())
    }

    fn command_build(&mut self, player: PlayerId, cmd: &GameCommand) -> Result<(), CommandRejection> {
        let id = self.owned_entity(player, cmd.entity_id)?;
        let (kind, x, y) = match self.entities.get(&id) {
            Some(e) => (e.kind, e.x, e.y),
            None => return Err(CommandRejection::UnknownEntity(id)),
        };

        let Some(state) = self.players.get_mut(&player) else {
            return Err(CommandRejection::UnknownPlayer);
        };
        match kind {
            EntityKind::Base => {
                if !state.deduct_cost(BUILD_FACTORY_MEMORY, 0) {
                    return Err(CommandRejection::InsufficientResources);
                }
                state.stats.factories_built += 1;
                let fx = x + self.rng.gen_range(-BUILD_JITTER..BUILD_JITTER);
                let fy = y + self.rng.gen_range(-BUILD_JITTER..BUILD_JITTER);
                self.spawn_factory(player, FactoryKind::Standard, fx, fy);
                Ok(())
            }
            EntityKind::Factory => {
                if !state.deduct_cost(0, BUILD_PROCESS_CPU) {
                    return Err(CommandRejection::InsufficientResources);
                }
                if self.enqueue_on(id, UnitKind::BasicProcess, None) {
                    Ok(())
                } else {
                    if let Some(state) = self.players.get_mut(&player) {
                        state.refund(0, BUILD_PROCESS_CPU);
                    }
                    Err(CommandRejection::NoFactory)
                }
            }
            _ => Err(CommandRejection::NotCommandable(id)),
        }
    }

    fn command_play_card(&mut self, player: PlayerId, cmd: &GameCommand) -> Result<(), CommandRejection> {
        let card_id = cmd.card_id.ok_or(CommandRejection::MissingCard)?;
        let played = self
            .players
            .get_mut(&player)
            .ok_or(CommandRejection::UnknownPlayer)?
            .play_card(card_id)
            .ok_or(CommandRejection::UnknownCard(card_id))?;

        if let Err(reason) = self.check_card_play(player, cmd, &played) {
            self.refund_card(player, played, false);
            return Err(reason);
        }

        let card = played.card.clone();
        if let Some(state) = self.players.get_mut(&player) {
            state.deduct_cost(card.memory_cost, card.cpu_cost);
            state.global_cooldown = GLOBAL_COOLDOWN_SECS;
            state.stats.cards_played += 1;
        }

        if let Some(unit_kind) = card.kind.unit_kind() {
            if self
                .enqueue_production(player, unit_kind, cmd.target_entity_id)
                .is_none()
            {
                self.refund_card(player, played, true);
                return Err(CommandRejection::NoFactory);
            }
        } else if let Some(factory_kind) = card.kind.factory_kind() {
            self.spawn_factory(player, factory_kind, cmd.target_x, cmd.target_y);
            if let Some(state) = self.players.get_mut(&player) {
                state.stats.factories_built += 1;
            }
        } else if card.kind == CardKind::UpgradeInheritance {
            self.combine_units(player, cmd.target_x, cmd.target_y);
        }

        if let Some(state) = self.players.get_mut(&player) {
            if card.permanent {
                state.hand.insert(0, card);
            }
            state.draw_card(&mut self.rng);
        }
        Ok(())
    }

    /// Every reason a taken card must go back to the hand
    fn check_card_play(
        &self,
        player: PlayerId,
        cmd: &GameCommand,
        played: &PlayedCard,
    ) -> Result<(), CommandRejection> {
        let state = self
            .players
            .get(&player)
            .ok_or(CommandRejection::UnknownPlayer)?;
        if state.on_cooldown() {
            return Err(CommandRejection::OnCooldown);
        }

        let kind = played.card.kind;
        if kind.is_factory_card() {
            if let Some(base) = self.base_of(player) {
                if base.distance_to(cmd.target_x, cmd.target_y) > FACTORY_BUILD_RADIUS {
                    return Err(CommandRejection::OutOfRange);
                }
            }
        }
        if kind.is_unit_card() && self.least_loaded_factory(player).is_none() {
            return Err(CommandRejection::NoFactory);
        }
        if kind == CardKind::UpgradeInheritance {
            match self.upgrade_candidates(player, cmd.target_x, cmd.target_y) {
                None => return Err(CommandRejection::NoFactory),
                Some((_, units)) if units.len() < 2 => return Err(CommandRejection::NotEnoughUnits),
                Some(_) => {}
            }
        }
        if !state.can_afford(played.card.memory_cost, played.card.cpu_cost) {
            return Err(CommandRejection::InsufficientResources);
        }
        Ok(())
    }

    fn refund_card(&mut self, player: PlayerId, played: PlayedCard, with_cost: bool) {
        if let Some(state) = self.players.get_mut(&player) {
            if with_cost {
                state.refund(played.card.memory_cost, played.card.cpu_cost);
                state.global_cooldown = 0.0;
                state.stats.cards_played = state.stats.cards_played.saturating_sub(1);
            }
            state.refund_card(played);
        }
    }

    /// Nearest owned inheritance factory to the point, with up to two owned units beside it
    fn upgrade_candidates(&self, player: PlayerId, x: f32, y: f32) -> Option<(EntityId, Vec<EntityId>)> {
        let factory = self
            .entities
            .values()
            .filter(|e| {
                e.kind == EntityKind::Factory
                    && e.owner == Some(player)
                    && e.factory_kind == Some(FactoryKind::Inheritance)
            })
            .min_by(|a, b| a.distance_to(x, y).total_cmp(&b.distance_to(x, y)))?;

        let units = self
            .entities
            .values()
            .filter(|e| {
                e.kind == EntityKind::Unit
                    && e.owner == Some(player)
                    && e.distance(factory) < UPGRADE_RADIUS
            })
            .take(2)
            .map(|e| e.id)
            .collect();
        Some((factory.id, units))
    }

    /// Sacrifice two units at an inheritance factory for a stronger drone
    fn combine_units(&mut self, player: PlayerId, x: f32, y: f32) {
        let Some((factory_id, units)) = self.upgrade_candidates(player, x, y) else {
            return;
        };
        if units.len() < 2 {
            return;
        }
        let sacrificed: Vec<_> = units
            .iter()
            .filter_map(|id| self.entities.remove(id))
            .collect();
        let summed_hp: i32 = sacrificed.iter().map(|u| u.max_hp).sum();
        let mean_speed = sacrificed.iter().map(|u| u.speed).sum::<f32>() / sacrificed.len() as f32;

        let Some((fx, fy)) = self.entities.get(&factory_id).map(|f| (f.x, f.y)) else {
            return;
        };
        let base = UnitKind::InheritanceDrone.stats();
        let stats = UnitStats {
            max_hp: (summed_hp as f32 * 1.2) as i32,
            speed: mean_speed * 1.1,
            ..base
        };
        self.spawn_unit(player, UnitKind::InheritanceDrone, stats, fx + 20.0, fy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> (World, PlayerId, PlayerId) {
        let mut world = World::new(9);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_player(a, None, "a".into(), None);
        world.add_player(b, None, "b".into(), None);
        (world, a, b)
    }

    fn play(card_id: Uuid, x: f32, y: f32) -> GameCommand {
        GameCommand {
            kind: CommandKind::PlayCard,
            entity_id: None,
            target_x: x,
            target_y: y,
            card_id: Some(card_id),
            target_entity_id: None,
        }
    }

    fn first_unit_card(world: &World, player: PlayerId) -> Uuid {
        world.players[&player]
            .hand
            .iter()
            .find(|c| c.kind.is_unit_card())
            .unwrap()
            .id
    }

    #[test]
    fn unaffordable_card_changes_nothing() {
        let (mut world, a, _) = world();
        let card = first_unit_card(&world, a);
        {
            let p = world.players.get_mut(&a).unwrap();
            p.memory = 0;
            p.cpu = 0;
        }
        let before = world.players[&a].clone();

        let err = world.apply_command(a, &play(card, 0.0, 0.0)).unwrap_err();
        assert_eq!(err, CommandRejection::InsufficientResources);

        let after = &world.players[&a];
        assert_eq!(after.hand, before.hand);
        assert_eq!(after.discard, before.discard);
        assert_eq!(after.deck, before.deck);
        assert_eq!((after.memory, after.cpu), (0, 0));
    }

    #[test]
    fn unit_card_deducts_cost_and_queues_on_factory() {
        let (mut world, a, _) = world();
        let card_id = first_unit_card(&world, a);
        let card = world.players[&a]
            .hand
            .iter()
            .find(|c| c.id == card_id)
            .cloned()
            .unwrap();
        {
            let p = world.players.get_mut(&a).unwrap();
            p.memory = 500;
            p.cpu = 500;
        }

        world.apply_command(a, &play(card_id, 0.0, 0.0)).unwrap();
        let p = &world.players[&a];
        assert_eq!(p.memory, 500 - card.memory_cost);
        assert_eq!(p.cpu, 500 - card.cpu_cost);
        assert_eq!(p.global_cooldown, GLOBAL_COOLDOWN_SECS);
        assert_eq!(p.stats.cards_played, 1);
        assert!(p.hand[0].permanent);
        assert_eq!(p.hand.len(), 5);

        let factory = world.least_loaded_factory(a).unwrap();
        let queued: Vec<_> = world.queues[&factory].items().collect();
        assert_eq!(queued.len(), 1);
        assert_eq!(Some(queued[0].unit_kind), card.kind.unit_kind());
    }

    #[test]
    fn cooldown_rejects_second_play_and_returns_card() {
        let (mut world, a, _) = world();
        {
            let p = world.players.get_mut(&a).unwrap();
            p.memory = 1000;
            p.cpu = 1000;
        }
        let first = first_unit_card(&world, a);
        world.apply_command(a, &play(first, 0.0, 0.0)).unwrap();

        let second = first_unit_card(&world, a);
        let hand_before = world.players[&a].hand.clone();
        let err = world.apply_command(a, &play(second, 0.0, 0.0)).unwrap_err();
        assert_eq!(err, CommandRejection::OnCooldown);
        assert_eq!(world.players[&a].hand, hand_before);
    }

    #[test]
    fn permanent_factory_card_must_target_near_base() {
        let (mut world, a, _) = world();
        let factory_card = world.players[&a].hand[0].id;

        let err = world
            .apply_command(a, &play(factory_card, 800.0, 400.0))
            .unwrap_err();
        assert_eq!(err, CommandRejection::OutOfRange);
        assert_eq!(world.players[&a].hand[0].id, factory_card);

        world
            .apply_command(a, &play(factory_card, 250.0, 450.0))
            .unwrap();
        let p = &world.players[&a];
        assert_eq!(p.memory, 100);
        assert_eq!(p.hand[0].id, factory_card);
        assert_eq!(p.stats.factories_built, 1);
        assert_eq!(
            world
                .entities
                .values()
                .filter(|e| e.kind == EntityKind::Factory && e.owner == Some(a))
                .count(),
            2
        );
    }

    #[test]
    fn unit_card_without_factory_is_refunded() {
        let (mut world, a, _) = world();
        let factories: Vec<EntityId> = world
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Factory && e.owner == Some(a))
            .map(|e| e.id)
            .collect();
        for id in factories {
            world.entities.remove(&id);
            world.queues.remove(&id);
        }
        let card = first_unit_card(&world, a);
        let err = world.apply_command(a, &play(card, 0.0, 0.0)).unwrap_err();
        assert_eq!(err, CommandRejection::NoFactory);
        assert!(world.players[&a].hand.iter().any(|c| c.id == card));
        assert!(world.players[&a].discard.is_empty());
    }

    #[test]
    fn units_ignore_move_but_buildings_obey() {
        let (mut world, a, b) = world();
        let unit = world.spawn_unit(a, UnitKind::Scout, UnitKind::Scout.stats(), 500.0, 400.0);
        let cmd = |id| GameCommand {
            kind: CommandKind::Move,
            entity_id: Some(id),
            target_x: 300.0,
            target_y: 300.0,
            card_id: None,
            target_entity_id: None,
        };
        assert_eq!(
            world.apply_command(a, &cmd(unit)),
            Err(CommandRejection::NotCommandable(unit))
        );

        let base = world.base_of(a).unwrap().id;
        world.apply_command(a, &cmd(base)).unwrap();
        assert_eq!(world.entities[&base].move_target, Some((300.0, 300.0)));

        let enemy_base = world.base_of(b).unwrap().id;
        assert_eq!(
            world.apply_command(a, &cmd(enemy_base)),
            Err(CommandRejection::NotOwner(enemy_base))
        );
    }

    #[test]
    fn build_on_factory_queues_basic_process() {
        let (mut world, a, _) = world();
        let factory = world.least_loaded_factory(a).unwrap();
        let cmd = GameCommand {
            kind: CommandKind::Build,
            entity_id: Some(factory),
            target_x: 0.0,
            target_y: 0.0,
            card_id: None,
            target_entity_id: None,
        };
        world.apply_command(a, &cmd).unwrap();
        assert_eq!(world.players[&a].cpu, 50);
        assert_eq!(world.queues[&factory].len(), 1);

        world.apply_command(a, &cmd).unwrap();
        assert_eq!(
            world.apply_command(a, &cmd),
            Err(CommandRejection::InsufficientResources)
        );
    }

    #[test]
    fn upgrade_combines_two_units_at_inheritance_factory() {
        let (mut world, a, _) = world();
        let factory = world.spawn_factory(a, FactoryKind::Inheritance, 300.0, 400.0);
        world.spawn_unit(a, UnitKind::Tank, UnitKind::Tank.stats(), 320.0, 400.0);
        world.spawn_unit(a, UnitKind::Scout, UnitKind::Scout.stats(), 300.0, 430.0);
        let card = crate::game::economy::Card::new(CardKind::UpgradeInheritance, &mut world.rng);
        let card_id = card.id;
        world.players.get_mut(&a).unwrap().hand.push(card);

        world.apply_command(a, &play(card_id, 300.0, 400.0)).unwrap();
        let drones: Vec<_> = world
            .entities
            .values()
            .filter(|e| e.unit_kind == Some(UnitKind::InheritanceDrone))
            .collect();
        assert_eq!(drones.len(), 1);
        assert_eq!(drones[0].max_hp, 216);
        assert!(world
            .entities
            .values()
            .all(|e| e.unit_kind != Some(UnitKind::Tank)));
        assert!(world.entities.contains_key(&factory));
    }
}
