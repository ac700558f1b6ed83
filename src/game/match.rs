//! Match actor and authoritative tick loop

use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{MatchResult, MatchResultStore, PlayerResult};
use crate::util::time::{unix_millis, TickClock, TICK_DURATION_MICROS};
use crate::ws::protocol::ServerMsg;

use super::commands::GameCommand;
use super::entity::PlayerId;
use super::snapshot::{end_stats, SnapshotBuilder};
use super::world::{EndReason, World, MAX_PLAYERS};

/// Queue depth for commands flowing into a match
pub const MATCH_INPUT_CAPACITY: usize = 256;

/// Everything a match task accepts from the outside
#[derive(Debug)]
pub enum MatchInput {
    /// Seat a player; the match answers on `outbound`
    Join {
        player: PlayerId,
        profile_id: Option<Uuid>,
        name: String,
        selected_deck: Vec<String>,
        outbound: mpsc::Sender<ServerMsg>,
    },
    Command {
        player: PlayerId,
        command: GameCommand,
    },
    /// Voluntary leave; without surrender it counts as a disconnect
    Leave { player: PlayerId, surrender: bool },
    Disconnect { player: PlayerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for both players to be seated
    Waiting,
    InProgress,
    Ended,
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<MatchInput>,
    pub player_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches.iter().map(|m| m.value().player_count()).sum()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match; owns its world and is driven by its own task
pub struct GameMatch {
    id: Uuid,
    world: World,
    phase: MatchPhase,
    input_rx: mpsc::Receiver<MatchInput>,
    sessions: HashMap<PlayerId, mpsc::Sender<ServerMsg>>,
    /// Left before their join was processed
    departed: HashSet<PlayerId>,
    /// Seated without a live session; they lose as soon as the match starts
    forfeits: Vec<PlayerId>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    results: Option<MatchResultStore>,
}

impl GameMatch {
    pub fn new(id: Uuid, seed: u64, results: Option<MatchResultStore>) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(MATCH_INPUT_CAPACITY);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = MatchHandle {
            id,
            input_tx,
            player_count: player_count.clone(),
        };

        let game_match = Self {
            id,
            world: World::new(seed),
            phase: MatchPhase::Waiting,
            input_rx,
            sessions: HashMap::new(),
            departed: HashSet::new(),
            forfeits: Vec::new(),
            snapshot_builder: SnapshotBuilder::new(1),
            player_count,
            results,
        };

        (game_match, handle)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for scripted scenarios
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Run the tick loop until the match ends or everyone has left
    pub async fn run(mut self) {
        info!(match_id = %self.id, seed = self.world.seed, "Match task started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut clock = TickClock::new();

        loop {
            tick_interval.tick().await;
            if !self.tick(clock.delta()) {
                break;
            }
        }

        info!(match_id = %self.id, tick = self.world.tick, "Match task stopped");
    }

    /// One loop iteration: drain inputs, step, broadcast. Returns false once the match is done.
    pub fn tick(&mut self, delta: f32) -> bool {
        self.process_inputs();
        self.reap_closed_sessions();
        if self.phase == MatchPhase::Waiting && !self.forfeits.is_empty() {
            // opponent's join never arrived alongside
            warn!(match_id = %self.id, "Abandoned before start");
            self.phase = MatchPhase::Ended;
        }

        if self.phase == MatchPhase::InProgress {
            self.world.step(delta);
            if self.snapshot_builder.should_send() {
                let snapshot = self.snapshot_builder.build(&self.world, unix_millis());
                self.broadcast(&snapshot);
            }
            if self.world.is_over() {
                self.finish();
            }
        }

        if self.sessions.is_empty() && self.phase != MatchPhase::Waiting {
            self.phase = MatchPhase::Ended;
        }
        self.phase != MatchPhase::Ended
    }

    /// Apply every queued input
    pub fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input {
                MatchInput::Join {
                    player,
                    profile_id,
                    name,
                    selected_deck,
                    outbound,
                } => self.handle_join(player, profile_id, name, &selected_deck, outbound),
                MatchInput::Command { player, command } => {
                    if self.phase == MatchPhase::InProgress && self.sessions.contains_key(&player) {
                        // rejections are logged by the world and otherwise dropped
                        let _ = self.world.apply_command(player, &command);
                    }
                }
                MatchInput::Leave { player, surrender } => {
                    let reason = if surrender {
                        EndReason::Surrender
                    } else {
                        EndReason::Disconnect
                    };
                    self.handle_leave(player, reason);
                }
                MatchInput::Disconnect { player } => {
                    self.handle_leave(player, EndReason::Disconnect)
                }
            }
        }
    }

    fn handle_join(
        &mut self,
        player: PlayerId,
        profile_id: Option<Uuid>,
        name: String,
        selected_deck: &[String],
        outbound: mpsc::Sender<ServerMsg>,
    ) {
        if self.phase != MatchPhase::Waiting {
            warn!(match_id = %self.id, player_id = %player, "Join after match start ignored");
            return;
        }
        let deck = (!selected_deck.is_empty()).then_some(selected_deck);
        if !self.world.add_player(player, profile_id, name, deck) {
            warn!(match_id = %self.id, player_id = %player, "Player could not be seated");
            return;
        }

        if self.departed.remove(&player) || outbound.is_closed() {
            info!(match_id = %self.id, player_id = %player, "Player gone before seating");
            self.forfeits.push(player);
        } else {
            self.sessions.insert(player, outbound);
            self.player_count.store(self.sessions.len(), Ordering::Relaxed);
            self.send_to(
                player,
                ServerMsg::JoinAck {
                    player_id: player,
                    map_width: self.world.map.width,
                    map_height: self.world.map.height,
                },
            );
            info!(
                match_id = %self.id,
                player_id = %player,
                player_count = self.sessions.len(),
                "Player joined match"
            );
        }

        if self.world.players.len() == MAX_PLAYERS {
            self.phase = MatchPhase::InProgress;
            self.snapshot_builder.force_next();
            info!(match_id = %self.id, "Match in progress");

            for gone in std::mem::take(&mut self.forfeits) {
                self.forfeit(gone, EndReason::Disconnect);
            }
        }
    }

    /// Stop routing to the leaver and hand the win to whoever remains
    fn handle_leave(&mut self, player: PlayerId, reason: EndReason) {
        if !self.sessions.contains_key(&player) {
            if self.phase == MatchPhase::Waiting && !self.world.players.contains_key(&player) {
                // the join is still queued behind this
                self.departed.insert(player);
            }
            return;
        }
        info!(match_id = %self.id, player_id = %player, reason = ?reason, "Player left match");

        if self.phase == MatchPhase::Waiting {
            self.remove_session(player);
            // cannot start any more
            self.phase = MatchPhase::Ended;
            self.broadcast(&ServerMsg::OpponentDisconnected {
                message: "Opponent left before the match started".to_string(),
                you_win: false,
            });
            return;
        }

        // a surrendering player still hears the game over
        if reason != EndReason::Surrender {
            self.remove_session(player);
        }
        self.forfeit(player, reason);
        self.remove_session(player);
    }

    /// Sessions whose socket went away without a leave message
    fn reap_closed_sessions(&mut self) {
        let closed: Vec<PlayerId> = self
            .sessions
            .iter()
            .filter(|(_, outbound)| outbound.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for player in closed {
            debug!(match_id = %self.id, player_id = %player, "Session closed, treating as disconnect");
            self.handle_leave(player, EndReason::Disconnect);
        }
    }

    fn remove_session(&mut self, player: PlayerId) {
        if self.sessions.remove(&player).is_some() {
            self.player_count.store(self.sessions.len(), Ordering::Relaxed);
        }
    }

    /// End a running match against `player`
    fn forfeit(&mut self, player: PlayerId, reason: EndReason) {
        if self.phase != MatchPhase::InProgress || self.world.is_over() {
            return;
        }
        self.world.forfeit(player, reason);
        if reason == EndReason::Disconnect {
            let remaining: Vec<PlayerId> = self
                .sessions
                .keys()
                .copied()
                .filter(|id| *id != player)
                .collect();
            for id in remaining {
                self.send_to(
                    id,
                    ServerMsg::OpponentDisconnected {
                        message: "Opponent disconnected".to_string(),
                        you_win: true,
                    },
                );
            }
        }
        self.finish();
    }

    /// Announce the outcome once and hand the result to the store
    fn finish(&mut self) {
        if self.phase == MatchPhase::Ended {
            return;
        }
        self.phase = MatchPhase::Ended;

        let Some(outcome) = self.world.outcome else {
            return;
        };
        let duration_secs = (self.world.clock_ms / 1000) as u32;
        info!(
            match_id = %self.id,
            winner = ?outcome.winner,
            reason = ?outcome.reason,
            duration_secs,
            "Match ended"
        );

        if outcome.reason != EndReason::Disconnect {
            let recipients: Vec<PlayerId> = self.sessions.keys().copied().collect();
            for id in recipients {
                let game_stats = end_stats(&self.world, id, duration_secs);
                self.send_to(
                    id,
                    ServerMsg::GameOver {
                        winner_id: outcome.winner,
                        reason: outcome.reason,
                        game_stats,
                    },
                );
            }
        }

        if let Some(results) = &self.results {
            results.spawn_record(self.build_result(duration_secs));
        }
    }

    pub fn build_result(&self, duration_secs: u32) -> MatchResult {
        let outcome = self.world.outcome;
        let winner = outcome.and_then(|o| o.winner);
        let players = self
            .world
            .player_order
            .iter()
            .filter_map(|id| self.world.players.get(id))
            .map(|p| PlayerResult {
                player_id: p.id,
                profile_id: p.profile_id,
                name: p.name.clone(),
                is_winner: winner == Some(p.id),
                final_memory: p.memory,
                final_cpu: p.cpu,
                stats: p.stats,
            })
            .collect();

        MatchResult {
            match_id: self.id,
            winner,
            reason: outcome.map(|o| o.reason).unwrap_or(EndReason::Disconnect),
            duration_secs,
            players,
            recorded_at: Utc::now(),
        }
    }

    fn broadcast(&self, msg: &ServerMsg) {
        for player in self.sessions.keys() {
            self.send_to(*player, msg.clone());
        }
    }

    /// Never blocks; a full or closed session queue only loses this message
    fn send_to(&self, player: PlayerId, msg: ServerMsg) {
        let Some(outbound) = self.sessions.get(&player) else {
            return;
        };
        match outbound.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(match_id = %self.id, player_id = %player, "Outbound queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(match_id = %self.id, player_id = %player, "Outbound queue closed");
            }
        }
    }
}
