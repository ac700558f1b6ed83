//! Matchmaking service - pairs queued sessions and routes input to their match

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::{GameCommand, GameMatch, MatchInput, MatchRegistry};
use crate::store::MatchResultStore;
use crate::ws::protocol::ServerMsg;

use super::queue::{MatchmakingQueue, QueuedSession};

const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MatchmakingError {
    #[error("Already in a game")]
    AlreadyInMatch,
}

/// Result of entering the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Queued { position: usize, queue_size: usize },
    /// Paired immediately; `match_found` has already been sent
    Matched { match_id: Uuid },
}

/// Matchmaking service
pub struct MatchmakingService {
    queue: Mutex<MatchmakingQueue>,
    registry: Arc<MatchRegistry>,
    /// session -> current match
    player_matches: Arc<DashMap<Uuid, Uuid>>,
    results: Option<MatchResultStore>,
}

impl MatchmakingService {
    pub fn new(registry: Arc<MatchRegistry>, results: Option<MatchResultStore>) -> Self {
        Self {
            queue: Mutex::new(MatchmakingQueue::new()),
            registry,
            player_matches: Arc::new(DashMap::new()),
            results,
        }
    }

    /// Queue a session and pair it right away if an opponent is waiting
    pub async fn join(&self, session: QueuedSession) -> Result<JoinOutcome, MatchmakingError> {
        let session_id = session.session_id;
        if self.player_matches.contains_key(&session_id) {
            return Err(MatchmakingError::AlreadyInMatch);
        }

        let mut queue = self.queue.lock().await;
        queue.enqueue(session);
        info!(session_id = %session_id, queue_size = queue.len(), "Session joined matchmaking queue");

        let Some(pair) = queue.dequeue_pair_if_available() else {
            return Ok(JoinOutcome::Queued {
                position: queue.position(&session_id).unwrap_or(0),
                queue_size: queue.len(),
            });
        };
        drop(queue);

        let match_id = self.create_match(pair).await;
        Ok(JoinOutcome::Matched { match_id })
    }

    /// Leave the queue; returns whether the session was waiting
    pub async fn cancel(&self, session_id: Uuid) -> bool {
        self.queue.lock().await.dequeue(session_id).is_some()
    }

    /// Start a match for two sessions
    async fn create_match(&self, (first, second): (QueuedSession, QueuedSession)) -> Uuid {
        let match_id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let (game_match, handle) = GameMatch::new(match_id, seed, self.results.clone());
        let map = game_match.world().map;

        // seat both before anyone can route a disconnect to the match
        for session in [&first, &second] {
            let join = MatchInput::Join {
                player: session.session_id,
                profile_id: session.profile_id,
                name: session.name.clone(),
                selected_deck: session.selected_deck.clone(),
                outbound: session.outbound.clone(),
            };
            if handle.input_tx.try_send(join).is_err() {
                error!(match_id = %match_id, "Failed to seat player in match");
            }
        }

        self.registry.insert(handle.clone());
        self.player_matches.insert(first.session_id, match_id);
        self.player_matches.insert(second.session_id, match_id);

        info!(
            match_id = %match_id,
            first = %first.session_id,
            second = %second.session_id,
            "Created new match"
        );

        let registry = self.registry.clone();
        let player_matches = self.player_matches.clone();
        let seated = [first.session_id, second.session_id];
        tokio::spawn(async move {
            game_match.run().await;

            registry.remove(&match_id);
            for session_id in seated {
                player_matches.remove_if(&session_id, |_, current| *current == match_id);
            }
            info!(match_id = %match_id, "Match removed from registry");
        });

        let opponents = [
            (&first, second.name.clone(), true),
            (&second, first.name.clone(), false),
        ];
        for (session, opponent_name, is_player1) in opponents {
            let found = ServerMsg::MatchFound {
                match_id,
                opponent_name,
                map_width: map.width,
                map_height: map.height,
                is_player1,
            };
            if session.outbound.try_send(found).is_err() {
                warn!(session_id = %session.session_id, "Could not deliver match_found");
            }
        }

        match_id
    }

    async fn send_to_match(&self, session_id: Uuid, input: MatchInput) -> bool {
        let Some(match_id) = self.current_match(&session_id) else {
            return false;
        };
        let Some(handle) = self.registry.get(&match_id) else {
            return false;
        };
        if handle.input_tx.send(input).await.is_err() {
            debug!(session_id = %session_id, match_id = %match_id, "Match input channel closed");
            return false;
        }
        true
    }

    /// Forward a command; false when the session is not in a match
    pub async fn route_command(&self, session_id: Uuid, command: GameCommand) -> bool {
        self.send_to_match(
            session_id,
            MatchInput::Command {
                player: session_id,
                command,
            },
        )
        .await
    }

    /// Leave the current match; false when not in one
    pub async fn leave_match(&self, session_id: Uuid, surrender: bool) -> bool {
        let routed = self
            .send_to_match(
                session_id,
                MatchInput::Leave {
                    player: session_id,
                    surrender,
                },
            )
            .await;
        self.player_matches.remove(&session_id);
        routed
    }

    /// Connection closed: leave the queue and forfeit any running match
    pub async fn disconnect(&self, session_id: Uuid) {
        self.cancel(session_id).await;
        self.send_to_match(session_id, MatchInput::Disconnect { player: session_id })
            .await;
        self.player_matches.remove(&session_id);
        info!(session_id = %session_id, "Session removed from matchmaking");
    }

    /// Periodic sweep: drop dead entries and pair whoever is left
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            interval.tick().await;

            let mut queue = self.queue.lock().await;
            let pruned = queue.prune_disconnected();
            if pruned > 0 {
                debug!(pruned, "Removed disconnected sessions from queue");
            }

            let mut pairs = Vec::new();
            while let Some(pair) = queue.dequeue_pair_if_available() {
                pairs.push(pair);
            }
            if let Some(wait) = queue.longest_wait() {
                debug!(waiting = queue.len(), longest_wait_ms = wait.as_millis() as u64, "Sessions still queued");
            }
            drop(queue);

            for pair in pairs {
                self.create_match(pair).await;
            }
        }
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_in_queue(&self, session_id: &Uuid) -> bool {
        self.queue.lock().await.contains(session_id)
    }

    pub fn current_match(&self, session_id: &Uuid) -> Option<Uuid> {
        self.player_matches.get(session_id).map(|r| *r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    fn session() -> (QueuedSession, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(256);
        let id = Uuid::new_v4();
        (QueuedSession::new(id, id.to_string(), None, Vec::new(), tx), rx)
    }

    async fn next(rx: &mut mpsc::Receiver<ServerMsg>) -> ServerMsg {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
            .expect("message")
    }

    #[tokio::test]
    async fn second_session_triggers_a_match() {
        let service = MatchmakingService::new(Arc::new(MatchRegistry::new()), None);
        let (a, mut rx_a) = session();
        let (b, mut rx_b) = session();
        let (a_id, b_id) = (a.session_id, b.session_id);

        let first = assert_ok!(service.join(a).await);
        assert_eq!(first, JoinOutcome::Queued { position: 1, queue_size: 1 });

        let second = assert_ok!(service.join(b).await);
        let JoinOutcome::Matched { match_id } = second else {
            panic!("expected a match");
        };
        assert_eq!(service.current_match(&a_id), Some(match_id));
        assert_eq!(service.current_match(&b_id), Some(match_id));
        assert_eq!(service.queue_size().await, 0);

        assert!(matches!(next(&mut rx_a).await, ServerMsg::MatchFound { is_player1: true, .. }));
        assert!(matches!(next(&mut rx_b).await, ServerMsg::MatchFound { is_player1: false, .. }));
        assert!(matches!(next(&mut rx_a).await, ServerMsg::JoinAck { player_id, .. } if player_id == a_id));
    }

    #[tokio::test]
    async fn session_in_match_cannot_queue_again() {
        let service = MatchmakingService::new(Arc::new(MatchRegistry::new()), None);
        let (a, _rx_a) = session();
        let (b, _rx_b) = session();
        let again = QueuedSession::new(
            a.session_id,
            "again".into(),
            None,
            Vec::new(),
            a.outbound.clone(),
        );
        assert_ok!(service.join(a).await);
        assert_ok!(service.join(b).await);

        assert_eq!(service.join(again).await, Err(MatchmakingError::AlreadyInMatch));
    }

    #[tokio::test]
    async fn cancel_removes_waiting_session() {
        let service = MatchmakingService::new(Arc::new(MatchRegistry::new()), None);
        let (a, _rx) = session();
        let id = a.session_id;
        assert_ok!(service.join(a).await);
        assert!(service.is_in_queue(&id).await);
        assert!(service.cancel(id).await);
        assert!(!service.cancel(id).await);
        assert_eq!(service.queue_size().await, 0);
    }

    #[tokio::test]
    async fn commands_outside_a_match_are_not_routed() {
        let service = MatchmakingService::new(Arc::new(MatchRegistry::new()), None);
        let command: GameCommand =
            serde_json::from_str(r#"{"kind":"move","entity_id":1,"target_x":1,"target_y":2}"#).unwrap();
        assert!(!service.route_command(Uuid::new_v4(), command).await);
        assert!(!service.leave_match(Uuid::new_v4(), true).await);
    }

    #[tokio::test]
    async fn disconnect_ends_the_match_for_the_opponent() {
        let registry = Arc::new(MatchRegistry::new());
        let service = MatchmakingService::new(registry.clone(), None);
        let (a, _rx_a) = session();
        let (b, mut rx_b) = session();
        let a_id = a.session_id;
        assert_ok!(service.join(a).await);
        assert_ok!(service.join(b).await);

        service.disconnect(a_id).await;
        assert_eq!(service.current_match(&a_id), None);

        loop {
            if let ServerMsg::OpponentDisconnected { you_win, .. } = next(&mut rx_b).await {
                assert!(you_win);
                break;
            }
        }
    }

    #[tokio::test]
    async fn session_gone_before_seating_loses_the_match() {
        let registry = Arc::new(MatchRegistry::new());
        let service = MatchmakingService::new(registry.clone(), None);
        let (a, rx_a) = session();
        let (b, mut rx_b) = session();
        assert_ok!(service.join(a).await);
        drop(rx_a);
        let JoinOutcome::Matched { match_id } = assert_ok!(service.join(b).await) else {
            panic!("expected a match");
        };

        loop {
            if let ServerMsg::OpponentDisconnected { you_win, .. } = next(&mut rx_b).await {
                assert!(you_win);
                break;
            }
        }
        assert_ok!(
            timeout(Duration::from_secs(2), async {
                while registry.get(&match_id).is_some() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
        );
    }
}
