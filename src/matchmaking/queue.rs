//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Session waiting for an opponent
#[derive(Debug, Clone)]
pub struct QueuedSession {
    pub session_id: Uuid,
    pub name: String,
    pub profile_id: Option<Uuid>,
    pub selected_deck: Vec<String>,
    /// Where match messages for this session go
    pub outbound: mpsc::Sender<ServerMsg>,
    pub queued_at: Instant,
}

impl QueuedSession {
    pub fn new(
        session_id: Uuid,
        name: String,
        profile_id: Option<Uuid>,
        selected_deck: Vec<String>,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Self {
        Self {
            session_id,
            name,
            profile_id,
            selected_deck,
            outbound,
            queued_at: Instant::now(),
        }
    }

    /// How long this session has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }

    /// The connection behind this entry is gone
    pub fn is_disconnected(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// FIFO of waiting sessions, at most one entry per session
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedSession>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session at the back, replacing any stale entry it already had
    pub fn enqueue(&mut self, session: QueuedSession) {
        self.queue.retain(|s| s.session_id != session.session_id);
        self.queue.push_back(session);
    }

    /// Remove a session from the queue
    pub fn dequeue(&mut self, session_id: Uuid) -> Option<QueuedSession> {
        let pos = self.queue.iter().position(|s| s.session_id == session_id)?;
        self.queue.remove(pos)
    }

    /// Take the two oldest sessions, or nothing when fewer than two wait
    pub fn dequeue_pair_if_available(&mut self) -> Option<(QueuedSession, QueuedSession)> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }

    /// Drop entries whose connection has closed; returns how many were removed
    pub fn prune_disconnected(&mut self) -> usize {
        let before = self.queue.len();
        self.queue.retain(|s| !s.is_disconnected());
        before - self.queue.len()
    }

    pub fn contains(&self, session_id: &Uuid) -> bool {
        self.queue.iter().any(|s| &s.session_id == session_id)
    }

    /// 1-based position in line
    pub fn position(&self, session_id: &Uuid) -> Option<usize> {
        self.queue
            .iter()
            .position(|s| &s.session_id == session_id)
            .map(|p| p + 1)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Wait time of the session at the front
    pub fn longest_wait(&self) -> Option<Duration> {
        self.queue.front().map(QueuedSession::wait_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: Uuid) -> (QueuedSession, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(4);
        (QueuedSession::new(id, "p".into(), None, Vec::new(), tx), rx)
    }

    #[test]
    fn requeue_replaces_stale_entry() {
        let mut queue = MatchmakingQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (sa, _ra) = session(a);
        let (sb, _rb) = session(b);
        let (sa2, _ra2) = session(a);

        queue.enqueue(sa);
        queue.enqueue(sb);
        queue.enqueue(sa2);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position(&b), Some(1));
        assert_eq!(queue.position(&a), Some(2));
    }

    #[test]
    fn pair_requires_two_and_takes_oldest() {
        let mut queue = MatchmakingQueue::new();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut receivers = Vec::new();

        let (s0, r0) = session(ids[0]);
        receivers.push(r0);
        queue.enqueue(s0);
        assert!(queue.dequeue_pair_if_available().is_none());
        assert_eq!(queue.len(), 1);

        for id in &ids[1..] {
            let (s, r) = session(*id);
            receivers.push(r);
            queue.enqueue(s);
        }
        let (first, second) = queue.dequeue_pair_if_available().unwrap();
        assert_eq!((first.session_id, second.session_id), (ids[0], ids[1]));
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn cancelled_session_is_never_paired() {
        let mut queue = MatchmakingQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (sa, _ra) = session(a);
        let (sb, _rb) = session(b);
        queue.enqueue(sa);
        queue.enqueue(sb);

        assert!(queue.dequeue(a).is_some());
        assert!(queue.dequeue(a).is_none());
        assert!(queue.dequeue_pair_if_available().is_none());
        assert!(queue.contains(&b));
    }

    #[test]
    fn closed_connections_are_pruned() {
        let mut queue = MatchmakingQueue::new();
        let (sa, ra) = session(Uuid::new_v4());
        let (sb, _rb) = session(Uuid::new_v4());
        queue.enqueue(sa);
        queue.enqueue(sb);

        drop(ra);
        assert_eq!(queue.prune_disconnected(), 1);
        assert_eq!(queue.len(), 1);
    }
}
