//! Directory of connected sessions

use dashmap::DashMap;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Logged-in identity attached to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub profile_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub outbound: mpsc::Sender<ServerMsg>,
    pub identity: Option<SessionIdentity>,
    pub connected_at: Instant,
}

/// Every live connection, keyed by session id
#[derive(Default)]
pub struct SessionDirectory {
    sessions: DashMap<Uuid, SessionEntry>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: Uuid, outbound: mpsc::Sender<ServerMsg>) {
        self.sessions.insert(
            session_id,
            SessionEntry {
                outbound,
                identity: None,
                connected_at: Instant::now(),
            },
        );
    }

    /// Attach a profile after login; false if the session is gone
    pub fn authenticate(&self, session_id: Uuid, identity: SessionIdentity) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(mut entry) => {
                entry.identity = Some(identity);
                true
            }
            None => false,
        }
    }

    pub fn identity(&self, session_id: &Uuid) -> Option<SessionIdentity> {
        self.sessions
            .get(session_id)
            .and_then(|entry| entry.identity.clone())
    }

    /// Best-effort delivery to a session
    pub fn send(&self, session_id: &Uuid, msg: ServerMsg) -> bool {
        self.sessions
            .get(session_id)
            .map(|entry| entry.outbound.try_send(msg).is_ok())
            .unwrap_or(false)
    }

    pub fn remove(&self, session_id: &Uuid) -> Option<SessionEntry> {
        self.sessions.remove(session_id).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_attaches_identity() {
        let directory = SessionDirectory::new();
        let (tx, mut rx) = mpsc::channel(4);
        let session = Uuid::new_v4();
        directory.register(session, tx);
        assert_eq!(directory.identity(&session), None);

        let identity = SessionIdentity {
            profile_id: Uuid::new_v4(),
            username: "dana".into(),
        };
        assert!(directory.authenticate(session, identity.clone()));
        assert_eq!(directory.identity(&session), Some(identity));

        assert!(directory.send(&session, ServerMsg::Pong { t: 1, server_time: 2 }));
        assert!(matches!(rx.try_recv(), Ok(ServerMsg::Pong { t: 1, .. })));
    }

    #[test]
    fn removed_sessions_are_forgotten() {
        let directory = SessionDirectory::new();
        let (tx, _rx) = mpsc::channel(4);
        let session = Uuid::new_v4();
        directory.register(session, tx);
        assert_eq!(directory.len(), 1);

        assert!(directory.remove(&session).is_some());
        assert!(directory.is_empty());
        assert!(!directory.send(&session, ServerMsg::Pong { t: 1, server_time: 2 }));
        assert!(!directory.authenticate(
            session,
            SessionIdentity {
                profile_id: Uuid::new_v4(),
                username: "x".into()
            }
        ));
    }
}
