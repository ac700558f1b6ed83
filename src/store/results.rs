//! Finished-match records

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::game::economy::PlayerStats;
use crate::game::world::EndReason;

use super::profiles::ProfileStore;
use super::supabase::SupabaseClient;
use super::StoreError;

const TABLE: &str = "match_results";

/// Results kept by the in-memory backend; older ones are dropped
pub const MEMORY_RESULT_CAPACITY: usize = 500;

/// One player's line in a match result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: Uuid,
    /// Present when the player was logged in to a stored profile
    pub profile_id: Option<Uuid>,
    pub name: String,
    pub is_winner: bool,
    pub final_memory: i32,
    pub final_cpu: i32,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: Uuid,
    pub winner: Option<Uuid>,
    pub reason: EndReason,
    pub duration_secs: u32,
    pub players: Vec<PlayerResult>,
    pub recorded_at: DateTime<Utc>,
}

/// Row layout of the results table, one row per player
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    match_id: Uuid,
    reason: EndReason,
    game_duration_seconds: u32,
    recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    player: &'a PlayerResult,
}

#[derive(Clone)]
enum Backend {
    Remote(SupabaseClient),
    Memory(Arc<Mutex<VecDeque<MatchResult>>>),
}

/// Records match results and folds them into profile totals
#[derive(Clone)]
pub struct MatchResultStore {
    backend: Backend,
    profiles: ProfileStore,
}

impl MatchResultStore {
    pub fn remote(client: SupabaseClient, profiles: ProfileStore) -> Self {
        Self {
            backend: Backend::Remote(client),
            profiles,
        }
    }

    pub fn in_memory(profiles: ProfileStore) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(VecDeque::new()))),
            profiles,
        }
    }

    /// Persist the result, then update every participating profile
    pub async fn record(&self, result: &MatchResult) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Remote(client) => {
                for player in &result.players {
                    let row = ResultRow {
                        match_id: result.match_id,
                        reason: result.reason,
                        game_duration_seconds: result.duration_secs,
                        recorded_at: result.recorded_at,
                        player,
                    };
                    let _: serde_json::Value = client.insert(TABLE, &row).await?;
                }
            }
            Backend::Memory(results) => {
                let mut results = results.lock();
                results.push_back(result.clone());
                while results.len() > MEMORY_RESULT_CAPACITY {
                    results.pop_front();
                }
            }
        }

        for player in &result.players {
            let Some(profile_id) = player.profile_id else {
                continue;
            };
            if let Err(e) = self
                .profiles
                .record_result(profile_id, &player.stats, player.is_winner, result.duration_secs)
                .await
            {
                warn!(profile_id = %profile_id, error = %e, "Failed to update profile stats");
            }
        }
        Ok(())
    }

    /// Record without waiting; failures are logged
    pub fn spawn_record(&self, result: MatchResult) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.record(&result).await {
                Ok(()) => info!(match_id = %result.match_id, "Match result recorded"),
                Err(e) => error!(match_id = %result.match_id, error = %e, "Failed to record match result"),
            }
        });
    }

    /// Most recent results first; only kept by the in-memory backend
    pub fn recent(&self, limit: usize) -> Vec<MatchResult> {
        match &self.backend {
            Backend::Remote(_) => Vec::new(),
            Backend::Memory(results) => results.lock().iter().rev().take(limit).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn result_for(winner: Uuid, loser: Uuid) -> MatchResult {
        let line = |id: Uuid, is_winner: bool| PlayerResult {
            player_id: Uuid::new_v4(),
            profile_id: Some(id),
            name: "p".into(),
            is_winner,
            final_memory: 10,
            final_cpu: 20,
            stats: PlayerStats {
                units_created: 3,
                ..PlayerStats::default()
            },
        };
        MatchResult {
            match_id: Uuid::new_v4(),
            winner: Some(winner),
            reason: EndReason::BaseDestroyed,
            duration_secs: 75,
            players: vec![line(winner, true), line(loser, false)],
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recording_updates_both_profiles() {
        let profiles = ProfileStore::in_memory();
        let winner = assert_ok!(profiles.login("winner").await);
        let loser = assert_ok!(profiles.login("loser").await);
        let store = MatchResultStore::in_memory(profiles.clone());

        assert_ok!(store.record(&result_for(winner.id, loser.id)).await);

        let winner = profiles.get_profile(winner.id).await.unwrap().unwrap();
        let loser = profiles.get_profile(loser.id).await.unwrap().unwrap();
        assert_eq!(winner.stats.wins, 1);
        assert_eq!(loser.stats.losses, 1);
        assert_eq!(loser.stats.total_play_time_seconds, 75);
        assert_eq!(store.recent(10).len(), 1);
    }

    #[tokio::test]
    async fn missing_profiles_do_not_fail_the_record() {
        let store = MatchResultStore::in_memory(ProfileStore::in_memory());
        assert_ok!(store.record(&result_for(Uuid::new_v4(), Uuid::new_v4())).await);
        assert_eq!(store.recent(10).len(), 1);
    }

    #[tokio::test]
    async fn memory_keeps_only_the_newest_results() {
        let store = MatchResultStore::in_memory(ProfileStore::in_memory());
        let mut last = None;
        for _ in 0..MEMORY_RESULT_CAPACITY + 20 {
            let result = result_for(Uuid::new_v4(), Uuid::new_v4());
            last = Some(result.match_id);
            assert_ok!(store.record(&result).await);
        }

        let recent = store.recent(MEMORY_RESULT_CAPACITY + 20);
        assert_eq!(recent.len(), MEMORY_RESULT_CAPACITY);
        assert_eq!(Some(recent[0].match_id), last);
        assert_eq!(store.recent(3).len(), 3);
    }
}
