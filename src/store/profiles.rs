//! Player profiles and their lifetime statistics

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::game::economy::PlayerStats;

use super::supabase::SupabaseClient;
use super::StoreError;

const TABLE: &str = "profiles";
const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;

/// Aggregate statistics across every finished match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default)]
    pub total_games: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub total_units_created: u32,
    #[serde(default)]
    pub total_units_killed: u32,
    #[serde(default)]
    pub total_factories_built: u32,
    #[serde(default)]
    pub total_cards_played: u32,
    #[serde(default)]
    pub total_play_time_seconds: u32,
}

impl ProfileStats {
    /// Fold one match into the totals
    pub fn record(&mut self, match_stats: &PlayerStats, won: bool, duration_secs: u32) {
        self.total_games += 1;
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.total_units_created += match_stats.units_created;
        self.total_units_killed += match_stats.units_killed;
        self.total_factories_built += match_stats.factories_built;
        self.total_cards_played += match_stats.cards_played;
        self.total_play_time_seconds += duration_secs;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(flatten)]
    pub stats: ProfileStats,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
}

impl Profile {
    fn new(username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            stats: ProfileStats::default(),
            created_at: Utc::now(),
            last_played_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatsPatch {
    #[serde(flatten)]
    stats: ProfileStats,
    last_played_at: DateTime<Utc>,
}

/// Usernames double as database filters, so only a safe alphabet is accepted
pub fn validate_username(username: &str) -> Result<(), StoreError> {
    let len = username.chars().count();
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) && valid_chars {
        Ok(())
    } else {
        Err(StoreError::InvalidUsername)
    }
}

#[derive(Clone)]
enum Backend {
    Remote(SupabaseClient),
    Memory(Arc<Mutex<HashMap<Uuid, Profile>>>),
}

/// Profile lookups keyed by username
#[derive(Clone)]
pub struct ProfileStore {
    backend: Backend,
}

impl ProfileStore {
    pub fn remote(client: SupabaseClient) -> Self {
        Self {
            backend: Backend::Remote(client),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        match &self.backend {
            Backend::Remote(client) => {
                Ok(client.select_one(TABLE, &format!("id=eq.{}", id)).await?)
            }
            Backend::Memory(profiles) => Ok(profiles.lock().get(&id).cloned()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StoreError> {
        match &self.backend {
            Backend::Remote(client) => Ok(client
                .select_one(TABLE, &format!("username=eq.{}", username))
                .await?),
            Backend::Memory(profiles) => Ok(profiles
                .lock()
                .values()
                .find(|p| p.username == username)
                .cloned()),
        }
    }

    async fn create_profile(&self, username: &str) -> Result<Profile, StoreError> {
        let profile = Profile::new(username);
        match &self.backend {
            Backend::Remote(client) => Ok(client.insert(TABLE, &profile).await?),
            Backend::Memory(profiles) => {
                let mut profiles = profiles.lock();
                if profiles.values().any(|p| p.username == username) {
                    return Err(StoreError::UsernameTaken);
                }
                profiles.insert(profile.id, profile.clone());
                Ok(profile)
            }
        }
    }

    /// Look the username up, creating the profile on first login
    pub async fn login(&self, username: &str) -> Result<Profile, StoreError> {
        validate_username(username)?;
        match self.find_by_username(username).await? {
            Some(profile) => Ok(profile),
            None => self.create_profile(username).await,
        }
    }

    /// Create a profile, failing if the username is already in use
    pub async fn register(&self, username: &str) -> Result<Profile, StoreError> {
        validate_username(username)?;
        if self.find_by_username(username).await?.is_some() {
            return Err(StoreError::UsernameTaken);
        }
        self.create_profile(username).await
    }

    /// Add a finished match to the profile's totals
    pub async fn record_result(
        &self,
        id: Uuid,
        match_stats: &PlayerStats,
        won: bool,
        duration_secs: u32,
    ) -> Result<ProfileStats, StoreError> {
        match &self.backend {
            Backend::Remote(client) => {
                let mut profile = self
                    .get_profile(id)
                    .await?
                    .ok_or(StoreError::ProfileNotFound(id))?;
                profile.stats.record(match_stats, won, duration_secs);
                let patch = StatsPatch {
                    stats: profile.stats,
                    last_played_at: Utc::now(),
                };
                client.update(TABLE, &format!("id=eq.{}", id), &patch).await?;
                Ok(profile.stats)
            }
            Backend::Memory(profiles) => {
                let mut profiles = profiles.lock();
                let profile = profiles.get_mut(&id).ok_or(StoreError::ProfileNotFound(id))?;
                profile.stats.record(match_stats, won, duration_secs);
                profile.last_played_at = Some(Utc::now());
                Ok(profile.stats)
            }
        }
    }
}
