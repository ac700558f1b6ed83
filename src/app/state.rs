//! Application state shared across routes

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::matchmaking::MatchmakingService;
use crate::store::{DeckStore, MatchResultStore, ProfileStore, SupabaseClient};
use crate::ws::session::SessionDirectory;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profile_store: ProfileStore,
    pub deck_store: DeckStore,
    pub results: MatchResultStore,
    pub sessions: Arc<SessionDirectory>,
    pub matchmaking: Arc<MatchmakingService>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let (profile_store, deck_store, results) = match &config.supabase {
            Some(supabase) => {
                info!(url = %supabase.url, "Using Supabase persistence");
                let client = SupabaseClient::new(&supabase.url, &supabase.service_role_key);
                let profiles = ProfileStore::remote(client.clone());
                (
                    profiles.clone(),
                    DeckStore::remote(client.clone()),
                    MatchResultStore::remote(client, profiles),
                )
            }
            None => {
                warn!("Supabase not configured, profiles and decks are kept in memory");
                let profiles = ProfileStore::in_memory();
                (
                    profiles.clone(),
                    DeckStore::in_memory(),
                    MatchResultStore::in_memory(profiles),
                )
            }
        };

        let match_registry = Arc::new(MatchRegistry::new());

        // Arc for sharing across cloned AppState
        let matchmaking = Arc::new(MatchmakingService::new(
            match_registry.clone(),
            Some(results.clone()),
        ));

        Self {
            config,
            profile_store,
            deck_store,
            results,
            sessions: Arc::new(SessionDirectory::new()),
            matchmaking,
            match_registry,
        }
    }
}
