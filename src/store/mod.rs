//! Persistence for profiles, decks and match results.
//!
//! Every store runs against the hosted database when credentials are
//! configured and against process memory otherwise.

pub mod decks;
pub mod profiles;
pub mod results;
pub mod supabase;

pub use decks::{DeckStore, SavedDeck};
pub use profiles::{Profile, ProfileStats, ProfileStore};
pub use results::{MatchResult, MatchResultStore, PlayerResult};
pub use supabase::{SupabaseClient, SupabaseError};

use uuid::Uuid;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Supabase(#[from] SupabaseError),

    #[error("Username must be 3 to 32 letters, digits, '_' or '-'")]
    InvalidUsername,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("Invalid deck: {0}")]
    InvalidDeck(String),
}

impl StoreError {
    /// True when the database could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Supabase(SupabaseError::Request(_)))
    }
}
