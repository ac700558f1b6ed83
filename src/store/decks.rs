//! Named card selections saved per profile

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::game::catalog::CardKind;
use crate::game::economy::MAX_SELECTED_CARDS;

use super::supabase::SupabaseClient;
use super::StoreError;

const TABLE: &str = "decks";
const MAX_DECK_NAME_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDeck {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub card_types: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
enum Backend {
    Remote(SupabaseClient),
    Memory(Arc<Mutex<Vec<SavedDeck>>>),
}

/// Deck persistence; saving under an existing name replaces that deck
#[derive(Clone)]
pub struct DeckStore {
    backend: Backend,
}

fn validate(name: &str, card_types: &[String]) -> Result<(), StoreError> {
    let name = name.trim();
    let safe = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'));
    if name.is_empty() || name.chars().count() > MAX_DECK_NAME_LEN || !safe {
        return Err(StoreError::InvalidDeck(
            "name must be 1 to 32 letters, digits, spaces, '_' or '-'".into(),
        ));
    }
    if card_types.is_empty() || card_types.len() > MAX_SELECTED_CARDS {
        return Err(StoreError::InvalidDeck(format!(
            "a deck holds 1 to {} cards",
            MAX_SELECTED_CARDS
        )));
    }
    if let Some(unknown) = card_types.iter().find(|c| CardKind::parse(c).is_none()) {
        return Err(StoreError::InvalidDeck(format!("unknown card {}", unknown)));
    }
    Ok(())
}

impl DeckStore {
    pub fn remote(client: SupabaseClient) -> Self {
        Self {
            backend: Backend::Remote(client),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub async fn save_deck(
        &self,
        profile_id: Uuid,
        name: &str,
        card_types: Vec<String>,
    ) -> Result<SavedDeck, StoreError> {
        validate(name, &card_types)?;
        let name = name.trim().to_string();

        match &self.backend {
            Backend::Remote(client) => {
                let existing: Option<SavedDeck> = client
                    .select_one(
                        TABLE,
                        &format!("profile_id=eq.{}&name=eq.{}", profile_id, name),
                    )
                    .await?;
                let deck = SavedDeck {
                    id: existing.map(|d| d.id).unwrap_or_else(Uuid::new_v4),
                    profile_id,
                    name,
                    card_types,
                    updated_at: Utc::now(),
                };
                client.upsert(TABLE, &deck, "profile_id,name").await?;
                Ok(deck)
            }
            Backend::Memory(decks) => {
                let mut decks = decks.lock();
                let deck = match decks
                    .iter_mut()
                    .find(|d| d.profile_id == profile_id && d.name == name)
                {
                    Some(deck) => {
                        deck.card_types = card_types;
                        deck.updated_at = Utc::now();
                        deck.clone()
                    }
                    None => {
                        let deck = SavedDeck {
                            id: Uuid::new_v4(),
                            profile_id,
                            name,
                            card_types,
                            updated_at: Utc::now(),
                        };
                        decks.push(deck.clone());
                        deck
                    }
                };
                Ok(deck)
            }
        }
    }

    pub async fn load_decks(&self, profile_id: Uuid) -> Result<Vec<SavedDeck>, StoreError> {
        match &self.backend {
            Backend::Remote(client) => Ok(client
                .select(TABLE, &format!("profile_id=eq.{}&order=name.asc", profile_id))
                .await?),
            Backend::Memory(decks) => {
                let mut owned: Vec<SavedDeck> = decks
                    .lock()
                    .iter()
                    .filter(|d| d.profile_id == profile_id)
                    .cloned()
                    .collect();
                owned.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(owned)
            }
        }
    }
}
