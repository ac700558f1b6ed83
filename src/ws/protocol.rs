//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::catalog::{CardDefinition, FactoryKind, ResourceKind, UnitKind};
use crate::game::commands::GameCommand;
use crate::game::economy::Card;
use crate::game::entity::{AiState, Effect, EntityId, EntityKind};
use crate::game::production::ProductionItem;
use crate::game::world::EndReason;
use crate::store::{ProfileStats, SavedDeck};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Log in, creating the profile on first use
    Login {
        username: String,
        /// Accepted for client compatibility, not checked
        #[serde(default)]
        password: String,
    },

    Register {
        username: String,
        #[serde(default)]
        password: String,
    },

    /// Enter the matchmaking queue
    FindMatch {
        /// Card names for a custom deck; empty uses the default deck
        #[serde(default)]
        selected_deck: Vec<String>,
    },

    CancelMatch,

    /// In-match command
    Command(GameCommand),

    LeaveGame {
        #[serde(default)]
        surrender: bool,
    },

    GetStats,

    GetAllCards,

    SaveDeck {
        deck_name: String,
        card_types: Vec<String>,
    },

    LoadDecks,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    AuthResponse {
        success: bool,
        player_id: Option<Uuid>,
        message: String,
        player_stats: Option<ProfileStats>,
    },

    MatchmakingStatus {
        in_queue: bool,
        queue_position: usize,
        queue_size: usize,
    },

    MatchFound {
        match_id: Uuid,
        opponent_name: String,
        map_width: f32,
        map_height: f32,
        is_player1: bool,
    },

    /// Sent once the player's base and factory exist
    JoinAck {
        player_id: Uuid,
        map_width: f32,
        map_height: f32,
    },

    /// Full world state, sent every tick
    StateUpdate {
        tick: u64,
        entities: Vec<EntitySnapshot>,
        players: Vec<PlayerSnapshot>,
        factories: Vec<FactorySnapshot>,
        server_time: u64,
    },

    GameOver {
        winner_id: Option<Uuid>,
        reason: EndReason,
        game_stats: GameEndStats,
    },

    OpponentDisconnected { message: String, you_win: bool },

    GameLeft { success: bool, message: String },

    StatsResponse { stats: ProfileStats },

    AllCardsResponse { cards: Vec<CardDefinition> },

    DecksResponse { decks: Vec<SavedDeck> },

    Error { code: u16, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },
}

impl ServerMsg {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.code(),
            message: message.into(),
        }
    }
}

/// Numeric codes carried by `error` packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotAuthenticated,
    InvalidCredentials,
    AlreadyInGame,
    NotInGame,
    MalformedPacket,
    DeckSaveFailed,
    PersistenceUnavailable,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        match self {
            ErrorCode::NotAuthenticated => 1003,
            ErrorCode::InvalidCredentials => 1004,
            ErrorCode::AlreadyInGame => 2002,
            ErrorCode::NotInGame => 3001,
            ErrorCode::MalformedPacket => 3002,
            ErrorCode::DeckSaveFailed => 4001,
            ErrorCode::PersistenceUnavailable => 4002,
        }
    }
}

/// Entity state in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub owner_id: Option<Uuid>,
    pub hp: i32,
    pub max_hp: i32,
    pub resource_type: Option<ResourceKind>,
    pub resource_amount: i32,
    pub unit_type: Option<UnitKind>,
    pub factory_type: Option<FactoryKind>,
    pub ai_state: AiState,
    pub attacking_target_id: Option<EntityId>,
    pub target_x: Option<f32>,
    pub target_y: Option<f32>,
    /// Status effects active at snapshot time
    pub effects: Vec<Effect>,
}

/// Player economy in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub memory: i32,
    pub cpu: i32,
    pub hand: Vec<Card>,
    pub global_cooldown: f32,
    pub deck_size: usize,
    pub discard_size: usize,
}

/// Factory with its pending builds, head first
#[derive(Debug, Clone, Serialize)]
pub struct FactorySnapshot {
    pub id: EntityId,
    pub owner_id: Option<Uuid>,
    pub factory_type: FactoryKind,
    pub x: f32,
    pub y: f32,
    pub production_queue: Vec<ProductionItem>,
}

/// End-of-match numbers from the receiving player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameEndStats {
    pub game_duration_seconds: u32,
    pub your_units_created: u32,
    pub your_units_killed: u32,
    pub your_units_lost: u32,
    pub enemy_units_killed: u32,
    pub factories_built: u32,
    pub resources_captured: u32,
    pub cards_played: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::commands::CommandKind;

    #[test]
    fn command_packet_parses_flat() {
        let card = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"command","kind":"play_card","card_id":"{}","target_x":500,"target_y":400}}"#,
            card
        );
        let msg: ClientMsg = serde_json::from_str(&raw).unwrap();
        match msg {
            ClientMsg::Command(cmd) => {
                assert_eq!(cmd.kind, CommandKind::PlayCard);
                assert_eq!(cmd.card_id, Some(card));
                assert_eq!(cmd.target_x, 500.0);
                assert_eq!(cmd.entity_id, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn optional_fields_default() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"find_match"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::FindMatch { selected_deck } if selected_deck.is_empty()));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"leave_game"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::LeaveGame { surrender: false }));
    }

    #[test]
    fn unknown_packet_is_an_error() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>("not json").is_err());
    }

    #[test]
    fn error_packets_carry_numeric_codes() {
        let value = serde_json::to_value(ServerMsg::error(ErrorCode::AlreadyInGame, "busy")).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], 2002);
        assert_eq!(ErrorCode::MalformedPacket.code(), 3002);
    }
}
