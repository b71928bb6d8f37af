use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub type PlayerId = Uuid;

/// Maximum health points a player can hold.
pub const MAX_HP: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub email: String,
    pub display_name: String,
    pub points: i32,
    pub hp: i32,
    pub created_at: String, // ISO 8601 string for simplicity
}

/// One side of a match session: a human player or a synthetic AI identity.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Participant {
    pub player_id: PlayerId,
    pub display_name: String,
    pub is_ai: bool,
    pub is_ready: bool,
    pub score: Option<i32>,
}

impl Participant {
    pub fn human(player_id: PlayerId, display_name: String) -> Self {
        Self {
            player_id,
            display_name,
            is_ai: false,
            is_ready: true,
            score: None,
        }
    }

    pub fn synthetic_ai() -> Self {
        Self {
            player_id: Uuid::new_v4(),
            display_name: "AI Opponent".to_string(),
            is_ai: true,
            is_ready: true,
            score: None,
        }
    }
}
