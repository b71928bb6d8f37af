use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::PlayerId;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MatchMode {
    AiBattle,
    Pvp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MatchStatus {
    Pending,   // Created, question assigned, awaiting submissions
    InProgress, // At least one submission recorded
    Completed, // Terminal
}

/// Final per-side result reported to both clients when a match finishes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ParticipantResult {
    pub player_id: PlayerId,
    pub is_ai: bool,
    pub score: i32,
    pub correct: bool,
    pub runtime_ms: u64,
    pub style_score: i32,
}

/// Per-player state change applied after a resolved match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RewardDelta {
    pub player_id: PlayerId,
    pub is_ai: bool,
    pub points: i32,
    pub hp_delta: i32,
    pub wins: i32,
    pub losses: i32,
}
