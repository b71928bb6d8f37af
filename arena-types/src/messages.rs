use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{MatchErrorKind, Participant, ParticipantResult, PlayerId, Question, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    FindMatch { player_id: PlayerId, level: i32 },
    StartAiBattle { player_id: PlayerId, level: i32 },
    CancelMatch,
    TypingProgress { session_id: SessionId, progress: u32 },
    SubmitCode { session_id: SessionId, question_id: Uuid, code: String },
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    Waiting,
    MatchFound {
        session_id: SessionId,
        question: Question,
        participants: Vec<Participant>,
    },
    OpponentProgress { progress: u32 },
    SubmissionReceived,
    MatchFinished {
        winner_id: Option<PlayerId>,
        results: Vec<ParticipantResult>,
    },
    MatchCancelled,
    MatchError { kind: MatchErrorKind, message: String },
}
