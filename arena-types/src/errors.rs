use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Structured error kinds surfaced to clients. The original protocol used
/// free-form reason strings; these tags are the upgraded equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MatchErrorKind {
    GenerationFailure,
    NoQuestionsAvailable,
    MatchNotFound,
    NotInMatch,
    AlreadyQueued,
    InvalidMessage,
    Internal,
}
