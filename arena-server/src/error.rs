use arena_types::MatchErrorKind;
use thiserror::Error;

/// Server-side match errors. Each maps to a structured kind on the wire
/// so clients can react without parsing message text.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Question generation failed: {0}")]
    Generation(String),

    #[error("No questions available")]
    NoQuestionsAvailable,

    #[error("Match not found")]
    MatchNotFound,

    #[error("Not a participant in this match")]
    NotInMatch,

    #[error("Already in the matchmaking queue")]
    AlreadyQueued,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MatchError {
    pub fn kind(&self) -> MatchErrorKind {
        match self {
            MatchError::Generation(_) => MatchErrorKind::GenerationFailure,
            MatchError::NoQuestionsAvailable => MatchErrorKind::NoQuestionsAvailable,
            MatchError::MatchNotFound => MatchErrorKind::MatchNotFound,
            MatchError::NotInMatch => MatchErrorKind::NotInMatch,
            MatchError::AlreadyQueued => MatchErrorKind::AlreadyQueued,
            MatchError::InvalidMessage(_) => MatchErrorKind::InvalidMessage,
            MatchError::Internal(_) => MatchErrorKind::Internal,
        }
    }
}
