//! Match session lifecycle: submissions in, a single resolved outcome out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use arena_types::{
    EvaluationResult, MatchMode, MatchStatus, Participant, ParticipantResult, PlayerId, Question,
    SessionId,
};

use crate::scoring::{bias_against_ai, match_score};

/// One recorded submission, scored at record time.
#[derive(Debug, Clone)]
pub struct Submission {
    pub player_id: PlayerId,
    pub is_ai: bool,
    pub eval: EvaluationResult,
    pub score: i32,
    pub time_spent_seconds: u32,
}

/// Final state of one side of a resolved match.
#[derive(Debug, Clone)]
pub struct ResolvedSide {
    pub player_id: PlayerId,
    pub is_ai: bool,
    pub score: i32,
    pub correct: bool,
    pub runtime_ms: u64,
    pub style_score: i32,
    pub time_spent_seconds: u32,
    pub forfeited: bool,
}

/// The single, immutable result of a completed session.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub session_id: SessionId,
    pub mode: MatchMode,
    pub question_points: i32,
    pub time_limit_seconds: u32,
    pub winner_id: Option<PlayerId>,
    pub sides: Vec<ResolvedSide>,
}

impl MatchOutcome {
    /// Wire-facing per-side results, winner first.
    pub fn results(&self) -> Vec<ParticipantResult> {
        self.sides
            .iter()
            .map(|side| ParticipantResult {
                player_id: side.player_id,
                is_ai: side.is_ai,
                score: side.score,
                correct: side.correct,
                runtime_ms: side.runtime_ms,
                style_score: side.style_score,
            })
            .collect()
    }

    pub fn side(&self, player_id: PlayerId) -> Option<&ResolvedSide> {
        self.sides.iter().find(|s| s.player_id == player_id)
    }
}

/// An active match between two participants (human/human or human/AI).
///
/// Resolution is idempotent: the first call that finds both submissions in
/// place produces the outcome and moves the session to `Completed`; every
/// later call returns `None`.
#[derive(Debug)]
pub struct MatchSession {
    pub id: SessionId,
    pub mode: MatchMode,
    pub question: Question,
    pub participants: Vec<Participant>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    submissions: HashMap<PlayerId, Submission>,
    progress: HashMap<PlayerId, u32>,
}

impl MatchSession {
    pub fn new(
        id: SessionId,
        mode: MatchMode,
        question: Question,
        participants: Vec<Participant>,
    ) -> Self {
        Self {
            id,
            mode,
            question,
            participants,
            status: MatchStatus::Pending,
            created_at: Utc::now(),
            submissions: HashMap::new(),
            progress: HashMap::new(),
        }
    }

    pub fn contains_player(&self, player_id: PlayerId) -> bool {
        self.participants.iter().any(|p| p.player_id == player_id)
    }

    pub fn has_submitted(&self, player_id: PlayerId) -> bool {
        self.submissions.contains_key(&player_id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    /// The other participant, for relaying progress and results.
    pub fn opponent_of(&self, player_id: PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.player_id != player_id)
    }

    /// Record typing progress for broadcast. Returns false for non-members
    /// and for completed sessions.
    pub fn set_progress(&mut self, player_id: PlayerId, progress: u32) -> bool {
        if self.is_completed() || !self.contains_player(player_id) {
            return false;
        }
        self.progress.insert(player_id, progress.min(100));
        true
    }

    pub fn progress_of(&self, player_id: PlayerId) -> u32 {
        self.progress.get(&player_id).copied().unwrap_or(0)
    }

    /// Record one side's evaluated submission. A second submission from the
    /// same player or a submission to a completed session is rejected.
    pub fn record_submission(
        &mut self,
        player_id: PlayerId,
        eval: EvaluationResult,
        time_spent_seconds: u32,
    ) -> bool {
        if self.is_completed() || self.has_submitted(player_id) {
            return false;
        }
        let Some(participant) = self.participants.iter().find(|p| p.player_id == player_id) else {
            return false;
        };

        let score = match_score(self.question.points, &eval);
        debug!(
            session_id = %self.id,
            %player_id,
            score,
            correct = eval.correct,
            "submission recorded"
        );

        self.submissions.insert(
            player_id,
            Submission {
                player_id,
                is_ai: participant.is_ai,
                eval,
                score,
                time_spent_seconds,
            },
        );
        self.status = MatchStatus::InProgress;
        true
    }

    /// Resolve the session if both submissions are in. Returns the outcome
    /// exactly once; the session is terminal afterwards.
    pub fn resolve(&mut self) -> Option<MatchOutcome> {
        if self.is_completed() || self.submissions.len() < self.participants.len() {
            return None;
        }

        let mut sides: Vec<ResolvedSide> = self
            .participants
            .iter()
            .filter_map(|p| self.submissions.get(&p.player_id))
            .map(|sub| ResolvedSide {
                player_id: sub.player_id,
                is_ai: sub.is_ai,
                score: sub.score,
                correct: sub.eval.correct,
                runtime_ms: sub.eval.runtime_ms,
                style_score: sub.eval.style_score,
                time_spent_seconds: sub.time_spent_seconds,
                forfeited: false,
            })
            .collect();

        // Against the synthetic opponent the human's recorded score gets a
        // small edge, applied before the winner is picked.
        if self.mode == MatchMode::AiBattle {
            let ai_score = sides.iter().find(|s| s.is_ai).map(|s| s.score);
            if let Some(ai_score) = ai_score {
                for side in sides.iter_mut().filter(|s| !s.is_ai) {
                    side.score = bias_against_ai(side.score, ai_score);
                }
            }
        }

        self.finish(sides)
    }

    /// Resolve immediately because `leaver` abandoned the match. The
    /// remaining side wins with whatever they have; the leaver records a
    /// zero. Returns `None` if the session already completed.
    pub fn forfeit(&mut self, leaver: PlayerId) -> Option<MatchOutcome> {
        if self.is_completed() || !self.contains_player(leaver) {
            return None;
        }

        let sides: Vec<ResolvedSide> = self
            .participants
            .iter()
            .map(|p| match self.submissions.get(&p.player_id) {
                Some(sub) if p.player_id != leaver => ResolvedSide {
                    player_id: sub.player_id,
                    is_ai: sub.is_ai,
                    score: sub.score,
                    correct: sub.eval.correct,
                    runtime_ms: sub.eval.runtime_ms,
                    style_score: sub.eval.style_score,
                    time_spent_seconds: sub.time_spent_seconds,
                    forfeited: false,
                },
                _ => ResolvedSide {
                    player_id: p.player_id,
                    is_ai: p.is_ai,
                    score: 0,
                    correct: false,
                    runtime_ms: 0,
                    style_score: 0,
                    time_spent_seconds: 0,
                    forfeited: p.player_id == leaver,
                },
            })
            .collect();

        // The leaver never wins a forfeit, even on equal (zero) scores.
        let winner_id = sides
            .iter()
            .find(|s| s.player_id != leaver)
            .map(|s| s.player_id);

        self.status = MatchStatus::Completed;
        Some(MatchOutcome {
            session_id: self.id,
            mode: self.mode,
            question_points: self.question.points,
            time_limit_seconds: self.question.time_limit_seconds,
            winner_id,
            sides,
        })
    }

    fn finish(&mut self, mut sides: Vec<ResolvedSide>) -> Option<MatchOutcome> {
        sides.sort_by(|a, b| b.score.cmp(&a.score));

        let winner_id = match (sides.first(), sides.get(1)) {
            (Some(a), Some(b)) if a.score == b.score => None,
            (Some(a), _) => Some(a.player_id),
            _ => None,
        };

        self.status = MatchStatus::Completed;
        Some(MatchOutcome {
            session_id: self.id,
            mode: self.mode,
            question_points: self.question.points,
            time_limit_seconds: self.question.time_limit_seconds,
            winner_id,
            sides,
        })
    }
}
