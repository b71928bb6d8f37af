use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use arena_core::{evaluate_submission, resolve_rewards, simulate_opponent, MatchOutcome, MatchSession};
use arena_persistence::repositories::{LeaderboardRepository, PlayerRepository, QuestionRepository};
use arena_types::{
    EvaluationResult, MatchMode, Participant, Player, PlayerId, Question, ServerMessage, SessionId,
};

use crate::error::MatchError;
use crate::generator::QuestionGenerator;
use crate::websocket::connection::{ConnectionId, ConnectionManager};

struct ActiveSession {
    session: MatchSession,
    player_connections: HashMap<PlayerId, ConnectionId>,
    started_at: Instant,
    last_activity: Instant,
    /// Pre-computed opponent evaluation for AI battles, filled in by a
    /// background task once generated code has been run.
    ai_eval: Option<EvaluationResult>,
    ai_task: Option<JoinHandle<()>>,
}

struct FinishedSession {
    outcome: MatchOutcome,
    player_connections: HashMap<PlayerId, ConnectionId>,
    participants: Vec<Participant>,
}

/// Owns all active match sessions and drives them from first submission
/// to persisted rewards.
pub struct MatchManager {
    sessions: RwLock<HashMap<SessionId, ActiveSession>>,
    connection_manager: Arc<ConnectionManager>,
    player_repository: Arc<PlayerRepository>,
    question_repository: Arc<QuestionRepository>,
    leaderboard_repository: Arc<LeaderboardRepository>,
    generator: Arc<dyn QuestionGenerator>,
}

/// Map a player level onto the served difficulty band.
fn difficulty_band(level: i32) -> (i32, i32) {
    let target = ((level + 1) / 2).clamp(1, 5);
    ((target - 1).max(1), (target + 1).min(5))
}

impl MatchManager {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        player_repository: Arc<PlayerRepository>,
        question_repository: Arc<QuestionRepository>,
        leaderboard_repository: Arc<LeaderboardRepository>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            connection_manager,
            player_repository,
            question_repository,
            leaderboard_repository,
            generator,
        }
    }

    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Pick a question for the given player: an unseen one from the
    /// difficulty band first, then a freshly generated one, then any
    /// published question at all.
    async fn select_question(&self, player_id: PlayerId, level: i32) -> Result<Question, MatchError> {
        let (min_difficulty, max_difficulty) = difficulty_band(level);

        if let Some(question) = self
            .question_repository
            .find_unseen(player_id, min_difficulty, max_difficulty)
            .await?
        {
            return Ok(question);
        }

        let target = (min_difficulty + max_difficulty) / 2;
        match self.generator.generate_question(target).await {
            Ok(generated) => match generated.validate() {
                Ok(question) => {
                    let stored = self
                        .question_repository
                        .create_question(question, true)
                        .await?;
                    info!("Generated and stored new question {}", stored.id);
                    return Ok(stored);
                }
                Err(e) => warn!("Generated question failed validation: {}", e),
            },
            Err(e) => warn!("Question generation unavailable: {}", e),
        }

        match self.question_repository.any_published().await? {
            Some(question) => Ok(question),
            None => Err(MatchError::NoQuestionsAvailable),
        }
    }

    /// Start a solo battle against the synthetic opponent.
    pub async fn start_ai_battle(
        self: &Arc<Self>,
        player: Player,
        connection_id: ConnectionId,
        level: i32,
    ) -> Result<SessionId, MatchError> {
        let question = self.select_question(player.id, level).await?;
        self.question_repository
            .mark_seen(player.id, question.id)
            .await?;

        let participants = vec![
            Participant::human(player.id, player.display_name.clone()),
            Participant::synthetic_ai(),
        ];
        let session_id = Uuid::new_v4();
        let session = MatchSession::new(
            session_id,
            MatchMode::AiBattle,
            question.clone(),
            participants.clone(),
        );

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                session_id,
                ActiveSession {
                    session,
                    player_connections: HashMap::from([(player.id, connection_id)]),
                    started_at: Instant::now(),
                    last_activity: Instant::now(),
                    ai_eval: None,
                    ai_task: None,
                },
            );
        }
        self.connection_manager
            .set_session(connection_id, Some(session_id))
            .await;

        // Prepare the opponent's evaluation in the background so the
        // human's submission can be resolved without waiting on the
        // generation service.
        let manager = Arc::clone(self);
        let background_question = question.clone();
        let handle = tokio::spawn(async move {
            let eval = match manager
                .generator
                .generate_solution(&background_question)
                .await
            {
                Ok(code) => evaluate_submission(&code, &background_question.test_cases),
                Err(e) => {
                    info!("Falling back to simulated opponent: {}", e);
                    simulate_opponent(background_question.difficulty)
                }
            };

            let mut sessions = manager.sessions.write().await;
            if let Some(active) = sessions.get_mut(&session_id) {
                active.ai_eval = Some(eval);
            }
        });
        {
            let mut sessions = self.sessions.write().await;
            if let Some(active) = sessions.get_mut(&session_id) {
                active.ai_task = Some(handle);
            } else {
                handle.abort();
            }
        }

        self.connection_manager
            .send_to_connection(
                connection_id,
                ServerMessage::MatchFound {
                    session_id,
                    question,
                    participants,
                },
            )
            .await
            .map_err(MatchError::InvalidMessage)?;

        info!("Started AI battle {} for player {}", session_id, player.id);
        Ok(session_id)
    }

    /// Start a match between two paired humans.
    pub async fn start_pvp_match(
        &self,
        first: (Player, ConnectionId),
        second: (Player, ConnectionId),
        level: i32,
    ) -> Result<SessionId, MatchError> {
        let (first_player, first_conn) = first;
        let (second_player, second_conn) = second;

        let question = self.select_question(first_player.id, level).await?;
        self.question_repository
            .mark_seen(first_player.id, question.id)
            .await?;
        self.question_repository
            .mark_seen(second_player.id, question.id)
            .await?;

        let participants = vec![
            Participant::human(first_player.id, first_player.display_name.clone()),
            Participant::human(second_player.id, second_player.display_name.clone()),
        ];
        let session_id = Uuid::new_v4();
        let session = MatchSession::new(
            session_id,
            MatchMode::Pvp,
            question.clone(),
            participants.clone(),
        );

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                session_id,
                ActiveSession {
                    session,
                    player_connections: HashMap::from([
                        (first_player.id, first_conn),
                        (second_player.id, second_conn),
                    ]),
                    started_at: Instant::now(),
                    last_activity: Instant::now(),
                    ai_eval: None,
                    ai_task: None,
                },
            );
        }

        let message = ServerMessage::MatchFound {
            session_id,
            question,
            participants,
        };
        for conn in [first_conn, second_conn] {
            self.connection_manager
                .set_session(conn, Some(session_id))
                .await;
            if let Err(e) = self
                .connection_manager
                .send_to_connection(conn, message.clone())
                .await
            {
                warn!("Failed to deliver match notification: {}", e);
            }
        }

        info!(
            "Started PvP match {} between {} and {}",
            session_id, first_player.id, second_player.id
        );
        Ok(session_id)
    }

    /// Evaluate a submission and, if it completes the match, resolve it,
    /// persist rewards, and notify both sides.
    pub async fn submit_code(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        question_id: Uuid,
        code: &str,
    ) -> Result<(), MatchError> {
        // Interpretation can burn a full step budget, so it runs on a
        // snapshot of the test cases without holding the session lock.
        let (player_id, test_cases) = {
            let sessions = self.sessions.read().await;
            let active = sessions.get(&session_id).ok_or(MatchError::MatchNotFound)?;

            let player_id = active
                .player_connections
                .iter()
                .find(|(_, conn)| **conn == connection_id)
                .map(|(player, _)| *player)
                .ok_or(MatchError::NotInMatch)?;

            if active.session.question.id != question_id {
                return Err(MatchError::InvalidMessage(
                    "submission does not match the assigned question".to_string(),
                ));
            }
            if active.session.has_submitted(player_id) {
                return Err(MatchError::InvalidMessage(
                    "code already submitted for this match".to_string(),
                ));
            }

            (player_id, active.session.question.test_cases.clone())
        };

        let eval = evaluate_submission(code, &test_cases);

        let finished = {
            let mut sessions = self.sessions.write().await;
            let active = sessions
                .get_mut(&session_id)
                .ok_or(MatchError::MatchNotFound)?;

            let time_spent = active.started_at.elapsed().as_secs() as u32;
            // The session may have taken another submission while this one
            // was being evaluated; record_submission rejects the duplicate.
            if !active.session.record_submission(player_id, eval, time_spent) {
                return Err(MatchError::InvalidMessage(
                    "code already submitted for this match".to_string(),
                ));
            }
            active.last_activity = Instant::now();

            // In AI battles the opponent answers as soon as the human does
            if active.session.mode == MatchMode::AiBattle {
                let ai_id = active
                    .session
                    .participants
                    .iter()
                    .find(|p| p.is_ai)
                    .map(|p| p.player_id);
                if let Some(ai_id) = ai_id {
                    if !active.session.has_submitted(ai_id) {
                        let ai_eval = active
                            .ai_eval
                            .take()
                            .unwrap_or_else(|| simulate_opponent(active.session.question.difficulty));
                        active.session.record_submission(ai_id, ai_eval, time_spent);
                    }
                }
                if let Some(task) = active.ai_task.take() {
                    task.abort();
                }
            }

            match active.session.resolve() {
                Some(outcome) => {
                    let player_connections = active.player_connections.clone();
                    let participants = active.session.participants.clone();
                    if let Some(task) = active.ai_task.take() {
                        task.abort();
                    }
                    sessions.remove(&session_id);
                    Some(FinishedSession {
                        outcome,
                        player_connections,
                        participants,
                    })
                }
                None => None,
            }
        };

        self.connection_manager
            .send_to_connection(connection_id, ServerMessage::SubmissionReceived)
            .await
            .ok();

        if let Some(finished) = finished {
            self.finalize(finished).await;
        }

        Ok(())
    }

    /// Forward a typing progress update to the opponent.
    pub async fn relay_progress(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        progress: u32,
    ) -> Result<(), MatchError> {
        let target = {
            let mut sessions = self.sessions.write().await;
            let active = sessions
                .get_mut(&session_id)
                .ok_or(MatchError::MatchNotFound)?;

            let player_id = active
                .player_connections
                .iter()
                .find(|(_, conn)| **conn == connection_id)
                .map(|(player, _)| *player)
                .ok_or(MatchError::NotInMatch)?;

            if !active.session.set_progress(player_id, progress) {
                return Err(MatchError::InvalidMessage(
                    "progress rejected".to_string(),
                ));
            }
            active.last_activity = Instant::now();

            active
                .session
                .opponent_of(player_id)
                .filter(|opponent| !opponent.is_ai)
                .and_then(|opponent| active.player_connections.get(&opponent.player_id).copied())
        };

        if let Some(target) = target {
            let clamped = progress.min(100);
            self.connection_manager
                .send_to_connection(target, ServerMessage::OpponentProgress { progress: clamped })
                .await
                .ok();
        }

        Ok(())
    }

    /// A participant's connection dropped: the remaining side wins by
    /// forfeit and the session ends immediately.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        let finished = {
            let mut sessions = self.sessions.write().await;

            let found = sessions.iter_mut().find_map(|(id, active)| {
                active
                    .player_connections
                    .iter()
                    .find(|(_, conn)| **conn == connection_id)
                    .map(|(player, _)| (*id, *player))
            });

            match found {
                Some((session_id, leaver)) => {
                    let Some(active) = sessions.get_mut(&session_id) else {
                        return;
                    };
                    if let Some(task) = active.ai_task.take() {
                        task.abort();
                    }
                    match active.session.forfeit(leaver) {
                        Some(outcome) => {
                            let mut player_connections = active.player_connections.clone();
                            player_connections.remove(&leaver);
                            let participants = active.session.participants.clone();
                            sessions.remove(&session_id);
                            Some(FinishedSession {
                                outcome,
                                player_connections,
                                participants,
                            })
                        }
                        None => {
                            sessions.remove(&session_id);
                            None
                        }
                    }
                }
                None => None,
            }
        };

        if let Some(finished) = finished {
            info!("Resolving match by forfeit after disconnect");
            self.finalize(finished).await;
        }
    }

    /// Drop sessions with no activity inside the timeout and tell their
    /// participants the match is gone.
    pub async fn cleanup_stale_sessions(&self, timeout: Duration) {
        let stale: Vec<(SessionId, HashMap<PlayerId, ConnectionId>)> = {
            let mut sessions = self.sessions.write().await;
            let now = Instant::now();

            let expired: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, active)| now.duration_since(active.last_activity) > timeout)
                .map(|(id, _)| *id)
                .collect();

            expired
                .into_iter()
                .filter_map(|id| {
                    sessions.remove(&id).map(|mut active| {
                        if let Some(task) = active.ai_task.take() {
                            task.abort();
                        }
                        (id, active.player_connections)
                    })
                })
                .collect()
        };

        for (session_id, connections) in stale {
            warn!("Cleaning up stale session {}", session_id);
            for conn in connections.values() {
                self.connection_manager.set_session(*conn, None).await;
                self.connection_manager
                    .send_to_connection(*conn, ServerMessage::MatchCancelled)
                    .await
                    .ok();
            }
        }
    }

    async fn finalize(&self, finished: FinishedSession) {
        let FinishedSession {
            outcome,
            player_connections,
            participants,
        } = finished;

        for delta in resolve_rewards(&outcome) {
            if delta.is_ai {
                continue;
            }

            let display_name = participants
                .iter()
                .find(|p| p.player_id == delta.player_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_default();

            if let Err(e) = self.player_repository.apply_reward(&delta).await {
                error!("Failed to persist reward for {}: {}", delta.player_id, e);
            }
            if let Err(e) = self
                .leaderboard_repository
                .record_result(delta.player_id, &display_name, delta.points, delta.wins > 0)
                .await
            {
                error!("Failed to update leaderboard for {}: {}", delta.player_id, e);
            }
        }

        let message = ServerMessage::MatchFinished {
            winner_id: outcome.winner_id,
            results: outcome.results(),
        };
        for conn in player_connections.values() {
            self.connection_manager.set_session(*conn, None).await;
            self.connection_manager
                .send_to_connection(*conn, message.clone())
                .await
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::NullGenerator;
    use arena_persistence::connection::connect_to_memory_database;
    use arena_types::TestCase;
    use migration::{Migrator, MigratorTrait};
    use serde_json::json;

    async fn setup() -> (
        Arc<MatchManager>,
        Arc<ConnectionManager>,
        Arc<PlayerRepository>,
        Arc<QuestionRepository>,
    ) {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let connection_manager = Arc::new(ConnectionManager::new());
        let player_repository = Arc::new(PlayerRepository::new(db.clone()));
        let question_repository = Arc::new(QuestionRepository::new(db.clone()));
        let leaderboard_repository = Arc::new(LeaderboardRepository::new(db));

        let manager = Arc::new(MatchManager::new(
            connection_manager.clone(),
            player_repository.clone(),
            question_repository.clone(),
            leaderboard_repository,
            Arc::new(NullGenerator),
        ));

        (manager, connection_manager, player_repository, question_repository)
    }

    async fn seed_player(repo: &PlayerRepository, name: &str) -> Player {
        repo.create_player(Player {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name),
            display_name: name.to_string(),
            points: 0,
            hp: 5,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .await
        .unwrap()
    }

    async fn seed_question(repo: &QuestionRepository, difficulty: i32) -> Question {
        repo.create_question(
            Question {
                id: Uuid::new_v4(),
                title: "Add".to_string(),
                prompt: "Add two numbers.".to_string(),
                starter_code: "function add(a, b) {\n}".to_string(),
                test_cases: vec![TestCase {
                    input: vec![json!(1), json!(2)],
                    expected: json!(3),
                }],
                difficulty,
                points: 100,
                time_limit_seconds: 300,
            },
            true,
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_difficulty_band_tracks_level() {
        assert_eq!(difficulty_band(1), (1, 2));
        assert_eq!(difficulty_band(4), (1, 3));
        assert_eq!(difficulty_band(7), (3, 5));
        assert_eq!(difficulty_band(20), (4, 5));
    }

    #[tokio::test]
    async fn test_start_without_questions_fails() {
        let (manager, connections, players, _questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        let conn = ConnectionId::new();
        let _rx = connections.create_connection(conn).await;

        let result = manager.start_ai_battle(player, conn, 1).await;
        assert!(matches!(result, Err(MatchError::NoQuestionsAvailable)));
    }

    #[tokio::test]
    async fn test_ai_battle_full_round_trip() {
        let (manager, connections, players, questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        let question = seed_question(&questions, 1).await;

        let conn = ConnectionId::new();
        let mut rx = connections.create_connection(conn).await;

        let session_id = manager
            .start_ai_battle(player.clone(), conn, 1)
            .await
            .unwrap();
        assert_eq!(manager.session_count().await, 1);

        let found = rx.recv().await.unwrap();
        assert!(matches!(found, ServerMessage::MatchFound { .. }));

        manager
            .submit_code(
                conn,
                session_id,
                question.id,
                "function add(a, b) {\n    return a + b;\n}",
            )
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ServerMessage::SubmissionReceived));

        let finished = rx.recv().await.unwrap();
        match finished {
            ServerMessage::MatchFinished { winner_id, results } => {
                // A correct human submission always beats the synthetic side
                assert_eq!(winner_id, Some(player.id));
                assert_eq!(results.len(), 2);
            }
            other => panic!("Expected MatchFinished, got {:?}", other),
        }

        assert_eq!(manager.session_count().await, 0);

        // Rewards persisted
        let refreshed = players.find_by_id(player.id).await.unwrap().unwrap();
        assert!(refreshed.points >= 100);
    }

    #[tokio::test]
    async fn test_pvp_resolution_and_rewards() {
        let (manager, connections, players, questions) = setup().await;
        let alice = seed_player(&players, "alice").await;
        let bob = seed_player(&players, "bob").await;
        let question = seed_question(&questions, 1).await;

        let alice_conn = ConnectionId::new();
        let bob_conn = ConnectionId::new();
        let mut alice_rx = connections.create_connection(alice_conn).await;
        let mut bob_rx = connections.create_connection(bob_conn).await;

        let session_id = manager
            .start_pvp_match(
                (alice.clone(), alice_conn),
                (bob.clone(), bob_conn),
                1,
            )
            .await
            .unwrap();

        assert!(matches!(
            alice_rx.recv().await.unwrap(),
            ServerMessage::MatchFound { .. }
        ));
        assert!(matches!(
            bob_rx.recv().await.unwrap(),
            ServerMessage::MatchFound { .. }
        ));

        manager
            .submit_code(
                alice_conn,
                session_id,
                question.id,
                "function add(a, b) {\n    return a + b;\n}",
            )
            .await
            .unwrap();
        assert!(matches!(
            alice_rx.recv().await.unwrap(),
            ServerMessage::SubmissionReceived
        ));

        manager
            .submit_code(
                bob_conn,
                session_id,
                question.id,
                "function add(a, b) {\n    return a - b;\n}",
            )
            .await
            .unwrap();

        // Both sides hear the final result
        assert!(matches!(
            bob_rx.recv().await.unwrap(),
            ServerMessage::SubmissionReceived
        ));
        match alice_rx.recv().await.unwrap() {
            ServerMessage::MatchFinished { winner_id, .. } => {
                assert_eq!(winner_id, Some(alice.id))
            }
            other => panic!("Expected MatchFinished, got {:?}", other),
        }
        assert!(matches!(
            bob_rx.recv().await.unwrap(),
            ServerMessage::MatchFinished { .. }
        ));

        let alice_after = players.find_by_id(alice.id).await.unwrap().unwrap();
        let bob_after = players.find_by_id(bob.id).await.unwrap().unwrap();
        assert!(alice_after.points >= 100);
        assert_eq!(bob_after.points, 10);
        assert_eq!(bob_after.hp, 4);
    }

    #[tokio::test]
    async fn test_simultaneous_pvp_submissions_resolve_once() {
        let (manager, connections, players, questions) = setup().await;
        let alice = seed_player(&players, "alice").await;
        let bob = seed_player(&players, "bob").await;
        let question = seed_question(&questions, 1).await;

        let alice_conn = ConnectionId::new();
        let bob_conn = ConnectionId::new();
        let mut alice_rx = connections.create_connection(alice_conn).await;
        let mut bob_rx = connections.create_connection(bob_conn).await;

        let session_id = manager
            .start_pvp_match((alice.clone(), alice_conn), (bob.clone(), bob_conn), 1)
            .await
            .unwrap();
        let _ = alice_rx.recv().await;
        let _ = bob_rx.recv().await;

        let alice_task = {
            let manager = manager.clone();
            let question_id = question.id;
            tokio::spawn(async move {
                manager
                    .submit_code(
                        alice_conn,
                        session_id,
                        question_id,
                        "function add(a, b) {\n    return a + b;\n}",
                    )
                    .await
            })
        };
        let bob_task = {
            let manager = manager.clone();
            let question_id = question.id;
            tokio::spawn(async move {
                manager
                    .submit_code(
                        bob_conn,
                        session_id,
                        question_id,
                        "function add(a, b) {\n    return a - b;\n}",
                    )
                    .await
            })
        };
        alice_task.await.unwrap().unwrap();
        bob_task.await.unwrap().unwrap();

        assert_eq!(manager.session_count().await, 0);

        // Each side hears one ack and one final result, in either order
        for rx in [&mut alice_rx, &mut bob_rx] {
            let mut acks = 0;
            let mut finals = 0;
            for _ in 0..2 {
                match rx.recv().await.unwrap() {
                    ServerMessage::SubmissionReceived => acks += 1,
                    ServerMessage::MatchFinished { winner_id, .. } => {
                        assert_eq!(winner_id, Some(alice.id));
                        finals += 1;
                    }
                    other => panic!("Unexpected message: {:?}", other),
                }
            }
            assert_eq!((acks, finals), (1, 1));
        }

        // Rewards applied exactly once
        let alice_after = players.find_by_id(alice.id).await.unwrap().unwrap();
        let bob_after = players.find_by_id(bob.id).await.unwrap().unwrap();
        assert!(alice_after.points >= 100);
        assert_eq!(bob_after.points, 10);
        assert_eq!(bob_after.hp, 4);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let (manager, connections, players, questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        let question = seed_question(&questions, 1).await;

        let conn = ConnectionId::new();
        let _rx = connections.create_connection(conn).await;
        let session_id = manager.start_ai_battle(player, conn, 1).await.unwrap();

        manager
            .submit_code(conn, session_id, question.id, "function add(a, b) { return 0; }")
            .await
            .unwrap();

        // The session resolved on the first submission
        let result = manager
            .submit_code(conn, session_id, question.id, "function add(a, b) { return 0; }")
            .await;
        assert!(matches!(result, Err(MatchError::MatchNotFound)));
    }

    #[tokio::test]
    async fn test_wrong_question_rejected() {
        let (manager, connections, players, questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        let _question = seed_question(&questions, 1).await;

        let conn = ConnectionId::new();
        let _rx = connections.create_connection(conn).await;
        let session_id = manager.start_ai_battle(player, conn, 1).await.unwrap();

        let result = manager
            .submit_code(conn, session_id, Uuid::new_v4(), "function f() {}")
            .await;
        assert!(matches!(result, Err(MatchError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn test_outsider_cannot_submit() {
        let (manager, connections, players, questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        let question = seed_question(&questions, 1).await;

        let conn = ConnectionId::new();
        let _rx = connections.create_connection(conn).await;
        let session_id = manager.start_ai_battle(player, conn, 1).await.unwrap();

        let outsider = ConnectionId::new();
        let _outsider_rx = connections.create_connection(outsider).await;
        let result = manager
            .submit_code(outsider, session_id, question.id, "function f() {}")
            .await;
        assert!(matches!(result, Err(MatchError::NotInMatch)));
    }

    #[tokio::test]
    async fn test_progress_relay_between_humans() {
        let (manager, connections, players, questions) = setup().await;
        let alice = seed_player(&players, "alice").await;
        let bob = seed_player(&players, "bob").await;
        seed_question(&questions, 1).await;

        let alice_conn = ConnectionId::new();
        let bob_conn = ConnectionId::new();
        let mut alice_rx = connections.create_connection(alice_conn).await;
        let mut bob_rx = connections.create_connection(bob_conn).await;

        let session_id = manager
            .start_pvp_match((alice, alice_conn), (bob, bob_conn), 1)
            .await
            .unwrap();
        let _ = alice_rx.recv().await;
        let _ = bob_rx.recv().await;

        manager
            .relay_progress(alice_conn, session_id, 55)
            .await
            .unwrap();

        match bob_rx.recv().await.unwrap() {
            ServerMessage::OpponentProgress { progress } => assert_eq!(progress, 55),
            other => panic!("Expected OpponentProgress, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_forfeits_to_opponent() {
        let (manager, connections, players, questions) = setup().await;
        let alice = seed_player(&players, "alice").await;
        let bob = seed_player(&players, "bob").await;
        seed_question(&questions, 1).await;

        let alice_conn = ConnectionId::new();
        let bob_conn = ConnectionId::new();
        let mut alice_rx = connections.create_connection(alice_conn).await;
        let mut bob_rx = connections.create_connection(bob_conn).await;

        manager
            .start_pvp_match((alice.clone(), alice_conn), (bob.clone(), bob_conn), 1)
            .await
            .unwrap();
        let _ = alice_rx.recv().await;
        let _ = bob_rx.recv().await;

        manager.handle_disconnect(bob_conn).await;

        match alice_rx.recv().await.unwrap() {
            ServerMessage::MatchFinished { winner_id, .. } => {
                assert_eq!(winner_id, Some(alice.id))
            }
            other => panic!("Expected MatchFinished, got {:?}", other),
        }
        assert_eq!(manager.session_count().await, 0);

        let bob_after = players.find_by_id(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_after.points, 0);
        assert_eq!(bob_after.hp, 4);
    }

    #[tokio::test]
    async fn test_stale_sessions_cancelled() {
        let (manager, connections, players, questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        seed_question(&questions, 1).await;

        let conn = ConnectionId::new();
        let mut rx = connections.create_connection(conn).await;
        manager.start_ai_battle(player, conn, 1).await.unwrap();
        let _ = rx.recv().await;

        tokio::time::sleep(Duration::from_millis(15)).await;
        manager
            .cleanup_stale_sessions(Duration::from_millis(10))
            .await;

        assert_eq!(manager.session_count().await, 0);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::MatchCancelled
        ));
    }

    #[tokio::test]
    async fn test_question_not_repeated_for_player() {
        let (manager, connections, players, questions) = setup().await;
        let player = seed_player(&players, "alice").await;
        let first = seed_question(&questions, 1).await;
        let second = seed_question(&questions, 2).await;

        let conn = ConnectionId::new();
        let mut rx = connections.create_connection(conn).await;
        manager
            .start_ai_battle(player.clone(), conn, 1)
            .await
            .unwrap();
        let first_served = match rx.recv().await.unwrap() {
            ServerMessage::MatchFound { question, .. } => question.id,
            other => panic!("Expected MatchFound, got {:?}", other),
        };
        manager.handle_disconnect(conn).await;

        // Second battle must serve the question the player has not seen
        let conn2 = ConnectionId::new();
        let mut rx2 = connections.create_connection(conn2).await;
        manager.start_ai_battle(player, conn2, 1).await.unwrap();
        match rx2.recv().await.unwrap() {
            ServerMessage::MatchFound { question, .. } => {
                assert_ne!(question.id, first_served);
                assert!(question.id == first.id || question.id == second.id);
            }
            other => panic!("Expected MatchFound, got {:?}", other),
        }
    }
}
