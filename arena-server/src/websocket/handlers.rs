use std::sync::Arc;
use tracing::{info, warn};

use crate::error::MatchError;
use crate::match_manager::MatchManager;
use crate::matchmaking::{EnqueueOutcome, MatchmakingQueue};
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use arena_persistence::repositories::PlayerRepository;
use arena_types::{ClientMessage, Player, PlayerId, ServerMessage};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    match_manager: Arc<MatchManager>,
    matchmaking_queue: Arc<MatchmakingQueue>,
    player_repository: Arc<PlayerRepository>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        match_manager: Arc<MatchManager>,
        matchmaking_queue: Arc<MatchmakingQueue>,
        player_repository: Arc<PlayerRepository>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            match_manager,
            matchmaking_queue,
            player_repository,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        // Any client message counts as activity
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        let result = match message {
            ClientMessage::FindMatch { player_id, level } => {
                self.handle_find_match(player_id, level).await
            }
            ClientMessage::StartAiBattle { player_id, level } => {
                self.handle_start_ai_battle(player_id, level).await
            }
            ClientMessage::CancelMatch => self.handle_cancel_match().await,
            ClientMessage::TypingProgress {
                session_id,
                progress,
            } => {
                self.match_manager
                    .relay_progress(self.connection_id, session_id, progress)
                    .await
            }
            ClientMessage::SubmitCode {
                session_id,
                question_id,
                code,
            } => {
                self.match_manager
                    .submit_code(self.connection_id, session_id, question_id, &code)
                    .await
            }
            ClientMessage::Heartbeat => Ok(()),
        };

        // Domain failures go back to the client; only transport failures
        // tear the connection down.
        if let Err(e) = result {
            warn!("Request failed for {}: {}", self.connection_id, e);
            self.send_message(ServerMessage::MatchError {
                kind: e.kind(),
                message: e.to_string(),
            })
            .await?;
        }

        Ok(())
    }

    /// Report a payload that failed to parse as a client message.
    pub async fn handle_invalid_payload(&self, detail: String) {
        self.send_message(ServerMessage::MatchError {
            kind: arena_types::MatchErrorKind::InvalidMessage,
            message: detail,
        })
        .await
        .ok();
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);

        self.matchmaking_queue
            .remove_connection(self.connection_id)
            .await;
        self.match_manager
            .handle_disconnect(self.connection_id)
            .await;
    }

    /// Fetch the player record, creating a guest account on first contact.
    async fn lookup_or_create_player(&self, player_id: PlayerId) -> Result<Player, MatchError> {
        if let Some(player) = self.player_repository.find_by_id(player_id).await? {
            return Ok(player);
        }

        let short = player_id.simple().to_string();
        let player = self
            .player_repository
            .create_player(Player {
                id: player_id,
                email: format!("player-{}@arena.local", short),
                display_name: format!("Player {}", &short[..8]),
                points: 0,
                hp: arena_types::MAX_HP,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await?;
        info!("Created guest player {}", player.id);
        Ok(player)
    }

    async fn handle_find_match(&self, player_id: PlayerId, level: i32) -> Result<(), MatchError> {
        let player = self.lookup_or_create_player(player_id).await?;
        self.connection_manager
            .set_player(self.connection_id, player.clone())
            .await;

        let outcome = self
            .matchmaking_queue
            .enqueue(player.id, self.connection_id, level)
            .await
            .map_err(|_| MatchError::AlreadyQueued)?;

        match outcome {
            EnqueueOutcome::Waiting { position } => {
                info!(
                    "Player {} waiting for a match at position {}",
                    player.id, position
                );
                self.send_message(ServerMessage::Waiting)
                    .await
                    .map_err(MatchError::InvalidMessage)
            }
            EnqueueOutcome::Paired { opponent } => {
                let opponent_player = self
                    .player_repository
                    .find_by_id(opponent.player_id)
                    .await?
                    .ok_or_else(|| {
                        MatchError::Internal(anyhow::anyhow!(
                            "queued player {} has no record",
                            opponent.player_id
                        ))
                    })?;

                let result = self
                    .match_manager
                    .start_pvp_match(
                        (opponent_player, opponent.connection_id),
                        (player, self.connection_id),
                        level,
                    )
                    .await;

                if let Err(ref e) = result {
                    // The waiting side needs to hear about the failure too
                    self.connection_manager
                        .send_to_connection(
                            opponent.connection_id,
                            ServerMessage::MatchError {
                                kind: e.kind(),
                                message: e.to_string(),
                            },
                        )
                        .await
                        .ok();
                }
                result.map(|_| ())
            }
        }
    }

    async fn handle_start_ai_battle(
        &self,
        player_id: PlayerId,
        level: i32,
    ) -> Result<(), MatchError> {
        let player = self.lookup_or_create_player(player_id).await?;
        self.connection_manager
            .set_player(self.connection_id, player.clone())
            .await;

        self.match_manager
            .start_ai_battle(player, self.connection_id, level)
            .await
            .map(|_| ())
    }

    /// Leaving the queue is idempotent: the acknowledgment goes out whether
    /// or not an entry was actually removed.
    async fn handle_cancel_match(&self) -> Result<(), MatchError> {
        self.matchmaking_queue
            .remove_connection(self.connection_id)
            .await;

        self.send_message(ServerMessage::MatchCancelled)
            .await
            .map_err(MatchError::InvalidMessage)
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }
}
