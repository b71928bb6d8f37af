use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use arena_types::PlayerId;

use crate::websocket::connection::ConnectionId;

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub connection_id: ConnectionId,
    pub level: i32,
    pub queued_at: Instant,
}

/// What happened when a player asked for a match.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// No compatible opponent yet; the player now waits at this position.
    Waiting { position: u32 },
    /// Paired with an earlier entry, which has been removed from the queue.
    Paired { opponent: QueueEntry },
}

/// FIFO matchmaking queue with level-gated pairing.
///
/// A new entry scans the queue front to back and takes the first waiting
/// player within the level tolerance; otherwise it joins the back. The
/// scan and the insert happen under one write lock, so two concurrent
/// requests cannot both pair with the same opponent.
pub struct MatchmakingQueue {
    queue: RwLock<VecDeque<QueueEntry>>,
    level_tolerance: i32,
    queue_timeout: Duration,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::new_with_config(2, Duration::from_secs(300))
    }

    pub fn new_with_config(level_tolerance: i32, queue_timeout: Duration) -> Self {
        Self {
            queue: RwLock::new(VecDeque::new()),
            level_tolerance,
            queue_timeout,
        }
    }

    pub async fn enqueue(
        &self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        level: i32,
    ) -> Result<EnqueueOutcome, String> {
        let mut queue = self.queue.write().await;

        if queue.iter().any(|entry| entry.player_id == player_id) {
            return Err("Player already in queue".to_string());
        }

        let opponent_index = queue.iter().position(|entry| {
            entry.player_id != player_id && (entry.level - level).abs() <= self.level_tolerance
        });

        if let Some(index) = opponent_index {
            let opponent = queue
                .remove(index)
                .ok_or_else(|| "Queue entry vanished during pairing".to_string())?;
            info!(
                "Paired player {} (level {}) with {} (level {})",
                player_id, level, opponent.player_id, opponent.level
            );
            return Ok(EnqueueOutcome::Paired { opponent });
        }

        queue.push_back(QueueEntry {
            player_id,
            connection_id,
            level,
            queued_at: Instant::now(),
        });

        let position = queue.len() as u32;
        info!("Player {} waiting in queue at position {}", player_id, position);
        Ok(EnqueueOutcome::Waiting { position })
    }

    /// Remove a waiting player (cancel or disconnect). Returns whether an
    /// entry was actually removed.
    pub async fn remove_player(&self, player_id: PlayerId) -> bool {
        let mut queue = self.queue.write().await;
        if let Some(index) = queue.iter().position(|entry| entry.player_id == player_id) {
            queue.remove(index);
            info!("Player {} removed from queue", player_id);
            true
        } else {
            false
        }
    }

    pub async fn remove_connection(&self, connection_id: ConnectionId) -> bool {
        let mut queue = self.queue.write().await;
        if let Some(index) = queue
            .iter()
            .position(|entry| entry.connection_id == connection_id)
        {
            queue.remove(index);
            true
        } else {
            false
        }
    }

    pub async fn is_queued(&self, player_id: PlayerId) -> bool {
        let queue = self.queue.read().await;
        queue.iter().any(|entry| entry.player_id == player_id)
    }

    pub async fn queue_length(&self) -> usize {
        let queue = self.queue.read().await;
        queue.len()
    }

    /// Drop entries that waited past the timeout, returning them so the
    /// caller can notify their connections.
    pub async fn cleanup_expired(&self) -> Vec<QueueEntry> {
        let mut queue = self.queue.write().await;
        let now = Instant::now();

        let mut expired = Vec::new();
        queue.retain(|entry| {
            if now.duration_since(entry.queued_at) > self.queue_timeout {
                warn!("Removing expired queue entry for player {}", entry.player_id);
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });

        expired
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new()
    }
}
