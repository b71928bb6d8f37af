use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{players, prelude::*};
use arena_types::{Player, RewardDelta, MAX_HP};

pub struct PlayerRepository {
    db: DatabaseConnection,
}

/// A player row together with their running win/loss record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayerStats {
    pub player: Player,
    pub total_wins: i32,
    pub total_losses: i32,
}

impl PlayerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_player(model: &players::Model) -> Result<Player> {
        Ok(Player {
            id: Uuid::parse_str(&model.id)?,
            email: model.email.clone(),
            display_name: model.display_name.clone(),
            points: model.points,
            hp: model.hp,
            created_at: model.created_at.to_rfc3339(),
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Player>> {
        let model = Players::find_by_id(id.to_string()).one(&self.db).await?;
        model.as_ref().map(Self::model_to_player).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Player>> {
        let model = Players::find()
            .filter(players::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        model.as_ref().map(Self::model_to_player).transpose()
    }

    pub async fn create_player(&self, player: Player) -> Result<Player> {
        let now = chrono::Utc::now().into();
        let created_at = chrono::DateTime::parse_from_rfc3339(&player.created_at)
            .unwrap_or_else(|_| chrono::Utc::now().into());

        let model = players::ActiveModel {
            id: sea_orm::ActiveValue::Set(player.id.to_string()),
            email: sea_orm::ActiveValue::Set(player.email),
            display_name: sea_orm::ActiveValue::Set(player.display_name),
            points: sea_orm::ActiveValue::Set(player.points),
            hp: sea_orm::ActiveValue::Set(player.hp.clamp(0, MAX_HP)),
            total_wins: sea_orm::ActiveValue::Set(0),
            total_losses: sea_orm::ActiveValue::Set(0),
            created_at: sea_orm::ActiveValue::Set(created_at),
            updated_at: sea_orm::ActiveValue::Set(now),
        };

        let saved = Players::insert(model).exec(&self.db).await?;

        let created = Players::find_by_id(saved.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created player"))?;

        Self::model_to_player(&created)
    }

    /// Apply a resolved match delta to the player row. Health never leaves
    /// `[0, MAX_HP]` regardless of the delta.
    pub async fn apply_reward(&self, delta: &RewardDelta) -> Result<Player> {
        let model = Players::find_by_id(delta.player_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Player not found"))?;

        let updated = players::ActiveModel {
            id: sea_orm::ActiveValue::Unchanged(model.id.clone()),
            email: sea_orm::ActiveValue::Unchanged(model.email.clone()),
            display_name: sea_orm::ActiveValue::Unchanged(model.display_name.clone()),
            points: sea_orm::ActiveValue::Set(model.points + delta.points),
            hp: sea_orm::ActiveValue::Set((model.hp + delta.hp_delta).clamp(0, MAX_HP)),
            total_wins: sea_orm::ActiveValue::Set(model.total_wins + delta.wins),
            total_losses: sea_orm::ActiveValue::Set(model.total_losses + delta.losses),
            created_at: sea_orm::ActiveValue::Unchanged(model.created_at),
            updated_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        let saved = Players::update(updated).exec(&self.db).await?;
        Self::model_to_player(&saved)
    }

    pub async fn get_stats(&self, id: Uuid) -> Result<Option<PlayerStats>> {
        let model = Players::find_by_id(id.to_string()).one(&self.db).await?;

        match model {
            Some(model) => Ok(Some(PlayerStats {
                player: Self::model_to_player(&model)?,
                total_wins: model.total_wins,
                total_losses: model.total_losses,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};
    use uuid::Uuid;

    async fn setup_test_db() -> PlayerRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        PlayerRepository::new(db)
    }

    fn test_player(email: &str) -> Player {
        Player {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: "Test Player".to_string(),
            points: 0,
            hp: 5,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn delta(player_id: Uuid, points: i32, hp_delta: i32, won: bool) -> RewardDelta {
        RewardDelta {
            player_id,
            is_ai: false,
            points,
            hp_delta,
            wins: if won { 1 } else { 0 },
            losses: if won { 0 } else { 1 },
        }
    }

    #[tokio::test]
    async fn test_create_and_find_player() {
        let repo = setup_test_db().await;

        let player = test_player("test@example.com");
        let player_id = player.id;

        let created = repo.create_player(player.clone()).await.unwrap();
        assert_eq!(created.email, player.email);
        assert_eq!(created.hp, 5);

        let found = repo.find_by_id(player_id).await.unwrap().unwrap();
        assert_eq!(found.email, player.email);

        let by_email = repo.find_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, player_id);
    }

    #[tokio::test]
    async fn test_find_missing_player() {
        let repo = setup_test_db().await;
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_reward_updates_points_and_record() {
        let repo = setup_test_db().await;
        let player = test_player("winner@example.com");
        let player_id = player.id;
        repo.create_player(player).await.unwrap();

        let updated = repo
            .apply_reward(&delta(player_id, 120, -1, true))
            .await
            .unwrap();
        assert_eq!(updated.points, 120);
        assert_eq!(updated.hp, 4);

        let stats = repo.get_stats(player_id).await.unwrap().unwrap();
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.total_losses, 0);
    }

    #[tokio::test]
    async fn test_hp_never_leaves_bounds() {
        let repo = setup_test_db().await;
        let player = test_player("clamped@example.com");
        let player_id = player.id;
        repo.create_player(player).await.unwrap();

        // Already at max: a win cannot push hp past it
        let updated = repo
            .apply_reward(&delta(player_id, 100, 1, true))
            .await
            .unwrap();
        assert_eq!(updated.hp, 5);

        // Drain past zero
        for _ in 0..7 {
            repo.apply_reward(&delta(player_id, 0, -1, false))
                .await
                .unwrap();
        }
        let drained = repo.find_by_id(player_id).await.unwrap().unwrap();
        assert_eq!(drained.hp, 0);
    }
}
