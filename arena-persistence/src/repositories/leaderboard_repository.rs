use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entities::{leaderboard_entries, prelude::*};

pub struct LeaderboardRepository {
    db: DatabaseConnection,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RankedEntry {
    pub player_id: Uuid,
    pub display_name: String,
    pub points: i32,
    pub wins: i32,
    pub losses: i32,
    pub rank: u32,
}

impl LeaderboardRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Fold one match result into the player's leaderboard row, creating
    /// it on first contact.
    pub async fn record_result(
        &self,
        player_id: Uuid,
        display_name: &str,
        points_gained: i32,
        won: bool,
    ) -> Result<()> {
        let now = chrono::Utc::now().into();
        let existing = LeaderboardEntries::find_by_id(player_id.to_string())
            .one(&self.db)
            .await?;

        match existing {
            Some(entry) => {
                let updated = leaderboard_entries::ActiveModel {
                    player_id: sea_orm::ActiveValue::Unchanged(entry.player_id.clone()),
                    display_name: sea_orm::ActiveValue::Set(display_name.to_string()),
                    points: sea_orm::ActiveValue::Set(entry.points + points_gained),
                    wins: sea_orm::ActiveValue::Set(entry.wins + if won { 1 } else { 0 }),
                    losses: sea_orm::ActiveValue::Set(entry.losses + if won { 0 } else { 1 }),
                    updated_at: sea_orm::ActiveValue::Set(now),
                };
                LeaderboardEntries::update(updated).exec(&self.db).await?;
            }
            None => {
                let model = leaderboard_entries::ActiveModel {
                    player_id: sea_orm::ActiveValue::Set(player_id.to_string()),
                    display_name: sea_orm::ActiveValue::Set(display_name.to_string()),
                    points: sea_orm::ActiveValue::Set(points_gained),
                    wins: sea_orm::ActiveValue::Set(if won { 1 } else { 0 }),
                    losses: sea_orm::ActiveValue::Set(if won { 0 } else { 1 }),
                    updated_at: sea_orm::ActiveValue::Set(now),
                };
                LeaderboardEntries::insert(model).exec(&self.db).await?;
            }
        }

        Ok(())
    }

    pub async fn get_leaderboard(&self, limit: u64) -> Result<Vec<RankedEntry>> {
        let entries = LeaderboardEntries::find()
            .order_by_desc(leaderboard_entries::Column::Points)
            .limit(limit)
            .all(&self.db)
            .await?;

        entries
            .into_iter()
            .enumerate()
            .map(|(index, model)| {
                Ok(RankedEntry {
                    player_id: Uuid::parse_str(&model.player_id)?,
                    display_name: model.display_name,
                    points: model.points,
                    wins: model.wins,
                    losses: model.losses,
                    rank: (index + 1) as u32,
                })
            })
            .collect()
    }

    pub async fn get_rank(&self, player_id: Uuid) -> Result<Option<u32>> {
        let entry = LeaderboardEntries::find_by_id(player_id.to_string())
            .one(&self.db)
            .await?;

        if let Some(entry) = entry {
            let above = LeaderboardEntries::find()
                .filter(leaderboard_entries::Column::Points.gt(entry.points))
                .count(&self.db)
                .await?;

            Ok(Some(above as u32 + 1))
        } else {
            Ok(None)
        }
    }
}
