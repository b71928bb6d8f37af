use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LeaderboardEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeaderboardEntries::PlayerId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::DisplayName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::Points)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::Wins)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::Losses)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index on points for ranked reads
        manager
            .create_index(
                Index::create()
                    .name("idx_leaderboard_entries_points")
                    .table(LeaderboardEntries::Table)
                    .col(LeaderboardEntries::Points)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeaderboardEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LeaderboardEntries {
    Table,
    PlayerId,
    DisplayName,
    Points,
    Wins,
    Losses,
    UpdatedAt,
}
