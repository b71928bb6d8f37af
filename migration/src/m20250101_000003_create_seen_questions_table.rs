use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SeenQuestions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SeenQuestions::PlayerId).string().not_null())
                    .col(
                        ColumnDef::new(SeenQuestions::QuestionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SeenQuestions::SeenAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(SeenQuestions::PlayerId)
                            .col(SeenQuestions::QuestionId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_seen_questions_player")
                    .table(SeenQuestions::Table)
                    .col(SeenQuestions::PlayerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SeenQuestions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SeenQuestions {
    Table,
    PlayerId,
    QuestionId,
    SeenAt,
}
