use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Questions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Questions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Questions::Title).string().not_null())
                    .col(ColumnDef::new(Questions::Prompt).text().not_null())
                    .col(ColumnDef::new(Questions::StarterCode).text().not_null())
                    // Serialized JSON array of test cases
                    .col(ColumnDef::new(Questions::TestCases).text().not_null())
                    .col(ColumnDef::new(Questions::Difficulty).integer().not_null())
                    .col(ColumnDef::new(Questions::Points).integer().not_null())
                    .col(
                        ColumnDef::new(Questions::TimeLimitSeconds)
                            .integer()
                            .not_null()
                            .default(300),
                    )
                    .col(
                        ColumnDef::new(Questions::Published)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Questions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index on difficulty for question selection by level band
        manager
            .create_index(
                Index::create()
                    .name("idx_questions_difficulty")
                    .table(Questions::Table)
                    .col(Questions::Difficulty)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Questions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Questions {
    Table,
    Id,
    Title,
    Prompt,
    StarterCode,
    TestCases,
    Difficulty,
    Points,
    TimeLimitSeconds,
    Published,
    CreatedAt,
}
