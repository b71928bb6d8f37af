use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{prelude::*, questions, seen_questions};
use arena_types::{Question, TestCase};

pub struct QuestionRepository {
    db: DatabaseConnection,
}

impl QuestionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_question(model: &questions::Model) -> Result<Question> {
        let test_cases: Vec<TestCase> = serde_json::from_str(&model.test_cases)?;
        Ok(Question {
            id: Uuid::parse_str(&model.id)?,
            title: model.title.clone(),
            prompt: model.prompt.clone(),
            starter_code: model.starter_code.clone(),
            test_cases,
            difficulty: model.difficulty,
            points: model.points,
            time_limit_seconds: model.time_limit_seconds as u32,
        })
    }

    pub async fn create_question(&self, question: Question, published: bool) -> Result<Question> {
        let model = questions::ActiveModel {
            id: sea_orm::ActiveValue::Set(question.id.to_string()),
            title: sea_orm::ActiveValue::Set(question.title),
            prompt: sea_orm::ActiveValue::Set(question.prompt),
            starter_code: sea_orm::ActiveValue::Set(question.starter_code),
            test_cases: sea_orm::ActiveValue::Set(serde_json::to_string(&question.test_cases)?),
            difficulty: sea_orm::ActiveValue::Set(question.difficulty),
            points: sea_orm::ActiveValue::Set(question.points),
            time_limit_seconds: sea_orm::ActiveValue::Set(question.time_limit_seconds as i32),
            published: sea_orm::ActiveValue::Set(published),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        let saved = Questions::insert(model).exec(&self.db).await?;

        let created = Questions::find_by_id(saved.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created question"))?;

        Self::model_to_question(&created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>> {
        let model = Questions::find_by_id(id.to_string()).one(&self.db).await?;
        model.as_ref().map(Self::model_to_question).transpose()
    }

    /// Pick a published question within the difficulty band that the
    /// player has not been shown before.
    pub async fn find_unseen(
        &self,
        player_id: Uuid,
        min_difficulty: i32,
        max_difficulty: i32,
    ) -> Result<Option<Question>> {
        let seen_ids: Vec<String> = SeenQuestions::find()
            .filter(seen_questions::Column::PlayerId.eq(player_id.to_string()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| row.question_id)
            .collect();

        let mut query = Questions::find()
            .filter(questions::Column::Published.eq(true))
            .filter(questions::Column::Difficulty.gte(min_difficulty))
            .filter(questions::Column::Difficulty.lte(max_difficulty));

        if !seen_ids.is_empty() {
            query = query.filter(questions::Column::Id.is_not_in(seen_ids));
        }

        let model = query.limit(1).one(&self.db).await?;
        model.as_ref().map(Self::model_to_question).transpose()
    }

    /// Last-resort selection: any published question, seen or not.
    pub async fn any_published(&self) -> Result<Option<Question>> {
        let model = Questions::find()
            .filter(questions::Column::Published.eq(true))
            .limit(1)
            .one(&self.db)
            .await?;

        model.as_ref().map(Self::model_to_question).transpose()
    }

    /// Record that a player has been shown a question. Safe to call twice
    /// for the same pair.
    pub async fn mark_seen(&self, player_id: Uuid, question_id: Uuid) -> Result<()> {
        let existing = SeenQuestions::find_by_id((player_id.to_string(), question_id.to_string()))
            .one(&self.db)
            .await?;

        if existing.is_some() {
            debug!(%player_id, %question_id, "question already marked seen");
            return Ok(());
        }

        let model = seen_questions::ActiveModel {
            player_id: sea_orm::ActiveValue::Set(player_id.to_string()),
            question_id: sea_orm::ActiveValue::Set(question_id.to_string()),
            seen_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        SeenQuestions::insert(model).exec(&self.db).await?;
        Ok(())
    }
}
