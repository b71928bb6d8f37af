use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use arena_types::{Question, TestCase, DEFAULT_TIME_LIMIT_SECONDS};

use crate::error::MatchError;

/// A freshly generated question before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub title: String,
    pub prompt: String,
    #[serde(default)]
    pub starter_code: String,
    pub test_cases: Vec<TestCase>,
    pub difficulty: i32,
    pub points: i32,
}

impl GeneratedQuestion {
    /// Check the generated payload and promote it to a real question.
    /// Empty titles or prompts, missing test cases, or out-of-range
    /// difficulty all reject the payload.
    pub fn validate(self) -> Result<Question, MatchError> {
        if self.title.trim().is_empty() {
            return Err(MatchError::Generation("empty title".to_string()));
        }
        if self.prompt.trim().is_empty() {
            return Err(MatchError::Generation("empty prompt".to_string()));
        }
        if self.test_cases.is_empty() {
            return Err(MatchError::Generation("no test cases".to_string()));
        }
        if !(1..=5).contains(&self.difficulty) {
            return Err(MatchError::Generation(format!(
                "difficulty {} out of range",
                self.difficulty
            )));
        }
        if self.points <= 0 {
            return Err(MatchError::Generation("non-positive points".to_string()));
        }

        Ok(Question {
            id: Uuid::new_v4(),
            title: self.title,
            prompt: self.prompt,
            starter_code: self.starter_code,
            test_cases: self.test_cases,
            difficulty: self.difficulty,
            points: self.points,
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
        })
    }
}

/// Source of new questions and opponent solutions.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate a question at the given difficulty.
    async fn generate_question(&self, difficulty: i32) -> Result<GeneratedQuestion, MatchError>;

    /// Produce opponent code for a question. Implementations may fail;
    /// callers fall back to a simulated opponent.
    async fn generate_solution(&self, question: &Question) -> Result<String, MatchError>;
}

/// Client for an external generation service.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateQuestionRequest {
    difficulty: i32,
}

#[derive(Serialize)]
struct GenerateSolutionRequest<'a> {
    prompt: &'a str,
    starter_code: &'a str,
}

#[derive(Deserialize)]
struct GenerateSolutionResponse {
    code: String,
}

impl HttpGenerator {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl QuestionGenerator for HttpGenerator {
    async fn generate_question(&self, difficulty: i32) -> Result<GeneratedQuestion, MatchError> {
        info!("Requesting generated question at difficulty {}", difficulty);

        let response = self
            .client
            .post(format!("{}/generate/question", self.base_url))
            .json(&GenerateQuestionRequest { difficulty })
            .send()
            .await
            .map_err(|e| MatchError::Generation(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MatchError::Generation(format!(
                "generator returned {}",
                response.status()
            )));
        }

        response
            .json::<GeneratedQuestion>()
            .await
            .map_err(|e| MatchError::Generation(e.to_string()))
    }

    async fn generate_solution(&self, question: &Question) -> Result<String, MatchError> {
        let response = self
            .client
            .post(format!("{}/generate/solution", self.base_url))
            .json(&GenerateSolutionRequest {
                prompt: &question.prompt,
                starter_code: &question.starter_code,
            })
            .send()
            .await
            .map_err(|e| MatchError::Generation(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MatchError::Generation(format!(
                "generator returned {}",
                response.status()
            )));
        }

        let body = response
            .json::<GenerateSolutionResponse>()
            .await
            .map_err(|e| MatchError::Generation(e.to_string()))?;

        Ok(body.code)
    }
}

/// Generator that always fails. Used when no generation service is
/// configured; question selection then relies on the stored pool and
/// opponents are simulated.
pub struct NullGenerator;

#[async_trait]
impl QuestionGenerator for NullGenerator {
    async fn generate_question(&self, _difficulty: i32) -> Result<GeneratedQuestion, MatchError> {
        Err(MatchError::Generation("no generator configured".to_string()))
    }

    async fn generate_solution(&self, _question: &Question) -> Result<String, MatchError> {
        Err(MatchError::Generation("no generator configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generated(difficulty: i32, points: i32) -> GeneratedQuestion {
        GeneratedQuestion {
            title: "Reverse a string".to_string(),
            prompt: "Return the input reversed.".to_string(),
            starter_code: "function reverse(s) {\n}".to_string(),
            test_cases: vec![TestCase {
                input: vec![json!("ab")],
                expected: json!("ba"),
            }],
            difficulty,
            points,
        }
    }

    #[test]
    fn test_valid_payload_becomes_question() {
        let question = generated(3, 150).validate().unwrap();
        assert_eq!(question.difficulty, 3);
        assert_eq!(question.time_limit_seconds, DEFAULT_TIME_LIMIT_SECONDS);
    }

    #[test]
    fn test_blank_title_rejected() {
        let mut payload = generated(3, 150);
        payload.title = "   ".to_string();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_missing_test_cases_rejected() {
        let mut payload = generated(3, 150);
        payload.test_cases.clear();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_difficulty_out_of_range_rejected() {
        assert!(generated(0, 150).validate().is_err());
        assert!(generated(6, 150).validate().is_err());
    }

    #[test]
    fn test_non_positive_points_rejected() {
        assert!(generated(3, 0).validate().is_err());
    }

    #[tokio::test]
    async fn test_null_generator_always_fails() {
        let generator = NullGenerator;
        assert!(generator.generate_question(2).await.is_err());
    }
}
