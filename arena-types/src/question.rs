use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub type QuestionId = Uuid;

/// Default time limit for answering a question, in seconds.
pub const DEFAULT_TIME_LIMIT_SECONDS: u32 = 300;

/// A single test case: input arguments and the expected return value.
/// Equality against the actual result is structural (deep JSON equality),
/// never reference-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TestCase {
    #[ts(type = "unknown[]")]
    pub input: Vec<serde_json::Value>,
    #[ts(type = "unknown")]
    pub expected: serde_json::Value,
}

/// A coding question. Immutable once assigned to a session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub prompt: String,
    pub starter_code: String,
    pub test_cases: Vec<TestCase>,
    pub difficulty: i32, // 1-5
    pub points: i32,
    pub time_limit_seconds: u32,
}
