use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Why an evaluation produced no usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum EvalErrorKind {
    /// No extractable top-level function in the submitted source.
    MissingFunction,
    /// The source failed to parse or execution setup failed.
    SyntaxOrRuntime,
}

/// Outcome of running one test case.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CaseResult {
    #[ts(type = "unknown[]")]
    pub input: Vec<serde_json::Value>,
    #[ts(type = "unknown")]
    pub expected: serde_json::Value,
    /// None when the call threw instead of returning.
    #[ts(type = "unknown")]
    pub actual: Option<serde_json::Value>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TestSummary {
    pub passed: u32,
    pub total: u32,
    pub details: Vec<CaseResult>,
}

/// Result of evaluating one submission. Produced fresh per submission and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EvaluationResult {
    pub correct: bool,
    pub runtime_ms: u64,
    pub style_score: i32, // 0-100
    pub summary: Option<TestSummary>,
    pub error: Option<EvalErrorKind>,
}
