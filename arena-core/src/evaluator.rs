//! Submission evaluation: extract the declared function, run every test
//! case inside the restricted interpreter, and grade code style.

use std::sync::LazyLock;
use std::time::Instant;

use rand::Rng;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use arena_types::{CaseResult, EvalErrorKind, EvaluationResult, TestCase, TestSummary};

use crate::interpreter::{canon, parse_function, Interp};

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+(\w+)").expect("valid regex"));

static SHORT_VAR_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:let|const|var)\s+([A-Za-z_$])\b").expect("valid regex"));

/// Returns the name of the first declared function, if any.
pub fn extract_function_name(code: &str) -> Option<&str> {
    FUNCTION_NAME
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Run `code` against every test case of a question. All cases always run;
/// a case that throws is recorded as failed with no actual value rather
/// than aborting the batch.
pub fn evaluate_submission(code: &str, test_cases: &[TestCase]) -> EvaluationResult {
    let style_score = style_score(code);

    if extract_function_name(code).is_none() {
        return EvaluationResult {
            correct: false,
            runtime_ms: 0,
            style_score,
            summary: None,
            error: Some(EvalErrorKind::MissingFunction),
        };
    }

    let func = match parse_function(code) {
        Ok(func) => func,
        Err(e) => {
            debug!("submission failed to parse: {}", e);
            return EvaluationResult {
                correct: false,
                runtime_ms: 0,
                style_score,
                summary: None,
                error: Some(EvalErrorKind::SyntaxOrRuntime),
            };
        }
    };

    let started = Instant::now();
    let mut details = Vec::with_capacity(test_cases.len());
    let mut passed = 0u32;

    for case in test_cases {
        let actual = Interp::new(&func).call(&case.input).ok();
        let case_passed = actual
            .as_ref()
            .map(|v| canon(v) == canon(&case.expected))
            .unwrap_or(false);
        if case_passed {
            passed += 1;
        }
        details.push(CaseResult {
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual,
            passed: case_passed,
        });
    }

    let runtime_ms = started.elapsed().as_millis() as u64;
    let total = test_cases.len() as u32;

    EvaluationResult {
        correct: total > 0 && passed == total,
        runtime_ms,
        style_score,
        summary: Some(TestSummary {
            passed,
            total,
            details,
        }),
        error: None,
    }
}

/// Heuristic style grade in [0, 100].
///
/// Starts from 100: indentation somewhere earns keeping the base, comments
/// add a small bonus, while overlong lines, cryptic one-letter variable
/// names, and deeply braced code each cost points.
pub fn style_score(code: &str) -> i32 {
    let mut score: i32 = 100;

    // A single leading space does not count as indentation
    let has_indentation = code
        .lines()
        .any(|line| line.starts_with("  ") || line.starts_with('\t'));
    if !has_indentation {
        score -= 10;
    }

    if code.contains("//") || code.contains("/*") {
        score = (score + 5).min(100);
    }

    if code.lines().any(|line| line.chars().count() > 120) {
        score -= 5;
    }

    let short_vars = SHORT_VAR_DECL.find_iter(code).count();
    if short_vars > 2 {
        score -= 10;
    }

    let braces = code.matches('{').count();
    if braces > 5 {
        score -= 10;
    }

    score.clamp(0, 100)
}

/// Produce a plausible evaluation for the synthetic opponent without running
/// any code. Higher difficulty means a lower chance of a correct solution
/// and a slower simulated runtime.
pub fn simulate_opponent(difficulty: i32) -> EvaluationResult {
    let difficulty = difficulty.max(1) as f64;
    let mut rng = rand::thread_rng();

    let correct = rng.gen_bool((1.0 - 0.3 / difficulty).clamp(0.0, 1.0));
    let runtime_ms = (100.0 + rng.gen_range(0.0..1.0) * 50.0 * difficulty) as u64;
    let style_score = (60.0 + rng.gen_range(0.0..1.0) * 30.0) as i32;

    EvaluationResult {
        correct,
        runtime_ms,
        style_score,
        summary: None,
        error: None,
    }
}

/// Checks whether opponent code (generated or submitted) passes at least
/// one test case. Used to sanity-check generated solutions before playing
/// them against a human.
pub fn passes_any_case(code: &str, test_cases: &[TestCase]) -> bool {
    evaluate_submission(code, test_cases)
        .summary
        .map(|s| s.passed > 0)
        .unwrap_or(false)
}
