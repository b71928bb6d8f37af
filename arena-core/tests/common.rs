use arena_types::{MatchMode, Participant, PlayerId, Question, TestCase};
use serde_json::json;
use uuid::Uuid;

use arena_core::MatchSession;

pub fn sum_question() -> Question {
    Question {
        id: Uuid::new_v4(),
        title: "Sum of array".to_string(),
        prompt: "Return the sum of all numbers in the array.".to_string(),
        starter_code: "function sum(values) {\n    // your code here\n}".to_string(),
        test_cases: vec![
            TestCase {
                input: vec![json!([1, 2, 3])],
                expected: json!(6),
            },
            TestCase {
                input: vec![json!([])],
                expected: json!(0),
            },
            TestCase {
                input: vec![json!([-5, 5, 10])],
                expected: json!(10),
            },
        ],
        difficulty: 2,
        points: 100,
        time_limit_seconds: 300,
    }
}

pub const CORRECT_SUM: &str = r#"
function sum(values) {
    // accumulate left to right
    let total = 0;
    for (let i = 0; i < values.length; i++) {
        total += values[i];
    }
    return total;
}
"#;

pub const WRONG_SUM: &str = r#"
function sum(values) {
    let total = 1;
    for (let i = 0; i < values.length; i++) {
        total += values[i];
    }
    return total;
}
"#;

pub fn create_pvp_session() -> (MatchSession, PlayerId, PlayerId) {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let session = MatchSession::new(
        Uuid::new_v4(),
        MatchMode::Pvp,
        sum_question(),
        vec![
            Participant::human(a, "alice".to_string()),
            Participant::human(b, "bob".to_string()),
        ],
    );
    (session, a, b)
}

pub fn create_ai_session() -> (MatchSession, PlayerId, PlayerId) {
    let human = Uuid::new_v4();
    let ai = Participant::synthetic_ai();
    let ai_id = ai.player_id;
    let session = MatchSession::new(
        Uuid::new_v4(),
        MatchMode::AiBattle,
        sum_question(),
        vec![Participant::human(human, "alice".to_string()), ai],
    );
    (session, human, ai_id)
}
