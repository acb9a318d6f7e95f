//! Answer validators and the orchestrator that dispatches to them.
//!
//! Every path returns a [`ValidationResult`]; nothing here returns `Err` or
//! panics on bad puzzles or bad answers.

mod choice;
mod compare;
mod fill;
mod fix;

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::puzzle::{Puzzle, PuzzleKind};
use crate::sandbox::{Execution, ExecutionFailure, Executor};

pub use choice::validate_multiple_choice;
pub use compare::{js_string, loosely_equal};
pub use fill::{build_candidate, validate_fill_code};
pub use fix::validate_fix_code;

/// What the player submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Index of the chosen option.
    Choice(usize),
    /// Code for code puzzles, or an option's text for multiple choice.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub puzzle_id: String,
    pub answer: Answer,
    pub elapsed: Duration,
}

impl Submission {
    pub fn new(puzzle_id: impl Into<String>, answer: Answer, elapsed: Duration) -> Self {
        Submission {
            puzzle_id: puzzle_id.into(),
            answer,
            elapsed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    InvalidPuzzleType { expected: String, found: String },
    NoTestsDefined,
    AnswerMismatch,
    PuzzleMismatch { expected: String, submitted: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Actual {
    Value(Execution),
    Failed(ExecutionFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub passed: bool,
    pub input: String,
    pub expected: Value,
    pub actual: Actual,
}

impl TestResult {
    /// Text to show in the "Got" column.
    pub fn actual_display(&self) -> String {
        match &self.actual {
            Actual::Value(execution) => execution.display.clone(),
            Actual::Failed(failure) => failure.to_string(),
        }
    }

    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match &self.actual {
            Actual::Value(_) => None,
            Actual::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub correct: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ValidationFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<Vec<TestResult>>,
}

impl ValidationResult {
    pub(crate) fn verdict(correct: bool, message: impl Into<String>) -> Self {
        ValidationResult {
            correct,
            message: message.into(),
            failure: None,
            test_results: None,
        }
    }

    pub(crate) fn failed(failure: ValidationFailure) -> Self {
        let message = match &failure {
            ValidationFailure::InvalidPuzzleType { expected, found } => {
                format!("Invalid puzzle type: expected {expected}, found {found}")
            }
            ValidationFailure::NoTestsDefined => "No tests defined for this puzzle".to_string(),
            ValidationFailure::AnswerMismatch => {
                "That kind of answer does not fit this puzzle".to_string()
            }
            ValidationFailure::PuzzleMismatch { expected, submitted } => {
                format!("Submission for `{submitted}` sent to puzzle `{expected}`")
            }
        };
        ValidationResult {
            correct: false,
            message,
            failure: Some(failure),
            test_results: None,
        }
    }

    pub(crate) fn invalid_type(expected: &str, puzzle: &Puzzle) -> Self {
        ValidationResult::failed(ValidationFailure::InvalidPuzzleType {
            expected: expected.to_string(),
            found: puzzle.type_name().to_string(),
        })
    }
}

/// Entry point for hosts: routes a submission to the validator for its puzzle.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    executor: Executor,
}

impl Validator {
    pub fn new(executor: Executor) -> Self {
        Validator { executor }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    #[instrument(skip_all, fields(puzzle = %puzzle.id, kind = puzzle.type_name()))]
    pub async fn validate(&self, puzzle: &Puzzle, submission: &Submission) -> ValidationResult {
        if submission.puzzle_id != puzzle.id {
            warn!(submitted = %submission.puzzle_id, "submission targets another puzzle");
            return ValidationResult::failed(ValidationFailure::PuzzleMismatch {
                expected: puzzle.id.clone(),
                submitted: submission.puzzle_id.clone(),
            });
        }

        let result = match (&puzzle.kind, &submission.answer) {
            (PuzzleKind::MultipleChoice { .. }, answer) => validate_multiple_choice(puzzle, answer),
            (PuzzleKind::FillCode { .. }, Answer::Text(code)) => {
                validate_fill_code(puzzle, code, &self.executor).await
            }
            (PuzzleKind::FixCode { .. }, Answer::Text(code)) => validate_fix_code(puzzle, code),
            (PuzzleKind::FillCode { .. } | PuzzleKind::FixCode { .. }, Answer::Choice(_)) => {
                ValidationResult::failed(ValidationFailure::AnswerMismatch)
            }
            (PuzzleKind::Unrecognized, _) => {
                warn!("puzzle has an unrecognized type");
                ValidationResult::invalid_type("multiple_choice, fill_code or fix_code", puzzle)
            }
        };

        info!(correct = result.correct, "validated submission");
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::puzzle::catalog::tests::choice_puzzle;
    use crate::puzzle::TestCase;
    use crate::sandbox::testing::ScriptedBackend;

    fn validator() -> (Validator, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::arithmetic());
        (Validator::new(Executor::new(backend.clone())), backend)
    }

    fn adder() -> Puzzle {
        Puzzle {
            id: "adder".into(),
            room: 2,
            title: "Adder".into(),
            description: String::new(),
            story: None,
            points: 100,
            hint: None,
            success_message: None,
            kind: PuzzleKind::FillCode {
                starter_code: Some("function add(a,b){ return <FILL>; }".into()),
                tests: Some(vec![TestCase {
                    input: "2,3".into(),
                    expected: Value::from(5),
                }]),
                solution: None,
            },
            scoring: None,
        }
    }

    fn fixer() -> Puzzle {
        Puzzle {
            kind: PuzzleKind::FixCode {
                buggy_code: "if (x = 1) {}".into(),
                fix: Some("x === 1".into()),
                bug_hint: None,
            },
            id: "fixer".into(),
            ..adder()
        }
    }

    fn submit(puzzle: &Puzzle, answer: Answer) -> Submission {
        Submission::new(puzzle.id.clone(), answer, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn routes_each_kind() {
        let (validator, backend) = validator();

        let mcq = choice_puzzle("gate", 1, 2);
        assert!(validator.validate(&mcq, &submit(&mcq, Answer::Choice(2))).await.correct);

        let fill = adder();
        let result = validator
            .validate(&fill, &submit(&fill, Answer::Text("a+b".into())))
            .await;
        assert!(result.correct);
        assert_eq!(result.test_results.unwrap().len(), 1);

        let fix = fixer();
        assert!(
            validator
                .validate(&fix, &submit(&fix, Answer::Text("if (x === 1) {}".into())))
                .await
                .correct
        );

        // Only the fill-code puzzle reached the backend.
        assert_eq!(backend.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unrecognized_type_is_reported_not_raised() {
        let (validator, _) = validator();
        let odd = Puzzle {
            kind: PuzzleKind::Unrecognized,
            ..adder()
        };
        let result = validator
            .validate(&odd, &submit(&odd, Answer::Text("a+b".into())))
            .await;
        assert!(!result.correct);
        assert!(matches!(
            result.failure,
            Some(ValidationFailure::InvalidPuzzleType { ref found, .. }) if found == "unrecognized"
        ));
    }

    #[tokio::test]
    async fn option_index_for_code_puzzle_is_a_mismatch() {
        let (validator, backend) = validator();
        let fill = adder();
        let result = validator.validate(&fill, &submit(&fill, Answer::Choice(0))).await;
        assert_eq!(result.failure, Some(ValidationFailure::AnswerMismatch));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_for_another_puzzle_is_rejected() {
        let (validator, _) = validator();
        let fill = adder();
        let submission = Submission::new("someone-else", Answer::Text("a+b".into()), Duration::ZERO);
        let result = validator.validate(&fill, &submission).await;
        assert!(!result.correct);
        assert!(matches!(
            result.failure,
            Some(ValidationFailure::PuzzleMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn same_submission_gives_same_verdict() {
        let (validator, _) = validator();
        let fill = adder();
        let submission = submit(&fill, Answer::Text("a-b".into()));
        let first = validator.validate(&fill, &submission).await;
        let second = validator.validate(&fill, &submission).await;
        assert_eq!(first, second);
        assert!(!first.correct);
    }

    #[test]
    fn results_serialize_for_hosts() {
        let result = ValidationResult {
            correct: false,
            message: "nope".into(),
            failure: None,
            test_results: Some(vec![TestResult {
                passed: false,
                input: "2,3".into(),
                expected: Value::from(5),
                actual: Actual::Failed(ExecutionFailure::Timeout(Duration::from_millis(1000))),
            }]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["test_results"][0]["actual"]["outcome"], "failed");
        assert_eq!(json["test_results"][0]["actual"]["kind"], "timeout");
        assert_eq!(json["test_results"][0]["actual"]["detail"], 1000);
        assert!(json.get("failure").is_none());
    }
}
