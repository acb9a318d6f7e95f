use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::debug;

use crate::puzzle::{Puzzle, PuzzleKind};
use crate::sandbox::Executor;

use super::compare::loosely_equal;
use super::{Actual, TestResult, ValidationFailure, ValidationResult};

/// Where the player's code goes in a starter template.
static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<FILL>|//\s*(?:TODO|base case|recursive call)[^\n]*").expect("valid marker regex")
});

const ALL_PASSED: &str = "✅ All tests passed! The barrier dissolves...";
const SOME_FAILED: &str = "❌ Some tests failed. Check your logic and try again.";

/// Drops the trimmed submission into every marker of `starter`. Without a
/// template, or with one that has no marker, the submission is the program.
pub fn build_candidate(starter: Option<&str>, submission: &str) -> String {
    let submission = submission.trim();
    match starter {
        Some(template) if MARKERS.is_match(template) => {
            MARKERS.replace_all(template, NoExpand(submission)).into_owned()
        }
        _ => submission.to_string(),
    }
}

/// Runs every test in order; one failing or crashing test never stops the rest.
pub async fn validate_fill_code(puzzle: &Puzzle, code: &str, executor: &Executor) -> ValidationResult {
    let PuzzleKind::FillCode {
        starter_code,
        tests,
        ..
    } = &puzzle.kind
    else {
        return ValidationResult::invalid_type("fill_code", puzzle);
    };

    let tests = match tests {
        Some(tests) if !tests.is_empty() => tests,
        _ => return ValidationResult::failed(ValidationFailure::NoTestsDefined),
    };

    let candidate = build_candidate(starter_code.as_deref(), code);
    let mut results = Vec::with_capacity(tests.len());

    for (n, test) in tests.iter().enumerate() {
        let (passed, actual) = match executor.execute(&candidate, &test.input).await {
            Ok(execution) => (loosely_equal(&execution, &test.expected), Actual::Value(execution)),
            Err(failure) => (false, Actual::Failed(failure)),
        };
        debug!(test = n, passed, input = %test.input, "test finished");

        results.push(TestResult {
            passed,
            input: test.input.clone(),
            expected: test.expected.clone(),
            actual,
        });
    }

    let correct = results.iter().all(|r| r.passed);
    ValidationResult {
        correct,
        message: if correct { ALL_PASSED } else { SOME_FAILED }.to_string(),
        failure: None,
        test_results: Some(results),
    }
}
