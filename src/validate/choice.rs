use crate::puzzle::{Puzzle, PuzzleKind};

use super::{Answer, ValidationResult};

const CORRECT: &str = "🎉 Correct! The door creaks open...";
const WRONG: &str = "❌ Not that one. The door stays locked.";

/// Correct iff the chosen index is `correct_index`. A text answer is matched
/// against the correct option's text, ignoring case and surrounding whitespace.
pub fn validate_multiple_choice(puzzle: &Puzzle, answer: &Answer) -> ValidationResult {
    let PuzzleKind::MultipleChoice {
        options,
        correct_index,
        ..
    } = &puzzle.kind
    else {
        return ValidationResult::invalid_type("multiple_choice", puzzle);
    };

    let correct = match answer {
        Answer::Choice(index) => index == correct_index,
        Answer::Text(text) => options
            .get(*correct_index)
            .is_some_and(|option| normalize(option) == normalize(text)),
    };

    ValidationResult::verdict(correct, if correct { CORRECT } else { WRONG })
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
