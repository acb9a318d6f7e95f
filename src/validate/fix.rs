use crate::puzzle::{Puzzle, PuzzleKind};

use super::ValidationResult;

const FIXED: &str = "✅ Bug fixed! The code behaves now.";

/// Textual check: the submission must contain the puzzle's `fix`.
///
/// Case and whitespace are ignored on both sides. The code is never run, and
/// a puzzle without a `fix` can never be solved.
pub fn validate_fix_code(puzzle: &Puzzle, code: &str) -> ValidationResult {
    let PuzzleKind::FixCode { fix, .. } = &puzzle.kind else {
        return ValidationResult::invalid_type("fix_code", puzzle);
    };

    let fixed = fix
        .as_deref()
        .map(squash)
        .is_some_and(|needle| !needle.is_empty() && squash(code).contains(&needle));

    if fixed {
        let message = puzzle.success_message.as_deref().unwrap_or(FIXED);
        return ValidationResult::verdict(true, message);
    }

    let message = match &puzzle.hint {
        Some(hint) => format!("❌ The bug is still there. Hint: {hint}"),
        None => "❌ The bug is still there. Check your fix carefully.".to_string(),
    };
    ValidationResult::verdict(false, message)
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
