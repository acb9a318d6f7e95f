use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub room: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub story: Option<String>, // Shown above the description when entering the room
    pub points: u32,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub success_message: Option<String>,
    #[serde(rename = "puzzle")]
    pub kind: PuzzleKind,
    #[serde(default)]
    pub scoring: Option<Scoring>,
}

impl Puzzle {
    /// Text the host should preload into the editor for code puzzles.
    pub fn initial_code(&self) -> &str {
        match &self.kind {
            PuzzleKind::FillCode { starter_code, .. } => starter_code.as_deref().unwrap_or(""),
            PuzzleKind::FixCode { buggy_code, .. } => buggy_code,
            PuzzleKind::MultipleChoice { .. } | PuzzleKind::Unrecognized => "",
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PuzzleKind {
    #[serde(alias = "mcq")]
    MultipleChoice {
        question: String,
        options: Vec<String>,
        correct_index: usize,
    },
    FillCode {
        #[serde(default)]
        starter_code: Option<String>,
        #[serde(default)]
        tests: Option<Vec<TestCase>>,
        #[serde(default)]
        solution: Option<String>,
    },
    FixCode {
        buggy_code: String,
        #[serde(default)]
        fix: Option<String>,
        #[serde(default)]
        bug_hint: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

impl PuzzleKind {
    pub fn name(&self) -> &'static str {
        match self {
            PuzzleKind::MultipleChoice { .. } => "multiple_choice",
            PuzzleKind::FillCode { .. } => "fill_code",
            PuzzleKind::FixCode { .. } => "fix_code",
            PuzzleKind::Unrecognized => "unrecognized",
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, PuzzleKind::FillCode { .. } | PuzzleKind::FixCode { .. })
    }
}

/// One fill-code test. `input` is a JavaScript argument list such as `"2, 3"`,
/// evaluated in the same context as the candidate code.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TestCase {
    pub input: String,
    pub expected: Value,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Scoring {
    pub par_time_seconds: Option<u32>,
    pub hint_penalty: Option<u32>,
}
