//! Puzzle validation core for the haunted-house escape room.
//!
//! Hosts load a [`Catalog`], build a [`Validator`] and call
//! [`Validator::validate`] for every submission; once a verdict is correct
//! they price it with [`score`].

pub mod config;
pub mod logging;
pub mod puzzle;
pub mod sandbox;
pub mod scoring;
pub mod validate;

pub use config::Config;
pub use puzzle::{load_catalog, Catalog, Puzzle, PuzzleKind};
pub use sandbox::{Execution, ExecutionFailure, Executor, IsolationBackend};
pub use scoring::score;
pub use validate::{Answer, Submission, TestResult, ValidationResult, Validator};
