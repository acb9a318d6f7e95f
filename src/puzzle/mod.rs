pub mod catalog;
pub mod loader;
pub mod types;

pub use catalog::{Catalog, CatalogError};
pub use loader::{load_catalog, load_puzzle, LoadError};
pub use types::{Puzzle, PuzzleKind, Scoring, TestCase};
