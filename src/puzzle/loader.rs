use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::catalog::{Catalog, CatalogError};
use super::types::Puzzle;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("bad room file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("failed to list room files: {0}")]
    Glob(#[from] glob::GlobError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub fn load_puzzle(path: &Path) -> Result<Puzzle, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let puzzle: Puzzle = toml::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), id = %puzzle.id, room = puzzle.room, "loaded puzzle");
    Ok(puzzle)
}

/// Load every `room_*.toml` in `dir` into a checked catalog.
pub fn load_catalog(dir: &Path) -> Result<Catalog, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let pattern = dir.join("room_*.toml");
    let mut paths = glob::glob(&pattern.to_string_lossy())?.collect::<Result<Vec<_>, _>>()?;

    // Sort by filename so room_01, room_02, room_03 are in order
    paths.sort();

    let mut puzzles = Vec::with_capacity(paths.len());
    for path in &paths {
        puzzles.push(load_puzzle(path)?);
    }

    let catalog = Catalog::new(puzzles)?;
    info!(dir = %dir.display(), rooms = catalog.len(), "catalog loaded");
    Ok(catalog)
}
