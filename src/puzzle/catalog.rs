use std::collections::HashSet;

use thiserror::Error;

use super::types::{Puzzle, PuzzleKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("puzzle id `{0}` is defined more than once")]
    DuplicateId(String),
    #[error("room {room} is claimed by both `{first}` and `{second}`")]
    DuplicateRoom {
        room: u32,
        first: String,
        second: String,
    },
    #[error("puzzle `{0}` has room 0; rooms start at 1")]
    ZeroRoom(String),
    #[error("puzzle `{id}` marks option {index} correct but only has {len} options")]
    CorrectIndexOutOfRange { id: String, index: usize, len: usize },
}

/// Read-only set of puzzles, ordered by room.
#[derive(Debug, Default)]
pub struct Catalog {
    puzzles: Vec<Puzzle>,
}

impl Catalog {
    pub fn new(mut puzzles: Vec<Puzzle>) -> Result<Self, CatalogError> {
        puzzles.sort_by_key(|p| p.room);

        let mut ids = HashSet::new();
        for (i, puzzle) in puzzles.iter().enumerate() {
            if !ids.insert(puzzle.id.as_str()) {
                return Err(CatalogError::DuplicateId(puzzle.id.clone()));
            }
            if puzzle.room == 0 {
                return Err(CatalogError::ZeroRoom(puzzle.id.clone()));
            }
            if i > 0 && puzzles[i - 1].room == puzzle.room {
                return Err(CatalogError::DuplicateRoom {
                    room: puzzle.room,
                    first: puzzles[i - 1].id.clone(),
                    second: puzzle.id.clone(),
                });
            }
            if let PuzzleKind::MultipleChoice {
                options,
                correct_index,
                ..
            } = &puzzle.kind
            {
                if *correct_index >= options.len() {
                    return Err(CatalogError::CorrectIndexOutOfRange {
                        id: puzzle.id.clone(),
                        index: *correct_index,
                        len: options.len(),
                    });
                }
            }
        }

        Ok(Catalog { puzzles })
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Puzzle> {
        self.puzzles.iter().find(|p| p.id == id)
    }

    pub fn find_by_room(&self, room: u32) -> Option<&Puzzle> {
        self.puzzles
            .binary_search_by_key(&room, |p| p.room)
            .ok()
            .map(|i| &self.puzzles[i])
    }

    /// The puzzle after `current_room`, or `None` at the end of the content.
    pub fn next(&self, current_room: u32) -> Option<&Puzzle> {
        self.find_by_room(current_room.checked_add(1)?)
    }

    pub fn first(&self) -> Option<&Puzzle> {
        self.puzzles.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Puzzle> {
        self.puzzles.iter()
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn choice_puzzle(id: &str, room: u32, correct_index: usize) -> Puzzle {
        Puzzle {
            id: id.to_string(),
            room,
            title: format!("Room {room}"),
            description: String::new(),
            story: None,
            points: 100,
            hint: None,
            success_message: None,
            kind: PuzzleKind::MultipleChoice {
                question: "Which one?".to_string(),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_index,
            },
            scoring: None,
        }
    }

    fn three_rooms() -> Catalog {
        Catalog::new(vec![
            choice_puzzle("attic", 3, 0),
            choice_puzzle("foyer", 1, 1),
            choice_puzzle("cellar", 2, 2),
        ])
        .unwrap()
    }

    #[test]
    fn orders_by_room() {
        let catalog = three_rooms();
        let ids: Vec<_> = catalog.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["foyer", "cellar", "attic"]);
        assert_eq!(catalog.first().unwrap().id, "foyer");
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn lookups_are_exact() {
        let catalog = three_rooms();
        assert_eq!(catalog.find_by_id("cellar").unwrap().room, 2);
        assert!(catalog.find_by_id("Cellar").is_none());
        assert!(catalog.find_by_id("cellar ").is_none());
        assert_eq!(catalog.find_by_room(3).unwrap().id, "attic");
        assert!(catalog.find_by_room(4).is_none());
    }

    #[test]
    fn next_walks_rooms_and_ends() {
        let catalog = three_rooms();
        assert_eq!(catalog.next(1).unwrap().id, "cellar");
        assert_eq!(catalog.next(2).unwrap().id, "attic");
        assert!(catalog.next(3).is_none());
        assert!(catalog.next(u32::MAX).is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Catalog::new(vec![choice_puzzle("foyer", 1, 0), choice_puzzle("foyer", 2, 0)])
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId("foyer".into()));
    }

    #[test]
    fn rejects_duplicate_rooms() {
        let err = Catalog::new(vec![choice_puzzle("a", 1, 0), choice_puzzle("b", 1, 0)])
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateRoom { room: 1, .. }));
    }

    #[test]
    fn rejects_room_zero() {
        let err = Catalog::new(vec![choice_puzzle("void", 0, 0)]).unwrap_err();
        assert_eq!(err, CatalogError::ZeroRoom("void".into()));
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        let err = Catalog::new(vec![choice_puzzle("foyer", 1, 3)]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::CorrectIndexOutOfRange {
                id: "foyer".into(),
                index: 3,
                len: 3
            }
        );
    }
}
