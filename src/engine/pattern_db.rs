use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::Board;
use crate::engine::api::{CancelToken, TaskStatus};

/// Pattern databases are precomputed for 4×4 boards only; other dimensions
/// fall back to the remaining heuristic branches.
pub const PATTERN_DIMENSION: usize = 4;
pub const PATTERN_TRIPLES: [[u8; 3]; 3] = [[1, 2, 3], [4, 5, 6], [7, 8, 9]];

const BUILD_SLICE_EXPANSIONS: usize = 4_000;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("artifact dimension {found} does not match expected dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("artifact contains an empty distance table")]
    EmptyTable,
}

/// Exact minimal move counts for one disjoint tile triple, keyed by the
/// encoded positions of the triple and the blank.
#[derive(Debug, Clone)]
pub struct PatternDb {
    tiles: [u8; 3],
    distances: HashMap<u32, u8>,
}

impl PatternDb {
    pub fn tiles(&self) -> [u8; 3] {
        self.tiles
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn distance(&self, key: u32) -> Option<u8> {
        self.distances.get(&key).copied()
    }
}

pub fn encode_key(positions: [u8; 3], blank: u8, dim: usize) -> u32 {
    let base = (dim * dim) as u32;
    let mut key = 0u32;
    for position in positions {
        key = key * base + position as u32;
    }
    key * base + blank as u32
}

/// Encodes the current positions of a triple's tiles plus the blank, or
/// `None` when the board does not match the database's dimension.
pub fn board_key(board: &Board, tiles: [u8; 3]) -> Option<u32> {
    if board.dim() != PATTERN_DIMENSION {
        return None;
    }
    let mut positions = [0u8; 3];
    for (slot, tile) in tiles.into_iter().enumerate() {
        positions[slot] = board.index_of_value(tile)? as u8;
    }
    Some(encode_key(
        positions,
        board.blank_index() as u8,
        board.dim(),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReducedState {
    positions: [u8; 3],
    blank: u8,
}

#[derive(Debug)]
pub enum BuildOutcome {
    Built(PatternDb),
    Canceled,
}

/// Breadth-first sweep of the reduced state space (triple positions plus
/// blank), seeded from every configuration with the triple already at its
/// goal cells. Yields back to the host every few thousand expansions.
pub struct PatternDbBuild {
    dim: usize,
    tiles: [u8; 3],
    queue: VecDeque<(ReducedState, u8)>,
    distances: HashMap<u32, u8>,
    cancel: CancelToken,
}

impl PatternDbBuild {
    pub fn new(dim: usize, tiles: [u8; 3], cancel: CancelToken) -> Self {
        let cells = (dim * dim) as u8;
        let goal_positions = [tiles[0] - 1, tiles[1] - 1, tiles[2] - 1];
        let mut queue = VecDeque::new();
        let mut distances = HashMap::new();
        for blank in 0..cells {
            if goal_positions.contains(&blank) {
                continue;
            }
            let state = ReducedState {
                positions: goal_positions,
                blank,
            };
            distances.insert(encode_key(state.positions, state.blank, dim), 0);
            queue.push_back((state, 0));
        }
        Self {
            dim,
            tiles,
            queue,
            distances,
            cancel,
        }
    }

    pub fn step(&mut self) -> TaskStatus<BuildOutcome> {
        let mut expanded = 0usize;
        while expanded < BUILD_SLICE_EXPANSIONS {
            if self.cancel.is_canceled() {
                return TaskStatus::Finished(BuildOutcome::Canceled);
            }
            let Some((state, distance)) = self.queue.pop_front() else {
                let db = PatternDb {
                    tiles: self.tiles,
                    distances: std::mem::take(&mut self.distances),
                };
                return TaskStatus::Finished(BuildOutcome::Built(db));
            };
            expanded += 1;
            for next in reduced_moves(state, self.dim) {
                let key = encode_key(next.positions, next.blank, self.dim);
                if !self.distances.contains_key(&key) {
                    self.distances.insert(key, distance + 1);
                    self.queue.push_back((next, distance + 1));
                }
            }
        }
        TaskStatus::Pending
    }

    pub fn run(mut self) -> BuildOutcome {
        loop {
            if let TaskStatus::Finished(outcome) = self.step() {
                return outcome;
            }
        }
    }
}

/// Same row/column move rule as the full board, projected onto the tracked
/// positions: every tracked tile on the segment from the chosen cell to the
/// blank shifts one step toward the blank.
fn reduced_moves(state: ReducedState, dim: usize) -> Vec<ReducedState> {
    let blank = state.blank as usize;
    let (row, col) = (blank / dim, blank % dim);
    let mut moves = Vec::with_capacity(2 * (dim - 1));
    for c in 0..dim {
        let chosen = row * dim + c;
        if chosen != blank {
            moves.push(shift_segment(state, chosen, blank, 1));
        }
    }
    for r in 0..dim {
        let chosen = r * dim + col;
        if chosen != blank {
            moves.push(shift_segment(state, chosen, blank, dim));
        }
    }
    moves
}

fn shift_segment(state: ReducedState, chosen: usize, blank: usize, stride: usize) -> ReducedState {
    let (from, to, delta) = if chosen < blank {
        (chosen, blank, stride as isize)
    } else {
        (blank, chosen, -(stride as isize))
    };
    let mut positions = state.positions;
    for position in positions.iter_mut() {
        let p = *position as usize;
        if p != blank && p >= from && p <= to && (p - from) % stride == 0 {
            *position = (p as isize + delta) as u8;
        }
    }
    ReducedState {
        positions,
        blank: chosen as u8,
    }
}

/// One database per disjoint triple for a board dimension.
#[derive(Debug, Clone)]
pub struct PatternDbSet {
    dim: usize,
    tables: Vec<PatternDb>,
}

#[derive(Debug)]
pub enum SetBuildOutcome {
    Built(PatternDbSet),
    Unsupported,
    Canceled,
}

impl PatternDbSet {
    pub fn supports(dim: usize) -> bool {
        dim == PATTERN_DIMENSION
    }

    pub fn build(dim: usize, cancel: &CancelToken) -> SetBuildOutcome {
        if !Self::supports(dim) {
            return SetBuildOutcome::Unsupported;
        }
        let mut tables = Vec::with_capacity(PATTERN_TRIPLES.len());
        for tiles in PATTERN_TRIPLES {
            match PatternDbBuild::new(dim, tiles, cancel.clone()).run() {
                BuildOutcome::Built(db) => tables.push(db),
                BuildOutcome::Canceled => return SetBuildOutcome::Canceled,
            }
        }
        SetBuildOutcome::Built(PatternDbSet { dim, tables })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn tables(&self) -> &[PatternDb] {
        &self.tables
    }

    /// Sum of the triples' exact distances, or `None` when the board does not
    /// match this set's dimension.
    pub fn lookup_sum(&self, board: &Board) -> Option<u32> {
        if board.dim() != self.dim {
            return None;
        }
        let mut total = 0u32;
        for table in &self.tables {
            let key = board_key(board, table.tiles)?;
            total += u32::from(table.distance(key).unwrap_or(0));
        }
        Some(total)
    }

    pub fn to_artifact(&self) -> PatternDbArtifact {
        PatternDbArtifact {
            dim: self.dim,
            tables: self
                .tables
                .iter()
                .map(|table| PatternDbTableArtifact {
                    tiles: table.tiles,
                    entries: {
                        let mut entries: Vec<(u32, u8)> =
                            table.distances.iter().map(|(&k, &d)| (k, d)).collect();
                        entries.sort_unstable();
                        entries
                    },
                })
                .collect(),
        }
    }

    pub fn from_artifact(artifact: PatternDbArtifact) -> Result<Self, ArtifactError> {
        if !Self::supports(artifact.dim) {
            return Err(ArtifactError::DimensionMismatch {
                expected: PATTERN_DIMENSION,
                found: artifact.dim,
            });
        }
        let mut tables = Vec::with_capacity(artifact.tables.len());
        for table in artifact.tables {
            if table.entries.is_empty() {
                return Err(ArtifactError::EmptyTable);
            }
            tables.push(PatternDb {
                tiles: table.tiles,
                distances: table.entries.into_iter().collect(),
            });
        }
        Ok(Self {
            dim: artifact.dim,
            tables,
        })
    }
}

/// Persisted form: a list of (encoded key, distance) pairs per triple,
/// reloadable without rebuilding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDbArtifact {
    pub dim: usize,
    pub tables: Vec<PatternDbTableArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDbTableArtifact {
    pub tiles: [u8; 3],
    pub entries: Vec<(u32, u8)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_is_positional() {
        assert_eq!(encode_key([0, 1, 2], 15, 4), ((0 * 16 + 1) * 16 + 2) * 16 + 15);
        assert_ne!(encode_key([0, 1, 2], 3, 4), encode_key([0, 1, 3], 2, 4));
    }

    #[test]
    fn build_assigns_zero_to_goal_configurations() {
        let cancel = CancelToken::new();
        let BuildOutcome::Built(db) = PatternDbBuild::new(4, [1, 2, 3], cancel).run() else {
            panic!("build was canceled");
        };
        assert!(db.len() > 1000);
        for blank in 3..16 {
            assert_eq!(db.distance(encode_key([0, 1, 2], blank, 4)), Some(0));
        }
    }

    #[test]
    fn displaced_triple_is_one_move_from_a_goal_configuration() {
        let cancel = CancelToken::new();
        let BuildOutcome::Built(db) = PatternDbBuild::new(4, [1, 2, 3], cancel).run() else {
            panic!("build was canceled");
        };
        // Tiles 2 and 3 shifted right out of row 0 with the blank at index 1:
        // one move (choose the tile at index 3) restores a goal configuration.
        assert_eq!(db.distance(encode_key([0, 2, 3], 1, 4)), Some(1));
    }

    #[test]
    fn lookup_sum_is_zero_on_goal() {
        let cancel = CancelToken::new();
        let SetBuildOutcome::Built(set) = PatternDbSet::build(4, &cancel) else {
            panic!("expected a built set");
        };
        assert_eq!(set.lookup_sum(&Board::solved(4)), Some(0));
        assert_eq!(set.lookup_sum(&Board::solved(3)), None);
    }

    #[test]
    fn unsupported_dimension_is_reported() {
        let cancel = CancelToken::new();
        assert!(matches!(
            PatternDbSet::build(3, &cancel),
            SetBuildOutcome::Unsupported
        ));
    }

    #[test]
    fn cancellation_stops_the_build_within_one_slice() {
        let cancel = CancelToken::new();
        let mut build = PatternDbBuild::new(4, [1, 2, 3], cancel.clone());
        assert!(matches!(build.step(), TaskStatus::Pending));
        cancel.cancel();
        assert!(matches!(
            build.step(),
            TaskStatus::Finished(BuildOutcome::Canceled)
        ));
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let cancel = CancelToken::new();
        let SetBuildOutcome::Built(set) = PatternDbSet::build(4, &cancel) else {
            panic!("expected a built set");
        };
        let json = serde_json::to_string(&set.to_artifact()).expect("serialize");
        let artifact: PatternDbArtifact = serde_json::from_str(&json).expect("deserialize");
        let restored = PatternDbSet::from_artifact(artifact).expect("valid artifact");
        let board = Board::scrambled(4, 21);
        assert_eq!(set.lookup_sum(&board), restored.lookup_sum(&board));
    }

    #[test]
    fn mismatched_artifact_is_rejected() {
        let artifact = PatternDbArtifact {
            dim: 3,
            tables: Vec::new(),
        };
        let err = PatternDbSet::from_artifact(artifact).map(|_| ()).unwrap_err();
        assert_eq!(
            err,
            ArtifactError::DimensionMismatch {
                expected: 4,
                found: 3
            }
        );
    }
}
