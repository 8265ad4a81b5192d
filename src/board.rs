use std::fmt;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

pub const MIN_DIMENSION: usize = 2;
pub const MAX_DIMENSION: usize = 16;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    #[error("unsupported board dimension {0}")]
    UnsupportedDimension(usize),
    #[error("board has {found} cells but dimension {dim} requires {expected}")]
    WrongLength {
        dim: usize,
        expected: usize,
        found: usize,
    },
    #[error("tile value {0} is out of range for this board")]
    ValueOutOfRange(u8),
    #[error("tile value {0} appears more than once")]
    DuplicateValue(u8),
    #[error("board has no blank cell")]
    MissingBlank,
    #[error("board has more than one blank cell")]
    MultipleBlanks,
    #[error("board dimension {found} does not match engine dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// N×N sliding-tile board. Cell values are 1..N*N-1 with 0 as the blank;
/// the goal places value v at index v-1 and the blank last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    dim: usize,
    tiles: Vec<u8>,
    blank: usize,
}

impl Board {
    pub fn solved(dim: usize) -> Self {
        assert!(
            (MIN_DIMENSION..=MAX_DIMENSION).contains(&dim),
            "board dimension out of range"
        );
        let cells = dim * dim;
        let mut tiles: Vec<u8> = (1..cells as u8).collect();
        tiles.push(0);
        Self {
            dim,
            tiles,
            blank: cells - 1,
        }
    }

    pub fn from_tiles(dim: usize, tiles: Vec<u8>) -> Result<Self, BoardError> {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dim) {
            return Err(BoardError::UnsupportedDimension(dim));
        }
        let cells = dim * dim;
        if tiles.len() != cells {
            return Err(BoardError::WrongLength {
                dim,
                expected: cells,
                found: tiles.len(),
            });
        }
        let mut seen = vec![false; cells];
        let mut blank = None;
        for (index, &value) in tiles.iter().enumerate() {
            if value as usize >= cells {
                return Err(BoardError::ValueOutOfRange(value));
            }
            if seen[value as usize] {
                if value == 0 {
                    return Err(BoardError::MultipleBlanks);
                }
                return Err(BoardError::DuplicateValue(value));
            }
            seen[value as usize] = true;
            if value == 0 {
                blank = Some(index);
            }
        }
        let blank = blank.ok_or(BoardError::MissingBlank)?;
        Ok(Self { dim, tiles, blank })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn tiles(&self) -> &[u8] {
        &self.tiles
    }

    pub fn blank_index(&self) -> usize {
        self.blank
    }

    pub fn value_at(&self, index: usize) -> u8 {
        self.tiles[index]
    }

    pub fn index_of_value(&self, value: u8) -> Option<usize> {
        self.tiles.iter().position(|&v| v == value)
    }

    pub fn goal_index(&self, value: u8) -> usize {
        debug_assert!(value != 0);
        value as usize - 1
    }

    pub fn row_of(&self, index: usize) -> usize {
        index / self.dim
    }

    pub fn col_of(&self, index: usize) -> usize {
        index % self.dim
    }

    pub fn is_goal(&self) -> bool {
        let cells = self.dim * self.dim;
        if self.blank != cells - 1 {
            return false;
        }
        self.tiles[..cells - 1]
            .iter()
            .enumerate()
            .all(|(index, &value)| value as usize == index + 1)
    }

    /// Every index that shares the blank's row or column, i.e. every legal
    /// move source. The blank itself is never included.
    pub fn neighbor_indices(&self) -> Vec<usize> {
        let dim = self.dim;
        let row = self.blank / dim;
        let col = self.blank % dim;
        let mut indices = Vec::with_capacity(2 * (dim - 1));
        for c in 0..dim {
            let index = row * dim + c;
            if index != self.blank {
                indices.push(index);
            }
        }
        for r in 0..dim {
            let index = r * dim + col;
            if index != self.blank {
                indices.push(index);
            }
        }
        indices
    }

    /// Simulates choosing the tile at `chosen`. Every cell between the chosen
    /// tile and the blank shifts one step toward the blank and the chosen cell
    /// becomes the new blank. Returns false if the move is illegal.
    pub fn apply_index(&mut self, chosen: usize) -> bool {
        let dim = self.dim;
        if chosen >= dim * dim || chosen == self.blank {
            return false;
        }
        let blank = self.blank;
        if chosen / dim == blank / dim {
            if chosen < blank {
                for index in ((chosen + 1)..=blank).rev() {
                    self.tiles[index] = self.tiles[index - 1];
                }
            } else {
                for index in blank..chosen {
                    self.tiles[index] = self.tiles[index + 1];
                }
            }
        } else if chosen % dim == blank % dim {
            if chosen < blank {
                let mut index = blank;
                while index > chosen {
                    self.tiles[index] = self.tiles[index - dim];
                    index -= dim;
                }
            } else {
                let mut index = blank;
                while index < chosen {
                    self.tiles[index] = self.tiles[index + dim];
                    index += dim;
                }
            }
        } else {
            return false;
        }
        self.tiles[chosen] = 0;
        self.blank = chosen;
        true
    }

    /// Moves are identified by tile value at the engine boundary, since the
    /// tile's index changes after each move.
    pub fn apply_value(&mut self, value: u8) -> bool {
        if value == 0 {
            return false;
        }
        match self.index_of_value(value) {
            Some(index) => self.apply_index(index),
            None => false,
        }
    }

    pub fn is_solvable(&self) -> bool {
        let mut inversions = 0usize;
        let flat: Vec<u8> = self.tiles.iter().copied().filter(|&v| v != 0).collect();
        for i in 0..flat.len() {
            for j in (i + 1)..flat.len() {
                if flat[i] > flat[j] {
                    inversions += 1;
                }
            }
        }
        if self.dim % 2 == 1 {
            inversions % 2 == 0
        } else {
            (inversions + self.blank / self.dim) % 2 == 1
        }
    }

    /// Shuffles until the inversion-parity test admits the arrangement.
    pub fn scrambled(dim: usize, seed: u64) -> Self {
        let mut board = Self::solved(dim);
        let mut rng = SmallRng::seed_from_u64(seed);
        loop {
            board.tiles.shuffle(&mut rng);
            board.blank = board
                .tiles
                .iter()
                .position(|&v| v == 0)
                .unwrap_or(dim * dim - 1);
            if board.is_solvable() && !board.is_goal() {
                return board;
            }
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = if self.dim * self.dim > 10 { 2 } else { 1 };
        for row in 0..self.dim {
            for col in 0..self.dim {
                let value = self.tiles[row * self.dim + col];
                if col > 0 {
                    write!(f, " ")?;
                }
                if value == 0 {
                    write!(f, "{:>width$}", ".", width = width)?;
                } else {
                    write!(f, "{:>width$}", value, width = width)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
