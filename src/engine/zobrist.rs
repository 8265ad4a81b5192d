use crate::board::Board;

/// Xorshift32 generator for the table values. Seeded from the board
/// dimension so the same dimension always yields the same table, which keeps
/// hint tabu lists and transposition keys stable across sessions.
struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    fn next(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }
}

/// One pseudo-random u32 per (cell index, cell value) pair for a fixed board
/// dimension. The state hash is the XOR over all cells, blank included.
#[derive(Debug, Clone)]
pub struct ZobristTable {
    dim: usize,
    values_per_cell: usize,
    table: Vec<u32>,
}

impl ZobristTable {
    pub fn new(dim: usize) -> Self {
        let cells = dim * dim;
        let mut rng = Xorshift32::new(0x51DE_77A1 ^ (dim as u32).wrapping_mul(0x9E37_79B9));
        let table = (0..cells * cells).map(|_| rng.next()).collect();
        Self {
            dim,
            values_per_cell: cells,
            table,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns `None` when the board does not match the table's dimension;
    /// the owner is expected to rebuild the table rather than hash wrongly.
    pub fn hash(&self, board: &Board) -> Option<u32> {
        if board.dim() != self.dim {
            return None;
        }
        let mut hash = 0u32;
        for (index, &value) in board.tiles().iter().enumerate() {
            let slot = index * self.values_per_cell + value as usize;
            hash ^= *self.table.get(slot)?;
        }
        Some(hash)
    }
}
