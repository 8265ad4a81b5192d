use std::collections::HashMap;

use crate::board::Board;
use crate::engine::api::{CancelToken, TaskStatus};

const LAYER_SLICE: usize = 80;

/// The unlocked remainder of a board whose leading rows and columns are
/// already solved. Only 2×3 and 3×2 remainders are supported; they are small
/// enough for an exact bidirectional sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndgameRegion {
    pub top_rows: usize,
    pub left_cols: usize,
    pub height: usize,
    pub width: usize,
}

pub fn locked_row_count(board: &Board) -> usize {
    let dim = board.dim();
    for row in 0..dim {
        for col in 0..dim {
            let index = row * dim + col;
            if board.value_at(index) as usize != index + 1 {
                return row;
            }
        }
    }
    dim
}

pub fn locked_col_count(board: &Board) -> usize {
    let dim = board.dim();
    for col in 0..dim {
        for row in 0..dim {
            let index = row * dim + col;
            if board.value_at(index) as usize != index + 1 {
                return col;
            }
        }
    }
    dim
}

/// Picks a supported remainder rectangle if the locked prefix admits one.
/// An over-locked board (say a 3×3 with both the top row and left column
/// done) still collapses by releasing locked lines back into the region.
pub fn endgame_region(board: &Board) -> Option<EndgameRegion> {
    let dim = board.dim();
    let locked_rows = locked_row_count(board);
    let locked_cols = locked_col_count(board);
    for (height, width) in [(2usize, 3usize), (3, 2)] {
        if dim < height || dim < width {
            continue;
        }
        let top_rows = dim - height;
        let left_cols = dim - width;
        if top_rows <= locked_rows && left_cols <= locked_cols {
            return Some(EndgameRegion {
                top_rows,
                left_cols,
                height,
                width,
            });
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndgameOutcome {
    /// Exact optimal move-value sequence for the remainder; empty when the
    /// remainder is already solved.
    Solved(Vec<u8>),
    Unreachable,
    Canceled,
}

/// Bidirectional breadth-first search between the remainder's current and
/// goal arrangements. Both frontiers record enough to reconstruct the move
/// sequence once they meet; the smaller frontier expands first each layer.
pub struct EndgameSolve {
    height: usize,
    width: usize,
    forward_frontier: Vec<Vec<u8>>,
    backward_frontier: Vec<Vec<u8>>,
    forward_parent: HashMap<Vec<u8>, (Option<Vec<u8>>, u8)>,
    backward_step: HashMap<Vec<u8>, Option<u8>>,
    start: Vec<u8>,
    goal: Vec<u8>,
    nodes: u64,
    result: Option<EndgameOutcome>,
    cancel: CancelToken,
}

impl EndgameSolve {
    pub fn new(board: &Board, region: EndgameRegion, cancel: CancelToken) -> Self {
        let dim = board.dim();
        let mut start = Vec::with_capacity(region.height * region.width);
        let mut goal = Vec::with_capacity(region.height * region.width);
        for row in region.top_rows..dim {
            for col in region.left_cols..dim {
                let index = row * dim + col;
                start.push(board.value_at(index));
                goal.push(if index == dim * dim - 1 {
                    0
                } else {
                    (index + 1) as u8
                });
            }
        }

        let result = (start == goal).then(|| EndgameOutcome::Solved(Vec::new()));
        let mut solve = Self {
            height: region.height,
            width: region.width,
            forward_frontier: vec![start.clone()],
            backward_frontier: vec![goal.clone()],
            forward_parent: HashMap::new(),
            backward_step: HashMap::new(),
            start,
            goal,
            nodes: 0,
            result,
            cancel,
        };
        solve
            .forward_parent
            .insert(solve.start.clone(), (None, 0));
        solve.backward_step.insert(solve.goal.clone(), None);
        solve
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn step(&mut self) -> TaskStatus<EndgameOutcome> {
        if let Some(result) = &self.result {
            return TaskStatus::Finished(result.clone());
        }
        for _ in 0..LAYER_SLICE {
            if self.cancel.is_canceled() {
                return self.finish(EndgameOutcome::Canceled);
            }
            if self.forward_frontier.is_empty() || self.backward_frontier.is_empty() {
                return self.finish(EndgameOutcome::Unreachable);
            }
            let outcome = if self.forward_frontier.len() <= self.backward_frontier.len() {
                self.expand_forward()
            } else {
                self.expand_backward()
            };
            if let Some(meet) = outcome {
                let path = self.reconstruct(&meet);
                return self.finish(EndgameOutcome::Solved(path));
            }
        }
        TaskStatus::Pending
    }

    pub fn run(&mut self) -> EndgameOutcome {
        loop {
            if let TaskStatus::Finished(outcome) = self.step() {
                return outcome;
            }
        }
    }

    fn finish(&mut self, outcome: EndgameOutcome) -> TaskStatus<EndgameOutcome> {
        self.result = Some(outcome.clone());
        TaskStatus::Finished(outcome)
    }

    fn expand_forward(&mut self) -> Option<Vec<u8>> {
        let frontier = std::mem::take(&mut self.forward_frontier);
        let mut next_frontier = Vec::new();
        let mut meet = None;
        for state in frontier {
            for chosen in local_moves(&state, self.height, self.width) {
                let child = local_apply(&state, chosen, self.width);
                if self.forward_parent.contains_key(&child) {
                    continue;
                }
                self.nodes += 1;
                let value = state[chosen];
                self.forward_parent
                    .insert(child.clone(), (Some(state.clone()), value));
                if meet.is_none() && self.backward_step.contains_key(&child) {
                    meet = Some(child.clone());
                }
                next_frontier.push(child);
            }
        }
        self.forward_frontier = next_frontier;
        meet
    }

    fn expand_backward(&mut self) -> Option<Vec<u8>> {
        let frontier = std::mem::take(&mut self.backward_frontier);
        let mut next_frontier = Vec::new();
        let mut meet = None;
        for state in frontier {
            let blank = blank_of(&state);
            for chosen in local_moves(&state, self.height, self.width) {
                let child = local_apply(&state, chosen, self.width);
                if self.backward_step.contains_key(&child) {
                    continue;
                }
                self.nodes += 1;
                // Choosing the tile now sitting on the old blank cell undoes
                // this expansion, so that value is the child's step toward
                // the goal.
                self.backward_step.insert(child.clone(), Some(child[blank]));
                if meet.is_none() && self.forward_parent.contains_key(&child) {
                    meet = Some(child.clone());
                }
                next_frontier.push(child);
            }
        }
        self.backward_frontier = next_frontier;
        meet
    }

    fn reconstruct(&self, meet: &[u8]) -> Vec<u8> {
        let mut path = Vec::new();
        let mut cursor = meet.to_vec();
        while let Some((Some(parent), value)) = self.forward_parent.get(&cursor) {
            path.push(*value);
            cursor = parent.clone();
        }
        path.reverse();

        let mut cursor = meet.to_vec();
        loop {
            match self.backward_step.get(&cursor) {
                Some(Some(value)) => {
                    path.push(*value);
                    let chosen = cursor
                        .iter()
                        .position(|&v| v == *value)
                        .expect("endgame step value present in its own state");
                    cursor = local_apply(&cursor, chosen, self.width);
                }
                _ => break,
            }
        }
        path
    }
}

fn blank_of(state: &[u8]) -> usize {
    state
        .iter()
        .position(|&v| v == 0)
        .expect("endgame remainder contains the blank")
}

fn local_moves(state: &[u8], height: usize, width: usize) -> Vec<usize> {
    let blank = blank_of(state);
    let (row, col) = (blank / width, blank % width);
    let mut moves = Vec::with_capacity(height + width - 2);
    for c in 0..width {
        let index = row * width + c;
        if index != blank {
            moves.push(index);
        }
    }
    for r in 0..height {
        let index = r * width + col;
        if index != blank {
            moves.push(index);
        }
    }
    moves
}

fn local_apply(state: &[u8], chosen: usize, width: usize) -> Vec<u8> {
    let mut next = state.to_vec();
    let blank = blank_of(state);
    let stride = if chosen / width == blank / width {
        1
    } else {
        width
    };
    if chosen < blank {
        let mut index = blank;
        while index > chosen {
            next[index] = next[index - stride];
            index -= stride;
        }
    } else {
        let mut index = blank;
        while index < chosen {
            next[index] = next[index + stride];
            index += stride;
        }
    }
    next[chosen] = 0;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{HashSet, VecDeque};

    #[test]
    fn locked_counts_follow_the_solved_prefix() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
        assert_eq!(locked_row_count(&board), 1);
        assert_eq!(locked_col_count(&board), 1);

        let scrambled = Board::from_tiles(3, vec![3, 1, 2, 6, 4, 5, 0, 7, 8]).unwrap();
        assert_eq!(locked_row_count(&scrambled), 0);
        assert_eq!(locked_col_count(&scrambled), 0);
    }

    #[test]
    fn region_collapses_when_a_prefix_is_locked() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
        let region = endgame_region(&board).expect("supported remainder");
        assert_eq!((region.height, region.width), (2, 3));
        assert_eq!(region.top_rows, 1);
        assert_eq!(region.left_cols, 0);

        let open = Board::from_tiles(3, vec![3, 1, 2, 6, 4, 5, 0, 7, 8]).unwrap();
        assert_eq!(endgame_region(&open), None);
    }

    #[test]
    fn near_solved_remainder_is_finished_exactly() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
        let region = endgame_region(&board).unwrap();
        let mut solve = EndgameSolve::new(&board, region, CancelToken::new());
        let EndgameOutcome::Solved(path) = solve.run() else {
            panic!("expected a solution");
        };
        assert_eq!(path, vec![5, 8]);

        let mut replay = board;
        for value in path {
            assert!(replay.apply_value(value));
        }
        assert!(replay.is_goal());
    }

    #[test]
    fn solved_remainder_returns_an_empty_path() {
        let board = Board::solved(3);
        let region = EndgameRegion {
            top_rows: 1,
            left_cols: 0,
            height: 2,
            width: 3,
        };
        let mut solve = EndgameSolve::new(&board, region, CancelToken::new());
        assert_eq!(solve.run(), EndgameOutcome::Solved(Vec::new()));
    }

    #[test]
    fn parity_violating_remainder_is_unreachable() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 5, 4, 6, 7, 8, 0]).unwrap();
        let region = endgame_region(&board).expect("top row is locked");
        let mut solve = EndgameSolve::new(&board, region, CancelToken::new());
        assert_eq!(solve.run(), EndgameOutcome::Unreachable);
    }

    #[test]
    fn cancellation_wins_over_search() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
        let region = endgame_region(&board).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut solve = EndgameSolve::new(&board, region, cancel);
        assert_eq!(solve.run(), EndgameOutcome::Canceled);
    }

    fn brute_force_distance(start: &[u8], goal: &[u8], height: usize, width: usize) -> Option<u32> {
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut queue: VecDeque<(Vec<u8>, u32)> = VecDeque::new();
        seen.insert(start.to_vec());
        queue.push_back((start.to_vec(), 0));
        while let Some((state, dist)) = queue.pop_front() {
            if state == goal {
                return Some(dist);
            }
            for chosen in local_moves(&state, height, width) {
                let child = local_apply(&state, chosen, width);
                if seen.insert(child.clone()) {
                    queue.push_back((child, dist + 1));
                }
            }
        }
        None
    }

    #[test]
    fn bidirectional_path_length_matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(0xE2D);
        for _ in 0..20 {
            // Random walk inside a 2×3 remainder of a 3×3 board whose top
            // row stays locked.
            let mut local: Vec<u8> = vec![4, 5, 6, 7, 8, 0];
            for _ in 0..12 {
                let options = local_moves(&local, 2, 3);
                let chosen = options[rng.gen_range(0..options.len())];
                local = local_apply(&local, chosen, 3);
            }
            let mut tiles = vec![1, 2, 3];
            tiles.extend_from_slice(&local);
            let board = Board::from_tiles(3, tiles).unwrap();
            let region = endgame_region(&board).expect("top row locked");

            let mut solve = EndgameSolve::new(&board, region, CancelToken::new());
            let EndgameOutcome::Solved(path) = solve.run() else {
                panic!("remainder reached by legal moves must be solvable");
            };
            let optimal = brute_force_distance(&local, &[4, 5, 6, 7, 8, 0], 2, 3)
                .expect("reachable by construction");
            assert_eq!(path.len() as u32, optimal);

            let mut replay = board;
            for value in &path {
                assert!(replay.apply_value(*value));
            }
            assert!(replay.is_goal());
        }
    }
}
