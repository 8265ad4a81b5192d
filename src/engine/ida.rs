use std::collections::HashMap;
use std::sync::Arc;

use crate::board::Board;
use crate::engine::api::{CancelToken, TaskStatus};
use crate::engine::heuristic;
use crate::engine::pattern_db::PatternDbSet;
use crate::engine::zobrist::ZobristTable;

const EXPANSION_SLICE: u32 = 1_500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdaOutcome {
    Solved(Vec<u8>),
    Exhausted,
    BudgetExceeded,
    Canceled,
}

struct IdaChild {
    value: u8,
    board: Board,
    hash: u32,
    h: u32,
}

struct IdaFrame {
    g: u32,
    hash: u32,
    move_value: u8,
    children: Vec<IdaChild>,
    next_child: usize,
}

/// Iterative-deepening A* over the move-value graph, run as an explicit
/// stack machine so the host can tick it cooperatively. Each iteration keeps
/// a transposition map from state hash to the best path cost seen, skips the
/// child that would undo the previous move, and respects a hard node budget.
pub struct IdaSearch {
    root: Board,
    zobrist: Arc<ZobristTable>,
    pattern_dbs: Option<Arc<PatternDbSet>>,
    cancel: CancelToken,
    node_budget: u64,
    nodes: u64,
    bound: u32,
    next_bound: u32,
    stack: Vec<IdaFrame>,
    transpositions: HashMap<u32, u32>,
    result: Option<IdaOutcome>,
}

impl IdaSearch {
    pub fn new(
        board: Board,
        zobrist: Arc<ZobristTable>,
        pattern_dbs: Option<Arc<PatternDbSet>>,
        node_budget: u64,
        cancel: CancelToken,
    ) -> Self {
        let root_h = heuristic::evaluate(&board, pattern_dbs.as_deref());
        let result = board.is_goal().then(|| IdaOutcome::Solved(Vec::new()));
        let mut search = Self {
            root: board,
            zobrist,
            pattern_dbs,
            cancel,
            node_budget,
            nodes: 0,
            bound: root_h,
            next_bound: u32::MAX,
            stack: Vec::new(),
            transpositions: HashMap::new(),
            result,
        };
        if search.result.is_none() {
            search.start_iteration();
        }
        search
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    fn state_hash(&self, board: &Board) -> u32 {
        self.zobrist
            .hash(board)
            .expect("search boards match the engine's hash table dimension")
    }

    fn make_frame(&self, board: &Board, g: u32, hash: u32, move_value: u8) -> IdaFrame {
        let mut children: Vec<IdaChild> = board
            .neighbor_indices()
            .into_iter()
            .map(|chosen| {
                let value = board.value_at(chosen);
                let mut child = board.clone();
                child.apply_index(chosen);
                let hash = self.state_hash(&child);
                let h = heuristic::evaluate(&child, self.pattern_dbs.as_deref());
                IdaChild {
                    value,
                    board: child,
                    hash,
                    h,
                }
            })
            .collect();
        children.sort_by_key(|child| child.h);
        IdaFrame {
            g,
            hash,
            move_value,
            children,
            next_child: 0,
        }
    }

    fn start_iteration(&mut self) {
        self.transpositions.clear();
        let root = self.root.clone();
        let root_hash = self.state_hash(&root);
        self.transpositions.insert(root_hash, 0);
        let frame = self.make_frame(&root, 0, root_hash, 0);
        self.stack = vec![frame];
        self.next_bound = u32::MAX;
    }

    fn solved_path(&self, last_value: u8) -> Vec<u8> {
        let mut path: Vec<u8> = self
            .stack
            .iter()
            .skip(1)
            .map(|frame| frame.move_value)
            .collect();
        path.push(last_value);
        path
    }

    fn finish(&mut self, outcome: IdaOutcome) -> TaskStatus<IdaOutcome> {
        self.stack.clear();
        self.result = Some(outcome.clone());
        TaskStatus::Finished(outcome)
    }

    pub fn step(&mut self) -> TaskStatus<IdaOutcome> {
        if let Some(result) = &self.result {
            return TaskStatus::Finished(result.clone());
        }
        let mut expanded = 0u32;
        loop {
            if expanded >= EXPANSION_SLICE {
                return TaskStatus::Pending;
            }
            if self.cancel.is_canceled() {
                return self.finish(IdaOutcome::Canceled);
            }
            let depth = self.stack.len();
            if depth == 0 {
                // Iteration exhausted without reaching the goal.
                if self.next_bound == u32::MAX {
                    return self.finish(IdaOutcome::Exhausted);
                }
                self.bound = self.next_bound;
                self.start_iteration();
                continue;
            }

            let frame_index = depth - 1;
            if self.stack[frame_index].next_child >= self.stack[frame_index].children.len() {
                self.stack.pop();
                continue;
            }
            let child_index = self.stack[frame_index].next_child;
            self.stack[frame_index].next_child += 1;

            expanded += 1;
            self.nodes += 1;
            if self.nodes > self.node_budget {
                return self.finish(IdaOutcome::BudgetExceeded);
            }

            let parent_g = self.stack[frame_index].g;
            let grandparent_hash = (depth >= 2).then(|| self.stack[depth - 2].hash);
            let (value, hash, h) = {
                let child = &self.stack[frame_index].children[child_index];
                (child.value, child.hash, child.h)
            };
            let g = parent_g + 1;
            let f = g + h;
            if f > self.bound {
                self.next_bound = self.next_bound.min(f);
                continue;
            }
            if self.stack[frame_index].children[child_index].board.is_goal() {
                let path = self.solved_path(value);
                return self.finish(IdaOutcome::Solved(path));
            }
            if grandparent_hash == Some(hash) {
                continue;
            }
            match self.transpositions.get(&hash) {
                Some(&seen_g) if seen_g <= g => continue,
                _ => {
                    self.transpositions.insert(hash, g);
                }
            }
            let child_board = self.stack[frame_index].children[child_index].board.clone();
            let frame = self.make_frame(&child_board, g, hash, value);
            self.stack.push(frame);
        }
    }

    pub fn run(&mut self) -> IdaOutcome {
        loop {
            if let TaskStatus::Finished(outcome) = self.step() {
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    fn search(board: Board, budget: u64) -> IdaSearch {
        let zobrist = Arc::new(ZobristTable::new(board.dim()));
        IdaSearch::new(board, zobrist, None, budget, CancelToken::new())
    }

    fn click_distance(start: &Board) -> u32 {
        let goal = Board::solved(start.dim());
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut queue: VecDeque<(Board, u32)> = VecDeque::new();
        seen.insert(start.tiles().to_vec());
        queue.push_back((start.clone(), 0));
        while let Some((board, dist)) = queue.pop_front() {
            if board == goal {
                return dist;
            }
            for chosen in board.neighbor_indices() {
                let mut child = board.clone();
                assert!(child.apply_index(chosen));
                if seen.insert(child.tiles().to_vec()) {
                    queue.push_back((child, dist + 1));
                }
            }
        }
        unreachable!("solvable boards reach the goal");
    }

    #[test]
    fn already_solved_board_needs_no_moves() {
        let mut ida = search(Board::solved(3), 1_000);
        assert_eq!(ida.run(), IdaOutcome::Solved(Vec::new()));
    }

    #[test]
    fn one_move_board_is_solved_optimally() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 5, 6, 7, 0, 8]).unwrap();
        let mut ida = search(board, 10_000);
        assert_eq!(ida.run(), IdaOutcome::Solved(vec![8]));
    }

    #[test]
    fn near_solved_example_is_solved_in_two_moves() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
        let mut ida = search(board.clone(), 10_000);
        let IdaOutcome::Solved(path) = ida.run() else {
            panic!("expected a solution");
        };
        assert_eq!(path.len() as u32, click_distance(&board));
        assert_eq!(path, vec![5, 8]);
    }

    #[test]
    fn distant_tile_shortcut_is_found() {
        // Two clicks despite a Manhattan sum of three: the first click shifts
        // a whole column segment at once.
        let board = Board::from_tiles(3, vec![1, 2, 3, 0, 5, 6, 4, 7, 8]).unwrap();
        let mut ida = search(board.clone(), 50_000);
        let IdaOutcome::Solved(path) = ida.run() else {
            panic!("expected a solution");
        };
        assert_eq!(click_distance(&board), 2);
        assert_eq!(path.len(), 2);

        let mut replay = board;
        for value in path {
            assert!(replay.apply_value(value));
        }
        assert!(replay.is_goal());
    }

    #[test]
    fn solutions_match_exhaustive_search_on_shallow_boards() {
        let boards = [
            vec![1, 2, 3, 4, 5, 6, 0, 7, 8],
            vec![1, 2, 3, 0, 4, 6, 7, 5, 8],
            vec![1, 0, 2, 4, 5, 3, 7, 8, 6],
            vec![0, 1, 2, 4, 5, 3, 7, 8, 6],
        ];
        for tiles in boards {
            let board = Board::from_tiles(3, tiles).unwrap();
            let mut ida = search(board.clone(), 200_000);
            let IdaOutcome::Solved(path) = ida.run() else {
                panic!("expected a solution for {board}");
            };
            let mut replay = board.clone();
            for value in &path {
                assert!(replay.apply_value(*value));
            }
            assert!(replay.is_goal());
            assert_eq!(path.len() as u32, click_distance(&board), "board {board}");
        }
    }

    #[test]
    fn node_budget_aborts_loudly() {
        let board = Board::scrambled(4, 1234);
        let mut ida = search(board, 50);
        assert_eq!(ida.run(), IdaOutcome::BudgetExceeded);
    }

    #[test]
    fn cancellation_preempts_the_search() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let board = Board::scrambled(3, 9);
        let zobrist = Arc::new(ZobristTable::new(3));
        let mut ida = IdaSearch::new(board, zobrist, None, 1_000_000, cancel);
        assert_eq!(ida.run(), IdaOutcome::Canceled);
    }

    #[test]
    fn transpositions_keep_shallow_searches_small() {
        let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
        let mut ida = search(board, 10_000);
        assert!(matches!(ida.run(), IdaOutcome::Solved(_)));
        assert!(ida.nodes() < 200);
    }
}
