use std::collections::HashSet;
use std::sync::Arc;

use crate::board::Board;
use crate::engine::api::{CancelToken, TaskStatus};
use crate::engine::heuristic;
use crate::engine::pattern_db::PatternDbSet;
use crate::engine::zobrist::ZobristTable;

const MEMBER_SLICE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeamOutcome {
    /// First move of the best lookahead line found.
    Move(u8),
    NoMove,
    Canceled,
}

struct BeamNode {
    board: Board,
    h: u32,
    first_value: u8,
}

/// Bounded-width best-first lookahead. Every frontier member remembers the
/// first move that led to it from the real board, so the planner can commit
/// to a single step of a multi-step line. Never comes back empty while the
/// board has a legal move.
pub struct BeamSearch {
    zobrist: Arc<ZobristTable>,
    pattern_dbs: Option<Arc<PatternDbSet>>,
    cancel: CancelToken,
    width: usize,
    depth: usize,
    level: usize,
    cursor: usize,
    frontier: Vec<BeamNode>,
    next_frontier: Vec<BeamNode>,
    seen: HashSet<u32>,
    best: Option<(u32, u8)>,
    nodes: u64,
    result: Option<BeamOutcome>,
}

impl BeamSearch {
    pub fn new(
        board: &Board,
        width: usize,
        depth: usize,
        previous_hash: Option<u32>,
        zobrist: Arc<ZobristTable>,
        pattern_dbs: Option<Arc<PatternDbSet>>,
        cancel: CancelToken,
    ) -> Self {
        let mut search = Self {
            zobrist,
            pattern_dbs,
            cancel,
            width: width.max(1),
            depth: depth.max(1),
            level: 1,
            cursor: 0,
            frontier: Vec::new(),
            next_frontier: Vec::new(),
            seen: HashSet::new(),
            best: None,
            nodes: 0,
            result: None,
        };
        search.seed(board, previous_hash);
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

    /// Depth-1 frontier: the immediate neighbors, minus the move that would
    /// re-create the previous real state.
    fn seed(&mut self, board: &Board, previous_hash: Option<u32>) {
        self.seen.insert(self.state_hash(board));
        let mut frontier = Vec::new();
        for chosen in board.neighbor_indices() {
            let value = board.value_at(chosen);
            let mut child = board.clone();
            child.apply_index(chosen);
            let hash = self.state_hash(&child);
            if previous_hash == Some(hash) {
                continue;
            }
            if !self.seen.insert(hash) {
                continue;
            }
            self.nodes += 1;
            let h = heuristic::evaluate(&child, self.pattern_dbs.as_deref());
            if h == 0 {
                self.result = Some(BeamOutcome::Move(value));
                return;
            }
            match self.best {
                Some((best_h, _)) if best_h <= h => {}
                _ => self.best = Some((h, value)),
            }
            frontier.push(BeamNode {
                board: child,
                h,
                first_value: value,
            });
        }
        frontier.sort_by_key(|node| node.h);
        frontier.truncate(self.width);
        if frontier.is_empty() {
            self.result = Some(match self.best {
                Some((_, value)) => BeamOutcome::Move(value),
                None => BeamOutcome::NoMove,
            });
        }
        self.frontier = frontier;
    }

    pub fn step(&mut self) -> TaskStatus<BeamOutcome> {
        if let Some(result) = &self.result {
            return TaskStatus::Finished(result.clone());
        }
        let mut members = 0usize;
        while members < MEMBER_SLICE {
            if self.cancel.is_canceled() {
                return self.finish(BeamOutcome::Canceled);
            }
            if self.level >= self.depth {
                return self.finish_with_best();
            }
            if self.cursor >= self.frontier.len() {
                let mut next = std::mem::take(&mut self.next_frontier);
                next.sort_by_key(|node| node.h);
                next.truncate(self.width);
                self.frontier = next;
                self.cursor = 0;
                self.level += 1;
                if self.frontier.is_empty() || self.level >= self.depth {
                    return self.finish_with_best();
                }
                continue;
            }

            let member_index = self.cursor;
            self.cursor += 1;
            members += 1;
            let first_value = self.frontier[member_index].first_value;
            for chosen in self.frontier[member_index].board.neighbor_indices() {
                if self.cancel.is_canceled() {
                    return self.finish(BeamOutcome::Canceled);
                }
                let mut child = self.frontier[member_index].board.clone();
                child.apply_index(chosen);
                let hash = self.state_hash(&child);
                if !self.seen.insert(hash) {
                    continue;
                }
                self.nodes += 1;
                let h = heuristic::evaluate(&child, self.pattern_dbs.as_deref());
                if h == 0 {
                    return self.finish(BeamOutcome::Move(first_value));
                }
                match self.best {
                    Some((best_h, _)) if best_h <= h => {}
                    _ => self.best = Some((h, first_value)),
                }
                self.next_frontier.push(BeamNode {
                    board: child,
                    h,
                    first_value,
                });
            }
        }
        TaskStatus::Pending
    }

    pub fn run(&mut self) -> BeamOutcome {
        loop {
            if let TaskStatus::Finished(outcome) = self.step() {
                return outcome;
            }
        }
    }

    fn finish_with_best(&mut self) -> TaskStatus<BeamOutcome> {
        let outcome = match self.best {
            Some((_, value)) => BeamOutcome::Move(value),
            None => BeamOutcome::NoMove,
        };
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: BeamOutcome) -> TaskStatus<BeamOutcome> {
        self.result = Some(outcome.clone());
        TaskStatus::Finished(outcome)
    }
}
