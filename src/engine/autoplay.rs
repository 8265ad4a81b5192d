use std::collections::VecDeque;

use crate::board::{Board, BoardError};
use crate::engine::api::{CancelToken, PlanRequest};
use crate::engine::hinting;
use crate::engine::planner::Engine;

const RECENT_WINDOW: usize = 24;

/// Replanning loop state for the external auto-play driver. Each cycle asks
/// the planner for a move, replays the rest of a committed plan while the
/// board follows it, watches for stagnation (no heuristic improvement across
/// several real moves), and escalates the beam profile when stuck.
pub struct AutoPlayDriver {
    engine: Engine,
    cancel: CancelToken,
    scripted: VecDeque<u8>,
    expected_hash: Option<u32>,
    previous_hash: Option<u32>,
    recent_hashes: VecDeque<u32>,
    best_heuristic: Option<u32>,
    stalled_moves: u32,
    escalation: u8,
}

impl AutoPlayDriver {
    pub fn new(engine: Engine, cancel: CancelToken) -> Self {
        Self {
            engine,
            cancel,
            scripted: VecDeque::new(),
            expected_hash: None,
            previous_hash: None,
            recent_hashes: VecDeque::new(),
            best_heuristic: None,
            stalled_moves: 0,
            escalation: 0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn escalation(&self) -> u8 {
        self.escalation
    }

    /// One plan-execute cycle decision: the tile value to move next, or
    /// `None` when the board is solved or the request was canceled.
    pub fn next_move(&mut self, board: &Board) -> Result<Option<u8>, BoardError> {
        if board.is_goal() {
            return Ok(None);
        }
        let heuristic_value = self.engine.heuristic_value(board)?;
        let Some(hash) = self.engine.state_hash(board) else {
            return Err(BoardError::DimensionMismatch {
                expected: self.engine.dimension(),
                found: board.dim(),
            });
        };

        // Replay the committed plan while the board keeps following it.
        if self.expected_hash == Some(hash) {
            if let Some(value) = self.scripted.pop_front() {
                self.expect_after(board, value);
                return Ok(Some(value));
            }
        } else {
            self.scripted.clear();
        }
        self.expected_hash = None;

        self.observe(heuristic_value, hash);

        let request = PlanRequest {
            exact: false,
            escalation: self.escalation,
            previous_hash: self.previous_hash,
        };
        let result = self.engine.best_plan(board, request, &self.cancel)?;
        if result.is_canceled() {
            return Ok(None);
        }
        let value = match result.plan {
            Some(plan) => {
                self.scripted = plan.path_values.iter().copied().skip(1).collect();
                plan.first_move_value
            }
            None => {
                // One-ply greedy keeps the loop moving when search gives up.
                match hinting::greedy_candidates(&self.engine, board)?.first() {
                    Some(&(_, value)) => value,
                    None => return Ok(None),
                }
            }
        };
        self.expect_after(board, value);
        Ok(Some(value))
    }

    fn observe(&mut self, heuristic_value: u32, hash: u32) {
        let window = self.engine.profile().stagnation_window;
        let max_escalation = self.engine.profile().max_escalation;
        match self.best_heuristic {
            Some(best) if heuristic_value < best => {
                self.best_heuristic = Some(heuristic_value);
                self.stalled_moves = 0;
                self.escalation = 0;
            }
            Some(_) => {
                self.stalled_moves += 1;
                if self.stalled_moves % window == 0 {
                    self.escalation = (self.escalation + 1).min(max_escalation);
                }
            }
            None => self.best_heuristic = Some(heuristic_value),
        }
        if self.recent_hashes.contains(&hash) {
            self.escalation = (self.escalation + 1).min(max_escalation);
        }
        self.recent_hashes.push_back(hash);
        while self.recent_hashes.len() > RECENT_WINDOW {
            self.recent_hashes.pop_front();
        }
    }

    fn expect_after(&mut self, board: &Board, value: u8) {
        self.previous_hash = self.engine.state_hash(board);
        let mut next = board.clone();
        if next.apply_value(value) {
            self.expected_hash = self.engine.state_hash(&next);
        } else {
            self.expected_hash = None;
            self.scripted.clear();
        }
    }
}
