use crate::board::{Board, BoardError};
use crate::engine::api::{CancelToken, PlanRequest};
use crate::engine::heuristic;
use crate::engine::planner::Engine;

/// Every legal move ranked by the heuristic of the board it produces,
/// best first. Used as the hint fallback and for second-best selection.
pub fn greedy_candidates(engine: &Engine, board: &Board) -> Result<Vec<(u32, u8)>, BoardError> {
    engine.heuristic_value(board)?;
    let pattern_dbs = engine.pattern_dbs();
    let mut candidates: Vec<(u32, u8)> = board
        .neighbor_indices()
        .into_iter()
        .map(|chosen| {
            let value = board.value_at(chosen);
            let mut child = board.clone();
            child.apply_index(chosen);
            (heuristic::evaluate(&child, pattern_dbs.as_deref()), value)
        })
        .collect();
    candidates.sort_unstable();
    Ok(candidates)
}

/// A single tile value to highlight. Prefers the planner's first move and
/// falls back to the greedy one-ply choice when planning comes back empty.
/// The same value is never hinted twice in a row while an alternative
/// exists; the second-best candidate is offered instead.
pub fn hint_value(
    engine: &Engine,
    board: &Board,
    last_hint: Option<u8>,
    cancel: &CancelToken,
) -> Result<Option<u8>, BoardError> {
    if board.is_goal() {
        return Ok(None);
    }
    let candidates = greedy_candidates(engine, board)?;
    let planned = engine.best_plan(board, PlanRequest::default(), cancel)?;
    if planned.is_canceled() {
        return Ok(None);
    }
    let primary = planned
        .plan
        .map(|plan| plan.first_move_value)
        .or_else(|| candidates.first().map(|&(_, value)| value));
    let Some(primary) = primary else {
        return Ok(None);
    };
    if last_hint == Some(primary) {
        let alternate = candidates
            .iter()
            .map(|&(_, value)| value)
            .find(|&value| value != primary);
        return Ok(Some(alternate.unwrap_or(primary)));
    }
    Ok(Some(primary))
}
