use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cooperative cancellation flag. Search routines poll it at every
/// suspension point and node-expansion boundary; once set they unwind and
/// report `Canceled` instead of a plan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One `step` call performs at most one suspension slice of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus<T> {
    Pending,
    Finished(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTermination {
    Completed,
    NodeBudget,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanRequest {
    /// Prefer the optimal searches even when the board is not near-solved.
    pub exact: bool,
    /// Stagnation escalation level from the driver; widens beam search.
    pub escalation: u8,
    /// Hash of the previous real board state, used as a one-move tabu.
    pub previous_hash: Option<u32>,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            exact: false,
            escalation: 0,
            previous_hash: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub first_move_value: u8,
    pub path_values: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanResult {
    pub plan: Option<Plan>,
    pub termination: PlanTermination,
    pub nodes: u64,
}

impl PlanResult {
    pub fn canceled(nodes: u64) -> Self {
        Self {
            plan: None,
            termination: PlanTermination::Canceled,
            nodes,
        }
    }

    pub fn empty(termination: PlanTermination, nodes: u64) -> Self {
        Self {
            plan: None,
            termination,
            nodes,
        }
    }

    pub fn solved(path_values: Vec<u8>, nodes: u64) -> Self {
        debug_assert!(!path_values.is_empty());
        Self {
            plan: path_values.first().map(|&first_move_value| Plan {
                first_move_value,
                path_values: path_values.clone(),
            }),
            termination: PlanTermination::Completed,
            nodes,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.termination == PlanTermination::Canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_canceled());
        token.cancel();
        assert!(clone.is_canceled());
    }

    #[test]
    fn solved_result_reports_first_move() {
        let result = PlanResult::solved(vec![5, 8], 42);
        let plan = result.plan.expect("plan");
        assert_eq!(plan.first_move_value, 5);
        assert_eq!(plan.path_values, vec![5, 8]);
        assert_eq!(result.termination, PlanTermination::Completed);
    }
}
