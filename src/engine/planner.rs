use std::sync::Arc;

use crate::board::{Board, BoardError};
use crate::engine::api::{CancelToken, PlanRequest, PlanResult, PlanTermination, TaskStatus};
use crate::engine::automation::AutomationProfile;
use crate::engine::beam::{BeamOutcome, BeamSearch};
use crate::engine::endgame::{endgame_region, EndgameOutcome, EndgameSolve};
use crate::engine::heuristic;
use crate::engine::ida::{IdaOutcome, IdaSearch};
use crate::engine::pattern_db::{ArtifactError, PatternDbSet, SetBuildOutcome};
use crate::engine::search_trace;
use crate::engine::zobrist::ZobristTable;

/// Owns the dimension-keyed caches (hash table, pattern databases) and hands
/// out plan tasks. Callers must report dimension changes so stale caches are
/// rebuilt instead of silently producing wrong hashes.
pub struct Engine {
    dim: usize,
    profile: AutomationProfile,
    zobrist: Arc<ZobristTable>,
    pattern_dbs: Option<Arc<PatternDbSet>>,
}

impl Engine {
    pub fn new(dim: usize) -> Self {
        // Reuses the board constructor's dimension check.
        let _ = Board::solved(dim);
        Self {
            dim,
            profile: AutomationProfile::for_dimension(dim),
            zobrist: Arc::new(ZobristTable::new(dim)),
            pattern_dbs: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn profile(&self) -> AutomationProfile {
        self.profile
    }

    pub fn on_dimension_changed(&mut self, dim: usize) {
        if dim == self.dim {
            return;
        }
        let _ = Board::solved(dim);
        self.dim = dim;
        self.profile = AutomationProfile::for_dimension(dim);
        self.zobrist = Arc::new(ZobristTable::new(dim));
        self.pattern_dbs = None;
    }

    pub fn pattern_dbs(&self) -> Option<Arc<PatternDbSet>> {
        self.pattern_dbs.clone()
    }

    pub fn install_pattern_dbs(&mut self, set: PatternDbSet) -> Result<(), ArtifactError> {
        if set.dim() != self.dim {
            return Err(ArtifactError::DimensionMismatch {
                expected: self.dim,
                found: set.dim(),
            });
        }
        self.pattern_dbs = Some(Arc::new(set));
        Ok(())
    }

    /// Builds and installs the databases for the current dimension if that
    /// dimension supports them. Returns whether databases are now loaded.
    pub fn ensure_pattern_dbs(&mut self, cancel: &CancelToken) -> bool {
        if self.pattern_dbs.is_some() {
            return true;
        }
        match PatternDbSet::build(self.dim, cancel) {
            SetBuildOutcome::Built(set) => {
                self.pattern_dbs = Some(Arc::new(set));
                true
            }
            SetBuildOutcome::Unsupported | SetBuildOutcome::Canceled => false,
        }
    }

    fn check_board(&self, board: &Board) -> Result<(), BoardError> {
        if board.dim() != self.dim {
            return Err(BoardError::DimensionMismatch {
                expected: self.dim,
                found: board.dim(),
            });
        }
        Ok(())
    }

    pub fn heuristic_value(&self, board: &Board) -> Result<u32, BoardError> {
        self.check_board(board)?;
        Ok(heuristic::evaluate(board, self.pattern_dbs.as_deref()))
    }

    /// `None` means the board does not match the engine's dimension and
    /// `on_dimension_changed` is due.
    pub fn state_hash(&self, board: &Board) -> Option<u32> {
        self.zobrist.hash(board)
    }

    pub fn plan_task(
        &self,
        board: &Board,
        request: PlanRequest,
        cancel: CancelToken,
    ) -> Result<PlanTask, BoardError> {
        self.check_board(board)?;
        Ok(PlanTask::new(
            board.clone(),
            request,
            self.profile,
            Arc::clone(&self.zobrist),
            self.pattern_dbs.clone(),
            cancel,
        ))
    }

    /// Blocking convenience for hosts without a tick loop.
    pub fn best_plan(
        &self,
        board: &Board,
        request: PlanRequest,
        cancel: &CancelToken,
    ) -> Result<PlanResult, BoardError> {
        let mut task = self.plan_task(board, request, cancel.clone())?;
        Ok(task.run())
    }
}

enum Stage {
    Endgame(EndgameSolve),
    Ida(IdaSearch),
    Beam(BeamSearch),
    Done(PlanResult),
}

enum StageEvent {
    Endgame(EndgameOutcome, u64),
    Ida(IdaOutcome, u64),
    Beam(BeamOutcome, u64),
}

/// The `bestPlan` orchestrator as a cooperative task: exact endgame close
/// when the unsolved remainder collapsed to a supported rectangle, IDA* when
/// the board is small and near solved (or an exact plan was asked for), and
/// beam lookahead otherwise. Later stages take over when an earlier one
/// comes back empty; cancellation short-circuits everything.
pub struct PlanTask {
    board: Board,
    request: PlanRequest,
    profile: AutomationProfile,
    zobrist: Arc<ZobristTable>,
    pattern_dbs: Option<Arc<PatternDbSet>>,
    cancel: CancelToken,
    nodes: u64,
    budget_hit: bool,
    stage: Stage,
}

impl PlanTask {
    fn new(
        board: Board,
        request: PlanRequest,
        profile: AutomationProfile,
        zobrist: Arc<ZobristTable>,
        pattern_dbs: Option<Arc<PatternDbSet>>,
        cancel: CancelToken,
    ) -> Self {
        let mut task = Self {
            board,
            request,
            profile,
            zobrist,
            pattern_dbs,
            cancel,
            nodes: 0,
            budget_hit: false,
            stage: Stage::Done(PlanResult::empty(PlanTermination::Completed, 0)),
        };
        task.stage = task.opening_stage();
        task
    }

    fn opening_stage(&self) -> Stage {
        if self.board.is_goal() {
            return Stage::Done(PlanResult::empty(PlanTermination::Completed, 0));
        }
        if let Some(region) = endgame_region(&self.board) {
            return Stage::Endgame(EndgameSolve::new(
                &self.board,
                region,
                self.cancel.clone(),
            ));
        }
        self.optimal_or_beam_stage()
    }

    fn optimal_or_beam_stage(&self) -> Stage {
        let h = heuristic::evaluate(&self.board, self.pattern_dbs.as_deref());
        let small = self.board.dim() <= self.profile.ida_dimension_limit;
        if small && (self.request.exact || h <= self.profile.ida_heuristic_gate) {
            return Stage::Ida(IdaSearch::new(
                self.board.clone(),
                Arc::clone(&self.zobrist),
                self.pattern_dbs.clone(),
                self.profile.ida_node_budget,
                self.cancel.clone(),
            ));
        }
        self.beam_stage(h)
    }

    fn beam_stage(&self, heuristic_value: u32) -> Stage {
        let (width, depth) = self
            .profile
            .beam_shape(self.request.escalation, heuristic_value);
        Stage::Beam(BeamSearch::new(
            &self.board,
            width,
            depth,
            self.request.previous_hash,
            Arc::clone(&self.zobrist),
            self.pattern_dbs.clone(),
            self.cancel.clone(),
        ))
    }

    pub fn step(&mut self) -> TaskStatus<PlanResult> {
        let event = match &mut self.stage {
            Stage::Done(result) => return TaskStatus::Finished(result.clone()),
            Stage::Endgame(solve) => match solve.step() {
                TaskStatus::Pending => return TaskStatus::Pending,
                TaskStatus::Finished(outcome) => StageEvent::Endgame(outcome, solve.nodes()),
            },
            Stage::Ida(search) => match search.step() {
                TaskStatus::Pending => return TaskStatus::Pending,
                TaskStatus::Finished(outcome) => StageEvent::Ida(outcome, search.nodes()),
            },
            Stage::Beam(search) => match search.step() {
                TaskStatus::Pending => return TaskStatus::Pending,
                TaskStatus::Finished(outcome) => StageEvent::Beam(outcome, search.nodes()),
            },
        };
        self.advance(event)
    }

    pub fn run(&mut self) -> PlanResult {
        loop {
            if let TaskStatus::Finished(result) = self.step() {
                return result;
            }
        }
    }

    fn advance(&mut self, event: StageEvent) -> TaskStatus<PlanResult> {
        match event {
            StageEvent::Endgame(outcome, nodes) => {
                self.nodes += nodes;
                match outcome {
                    EndgameOutcome::Solved(path) if !path.is_empty() => {
                        self.finish("endgame", PlanResult::solved(path, self.nodes))
                    }
                    EndgameOutcome::Solved(_) | EndgameOutcome::Unreachable => {
                        self.stage = self.optimal_or_beam_stage();
                        TaskStatus::Pending
                    }
                    EndgameOutcome::Canceled => {
                        self.finish("endgame", PlanResult::canceled(self.nodes))
                    }
                }
            }
            StageEvent::Ida(outcome, nodes) => {
                self.nodes += nodes;
                match outcome {
                    IdaOutcome::Solved(path) if !path.is_empty() => {
                        self.finish("ida", PlanResult::solved(path, self.nodes))
                    }
                    IdaOutcome::Solved(_) => self.finish(
                        "ida",
                        PlanResult::empty(PlanTermination::Completed, self.nodes),
                    ),
                    IdaOutcome::Exhausted | IdaOutcome::BudgetExceeded => {
                        self.budget_hit |= matches!(outcome, IdaOutcome::BudgetExceeded);
                        let h = heuristic::evaluate(&self.board, self.pattern_dbs.as_deref());
                        self.stage = self.beam_stage(h);
                        TaskStatus::Pending
                    }
                    IdaOutcome::Canceled => self.finish("ida", PlanResult::canceled(self.nodes)),
                }
            }
            StageEvent::Beam(outcome, nodes) => {
                self.nodes += nodes;
                match outcome {
                    BeamOutcome::Move(value) => {
                        self.finish("beam", PlanResult::solved(vec![value], self.nodes))
                    }
                    BeamOutcome::NoMove => {
                        let termination = if self.budget_hit {
                            PlanTermination::NodeBudget
                        } else {
                            PlanTermination::Completed
                        };
                        self.finish("beam", PlanResult::empty(termination, self.nodes))
                    }
                    BeamOutcome::Canceled => self.finish("beam", PlanResult::canceled(self.nodes)),
                }
            }
        }
    }

    fn finish(&mut self, routine: &str, result: PlanResult) -> TaskStatus<PlanResult> {
        let outcome = match result.termination {
            PlanTermination::Canceled => "canceled",
            PlanTermination::NodeBudget => "budget",
            PlanTermination::Completed if result.plan.is_some() => "plan",
            PlanTermination::Completed => "no-plan",
        };
        search_trace::plan_line(self.board.dim(), routine, result.nodes, outcome);
        self.stage = Stage::Done(result.clone());
        TaskStatus::Finished(result)
    }
}
