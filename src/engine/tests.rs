use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::board::{Board, BoardError};
use crate::engine::api::{CancelToken, PlanRequest, PlanTermination, TaskStatus};
use crate::engine::autoplay::AutoPlayDriver;
use crate::engine::hinting;
use crate::engine::planner::Engine;

fn click_walk(dim: usize, clicks: usize, seed: u64) -> Board {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut board = Board::solved(dim);
    for _ in 0..clicks {
        let options = board.neighbor_indices();
        let chosen = options[rng.gen_range(0..options.len())];
        assert!(board.apply_index(chosen));
    }
    board
}

#[test]
fn near_solved_board_gets_the_optimal_two_move_plan() {
    let engine = Engine::new(3);
    let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
    let result = engine
        .best_plan(&board, PlanRequest::default(), &CancelToken::new())
        .unwrap();
    let plan = result.plan.expect("a plan exists");
    assert!(plan.first_move_value == 5 || plan.first_move_value == 6);
    assert_eq!(plan.path_values.len(), 2);

    let mut replay = board;
    for value in &plan.path_values {
        assert!(replay.apply_value(*value));
    }
    assert!(replay.is_goal());
}

#[test]
fn solved_board_yields_no_plan() {
    let engine = Engine::new(4);
    let result = engine
        .best_plan(&Board::solved(4), PlanRequest::default(), &CancelToken::new())
        .unwrap();
    assert_eq!(result.plan, None);
    assert_eq!(result.termination, PlanTermination::Completed);
}

#[test]
fn mismatched_board_dimension_is_rejected() {
    let engine = Engine::new(3);
    let board = Board::solved(4);
    assert_eq!(
        engine.best_plan(&board, PlanRequest::default(), &CancelToken::new()),
        Err(BoardError::DimensionMismatch {
            expected: 3,
            found: 4
        })
    );
}

#[test]
fn preset_cancellation_returns_no_stale_plan() {
    let engine = Engine::new(4);
    let cancel = CancelToken::new();
    cancel.cancel();
    let board = Board::scrambled(4, 8);
    let result = engine
        .best_plan(&board, PlanRequest::default(), &cancel)
        .unwrap();
    assert_eq!(result.plan, None);
    assert_eq!(result.termination, PlanTermination::Canceled);
}

#[test]
fn cancellation_lands_within_one_slice() {
    let engine = Engine::new(5);
    let cancel = CancelToken::new();
    let board = Board::scrambled(5, 17);
    let mut task = engine
        .plan_task(&board, PlanRequest::default(), cancel.clone())
        .unwrap();
    assert!(matches!(task.step(), TaskStatus::Pending));
    cancel.cancel();
    let TaskStatus::Finished(result) = task.step() else {
        panic!("canceled task must finish on the next slice");
    };
    assert!(result.is_canceled());
    assert_eq!(result.plan, None);
}

#[test]
fn large_board_plans_commit_to_a_single_move() {
    let engine = Engine::new(6);
    let board = Board::scrambled(6, 23);
    let result = engine
        .best_plan(&board, PlanRequest::default(), &CancelToken::new())
        .unwrap();
    let plan = result.plan.expect("beam search always surfaces a move");
    assert_eq!(plan.path_values, vec![plan.first_move_value]);
    let mut next = board.clone();
    assert!(next.apply_value(plan.first_move_value));
}

#[test]
fn auto_play_loop_solves_a_scrambled_three_by_three() {
    let driver_engine = Engine::new(3);
    let mut driver = AutoPlayDriver::new(driver_engine, CancelToken::new());
    let mut board = Board::scrambled(3, 42);
    let mut moves = 0;
    while let Some(value) = driver.next_move(&board).unwrap() {
        assert!(board.apply_value(value), "driver returned an illegal move");
        moves += 1;
        assert!(moves < 300, "auto-play failed to converge");
    }
    assert!(board.is_goal());
}

#[test]
fn auto_play_loop_finishes_a_shallow_four_by_four() {
    let mut driver = AutoPlayDriver::new(Engine::new(4), CancelToken::new());
    let mut board = click_walk(4, 10, 7);
    let mut moves = 0;
    while let Some(value) = driver.next_move(&board).unwrap() {
        assert!(board.apply_value(value));
        moves += 1;
        assert!(moves < 120, "auto-play failed to converge");
    }
    assert!(board.is_goal());
}

#[test]
fn hint_prefers_the_planned_move_and_never_repeats() {
    let engine = Engine::new(3);
    let board = Board::from_tiles(3, vec![1, 2, 3, 4, 0, 6, 7, 5, 8]).unwrap();
    let cancel = CancelToken::new();

    let first = hinting::hint_value(&engine, &board, None, &cancel).unwrap();
    assert_eq!(first, Some(5));

    let second = hinting::hint_value(&engine, &board, first, &cancel).unwrap();
    assert!(second.is_some());
    assert_ne!(second, first);

    assert_eq!(
        hinting::hint_value(&engine, &Board::solved(3), None, &cancel).unwrap(),
        None
    );
}

#[test]
fn pattern_databases_strengthen_four_by_four_planning() {
    let mut engine = Engine::new(4);
    assert!(engine.ensure_pattern_dbs(&CancelToken::new()));
    assert!(engine.pattern_dbs().is_some());
    assert_eq!(engine.heuristic_value(&Board::solved(4)).unwrap(), 0);

    let board = click_walk(4, 2, 3);
    let result = engine
        .best_plan(&board, PlanRequest::default(), &CancelToken::new())
        .unwrap();
    let plan = result.plan.expect("shallow boards are solvable in budget");
    assert!(plan.path_values.len() <= 2);

    let mut replay = board;
    for value in &plan.path_values {
        assert!(replay.apply_value(*value));
    }
    assert!(replay.is_goal());
}

#[test]
fn dimension_change_rebuilds_caches() {
    let mut engine = Engine::new(4);
    assert!(engine.ensure_pattern_dbs(&CancelToken::new()));
    assert_eq!(engine.state_hash(&Board::solved(3)), None);

    engine.on_dimension_changed(3);
    assert_eq!(engine.dimension(), 3);
    assert!(engine.pattern_dbs().is_none());
    assert!(engine.state_hash(&Board::solved(3)).is_some());
    assert!(!engine.ensure_pattern_dbs(&CancelToken::new()));
}

#[test]
fn exact_requests_still_solve_without_an_endgame_region() {
    let engine = Engine::new(3);
    let board = Board::from_tiles(3, vec![0, 1, 2, 4, 5, 3, 7, 8, 6]).unwrap();
    let request = PlanRequest {
        exact: true,
        ..PlanRequest::default()
    };
    let result = engine.best_plan(&board, request, &CancelToken::new()).unwrap();
    let plan = result.plan.expect("a plan exists");
    assert_eq!(plan.path_values.len(), 2);

    let mut replay = board;
    for value in &plan.path_values {
        assert!(replay.apply_value(*value));
    }
    assert!(replay.is_goal());
}
