use crate::board::Board;
use crate::engine::pattern_db::PatternDbSet;

/// Sum of per-tile grid distances to the goal cell, blank excluded.
pub fn manhattan(board: &Board) -> u32 {
    let dim = board.dim();
    let mut total = 0u32;
    for (index, &value) in board.tiles().iter().enumerate() {
        if value == 0 {
            continue;
        }
        let goal = board.goal_index(value);
        let row_delta = (index / dim).abs_diff(goal / dim);
        let col_delta = (index % dim).abs_diff(goal % dim);
        total += (row_delta + col_delta) as u32;
    }
    total
}

/// +2 for every pair of tiles sharing their goal row (or column) that sit in
/// that row (or column) in reversed order. Fixing a conflict costs at least
/// two extra moves beyond the Manhattan estimate.
pub fn linear_conflicts(board: &Board) -> u32 {
    let dim = board.dim();
    let mut total = 0u32;
    for row in 0..dim {
        let mut settled: Vec<usize> = Vec::with_capacity(dim);
        for col in 0..dim {
            let value = board.value_at(row * dim + col);
            if value == 0 {
                continue;
            }
            let goal = board.goal_index(value);
            if goal / dim == row {
                settled.push(goal % dim);
            }
        }
        total += reversed_pairs(&settled);
    }
    for col in 0..dim {
        let mut settled: Vec<usize> = Vec::with_capacity(dim);
        for row in 0..dim {
            let value = board.value_at(row * dim + col);
            if value == 0 {
                continue;
            }
            let goal = board.goal_index(value);
            if goal % dim == col {
                settled.push(goal / dim);
            }
        }
        total += reversed_pairs(&settled);
    }
    total
}

fn reversed_pairs(settled: &[usize]) -> u32 {
    let mut pairs = 0u32;
    for i in 0..settled.len() {
        for j in (i + 1)..settled.len() {
            if settled[i] > settled[j] {
                pairs += 2;
            }
        }
    }
    pairs
}

/// Move-ordering tie-breakers for known-hard local shapes: a wrong tile in a
/// corner whose edge neighbors are already correct, and the last two cells of
/// the top row or left column holding each other's tiles. Not lower bounds.
pub fn corner_and_stuck_penalty(board: &Board) -> u32 {
    let dim = board.dim();
    let mut total = 0u32;

    let corners = [
        (0usize, [1usize, dim]),
        (dim - 1, [dim - 2, 2 * dim - 1]),
        (dim * (dim - 1), [dim * (dim - 2), dim * (dim - 1) + 1]),
    ];
    for (corner, neighbors) in corners {
        let value = board.value_at(corner);
        if value == 0 || board.goal_index(value) == corner {
            continue;
        }
        let blocked = neighbors.iter().all(|&index| {
            let neighbor = board.value_at(index);
            neighbor != 0 && board.goal_index(neighbor) == index
        });
        if blocked {
            total += 2;
        }
    }

    let row_pair = (dim - 2, dim - 1);
    if swapped_pair(board, row_pair.0, row_pair.1) {
        total += 2;
    }
    let col_pair = (dim * (dim - 2), dim * (dim - 1));
    if swapped_pair(board, col_pair.0, col_pair.1) {
        total += 2;
    }

    total
}

fn swapped_pair(board: &Board, a: usize, b: usize) -> bool {
    let va = board.value_at(a);
    let vb = board.value_at(b);
    va != 0 && vb != 0 && board.goal_index(va) == b && board.goal_index(vb) == a
}

/// +1 per tile sitting on the exactly opposite edge from its goal edge.
pub fn edge_swap_penalty(board: &Board) -> u32 {
    let dim = board.dim();
    let mut total = 0u32;
    for (index, &value) in board.tiles().iter().enumerate() {
        if value == 0 {
            continue;
        }
        let goal = board.goal_index(value);
        let (row, col) = (index / dim, index % dim);
        let (goal_row, goal_col) = (goal / dim, goal % dim);
        if (goal_row == 0 && row == dim - 1) || (goal_row == dim - 1 && row == 0) {
            total += 1;
        }
        if (goal_col == 0 && col == dim - 1) || (goal_col == dim - 1 && col == 0) {
            total += 1;
        }
    }
    total
}

/// Row/column occupancy deficit bound: per row (and column), how many tiles
/// that belong there are missing. The result is the larger of the two sums.
pub fn walking_distance(board: &Board) -> u32 {
    let dim = board.dim();
    let mut row_have = vec![0u32; dim];
    let mut col_have = vec![0u32; dim];
    let mut row_should = vec![0u32; dim];
    let mut col_should = vec![0u32; dim];
    for (index, &value) in board.tiles().iter().enumerate() {
        if value == 0 {
            continue;
        }
        let goal = board.goal_index(value);
        row_should[goal / dim] += 1;
        col_should[goal % dim] += 1;
        if index / dim == goal / dim {
            row_have[goal / dim] += 1;
        }
        if index % dim == goal % dim {
            col_have[goal % dim] += 1;
        }
    }
    let row_sum: u32 = (0..dim).map(|r| row_should[r] - row_have[r]).sum();
    let col_sum: u32 = (0..dim).map(|c| col_should[c] - col_have[c]).sum();
    row_sum.max(col_sum)
}

/// Sum of exact disjoint-triple distances; 0 when no database applies.
pub fn pattern_db_sum(board: &Board, pattern_dbs: Option<&PatternDbSet>) -> u32 {
    match pattern_dbs {
        Some(set) => set.lookup_sum(board).unwrap_or(0),
        None => 0,
    }
}

/// Combined estimate. The penalty terms live only in the first branch of the
/// max so the walking-distance and pattern-database branches stay sound on
/// their own.
pub fn evaluate(board: &Board, pattern_dbs: Option<&PatternDbSet>) -> u32 {
    let ordered = manhattan(board)
        + linear_conflicts(board)
        + corner_and_stuck_penalty(board)
        + edge_swap_penalty(board);
    ordered
        .max(pattern_db_sum(board, pattern_dbs))
        .max(walking_distance(board))
}
