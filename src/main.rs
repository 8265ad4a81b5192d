/* main.rs
 *
 * Copyright 2026 emviolet
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 *
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::RngCore;

use slidethropic::engine::hinting;
use slidethropic::engine::pattern_db::{PatternDbArtifact, PatternDbSet, SetBuildOutcome};
use slidethropic::{AutoPlayDriver, Board, CancelToken, Engine};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Autosolver for N×N sliding-tile boards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scramble (or accept) a board and drive the auto-play loop to the end
    Solve {
        #[arg(long, default_value_t = 4)]
        dim: usize,
        /// Scramble seed; random when omitted
        #[arg(long)]
        seed: Option<u64>,
        /// Comma-separated tile values (0 for the blank) instead of a scramble
        #[arg(long)]
        board: Option<String>,
        /// Pattern-database artifact to load (4×4 only)
        #[arg(long)]
        pdb: Option<PathBuf>,
        #[arg(long, default_value_t = 1_000)]
        max_moves: usize,
        /// Print every intermediate board
        #[arg(long)]
        verbose: bool,
    },
    /// Suggest a single tile to move
    Hint {
        #[arg(long, default_value_t = 4)]
        dim: usize,
        #[arg(long)]
        board: String,
        #[arg(long)]
        pdb: Option<PathBuf>,
    },
    /// Precompute the 4×4 pattern databases and write them as JSON
    BuildPdb {
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_board(dim: usize, text: &str) -> Board {
    let tiles: Vec<u8> = text
        .split(',')
        .map(|cell| {
            cell.trim()
                .parse::<u8>()
                .unwrap_or_else(|_| panic!("invalid tile value {cell:?}"))
        })
        .collect();
    Board::from_tiles(dim, tiles).expect("invalid board")
}

fn load_pdbs(engine: &mut Engine, path: &PathBuf) {
    let json = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()));
    let artifact: PatternDbArtifact =
        serde_json::from_str(&json).expect("malformed pattern-database artifact");
    let set = PatternDbSet::from_artifact(artifact).expect("unusable pattern-database artifact");
    engine
        .install_pattern_dbs(set)
        .expect("artifact dimension does not match the board");
    println!("Loaded pattern databases from {}", path.display());
}

fn main() {
    match Cli::parse().command {
        Command::Solve {
            dim,
            seed,
            board,
            pdb,
            max_moves,
            verbose,
        } => {
            let mut board = match board {
                Some(text) => parse_board(dim, &text),
                None => {
                    let seed = seed.unwrap_or_else(|| rand::thread_rng().next_u64());
                    println!("Scramble seed: {seed}");
                    Board::scrambled(dim, seed)
                }
            };
            if !board.is_solvable() {
                eprintln!("Board is not solvable:\n{board}");
                std::process::exit(1);
            }
            let mut engine = Engine::new(dim);
            if let Some(path) = &pdb {
                load_pdbs(&mut engine, path);
            }
            println!("Start:\n{board}");

            let mut driver = AutoPlayDriver::new(engine, CancelToken::new());
            let mut moves = Vec::new();
            while let Some(value) = driver.next_move(&board).expect("board matches engine") {
                if !board.apply_value(value) {
                    panic!("engine proposed an illegal move: {value}");
                }
                moves.push(value);
                if verbose {
                    println!("Move {}: tile {value}\n{board}", moves.len());
                }
                if moves.len() >= max_moves {
                    break;
                }
            }

            if board.is_goal() {
                println!("Solved in {} moves:", moves.len());
                let rendered: Vec<String> = moves.iter().map(|v| v.to_string()).collect();
                println!("  {}", rendered.join(" "));
            } else {
                println!("Gave up after {} moves:\n{board}", moves.len());
            }
        }
        Command::Hint { dim, board, pdb } => {
            let board = parse_board(dim, &board);
            let mut engine = Engine::new(dim);
            if let Some(path) = &pdb {
                load_pdbs(&mut engine, path);
            }
            match hinting::hint_value(&engine, &board, None, &CancelToken::new())
                .expect("board matches engine")
            {
                Some(value) => println!("Hint: move tile {value}"),
                None => println!("Nothing to do."),
            }
        }
        Command::BuildPdb { out } => {
            println!("Building 4×4 pattern databases...");
            let SetBuildOutcome::Built(set) = PatternDbSet::build(4, &CancelToken::new()) else {
                panic!("pattern-database build did not complete");
            };
            let entries: usize = set.tables().iter().map(|table| table.len()).sum();
            let json = serde_json::to_string(&set.to_artifact()).expect("serialize artifact");
            fs::write(&out, json)
                .unwrap_or_else(|err| panic!("failed to write {}: {err}", out.display()));
            println!("Wrote {entries} entries to {}", out.display());
        }
    }
}
