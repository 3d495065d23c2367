// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A thin CLI that wires the search core's callbacks to stdout: no UCI
//! parser lives here, just enough glue to drive one search, one self-play
//! game, or a small benchmark from the command line.

mod config_args;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use cz_mcts::time_control::{Combined, Infinite, MoveTime, NodeLimit, TimeStrategy};
use cz_mcts::{Callbacks, Search, SearchOptions, ThinkingInfo};
use cz_nn::backends::REGISTRY;
use cz_nn::loader::Weights;
use cz_nn::{NNCache, Network};
use cz_position::{Move, Position};
use cz_selfplay::{Game, GameOptions};
use cz_utils::config;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let rest = config_args::apply(&args);

    match rest.split_first() {
        Some((cmd, tail)) if cmd == "search" => run_search(tail),
        Some((cmd, tail)) if cmd == "selfplay" => run_selfplay(tail),
        Some((cmd, _)) if cmd == "bench" => run_bench(),
        _ => print_usage()
    }
}

fn print_usage() {
    eprintln!("usage: cz [--flag=value ...] <search [fen]|selfplay|bench>");
}

/// Builds the configured `Network`, reading `--weights`/`--backend` (or
/// their `CZ_WEIGHTS`/`CZ_BACKEND` environment equivalents) from
/// `cz_utils::config`. A startup error (bad weights file, unknown backend)
/// is fatal -- `run_search`/`run_selfplay`/`run_bench` never enter a search
/// with a half-initialized network.
fn network() -> Arc<dyn Network> {
    let weights = match config::get_string(&config::WEIGHTS) {
        Some(path) => Arc::new(Weights::load(Path::new(&path)).unwrap_or_else(|err| {
            eprintln!("cz: {}", err);
            std::process::exit(1);
        })),
        None => Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: Vec::new() })
    };

    let backend = config::get_string(&config::BACKEND);
    let boxed = REGISTRY.by_name(&backend, weights).unwrap_or_else(|err| {
        eprintln!("cz: {}", err);
        std::process::exit(1);
    });

    Arc::from(boxed)
}

/// Prints `OnThinkingInfo`/`OnBestMove` to stdout in a UCI-flavored, but
/// not UCI-conformant, line format -- this binary is for manual exercise,
/// not for talking to a GUI.
struct StdoutCallbacks;

impl Callbacks for StdoutCallbacks {
    fn on_best_move(&self, best_move: Option<Move>, _ponder: Option<Move>) {
        match best_move {
            Some(mv) => println!("bestmove {}", move_to_uci(mv)),
            None => println!("bestmove (none)")
        }
    }

    fn on_thinking_info(&self, info: ThinkingInfo) {
        for line in &info.lines {
            let pv: String = line.pv.iter().map(|&mv| move_to_uci(mv)).collect::<Vec<_>>().join(" ");

            println!(
                "info depth {} seldepth {} multipv {} time {} nodes {} nps {} hashfull {} score cp {} pv {}",
                info.depth, info.seldepth, line.multipv, info.time.as_millis(), info.nodes, info.nps,
                info.hashfull, line.score_cp, pv
            );
        }

        if let Some(comment) = &info.comment {
            println!("info string {}", comment);
        }
    }
}

fn move_to_uci(mv: Move) -> String {
    match mv.promotion {
        Some(promotion) => format!("{}{}{}", mv.from.to_algebraic(), mv.to.to_algebraic(), promotion.to_char()),
        None => format!("{}{}", mv.from.to_algebraic(), mv.to.to_algebraic())
    }
}

fn run_search(args: &[String]) {
    let fen = if args.is_empty() { None } else { Some(args.join(" ")) };
    let position = match &fen {
        Some(fen) => Position::from_fen(fen).unwrap_or_else(|| {
            eprintln!("cz: '{}' is not a valid FEN", fen);
            std::process::exit(1);
        }),
        None => Position::startpos()
    };

    let options = SearchOptions {
        cpuct: config::get(&config::CPUCT),
        fpu_reduction: config::get(&config::FPU_REDUCTION),
        policy_softmax_temp: config::get(&config::POLICY_SOFTMAX_TEMP),
        noise: config::get(&config::NOISE),
        multipv: config::get(&config::MULTIPV),
        verbose_move_stats: config::get(&config::VERBOSE_MOVE_STATS),
        minibatch_size: config::get(&config::MINIBATCH_SIZE),
        max_prefetch: config::get(&config::MAX_PREFETCH),
        ..SearchOptions::default()
    };

    let cache = Arc::new(NNCache::with_capacity(config::get(&config::CACHE_SIZE)));
    let tree = Arc::new(cz_mcts::NodeTree::new_root(position));
    let search = Search::new(tree, cache, network(), options, 1);

    let time_strategy: Arc<dyn TimeStrategy> = time_strategy_from_config();

    search.start_threads(config::get(&config::NUM_THREADS), time_strategy, Arc::new(StdoutCallbacks));

    let mut rng = StdRng::seed_from_u64(0);
    let best_move = search.join(config::get(&config::TEMPERATURE), &mut rng);

    StdoutCallbacks.on_best_move(best_move, None);
}

/// Combines whichever of `--nodes`/`--movetime-ms` the caller set; a
/// budget of zero means that strategy does not apply, and no budget at
/// all falls back to `Infinite` (an explicit `Stop()` is then the only
/// way the search ends).
fn time_strategy_from_config() -> Arc<dyn TimeStrategy> {
    let nodes = config::get(&config::NUM_NODES);
    let movetime_ms = config::get(&config::MOVETIME_MS);

    let mut strategies: Vec<Box<dyn TimeStrategy>> = Vec::new();

    if nodes > 0 {
        strategies.push(Box::new(NodeLimit::new(nodes as u64)));
    }

    if movetime_ms > 0 {
        strategies.push(Box::new(MoveTime::new(std::time::Duration::from_millis(movetime_ms))));
    }

    match strategies.len() {
        0 => Arc::new(Infinite),
        1 => Arc::from(strategies.pop().expect("length checked above")),
        _ => Arc::new(Combined(strategies))
    }
}

fn run_selfplay(_args: &[String]) {
    let mut options = GameOptions::default();
    options.num_threads = config::get(&config::NUM_THREADS);
    options.node_budget = config::get(&config::NUM_NODES) as u64;
    options.initial_temperature = config::get(&config::TEMPERATURE);
    options.tempdecay_moves = config::get(&config::TEMPDECAY_MOVES);
    options.resign_threshold = config::get(&config::RESIGN_THRESHOLD);
    options.resign_plies = config::get(&config::RESIGN_PLIES);
    options.draw_threshold = config::get(&config::DRAW_THRESHOLD);
    options.draw_plies = config::get(&config::DRAW_PLIES);

    let cache = Arc::new(NNCache::with_capacity(config::get(&config::CACHE_SIZE)));
    let game = Game::new(network(), cache, options, 1);
    let mut rng = StdRng::seed_from_u64(0);

    let started = Instant::now();
    let (records, result) = game.play(&mut rng);

    println!("result {:?}, {} plies, {:.1}s", result, records.len(), started.elapsed().as_secs_f64());
}

fn run_bench() {
    let cache = Arc::new(NNCache::with_capacity(config::get(&config::CACHE_SIZE)));
    let net = network();
    let position = Position::startpos();
    let tree = Arc::new(cz_mcts::NodeTree::new_root(position));
    let search = Search::new(tree, cache, net, SearchOptions::default(), 0);

    let started = Instant::now();
    search.start_threads(config::get(&config::NUM_THREADS), Arc::new(NodeLimit::new(5_000)), Arc::new(cz_mcts::NullCallbacks));

    let mut rng = StdRng::seed_from_u64(0);
    search.join(0.0, &mut rng);

    let elapsed = started.elapsed().as_secs_f64();
    let nodes = search.nodes_evaluated();

    println!("{} nodes in {:.2}s ({:.0} nodes/s)", nodes, elapsed, nodes as f64 / elapsed.max(1e-9));
}
