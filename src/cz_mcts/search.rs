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

//! The search engine: a pool of worker threads descend `NodeTree` by PUCT
//! selection, batch the leaves they land on through a `CachingComputation`,
//! and backpropagate the result. A dedicated watchdog thread owns the stop
//! flag and the periodic `OnThinkingInfo` snapshot; workers only ever read
//! it.
//!
//! One caller thread calls `start_threads`, possibly later calls `stop` (or
//! `abort`) from somewhere else entirely (e.g. a UCI "stop" command handler
//! running on its own thread), and finally calls `join` to collect the best
//! move. This mirrors an async `StartThreads`/`Stop` surface rather than a
//! single blocking call.

use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cz_nn::{CachingComputation, NNCache, Network};
use cz_position::{features, Move};
use cz_utils::Error;

use crate::choose;
use crate::dirichlet;
use crate::node::{Leaf, NodeTree};
use crate::time_control::TimeStrategy;

/// Hard ceiling on arena size -- past this the search stops and reports
/// best-move-so-far rather than growing the tree without bound (the
/// "resource exhaustion" error kind).
const MAX_ARENA_NODES: usize = 20_000_000;

/// Workers poll the stop flag at this granularity; also the cadence at
/// which the watchdog re-checks time/node limits.
const WATCHDOG_TICK: Duration = Duration::from_millis(5);

/// `OnThinkingInfo` is reported at least once a second.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug)]
pub struct SearchOptions {
    pub cpuct: f32,
    pub fpu_reduction: f32,
    pub policy_softmax_temp: f32,
    pub noise: bool,
    pub noise_epsilon: f32,
    pub noise_alpha: f32,
    pub minibatch_size: usize,
    pub max_prefetch: usize,
    pub smart_pruning: bool,
    pub multipv: usize,
    pub verbose_move_stats: bool
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            cpuct: 2.5,
            fpu_reduction: 0.2,
            policy_softmax_temp: 1.0,
            noise: false,
            noise_epsilon: 0.25,
            noise_alpha: 0.3,
            minibatch_size: 256,
            max_prefetch: 32,
            smart_pruning: true,
            multipv: 1,
            verbose_move_stats: false
        }
    }
}

/// One line of a `verbose-move-stats`/`multipv` report.
#[derive(Clone, Debug, PartialEq)]
pub struct ThinkingLine {
    pub multipv: usize,
    pub score_cp: i32,
    pub pv: Vec<Move>
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThinkingInfo {
    pub depth: u32,
    pub seldepth: u32,
    pub time: Duration,
    pub nodes: u64,
    pub nps: u64,
    pub hashfull: u32,
    pub lines: Vec<ThinkingLine>,
    /// Per-root-child PUCT breakdown, present only when `verbose_move_stats`
    /// is set.
    pub comment: Option<String>
}

/// The outward-facing callbacks a `Search` drives. Only the two that
/// belong to one search are modelled here; `OnGameInfo` and
/// `OnTournamentInfo` are the self-play/tournament drivers' concern.
pub trait Callbacks: Send + Sync {
    fn on_best_move(&self, best_move: Option<Move>, ponder: Option<Move>);
    fn on_thinking_info(&self, info: ThinkingInfo);
}

/// A `Callbacks` that discards everything, for callers (self-play, tests)
/// that only want the returned move.
pub struct NullCallbacks;

impl Callbacks for NullCallbacks {
    fn on_best_move(&self, _best_move: Option<Move>, _ponder: Option<Move>) {}
    fn on_thinking_info(&self, _info: ThinkingInfo) {}
}

struct Shared {
    tree: Arc<NodeTree>,
    cache: Arc<NNCache>,
    network: Arc<dyn Network>,
    options: SearchOptions,
    stop: AtomicBool,
    abort: AtomicBool,
    error: Mutex<Option<Error>>,
    leaves_evaluated: AtomicU64,
    network_calls: AtomicU64,
    max_depth: AtomicU32,
    started_at: Mutex<Option<Instant>>
}

/// One search run against a `NodeTree`. Cheap to construct; the tree itself
/// carries the reusable statistics across moves (`NodeTree::promote_to_root`).
pub struct Search {
    shared: Arc<Shared>,
    seed: u64,
    handles: Mutex<Vec<JoinHandle<()>>>
}

impl Search {
    pub fn new(tree: Arc<NodeTree>, cache: Arc<NNCache>, network: Arc<dyn Network>, options: SearchOptions, seed: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                tree,
                cache,
                network,
                options,
                stop: AtomicBool::new(false),
                abort: AtomicBool::new(false),
                error: Mutex::new(None),
                leaves_evaluated: AtomicU64::new(0),
                network_calls: AtomicU64::new(0),
                max_depth: AtomicU32::new(0),
                started_at: Mutex::new(None)
            }),
            seed,
            handles: Mutex::new(Vec::new())
        }
    }

    pub fn tree(&self) -> &Arc<NodeTree> {
        &self.shared.tree
    }

    /// Leaves evaluated so far -- the `nodes` budget counts every leaf
    /// reached, including cache hits (see DESIGN.md).
    pub fn nodes_evaluated(&self) -> u64 {
        self.shared.leaves_evaluated.load(Ordering::Acquire)
    }

    /// Network calls made so far -- the `playouts` budget counts only
    /// actual NN forward passes, not cache hits (see DESIGN.md).
    pub fn network_calls(&self) -> u64 {
        self.shared.network_calls.load(Ordering::Acquire)
    }

    pub fn error(&self) -> Option<Error> {
        self.shared.error.lock().expect("search error lock was poisoned").clone()
    }

    /// Requests an orderly stop: workers finish their current iteration and
    /// exit, `join` still reports a best move.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// Like `stop`, but `join` reports no best move -- for a caller that is
    /// discarding the search outright (e.g. the position changed underneath
    /// it).
    pub fn abort(&self) {
        self.shared.abort.store(true, Ordering::Release);
        self.stop();
    }

    pub fn abort_and_wait(&self) {
        self.abort();

        for handle in self.handles.lock().expect("search handle lock was poisoned").drain(..) {
            let _ = handle.join();
        }
    }

    /// Spawns `num_threads` search workers plus one watchdog thread that
    /// owns `time_strategy` and periodically emits `OnThinkingInfo` through
    /// `callbacks`.
    pub fn start_threads(&self, num_threads: usize, time_strategy: Arc<dyn TimeStrategy>, callbacks: Arc<dyn Callbacks>) {
        assert!(num_threads > 0, "a search needs at least one worker thread");

        self.shared.stop.store(false, Ordering::Release);
        self.shared.abort.store(false, Ordering::Release);
        *self.shared.started_at.lock().expect("search start-time lock was poisoned") = Some(Instant::now());

        let mut handles = self.handles.lock().expect("search handle lock was poisoned");

        for i in 0..num_threads {
            let shared = self.shared.clone();
            let seed = self.seed.wrapping_add(i as u64).wrapping_add(1);

            handles.push(thread::Builder::new()
                .name(format!("search-worker-{}", i))
                .spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    worker_loop(&shared, &mut rng);
                })
                .expect("failed to spawn search worker thread"));
        }

        let shared = self.shared.clone();

        handles.push(thread::Builder::new()
            .name("search-watchdog".into())
            .spawn(move || watchdog_loop(&shared, &*time_strategy, &*callbacks))
            .expect("failed to spawn search watchdog thread"));
    }

    /// Blocks until every worker and the watchdog have stopped, then picks a
    /// move from the root's visit distribution (or `None` for a terminal
    /// root with no legal moves, or an aborted search).
    pub fn join(&self, temperature: f32, rng: &mut impl Rng) -> Option<Move> {
        for handle in self.handles.lock().expect("search handle lock was poisoned").drain(..) {
            let _ = handle.join();
        }

        if self.shared.abort.load(Ordering::Acquire) {
            return None;
        }

        let visits = self.shared.tree.root_children_by_visits();

        if visits.is_empty() {
            return None;
        }

        Some(choose::select(&visits, temperature, rng))
    }

    pub fn root_children_by_visits(&self) -> Vec<(Move, u32, f64)> {
        self.shared.tree.root_children_by_visits()
    }
}

fn worker_loop(shared: &Arc<Shared>, rng: &mut StdRng) {
    loop {
        if shared.stop.load(Ordering::Acquire) {
            return;
        }

        if shared.tree.len() >= MAX_ARENA_NODES {
            *shared.error.lock().expect("search error lock was poisoned") = Some(Error::ResourceExhausted);
            shared.stop.store(true, Ordering::Release);
            return;
        }

        if let Err(err) = run_one_iteration(shared, rng) {
            *shared.error.lock().expect("search error lock was poisoned") = Some(err);
            shared.stop.store(true, Ordering::Release);
            return;
        }
    }
}

/// One PUCT descent: selects a leaf, gathers it (plus speculative prefetch
/// leaves) into one NN batch, expands and backs up the result.
fn run_one_iteration(shared: &Arc<Shared>, rng: &mut StdRng) -> Result<(), Error> {
    let options = &shared.options;

    match shared.tree.select_leaf(options.cpuct, options.fpu_reduction) {
        Leaf::Terminal { path, value } => {
            shared.max_depth.fetch_max(path.len() as u32, Ordering::AcqRel);
            shared.tree.backup_path(&path, value);
            shared.leaves_evaluated.fetch_add(1, Ordering::AcqRel);

            Ok(())
        },
        Leaf::Unexpanded { path, node } => {
            shared.max_depth.fetch_max(path.len() as u32, Ordering::AcqRel);

            let mut cc = CachingComputation::new(&shared.cache, shared.network.new_computation(), options.policy_softmax_temp);
            let primary = add_leaf_to_batch(&shared.tree, &mut cc, node);
            let mut prefetched: Vec<Vec<usize>> = Vec::new();

            // speculative leaves: primed into the cache, never expanded
            // here (speculative prefetch -- they populate the cache so
            // that whichever of these the *next* real descent lands on is
            // already resolved). `node` itself is still unexpanded at this
            // point, so a re-descent can land back on it (or on a leaf
            // already queued this iteration) -- most obviously when `node`
            // is the root of a fresh search and has no siblings to diverge
            // into yet. Virtual loss does not always break the tie, so
            // treat a repeat the same as exhausting the tree: undo it and
            // stop, rather than loop until `max_prefetch` on one duplicate.
            while cc.len() < options.minibatch_size && prefetched.len() < options.max_prefetch {
                match shared.tree.select_leaf(options.cpuct, options.fpu_reduction) {
                    Leaf::Terminal { path: pf_path, .. } => {
                        shared.tree.undo_virtual_loss(&pf_path);
                        break;
                    },
                    Leaf::Unexpanded { path: pf_path, node: pf_node } => {
                        let already_queued = pf_node == node
                            || prefetched.iter().any(|p: &Vec<usize>| p.last() == Some(&pf_node));

                        if already_queued {
                            shared.tree.undo_virtual_loss(&pf_path);
                            break;
                        }

                        add_leaf_to_batch(&shared.tree, &mut cc, pf_node);
                        prefetched.push(pf_path);
                    }
                }
            }

            let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| cc.compute_blocking()));

            for pf_path in &prefetched {
                shared.tree.undo_virtual_loss(pf_path);
            }

            if outcome.is_err() {
                shared.tree.undo_virtual_loss(&path);
                return Err(Error::Network("NN backend panicked during compute_blocking".to_string()));
            }

            shared.network_calls.fetch_add(1, Ordering::AcqRel);

            let stm = shared.tree.with_node(node, |n| n.position().side_to_move());
            let legal = shared.tree.with_node(node, |n| n.position().legal_moves());
            let mut priors: Vec<(Move, f32)> = legal.iter()
                .map(|&mv| (mv, cc.get_p(primary, mv.to_index(stm))))
                .collect();

            if options.noise && node == shared.tree.root() {
                apply_root_noise(&mut priors, options.noise_alpha, options.noise_epsilon, rng);
            }

            shared.tree.expand(node, &priors);

            let value = cc.get_q(primary) as f64;
            shared.tree.backup_path(&path, value);
            shared.leaves_evaluated.fetch_add(1, Ordering::AcqRel);

            Ok(())
        }
    }
}

fn add_leaf_to_batch(tree: &NodeTree, cc: &mut CachingComputation, node: usize) -> usize {
    let history = tree.history(node);
    let planes = features::search_planes(&history);
    let hash = tree.with_node(node, |n| n.position().hash());
    let stm = tree.with_node(node, |n| n.position().side_to_move());
    let legal = tree.with_node(node, |n| n.position().legal_moves());
    let relevant_moves: Vec<u16> = legal.iter().map(|&mv| mv.to_index(stm)).collect();

    cc.add_input(hash, &planes, &relevant_moves)
}

fn apply_root_noise(priors: &mut [(Move, f32)], alpha: f32, epsilon: f32, rng: &mut impl Rng) {
    let noise = dirichlet::sample(rng, priors.len(), alpha);
    let mut values: Vec<f32> = priors.iter().map(|&(_, p)| p).collect();

    dirichlet::mix(&mut values, &noise, epsilon);

    for (slot, value) in priors.iter_mut().zip(values) {
        slot.1 = value;
    }
}

fn watchdog_loop(shared: &Arc<Shared>, time_strategy: &dyn TimeStrategy, callbacks: &dyn Callbacks) {
    let start = shared.started_at.lock().expect("search start-time lock was poisoned")
        .expect("watchdog started before start_threads recorded a start time");
    let root = shared.tree.root();
    let root_is_single_move = shared.tree.with_node(root, |n| n.position().legal_moves().len() == 1);
    let mut last_report = Instant::now();

    loop {
        thread::sleep(WATCHDOG_TICK);

        let elapsed = start.elapsed();
        let nodes = shared.leaves_evaluated.load(Ordering::Acquire);
        // either the root position itself admits no further play, or the
        // tree has proven a forced win/loss from it several plies deep
        // (spec.md §4.5's fourth termination condition).
        let proven = shared.tree.with_node(root, |n| n.terminal().is_some() || n.proven().is_some());
        let pruned = shared.options.smart_pruning && root_is_single_move && nodes >= 1;
        let should_stop = shared.stop.load(Ordering::Acquire)
            || time_strategy.is_expired(elapsed, nodes)
            || proven
            || pruned;

        if should_stop {
            shared.stop.store(true, Ordering::Release);
            break;
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            emit_thinking_info(shared, elapsed, nodes, callbacks);
            last_report = Instant::now();
        }
    }

    emit_thinking_info(shared, start.elapsed(), shared.leaves_evaluated.load(Ordering::Acquire), callbacks);
}

fn emit_thinking_info(shared: &Shared, elapsed: Duration, nodes: u64, callbacks: &dyn Callbacks) {
    let visits = shared.tree.root_children_by_visits();
    let pv = shared.tree.principal_variation(64);
    let seldepth = shared.max_depth.load(Ordering::Acquire);
    let depth = pv.len() as u32;
    let nps = if elapsed.as_secs_f64() > 0.0 { (nodes as f64 / elapsed.as_secs_f64()) as u64 } else { 0 };
    let hashfull = shared.cache.hashfull();
    let multipv = shared.options.multipv.max(1);

    let lines: Vec<ThinkingLine> = visits.iter()
        .take(multipv)
        .enumerate()
        .map(|(rank, &(mv, _, q))| {
            let line_pv = if rank == 0 { pv.clone() } else { vec![mv] };

            ThinkingLine { multipv: rank + 1, score_cp: cp_from_q(q as f32), pv: line_pv }
        })
        .collect();

    let comment = if shared.options.verbose_move_stats {
        Some(move_stats_comment(&visits))
    } else {
        None
    };

    callbacks.on_thinking_info(ThinkingInfo { depth, seldepth, time: elapsed, nodes, nps, hashfull, lines, comment });
}

/// Centipawn conversion used by Leela-family engines:
/// `cp = 290 * tan(1.56 * q)`.
fn cp_from_q(q: f32) -> i32 {
    (290.0 * (1.56 * q as f64).tan()).round() as i32
}

fn move_stats_comment(visits: &[(Move, u32, f64)]) -> String {
    visits.iter()
        .map(|&(mv, n, q)| format!("{} n={} q={:.3}", move_to_uci(mv), n, q))
        .collect::<Vec<_>>()
        .join(" ")
}

fn move_to_uci(mv: Move) -> String {
    match mv.promotion {
        Some(promotion) => format!("{}{}{}", mv.from.to_algebraic(), mv.to.to_algebraic(), promotion.to_char()),
        None => format!("{}{}", mv.from.to_algebraic(), mv.to.to_algebraic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_nn::backends::reference::ReferenceNetwork;
    use cz_nn::loader::Weights;
    use cz_position::Position;
    use rand::rngs::StdRng as TestRng;
    use std::sync::Arc as StdArc;

    fn network() -> StdArc<dyn Network> {
        let weights = StdArc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });

        StdArc::new(ReferenceNetwork::new(weights, features::SEARCH_PLANES * features::PLANE_SIZE))
    }

    #[test]
    fn a_short_search_returns_a_legal_move() {
        let tree = Arc::new(NodeTree::new_root(Position::startpos()));
        let cache = Arc::new(NNCache::with_capacity(1_000));
        let search = Search::new(tree.clone(), cache, network(), SearchOptions::default(), 1);

        search.start_threads(1, Arc::new(crate::time_control::NodeLimit::new(50)), Arc::new(NullCallbacks));

        let mut rng = TestRng::seed_from_u64(0);
        let mv = search.join(0.0, &mut rng).expect("startpos always has a legal move");

        assert!(Position::startpos().legal_moves().contains(&mv));
    }

    #[test]
    fn terminal_root_returns_no_move() {
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let tree = Arc::new(NodeTree::new_root(pos));
        let cache = Arc::new(NNCache::with_capacity(16));
        let search = Search::new(tree, cache, network(), SearchOptions::default(), 1);

        search.start_threads(1, Arc::new(crate::time_control::NodeLimit::new(10)), Arc::new(NullCallbacks));

        let mut rng = TestRng::seed_from_u64(0);
        assert_eq!(search.join(0.0, &mut rng), None);
    }

    #[test]
    fn single_legal_move_with_smart_pruning_stops_after_one_visit() {
        // a position with exactly one legal move: the king has to step out
        // of check, every other square is covered.
        let pos = Position::from_fen("7k/8/6K1/8/8/8/8/6R1 b - - 0 1").unwrap();
        assert_eq!(pos.legal_moves().len(), 1);

        let tree = Arc::new(NodeTree::new_root(pos));
        let cache = Arc::new(NNCache::with_capacity(16));
        let mut options = SearchOptions::default();
        options.smart_pruning = true;

        let search = Search::new(tree.clone(), cache, network(), options, 1);
        search.start_threads(1, Arc::new(crate::time_control::NodeLimit::new(800)), Arc::new(NullCallbacks));

        let mut rng = TestRng::seed_from_u64(0);
        search.join(0.0, &mut rng);

        assert_eq!(search.nodes_evaluated(), 1);
    }

    #[test]
    fn virtual_loss_returns_to_zero_after_the_search_ends() {
        let tree = Arc::new(NodeTree::new_root(Position::startpos()));
        let cache = Arc::new(NNCache::with_capacity(10_000));
        let search = Search::new(tree.clone(), cache, network(), SearchOptions::default(), 7);

        search.start_threads(4, Arc::new(crate::time_control::NodeLimit::new(400)), Arc::new(NullCallbacks));

        let mut rng = TestRng::seed_from_u64(0);
        search.join(0.0, &mut rng);

        tree.with_node(tree.root(), |n| assert_eq!(n.nif(), 0));
    }

    #[test]
    fn single_threaded_deterministic_search_is_reproducible() {
        let run = || {
            let tree = Arc::new(NodeTree::new_root(Position::startpos()));
            let cache = Arc::new(NNCache::with_capacity(10_000));
            let search = Search::new(tree.clone(), cache, network(), SearchOptions::default(), 42);

            search.start_threads(1, Arc::new(crate::time_control::NodeLimit::new(200)), Arc::new(NullCallbacks));

            let mut rng = TestRng::seed_from_u64(0);
            let mv = search.join(0.0, &mut rng);
            let visits = tree.root_children_by_visits();

            (mv, visits)
        };

        let (mv_a, visits_a) = run();
        let (mv_b, visits_b) = run();

        assert_eq!(mv_a, mv_b);
        assert_eq!(visits_a, visits_b);
    }

    #[test]
    fn prefetch_does_not_spin_on_an_unexpanded_root() {
        // a fresh root has no children yet, so the very first iteration's
        // prefetch loop would previously re-select the still-unexpanded
        // root forever (duplicate leaves never raise `cc.len()` or
        // `prefetched.len()`, so the loop's own bound never fires).
        let tree = Arc::new(NodeTree::new_root(Position::startpos()));
        let cache = Arc::new(NNCache::with_capacity(1_000));
        let mut options = SearchOptions::default();
        options.minibatch_size = 32;
        options.max_prefetch = 32;

        let search = Search::new(tree, cache, network(), options, 1);

        search.start_threads(1, Arc::new(crate::time_control::NodeLimit::new(20)), Arc::new(NullCallbacks));

        let mut rng = TestRng::seed_from_u64(0);
        let mv = search.join(0.0, &mut rng);

        assert!(mv.is_some());
    }
}
