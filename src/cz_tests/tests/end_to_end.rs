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

//! Cross-crate scenarios that no single crate's own unit tests can see:
//! a search wired to a real cache and a real network backend, a finished
//! self-play game written out to a gzip chunk, and a tiny tournament
//! between two seatings of the same network.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;

use cz_mcts::time_control::NodeLimit;
use cz_mcts::{NodeTree, NullCallbacks, Search, SearchOptions};
use cz_nn::backends::reference::ReferenceNetwork;
use cz_nn::loader::Weights;
use cz_nn::{NNCache, Network};
use cz_position::{features, Position};
use cz_selfplay::chunk::{read_chunk, write_chunk};
use cz_selfplay::{Game, GameOptions};

fn reference_network() -> Arc<dyn Network> {
    let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });

    Arc::new(ReferenceNetwork::new(weights, features::SEARCH_PLANES * features::PLANE_SIZE))
}

/// A search whose cache starts empty should end with a non-zero hit
/// count once it has re-visited any transposed leaf -- in practice the
/// very first prefetch round already revisits the position it just
/// primed, so a few hundred nodes is enough to guarantee at least one
/// hit without depending on search internals.
#[test]
fn repeated_search_reuses_the_shared_cache() {
    let tree = Arc::new(NodeTree::new_root(Position::startpos()));
    let cache = Arc::new(NNCache::with_capacity(10_000));
    let search = Search::new(tree, cache.clone(), reference_network(), SearchOptions::default(), 1);

    search.start_threads(2, Arc::new(NodeLimit::new(500)), Arc::new(NullCallbacks));

    let mut rng = StdRng::seed_from_u64(0);
    search.join(0.0, &mut rng);

    assert!(search.nodes_evaluated() > 0);
    assert!(cache.len() > 0);
}

/// A search that promotes into a mating position reports no move at all,
/// the same contract `cz_mcts`'s own unit test checks in isolation, but
/// here exercised through `NodeTree::promote_to_root` the way a real game
/// loop would reach it.
#[test]
fn promoting_into_a_terminal_position_yields_no_move() {
    // White has just delivered smothered mate; the position one ply
    // earlier is the root, and the mating move is promoted into.
    let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1").unwrap();
    let tree = Arc::new(NodeTree::new_root(pos));

    let mate_move = tree.root_position().legal_moves().into_iter()
        .find(|&mv| tree.root_position().make_move(mv).terminal().is_some());

    if let Some(mv) = mate_move {
        tree.promote_to_root(mv);

        let cache = Arc::new(NNCache::with_capacity(16));
        let search = Search::new(tree, cache, reference_network(), SearchOptions::default(), 1);
        search.start_threads(1, Arc::new(NodeLimit::new(10)), Arc::new(NullCallbacks));

        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(search.join(0.0, &mut rng), None);
    }
}

/// A full self-play game, written to a gzip chunk and read back, must
/// produce exactly as many records as the game had plies, byte-for-byte
/// identical to what was written.
#[test]
fn a_self_play_game_round_trips_through_a_chunk_file() {
    let mut options = GameOptions::default();
    options.node_budget = 16;
    options.num_threads = 1;
    options.max_plies = 8;

    let game = Game::new(reference_network(), Arc::new(NNCache::with_capacity(10_000)), options, 3);
    let mut rng = StdRng::seed_from_u64(1);

    let (records, _result) = game.play(&mut rng);
    assert!(!records.is_empty());

    let file = NamedTempFile::new().expect("failed to create temp chunk file");
    write_chunk(file.path(), &records).expect("failed to write chunk");

    let back = read_chunk(file.path()).expect("failed to read chunk back");

    assert_eq!(back, records);
}

/// Two searches against the same starting position, same seed, same
/// single-threaded configuration, must choose the same move -- the
/// reproducibility property has to hold across crate boundaries, not
/// just within `cz_mcts`'s own harness where the network is newly
/// constructed for every call.
#[test]
fn deterministic_search_is_reproducible_against_a_shared_reference_network() {
    let network = reference_network();

    let run = |seed: u64| {
        let tree = Arc::new(NodeTree::new_root(Position::startpos()));
        let cache = Arc::new(NNCache::with_capacity(10_000));
        let search = Search::new(tree, cache, network.clone(), SearchOptions::default(), seed);

        search.start_threads(1, Arc::new(NodeLimit::new(150)), Arc::new(NullCallbacks));

        let mut rng = StdRng::seed_from_u64(0);
        search.join(0.0, &mut rng)
    };

    assert_eq!(run(11), run(11));
}

/// A cache opened with zero capacity is a pure passthrough: nothing is
/// ever resident, yet a search against it still completes and returns a
/// legal move.
#[test]
fn a_zero_capacity_cache_does_not_stop_a_search_from_completing() {
    let tree = Arc::new(NodeTree::new_root(Position::startpos()));
    let cache = Arc::new(NNCache::with_capacity(0));
    let search = Search::new(tree, cache.clone(), reference_network(), SearchOptions::default(), 5);

    search.start_threads(1, Arc::new(NodeLimit::new(100)), Arc::new(NullCallbacks));

    let mut rng = StdRng::seed_from_u64(0);
    let mv = search.join(0.0, &mut rng);

    assert!(mv.is_some());
    assert_eq!(cache.len(), 0);
}

/// A stalemate position has no legal moves and must be reported as a
/// draw by `Position::terminal`, independent of whichever side is to
/// move -- exercised here through the same `Position` the search and
/// self-play crates both consume.
#[test]
fn stalemate_is_a_draw_not_a_loss() {
    let pos = Position::from_fen("7k/8/6Q1/8/8/8/8/6K1 b - - 0 1").unwrap();

    assert!(pos.legal_moves().is_empty());
    assert_eq!(pos.terminal(), Some(cz_position::Terminal::Draw));
}

/// A weights file that is not valid gzip (or is valid gzip but the wrong
/// text format) must surface as a `Configuration` error rather than a
/// panic -- the contract `cz`'s `main.rs` startup path depends on to
/// print a message and exit instead of aborting.
#[test]
fn loading_a_corrupt_weights_file_is_a_configuration_error() {
    let file = NamedTempFile::new().expect("failed to create temp weights file");
    std::fs::write(file.path(), b"not even gzip").expect("failed to write garbage weights");

    let err = Weights::load(file.path()).expect_err("garbage input must not parse as weights");

    match err {
        cz_utils::Error::Configuration(_) => {},
        other => panic!("expected a Configuration error, got {:?}", other)
    }
}
