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

//! Drives one self-play game to completion: two `Search` instances, one
//! per side, each with its own reused `NodeTree`, alternate moves against
//! a shared `NNCache`/`Network`. Every move taken is recorded as a
//! training sample of the *pre-move* position; once the game ends every
//! sample is stamped with the final outcome from its own side-to-move
//! perspective.

use std::sync::Arc;

use rand::Rng;

use cz_mcts::{GameResult, NodeTree, NullCallbacks, Search, SearchOptions};
use cz_mcts::time_control::NodeLimit;
use cz_nn::{NNCache, Network};
use cz_position::{Color, Position, Terminal};

use crate::record::TrainingRecord;

#[derive(Clone, Copy, Debug)]
pub struct GameOptions {
    pub search_options: SearchOptions,
    pub num_threads: usize,
    pub node_budget: u64,
    pub initial_temperature: f32,
    pub tempdecay_moves: usize,
    pub resign_threshold: f32,
    pub resign_plies: usize,
    pub draw_threshold: f32,
    pub draw_plies: usize,
    /// Safety cap so a search with a buggy terminal check cannot spin
    /// forever; the game is adjudicated a draw if reached.
    pub max_plies: usize
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            search_options: SearchOptions::default(),
            num_threads: 16,
            node_budget: 800,
            initial_temperature: 1.0,
            tempdecay_moves: 30,
            resign_threshold: -0.9,
            resign_plies: 3,
            draw_threshold: 0.02,
            draw_plies: 10,
            max_plies: 512
        }
    }
}

/// One contestant: the network it plays with, the cache it evaluates
/// through, and the search parameters it is given. Plain self-play uses
/// the same `Player` on both sides of the board; `Tournament::new_match`
/// seats two distinct ones.
#[derive(Clone)]
pub struct Player {
    pub network: Arc<dyn Network>,
    pub cache: Arc<NNCache>,
    pub search_options: SearchOptions
}

impl Player {
    pub fn new(network: Arc<dyn Network>, cache: Arc<NNCache>, search_options: SearchOptions) -> Self {
        Self { network, cache, search_options }
    }
}

pub struct Game {
    player: Player,
    options: GameOptions,
    seed: u64
}

/// An in-progress sample, not yet stamped with a result.
struct PendingRecord {
    side_to_move: Color,
    planes: [u64; 104],
    policy: [f32; cz_position::MOVE_SPACE],
    castling: [bool; 4],
    rule50: u8
}

impl Game {
    pub fn new(network: Arc<dyn Network>, cache: Arc<NNCache>, options: GameOptions, seed: u64) -> Self {
        Self { player: Player::new(network, cache, options.search_options), options, seed }
    }

    /// Plays one game from the starting position and returns its training
    /// records (result already stamped) and final outcome.
    pub fn play(&self, rng: &mut impl Rng) -> (Vec<TrainingRecord>, GameResult) {
        play_game(&self.player, &self.player, &self.options, self.seed, rng)
    }
}

/// Drives one game between `white` and `black` to completion: each side
/// keeps its own reused `NodeTree` (`Tournament`'s two contestants have
/// distinct networks, so a shared tree would mix their statistics; plain
/// self-play just passes the same `Player` for both and still benefits
/// from the same per-side reuse). Every move played is recorded as a
/// training sample of the *pre-move* position; samples are stamped with
/// the final outcome, from their own side-to-move's perspective, only
/// once the result is known.
pub fn play_game(white: &Player, black: &Player, options: &GameOptions, seed: u64, rng: &mut impl Rng) -> (Vec<TrainingRecord>, GameResult) {
    let white_tree = Arc::new(NodeTree::new_root(Position::startpos()));
    let black_tree = Arc::new(NodeTree::new_root(Position::startpos()));
    let mut pending: Vec<PendingRecord> = Vec::new();
    let mut ply = 0usize;
    let mut resign_run = 0usize;
    let mut draw_run = 0usize;

    let result = loop {
        let position = if ply % 2 == 0 { white_tree.root_position() } else { black_tree.root_position() };

        if let Some(terminal) = position.terminal() {
            break terminal_to_result(position.side_to_move(), terminal);
        }

        if ply >= options.max_plies {
            break GameResult::Draw;
        }

        let (tree, player) = if position.side_to_move() == Color::White { (&white_tree, white) } else { (&black_tree, black) };
        let move_seed = seed.wrapping_add(ply as u64).wrapping_mul(0x9E3779B97F4A7C15);
        let search = Search::new(tree.clone(), player.cache.clone(), player.network.clone(), player.search_options, move_seed);

        search.start_threads(options.num_threads, Arc::new(NodeLimit::new(options.node_budget)), Arc::new(NullCallbacks));

        let temperature = if ply < options.tempdecay_moves { options.initial_temperature } else { 0.0 };
        let mv = match search.join(temperature, rng) {
            Some(mv) => mv,
            None => break terminal_to_result(position.side_to_move(), position.terminal().unwrap_or(Terminal::Draw))
        };

        let visits = search.root_children_by_visits();
        let root_q = tree.with_node(tree.root(), |n| n.own_q());

        pending.push(PendingRecord {
            side_to_move: position.side_to_move(),
            planes: cz_position::features::history_bitboards(&tree.history(tree.root())),
            policy: TrainingRecord::policy_from_visits(&visits, position.side_to_move()),
            castling: castling_bits(&position),
            rule50: position.halfmove_clock()
        });

        if root_q <= options.resign_threshold as f64 {
            resign_run += 1;
        } else {
            resign_run = 0;
        }

        if root_q.abs() < options.draw_threshold as f64 {
            draw_run += 1;
        } else {
            draw_run = 0;
        }

        if resign_run >= options.resign_plies {
            // the side to move is resigning: they lose.
            break if position.side_to_move() == Color::White { GameResult::BlackWins } else { GameResult::WhiteWins };
        }

        if draw_run >= options.draw_plies {
            break GameResult::Draw;
        }

        white_tree.promote_to_root(mv);
        black_tree.promote_to_root(mv);
        ply += 1;
    };

    let records = pending.into_iter()
        .map(|p| TrainingRecord {
            policy: p.policy,
            planes: p.planes,
            castling: p.castling,
            side_to_move: p.side_to_move,
            rule50: p.rule50,
            result: result.value_for(p.side_to_move)
        })
        .collect();

    (records, result)
}

fn castling_bits(position: &Position) -> [bool; 4] {
    let c = position.castling();

    [c.white_king, c.white_queen, c.black_king, c.black_queen]
}

fn terminal_to_result(stm: Color, terminal: Terminal) -> GameResult {
    match (terminal, stm) {
        (Terminal::Draw, _) => GameResult::Draw,
        (Terminal::Win, Color::White) => GameResult::WhiteWins,
        (Terminal::Win, Color::Black) => GameResult::BlackWins,
        (Terminal::Loss, Color::White) => GameResult::BlackWins,
        (Terminal::Loss, Color::Black) => GameResult::WhiteWins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_nn::backends::reference::ReferenceNetwork;
    use cz_nn::loader::Weights;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network() -> Arc<dyn Network> {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });

        Arc::new(ReferenceNetwork::new(weights, cz_position::features::SEARCH_PLANES * cz_position::features::PLANE_SIZE))
    }

    #[test]
    fn a_short_game_produces_one_record_per_move() {
        let mut options = GameOptions::default();
        options.node_budget = 20;
        options.num_threads = 1;
        options.max_plies = 6;

        let game = Game::new(network(), Arc::new(NNCache::with_capacity(10_000)), options, 1);
        let mut rng = StdRng::seed_from_u64(0);

        let (records, result) = game.play(&mut rng);

        assert_eq!(records.len(), 6);

        for record in &records {
            assert_eq!(record.result, result.value_for(record.side_to_move));
        }
    }

    #[test]
    fn every_record_result_matches_its_own_perspective() {
        let mut options = GameOptions::default();
        options.node_budget = 10;
        options.num_threads = 1;
        options.max_plies = 4;

        let game = Game::new(network(), Arc::new(NNCache::with_capacity(10_000)), options, 42);
        let mut rng = StdRng::seed_from_u64(7);

        let (records, result) = game.play(&mut rng);

        for record in &records {
            match record.side_to_move {
                Color::White => assert_eq!(record.result, result.value_for(Color::White)),
                Color::Black => assert_eq!(record.result, result.value_for(Color::Black))
            }
        }
    }
}
