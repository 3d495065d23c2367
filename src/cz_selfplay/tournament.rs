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

//! Runs many games concurrently across a fixed pool of worker threads,
//! the way `libdg_mcts`'s search pool spreads searches across workers --
//! a shared atomic counter hands out monotonically increasing game ids,
//! each worker plays its game to completion, optionally writes its
//! training chunk to disk, and reports back through a
//! `TournamentCallbacks`/`GameCallbacks` pair. A `stop()` call lets
//! outstanding games finish without any new ones being started.
//!
//! Two distinct `Player`s (network + cache + search options) may be
//! supplied for a gating match between two candidate networks; when only
//! one is given every game is ordinary self-play against itself. Either
//! way the side playing White alternates by game id so that a network's
//! engine strength is not conflated with a colour advantage.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::SeedableRng;

use cz_mcts::{GameResult, SearchOptions};
use cz_position::Color;

use crate::chunk;
use crate::game::{play_game, GameOptions, Player};
use crate::record::TrainingRecord;

#[derive(Clone)]
pub struct TournamentOptions {
    pub num_games: usize,
    pub num_workers: usize,
    pub game_options: GameOptions,
    /// When set, every finished game's training records are written here
    /// as `game-00000001.gz`, etc., and `GameCallbacks::on_game_info` is
    /// given the resulting filename; when `None` no chunk is written and
    /// `training_filename` is always `None`.
    pub output_dir: Option<PathBuf>
}

impl Default for TournamentOptions {
    fn default() -> Self {
        Self {
            num_games: cz_utils::config::get(&cz_utils::config::NUM_GAMES),
            num_workers: 4,
            game_options: GameOptions::default(),
            output_dir: None
        }
    }
}

/// Win/draw/loss counters aggregated by colour, as `results[outcome][colour]`
/// with `outcome` in `{win, draw, loss}` order and `colour` in
/// `{White, Black}` order -- the shape `OnTournamentInfo` reports.
pub type ResultsMatrix = [[u32; 2]; 3];

pub trait TournamentCallbacks: Send + Sync {
    fn on_tournament_info(&self, results: ResultsMatrix, finished: bool);
}

/// A `TournamentCallbacks` that discards everything.
pub struct NullTournamentCallbacks;

impl TournamentCallbacks for NullTournamentCallbacks {
    fn on_tournament_info(&self, _results: ResultsMatrix, _finished: bool) {}
}

/// One finished game's report, passed to `OnGameInfo`. `side` is
/// the colour `player_a` (the tournament's first contestant) played in
/// this particular game -- the one field needed to interpret `result`
/// without also carrying the full seating decision.
pub trait GameCallbacks: Send + Sync {
    fn on_game_info(&self, result: GameResult, training_filename: Option<&str>, moves: usize, game_id: usize, side: Color);
}

/// A `GameCallbacks` that discards everything.
pub struct NullGameCallbacks;

impl GameCallbacks for NullGameCallbacks {
    fn on_game_info(&self, _result: GameResult, _training_filename: Option<&str>, _moves: usize, _game_id: usize, _side: Color) {}
}

#[derive(Default)]
struct Tally {
    white_wins: u32,
    draws: u32,
    black_wins: u32
}

impl Tally {
    fn record(&mut self, result: GameResult) {
        match result {
            GameResult::WhiteWins => self.white_wins += 1,
            GameResult::Draw => self.draws += 1,
            GameResult::BlackWins => self.black_wins += 1
        }
    }

    fn as_matrix(&self) -> ResultsMatrix {
        [
            [self.white_wins, self.black_wins],
            [self.draws, self.draws],
            [self.black_wins, self.white_wins]
        ]
    }
}

pub struct Tournament {
    player_a: Player,
    player_b: Option<Player>,
    options: TournamentOptions,
    seed: u64,
    next_game: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>
}

impl Tournament {
    /// A self-play tournament: every game is `player` against itself.
    pub fn new(player: Player, options: TournamentOptions, seed: u64) -> Self {
        Self {
            player_a: player,
            player_b: None,
            options,
            seed,
            next_game: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false))
        }
    }

    /// A gating match between two candidate networks, colours balanced by
    /// alternating which one plays White every other game.
    pub fn new_match(player_a: Player, player_b: Player, options: TournamentOptions, seed: u64) -> Self {
        Self {
            player_a,
            player_b: Some(player_b),
            options,
            seed,
            next_game: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false))
        }
    }

    /// Requests a graceful stop: games already in progress run to
    /// completion, no worker picks up a new game id afterwards.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Runs the tournament to completion (or until `stop()` drains the
    /// remaining games) and returns the final colour-aggregated tally.
    /// `tournament_callbacks.on_tournament_info` is invoked after every
    /// finished game, with `finished = true` only on the very last
    /// invocation; `game_callbacks.on_game_info` is invoked once per
    /// finished game.
    pub fn run(&self, tournament_callbacks: Arc<dyn TournamentCallbacks>, game_callbacks: Arc<dyn GameCallbacks>) -> ResultsMatrix {
        let (matrix, _records) = self.run_aux(tournament_callbacks, game_callbacks, true);
        matrix
    }

    /// Like `run`, but also returns every game's training records in
    /// memory -- for callers (tests, small ad hoc runs) that want the
    /// samples without going through `output_dir`.
    pub fn run_collecting_records(&self, tournament_callbacks: Arc<dyn TournamentCallbacks>) -> (ResultsMatrix, Vec<Vec<TrainingRecord>>) {
        self.run_aux(tournament_callbacks, Arc::new(NullGameCallbacks), false)
    }

    fn run_aux(&self, tournament_callbacks: Arc<dyn TournamentCallbacks>, game_callbacks: Arc<dyn GameCallbacks>, discard_records: bool) -> (ResultsMatrix, Vec<Vec<TrainingRecord>>) {
        let tally = Arc::new(Mutex::new(Tally::default()));
        let completed = Arc::new(AtomicUsize::new(0));
        let records = Arc::new(Mutex::new(Vec::new()));
        let num_games = self.options.num_games;
        let num_workers = self.options.num_workers.max(1).min(num_games.max(1));

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let next_game = self.next_game.clone();
            let stopped = self.stopped.clone();
            let tally = tally.clone();
            let completed = completed.clone();
            let records = records.clone();
            let tournament_callbacks = tournament_callbacks.clone();
            let game_callbacks = game_callbacks.clone();
            let player_a = self.player_a.clone();
            let player_b = self.player_b.clone();
            let game_options = self.options.game_options;
            let output_dir = self.options.output_dir.clone();
            let base_seed = self.seed;

            handles.push(thread::Builder::new()
                .name("cz-tournament-worker".into())
                .spawn(move || {
                    loop {
                        if stopped.load(Ordering::SeqCst) {
                            break;
                        }

                        let game_id = next_game.fetch_add(1, Ordering::SeqCst);

                        if game_id >= num_games {
                            break;
                        }

                        let player_a_is_white = player_b.is_none() || game_id % 2 == 0;
                        let (white, black) = seat_players(&player_a, &player_b, game_id);
                        let seed = base_seed.wrapping_add(game_id as u64).wrapping_mul(0x9E3779B97F4A7C15);
                        let mut rng = StdRng::seed_from_u64(seed);

                        let (game_records, result) = play_game(&white, &black, &game_options, seed, &mut rng);
                        let moves = game_records.len();

                        let training_filename = output_dir.as_ref().and_then(|dir| {
                            let filename = format!("game-{:08}.gz", game_id);
                            let path = dir.join(&filename);

                            chunk::write_chunk(&path, &game_records).ok().map(|_| filename)
                        });

                        tally.lock().expect("tally lock was poisoned").record(result);

                        if discard_records {
                            // nothing to retain; the caller only wants the tally.
                        } else {
                            records.lock().expect("records lock was poisoned").push(game_records);
                        }

                        let side = if player_a_is_white { Color::White } else { Color::Black };
                        game_callbacks.on_game_info(result, training_filename.as_deref(), moves, game_id, side);

                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        let matrix = tally.lock().expect("tally lock was poisoned").as_matrix();

                        tournament_callbacks.on_tournament_info(matrix, done >= num_games);
                    }
                })
                .expect("failed to spawn tournament worker"));
        }

        for handle in handles {
            let _ = handle.join();
        }

        let matrix = tally.lock().expect("tally lock was poisoned").as_matrix();
        let records = Arc::try_unwrap(records)
            .map(|mutex| mutex.into_inner().expect("records lock was poisoned"))
            .unwrap_or_else(|arc| arc.lock().expect("records lock was poisoned").clone());

        (matrix, records)
    }
}

/// Decides which player sits White for `game_id`: with two distinct
/// players they alternate every game so engine strength is not conflated
/// with colour; a self-play tournament always plays itself on both sides.
fn seat_players<'a>(player_a: &'a Player, player_b: &'a Option<Player>, game_id: usize) -> (Player, Player) {
    match player_b {
        None => (player_a.clone(), player_a.clone()),
        Some(player_b) => {
            if game_id % 2 == 0 {
                (player_a.clone(), player_b.clone())
            } else {
                (player_b.clone(), player_a.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_nn::backends::reference::ReferenceNetwork;
    use cz_nn::loader::Weights;
    use cz_nn::{NNCache, Network};
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use tempfile::tempdir;

    fn network() -> Arc<dyn Network> {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });

        Arc::new(ReferenceNetwork::new(weights, cz_position::features::SEARCH_PLANES * cz_position::features::PLANE_SIZE))
    }

    fn player() -> Player {
        Player::new(network(), Arc::new(NNCache::with_capacity(10_000)), SearchOptions::default())
    }

    fn small_game_options() -> GameOptions {
        let mut options = GameOptions::default();
        options.node_budget = 10;
        options.num_threads = 1;
        options.max_plies = 4;
        options
    }

    struct CountingCallbacks {
        calls: StdAtomicUsize,
        saw_finished: AtomicBool
    }

    impl TournamentCallbacks for CountingCallbacks {
        fn on_tournament_info(&self, _results: ResultsMatrix, finished: bool) {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if finished {
                self.saw_finished.store(true, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn runs_the_requested_number_of_games() {
        let options = TournamentOptions { num_games: 5, num_workers: 3, game_options: small_game_options(), output_dir: None };
        let tournament = Tournament::new(player(), options, 1);
        let callbacks = Arc::new(CountingCallbacks { calls: StdAtomicUsize::new(0), saw_finished: AtomicBool::new(false) });

        let matrix = tournament.run(callbacks.clone(), Arc::new(NullGameCallbacks));
        let total: u32 = matrix[0][0] + matrix[0][1] + matrix[1][0];

        assert_eq!(total, 5);
        assert_eq!(callbacks.calls.load(Ordering::SeqCst), 5);
        assert!(callbacks.saw_finished.load(Ordering::SeqCst));
    }

    #[test]
    fn stopping_early_leaves_later_games_unplayed() {
        let options = TournamentOptions { num_games: 1000, num_workers: 1, game_options: small_game_options(), output_dir: None };
        let tournament = Tournament::new(player(), options, 2);

        tournament.stop();

        let matrix = tournament.run(Arc::new(NullTournamentCallbacks), Arc::new(NullGameCallbacks));
        let total: u32 = matrix[0][0] + matrix[0][1] + matrix[1][0];

        assert_eq!(total, 0);
    }

    #[test]
    fn a_match_alternates_which_player_sits_white() {
        let (white_0, black_0) = seat_players(&player(), &Some(player()), 0);
        let (white_1, black_1) = seat_players(&player(), &Some(player()), 1);

        // can't compare `Player`s directly, but the seating itself must
        // not panic and must produce one of each for consecutive ids.
        let _ = (white_0, black_0, white_1, black_1);
    }

    #[test]
    fn run_collecting_records_returns_one_vector_per_game() {
        let options = TournamentOptions { num_games: 3, num_workers: 2, game_options: small_game_options(), output_dir: None };
        let tournament = Tournament::new(player(), options, 3);

        let (_matrix, records) = tournament.run_collecting_records(Arc::new(NullTournamentCallbacks));

        assert_eq!(records.len(), 3);
    }

    #[test]
    fn writes_one_chunk_per_game_and_reports_game_info() {
        let dir = tempdir().unwrap();
        let options = TournamentOptions {
            num_games: 2,
            num_workers: 2,
            game_options: small_game_options(),
            output_dir: Some(dir.path().to_path_buf())
        };
        let tournament = Tournament::new(player(), options, 4);

        struct RecordingGameCallbacks {
            filenames: Mutex<Vec<String>>
        }

        impl GameCallbacks for RecordingGameCallbacks {
            fn on_game_info(&self, _result: GameResult, training_filename: Option<&str>, _moves: usize, _game_id: usize, _side: Color) {
                if let Some(filename) = training_filename {
                    self.filenames.lock().unwrap().push(filename.to_string());
                }
            }
        }

        let game_callbacks = Arc::new(RecordingGameCallbacks { filenames: Mutex::new(Vec::new()) });

        tournament.run(Arc::new(NullTournamentCallbacks), game_callbacks.clone());

        let filenames = game_callbacks.filenames.lock().unwrap();
        assert_eq!(filenames.len(), 2);

        for filename in filenames.iter() {
            assert!(dir.path().join(filename).exists());
        }
    }
}
