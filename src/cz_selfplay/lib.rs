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

extern crate cz_mcts;
extern crate cz_nn;
extern crate cz_position;
extern crate cz_utils;

pub mod chunk;
pub mod game;
pub mod record;
pub mod tournament;

pub use self::game::{Game, GameOptions, Player};
pub use self::record::TrainingRecord;
pub use self::tournament::{
    GameCallbacks, NullGameCallbacks, NullTournamentCallbacks, ResultsMatrix, Tournament,
    TournamentCallbacks, TournamentOptions
};
