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

extern crate cz_nn;
extern crate cz_position;
extern crate cz_utils;

pub mod choose;
pub mod dirichlet;
pub mod game_result;
pub mod node;
pub mod search;
pub mod time_control;

pub use self::game_result::GameResult;
pub use self::node::{Leaf, Node, NodeTree};
pub use self::search::{Callbacks, NullCallbacks, Search, SearchOptions, ThinkingInfo, ThinkingLine};
pub use self::time_control::{Clock, Combined, Infinite, MoveTime, NodeLimit, TimeStrategy};
