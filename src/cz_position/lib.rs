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

//! Board state, legal moves, and the position hash -- the collaborator
//! the search core treats as an external rules engine, referenced only
//! through `Position`'s public methods.

#[macro_use] extern crate lazy_static;

mod attacks;
pub mod color;
pub mod features;
pub mod hash;
pub mod mv;
pub mod piece;
pub mod position;
pub mod square;
mod zobrist;

pub use self::color::Color;
pub use self::hash::Hash;
pub use self::mv::{Move, MOVE_SPACE};
pub use self::piece::{Piece, PieceType};
pub use self::position::{CastlingRights, Position, Terminal};
pub use self::square::Square;
