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

//! The 1858-entry move index space and its encode/decode table.
//!
//! This is *data*, not legality: the table enumerates every `(from, to)`
//! pair reachable by a queen or a knight from some square, plus the
//! underpromotion moves that a plain queen-move index cannot represent
//! (queen promotions reuse the plain move -- an implicit "promote to
//! queen" is assumed whenever a pawn reaches the back rank via a move
//! that is otherwise a queen move). The table is built once, in a fixed
//! deterministic order, and is shared by every `Position` implementation
//! so that policy vectors are comparable across collaborators.

use std::collections::HashMap;
use crate::color::Color;
use crate::piece::PieceType;
use crate::square::Square;

/// Size of the policy index space, fixed by the external training-chunk
/// format.
pub const MOVE_SPACE: usize = 1858;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>
}

impl Move {
    pub fn new(from: Square, to: Square, promotion: Option<PieceType>) -> Self {
        Self { from, to, promotion }
    }

    pub fn quiet(from: Square, to: Square) -> Self {
        Self::new(from, to, None)
    }

    /// The null move, used to represent "no legal move" at a terminal
    /// root.
    pub fn null() -> Self {
        Self::new(Square(0), Square(0), None)
    }

    pub fn is_null(self) -> bool {
        self.from == self.to && self.promotion.is_none()
    }

    /// Encodes this move into the `[0, MOVE_SPACE)` policy index, from
    /// `stm`'s perspective (the board is conceptually flipped for Black
    /// so that the index space is shared between both colors).
    pub fn to_index(self, stm: Color) -> u16 {
        let (from, to) = self.perspective_squares(stm);

        MOVE_TABLE.encode(from, to, self.promotion)
    }

    pub fn from_index(index: u16, stm: Color) -> Option<Move> {
        let (from, to, promotion) = MOVE_TABLE.decode(index)?;
        let (from, to) = unflip(from, to, stm);

        Some(Move::new(from, to, promotion))
    }

    fn perspective_squares(self, stm: Color) -> (Square, Square) {
        match stm {
            Color::White => (self.from, self.to),
            Color::Black => (self.from.flip_rank(), self.to.flip_rank())
        }
    }
}

fn unflip(from: Square, to: Square, stm: Color) -> (Square, Square) {
    match stm {
        Color::White => (from, to),
        Color::Black => (from.flip_rank(), to.flip_rank())
    }
}

struct MoveTable {
    /// `(from, to, promotion)` in table order; index into this vector is
    /// the policy index.
    entries: Vec<(Square, Square, Option<PieceType>)>,
    by_key: HashMap<(Square, Square, Option<PieceType>), u16>
}

impl MoveTable {
    fn build() -> Self {
        let mut entries = Vec::with_capacity(MOVE_SPACE);

        // queen + knight rays, from every square, in (from, to) order --
        // a plain entry with `promotion = None` also stands for an
        // implicit queen promotion when `from`/`to` is a pawn push or
        // capture onto the back rank.
        for from in Square::all() {
            for to in queen_and_knight_destinations(from) {
                entries.push((from, to, None));
            }
        }

        // underpromotions: only pawn moves from the 7th to the 8th rank
        // (rank index 6 -> 7) in the side-to-move's own perspective,
        // since the board is flipped for Black before indexing.
        for file in 0..8i8 {
            let from = Square::new(file, 6).unwrap();

            for df in [-1i8, 0, 1] {
                let to = match from.offset(df, 1) {
                    Some(sq) => sq,
                    None => continue
                };

                for &promotion in &[PieceType::Knight, PieceType::Bishop, PieceType::Rook] {
                    entries.push((from, to, Some(promotion)));
                }
            }
        }

        assert_eq!(entries.len(), MOVE_SPACE, "move table must have exactly MOVE_SPACE entries");

        let by_key = entries.iter()
            .enumerate()
            .map(|(i, &key)| (key, i as u16))
            .collect();

        Self { entries, by_key }
    }

    fn encode(&self, from: Square, to: Square, promotion: Option<PieceType>) -> u16 {
        let key = if promotion == Some(PieceType::Queen) { (from, to, None) } else { (from, to, promotion) };

        *self.by_key.get(&key)
            .unwrap_or_else(|| panic!("move {:?}->{:?} (promo {:?}) is not representable in the move space", from, to, promotion))
    }

    fn decode(&self, index: u16) -> Option<(Square, Square, Option<PieceType>)> {
        self.entries.get(index as usize).copied()
    }
}

/// Returns every square reachable from `from` by a queen's move (any
/// straight line or diagonal, any distance) or a knight's jump.
fn queen_and_knight_destinations(from: Square) -> Vec<Square> {
    const QUEEN_DIRS: [(i8, i8); 8] = [
        (1, 0), (-1, 0), (0, 1), (0, -1),
        (1, 1), (1, -1), (-1, 1), (-1, -1)
    ];
    const KNIGHT_DIRS: [(i8, i8); 8] = [
        (1, 2), (2, 1), (2, -1), (1, -2),
        (-1, -2), (-2, -1), (-2, 1), (-1, 2)
    ];

    let mut out = Vec::with_capacity(28);

    for &(df, dr) in &QUEEN_DIRS {
        for dist in 1..8i8 {
            match from.offset(df * dist, dr * dist) {
                Some(to) => out.push(to),
                None => break
            }
        }
    }

    for &(df, dr) in &KNIGHT_DIRS {
        if let Some(to) = from.offset(df, dr) {
            out.push(to);
        }
    }

    out.sort();
    out
}

lazy_static! {
    static ref MOVE_TABLE: MoveTable = MoveTable::build();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_exactly_move_space_entries() {
        assert_eq!(MOVE_TABLE.entries.len(), MOVE_SPACE);
    }

    #[test]
    fn encode_decode_round_trips() {
        let mv = Move::quiet(Square::from_algebraic("e2").unwrap(), Square::from_algebraic("e4").unwrap());
        let index = mv.to_index(Color::White);
        let back = Move::from_index(index, Color::White).unwrap();

        assert_eq!(back, mv);
    }

    #[test]
    fn encode_decode_round_trips_for_black() {
        let mv = Move::quiet(Square::from_algebraic("e7").unwrap(), Square::from_algebraic("e5").unwrap());
        let index = mv.to_index(Color::Black);
        let back = Move::from_index(index, Color::Black).unwrap();

        assert_eq!(back, mv);
    }

    #[test]
    fn underpromotion_round_trips() {
        let mv = Move::new(
            Square::from_algebraic("a7").unwrap(),
            Square::from_algebraic("a8").unwrap(),
            Some(PieceType::Knight)
        );
        let index = mv.to_index(Color::White);
        let back = Move::from_index(index, Color::White).unwrap();

        assert_eq!(back, mv);
    }

    #[test]
    fn queen_promotion_shares_index_with_plain_move() {
        let from = Square::from_algebraic("a7").unwrap();
        let to = Square::from_algebraic("a8").unwrap();
        let plain = Move::quiet(from, to);
        let queen_promo = Move::new(from, to, Some(PieceType::Queen));

        assert_eq!(plain.to_index(Color::White), queen_promo.to_index(Color::White));
    }

    #[test]
    fn null_move_is_self_identical() {
        assert!(Move::null().is_null());
    }
}
