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

/// A square on the 8x8 board, `0 == a1`, `63 == h8`, file-major within rank
/// (`square = rank * 8 + file`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(pub u8);

impl Square {
    pub fn new(file: i8, rank: i8) -> Option<Square> {
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Some(Square((rank as u8) * 8 + (file as u8)))
        } else {
            None
        }
    }

    pub fn file(self) -> i8 {
        (self.0 % 8) as i8
    }

    pub fn rank(self) -> i8 {
        (self.0 / 8) as i8
    }

    /// Mirrors the square across the board's horizontal centerline, i.e.
    /// the transform that turns Black's perspective into White's.
    pub fn flip_rank(self) -> Square {
        Square(self.0 ^ 0x38)
    }

    pub fn offset(self, df: i8, dr: i8) -> Option<Square> {
        Square::new(self.file() + df, self.rank() + dr)
    }

    pub fn to_algebraic(self) -> String {
        let file = (b'a' + self.file() as u8) as char;
        let rank = (b'1' + self.rank() as u8) as char;

        format!("{}{}", file, rank)
    }

    pub fn from_algebraic(s: &str) -> Option<Square> {
        let mut chars = s.chars();
        let file = chars.next()?;
        let rank = chars.next()?;

        if chars.next().is_some() {
            return None;
        }

        let file = (file as i8) - ('a' as i8);
        let rank = (rank as i8) - ('1' as i8);

        Square::new(file, rank)
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algebraic_round_trips() {
        for sq in Square::all() {
            let text = sq.to_algebraic();

            assert_eq!(Square::from_algebraic(&text), Some(sq));
        }
    }

    #[test]
    fn a1_is_zero() {
        assert_eq!(Square::from_algebraic("a1"), Some(Square(0)));
        assert_eq!(Square::from_algebraic("h8"), Some(Square(63)));
    }

    #[test]
    fn flip_rank_swaps_first_and_last() {
        assert_eq!(Square::from_algebraic("a1").unwrap().flip_rank(), Square::from_algebraic("a8").unwrap());
    }
}
