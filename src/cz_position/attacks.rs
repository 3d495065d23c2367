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

//! Pure attack geometry: given a square and a direction set, which other
//! squares does a piece placed there threaten. No board state is involved
//! here, so these helpers are shared by both move generation and check
//! detection.

use crate::square::Square;

pub const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
pub const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
pub const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2),
    (-1, -2), (-2, -1), (-2, 1), (-1, 2)
];
pub const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0), (-1, 0), (0, 1), (0, -1),
    (1, 1), (1, -1), (-1, 1), (-1, -1)
];

pub fn knight_targets(from: Square) -> impl Iterator<Item = Square> {
    KNIGHT_OFFSETS.iter().filter_map(move |&(df, dr)| from.offset(df, dr))
}

pub fn king_targets(from: Square) -> impl Iterator<Item = Square> {
    KING_OFFSETS.iter().filter_map(move |&(df, dr)| from.offset(df, dr))
}

/// Returns the squares reachable from `from` in a single ray for each of
/// `dirs`, stopping (inclusively) at `blocked`. The caller decides whether
/// the blocking square itself is a legal destination (capture) or not.
pub fn ray(from: Square, dirs: &[(i8, i8)], mut blocked: impl FnMut(Square) -> bool) -> Vec<Square> {
    let mut out = Vec::with_capacity(dirs.len() * 3);

    for &(df, dr) in dirs {
        let mut current = from;

        loop {
            current = match current.offset(df, dr) {
                Some(sq) => sq,
                None => break
            };

            out.push(current);

            if blocked(current) {
                break;
            }
        }
    }

    out
}
