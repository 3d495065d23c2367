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

//! Fixed Zobrist tables for the `testing` stand-in position. Generated
//! once from a deterministic splitmix64 stream (no external `rand`
//! dependency needed for a handful of constants computed at process
//! startup).

use crate::hash::Hash;

pub struct ZobristTable {
    /// `[color][piece][square]`
    pub pieces: [[[u64; 64]; 6]; 2],
    pub side_to_move: u64,
    /// `[white_king, white_queen, black_king, black_queen]`
    pub castling: [u64; 4],
    /// indexed by file, `None` is represented by simply not mixing it in.
    pub en_passant_file: [u64; 8]
}

fn split_mix_64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl ZobristTable {
    fn build() -> Self {
        let mut state = 0x243F_6A88_85A3_08D3u64; // digits of pi, just a fixed seed

        let mut pieces = [[[0u64; 64]; 6]; 2];
        for color in pieces.iter_mut() {
            for piece in color.iter_mut() {
                for square in piece.iter_mut() {
                    *square = split_mix_64(&mut state);
                }
            }
        }

        let side_to_move = split_mix_64(&mut state);
        let mut castling = [0u64; 4];
        for entry in castling.iter_mut() {
            *entry = split_mix_64(&mut state);
        }

        let mut en_passant_file = [0u64; 8];
        for entry in en_passant_file.iter_mut() {
            *entry = split_mix_64(&mut state);
        }

        Self { pieces, side_to_move, castling, en_passant_file }
    }
}

lazy_static! {
    pub static ref ZOBRIST: ZobristTable = ZobristTable::build();
}

/// Folds a running hash and a repetition count together, so that two
/// otherwise-identical positions reached via a different repetition
/// count hash differently.
pub fn with_repetition_count(hash: u64, repetitions: u8) -> Hash {
    Hash(hash ^ split_mix_seeded(repetitions as u64))
}

fn split_mix_seeded(mut state: u64) -> u64 {
    split_mix_64(&mut state)
}
