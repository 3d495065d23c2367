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

//! Input-plane construction. History is always presented from the
//! perspective of the side to move, so a position reached via a different
//! color never confuses the network about who is "us" -- this is done by
//! mirroring the board vertically (`Square::flip_rank`) whenever the
//! position to move is Black, for every ply in the history stack.
//!
//! Two encodings are exposed: `history_bitboards` packs eight plies of
//! twelve piece bitboards plus one repetition bitboard per ply into 104
//! `u64`s (used verbatim by the training record); `search_planes` expands
//! the same history into 112 `f32` planes of 64 elements each (the 104
//! piece-history planes plus castling×4, side-to-move, fifty-move
//! counter, total move count, and an all-ones plane -- 104 + 8 = 112),
//! the shape the network's `AddInput` expects.

use crate::color::Color;
use crate::piece::PieceType;
use crate::position::Position;
use crate::square::Square;

pub const HISTORY_PLIES: usize = 8;
pub const TRAINING_PLANES: usize = 104;
pub const SEARCH_PLANES: usize = 112;
pub const PLANE_SIZE: usize = 64;

/// One ply's worth of bitboards: twelve piece planes (own pieces first,
/// by `PieceType::as_usize()` order, then the opponent's) plus one
/// repetition-indicator plane.
fn ply_bitboards(pos: &Position, perspective: Color) -> [u64; 13] {
    let mut boards = [0u64; 13];
    let flip = perspective == Color::Black;

    for sq in Square::all() {
        let piece = match pos.at(sq) {
            Some(piece) => piece,
            None => continue
        };

        let view_sq = if flip { sq.flip_rank() } else { sq };
        let plane = if piece.color == perspective { piece.kind.as_usize() } else { 6 + piece.kind.as_usize() };

        boards[plane] |= 1u64 << view_sq.0;
    }

    if pos.repetitions() > 0 {
        boards[12] = u64::MAX;
    }

    boards
}

/// Packs `history` (oldest first, current position last, at most
/// `HISTORY_PLIES` entries) into the 104 training-record bitboards.
/// Missing older plies (near the start of a game) are zero-filled.
pub fn history_bitboards(history: &[Position]) -> [u64; TRAINING_PLANES] {
    let mut out = [0u64; TRAINING_PLANES];
    let perspective = history.last().map(|pos| pos.side_to_move()).unwrap_or(Color::White);

    let start = history.len().saturating_sub(HISTORY_PLIES);
    let plies = &history[start..];

    for (i, pos) in plies.iter().rev().enumerate() {
        let ply_index = i; // 0 = most recent
        let boards = ply_bitboards(pos, perspective);
        let base = ply_index * 13;

        out[base..base + 13].copy_from_slice(&boards);
    }

    out
}

/// Expands `history` into the 112 `f32` search planes for one network
/// input sample.
pub fn search_planes(history: &[Position]) -> Vec<f32> {
    let bitboards = history_bitboards(history);
    let mut planes = Vec::with_capacity(SEARCH_PLANES * PLANE_SIZE);

    for board in bitboards.iter() {
        for sq in 0..64u64 {
            planes.push(if board & (1 << sq) != 0 { 1.0 } else { 0.0 });
        }
    }

    let current = match history.last() {
        Some(pos) => pos,
        None => {
            planes.resize(SEARCH_PLANES * PLANE_SIZE, 0.0);
            return planes;
        }
    };

    let castling = current.castling();
    let (own_king, own_queen, opp_king, opp_queen) = match current.side_to_move() {
        Color::White => (castling.white_king, castling.white_queen, castling.black_king, castling.black_queen),
        Color::Black => (castling.black_king, castling.black_queen, castling.white_king, castling.white_queen)
    };

    for &flag in &[own_king, own_queen, opp_king, opp_queen] {
        planes.extend(std::iter::repeat(if flag { 1.0 } else { 0.0 }).take(PLANE_SIZE));
    }

    let stm_plane = if current.side_to_move() == Color::White { 1.0 } else { 0.0 };
    planes.extend(std::iter::repeat(stm_plane).take(PLANE_SIZE));

    let fifty_plane = current.halfmove_clock() as f32 / 100.0;
    planes.extend(std::iter::repeat(fifty_plane).take(PLANE_SIZE));

    let move_count_plane = current.fullmove_number() as f32 / 100.0;
    planes.extend(std::iter::repeat(move_count_plane).take(PLANE_SIZE));

    planes.extend(std::iter::repeat(1.0).take(PLANE_SIZE));

    debug_assert_eq!(planes.len(), SEARCH_PLANES * PLANE_SIZE);
    planes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_planes_has_fixed_size() {
        let history = vec![Position::startpos()];

        assert_eq!(search_planes(&history).len(), SEARCH_PLANES * PLANE_SIZE);
    }

    #[test]
    fn history_bitboards_has_fixed_size() {
        let history = vec![Position::startpos()];

        assert_eq!(history_bitboards(&history).len(), TRAINING_PLANES);
    }

    #[test]
    fn all_ones_plane_is_present() {
        let history = vec![Position::startpos()];
        let planes = search_planes(&history);
        let all_ones_plane = &planes[(SEARCH_PLANES - 1) * PLANE_SIZE..SEARCH_PLANES * PLANE_SIZE];

        assert!(all_ones_plane.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn empty_history_is_all_zero_except_none() {
        let planes = search_planes(&[]);

        assert_eq!(planes.len(), SEARCH_PLANES * PLANE_SIZE);
        assert!(planes.iter().all(|&v| v == 0.0));
    }
}
