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

//! The fixed "V3" training record: one sampled position per self-play
//! move, encoded to the exact little-endian byte layout downstream
//! trainers expect. `encode`/`decode` are hand-written rather than a
//! `#[repr(C)]` struct so that the on-disk format never silently drifts
//! with field reordering or padding.

use std::convert::TryInto;

use cz_position::{Color, Move, MOVE_SPACE};

/// `version=3 (i32), policy[1858] (f32), planes[104] (u64), castling[4]
/// (u8), stm (u8), rule50 (u8), reserved (u8), result (i8)`.
pub const VERSION: i32 = 3;

const POLICY_BYTES: usize = MOVE_SPACE * 4;
const PLANES_BYTES: usize = 104 * 8;
pub const RECORD_SIZE: usize = 4 + POLICY_BYTES + PLANES_BYTES + 4 + 1 + 1 + 1 + 1;

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingRecord {
    /// Visit-count policy target over the full 1858-move index space,
    /// from the position's own side to move perspective.
    pub policy: [f32; MOVE_SPACE],
    /// The 104 history bitboards of `cz_position::features::history_bitboards`.
    pub planes: [u64; 104],
    pub castling: [bool; 4],
    pub side_to_move: Color,
    pub rule50: u8,
    /// `+1` win, `0` draw, `-1` loss, from `side_to_move`'s perspective.
    /// Filled in only once the game has finished.
    pub result: i8
}

impl TrainingRecord {
    /// Builds a policy target from the root's visit distribution: each
    /// legal move's share of the total visit count, indexed by its
    /// `Move::to_index`. Unvisited and illegal moves are left at zero.
    pub fn policy_from_visits(visits: &[(Move, u32, f64)], side_to_move: Color) -> [f32; MOVE_SPACE] {
        let mut policy = [0.0f32; MOVE_SPACE];
        let total: u32 = visits.iter().map(|&(_, n, _)| n).sum();

        if total == 0 {
            return policy;
        }

        for &(mv, n, _) in visits {
            policy[mv.to_index(side_to_move) as usize] = n as f32 / total as f32;
        }

        policy
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_SIZE);

        out.extend_from_slice(&VERSION.to_le_bytes());

        for &p in self.policy.iter() {
            out.extend_from_slice(&p.to_le_bytes());
        }

        for &plane in self.planes.iter() {
            out.extend_from_slice(&plane.to_le_bytes());
        }

        for &flag in self.castling.iter() {
            out.push(flag as u8);
        }

        out.push(self.side_to_move.as_usize() as u8);
        out.push(self.rule50);
        out.push(0); // reserved
        out.push(self.result as u8);

        debug_assert_eq!(out.len(), RECORD_SIZE);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<TrainingRecord> {
        if bytes.len() != RECORD_SIZE {
            return None;
        }

        let version = i32::from_le_bytes(bytes[0..4].try_into().ok()?);

        if version != VERSION {
            return None;
        }

        let mut policy = [0.0f32; MOVE_SPACE];
        let mut offset = 4;

        for slot in policy.iter_mut() {
            *slot = f32::from_le_bytes(bytes[offset..offset + 4].try_into().ok()?);
            offset += 4;
        }

        let mut planes = [0u64; 104];

        for slot in planes.iter_mut() {
            *slot = u64::from_le_bytes(bytes[offset..offset + 8].try_into().ok()?);
            offset += 8;
        }

        let castling = [
            bytes[offset] != 0,
            bytes[offset + 1] != 0,
            bytes[offset + 2] != 0,
            bytes[offset + 3] != 0
        ];
        offset += 4;

        let side_to_move = match bytes[offset] {
            0 => Color::White,
            _ => Color::Black
        };
        offset += 1;

        let rule50 = bytes[offset];
        offset += 1;

        // reserved byte
        offset += 1;

        let result = bytes[offset] as i8;

        Some(TrainingRecord { policy, planes, castling, side_to_move, rule50, result })
    }
}
