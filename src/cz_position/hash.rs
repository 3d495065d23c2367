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

/// A 64-bit position hash, stable across equivalent positions -- two
/// positions that compare equal under the rules (same board, side to
/// move, castling rights, en-passant square, and repetition count) must
/// hash equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub u64);

impl Hash {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Hash {
    fn from(value: u64) -> Self {
        Hash(value)
    }
}
