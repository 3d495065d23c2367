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

//! The outcome of one finished game, from White's perspective -- used
//! both for `OnGameInfo` and for stamping training records.

use cz_position::Color;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    Draw,
    BlackWins
}

impl GameResult {
    /// The training-record `result` field for a sample whose side to
    /// move was `perspective`: `+1` win, `0` draw, `-1` loss.
    pub fn value_for(self, perspective: Color) -> i8 {
        match (self, perspective) {
            (GameResult::Draw, _) => 0,
            (GameResult::WhiteWins, Color::White) => 1,
            (GameResult::WhiteWins, Color::Black) => -1,
            (GameResult::BlackWins, Color::Black) => 1,
            (GameResult::BlackWins, Color::White) => -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_is_zero_for_both_sides() {
        assert_eq!(GameResult::Draw.value_for(Color::White), 0);
        assert_eq!(GameResult::Draw.value_for(Color::Black), 0);
    }

    #[test]
    fn a_win_is_positive_for_the_winner_only() {
        assert_eq!(GameResult::WhiteWins.value_for(Color::White), 1);
        assert_eq!(GameResult::WhiteWins.value_for(Color::Black), -1);
    }
}
