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

//! Turns a set of `(move, visit count)` pairs into one chosen move,
//! either greedily (match play, or self-play once past the temperature
//! cut-off) or by sampling proportional to `count^(1 / temperature)`
//! (early self-play moves, to diversify training games).

use cz_position::Move;
use rand::Rng;

/// `temperature <= 0` always selects the most-visited move; otherwise
/// samples from `count.powf(1 / temperature)` weights. Ties in greedy
/// mode break towards the first entry in `visits`, matching the order
/// `NodeTree::root_children_by_visits` already produces (descending
/// visit count).
pub fn select(visits: &[(Move, u32, f64)], temperature: f32, rng: &mut impl Rng) -> Move {
    assert!(!visits.is_empty(), "cannot choose a move with no legal moves");

    if temperature <= 0.0 {
        return visits[0].0;
    }

    let weights: Vec<f64> = visits.iter()
        .map(|&(_, n, _)| (n as f64).powf(1.0 / temperature as f64))
        .collect();
    let total: f64 = weights.iter().sum();

    if total <= 0.0 {
        return visits[0].0;
    }

    let mut x = rng.gen::<f64>() * total;

    for (i, &w) in weights.iter().enumerate() {
        if x < w {
            return visits[i].0;
        }

        x -= w;
    }

    visits.last().expect("visits is non-empty").0
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_position::Square;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mv(from: &str, to: &str) -> Move {
        Move::quiet(Square::from_algebraic(from).unwrap(), Square::from_algebraic(to).unwrap())
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let visits = vec![(mv("e2", "e4"), 10, 0.1), (mv("d2", "d4"), 50, 0.2)];
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(select(&visits, 0.0, &mut rng), mv("e2", "e4"));
    }

    #[test]
    fn a_move_with_zero_visits_is_never_chosen_under_sampling() {
        let visits = vec![(mv("e2", "e4"), 100, 0.1), (mv("d2", "d4"), 0, 0.0)];
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            assert_eq!(select(&visits, 1.0, &mut rng), mv("e2", "e4"));
        }
    }
}
