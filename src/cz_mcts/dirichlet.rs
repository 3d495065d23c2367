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

//! Root exploration noise: mixes `Dirichlet(alpha)` samples into the
//! root's priors so that self-play does not always explore the exact
//! same lines when starting from the same opening.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

/// Draws one sample from `Dirichlet(alpha, ..., alpha)` of dimension
/// `priors.len()` via the standard trick of normalizing `n` independent
/// `Gamma(alpha, 1)` draws.
pub fn sample(rng: &mut impl Rng, n: usize, alpha: f32) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }

    let gamma = Gamma::new(alpha as f64, 1.0).expect("dirichlet alpha must be positive");
    let draws: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = draws.iter().sum();

    if sum <= 0.0 {
        // every draw underflowed to zero (possible for a very small
        // alpha); fall back to a uniform distribution rather than
        // dividing by zero.
        return vec![1.0 / n as f32; n];
    }

    draws.into_iter().map(|d| (d / sum) as f32).collect()
}

/// Mixes `noise` into `priors` in place: `p' = (1 - epsilon) * p +
/// epsilon * noise`.
pub fn mix(priors: &mut [f32], noise: &[f32], epsilon: f32) {
    assert_eq!(priors.len(), noise.len());

    for (p, &n) in priors.iter_mut().zip(noise) {
        *p = (1.0 - epsilon) * *p + epsilon * n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sample_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(42);
        let noise = sample(&mut rng, 20, 0.3);

        let sum: f32 = noise.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn empty_prior_set_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample(&mut rng, 0, 0.3).is_empty());
    }

    #[test]
    fn mix_preserves_total_mass() {
        let mut priors = vec![0.5f32, 0.5];
        let noise = vec![0.9f32, 0.1];

        mix(&mut priors, &noise, 0.25);

        let sum: f32 = priors.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
