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

//! A backend that computes a deterministic, cheap closed-form function of
//! the input planes instead of running real convolution/SGEMM kernels.
//! It exists so the multiplexer, cache and search can be exercised (and
//! their reproducibility property checked) without an accelerator or a
//! trained model.

use std::sync::Arc;

use crate::loader::Weights;
use crate::network::{Network, NetworkComputation, POLICY_SIZE};

pub struct ReferenceNetwork {
    weights: Arc<Weights>,
    input_size: usize
}

impl ReferenceNetwork {
    pub fn new(weights: Arc<Weights>, input_size: usize) -> Self {
        Self { weights, input_size }
    }
}

impl Network for ReferenceNetwork {
    fn new_computation(&self) -> Box<dyn NetworkComputation> {
        Box::new(ReferenceComputation {
            checksum_seed: self.weights.format_version as u64,
            input_size: self.input_size,
            samples: Vec::new(),
            checksums: Vec::new(),
            done: false
        })
    }

    fn max_batch_size(&self) -> usize {
        256
    }

    fn input_size(&self) -> usize {
        self.input_size
    }
}

struct ReferenceComputation {
    checksum_seed: u64,
    input_size: usize,
    samples: Vec<Vec<f32>>,
    checksums: Vec<u64>,
    done: bool
}

fn split_mix_64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn checksum_of(seed: u64, planes: &[f32]) -> u64 {
    let mut acc = seed;

    for (i, &value) in planes.iter().enumerate() {
        acc = split_mix_64(acc ^ (value.to_bits() as u64) ^ (i as u64));
    }

    acc
}

impl NetworkComputation for ReferenceComputation {
    fn add_input(&mut self, planes: &[f32]) {
        assert_eq!(planes.len(), self.input_size, "input sample has the wrong number of planes");
        assert!(!self.done, "add_input called after compute_blocking");

        self.checksums.push(checksum_of(self.checksum_seed, planes));
        self.samples.push(planes.to_vec());
    }

    fn compute_blocking(&mut self) {
        self.done = true;
    }

    fn get_q(&self, i: usize) -> f32 {
        let sum: f32 = self.samples[i].iter().sum();
        let mean = sum / self.samples[i].len() as f32;

        mean.tanh()
    }

    fn get_p(&self, i: usize, move_id: usize) -> f32 {
        debug_assert!(move_id < POLICY_SIZE);

        let bits = split_mix_64(self.checksums[i] ^ (move_id as u64).wrapping_mul(0x9E3779B97F4A7C15));

        (bits as f64 / u64::MAX as f64) as f32
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_gives_same_output() {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });
        let net = ReferenceNetwork::new(weights, 4);

        let mut a = net.new_computation();
        a.add_input(&[0.1, 0.2, 0.3, 0.4]);
        a.compute_blocking();

        let mut b = net.new_computation();
        b.add_input(&[0.1, 0.2, 0.3, 0.4]);
        b.compute_blocking();

        assert_eq!(a.get_q(0), b.get_q(0));
        assert_eq!(a.get_p(0, 17), b.get_p(0, 17));
    }

    #[test]
    fn different_inputs_give_different_policies() {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });
        let net = ReferenceNetwork::new(weights, 4);

        let mut a = net.new_computation();
        a.add_input(&[0.1, 0.2, 0.3, 0.4]);
        a.compute_blocking();

        let mut b = net.new_computation();
        b.add_input(&[0.9, 0.8, 0.7, 0.6]);
        b.compute_blocking();

        assert_ne!(a.get_p(0, 17), b.get_p(0, 17));
    }

    #[test]
    fn q_is_bounded() {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });
        let net = ReferenceNetwork::new(weights, 3);

        let mut comp = net.new_computation();
        comp.add_input(&[100.0, 100.0, 100.0]);
        comp.compute_blocking();

        assert!(comp.get_q(0) <= 1.0 && comp.get_q(0) >= -1.0);
    }
}
