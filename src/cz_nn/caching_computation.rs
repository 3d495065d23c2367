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

//! Sits between `Search` and `Network`: deduplicates leaves against the
//! `NNCache` before they ever reach the network, and stores only the
//! legal-move subset of each computed policy back into the cache.

use cz_position::Hash;

use crate::cache::{CacheEntry, CacheHandle, NNCache};
use crate::network::NetworkComputation;

enum Slot {
    Cached(CacheHandle),
    Pending { hash: Hash, network_index: usize, relevant_moves: Vec<u16> },
    Resolved { value: f32, policy: Vec<(u16, f32)> }
}

pub struct CachingComputation<'a> {
    cache: &'a NNCache,
    network: Box<dyn NetworkComputation>,
    slots: Vec<Slot>,
    policy_softmax_temp: f32,
    hits: usize,
    misses: usize
}

impl<'a> CachingComputation<'a> {
    pub fn new(cache: &'a NNCache, network: Box<dyn NetworkComputation>, policy_softmax_temp: f32) -> Self {
        Self { cache, network, slots: Vec::new(), policy_softmax_temp, hits: 0, misses: 0 }
    }

    /// Registers one leaf for evaluation, returning the slot index to use
    /// with `get_q`/`get_p` after `compute_blocking`. `relevant_moves` is
    /// the position's legal moves -- only their policy entries are kept.
    pub fn add_input(&mut self, hash: Hash, planes: &[f32], relevant_moves: &[u16]) -> usize {
        let slot = if let Some(handle) = self.cache.lookup(hash) {
            self.hits += 1;
            Slot::Cached(handle)
        } else {
            self.misses += 1;
            let network_index = self.network.len();
            self.network.add_input(planes);
            Slot::Pending { hash, network_index, relevant_moves: relevant_moves.to_vec() }
        };

        self.slots.push(slot);
        self.slots.len() - 1
    }

    pub fn compute_blocking(&mut self) {
        self.network.compute_blocking();

        for slot in self.slots.iter_mut() {
            let (hash, network_index, relevant_moves) = match slot {
                Slot::Pending { hash, network_index, relevant_moves } => (*hash, *network_index, relevant_moves.clone()),
                _ => continue
            };

            let value = self.network.get_q(network_index);
            let policy = softmax_subset(&*self.network, network_index, &relevant_moves, self.policy_softmax_temp);

            self.cache.insert(hash, CacheEntry { value, policy: policy.clone() }, false);
            *slot = Slot::Resolved { value, policy };
        }
    }

    pub fn get_q(&self, i: usize) -> f32 {
        match &self.slots[i] {
            Slot::Cached(handle) => handle.entry().value,
            Slot::Resolved { value, .. } => *value,
            Slot::Pending { .. } => panic!("get_q called before compute_blocking resolved slot {}", i)
        }
    }

    pub fn get_p(&self, i: usize, move_id: u16) -> f32 {
        let policy = match &self.slots[i] {
            Slot::Cached(handle) => &handle.entry().policy,
            Slot::Resolved { policy, .. } => policy,
            Slot::Pending { .. } => panic!("get_p called before compute_blocking resolved slot {}", i)
        };

        policy.iter().find(|&&(mv, _)| mv == move_id).map(|&(_, p)| p).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `(hits, misses)` since this computation was created, for
    /// aggregate cache-hit-rate reporting.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

impl<'a> Drop for CachingComputation<'a> {
    fn drop(&mut self) {
        for slot in self.slots.drain(..) {
            if let Slot::Cached(handle) = slot {
                self.cache.unpin(handle);
            }
        }
    }
}

fn softmax_subset(network: &dyn NetworkComputation, index: usize, moves: &[u16], temperature: f32) -> Vec<(u16, f32)> {
    if moves.is_empty() {
        return Vec::new();
    }

    let logits: Vec<f32> = moves.iter().map(|&mv| network.get_p(index, mv as usize) / temperature).collect();
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();

    moves.iter().copied().zip(exps.into_iter().map(|e| e / sum)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::reference::ReferenceNetwork;
    use crate::loader::Weights;
    use std::sync::Arc;

    fn network() -> ReferenceNetwork {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });
        ReferenceNetwork::new(weights, 4)
    }

    #[test]
    fn policy_subset_sums_to_one() {
        use crate::network::Network;

        let net = network();
        let cache = NNCache::with_capacity(16);
        let mut comp = CachingComputation::new(&cache, net.new_computation(), 1.0);

        let i = comp.add_input(Hash::from(1), &[0.1, 0.2, 0.3, 0.4], &[0, 1, 2]);
        comp.compute_blocking();

        let sum: f32 = [0u16, 1, 2].iter().map(|&mv| comp.get_p(i, mv)).sum();

        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn repeated_hash_is_a_cache_hit() {
        use crate::network::Network;

        let net = network();
        let cache = NNCache::with_capacity(16);

        {
            let mut comp = CachingComputation::new(&cache, net.new_computation(), 1.0);
            comp.add_input(Hash::from(7), &[0.1, 0.2, 0.3, 0.4], &[0]);
            comp.compute_blocking();
        }

        let mut comp = CachingComputation::new(&cache, net.new_computation(), 1.0);
        comp.add_input(Hash::from(7), &[0.1, 0.2, 0.3, 0.4], &[0]);

        assert_eq!(comp.stats(), (1, 0));
    }
}
