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

//! The capability interface the rest of the core consumes the neural
//! network through. Nothing above this boundary knows or cares whether
//! the forward pass happens on the CPU, a GPU, or is a closed-form
//! stand-in -- the convolution/batch-norm/SGEMM kernels themselves are
//! out of scope here.

use cz_position::mv::MOVE_SPACE;

/// One batched forward pass in progress: inputs are accumulated with
/// `add_input`, then `compute_blocking` runs the batch synchronously.
pub trait NetworkComputation: Send + Sync {
    /// Appends one sample's planes to the batch. Panics if called after
    /// `compute_blocking`.
    fn add_input(&mut self, planes: &[f32]);

    /// Runs the whole accumulated batch. Idempotent -- calling it twice
    /// without an intervening `add_input` is a no-op.
    fn compute_blocking(&mut self);

    /// The value head's output for sample `i`, in `[-1, 1]` from that
    /// sample's side-to-move perspective.
    fn get_q(&self, i: usize) -> f32;

    /// The policy head's logit for `move_id` on sample `i`.
    fn get_p(&self, i: usize, move_id: usize) -> f32;

    /// The number of samples added so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A source of new batched computations. Implementations are shared
/// across search worker threads, so must be `Send + Sync`.
pub trait Network: Send + Sync {
    fn new_computation(&self) -> Box<dyn NetworkComputation>;

    /// The largest batch size this backend will accept from a single
    /// `compute_blocking` call before its own internal limits kick in.
    /// The multiplexer uses this as its `MaxBatch`.
    fn max_batch_size(&self) -> usize;

    /// How many planes per sample this network expects (always
    /// `cz_position::features::SEARCH_PLANES * PLANE_SIZE` for the fixed
    /// 112-plane/8x8 shape, but kept as a method so a backend can reject
    /// a mismatched weights file at construction time instead of here).
    fn input_size(&self) -> usize;
}

pub const POLICY_SIZE: usize = MOVE_SPACE;
