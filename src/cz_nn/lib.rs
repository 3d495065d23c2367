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

#[macro_use] extern crate lazy_static;

extern crate cz_position;
extern crate cz_utils;

pub mod backends;
pub mod cache;
pub mod caching_computation;
pub mod loader;
pub mod multiplexer;
pub mod network;

pub use self::cache::{CacheEntry, CacheHandle, NNCache};
pub use self::caching_computation::CachingComputation;
pub use self::loader::Weights;
pub use self::multiplexer::Multiplexer;
pub use self::network::{Network, NetworkComputation};
