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

//! Process-wide tunables, read once from the environment with sane
//! defaults. The `cz` binary may override any of these from `--flag value`
//! before the first search starts; after that they are treated as
//! immutable for the lifetime of the process.

use std::env;
use std::str::FromStr;
use std::sync::RwLock;

/// Returns the value of the environment variable `key` parsed as `T`, or
/// `default` if it is unset or fails to parse.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

macro_rules! tunable {
    ($name:ident, $ty:ty, $env:expr, $default:expr) => {
        lazy_static! {
            pub static ref $name: RwLock<$ty> = RwLock::new(env_or($env, $default));
        }
    };
}

tunable!(NUM_THREADS, usize, "CZ_THREADS", 16);
tunable!(NUM_GAMES, usize, "CZ_NUM_GAMES", 16);
tunable!(NUM_NODES, usize, "CZ_NODES", 800);
tunable!(MOVETIME_MS, u64, "CZ_MOVETIME_MS", 0);
tunable!(CPUCT, f32, "CZ_CPUCT", 2.5);
tunable!(FPU_REDUCTION, f32, "CZ_FPU_REDUCTION", 0.2);
tunable!(POLICY_SOFTMAX_TEMP, f32, "CZ_POLICY_SOFTMAX_TEMP", 1.0);
tunable!(NOISE, bool, "CZ_NOISE", false);
tunable!(TEMPERATURE, f32, "CZ_TEMPERATURE", 1.0);
tunable!(TEMPDECAY_MOVES, usize, "CZ_TEMPDECAY_MOVES", 30);
tunable!(CACHE_SIZE, usize, "CZ_CACHE_SIZE", 200_000);
tunable!(MINIBATCH_SIZE, usize, "CZ_MINIBATCH_SIZE", 256);
tunable!(MAX_PREFETCH, usize, "CZ_MAX_PREFETCH", 32);
tunable!(MULTIPV, usize, "CZ_MULTIPV", 1);
tunable!(VERBOSE_MOVE_STATS, bool, "CZ_VERBOSE_MOVE_STATS", false);
tunable!(RESIGN_THRESHOLD, f32, "CZ_RESIGN_THRESHOLD", -0.9);
tunable!(RESIGN_PLIES, usize, "CZ_RESIGN_PLIES", 3);
tunable!(DRAW_THRESHOLD, f32, "CZ_DRAW_THRESHOLD", 0.02);
tunable!(DRAW_PLIES, usize, "CZ_DRAW_PLIES", 10);

lazy_static! {
    /// Path to a weights file, or unset to fall back to the reference
    /// backend's closed-form weights. Not a `tunable!` because `String`
    /// (and `Option<String>`) are not `Copy`, unlike every other key here.
    pub static ref WEIGHTS: RwLock<Option<String>> = RwLock::new(env::var("CZ_WEIGHTS").ok());
    /// Name of the registered `cz_nn::backends::Registry` entry to use.
    pub static ref BACKEND: RwLock<String> = RwLock::new(env_or("CZ_BACKEND", "reference".to_string()));
}

/// Read a tunable, dereferencing the `RwLock` for callers that just want a
/// plain value (all of these types are `Copy`).
pub fn get<T: Copy>(lock: &RwLock<T>) -> T {
    *lock.read().expect("config lock was poisoned")
}

/// Overwrite a tunable, used by the `cz` binary's command-line parser.
pub fn set<T: Copy>(lock: &RwLock<T>, value: T) {
    *lock.write().expect("config lock was poisoned") = value;
}

/// `get`/`set` for the non-`Copy` string-valued tunables (`WEIGHTS`, `BACKEND`).
pub fn get_string<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().expect("config lock was poisoned").clone()
}

pub fn set_string<T>(lock: &RwLock<T>, value: T) {
    *lock.write().expect("config lock was poisoned") = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        assert_eq!(get(&NUM_THREADS), 16);
        assert!(get(&CPUCT) > 0.0);
        assert_eq!(get(&CACHE_SIZE), 200_000);
    }

    #[test]
    fn set_then_get_round_trips() {
        let before = get(&MULTIPV);
        set(&MULTIPV, 4);
        assert_eq!(get(&MULTIPV), 4);
        set(&MULTIPV, before);
    }

    #[test]
    fn backend_defaults_to_reference() {
        assert_eq!(get_string(&BACKEND), "reference");
    }

    #[test]
    fn weights_string_round_trips() {
        let before = get_string(&WEIGHTS);
        set_string(&WEIGHTS, Some("weights.txt.gz".to_string()));
        assert_eq!(get_string(&WEIGHTS), Some("weights.txt.gz".to_string()));
        set_string(&WEIGHTS, before);
    }
}
