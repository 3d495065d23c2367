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

//! When a search's watchdog should raise the stop flag. Every strategy
//! is checked against both the wall clock and the number of leaves
//! evaluated so far (nodes, *not* network calls -- a cache hit still
//! counts), so a caller can combine "whichever comes first" semantics by
//! picking the tightest of several.

use std::time::Duration;

pub trait TimeStrategy: Send + Sync {
    fn is_expired(&self, elapsed: Duration, nodes: u64) -> bool;
}

/// Never expires on its own; only an explicit `Stop()` ends the search.
pub struct Infinite;

impl TimeStrategy for Infinite {
    fn is_expired(&self, _elapsed: Duration, _nodes: u64) -> bool {
        false
    }
}

/// `--playouts` / `--nodes`: stop once `nodes` leaves have been
/// evaluated.
pub struct NodeLimit {
    budget: u64
}

impl NodeLimit {
    pub fn new(budget: u64) -> Self {
        Self { budget }
    }
}

impl TimeStrategy for NodeLimit {
    fn is_expired(&self, _elapsed: Duration, nodes: u64) -> bool {
        nodes >= self.budget
    }
}

/// `--movetime`: stop once a fixed wall-clock budget has elapsed.
pub struct MoveTime {
    budget: Duration
}

impl MoveTime {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl TimeStrategy for MoveTime {
    fn is_expired(&self, elapsed: Duration, _nodes: u64) -> bool {
        elapsed >= self.budget
    }
}

/// `--wtime`/`--btime`/`--winc`/`--binc`: a single fixed-allocation clock
/// budget computed once up front. A simple `remaining / 30 + increment`
/// split, clamped so a single move never claims more than half of what
/// is left on the clock.
pub struct Clock {
    allocated: Duration
}

impl Clock {
    pub fn new(time_left: Duration, increment: Duration, moves_to_go: u32) -> Self {
        let divisor = if moves_to_go == 0 { 30 } else { moves_to_go };
        let share = time_left / divisor;
        let naive = share + increment;
        let cap = time_left / 2;

        Self { allocated: naive.min(cap) }
    }
}

impl TimeStrategy for Clock {
    fn is_expired(&self, elapsed: Duration, _nodes: u64) -> bool {
        elapsed >= self.allocated
    }
}

/// Expires as soon as *any* of several strategies would, e.g. a node
/// budget and a movetime safety net applied together.
pub struct Combined(pub Vec<Box<dyn TimeStrategy>>);

impl TimeStrategy for Combined {
    fn is_expired(&self, elapsed: Duration, nodes: u64) -> bool {
        self.0.iter().any(|strategy| strategy.is_expired(elapsed, nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_never_expires() {
        assert!(!Infinite.is_expired(Duration::from_secs(1_000_000), u64::MAX));
    }

    #[test]
    fn node_limit_expires_at_the_budget() {
        let strategy = NodeLimit::new(800);

        assert!(!strategy.is_expired(Duration::from_secs(0), 799));
        assert!(strategy.is_expired(Duration::from_secs(0), 800));
    }

    #[test]
    fn movetime_expires_after_its_duration() {
        let strategy = MoveTime::new(Duration::from_millis(100));

        assert!(!strategy.is_expired(Duration::from_millis(99), 0));
        assert!(strategy.is_expired(Duration::from_millis(100), 0));
    }

    #[test]
    fn clock_never_allocates_more_than_half_of_what_remains() {
        let strategy = Clock::new(Duration::from_secs(10), Duration::from_millis(0), 40);

        assert!(strategy.allocated <= Duration::from_secs(5));
    }

    #[test]
    fn combined_expires_on_the_first_to_trigger() {
        let strategy = Combined(vec![Box::new(NodeLimit::new(800)), Box::new(MoveTime::new(Duration::from_secs(3600)))]);

        assert!(strategy.is_expired(Duration::from_secs(0), 800));
        assert!(!strategy.is_expired(Duration::from_secs(0), 799));
    }
}
