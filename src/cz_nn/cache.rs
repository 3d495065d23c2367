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

//! A bounded LRU map from position hash to network result, shared by
//! every search worker thread behind one mutex. LRU order reflects
//! *population* order, not lookup order -- a `Lookup` never bumps an
//! entry to the front, trading a slightly worse hit rate for avoiding a
//! write on the common read path. Entries that are evicted while still
//! pinned are kept alive on a side list until every pin is released.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use cz_position::Hash;

#[derive(Debug)]
pub struct CacheEntry {
    pub value: f32,
    /// Only the legal moves for the position this entry was computed for
    /// -- the policy head's full 1858-wide output is never stored as-is.
    pub policy: Vec<(u16, f32)>
}

/// A pinned reference into the cache. Must be returned to `NNCache::unpin`
/// exactly once; dropping it without unpinning leaks the pin (caught by
/// `debug_assert!`s around pin bookkeeping in `CachingComputation`).
pub struct CacheHandle {
    hash: Hash,
    entry: Arc<CacheEntry>
}

impl CacheHandle {
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }
}

struct Slot {
    entry: Arc<CacheEntry>,
    pins: usize
}

struct Inner {
    capacity: usize,
    /// Population order, LRU at the back.
    order: VecDeque<Hash>,
    resident: HashMap<Hash, Slot>,
    evicted_pinned: HashMap<Hash, Vec<Slot>>
}

pub struct NNCache {
    inner: Mutex<Inner>
}

impl NNCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                order: VecDeque::new(),
                resident: HashMap::new(),
                evicted_pinned: HashMap::new()
            })
        }
    }

    /// Inserts `entry` at the MRU position, evicting the LRU tail if that
    /// pushes the cache over capacity. A capacity of zero degrades to a
    /// pure passthrough: every insert is a no-op.
    pub fn insert(&self, hash: Hash, entry: CacheEntry, pinned: bool) {
        let mut inner = self.inner.lock().expect("NN cache lock was poisoned");

        if inner.capacity == 0 {
            return;
        }

        if let Some(old) = inner.resident.remove(&hash) {
            inner.order.retain(|&h| h != hash);

            if old.pins > 0 {
                inner.evicted_pinned.entry(hash).or_default().push(old);
            }
        }

        let slot = Slot { entry: Arc::new(entry), pins: if pinned { 1 } else { 0 } };

        inner.resident.insert(hash, slot);
        inner.order.push_front(hash);

        while inner.resident.len() > inner.capacity {
            evict_one(&mut inner);
        }
    }

    /// Looks up `hash`, pinning and returning a handle on a hit. Does
    /// *not* move the entry to MRU.
    pub fn lookup(&self, hash: Hash) -> Option<CacheHandle> {
        let mut inner = self.inner.lock().expect("NN cache lock was poisoned");
        let slot = inner.resident.get_mut(&hash)?;

        slot.pins += 1;

        Some(CacheHandle { hash, entry: slot.entry.clone() })
    }

    /// Releases the pin held by `handle`. If the entry has already been
    /// evicted and this was its last pin, it is dropped for good.
    pub fn unpin(&self, handle: CacheHandle) {
        let mut inner = self.inner.lock().expect("NN cache lock was poisoned");
        let CacheHandle { hash, entry } = handle;

        if let Some(slot) = inner.resident.get_mut(&hash) {
            if Arc::ptr_eq(&slot.entry, &entry) {
                debug_assert!(slot.pins > 0, "unpin called more often than pin for a resident entry");
                slot.pins -= 1;
                return;
            }
        }

        if let Some(generations) = inner.evicted_pinned.get_mut(&hash) {
            if let Some(pos) = generations.iter().position(|slot| Arc::ptr_eq(&slot.entry, &entry)) {
                generations[pos].pins -= 1;

                if generations[pos].pins == 0 {
                    generations.remove(pos);

                    if generations.is_empty() {
                        inner.evicted_pinned.remove(&hash);
                    }
                }

                return;
            }
        }

        debug_assert!(false, "unpin called for an entry that is neither resident nor evicted-pinned");
    }

    /// Rehashes to a new capacity, evicting from the LRU tail until the
    /// resident set fits.
    pub fn set_capacity(&self, new_capacity: usize) {
        let mut inner = self.inner.lock().expect("NN cache lock was poisoned");

        inner.capacity = new_capacity;

        while inner.resident.len() > inner.capacity {
            evict_one(&mut inner);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("NN cache lock was poisoned").resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("NN cache lock was poisoned").capacity
    }

    /// Per-mille fill estimate, for `OnThinkingInfo`'s `hashfull` field.
    pub fn hashfull(&self) -> u32 {
        let inner = self.inner.lock().expect("NN cache lock was poisoned");

        if inner.capacity == 0 {
            0
        } else {
            ((inner.resident.len() * 1000) / inner.capacity) as u32
        }
    }
}

fn evict_one(inner: &mut Inner) {
    let victim = match inner.order.pop_back() {
        Some(hash) => hash,
        None => return
    };

    if let Some(slot) = inner.resident.remove(&victim) {
        if slot.pins > 0 {
            inner.evicted_pinned.entry(victim).or_default().push(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: f32) -> CacheEntry {
        CacheEntry { value, policy: vec![(0, 1.0)] }
    }

    #[test]
    fn lookup_misses_on_empty_cache() {
        let cache = NNCache::with_capacity(4);

        assert!(cache.lookup(Hash::from(1)).is_none());
    }

    #[test]
    fn insert_then_lookup_hits() {
        let cache = NNCache::with_capacity(4);
        cache.insert(Hash::from(1), entry(0.5), false);

        let handle = cache.lookup(Hash::from(1)).unwrap();

        assert_eq!(handle.entry().value, 0.5);
        cache.unpin(handle);
    }

    #[test]
    fn capacity_zero_is_a_passthrough() {
        let cache = NNCache::with_capacity(0);
        cache.insert(Hash::from(1), entry(0.5), false);

        assert!(cache.lookup(Hash::from(1)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn eviction_respects_capacity() {
        let cache = NNCache::with_capacity(2);

        cache.insert(Hash::from(1), entry(0.1), false);
        cache.insert(Hash::from(2), entry(0.2), false);
        cache.insert(Hash::from(3), entry(0.3), false);

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(Hash::from(1)).is_none());
    }

    #[test]
    fn pinned_entry_survives_eviction_until_unpinned() {
        let cache = NNCache::with_capacity(1);

        cache.insert(Hash::from(1), entry(0.1), false);
        let handle = cache.lookup(Hash::from(1)).unwrap();

        // evicts hash 1 from the resident set, but it is pinned so it
        // must not be destroyed yet.
        cache.insert(Hash::from(2), entry(0.2), false);
        assert_eq!(handle.entry().value, 0.1);

        cache.unpin(handle);
    }

    #[test]
    fn set_capacity_shrinks_resident_set() {
        let cache = NNCache::with_capacity(4);

        cache.insert(Hash::from(1), entry(0.1), false);
        cache.insert(Hash::from(2), entry(0.2), false);
        cache.set_capacity(1);

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hashfull_reflects_occupancy() {
        let cache = NNCache::with_capacity(4);
        cache.insert(Hash::from(1), entry(0.1), false);

        assert_eq!(cache.hashfull(), 250);
    }
}
