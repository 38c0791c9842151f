// Copyright 2025 eraflo
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

//! The keyed, deduplicating cache for one asset type.

use ahash::AHashMap;
use ergon_core::asset::Asset;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::handle::AssetHandle;

/// A mutex-protected map from normalized path to cache entry.
///
/// Two concurrent lookups of the same path observe the same entry; the
/// entry factory and the `on_insert` action (queueing the read request) run
/// under the map lock, so at most one read request exists per path.
pub(crate) struct AssetMap<T: Asset> {
    entries: Mutex<AHashMap<String, Arc<T>>>,
}

impl<T: Asset> AssetMap<T> {
    pub(crate) fn new() -> Self {
        AssetMap {
            entries: Mutex::new(AHashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AHashMap<String, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry for `path`, creating it (and running `on_insert`
    /// under the lock) on first request.
    pub(crate) fn get_or_create(
        &self,
        path: &str,
        create: impl FnOnce() -> T,
        on_insert: impl FnOnce(&Arc<T>),
    ) -> AssetHandle<T> {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(path) {
            return AssetHandle::from_arc(existing.clone());
        }
        let asset = Arc::new(create());
        entries.insert(path.to_string(), asset.clone());
        on_insert(&asset);
        AssetHandle::from_arc(asset)
    }

    /// Drops entries the map is the sole holder of. In incremental mode at
    /// most one entry is dropped per call. Returns the number dropped.
    pub(crate) fn garbage_collect(&self, incremental: bool) -> usize {
        let mut entries = self.lock();
        if incremental {
            let key = entries
                .iter()
                .find(|(_, asset)| Arc::strong_count(asset) == 1)
                .map(|(key, _)| key.clone());
            match key {
                Some(key) => {
                    entries.remove(&key);
                    1
                }
                None => 0,
            }
        } else {
            let before = entries.len();
            entries.retain(|_, asset| Arc::strong_count(asset) > 1);
            before - entries.len()
        }
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ergon_core::asset::Asset;

    struct Named(&'static str);
    impl Asset for Named {}

    #[test]
    fn second_lookup_reuses_the_entry() {
        let map: AssetMap<Named> = AssetMap::new();
        let mut inserts = 0;
        let first = map.get_or_create("a", || Named("a"), |_| inserts += 1);
        let second = map.get_or_create("a", || Named("a"), |_| inserts += 1);
        assert_eq!(inserts, 1);
        assert!(std::ptr::eq(&*first, &*second));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn gc_drops_only_sole_holder_entries() {
        let map: AssetMap<Named> = AssetMap::new();
        let kept = map.get_or_create("kept", || Named("kept"), |_| {});
        let dropped = map.get_or_create("dropped", || Named("dropped"), |_| {});
        drop(dropped);
        assert_eq!(map.garbage_collect(false), 1);
        assert_eq!(map.len(), 1);
        // The retained entry is still reachable.
        assert_eq!(kept.0, "kept");
    }

    #[test]
    fn incremental_gc_drops_at_most_one() {
        let map: AssetMap<Named> = AssetMap::new();
        for name in ["a", "b", "c"] {
            drop(map.get_or_create(name, || Named("x"), |_| {}));
        }
        assert_eq!(map.garbage_collect(true), 1);
        assert_eq!(map.len(), 2);
        assert_eq!(map.garbage_collect(true), 1);
        assert_eq!(map.garbage_collect(true), 1);
        assert_eq!(map.garbage_collect(true), 0);
        assert_eq!(map.len(), 0);
    }
}
