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

//! The per-entry load-state cell.
//!
//! An [`AssetCell`] carries one asset's cache identity (its normalized
//! path), its write-once payload, and the list of scopes waiting for the
//! load. The contract every asset kind builds on:
//!
//! - the payload is written exactly once, before `loaded` is raised with
//!   release ordering, so any thread observing [`AssetCell::is_loaded`]
//!   also observes the fully-written payload;
//! - every scope registered before completion is signalled exactly once
//!   (its [`ScopeHandle`] is dropped while the cell's lock is held);
//! - a scope registering after completion is not recorded at all.

use ergon_jobs::ScopeHandle;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Load-state and payload storage for one cache entry.
pub struct AssetCell<T> {
    path: String,
    loaded: AtomicBool,
    waiters: Mutex<Vec<ScopeHandle>>,
    payload: UnsafeCell<Option<T>>,
}

// The payload is only written under the waiters lock before `loaded` is
// raised, and only read immutably afterwards.
unsafe impl<T: Send + Sync> Sync for AssetCell<T> {}

impl<T> AssetCell<T> {
    pub(crate) fn new(path: String) -> Self {
        AssetCell {
            path,
            loaded: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
            payload: UnsafeCell::new(None),
        }
    }

    /// The normalized cache path of this entry.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the load has completed. Once true, the payload is readable.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Immutable access to the payload.
    ///
    /// # Panics
    /// Panics if the load has not completed; callers synchronize through a
    /// scope dispatch or [`AssetCell::is_loaded`] first.
    pub fn get(&self) -> &T {
        assert!(
            self.is_loaded(),
            "asset '{}' accessed before its load completed",
            self.path
        );
        unsafe { (*self.payload.get()).as_ref().expect("payload set before the loaded flag") }
    }

    /// Adds the calling thread's active scope to the waiter list, raising
    /// its pending count, unless the load has already completed (then the
    /// caller may read the payload immediately and nothing is recorded).
    ///
    /// Threads without a scheduler context (reader threads) register
    /// nothing; they wait by helping, see the reader pool.
    pub(crate) fn register_current_scope(&self) {
        if self.is_loaded() {
            return;
        }
        if let Some(handle) = ergon_jobs::active_scope_handle() {
            let mut waiters = self.lock_waiters();
            if self.is_loaded() {
                // Completed between the check and the lock; the handle drop
                // releases the transient increment.
                return;
            }
            waiters.push(handle);
        }
    }

    /// Publishes the payload and signals every waiting scope exactly once.
    pub(crate) fn complete(&self, payload: T) {
        let mut waiters = self.lock_waiters();
        assert!(!self.is_loaded(), "asset '{}' completed twice", self.path);
        unsafe { *self.payload.get() = Some(payload) };
        self.loaded.store(true, Ordering::Release);
        // Dropping each handle is the exactly-once decrement.
        waiters.clear();
        log::trace!("asset '{}' loaded", self.path);
    }

    fn lock_waiters(&self) -> std::sync::MutexGuard<'_, Vec<ScopeHandle>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_publishes_the_payload() {
        let cell = AssetCell::new("textures/grid.png".to_string());
        assert!(!cell.is_loaded());
        cell.complete(vec![1u8, 2, 3]);
        assert!(cell.is_loaded());
        assert_eq!(cell.get(), &vec![1u8, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "accessed before its load completed")]
    fn get_before_completion_panics() {
        let cell: AssetCell<Vec<u8>> = AssetCell::new("textures/missing.png".to_string());
        let _ = cell.get();
    }

    #[test]
    fn registration_without_a_scheduler_thread_is_a_no_op() {
        // This test thread has no job-system context, so nothing is recorded
        // and completion has no one to signal.
        let cell = AssetCell::new("blob.bin".to_string());
        cell.register_current_scope();
        cell.complete(7u32);
        assert_eq!(*cell.get(), 7);
        // Late registration after completion is equally a no-op.
        cell.register_current_scope();
    }
}
