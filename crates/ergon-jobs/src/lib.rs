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

//! # Ergon Jobs
//!
//! A work-stealing job scheduler built for a real-time main loop: the main
//! thread spawns thousands of small jobs, a pool of workers executes them in
//! parallel, and [`JobScope`] lets any thread wait for a named subset of that
//! work to finish while still pumping jobs itself.
//!
//! The moving parts:
//!
//! - every participating thread owns a work-stealing deque; jobs enqueued
//!   locally run in LIFO order until another thread steals them,
//! - bounded MPMC queues target work at a thread role (`enqueue_on_main`,
//!   `enqueue_on_worker`) that the deques cannot express,
//! - a background queue gated by a concurrency quota absorbs I/O-adjacent
//!   work ([`enqueue_background`]),
//! - [`JobScope`] is a hierarchical pending-work counter: dropping a scope
//!   dispatches until every job attributed to it has returned.
//!
//! ```no_run
//! use ergon_jobs::{JobScope, JobSystem};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! JobSystem::start();
//! let counter = Arc::new(AtomicU32::new(0));
//! {
//!     let scope = JobScope::nested();
//!     for _ in 0..100 {
//!         let counter = counter.clone();
//!         scope.enqueue(move || {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         });
//!     }
//! } // dropping the scope blocks (while helping) until all 100 jobs ran
//! assert_eq!(counter.load(Ordering::Relaxed), 100);
//! JobSystem::stop();
//! ```

mod context;
mod deque;
mod job;
mod scope;
mod system;

pub use job::JOB_INLINE_SIZE;
pub use scope::{JobScope, ScopeHandle};
pub use system::{
    active_scope_handle, enqueue, enqueue_background, enqueue_on_main, enqueue_on_worker,
    JobSystem, JobSystemConfig, BACKGROUND_QUEUE_CAPACITY, DEFAULT_BACKGROUND_CONCURRENCY,
    EXTERNAL_QUEUE_CAPACITY,
};
