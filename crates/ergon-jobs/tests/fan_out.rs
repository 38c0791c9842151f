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

use ergon_jobs::{enqueue, JobScope, JobSystem};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

// One scheduler per process; tests in this binary take turns being "main".
static SCHEDULER: Mutex<()> = Mutex::new(());

fn with_scheduler(test: impl FnOnce()) {
    let _guard = SCHEDULER.lock().unwrap_or_else(|e| e.into_inner());
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    JobSystem::start();
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(test));
    JobSystem::stop();
    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
}

#[test]
fn scope_drop_waits_for_enqueued_jobs() {
    with_scheduler(|| {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let scope = JobScope::nested();
            for _ in 0..100 {
                let counter = counter.clone();
                scope.enqueue(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    });
}

#[test]
fn free_enqueue_attributes_to_the_active_scope() {
    with_scheduler(|| {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let _scope = JobScope::nested();
            for _ in 0..50 {
                let counter = counter.clone();
                enqueue(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 50);
    });
}

#[test]
fn fan_out_counts_a_million() {
    with_scheduler(|| {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let scope = JobScope::nested();
            for _ in 0..1_000 {
                let counter = counter.clone();
                let outer = scope.handle();
                scope.enqueue(move || {
                    // Runs on whatever thread picked the job up; the child
                    // scope routes completion back to the outer scope.
                    let child = JobScope::adopt(outer);
                    for _ in 0..1_000 {
                        let counter = counter.clone();
                        child.enqueue(move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                });
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1_000_000);
    });
}

#[test]
fn handles_attach_external_completion() {
    with_scheduler(|| {
        let done = Arc::new(AtomicU32::new(0));
        let scope = JobScope::nested();
        let token = scope.handle();
        let done_in_thread = done.clone();
        // A plain OS thread, not a scheduler thread: the handle is the only
        // link back to the scope.
        let external = thread::spawn(move || {
            done_in_thread.store(7, Ordering::Release);
            drop(token);
        });
        scope.dispatch();
        assert_eq!(done.load(Ordering::Acquire), 7);
        external.join().unwrap();
    });
}
