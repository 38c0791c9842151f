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

use ergon_jobs::{enqueue_on_main, enqueue_on_worker, JobScope, JobSystem};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

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
fn main_targeted_jobs_run_on_the_main_thread() {
    with_scheduler(|| {
        let main_id = thread::current().id();
        let ran_on: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
        {
            let scope = JobScope::nested();
            let ran_on = ran_on.clone();
            scope.enqueue(move || {
                enqueue_on_main(move || {
                    *ran_on.lock().unwrap() = Some(thread::current().id());
                });
            });
        } // the drop dispatch also drains the main-external queue
        assert_eq!(*ran_on.lock().unwrap(), Some(main_id));
    });
}

#[test]
fn main_external_queue_preserves_fifo_order() {
    with_scheduler(|| {
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..8u32 {
            let log = log.clone();
            enqueue_on_main(move || {
                log.lock().unwrap().push(i);
            });
        }
        JobSystem::dispatch();
        assert_eq!(*log.lock().unwrap(), (0..8).collect::<Vec<_>>());
    });
}

#[test]
fn worker_targeted_jobs_do_not_run_on_main() {
    with_scheduler(|| {
        let main_id = thread::current().id();
        let hits = Arc::new(AtomicU32::new(0));
        {
            let scope = JobScope::nested();
            for _ in 0..32 {
                let token = scope.handle();
                let hits = hits.clone();
                enqueue_on_worker(move || {
                    assert_ne!(thread::current().id(), main_id);
                    hits.fetch_add(1, Ordering::Relaxed);
                    drop(token);
                });
            }
            scope.dispatch();
        }
        assert_eq!(hits.load(Ordering::Relaxed), 32);
    });
}
