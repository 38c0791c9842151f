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

//! The scheduler facade: lifecycle, global queues, and the free enqueue
//! functions.

use crossbeam_queue::ArrayQueue;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::context::{self, Role};
use crate::deque::{self, JobStealer};
use crate::job::Job;
use crate::scope::{ScopeHandle, ScopeInner};

/// Capacity of the main- and worker-targeted external queues. Exceeding it
/// is a programmer error and aborts.
pub const EXTERNAL_QUEUE_CAPACITY: usize = 16_384;
/// Capacity of the background queue.
pub const BACKGROUND_QUEUE_CAPACITY: usize = 65_536;
/// Default cap on concurrently running background jobs.
pub const DEFAULT_BACKGROUND_CONCURRENCY: i32 = 2;

/// Scheduler configuration. The defaults match the values the runtime was
/// tuned with; most applications never override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobSystemConfig {
    /// Worker thread count. Defaults to available parallelism minus one for
    /// the main thread, with a floor of one.
    pub worker_count: Option<usize>,
    /// Initial value of the background-concurrency semaphore.
    pub background_concurrency: i32,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        JobSystemConfig {
            worker_count: None,
            background_concurrency: DEFAULT_BACKGROUND_CONCURRENCY,
        }
    }
}

/// State shared by every thread participating in the scheduler.
pub(crate) struct SharedState {
    pub(crate) worker_stealers: Vec<JobStealer>,
    pub(crate) main_stealer: JobStealer,
    pub(crate) main_external: ArrayQueue<Job>,
    pub(crate) worker_external: ArrayQueue<Job>,
    pub(crate) background: ArrayQueue<Job>,
    /// Signed so a transient over-subscription during a quota-releasing
    /// dispatch can be observed and reversed.
    pub(crate) bg_semaphore: AtomicI32,
    pub(crate) stop: AtomicBool,
    /// Parent for background jobs, thread scopes, and anything else that
    /// cannot be attributed to a stack-bound scope. Asserted empty at stop.
    pub(crate) root_scope: ScopeInner,
}

struct Running {
    shared: Arc<SharedState>,
    workers: Vec<JoinHandle<()>>,
}

static SYSTEM: Mutex<Option<Running>> = Mutex::new(None);

fn lock_system() -> std::sync::MutexGuard<'static, Option<Running>> {
    SYSTEM.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn shared() -> Option<Arc<SharedState>> {
    lock_system().as_ref().map(|running| running.shared.clone())
}

fn current_shared() -> Arc<SharedState> {
    context::with_current(|ctx| ctx.map(|ctx| ctx.shared().clone()))
        .or_else(shared)
        .expect("job system not started")
}

fn push_mpmc(queue: &ArrayQueue<Job>, job: Job, what: &str) {
    if queue.push(job).is_err() {
        panic!("{what} queue overflow");
    }
}

/// The scheduler's start/stop/pump surface. The thread that calls
/// [`JobSystem::start`] becomes the main thread.
pub struct JobSystem;

impl JobSystem {
    /// Starts the scheduler with default configuration.
    pub fn start() {
        Self::start_with(JobSystemConfig::default());
    }

    /// Starts the scheduler: binds the calling thread as main and spawns the
    /// worker pool.
    ///
    /// # Panics
    /// Panics if the system is already running.
    pub fn start_with(config: JobSystemConfig) {
        let mut guard = lock_system();
        assert!(guard.is_none(), "job system already started");

        let worker_count = config.worker_count.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
                .saturating_sub(1)
                .max(1)
        });

        let (main_queue, main_stealer) = deque::deque();
        let mut worker_queues = Vec::with_capacity(worker_count);
        let mut worker_stealers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (queue, stealer) = deque::deque();
            worker_queues.push(queue);
            worker_stealers.push(stealer);
        }

        let shared = Arc::new(SharedState {
            worker_stealers,
            main_stealer,
            main_external: ArrayQueue::new(EXTERNAL_QUEUE_CAPACITY),
            worker_external: ArrayQueue::new(EXTERNAL_QUEUE_CAPACITY),
            background: ArrayQueue::new(BACKGROUND_QUEUE_CAPACITY),
            bg_semaphore: AtomicI32::new(config.background_concurrency),
            stop: AtomicBool::new(false),
            root_scope: ScopeInner::standalone(),
        });

        context::bind(shared.clone(), main_queue, Role::Main, "main");

        let mut workers = Vec::with_capacity(worker_count);
        for (index, queue) in worker_queues.into_iter().enumerate() {
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("worker{index}"))
                .spawn(move || context::run_worker(shared, queue, index))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        log::info!("Job system started with {worker_count} worker threads.");
        *guard = Some(Running { shared, workers });
    }

    /// Stops the scheduler: drains the main thread's scope, signals the
    /// workers, joins them, and verifies that nothing was left behind.
    ///
    /// # Panics
    /// Panics if the system is not running, if a worker panicked, or if any
    /// queue or the root scope is non-empty at the end.
    pub fn stop() {
        let running = lock_system().take().expect("job system not running");

        // Retire the main context first so its thread scope drains while the
        // workers are still around to help.
        context::finish();

        running.shared.stop.store(true, Ordering::Release);
        for worker in running.workers {
            worker.join().expect("worker thread panicked");
        }

        let shared = &running.shared;
        assert_eq!(
            shared.root_scope.pending(),
            0,
            "root scope still pending at shutdown"
        );
        assert!(
            shared.main_external.is_empty()
                && shared.worker_external.is_empty()
                && shared.background.is_empty(),
            "external queues not empty at shutdown"
        );
        assert!(shared.main_stealer.is_empty(), "main deque not empty at shutdown");
        for stealer in &shared.worker_stealers {
            assert!(stealer.is_empty(), "worker deque not empty at shutdown");
        }
        log::info!("Job system stopped.");
    }

    /// Pumps the calling thread's active scope until it completes. This is
    /// the reentry point used from the main thread's event loop.
    pub fn dispatch() {
        context::with_current(|ctx| {
            let ctx = ctx.expect("JobSystem::dispatch requires a job-system thread");
            let active = ctx.active_scope();
            debug_assert!(!active.is_null());
            unsafe { (*active).dispatch(ctx) };
        });
    }

    /// Adjusts the background-concurrency semaphore by `diff` at runtime.
    pub fn modify_background_concurrency(diff: i32) {
        current_shared().bg_semaphore.fetch_add(diff, Ordering::SeqCst);
    }
}

/// Enqueues `f` on the calling thread's active scope, pushed on its own
/// deque. This is the closest equivalent of "spawn".
///
/// # Panics
/// Panics if the calling thread has no job-system context.
pub fn enqueue<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    context::with_current(|ctx| {
        let ctx = ctx.expect("enqueue requires a job-system thread");
        let active = ctx.active_scope();
        debug_assert!(!active.is_null());
        let mut job = Job::new(f);
        job.set_scope(active);
        unsafe { (*active).add_pending(1) };
        ctx.push_local(job);
    });
}

/// Enqueues `f` to run on the main thread during one of its dispatches.
///
/// The job is attributed to the caller's active scope when the caller is a
/// scheduler thread, and to the root scope otherwise (reader threads).
/// Main-targeted jobs run in FIFO order among themselves, but only when the
/// main thread actually dispatches.
pub fn enqueue_on_main<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    enqueue_external(f, ExternalTarget::Main);
}

/// Enqueues `f` to run on any worker, without going through a deque. Scope
/// attribution matches [`enqueue_on_main`].
pub fn enqueue_on_worker<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    enqueue_external(f, ExternalTarget::Worker);
}

enum ExternalTarget {
    Main,
    Worker,
}

fn enqueue_external<F>(f: F, target: ExternalTarget)
where
    F: FnOnce() + Send + 'static,
{
    let shared = current_shared();
    let mut job = Job::new(f);
    let attributed = context::with_current(|ctx| match ctx {
        Some(ctx) => ctx.active_scope(),
        None => &shared.root_scope as *const ScopeInner,
    });
    job.set_scope(attributed);
    // Bookkeeping happens at push time; the invocation decrements once.
    unsafe { (*attributed).add_pending(1) };
    match target {
        ExternalTarget::Main => push_mpmc(&shared.main_external, job, "main-external"),
        ExternalTarget::Worker => push_mpmc(&shared.worker_external, job, "worker-external"),
    }
}

/// Enqueues `f` on the background queue: attributed to the root scope and
/// consumed only while the background-concurrency quota holds.
pub fn enqueue_background<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    let shared = current_shared();
    let mut job = Job::new(f);
    job.set_scope(&shared.root_scope);
    shared.root_scope.add_pending(1);
    push_mpmc(&shared.background, job, "background");
}

/// A completion token for the calling thread's active scope, or `None` when
/// the thread is not a scheduler thread. This is how asynchronous services
/// (the asset cache) attach in-flight work to whichever scope requested it.
pub fn active_scope_handle() -> Option<ScopeHandle> {
    context::with_current(|ctx| {
        ctx.map(|ctx| {
            let active = ctx.active_scope();
            debug_assert!(!active.is_null());
            ScopeHandle::from_raw(active)
        })
    })
}
