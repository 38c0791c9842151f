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

//! Per-thread scheduler state and the dispatch loop.
//!
//! Every thread that participates in the scheduler owns one
//! [`ThreadContext`]: its work-stealing deque, its role (main or worker),
//! the currently active scope, and the implicit thread scope that is
//! dispatched when the context finishes. The single-dispatch step probes
//! work sources in a fixed order; the worker main loop wraps it in a
//! progressively lighter backoff.

use std::cell::{Cell, UnsafeCell};
use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::deque::JobDeque;
use crate::job::Job;
use crate::scope::ScopeInner;
use crate::system::SharedState;

/// Consecutive jobless iterations before a worker stops spin-pausing and
/// starts yielding to the OS scheduler.
const SPIN_TO_YIELD: u64 = 1_000;
/// Consecutive jobless iterations before a worker starts sleeping.
const YIELD_TO_SLEEP: u64 = 10_000;
/// Short enough to stay responsive, long enough to mostly eliminate CPU use.
const IDLE_SLEEP: Duration = Duration::from_millis(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Main,
    Worker(usize),
}

/// Dispatch counters in the spirit of the scheduler's debug stats: logged
/// once when the context retires.
#[derive(Default)]
struct Stats {
    run_own: Cell<u64>,
    steal_main: Cell<u64>,
    steal_worker: Cell<u64>,
    external: Cell<u64>,
    background: Cell<u64>,
    pauses: Cell<u64>,
    yields: Cell<u64>,
    sleeps: Cell<u64>,
}

impl Stats {
    fn log(&self, name: &str) {
        log::debug!(
            "{name} retired: own={} steal-main={} steal-worker={} external={} background={} pause={} yield={} sleep={}",
            self.run_own.get(),
            self.steal_main.get(),
            self.steal_worker.get(),
            self.external.get(),
            self.background.get(),
            self.pauses.get(),
            self.yields.get(),
            self.sleeps.get(),
        );
    }
}

pub(crate) struct ThreadContext {
    shared: Arc<SharedState>,
    queue: JobDeque,
    role: Role,
    name: String,
    /// Worker index at which the next steal probe starts; moved to the last
    /// productive victim so repeated steals stay local.
    steal_start: Cell<usize>,
    active_scope: Cell<*const ScopeInner>,
    thread_scope: Box<ScopeInner>,
    /// How much of the shared background quota this thread currently holds.
    bg_quota_used: Cell<i32>,
    stats: Stats,
}

thread_local! {
    static CONTEXT: UnsafeCell<Option<ThreadContext>> = const { UnsafeCell::new(None) };
}

/// Runs `f` with the calling thread's context, if it has one.
///
/// Contexts are only installed and removed while no jobs are running on the
/// thread, so handing out shared references here is sound even though
/// dispatching re-enters this function from inside jobs.
pub(crate) fn with_current<R>(f: impl FnOnce(Option<&ThreadContext>) -> R) -> R {
    CONTEXT.with(|slot| f(unsafe { (*slot.get()).as_ref() }))
}

/// Installs a context on the calling thread and charges its thread scope to
/// the root scope.
pub(crate) fn bind(shared: Arc<SharedState>, queue: JobDeque, role: Role, name: &str) {
    CONTEXT.with(|slot| {
        let slot = slot.get();
        unsafe {
            assert!(
                (*slot).is_none(),
                "thread '{name}' already has a job-system context"
            );
            let steal_start = match role {
                Role::Main => 0,
                Role::Worker(index) => (index + 1) % shared.worker_stealers.len().max(1),
            };
            *slot = Some(ThreadContext {
                shared,
                queue,
                role,
                name: name.to_string(),
                steal_start: Cell::new(steal_start),
                active_scope: Cell::new(ptr::null()),
                thread_scope: Box::new(ScopeInner::standalone()),
                bg_quota_used: Cell::new(0),
                stats: Stats::default(),
            });
            let ctx = (*slot).as_mut().unwrap();
            let ctx_ptr: *const ThreadContext = ctx;
            let root: *const ScopeInner = &ctx.shared.root_scope;
            ctx.thread_scope.set_context(ctx_ptr);
            ctx.thread_scope.set_parent(root);
            ctx.shared.root_scope.add_pending(1);
            let thread_scope: *const ScopeInner = &*ctx.thread_scope;
            ctx.active_scope.set(thread_scope);
        }
        log::trace!("job context bound on '{name}'");
    });
}

/// Dispatches the implicit thread scope, retires it against the root scope,
/// and removes the context from the thread.
pub(crate) fn finish() {
    CONTEXT.with(|slot| {
        let slot = slot.get();
        {
            let Some(ctx) = (unsafe { (*slot).as_ref() }) else {
                return;
            };
            ctx.thread_scope.dispatch(ctx);
            unsafe { (*ctx.thread_scope.parent()).complete_one() };
            ctx.active_scope.set(ptr::null());
            ctx.stats.log(&ctx.name);
        }
        unsafe { *slot = None };
    });
}

/// The worker thread body: bind, pump with backoff until told to stop,
/// drain, retire.
pub(crate) fn run_worker(shared: Arc<SharedState>, queue: JobDeque, index: usize) {
    let name = format!("worker{index}");
    bind(shared, queue, Role::Worker(index), &name);
    with_current(|ctx| {
        let ctx = ctx.expect("worker context was just bound");
        let mut jobless_iterations: u64 = 0;
        while !ctx.shared.stop.load(Ordering::Acquire) {
            while ctx.dispatch_one() {
                jobless_iterations = 0;
            }
            // Nothing found after looking once at every source; get
            // progressively lighter on the CPU.
            jobless_iterations += 1;
            if jobless_iterations < SPIN_TO_YIELD {
                ctx.stats.pauses.set(ctx.stats.pauses.get() + 1);
                std::hint::spin_loop();
            } else if jobless_iterations < YIELD_TO_SLEEP {
                ctx.stats.yields.set(ctx.stats.yields.get() + 1);
                std::thread::yield_now();
            } else {
                ctx.stats.sleeps.set(ctx.stats.sleeps.get() + 1);
                std::thread::sleep(IDLE_SLEEP);
            }
        }
    });
    finish();
    log::trace!("{name} stopped");
}

impl ThreadContext {
    pub(crate) fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub(crate) fn is_main(&self) -> bool {
        self.role == Role::Main
    }

    pub(crate) fn active_scope(&self) -> *const ScopeInner {
        self.active_scope.get()
    }

    pub(crate) fn set_active_scope(&self, scope: *const ScopeInner) {
        self.active_scope.set(scope);
    }

    pub(crate) fn background_quota_used(&self) -> i32 {
        self.bg_quota_used.get()
    }

    pub(crate) fn push_local(&self, job: Job) {
        self.queue.push(job);
    }

    /// Runs at most one job. The probe order is fixed: own deque, the main
    /// deque (workers only), the other workers' deques starting at the
    /// rolling index, the external queue for this thread's role, and finally
    /// the background queue under the quota gate.
    pub(crate) fn dispatch_one(&self) -> bool {
        if let Some(job) = self.queue.pop() {
            self.stats.run_own.set(self.stats.run_own.get() + 1);
            unsafe { job.run() };
            return true;
        }

        if !self.is_main() {
            if let Some(job) = self.shared.main_stealer.steal() {
                self.stats.steal_main.set(self.stats.steal_main.get() + 1);
                unsafe { job.run() };
                return true;
            }
        }

        let stealers = &self.shared.worker_stealers;
        let count = stealers.len();
        for probe in 0..count {
            let index = (self.steal_start.get() + probe) % count;
            if self.role == Role::Worker(index) {
                continue;
            }
            if let Some(job) = stealers[index].steal() {
                self.stats
                    .steal_worker
                    .set(self.stats.steal_worker.get() + 1);
                // Start at this victim next time; it is likely still loaded.
                self.steal_start.set(index);
                unsafe { job.run() };
                return true;
            }
        }

        let external = match self.role {
            Role::Main => &self.shared.main_external,
            Role::Worker(_) => &self.shared.worker_external,
        };
        if let Some(job) = external.pop() {
            self.stats.external.set(self.stats.external.get() + 1);
            unsafe { job.run() };
            return true;
        }

        // Background work only runs while the shared quota stays non-negative.
        if self.shared.bg_semaphore.fetch_sub(1, Ordering::SeqCst) - 1 >= 0 {
            if let Some(job) = self.shared.background.pop() {
                self.stats.background.set(self.stats.background.get() + 1);
                self.bg_quota_used.set(self.bg_quota_used.get() + 1);
                unsafe { job.run() };
                self.bg_quota_used.set(self.bg_quota_used.get() - 1);
                self.shared.bg_semaphore.fetch_add(1, Ordering::SeqCst);
                return true;
            }
        }
        self.shared.bg_semaphore.fetch_add(1, Ordering::SeqCst);
        false
    }

    /// Runs every job currently in the main-external queue. Main thread only.
    pub(crate) fn drain_main_external(&self) {
        debug_assert!(self.is_main());
        while let Some(job) = self.shared.main_external.pop() {
            self.stats.external.set(self.stats.external.get() + 1);
            unsafe { job.run() };
        }
    }
}
