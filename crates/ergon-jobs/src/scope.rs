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

//! Hierarchical completion scopes.
//!
//! A [`JobScope`] counts the work attributed to it: every enqueue increments
//! the counter, every completed job decrements it, and [`JobScope::dispatch`]
//! pumps the scheduler on the calling thread until the counter reads zero.
//! Dropping a scope dispatches, so a scope's stack lifetime strictly
//! contains the lifetime of every job charged to it.
//!
//! Scopes form a chain per thread (the active-scope stack) and a hierarchy
//! across threads (the parent link): a scope created on a worker can be
//! parented to a scope owned by the main thread, so the main thread observes
//! the worker-side work as its own pending count.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::context::{self, ThreadContext};
use crate::job::Job;

/// The scope state proper. Boxed inside [`JobScope`] so the owning value can
/// move while enqueued jobs and handles hold a stable pointer to it.
pub(crate) struct ScopeInner {
    /// The thread context this scope dispatches on. Null for the root scope.
    context: *const ThreadContext,
    /// The previously active scope on that thread, restored on drop.
    prev_active: *const ScopeInner,
    /// Non-owning parent link; may belong to a different thread.
    parent: *const ScopeInner,
    pending: AtomicI32,
}

// Cross-thread access is limited to the pending counter; `dispatch` asserts
// it runs on the captured thread.
unsafe impl Send for ScopeInner {}
unsafe impl Sync for ScopeInner {}

impl ScopeInner {
    /// A scope with no thread binding and no parent: the root scope, and
    /// scaffolding for tests.
    pub(crate) fn standalone() -> ScopeInner {
        ScopeInner {
            context: ptr::null(),
            prev_active: ptr::null(),
            parent: ptr::null(),
            pending: AtomicI32::new(0),
        }
    }

    pub(crate) fn set_context(&mut self, context: *const ThreadContext) {
        self.context = context;
    }

    pub(crate) fn set_parent(&mut self, parent: *const ScopeInner) {
        self.parent = parent;
    }

    pub(crate) fn parent(&self) -> *const ScopeInner {
        self.parent
    }

    pub(crate) fn add_pending(&self, diff: i32) {
        self.pending.fetch_add(diff, Ordering::SeqCst);
    }

    /// The exactly-once decrement paired with one prior increment.
    pub(crate) fn complete_one(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "scope pending counter went negative");
    }

    pub(crate) fn pending(&self) -> i32 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Pumps `ctx` until this scope's counter reads zero.
    ///
    /// Any background quota the thread currently holds is released for the
    /// duration: this thread is about to block on work that may itself need
    /// the quota, and the transient over-subscription is accepted.
    pub(crate) fn dispatch(&self, ctx: &ThreadContext) {
        assert!(
            ptr::eq(self.context, ctx),
            "scope dispatched on a thread other than the one that created it"
        );
        let quota = ctx.background_quota_used();
        ctx.shared().bg_semaphore.fetch_add(quota, Ordering::SeqCst);
        while self.pending.load(Ordering::Acquire) > 0 {
            if !ctx.dispatch_one() {
                std::hint::spin_loop();
            }
        }
        ctx.shared().bg_semaphore.fetch_sub(quota, Ordering::SeqCst);
        // On the main thread a dispatch also drains the main-targeted queue,
        // even for jobs unrelated to this scope.
        if ctx.is_main() {
            ctx.drain_main_external();
        }
    }
}

/// A completion token for a [`JobScope`].
///
/// Creating a handle increments the scope's pending counter and dropping it
/// decrements it, so while any handle is live the scope's `dispatch` cannot
/// return and the scope stays valid. Handles are how asynchronous work that
/// is not itself a job (an in-flight asset load, work on another thread)
/// attaches its completion to a scope, and how a scope crosses threads to
/// become the parent of a [`JobScope::adopt`]ed child.
pub struct ScopeHandle {
    scope: *const ScopeInner,
}

unsafe impl Send for ScopeHandle {}

impl ScopeHandle {
    pub(crate) fn from_raw(scope: *const ScopeInner) -> ScopeHandle {
        unsafe { (*scope).add_pending(1) };
        ScopeHandle { scope }
    }

    /// Releases ownership of the +1 without decrementing.
    pub(crate) fn into_raw(self) -> *const ScopeInner {
        let scope = self.scope;
        std::mem::forget(self);
        scope
    }
}

impl Clone for ScopeHandle {
    fn clone(&self) -> Self {
        ScopeHandle::from_raw(self.scope)
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        unsafe { (*self.scope).complete_one() };
    }
}

/// A hierarchical pending-work counter bound to the constructing thread.
///
/// See the [module documentation](self) for the lifecycle. A scope must be
/// dropped (or dispatched) on the thread that created it; leaking one with
/// live handles or jobs abandons that work and trips the root-scope assert
/// at shutdown.
pub struct JobScope {
    inner: Box<ScopeInner>,
    // Scopes are thread-bound for dispatching; keep the value on its thread.
    _not_send: PhantomData<*const ()>,
}

impl JobScope {
    /// Creates a scope nested in the calling thread's active scope: the
    /// active scope becomes both the parent and the scope restored on drop.
    ///
    /// # Panics
    /// Panics if the calling thread has no job-system context.
    pub fn nested() -> JobScope {
        context::with_current(|ctx| {
            let ctx = ctx.expect("JobScope::nested requires a job-system thread");
            let active = ctx.active_scope();
            debug_assert!(!active.is_null());
            unsafe { (*active).add_pending(1) };
            Self::install(ctx, active, active)
        })
    }

    /// Creates a scope with an explicit parent reachable by reference.
    pub fn child_of(parent: &JobScope) -> JobScope {
        Self::adopt(parent.handle())
    }

    /// Creates a scope whose parent is the scope behind `parent`, consuming
    /// the handle: the +1 it holds becomes the child's registration with the
    /// parent, so the parent cannot complete before the child is dropped.
    ///
    /// This is the thread-hop constructor: a worker job can adopt a handle
    /// to a main-thread scope and have that scope observe the worker-side
    /// completion.
    pub fn adopt(parent: ScopeHandle) -> JobScope {
        context::with_current(|ctx| {
            let ctx = ctx.expect("JobScope::adopt requires a job-system thread");
            let parent = parent.into_raw();
            Self::install(ctx, ctx.active_scope(), parent)
        })
    }

    fn install(
        ctx: &ThreadContext,
        prev_active: *const ScopeInner,
        parent: *const ScopeInner,
    ) -> JobScope {
        let inner = Box::new(ScopeInner {
            context: ctx,
            prev_active,
            parent,
            pending: AtomicI32::new(0),
        });
        ctx.set_active_scope(&*inner);
        JobScope {
            inner,
            _not_send: PhantomData,
        }
    }

    /// Attaches external completion: the counter is raised by `diff` now and
    /// must be lowered by exactly the same amount later (see [`ScopeHandle`]
    /// for the RAII form).
    pub fn add_pending_count(&self, diff: i32) {
        self.inner.add_pending(diff);
    }

    /// Creates a completion token for this scope.
    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle::from_raw(&*self.inner)
    }

    /// Enqueues `f` attributed to this scope, pushed on the calling thread's
    /// own deque.
    ///
    /// # Panics
    /// Panics if the calling thread has no job-system context.
    pub fn enqueue<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        context::with_current(|ctx| {
            let ctx = ctx.expect("JobScope::enqueue requires a job-system thread");
            let mut job = Job::new(f);
            job.set_scope(&*self.inner);
            self.inner.add_pending(1);
            ctx.push_local(job);
        })
    }

    /// Pumps the scheduler on the calling thread until every job and handle
    /// attributed to this scope has completed.
    ///
    /// # Panics
    /// Panics if called from a thread other than the one that created the
    /// scope.
    pub fn dispatch(&self) {
        context::with_current(|ctx| {
            let ctx = ctx.expect("JobScope::dispatch requires a job-system thread");
            self.inner.dispatch(ctx);
        })
    }
}

impl Drop for JobScope {
    fn drop(&mut self) {
        context::with_current(|ctx| {
            let ctx = ctx.expect("JobScope dropped off its owning thread");
            self.inner.dispatch(ctx);
            ctx.set_active_scope(self.inner.prev_active);
            if !self.inner.parent.is_null() {
                unsafe { (*self.inner.parent).complete_one() };
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_pin_the_pending_counter() {
        let inner = Box::new(ScopeInner::standalone());
        let first = ScopeHandle::from_raw(&*inner);
        assert_eq!(inner.pending(), 1);
        let second = first.clone();
        assert_eq!(inner.pending(), 2);
        drop(first);
        assert_eq!(inner.pending(), 1);
        drop(second);
        assert_eq!(inner.pending(), 0);
    }

    #[test]
    fn into_raw_transfers_the_increment() {
        let inner = Box::new(ScopeInner::standalone());
        let handle = ScopeHandle::from_raw(&*inner);
        let raw = handle.into_raw();
        assert_eq!(inner.pending(), 1);
        unsafe { (*raw).complete_one() };
        assert_eq!(inner.pending(), 0);
    }
}
