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

//! The per-thread work-stealing deque (Chase–Lev).
//!
//! One thread owns the bottom end ([`JobDeque::push`] / [`JobDeque::pop`]);
//! any number of other threads race on the top end through cloned
//! [`JobStealer`] handles. The owner only contends with stealers on the last
//! remaining element. The ring buffer grows by publishing a larger copy;
//! retired buffers are kept alive until the deque itself is dropped so
//! concurrent stealers never read freed memory.

use crossbeam_utils::CachePadded;
use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicIsize, AtomicPtr, Ordering};
use std::sync::{Arc, Mutex};

use crate::job::Job;

const INITIAL_CAPACITY: usize = 256;

struct Buffer {
    slots: Box<[UnsafeCell<MaybeUninit<Job>>]>,
}

impl Buffer {
    fn new(cap: usize) -> Buffer {
        debug_assert!(cap.is_power_of_two());
        let mut slots = Vec::with_capacity(cap);
        slots.resize_with(cap, || UnsafeCell::new(MaybeUninit::uninit()));
        Buffer {
            slots: slots.into_boxed_slice(),
        }
    }

    fn cap(&self) -> usize {
        self.slots.len()
    }

    /// Bitwise write of `job` into the slot for `index`.
    unsafe fn write(&self, index: isize, job: Job) {
        let slot = &self.slots[index as usize & (self.cap() - 1)];
        unsafe { (*slot.get()).write(job) };
    }

    /// Bitwise copy out of the slot for `index`. Ownership of the job is
    /// only established by the caller winning the subsequent CAS on `top`.
    unsafe fn read(&self, index: isize) -> Job {
        let slot = &self.slots[index as usize & (self.cap() - 1)];
        unsafe { (*slot.get()).assume_init_read() }
    }
}

struct Inner {
    top: CachePadded<AtomicIsize>,
    bottom: CachePadded<AtomicIsize>,
    buffer: AtomicPtr<Buffer>,
    /// Outgrown buffers, freed only when the deque itself dies. A stealer
    /// that loaded the old buffer pointer reads entries identical to the
    /// live buffer's, and the CAS on `top` decides ownership either way.
    retired: Mutex<Vec<*mut Buffer>>,
}

unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Inner {
    /// Owner-only. Publishes a buffer of twice the capacity containing the
    /// live `[top, bottom)` range.
    unsafe fn grow(&self, bottom: isize, top: isize) -> *mut Buffer {
        let old = self.buffer.load(Ordering::Relaxed);
        let new = Box::into_raw(Box::new(Buffer::new(unsafe { (*old).cap() } * 2)));
        let mut i = top;
        while i < bottom {
            unsafe { (*new).write(i, (*old).read(i)) };
            i += 1;
        }
        self.retired
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(old);
        self.buffer.store(new, Ordering::Release);
        new
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Remaining jobs are abandoned without running; the scheduler
        // asserts emptiness at shutdown before this can happen.
        unsafe { drop(Box::from_raw(*self.buffer.get_mut())) };
        let mut retired = self
            .retired
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for buf in retired.drain(..) {
            unsafe { drop(Box::from_raw(buf)) };
        }
    }
}

/// The owning end of a deque. `Send` so it can move onto its worker thread,
/// but not `Sync`: only one thread may ever push and pop.
pub(crate) struct JobDeque {
    inner: Arc<Inner>,
    _not_sync: PhantomData<Cell<()>>,
}

/// The stealing end. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub(crate) struct JobStealer {
    inner: Arc<Inner>,
}

pub(crate) fn deque() -> (JobDeque, JobStealer) {
    let inner = Arc::new(Inner {
        top: CachePadded::new(AtomicIsize::new(0)),
        bottom: CachePadded::new(AtomicIsize::new(0)),
        buffer: AtomicPtr::new(Box::into_raw(Box::new(Buffer::new(INITIAL_CAPACITY)))),
        retired: Mutex::new(Vec::new()),
    });
    (
        JobDeque {
            inner: inner.clone(),
            _not_sync: PhantomData,
        },
        JobStealer { inner },
    )
}

impl JobDeque {
    /// Pushes a job on the bottom end. Never blocks; grows the ring if full.
    pub(crate) fn push(&self, job: Job) {
        let inner = &*self.inner;
        let b = inner.bottom.load(Ordering::Relaxed);
        let t = inner.top.load(Ordering::Acquire);
        let mut buffer = inner.buffer.load(Ordering::Relaxed);
        if b - t >= unsafe { (*buffer).cap() } as isize {
            buffer = unsafe { inner.grow(b, t) };
        }
        unsafe { (*buffer).write(b, job) };
        fence(Ordering::Release);
        inner.bottom.store(b + 1, Ordering::Relaxed);
    }

    /// Pops the most recently pushed job (LIFO). Returns `None` when the
    /// deque is empty or a stealer won the race for the last element.
    pub(crate) fn pop(&self) -> Option<Job> {
        let inner = &*self.inner;
        let b = inner.bottom.load(Ordering::Relaxed) - 1;
        let buffer = inner.buffer.load(Ordering::Relaxed);
        inner.bottom.store(b, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let t = inner.top.load(Ordering::Relaxed);
        if t <= b {
            let job = unsafe { (*buffer).read(b) };
            if t == b {
                // Last element: settle the race with stealers on `top`.
                if inner
                    .top
                    .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                    .is_err()
                {
                    // A stealer owns it; our bitwise copy must not run.
                    std::mem::forget(job);
                    inner.bottom.store(b + 1, Ordering::Relaxed);
                    return None;
                }
                inner.bottom.store(b + 1, Ordering::Relaxed);
            }
            Some(job)
        } else {
            inner.bottom.store(b + 1, Ordering::Relaxed);
            None
        }
    }
}

impl JobStealer {
    /// Steals the oldest job (FIFO relative to pushes). Returns `None` when
    /// empty or when another consumer won the race.
    pub(crate) fn steal(&self) -> Option<Job> {
        let inner = &*self.inner;
        let t = inner.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let b = inner.bottom.load(Ordering::Acquire);
        if t < b {
            let buffer = inner.buffer.load(Ordering::Acquire);
            let job = unsafe { (*buffer).read(t) };
            if inner
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
            {
                std::mem::forget(job);
                return None;
            }
            Some(job)
        } else {
            None
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        let t = self.inner.top.load(Ordering::SeqCst);
        let b = self.inner.bottom.load(Ordering::SeqCst);
        b <= t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeInner;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn recording_job(scope: &ScopeInner, log: &Arc<Mutex<Vec<usize>>>, value: usize) -> Job {
        let log = log.clone();
        let mut job = Job::new(move || {
            log.lock().unwrap().push(value);
        });
        job.set_scope(scope);
        scope.add_pending(1);
        job
    }

    #[test]
    fn pop_is_lifo() {
        let scope = Box::new(ScopeInner::standalone());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (deque, _stealer) = deque();
        for i in 0..4 {
            deque.push(recording_job(&scope, &log, i));
        }
        while let Some(job) = deque.pop() {
            unsafe { job.run() };
        }
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(scope.pending(), 0);
    }

    #[test]
    fn steal_is_fifo() {
        let scope = Box::new(ScopeInner::standalone());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (deque, stealer) = deque();
        for i in 0..4 {
            deque.push(recording_job(&scope, &log, i));
        }
        while let Some(job) = stealer.steal() {
            unsafe { job.run() };
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(scope.pending(), 0);
    }

    #[test]
    fn growth_preserves_jobs() {
        let scope = Box::new(ScopeInner::standalone());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (deque, _stealer) = deque();
        let n = INITIAL_CAPACITY * 3;
        for i in 0..n {
            deque.push(recording_job(&scope, &log, i));
        }
        let mut ran = 0;
        while let Some(job) = deque.pop() {
            unsafe { job.run() };
            ran += 1;
        }
        assert_eq!(ran, n);
        assert_eq!(scope.pending(), 0);
    }

    #[test]
    fn concurrent_steal_claims_each_job_once() {
        let scope = Arc::new(ScopeInner::standalone());
        let ran = Arc::new(AtomicUsize::new(0));
        let (deque, stealer) = deque();
        let n = 10_000;
        for _ in 0..n {
            let ran = ran.clone();
            let mut job = Job::new(move || {
                ran.fetch_add(1, Ordering::Relaxed);
            });
            job.set_scope(&*scope);
            scope.add_pending(1);
            deque.push(job);
        }

        let mut threads = Vec::new();
        for _ in 0..4 {
            let stealer = stealer.clone();
            threads.push(thread::spawn(move || {
                let mut stolen = 0usize;
                loop {
                    match stealer.steal() {
                        Some(job) => {
                            unsafe { job.run() };
                            stolen += 1;
                        }
                        None if stealer.is_empty() => break,
                        None => {}
                    }
                }
                stolen
            }));
        }
        // The owner drains from the other end at the same time.
        let mut popped = 0usize;
        loop {
            match deque.pop() {
                Some(job) => {
                    unsafe { job.run() };
                    popped += 1;
                }
                None => {
                    if stealer.is_empty() {
                        break;
                    }
                }
            }
        }
        let stolen: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(popped + stolen, n);
        assert_eq!(ran.load(Ordering::Relaxed), n);
        assert_eq!(scope.pending(), 0);
    }
}
