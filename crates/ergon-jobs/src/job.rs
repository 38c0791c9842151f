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

//! The type-erased job cell.
//!
//! A job is one cache line: a pointer to the scope it is attributed to, an
//! invoker function pointer, and the closure stored inline. Enqueueing never
//! allocates; a closure that does not fit the inline payload is rejected at
//! compile time and must box its captures.

use std::mem::{self, MaybeUninit};
use std::ptr;

use crate::scope::ScopeInner;

/// Maximum size in bytes of a closure stored inline in a job.
///
/// This is an API contract: one cache line minus the scope pointer and the
/// invoker function pointer. Closures whose captures exceed it must box them.
pub const JOB_INLINE_SIZE: usize = 64 - 2 * mem::size_of::<usize>();

#[repr(C, align(64))]
pub(crate) struct Job {
    scope: *const ScopeInner,
    invoke: unsafe fn(*mut u8),
    payload: [MaybeUninit<u8>; JOB_INLINE_SIZE],
}

// The closure is required to be `Send` at construction; the scope pointer is
// shared across threads by the scope discipline.
unsafe impl Send for Job {}

const _: () = assert!(mem::size_of::<Job>() == 64);

impl Job {
    /// Wraps `f` into inline storage. The scope is attached at enqueue time.
    pub(crate) fn new<F>(f: F) -> Job
    where
        F: FnOnce() + Send + 'static,
    {
        const {
            assert!(
                mem::size_of::<F>() <= JOB_INLINE_SIZE,
                "job closure exceeds the inline payload; box the captures"
            );
            assert!(
                mem::align_of::<F>() <= mem::align_of::<u64>(),
                "job closure alignment exceeds the inline payload alignment"
            );
        }
        let mut job = Job {
            scope: ptr::null(),
            invoke: invoke_erased::<F>,
            payload: [MaybeUninit::uninit(); JOB_INLINE_SIZE],
        };
        unsafe { ptr::write(job.payload.as_mut_ptr().cast::<F>(), f) };
        job
    }

    pub(crate) fn set_scope(&mut self, scope: *const ScopeInner) {
        self.scope = scope;
    }

    /// Invokes the closure, destroying it in place, then signals the scope.
    ///
    /// A panicking job would leave its scope pending forever, so it ends
    /// the process with a diagnostic instead of unwinding.
    ///
    /// # Safety
    /// The job must have a scope attached, and that scope must be pending
    /// (its counter was incremented for this job when it was enqueued).
    pub(crate) unsafe fn run(mut self) {
        let scope = self.scope;
        debug_assert!(!scope.is_null(), "job ran without a scope attached");
        let payload = self.payload.as_mut_ptr().cast::<u8>();
        let invoke = self.invoke;
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe { invoke(payload) }))
            .is_err()
        {
            log::error!("job panicked; the scheduler cannot continue");
            std::process::abort();
        }
        unsafe { (*scope).complete_one() };
    }
}

unsafe fn invoke_erased<F: FnOnce()>(payload: *mut u8) {
    // Moves the closure out of the cell; it is dropped when the call returns.
    let f = unsafe { payload.cast::<F>().read() };
    f();
}
