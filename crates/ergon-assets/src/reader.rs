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

//! The reader-thread pool.
//!
//! A small fixed number of threads block on the shared read-request channel
//! and drive each popped asset's load routine. Readers are not scheduler
//! threads: they never run jobs. They may however re-enter the loader to
//! request sub-assets, and while waiting for one they *help* by draining
//! further read requests, so a dependency chain deeper than the pool size
//! cannot deadlock it.

use crossbeam_channel::{Receiver, Sender};
use ergon_core::renderer::{CommandList, RenderDevice};
use std::sync::Arc;

use crate::loader::LoaderState;

/// One message on the read-request channel. `Shutdown` makes the receiving
/// reader exit; the loader sends one per reader at cleanup.
pub(crate) enum ReadRequest {
    Load(Arc<dyn ReadTarget>),
    Shutdown,
}

/// The reader-side interface of a cache entry.
pub(crate) trait ReadTarget: Send + Sync {
    fn path(&self) -> &str;
    /// Drives the load to (or towards) completion. Idempotent under the
    /// single-request-per-entry rule; errors are fatal to the process.
    fn load_if_unloaded(self: Arc<Self>, env: &ReaderEnv) -> anyhow::Result<()>;
}

/// What a load routine can reach: the device, this reader's reusable
/// command list, the request channel (for helping), and the loader itself
/// (for sub-requests).
pub(crate) struct ReaderEnv {
    pub(crate) device: Arc<dyn RenderDevice>,
    pub(crate) command_list: Arc<dyn CommandList>,
    pub(crate) requests: Receiver<ReadRequest>,
    pub(crate) sender: Sender<ReadRequest>,
    pub(crate) loader: Arc<LoaderState>,
}

/// The reader thread body. The command list is created once per reader and
/// reused across loads; it dies with the thread.
pub(crate) fn run_reader(loader: Arc<LoaderState>, name: &str) {
    let env = ReaderEnv {
        device: loader.device().clone(),
        command_list: loader.device().create_command_list(),
        requests: loader.requests(),
        sender: loader.sender(),
        loader,
    };
    log::trace!("{name} started");
    loop {
        match env.requests.recv() {
            Ok(ReadRequest::Load(target)) => serve(target, &env),
            Ok(ReadRequest::Shutdown) | Err(_) => break,
        }
    }
    log::trace!("{name} stopped");
}

fn serve(target: Arc<dyn ReadTarget>, env: &ReaderEnv) {
    let path = target.path().to_string();
    log::trace!("loading asset '{path}'");
    if let Err(error) = target.load_if_unloaded(env) {
        // No recovery path: a missing or corrupt asset is fatal. An unwind
        // would leave waiters pending forever, so end the process instead.
        log::error!("Failed to load asset '{path}': {error:#}");
        std::process::abort();
    }
}

/// Blocks the calling reader until `ready` reports true, servicing other
/// read requests in the meantime. A `Shutdown` popped mid-wait is returned
/// to the channel for the pool.
pub(crate) fn wait_until_ready(env: &ReaderEnv, ready: impl Fn() -> bool) {
    while !ready() {
        match env.requests.try_recv() {
            Ok(ReadRequest::Load(target)) => serve(target, env),
            Ok(ReadRequest::Shutdown) => {
                env.sender
                    .try_send(ReadRequest::Shutdown)
                    .unwrap_or_else(|_| panic!("read-request queue overflow"));
            }
            Err(_) => std::thread::yield_now(),
        }
    }
}
