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

//! # Ergon Assets
//!
//! An asynchronous asset cache layered on the job scheduler. Each `get_*`
//! call returns a cheap ref-counted handle immediately; the actual file read
//! happens on a dedicated reader thread, decode and GPU-resource creation
//! follow on the reader, and anything that must touch the rendering context
//! (command-list submission) is forwarded to the main thread through the
//! scheduler.
//!
//! Concurrent requests for the same path are deduplicated to a single load,
//! and every requesting [`JobScope`](ergon_jobs::JobScope) is signalled
//! exactly once when the load completes: a scope that requested assets can
//! simply dispatch and then read them.

mod cache;
mod handle;
mod loader;
mod map;
mod reader;
mod types;

pub use handle::AssetHandle;
pub use loader::{AssetLoader, AssetLoaderConfig, CacheStats};
pub use types::{BlobAsset, ImageAsset, ImagePayload, ShaderAsset, TextureAsset};
