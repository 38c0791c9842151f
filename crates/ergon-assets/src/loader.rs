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

//! The asset-loader facade: lifecycle, typed entry points, and path
//! normalization.

use crossbeam_channel::{Receiver, Sender};
use ergon_core::renderer::{RenderDevice, ShaderStage, TextureDimension};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::handle::AssetHandle;
use crate::map::AssetMap;
use crate::reader::{self, ReadRequest, ReadTarget};
use crate::types::{BlobAsset, ImageAsset, ShaderAsset, TextureAsset};

/// Capacity of the read-request channel. Exceeding it is a programmer error
/// and aborts.
pub(crate) const READ_QUEUE_CAPACITY: usize = 16_384;
/// Default reader-thread count.
const READER_THREAD_COUNT: usize = 2;

/// Fixed directory prefix applied to shader paths.
const SHADER_DIR: &str = "shaders/";
/// Fixed directory prefix applied to image and texture paths.
const TEXTURE_DIR: &str = "textures/";

/// Asset-loader configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetLoaderConfig {
    /// Directory all asset paths are resolved against.
    pub asset_root: PathBuf,
    /// Number of blocking reader threads.
    pub reader_threads: usize,
}

impl Default for AssetLoaderConfig {
    fn default() -> Self {
        AssetLoaderConfig {
            asset_root: PathBuf::from("."),
            reader_threads: READER_THREAD_COUNT,
        }
    }
}

/// Entry counts per cache, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached raw file blobs.
    pub blobs: usize,
    /// Cached decoded images.
    pub images: usize,
    /// Cached shader modules.
    pub shaders: usize,
    /// Cached textures, all dimensions.
    pub textures: usize,
}

/// The loader's shared state: the device, one map per asset type, and the
/// read-request channel.
pub(crate) struct LoaderState {
    device: Arc<dyn RenderDevice>,
    config: AssetLoaderConfig,
    blobs: AssetMap<BlobAsset>,
    images: AssetMap<ImageAsset>,
    shaders: AssetMap<ShaderAsset>,
    textures_2d: AssetMap<TextureAsset>,
    textures_cube: AssetMap<TextureAsset>,
    sender: Sender<ReadRequest>,
    receiver: Receiver<ReadRequest>,
}

impl LoaderState {
    pub(crate) fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    pub(crate) fn requests(&self) -> Receiver<ReadRequest> {
        self.receiver.clone()
    }

    pub(crate) fn sender(&self) -> Sender<ReadRequest> {
        self.sender.clone()
    }

    fn queue_read(&self, target: Arc<dyn ReadTarget>) {
        self.sender
            .try_send(ReadRequest::Load(target))
            .unwrap_or_else(|_| panic!("read-request queue overflow"));
    }

    pub(crate) fn get_blob(&self, path: &str) -> AssetHandle<BlobAsset> {
        let handle = self.blobs.get_or_create(
            path,
            || BlobAsset::new(path, &self.config.asset_root),
            |asset| self.queue_read(asset.clone()),
        );
        handle.cell().register_current_scope();
        handle
    }

    pub(crate) fn get_image(&self, path: &str) -> AssetHandle<ImageAsset> {
        let path = normalize(path, TEXTURE_DIR);
        let handle = self.images.get_or_create(
            &path,
            || ImageAsset::new(&path),
            |asset| self.queue_read(asset.clone()),
        );
        handle.cell().register_current_scope();
        handle
    }

    pub(crate) fn get_shader(&self, path: &str, stage: ShaderStage) -> AssetHandle<ShaderAsset> {
        let path = normalize(path, SHADER_DIR);
        let handle = self.shaders.get_or_create(
            &path,
            || ShaderAsset::new(&path, stage),
            |asset| self.queue_read(asset.clone()),
        );
        handle.cell().register_current_scope();
        handle
    }

    pub(crate) fn get_texture(
        &self,
        path: &str,
        dimension: TextureDimension,
    ) -> AssetHandle<TextureAsset> {
        let path = normalize(path, TEXTURE_DIR);
        let map = match dimension {
            TextureDimension::D2 => &self.textures_2d,
            TextureDimension::Cube => &self.textures_cube,
        };
        let handle = map.get_or_create(
            &path,
            || TextureAsset::new(&path, dimension),
            |asset| self.queue_read(asset.clone()),
        );
        handle.cell().register_current_scope();
        handle
    }
}

/// Applies the fixed directory prefix unless the caller already did.
/// Runs before the map lookup so equivalent paths collapse to one entry.
fn normalize(path: &str, prefix: &str) -> String {
    if path.starts_with(prefix) {
        path.to_string()
    } else {
        format!("{prefix}{path}")
    }
}

struct LoaderHandle {
    state: Arc<LoaderState>,
    readers: Vec<JoinHandle<()>>,
}

static LOADER: Mutex<Option<LoaderHandle>> = Mutex::new(None);

fn lock_loader() -> std::sync::MutexGuard<'static, Option<LoaderHandle>> {
    LOADER.lock().unwrap_or_else(PoisonError::into_inner)
}

fn current() -> Arc<LoaderState> {
    lock_loader()
        .as_ref()
        .map(|handle| handle.state.clone())
        .expect("asset loader not initialized")
}

/// The asset loader's static surface.
pub struct AssetLoader;

impl AssetLoader {
    /// Initializes the loader with default configuration.
    pub fn initialize(device: Arc<dyn RenderDevice>) {
        Self::initialize_with(device, AssetLoaderConfig::default());
    }

    /// Records the device and starts the reader threads.
    ///
    /// # Panics
    /// Panics if the loader is already initialized.
    pub fn initialize_with(device: Arc<dyn RenderDevice>, config: AssetLoaderConfig) {
        let mut guard = lock_loader();
        assert!(guard.is_none(), "asset loader already initialized");

        let (sender, receiver) = crossbeam_channel::bounded(READ_QUEUE_CAPACITY);
        let reader_threads = config.reader_threads.max(1);
        let state = Arc::new(LoaderState {
            device,
            config,
            blobs: AssetMap::new(),
            images: AssetMap::new(),
            shaders: AssetMap::new(),
            textures_2d: AssetMap::new(),
            textures_cube: AssetMap::new(),
            sender,
            receiver,
        });

        let mut readers = Vec::with_capacity(reader_threads);
        for index in 0..reader_threads {
            let state = state.clone();
            let name = format!("reader{index}");
            let thread_name = name.clone();
            readers.push(
                std::thread::Builder::new()
                    .name(thread_name)
                    .spawn(move || reader::run_reader(state, &name))
                    .expect("failed to spawn reader thread"),
            );
        }

        log::info!("Asset loader initialized with {reader_threads} reader threads.");
        *guard = Some(LoaderHandle { state, readers });
    }

    /// Stops the reader threads and drops every cache entry and the device.
    ///
    /// Call after the caller has quiesced all loads (no scope is waiting on
    /// an asset) and, for GPU resources, after the device is idle.
    ///
    /// # Panics
    /// Panics if the loader is not initialized or a reader panicked.
    pub fn cleanup() {
        let handle = lock_loader().take().expect("asset loader not initialized");
        for _ in 0..handle.readers.len() {
            handle
                .state
                .sender
                .try_send(ReadRequest::Shutdown)
                .unwrap_or_else(|_| panic!("read-request queue overflow"));
        }
        for reader in handle.readers {
            reader.join().expect("reader thread panicked");
        }
        handle.state.blobs.clear();
        handle.state.images.clear();
        handle.state.shaders.clear();
        handle.state.textures_2d.clear();
        handle.state.textures_cube.clear();
        assert!(
            handle.state.receiver.is_empty(),
            "read-request queue not drained at cleanup"
        );
        log::info!("Asset loader cleaned up.");
    }

    /// Drops cache entries nothing outside the cache refers to, returning
    /// how many were dropped. In incremental mode each participating map
    /// drops at most one entry, bounding the per-frame cost.
    ///
    /// Only the CPU-side maps (blobs, images) participate: shader and
    /// texture entries hold device resources whose destruction must wait
    /// for the device to quiesce, so they are only released in
    /// [`AssetLoader::cleanup`].
    pub fn garbage_collect(incremental: bool) -> usize {
        let state = current();
        let dropped =
            state.blobs.garbage_collect(incremental) + state.images.garbage_collect(incremental);
        if dropped > 0 {
            log::trace!("asset GC dropped {dropped} entries");
        }
        dropped
    }

    /// Entry counts per cache.
    pub fn cache_stats() -> CacheStats {
        let state = current();
        CacheStats {
            blobs: state.blobs.len(),
            images: state.images.len(),
            shaders: state.shaders.len(),
            textures: state.textures_2d.len() + state.textures_cube.len(),
        }
    }

    /// The raw bytes of a file, read asynchronously on a reader thread.
    pub fn get_blob(path: &str) -> AssetHandle<BlobAsset> {
        current().get_blob(path)
    }

    /// A decoded image under the texture directory.
    pub fn get_image(path: &str) -> AssetHandle<ImageAsset> {
        current().get_image(path)
    }

    /// A device shader module under the shader directory.
    pub fn get_shader(path: &str, stage: ShaderStage) -> AssetHandle<ShaderAsset> {
        current().get_shader(path, stage)
    }

    /// A device texture under the texture directory. The dimension is part
    /// of the cache identity: the same file can back both a plain texture
    /// and a cube map.
    pub fn get_texture(path: &str, dimension: TextureDimension) -> AssetHandle<TextureAsset> {
        current().get_texture(path, dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        assert_eq!(normalize("sky.vert.spv", SHADER_DIR), "shaders/sky.vert.spv");
        assert_eq!(
            normalize("shaders/sky.vert.spv", SHADER_DIR),
            "shaders/sky.vert.spv"
        );
        assert_eq!(normalize("grid.png", TEXTURE_DIR), "textures/grid.png");
        assert_eq!(
            normalize("textures/grid.png", TEXTURE_DIR),
            "textures/grid.png"
        );
    }
}
