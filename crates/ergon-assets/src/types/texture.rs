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

use ergon_core::asset::Asset;
use ergon_core::renderer::{CommandList, RenderDevice, TextureDescriptor, TextureDimension, TextureId};
use std::sync::Arc;

use crate::cache::AssetCell;
use crate::reader::{self, ReadTarget, ReaderEnv};

/// A device texture. Loads through the image for the same path: the reader
/// creates the resource and records the pixel upload on its command list,
/// then the submission runs on the main thread, and only that submission
/// marks the texture loaded. A scope that requested the texture therefore
/// spans the file read, the decode, and the main-thread upload.
pub struct TextureAsset {
    cell: AssetCell<TextureId>,
    dimension: TextureDimension,
}

impl Asset for TextureAsset {}

/// Everything the main-thread submission job needs, boxed so the job's
/// closure stays within the scheduler's inline payload.
struct PendingUpload {
    device: Arc<dyn RenderDevice>,
    command_list: Arc<dyn CommandList>,
    asset: Arc<TextureAsset>,
    texture: TextureId,
}

impl TextureAsset {
    pub(crate) fn new(path: &str, dimension: TextureDimension) -> Self {
        TextureAsset {
            cell: AssetCell::new(path.to_string()),
            dimension,
        }
    }

    /// The normalized cache path.
    pub fn path(&self) -> &str {
        self.cell.path()
    }

    /// The shape this texture was requested with.
    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    /// Whether the upload has been submitted on the main thread.
    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    /// The device texture id. Panics before the load completes.
    pub fn texture(&self) -> TextureId {
        *self.cell.get()
    }

    pub(crate) fn cell(&self) -> &AssetCell<TextureId> {
        &self.cell
    }
}

impl ReadTarget for TextureAsset {
    fn path(&self) -> &str {
        self.cell.path()
    }

    fn load_if_unloaded(self: Arc<Self>, env: &ReaderEnv) -> anyhow::Result<()> {
        if self.cell.is_loaded() {
            return Ok(());
        }
        let image = env.loader.get_image(self.cell.path());
        reader::wait_until_ready(env, || image.is_loaded());

        let (texture, bytes_per_row) = {
            let payload = image.payload();
            let texture = env.device.create_texture(&TextureDescriptor {
                label: Some(self.cell.path()),
                size: payload.size,
                format: payload.format,
                dimension: self.dimension,
            })?;
            let bytes_per_row = payload.size.width * payload.format.bytes_per_texel();
            (texture, bytes_per_row)
        };

        env.command_list.open();
        env.command_list
            .write_texture(texture, &image.payload().pixels, bytes_per_row);
        env.command_list.close();
        log::debug!(
            "recorded upload for texture '{}' ({:?})",
            self.cell.path(),
            self.dimension
        );

        // The rendering context is main-thread-bound; completion rides on
        // the submission so waiters only wake once the upload is in flight.
        let upload = Box::new(PendingUpload {
            device: env.device.clone(),
            command_list: env.command_list.clone(),
            asset: self,
            texture,
        });
        ergon_jobs::enqueue_on_main(move || {
            let path = upload.asset.cell.path();
            if let Err(error) = upload.device.execute_command_list(&*upload.command_list) {
                log::error!("Failed to submit texture upload for '{path}': {error}");
                std::process::abort();
            }
            upload.asset.cell.complete(upload.texture);
        });
        Ok(())
    }
}
