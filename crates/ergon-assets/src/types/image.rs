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

use anyhow::Context;
use ergon_core::asset::Asset;
use ergon_core::renderer::{Extent2d, TextureFormat};
use std::sync::Arc;

use crate::cache::AssetCell;
use crate::reader::{self, ReadTarget, ReaderEnv};

/// Decoded pixel data, ready for upload.
pub struct ImagePayload {
    /// Tightly packed texels in `format`.
    pub pixels: Vec<u8>,
    /// Image dimensions.
    pub size: Extent2d,
    /// Texel format chosen from the source channel count.
    pub format: TextureFormat,
}

/// A decoded image. Loads through the blob for the same path.
pub struct ImageAsset {
    cell: AssetCell<ImagePayload>,
}

impl Asset for ImageAsset {}

impl ImageAsset {
    pub(crate) fn new(path: &str) -> Self {
        ImageAsset {
            cell: AssetCell::new(path.to_string()),
        }
    }

    /// The normalized cache path.
    pub fn path(&self) -> &str {
        self.cell.path()
    }

    /// Whether the decode has completed.
    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    /// The decoded pixels. Panics before the load completes.
    pub fn payload(&self) -> &ImagePayload {
        self.cell.get()
    }

    pub(crate) fn cell(&self) -> &AssetCell<ImagePayload> {
        &self.cell
    }
}

impl ReadTarget for ImageAsset {
    fn path(&self) -> &str {
        self.cell.path()
    }

    fn load_if_unloaded(self: Arc<Self>, env: &ReaderEnv) -> anyhow::Result<()> {
        if self.cell.is_loaded() {
            return Ok(());
        }
        let blob = env.loader.get_blob(self.cell.path());
        reader::wait_until_ready(env, || blob.is_loaded());

        let decoded = image::load_from_memory(blob.bytes())
            .with_context(|| format!("Failed to decode image '{}'", self.cell.path()))?;

        // Single- and dual-channel data stays linear; anything with color is
        // widened to RGBA and kept in sRGB space.
        let payload = match decoded.color() {
            image::ColorType::L8 => {
                let buffer = decoded.to_luma8();
                ImagePayload {
                    size: Extent2d {
                        width: buffer.width(),
                        height: buffer.height(),
                    },
                    pixels: buffer.into_raw(),
                    format: TextureFormat::R8Unorm,
                }
            }
            image::ColorType::La8 => {
                let buffer = decoded.to_luma_alpha8();
                ImagePayload {
                    size: Extent2d {
                        width: buffer.width(),
                        height: buffer.height(),
                    },
                    pixels: buffer.into_raw(),
                    format: TextureFormat::Rg8Unorm,
                }
            }
            _ => {
                let buffer = decoded.to_rgba8();
                ImagePayload {
                    size: Extent2d {
                        width: buffer.width(),
                        height: buffer.height(),
                    },
                    pixels: buffer.into_raw(),
                    format: TextureFormat::Rgba8UnormSrgb,
                }
            }
        };
        log::debug!(
            "decoded image '{}' ({}x{}, {:?})",
            self.cell.path(),
            payload.size.width,
            payload.size.height,
            payload.format
        );
        self.cell.complete(payload);
        Ok(())
    }
}
