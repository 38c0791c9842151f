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

//! The concrete asset kinds and their load routines.
//!
//! The kinds form a dependency chain: a texture loads through an image,
//! which loads through a blob; only the blob touches the filesystem, so one
//! file read serves the whole chain and requests for any level collapse
//! onto the same cached entries.

mod blob;
mod image;
mod shader;
mod texture;

pub use blob::BlobAsset;
pub use image::{ImageAsset, ImagePayload};
pub use shader::ShaderAsset;
pub use texture::TextureAsset;
