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

//! Backend-agnostic resource descriptors and identifiers.

use serde::{Deserialize, Serialize};

/// The pipeline stage a shader module is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment (pixel) stage.
    Fragment,
    /// Compute stage.
    Compute,
}

/// The shape of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureDimension {
    /// A plain two-dimensional texture.
    D2,
    /// A six-faced cube map.
    Cube,
}

/// Texel formats the asset pipeline produces.
///
/// The set mirrors what image decoding can emit: single- and dual-channel
/// data stays linear, anything with color is widened to four channels and
/// kept in sRGB space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// One 8-bit channel, linear.
    R8Unorm,
    /// Two 8-bit channels, linear.
    Rg8Unorm,
    /// Four 8-bit channels, sRGB.
    Rgba8UnormSrgb,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8UnormSrgb => 4,
        }
    }
}

/// A two-dimensional extent in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent2d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

/// Description of a shader module to create.
#[derive(Debug)]
pub struct ShaderModuleDescriptor<'a> {
    /// A debug label, usually the asset path.
    pub label: Option<&'a str>,
    /// The stage the module targets.
    pub stage: ShaderStage,
    /// Compiled shader bytecode.
    pub bytes: &'a [u8],
}

/// Description of a texture to create.
#[derive(Debug)]
pub struct TextureDescriptor<'a> {
    /// A debug label, usually the asset path.
    pub label: Option<&'a str>,
    /// Size of one face.
    pub size: Extent2d,
    /// Texel format.
    pub format: TextureFormat,
    /// Texture shape.
    pub dimension: TextureDimension,
}

/// An opaque backend identifier for a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleId(pub u64);

/// An opaque backend identifier for a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_sizes() {
        assert_eq!(TextureFormat::R8Unorm.bytes_per_texel(), 1);
        assert_eq!(TextureFormat::Rg8Unorm.bytes_per_texel(), 2);
        assert_eq!(TextureFormat::Rgba8UnormSrgb.bytes_per_texel(), 4);
    }
}
