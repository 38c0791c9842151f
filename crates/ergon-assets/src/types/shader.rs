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
use ergon_core::renderer::{ShaderModuleDescriptor, ShaderModuleId, ShaderStage};
use std::sync::Arc;

use crate::cache::AssetCell;
use crate::reader::{self, ReadTarget, ReaderEnv};

/// A device shader module created from compiled bytecode on disk.
///
/// The cache key is the path alone; the stage recorded by the first request
/// wins, which is sound because bytecode on disk is stage-specific anyway.
pub struct ShaderAsset {
    cell: AssetCell<ShaderModuleId>,
    stage: ShaderStage,
}

impl Asset for ShaderAsset {}

impl ShaderAsset {
    pub(crate) fn new(path: &str, stage: ShaderStage) -> Self {
        ShaderAsset {
            cell: AssetCell::new(path.to_string()),
            stage,
        }
    }

    /// The normalized cache path.
    pub fn path(&self) -> &str {
        self.cell.path()
    }

    /// The stage this module was requested for.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Whether the module exists on the device.
    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    /// The device module id. Panics before the load completes.
    pub fn module(&self) -> ShaderModuleId {
        *self.cell.get()
    }

    pub(crate) fn cell(&self) -> &AssetCell<ShaderModuleId> {
        &self.cell
    }
}

impl ReadTarget for ShaderAsset {
    fn path(&self) -> &str {
        self.cell.path()
    }

    fn load_if_unloaded(self: Arc<Self>, env: &ReaderEnv) -> anyhow::Result<()> {
        if self.cell.is_loaded() {
            return Ok(());
        }
        let blob = env.loader.get_blob(self.cell.path());
        reader::wait_until_ready(env, || blob.is_loaded());

        // Module creation is thread-safe on the device; no main-thread hop.
        let module = env.device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(self.cell.path()),
            stage: self.stage,
            bytes: blob.bytes(),
        })?;
        log::debug!("created shader module for '{}'", self.cell.path());
        self.cell.complete(module);
        Ok(())
    }
}
