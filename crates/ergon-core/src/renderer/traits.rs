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

//! The device and command-list contracts.

use super::api::{ShaderModuleDescriptor, ShaderModuleId, TextureDescriptor, TextureId};
use super::error::DeviceError;
use std::fmt::Debug;
use std::sync::Arc;

/// Defines the abstract interface for a graphics device.
///
/// This trait is the asset cache's entire view of the GPU. Resource creation
/// is callable from any thread; executing a command list is only valid on
/// the thread that owns the rendering context, which is why the asset
/// pipeline routes submissions through the scheduler's main-thread queue.
pub trait RenderDevice: Send + Sync + Debug + 'static {
    /// Creates a shader module from compiled bytecode.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] if the bytecode is rejected by the backend.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<ShaderModuleId, DeviceError>;

    /// Creates a texture resource. The contents are undefined until an
    /// upload recorded on a [`CommandList`] has executed.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] if the descriptor is invalid for the backend.
    fn create_texture(&self, descriptor: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError>;

    /// Creates a command list for recording resource uploads.
    ///
    /// Command lists are internally synchronized handles; the asset pipeline
    /// records on one thread and executes on the main thread.
    fn create_command_list(&self) -> Arc<dyn CommandList>;

    /// Executes a closed command list.
    ///
    /// Must be called on the thread that owns the rendering context.
    ///
    /// # Errors
    /// Returns a [`DeviceError`] if the submission is rejected.
    fn execute_command_list(&self, list: &dyn CommandList) -> Result<(), DeviceError>;
}

/// A recording surface for resource-upload commands.
///
/// Implementations are reference-counted handles with interior mutation, so
/// recording takes `&self`. A list is reused across many loads: open,
/// record, close, execute, then open again.
pub trait CommandList: Send + Sync {
    /// Begins recording. Must not be called on a list that is already open.
    fn open(&self);

    /// Records a full-texture upload.
    ///
    /// `bytes_per_row` is the tightly-packed row pitch of `data`.
    fn write_texture(&self, texture: TextureId, data: &[u8], bytes_per_row: u32);

    /// Ends recording. The list can then be executed by the device.
    fn close(&self);
}
