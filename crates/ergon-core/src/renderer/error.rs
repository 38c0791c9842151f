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

//! Error types for the device abstraction.

use std::fmt;

/// An error raised by a [`RenderDevice`](super::traits::RenderDevice)
/// implementation.
#[derive(Debug)]
pub enum DeviceError {
    /// A shader module could not be created from the supplied bytecode.
    ShaderCreation {
        /// The label of the module being created.
        label: String,
        /// Backend-specific failure details.
        details: String,
    },
    /// A texture resource could not be created.
    TextureCreation {
        /// The label of the texture being created.
        label: String,
        /// Backend-specific failure details.
        details: String,
    },
    /// A recorded command list failed to execute.
    Submission(String),
    /// Any other failure originating in the backend.
    Backend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::ShaderCreation { label, details } => {
                write!(f, "Failed to create shader module '{label}': {details}")
            }
            DeviceError::TextureCreation { label, details } => {
                write!(f, "Failed to create texture '{label}': {details}")
            }
            DeviceError::Submission(msg) => {
                write!(f, "Command list submission failed: {msg}")
            }
            DeviceError::Backend(msg) => {
                write!(f, "Backend-specific device error: {msg}")
            }
        }
    }
}

impl std::error::Error for DeviceError {}
