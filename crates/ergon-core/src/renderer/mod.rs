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

//! Graphics-device abstraction consumed by the asset cache.
//!
//! The runtime never talks to a concrete graphics API. Resource creation and
//! upload submission go through the [`traits::RenderDevice`] and
//! [`traits::CommandList`] contracts, which a backend crate (or a test
//! double) implements.

pub mod api;
pub mod error;
pub mod traits;

pub use api::*;
pub use error::DeviceError;
pub use traits::{CommandList, RenderDevice};
