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
use std::{ops::Deref, sync::Arc};

/// A thread-safe, reference-counted handle to a cached asset.
///
/// This struct acts as a smart pointer providing shared ownership of one
/// cache entry. Cloning is a single atomic increment and never duplicates
/// the underlying data; the entry stays alive while any handle (or the
/// cache itself) holds it.
///
/// The handle dereferences to the asset type, so `handle.is_loaded()` and
/// the typed accessors are available directly. A handle is valid before the
/// load completes; only the payload accessors require `is_loaded()`.
#[derive(Debug)]
pub struct AssetHandle<T: Asset>(Arc<T>);

impl<T: Asset> AssetHandle<T> {
    pub(crate) fn from_arc(asset: Arc<T>) -> Self {
        Self(asset)
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    /// Clones the handle, incrementing the reference count to the entry.
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    /// Provides transparent, immutable access to the cache entry.
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
