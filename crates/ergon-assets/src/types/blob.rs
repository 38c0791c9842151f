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
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::AssetCell;
use crate::reader::{ReadTarget, ReaderEnv};

/// The raw byte contents of one file. The base of every dependency chain:
/// this is the only asset kind that performs filesystem I/O.
pub struct BlobAsset {
    cell: AssetCell<Vec<u8>>,
    file_path: PathBuf,
}

impl Asset for BlobAsset {}

impl BlobAsset {
    pub(crate) fn new(path: &str, asset_root: &Path) -> Self {
        BlobAsset {
            cell: AssetCell::new(path.to_string()),
            file_path: asset_root.join(path),
        }
    }

    /// The normalized cache path.
    pub fn path(&self) -> &str {
        self.cell.path()
    }

    /// Whether the file contents are available.
    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    /// The file contents. Panics before the load completes.
    pub fn bytes(&self) -> &[u8] {
        self.cell.get()
    }

    pub(crate) fn cell(&self) -> &AssetCell<Vec<u8>> {
        &self.cell
    }
}

impl ReadTarget for BlobAsset {
    fn path(&self) -> &str {
        self.cell.path()
    }

    fn load_if_unloaded(self: Arc<Self>, _env: &ReaderEnv) -> anyhow::Result<()> {
        if self.cell.is_loaded() {
            return Ok(());
        }
        let bytes = fs::read(&self.file_path)
            .with_context(|| format!("Failed to read '{}'", self.file_path.display()))?;
        log::debug!(
            "read blob '{}' ({} bytes)",
            self.cell.path(),
            bytes.len()
        );
        self.cell.complete(bytes);
        Ok(())
    }
}
