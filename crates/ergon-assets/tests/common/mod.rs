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

//! A counting stub device for asset tests.

// Not every test binary uses every helper here.
#![allow(dead_code)]

use ergon_core::renderer::{
    CommandList, DeviceError, RenderDevice, ShaderModuleDescriptor, ShaderModuleId,
    TextureDescriptor, TextureId,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct StubDevice {
    next_id: AtomicU64,
    pub shaders_created: AtomicU32,
    pub textures_created: AtomicU32,
    pub submissions: AtomicU32,
}

#[derive(Debug, Default)]
pub struct StubCommandList {
    open: AtomicBool,
    pub writes: AtomicU32,
}

impl CommandList for StubCommandList {
    fn open(&self) {
        assert!(
            !self.open.swap(true, Ordering::SeqCst),
            "command list opened twice"
        );
    }

    fn write_texture(&self, _texture: TextureId, data: &[u8], bytes_per_row: u32) {
        assert!(self.open.load(Ordering::SeqCst), "write on a closed list");
        assert!(bytes_per_row > 0);
        assert_eq!(data.len() as u32 % bytes_per_row, 0, "ragged upload rows");
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        assert!(
            self.open.swap(false, Ordering::SeqCst),
            "command list closed while not open"
        );
    }
}

impl RenderDevice for StubDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<ShaderModuleId, DeviceError> {
        assert!(!descriptor.bytes.is_empty(), "empty shader bytecode");
        self.shaders_created.fetch_add(1, Ordering::SeqCst);
        Ok(ShaderModuleId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn create_texture(&self, _descriptor: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError> {
        self.textures_created.fetch_add(1, Ordering::SeqCst);
        Ok(TextureId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn create_command_list(&self) -> Arc<dyn CommandList> {
        Arc::new(StubCommandList::default())
    }

    fn execute_command_list(&self, _list: &dyn CommandList) -> Result<(), DeviceError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Makes `log` output from the scheduler and the loader visible in test
/// runs. Safe to call from every test; only the first call wins.
pub fn init_logging() {
    use env_logger::{Builder, Env};
    let _ = Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

/// Polls `condition` until it holds or a generous timeout elapses.
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
