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

//! A headless tour of the runtime: the fan-out self-test, then a texture
//! loaded through the full blob/image/upload chain against a null device,
//! with per-frame incremental garbage collection.

use anyhow::Result;
use ergon_assets::{AssetLoader, AssetLoaderConfig};
use ergon_core::renderer::{
    CommandList, DeviceError, RenderDevice, ShaderModuleDescriptor, ShaderModuleId, ShaderStage,
    TextureDescriptor, TextureDimension, TextureId,
};
use ergon_jobs::{enqueue, JobScope, JobSystem};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A device that accepts everything and renders nothing.
#[derive(Debug, Default)]
struct NullDevice {
    next_id: AtomicU64,
}

#[derive(Debug)]
struct NullCommandList;

impl CommandList for NullCommandList {
    fn open(&self) {}

    fn write_texture(&self, texture: TextureId, data: &[u8], _bytes_per_row: u32) {
        log::debug!("recorded {} upload bytes for {texture:?}", data.len());
    }

    fn close(&self) {}
}

impl RenderDevice for NullDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<ShaderModuleId, DeviceError> {
        log::debug!("created shader module {:?}", descriptor.label);
        Ok(ShaderModuleId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn create_texture(&self, descriptor: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError> {
        log::debug!("created texture {:?}", descriptor.label);
        Ok(TextureId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn create_command_list(&self) -> Arc<dyn CommandList> {
        Arc::new(NullCommandList)
    }

    fn execute_command_list(&self, _list: &dyn CommandList) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// The classic scheduler self-test: a thousand jobs each fan out a thousand
/// more through a child scope, and the outer scope joins them all.
fn fan_out_self_test() {
    let start = Instant::now();
    let counter = Arc::new(AtomicU32::new(0));
    {
        let scope = JobScope::nested();
        for _ in 0..1_000 {
            let counter = counter.clone();
            let outer = scope.handle();
            scope.enqueue(move || {
                let child = JobScope::adopt(outer);
                for _ in 0..1_000 {
                    let counter = counter.clone();
                    child.enqueue(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                }
            });
        }
    }
    log::info!(
        "Fan-out self-test: {} in {} ms",
        counter.load(Ordering::Relaxed),
        start.elapsed().as_millis()
    );
}

fn write_demo_assets(root: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(root.join("textures"))?;
    std::fs::create_dir_all(root.join("shaders"))?;
    let gradient = image::RgbaImage::from_fn(64, 64, |x, y| {
        image::Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255])
    });
    gradient.save(root.join("textures/gradient.png"))?;
    std::fs::write(root.join("shaders/demo.vert.spv"), [0x03, 0x02, 0x23, 0x07])?;
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();

    JobSystem::start();
    fan_out_self_test();

    let asset_root = std::env::temp_dir().join("ergon-sandbox-assets");
    write_demo_assets(&asset_root)?;

    let device: Arc<dyn RenderDevice> = Arc::new(NullDevice::default());
    AssetLoader::initialize_with(
        device,
        AssetLoaderConfig {
            asset_root,
            ..Default::default()
        },
    );

    // Load everything a tiny frame would need, then dispatch the scope:
    // its completion spans the file reads, the decode, and the upload
    // submission that ran back on this thread.
    let start = Instant::now();
    let (texture, shader) = {
        let scope = JobScope::nested();
        let texture = AssetLoader::get_texture("gradient.png", TextureDimension::D2);
        let shader = AssetLoader::get_shader("demo.vert.spv", ShaderStage::Vertex);
        scope.dispatch();
        (texture, shader)
    };
    assert!(texture.is_loaded() && shader.is_loaded());
    log::info!(
        "Assets loaded in {} ms: texture {:?}, shader {:?}",
        start.elapsed().as_millis(),
        texture.texture(),
        shader.module()
    );

    // A few simulated frames: per-frame update jobs joined before "render",
    // incremental GC afterwards, exactly like a frame loop would.
    for frame in 0..3u32 {
        let frame_scope = JobScope::nested();
        for _ in 0..32 {
            enqueue(move || {
                std::hint::black_box(frame);
            });
        }
        frame_scope.dispatch();
        AssetLoader::garbage_collect(true);
    }

    drop(texture);
    drop(shader);

    JobSystem::stop();
    AssetLoader::cleanup();
    log::info!("Sandbox finished cleanly.");
    Ok(())
}
