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

mod common;

use common::StubDevice;
use ergon_assets::{AssetLoader, AssetLoaderConfig};
use ergon_core::renderer::ShaderStage;
use ergon_jobs::{enqueue_on_worker, JobScope, JobSystem};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

#[test]
fn concurrent_shader_requests_collapse_to_one_load() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("shaders")).unwrap();
    std::fs::write(dir.path().join("shaders/basic.vert.spv"), [0x07, 0x23, 0x02, 0x03]).unwrap();

    JobSystem::start();
    let device = Arc::new(StubDevice::default());
    AssetLoader::initialize_with(
        device.clone(),
        AssetLoaderConfig {
            asset_root: dir.path().to_path_buf(),
            ..Default::default()
        },
    );

    let observed = Arc::new(Mutex::new(HashSet::new()));
    {
        let scope = JobScope::nested();
        for _ in 0..64 {
            let observed = observed.clone();
            let outer = scope.handle();
            enqueue_on_worker(move || {
                // Each job is its own requester with its own scope, routed
                // back to the outer scope for the final join.
                let requester = JobScope::adopt(outer);
                let shader = AssetLoader::get_shader("basic.vert.spv", ShaderStage::Vertex);
                requester.dispatch();
                assert!(shader.is_loaded());
                observed.lock().unwrap().insert(shader.module().0);
            });
        }
        scope.dispatch();
    }

    assert_eq!(
        device.shaders_created.load(Ordering::SeqCst),
        1,
        "one load for 64 concurrent requesters"
    );
    assert_eq!(observed.lock().unwrap().len(), 1, "all handles agree");
    assert_eq!(AssetLoader::cache_stats().shaders, 1);

    JobSystem::stop();
    AssetLoader::cleanup();
}
