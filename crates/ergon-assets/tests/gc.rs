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

use common::{wait_until, StubDevice};
use ergon_assets::AssetLoader;
use ergon_assets::AssetLoaderConfig;
use std::sync::Arc;

// The reader pool works without the scheduler running; callers just poll
// instead of dispatching a scope.
#[test]
fn gc_frees_exactly_the_sole_holder_entries() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.bin"), [1u8, 2, 3]).unwrap();
    std::fs::write(dir.path().join("other.bin"), [4u8]).unwrap();

    AssetLoader::initialize_with(
        Arc::new(StubDevice::default()),
        AssetLoaderConfig {
            asset_root: dir.path().to_path_buf(),
            ..Default::default()
        },
    );

    let blob = AssetLoader::get_blob("data.bin");
    wait_until("blob load", || blob.is_loaded());
    assert_eq!(blob.bytes(), &[1, 2, 3]);

    // An outstanding handle keeps the entry alive through a full collection.
    AssetLoader::garbage_collect(false);
    assert_eq!(AssetLoader::cache_stats().blobs, 1);

    // Once the cache is the sole holder the entry goes. The reader thread
    // may still be letting go of its request reference, so poll.
    drop(blob);
    wait_until("gc of the sole-holder entry", || {
        AssetLoader::garbage_collect(false);
        AssetLoader::cache_stats().blobs == 0
    });

    // A fresh request really reloads: it observes new file contents.
    std::fs::write(dir.path().join("data.bin"), [9u8, 9]).unwrap();
    let blob = AssetLoader::get_blob("data.bin");
    wait_until("blob reload", || blob.is_loaded());
    assert_eq!(blob.bytes(), &[9, 9]);

    // Incremental mode drops at most one entry per call. The waits stop at
    // the first call that actually drops, so each settles exactly one entry.
    let other = AssetLoader::get_blob("other.bin");
    wait_until("second blob load", || other.is_loaded());
    drop(blob);
    drop(other);
    wait_until("first incremental drop", || {
        AssetLoader::garbage_collect(true) == 1
    });
    assert_eq!(AssetLoader::cache_stats().blobs, 1);
    wait_until("second incremental drop", || {
        AssetLoader::garbage_collect(true) == 1
    });
    assert_eq!(AssetLoader::cache_stats().blobs, 0);

    AssetLoader::cleanup();
}
