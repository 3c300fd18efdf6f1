#![allow(dead_code)]

pub use assetflow_test_utils::{builders, fake_backend, init_tracing, transforms, transport, with_timeout};

use std::sync::Arc;

use assetflow::fs::mock::MockFileSystem;
use assetflow::fs::FileSystem;

/// A mock project with a couple of source files, rooted at `"."`.
pub fn mock_project(files: &[(&str, &str)]) -> (MockFileSystem, Arc<dyn FileSystem>) {
    let fs = MockFileSystem::new();
    for (path, contents) in files {
        fs.add_file(format!("./{path}"), contents.as_bytes());
    }
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    (fs, shared)
}
