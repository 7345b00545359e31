//! Shared test utilities for the pressroom test suite.
//!
//! Provides a recording plugin for asserting hook order and a small content
//! tree builder for tests that run real stages against a temp directory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let rec = Recorder::new();
//! manager.register_plugin(rec.plugin("a", &[Stage::Load]));
//! manager.run_to(Stage::Load).unwrap();
//! assert_eq!(rec.events(), vec!["a:load"]);
//!
//! let site = Site::new();
//! site.write("posts/hello.md", "+++\ntitle = \"Hello\"\n+++\nBody");
//! let manager = Manager::with_config(site.config());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::Config;
use crate::plugin::FnPlugin;
use crate::stage::Stage;

// =========================================================================
// Recording plugins
// =========================================================================

/// Shared log of `"plugin:stage"` events.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A plugin that logs every hook call for `stages` at default priority.
    pub fn plugin(&self, name: &str, stages: &[Stage]) -> FnPlugin {
        self.plugin_with_priority(name, stages, crate::plugin::priority::DEFAULT)
    }

    pub fn plugin_with_priority(&self, name: &str, stages: &[Stage], priority: i32) -> FnPlugin {
        let mut plugin = FnPlugin::new(name);
        for &stage in stages {
            let events = Arc::clone(&self.events);
            let tag = format!("{name}:{stage}");
            plugin = plugin
                .on(stage, move |_| {
                    events.lock().push(tag.clone());
                    Ok(())
                })
                .with_priority(stage, priority);
        }
        plugin
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

// =========================================================================
// Content trees
// =========================================================================

/// A temp directory laid out as `content/`, `public/` and `cache/`.
pub struct Site {
    tmp: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("content")).unwrap();
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root().join("content")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("public")
    }

    /// Write a file under `content/`, creating parent directories.
    pub fn write(&self, rel: &str, text: &str) {
        let path = self.content_dir().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.content_dir().join(rel)).unwrap();
    }

    /// Read a file under `public/`.
    pub fn output(&self, rel: &str) -> String {
        fs::read_to_string(self.output_dir().join(rel)).unwrap()
    }

    /// Default config with every directory inside the temp root.
    pub fn config(&self) -> Config {
        Config {
            content_dir: self.content_dir(),
            output_dir: self.output_dir(),
            cache_dir: self.root().join("cache"),
            ..Config::default()
        }
    }
}
