//! Build configuration.
//!
//! Handles loading, merging and validating `pressroom.toml`. Every field has
//! a default, so a config file only needs to name what it overrides:
//!
//! ```toml
//! title = "Notes"
//! content_dir = "posts"
//!
//! [[feeds]]
//! slug = "rust"
//! title = "Rust posts"
//! filter = "published == true and 'rust' in tags"
//! sort = "date"
//! reverse = true
//! ```
//!
//! Keys the engine doesn't know are kept in [`Config::extra`] for plugins to
//! read; they are part of the build fingerprint like everything else that can
//! change output.
//!
//! Relative directories in a loaded file are resolved against the directory
//! holding that file.

use crate::cache::hash_bytes;
use crate::filter::Filter;
use crate::slug::sanitize_slug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "pressroom.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site title, available to templates.
    pub title: String,
    /// Public base URL of the site. Empty for relative links.
    pub url: String,
    /// Directory holding source documents.
    pub content_dir: PathBuf,
    /// Directory artifacts are written to.
    pub output_dir: PathBuf,
    /// Directory holding the persisted build cache.
    pub cache_dir: PathBuf,
    /// Patterns (relative to `content_dir`) selecting source files.
    /// `*` matches within a path segment, `**` across segments, `?` one char.
    pub glob_patterns: Vec<String>,
    /// When false the cache starts empty every build (it is still saved).
    pub use_cache: bool,
    /// Worker pool size. Absent means one worker per available core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Feeds materialised during `collect`.
    pub feeds: Vec<FeedConfig>,
    /// Plugin-specific settings: every top-level key not listed above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            url: String::new(),
            content_dir: PathBuf::from("content"),
            output_dir: PathBuf::from("public"),
            cache_dir: PathBuf::from(".pressroom-cache"),
            glob_patterns: vec!["**/*.md".to_string()],
            use_cache: true,
            concurrency: None,
            feeds: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// A feed definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Output directory name and identifier. Must be unique.
    pub slug: String,
    pub title: String,
    /// Filter expression selecting the feed's documents.
    pub filter: String,
    /// Field to sort on; empty keeps document order.
    pub sort: String,
    /// Sort descending.
    pub reverse: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            slug: String::new(),
            title: String::new(),
            filter: String::new(),
            sort: "date".to_string(),
            reverse: false,
        }
    }
}

impl Config {
    /// Validate values that deserialization alone can't check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.glob_patterns.is_empty() {
            return Err(ConfigError::Validation(
                "glob_patterns must not be empty".into(),
            ));
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::Validation(
                "concurrency must be at least 1".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for feed in &self.feeds {
            if feed.slug.trim().is_empty() {
                return Err(ConfigError::Validation("feed slug must not be empty".into()));
            }
            let canonical = sanitize_slug(&feed.slug);
            if canonical != feed.slug {
                return Err(ConfigError::Validation(if canonical.is_empty() {
                    format!("feed slug '{}' has no usable characters", feed.slug)
                } else {
                    format!(
                        "feed slug '{}' is not a valid output path (try '{}')",
                        feed.slug, canonical
                    )
                }));
            }
            if !seen.insert(feed.slug.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate feed slug '{}'",
                    feed.slug
                )));
            }
            Filter::parse(&feed.filter).map_err(|e| {
                ConfigError::Validation(format!("feed '{}' filter: {}", feed.slug, e))
            })?;
        }
        Ok(())
    }

    /// Resolve relative directories against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [&mut self.content_dir, &mut self.output_dir, &mut self.cache_dir] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Hash of every setting that can change output bytes.
    ///
    /// Directories, cache switches and concurrency are excluded: they decide
    /// where and how fast the build runs, not what it writes.
    pub fn fingerprint(&self) -> String {
        let mut relevant = self.clone();
        relevant.content_dir = PathBuf::new();
        relevant.output_dir = PathBuf::new();
        relevant.cache_dir = PathBuf::new();
        relevant.use_cache = true;
        relevant.concurrency = None;
        // Struct fields serialize in declaration order and maps are sorted,
        // so the JSON text is canonical.
        let canonical = serde_json::to_string(&relevant).unwrap_or_default();
        hash_bytes(canonical.as_bytes())
    }

    /// Look up a plugin setting from [`Config::extra`].
    pub fn extra(&self, key: &str) -> Option<&toml::Value> {
        self.extra.get(key)
    }
}

/// Resolve the effective worker count.
///
/// - `None` → one worker per available core
/// - `Some(n)` → `n`, never below one
pub fn effective_concurrency(configured: Option<usize>) -> usize {
    configured
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse config text, merge it over the stock defaults and validate.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let overlay: toml::Value = toml::from_str(text)?;
    let merged = merge_toml(stock_defaults_value()?, overlay);
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file.
///
/// A missing file yields the stock defaults. Relative directories are
/// resolved against the file's parent directory in both cases.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };
    config.resolve_paths(base);
    Ok(config)
}

/// Returns a fully-commented stock `pressroom.toml` with all keys and
/// explanations. Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pressroom configuration
# =======================
# Every key is optional; the values below are the defaults.

# Site title, available to templates.
title = "Untitled"

# Public base URL. Leave empty for relative links.
url = ""

# Where source documents live, where output goes, and where the build cache
# is kept. Relative paths are resolved against this file's directory.
content_dir = "content"
output_dir = "public"
cache_dir = ".pressroom-cache"

# Which files under content_dir become documents.
# `*` matches within a path segment, `**` across segments, `?` one character.
glob_patterns = ["**/*.md"]

# Set to false to force a cold build every time.
use_cache = true

# Worker pool size for per-document work. Omit for one worker per core.
# concurrency = 4

# Feeds: named, filtered and sorted views written to <output>/<slug>/.
# [[feeds]]
# slug = "posts"
# title = "All posts"
# filter = "published == true"
# sort = "date"
# reverse = true

# Any other key is passed through untouched for plugins to read.
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.content_dir, PathBuf::from("content"));
        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.glob_patterns, vec!["**/*.md"]);
        assert!(config.use_cache);
        assert!(config.concurrency.is_none());
        assert!(config.feeds.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(r#"title = "Notes""#).unwrap();
        // Overridden value
        assert_eq!(config.title, "Notes");
        // Default values preserved
        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.glob_patterns, vec!["**/*.md"]);
    }

    #[test]
    fn parse_feeds_with_defaults() {
        let config = parse_config(
            r#"
[[feeds]]
slug = "rust"
filter = "'rust' in tags"
"#,
        )
        .unwrap();
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].sort, "date");
        assert!(!config.feeds[0].reverse);
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let config = parse_config(
            r#"
[search]
index = true
"#,
        )
        .unwrap();
        let search = config.extra("search").unwrap();
        assert_eq!(search.get("index").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn feed_unknown_key_is_error() {
        let result = parse_config(
            r#"
[[feeds]]
slug = "x"
colour = "red"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_toml_is_error() {
        assert!(matches!(
            parse_config("this is not valid toml [[["),
            Err(ConfigError::Toml(_))
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn empty_glob_patterns_rejected() {
        let result = parse_config("glob_patterns = []");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let result = parse_config("concurrency = 0");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn duplicate_feed_slugs_rejected() {
        let result = parse_config(
            r#"
[[feeds]]
slug = "a"
[[feeds]]
slug = "a"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(m)) if m.contains("duplicate")));
    }

    #[test]
    fn feed_slugs_must_be_canonical() {
        for (slug, hint) in [
            ("../escaped", "try 'escaped'"),
            ("/etc/feed", "try 'etc/feed'"),
            ("Rust Posts", "try 'rust-posts'"),
            ("a//b", "try 'a/b'"),
            ("..", "no usable characters"),
        ] {
            let result = parse_config(&format!("[[feeds]]\nslug = \"{slug}\"\n"));
            assert!(
                matches!(&result, Err(ConfigError::Validation(m)) if m.contains(hint)),
                "{slug}: {result:?}"
            );
        }
        assert!(parse_config("[[feeds]]\nslug = \"blog/rust\"\n").is_ok());
    }

    #[test]
    fn bad_feed_filter_rejected() {
        let result = parse_config(
            r#"
[[feeds]]
slug = "a"
filter = "published =="
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(m)) if m.contains("feed 'a'")));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_missing_file_uses_defaults_with_resolved_paths() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.content_dir, tmp.path().join("content"));
        assert_eq!(config.cache_dir, tmp.path().join(".pressroom-cache"));
    }

    #[test]
    fn load_config_reads_file_and_keeps_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("elsewhere");
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            format!(
                "content_dir = \"posts\"\noutput_dir = {:?}\n",
                out.to_string_lossy()
            ),
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.content_dir, tmp.path().join("posts"));
        assert_eq!(config.output_dir, out);
    }

    // =========================================================================
    // Fingerprint
    // =========================================================================

    #[test]
    fn fingerprint_stable_and_sensitive_to_output_settings() {
        let a = Config::default();
        assert_eq!(a.fingerprint(), Config::default().fingerprint());

        let mut b = Config::default();
        b.title = "Other".into();
        assert_ne!(a.fingerprint(), b.fingerprint());

        let mut c = Config::default();
        c.extra.insert("theme".into(), toml::Value::String("dark".into()));
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_runtime_settings() {
        let a = Config::default();
        let mut b = Config::default();
        b.concurrency = Some(8);
        b.use_cache = false;
        b.output_dir = PathBuf::from("/tmp/elsewhere");
        b.cache_dir = PathBuf::from("/tmp/cache");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn effective_concurrency_explicit_and_minimum() {
        assert_eq!(effective_concurrency(Some(3)), 3);
        assert_eq!(effective_concurrency(Some(0)), 1);
        assert!(effective_concurrency(None) >= 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"title = "a""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"title = "b""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("title").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn merge_toml_preserves_base_keys_in_nested_tables() {
        let base: toml::Value = toml::from_str(
            r#"
[search]
index = true
limit = 10
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[search]
limit = 20
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let search = merged.get("search").unwrap();
        assert_eq!(search.get("limit").unwrap().as_integer(), Some(20));
        assert_eq!(search.get("index").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, Config::default());
    }
}
