//! `glob`: discover source files.
//!
//! Walks the content directory and keeps every file whose forward-slash
//! relative path matches at least one configured pattern. The result is
//! sorted so the document order never depends on directory iteration order.
//!
//! Pattern syntax:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `*`     | any run of characters within one path segment |
//! | `**/`   | zero or more whole segments |
//! | `**`    | anything, across segments |
//! | `?`     | exactly one character other than `/` |
//!
//! Hidden files and directories (leading `.`) are skipped, as are the output
//! and cache directories when they live inside the content directory.

use crate::document::path_key;
use crate::error::{HookError, HookResult};
use crate::manager::Manager;
use crate::plugin::Plugin;
use crate::stage::Stage;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct Glob;

impl Plugin for Glob {
    fn name(&self) -> &str {
        "glob"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Glob]
    }

    fn glob(&self, manager: &Manager) -> HookResult {
        let (content_dir, patterns, skip) = {
            let config = manager.config();
            (
                config.content_dir.clone(),
                config.glob_patterns.clone(),
                vec![config.output_dir.clone(), config.cache_dir.clone()],
            )
        };
        let matchers = compile_patterns(&patterns)
            .map_err(|e| HookError::critical(format!("invalid glob pattern: {e}")))?;
        let files = discover(&content_dir, &matchers, &skip);
        tracing::debug!(files = files.len(), "glob complete");
        manager.set_files(files);
        Ok(())
    }
}

/// Translate a glob pattern into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    let chars: Vec<char> = pattern.trim_start_matches("./").chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:[^/]*/)*");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                re.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                re.push_str("[^/]");
                i += 1;
            }
            c => {
                re.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    re.push('$');
    Regex::new(&re)
}

pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

/// Matching files under `root`, relative to it and sorted. Entries under any
/// `skip` directory are not visited. Unreadable entries are ignored.
pub fn discover(root: &Path, matchers: &[Regex], skip: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let hidden = e.depth() > 0 && e.file_name().to_string_lossy().starts_with('.');
            !hidden && !skip.iter().any(|dir| e.path() == dir.as_path())
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|rel| {
            let key = path_key(rel);
            matchers.iter().any(|m| m.is_match(&key))
        })
        .collect();
    files.sort();
    files
}
