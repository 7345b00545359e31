//! CLI output formatting.
//!
//! Output is **document-centric**: the primary line for every document is its
//! positional index and title, with the source path and the page it landed on
//! shown after an arrow. Paths are the secondary context that lets a user
//! trace a page back to its source file.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Documents
//! 001 Hello World
//!     posts/hello.md → hello-world/index.html
//! 002 Draft Idea (draft)
//!     posts/idea.md
//!
//! Feeds
//! 001 Rust posts (3 documents) → rust/index.html
//!
//! Warnings
//!     [warning] transform slugs (b.md): slug 'same' already used by a.md
//!
//! Built 2 documents, 1 feed: 1 cached, 1 written (2 total)
//! ```
//!
//! ## Query
//!
//! ```text
//! 001 Hello World
//!     posts/hello.md
//! 1 match
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::cache::CacheStats;
use crate::document::{Document, Feed};
use crate::error::HookError;
use crate::plugins::publish::is_publishable;
use crate::plugins::slugs::page_path;
use crate::stage::Stage;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Document header: index + title (or path in parens when untitled), plus
/// the reasons it won't be published.
///
/// ```text
/// 001 Hello World
/// 002 (notes/untitled.md) (draft, private)
/// ```
fn document_header(index: usize, doc: &Document) -> String {
    let title = match doc.title.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("({})", doc.key()),
    };
    let mut flags = Vec::new();
    if !doc.published {
        flags.push("unpublished");
    }
    if doc.draft {
        flags.push("draft");
    }
    if doc.private {
        flags.push("private");
    }
    if flags.is_empty() {
        format!("{} {}", format_index(index), title)
    } else {
        format!("{} {} ({})", format_index(index), title, flags.join(", "))
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(
    documents: &[Document],
    feeds: &[Feed],
    warnings: &[HookError],
    stats: CacheStats,
) -> Vec<String> {
    let mut lines = Vec::new();

    if !documents.is_empty() {
        lines.push("Documents".to_string());
        for (i, doc) in documents.iter().enumerate() {
            lines.push(document_header(i + 1, doc));
            if is_publishable(doc) {
                lines.push(format!(
                    "{}{} \u{2192} {}",
                    indent(1),
                    doc.key(),
                    page_path(&doc.slug)
                ));
            } else {
                lines.push(format!("{}{}", indent(1), doc.key()));
            }
        }
    }

    if !feeds.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Feeds".to_string());
        for (i, feed) in feeds.iter().enumerate() {
            lines.push(format!(
                "{} {} ({}) \u{2192} {}",
                format_index(i + 1),
                feed.title,
                plural(feed.documents.len(), "document"),
                feed.output_path.display()
            ));
        }
    }

    if !warnings.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings".to_string());
        for warning in warnings {
            lines.push(format!("{}{}", indent(1), warning));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Built {}, {}: {}",
        plural(documents.len(), "document"),
        plural(feeds.len(), "feed"),
        stats
    ));
    lines
}

pub fn print_build_output(
    documents: &[Document],
    feeds: &[Feed],
    warnings: &[HookError],
    stats: CacheStats,
) {
    for line in format_build_output(documents, feeds, warnings, stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Query
// ============================================================================

pub fn format_query_output(matches: &[Document]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, doc) in matches.iter().enumerate() {
        lines.push(document_header(i + 1, doc));
        lines.push(format!("{}{}", indent(1), doc.key()));
    }
    lines.push(if matches.len() == 1 {
        "1 match".to_string()
    } else {
        format!("{} matches", matches.len())
    });
    lines
}

pub fn print_query_output(matches: &[Document]) {
    for line in format_query_output(matches) {
        println!("{}", line);
    }
}

// ============================================================================
// Stages
// ============================================================================

/// The stage order, each line with the plugins that hook it.
pub fn format_stages(order: &[(Stage, Vec<String>)]) -> Vec<String> {
    order
        .iter()
        .map(|(stage, plugins)| {
            let position = format_index(stage.index() + 1);
            if plugins.is_empty() {
                format!("{} {}", position, stage)
            } else {
                format!("{} {} \u{2192} {}", position, stage, plugins.join(", "))
            }
        })
        .collect()
}

pub fn print_stages(order: &[(Stage, Vec<String>)]) {
    for line in format_stages(order) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
