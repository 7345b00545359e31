//! `load`: read sources and parse frontmatter.
//!
//! Builds one [`Document`] per discovered file (in file order) and then reads
//! and parses them on the worker pool. A document may start with a TOML
//! frontmatter block fenced by `+++` lines:
//!
//! ```text
//! +++
//! title = "Hello"
//! date = 2024-03-01
//! tags = ["rust", "notes"]
//! draft = false
//! series = "intro"        # unknown keys land in Document::extra
//! +++
//! Body text in markdown.
//! ```
//!
//! Without a `title` key the first `# ` heading of the body is used.
//! `published` defaults to true. Unreadable files and malformed frontmatter
//! are critical errors for that document only.

use crate::document::{Document, parse_date};
use crate::error::{HookError, HookResult};
use crate::manager::Manager;
use crate::plugin::Plugin;
use crate::stage::Stage;
use std::fs;

const FENCE: &str = "+++";

pub struct Load;

impl Plugin for Load {
    fn name(&self) -> &str {
        "load"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Load]
    }

    fn load(&self, manager: &Manager) -> HookResult {
        let content_dir = manager.config().content_dir.clone();
        let documents = manager
            .files()
            .iter()
            .map(|path| Document::new(path.clone(), String::new()))
            .collect();
        manager.set_documents(documents);

        manager
            .process_posts_concurrently(|doc| {
                let raw = fs::read_to_string(content_dir.join(&doc.path))
                    .map_err(|e| HookError::critical(format!("failed to read source: {e}")))?;
                apply_source(doc, raw)
            })
            .into_result()
    }
}

/// Fill `doc` from the raw text of its source file.
pub fn apply_source(doc: &mut Document, raw: String) -> Result<(), HookError> {
    let (frontmatter, body) = split_frontmatter(&raw)?;
    doc.content = body.to_string();
    doc.published = true;
    if let Some(text) = frontmatter {
        let table: toml::Table = toml::from_str(text)
            .map_err(|e| HookError::critical(format!("invalid frontmatter: {e}")))?;
        apply_frontmatter(doc, table)?;
    }
    if doc.title.is_none() {
        doc.title = first_heading(&doc.content);
    }
    doc.raw = raw;
    Ok(())
}

/// Split off a leading `+++` block. Returns `(frontmatter, body)`.
pub fn split_frontmatter(raw: &str) -> Result<(Option<&str>, &str), HookError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(after_open) = strip_fence_line(text) else {
        return Ok((None, text));
    };
    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let frontmatter = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Ok((Some(frontmatter), body));
        }
        offset += line.len();
    }
    Err(HookError::critical("unterminated frontmatter block"))
}

fn strip_fence_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FENCE)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

fn apply_frontmatter(doc: &mut Document, table: toml::Table) -> Result<(), HookError> {
    for (key, value) in table {
        match key.as_str() {
            "title" => doc.title = Some(expect_str(&key, &value)?.to_string()),
            "slug" => doc.slug = expect_str(&key, &value)?.to_string(),
            "date" => {
                let text = match &value {
                    toml::Value::Datetime(dt) => dt.to_string(),
                    other => expect_str(&key, other)?.to_string(),
                };
                doc.date = Some(
                    parse_date(&text)
                        .ok_or_else(|| HookError::critical(format!("invalid date '{text}'")))?,
                );
            }
            "tags" => {
                let items = value.as_array().ok_or_else(|| type_error(&key, "an array"))?;
                doc.tags = items
                    .iter()
                    .map(|t| expect_str(&key, t).map(str::to_string))
                    .collect::<Result<_, _>>()?;
            }
            "published" => doc.published = expect_bool(&key, &value)?,
            "draft" => doc.draft = expect_bool(&key, &value)?,
            "private" => doc.private = expect_bool(&key, &value)?,
            _ => {
                doc.extra.insert(key, toml_to_json(&value));
            }
        }
    }
    Ok(())
}

fn expect_str<'a>(key: &str, value: &'a toml::Value) -> Result<&'a str, HookError> {
    value.as_str().ok_or_else(|| type_error(key, "a string"))
}

fn expect_bool(key: &str, value: &toml::Value) -> Result<bool, HookError> {
    value.as_bool().ok_or_else(|| type_error(key, "a boolean"))
}

fn type_error(key: &str, expected: &str) -> HookError {
    HookError::critical(format!("frontmatter key '{key}' must be {expected}"))
}

/// Convert a TOML value for [`Document::extra`]. Datetimes become strings.
pub fn toml_to_json(value: &toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s.clone()),
        toml::Value::Integer(i) => serde_json::Value::from(*i),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Text of the first level-one ATX heading, if any.
fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches("# ").trim().to_string())
        .filter(|title| !title.is_empty())
}
