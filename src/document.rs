//! Records that flow through the pipeline.
//!
//! A [`Document`] is created during `load` for every globbed source file and
//! then mutated in place by later stages: `transform` fills in the slug,
//! `render` fills in the HTML, plugins drop derived data into
//! [`Document::extra`]. A [`Feed`] is a named, filtered and sorted view over
//! the documents, materialised during `collect`.
//!
//! [`Value`] is the dynamic view of a document field used by the filter
//! language and by `Manager::map`.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Field names that always resolve on a document, even when empty.
pub const BUILTIN_FIELDS: &[&str] = &[
    "path",
    "title",
    "slug",
    "date",
    "tags",
    "published",
    "draft",
    "private",
    "content",
    "html",
];

/// One source file as it moves through the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Source path relative to the content directory. Unique per build.
    pub path: PathBuf,
    pub title: Option<String>,
    /// URL slug; empty until `transform` derives it.
    pub slug: String,
    pub date: Option<NaiveDate>,
    /// Tags in frontmatter order. Duplicates are kept.
    pub tags: Vec<String>,
    pub published: bool,
    pub draft: bool,
    pub private: bool,
    /// The file exactly as read from disk, frontmatter included.
    pub raw: String,
    /// Body with the frontmatter block removed.
    pub content: String,
    /// Rendered HTML body; empty until `render`.
    pub html: String,
    /// Frontmatter keys the engine doesn't know about, plus anything plugins
    /// derive. Sorted, so iteration order is stable.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            path: path.into(),
            title: None,
            slug: String::new(),
            date: None,
            tags: Vec::new(),
            published: false,
            draft: false,
            private: false,
            content: raw.clone(),
            raw,
            html: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Path rendered with forward slashes, used as the cache key and in
    /// user-facing output.
    pub fn key(&self) -> String {
        path_key(&self.path)
    }

    /// Resolve a field by name for the filter language.
    ///
    /// Built-in fields always resolve (missing optional values become
    /// [`Value::Null`]). Other names are looked up in [`Document::extra`].
    /// Returns `None` only for a name that is neither.
    pub fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "path" => Value::Str(self.key()),
            "title" => self.title.clone().map(Value::Str).unwrap_or(Value::Null),
            "slug" => Value::Str(self.slug.clone()),
            "date" => self.date.map(Value::Date).unwrap_or(Value::Null),
            "tags" => Value::List(self.tags.iter().cloned().map(Value::Str).collect()),
            "published" => Value::Bool(self.published),
            "draft" => Value::Bool(self.draft),
            "private" => Value::Bool(self.private),
            "content" => Value::Str(self.content.clone()),
            "html" => Value::Str(self.html.clone()),
            other => return self.extra.get(other).map(Value::from),
        };
        Some(value)
    }
}

/// Forward-slash form of a relative path.
pub fn path_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse `YYYY-MM-DD`, also accepting a full timestamp whose first ten
/// characters are a date (`2024-01-15T09:30:00Z`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// A named, derived view over the documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub slug: String,
    pub title: String,
    /// Filter expression that selected the documents.
    pub filter: String,
    /// Field the documents are sorted on.
    pub sort: String,
    pub reverse: bool,
    /// Output path relative to the output directory.
    pub output_path: PathBuf,
    pub documents: Vec<Document>,
}

/// Dynamic value of a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    List(Vec<Value>),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::Str(_) => 4,
            Value::List(_) => 5,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Total order used for sorting: values of different kinds order by kind
    /// (null first, lists last), values of the same kind by content.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.sort_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            // Nested tables have no scalar meaning in a filter; keep them
            // comparable by their canonical JSON text.
            serde_json::Value::Object(_) => Value::Str(json.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_document_content_defaults_to_raw() {
        let doc = Document::new("a.md", "hello");
        assert_eq!(doc.content, "hello");
        assert_eq!(doc.raw, "hello");
        assert!(doc.html.is_empty());
        assert!(!doc.published);
    }

    #[test]
    fn key_uses_forward_slashes() {
        let doc = Document::new(Path::new("posts").join("2024").join("a.md"), "");
        assert_eq!(doc.key(), "posts/2024/a.md");
    }

    #[test]
    fn builtin_fields_always_resolve() {
        let doc = Document::new("a.md", "");
        for name in BUILTIN_FIELDS {
            assert!(doc.field(name).is_some(), "field {name} should resolve");
        }
        assert_eq!(doc.field("title"), Some(Value::Null));
        assert_eq!(doc.field("date"), Some(Value::Null));
    }

    #[test]
    fn extra_fields_resolve_from_extension_map() {
        let mut doc = Document::new("a.md", "");
        doc.extra
            .insert("series".to_string(), serde_json::json!("rust-notes"));
        assert_eq!(
            doc.field("series"),
            Some(Value::Str("rust-notes".to_string()))
        );
        assert_eq!(doc.field("nope"), None);
    }

    #[test]
    fn tags_resolve_as_list() {
        let mut doc = Document::new("a.md", "");
        doc.tags = vec!["go".into(), "rust".into()];
        assert_eq!(
            doc.field("tags"),
            Some(Value::List(vec![
                Value::Str("go".into()),
                Value::Str("rust".into())
            ]))
        );
    }

    #[test]
    fn parse_date_plain_and_timestamp() {
        assert_eq!(parse_date("2024-01-15"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T09:30:00Z"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("15/01/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn sort_cmp_orders_by_kind_then_content() {
        assert_eq!(Value::Null.sort_cmp(&Value::Bool(false)), Ordering::Less);
        assert_eq!(
            Value::Date(date(2024, 1, 1)).sort_cmp(&Value::Date(date(2023, 1, 1))),
            Ordering::Greater
        );
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(
            Value::Str("a".into()).sort_cmp(&Value::Str("b".into())),
            Ordering::Less
        );
    }

    #[test]
    fn json_numbers_map_to_int_or_float() {
        assert_eq!(Value::from(&serde_json::json!(3)), Value::Int(3));
        assert_eq!(Value::from(&serde_json::json!(2.5)), Value::Float(2.5));
    }

    #[test]
    fn display_formats_dates_and_lists() {
        let v = Value::List(vec![Value::Date(date(2024, 3, 9)), Value::Bool(true)]);
        assert_eq!(v.to_string(), "[2024-03-09, true]");
    }
}
