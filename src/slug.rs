//! URL slugs for output paths.
//!
//! A document's slug decides where its page lands (`<output>/<slug>/index.html`),
//! so it must be safe as both a URL segment and a directory name. Slugs come
//! from frontmatter, the title, or the file stem, in that order, and all go
//! through [`sanitize_slug`].

use std::path::Path;

const MAX_SLUG_LEN: usize = 80;

/// Sanitize a title string for use in URLs and filenames.
///
/// - Lowercases ASCII letters
/// - Replaces non-alphanumeric characters (except dashes and slashes) with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes from every `/`-separated segment
/// - Truncates each segment to `MAX_SLUG_LEN` characters (breaks at the last
///   dash before the limit)
///
/// Slashes are kept so a frontmatter slug like `blog/first-post` nests.
pub fn sanitize_slug(title: &str) -> String {
    title
        .split('/')
        .map(sanitize_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize_segment(segment: &str) -> String {
    let slug: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    // Collapse consecutive dashes
    let mut collapsed = String::with_capacity(slug.len());
    let mut prev_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        } else {
            collapsed.push(c);
            prev_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');

    // Truncate at word boundary (last dash before limit)
    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Slug derived from a source path: the path without its extension, with
/// `index` files collapsing onto their directory (`guides/index.md` → `guides`).
pub fn slug_from_path(path: &Path) -> String {
    let stem_path = path.with_extension("");
    let is_index = stem_path
        .file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case("index"));
    let base = if is_index {
        stem_path.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        stem_path
    };
    sanitize_slug(&crate::document::path_key(&base))
}
