//! `slugs`: give every document its output slug.
//!
//! Preference order: the frontmatter `slug`, then the title, then the source
//! path (`posts/Hello World.md` → `posts/hello-world`). All three go through
//! [`sanitize_slug`]. Two documents claiming the same slug is a warning: the
//! first in document order keeps it, later ones are reported by path.

use crate::error::{HookError, HookErrors, HookResult};
use crate::manager::Manager;
use crate::plugin::Plugin;
use crate::slug::{sanitize_slug, slug_from_path};
use crate::stage::Stage;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct Slugs;

impl Plugin for Slugs {
    fn name(&self) -> &str {
        "slugs"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Transform]
    }

    fn transform(&self, manager: &Manager) -> HookResult {
        let mut errors = manager.process_posts_concurrently(|doc| {
            let explicit = sanitize_slug(&doc.slug);
            doc.slug = if !explicit.is_empty() {
                explicit
            } else {
                doc.title
                    .as_deref()
                    .map(sanitize_slug)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| slug_from_path(&doc.path))
            };
            Ok(())
        });

        let mut claimed: BTreeMap<String, PathBuf> = BTreeMap::new();
        for doc in manager.documents().iter() {
            match claimed.get(&doc.slug) {
                Some(owner) => errors.push(
                    HookError::warning(format!(
                        "slug '{}' already used by {}",
                        doc.slug,
                        owner.display()
                    ))
                    .with_path(&doc.path),
                ),
                None => {
                    claimed.insert(doc.slug.clone(), doc.path.clone());
                }
            }
        }
        errors.into_result()
    }
}

/// Relative output path for a slug: `<slug>/index.html`, or `index.html`
/// for the empty slug.
pub fn page_path(slug: &str) -> String {
    if slug.is_empty() {
        "index.html".to_string()
    } else {
        format!("{slug}/index.html")
    }
}
