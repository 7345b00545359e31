//! `publish`: write HTML pages for documents and feeds.
//!
//! Every published document (`published = true`, not a draft, not private)
//! becomes `<output>/<slug>/index.html`; every feed becomes
//! `<output>/<feed slug>/index.html`. Pages are rendered with Maud and carry
//! no timestamps, so identical inputs always produce identical bytes.
//!
//! Document pages go through the build cache. The key is the document's
//! source path, the input hash covers everything the page template reads,
//! and the fingerprint covers the config, the registered plugins and
//! [`TEMPLATE_VERSION`]. On a hit the page already on disk is left alone.
//!
//! Feed pages depend on every document they list, so they are re-rendered
//! each build and only rewritten when their bytes changed.
//!
//! Each output path is written once per build. Documents claim their paths
//! first, in document order, then feeds in config order; anything that lands
//! on an already claimed path is skipped with a warning naming the owner.

use crate::cache::{ArtifactDescriptor, CacheEntry, combine_fingerprints, hash_bytes, hash_document};
use crate::document::{Document, Feed, path_key};
use crate::error::{HookError, HookErrors, HookResult};
use crate::manager::Manager;
use crate::plugin::Plugin;
use crate::plugins::slugs::page_path;
use crate::stage::Stage;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Bump when the page templates change so cached pages are rewritten.
pub const TEMPLATE_VERSION: &str = "pressroom-templates-1";

const CSS: &str = "body{max-width:42rem;margin:2rem auto;padding:0 1rem;font-family:system-ui,sans-serif;line-height:1.6}\
header a{color:inherit;text-decoration:none}\
.meta{color:#666;font-size:.9rem}\
.tags{list-style:none;padding:0;display:flex;gap:.5rem}\
.feed-list{list-style:none;padding:0}";

pub struct Publish;

impl Plugin for Publish {
    fn name(&self) -> &str {
        "publish"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Write]
    }

    fn write(&self, manager: &Manager) -> HookResult {
        let (output_dir, site) = {
            let config = manager.config();
            (
                config.output_dir.clone(),
                Site {
                    title: config.title.clone(),
                    url: config.url.trim_end_matches('/').to_string(),
                },
            )
        };
        let fingerprint = combine_fingerprints(&[&manager.fingerprint(), TEMPLATE_VERSION]);
        let mut errors = HookErrors::new();
        let mut claimed: BTreeMap<String, String> = BTreeMap::new();

        {
            let documents = manager.documents();
            for doc in documents.iter().filter(|d| is_publishable(d)) {
                let output_path = page_path(&doc.slug);
                if let Some(owner) = claimed.get(&output_path) {
                    errors.push(
                        HookError::warning(format!(
                            "page '{output_path}' already written for {owner}, skipped"
                        ))
                        .with_path(&doc.path),
                    );
                    continue;
                }
                claimed.insert(output_path, doc.key());
                if let Err(e) = publish_document(manager, doc, &site, &output_dir, &fingerprint) {
                    errors.push(
                        HookError::critical(format!("failed to write page: {e}")).with_path(&doc.path),
                    );
                }
            }
        }

        for feed in manager.feeds().iter() {
            let output_path = path_key(&feed.output_path);
            if let Some(owner) = claimed.get(&output_path) {
                errors.push(
                    HookError::warning(format!(
                        "feed '{}' would overwrite the page for {owner}, skipped",
                        feed.slug
                    ))
                    .with_path(&feed.output_path),
                );
                continue;
            }
            claimed.insert(output_path, format!("feed '{}'", feed.slug));
            let html = render_feed_page(feed, &site).into_string();
            if let Err(e) = write_if_changed(&output_dir.join(&feed.output_path), html.as_bytes()) {
                errors.push(
                    HookError::critical(format!("failed to write feed '{}': {e}", feed.slug))
                        .with_path(&feed.output_path),
                );
            }
        }

        tracing::info!(stats = %manager.cache_stats(), "pages published");
        errors.into_result()
    }
}

/// Site-wide values the templates need.
#[derive(Debug, Clone)]
pub struct Site {
    pub title: String,
    /// Base URL without trailing slash; empty for root-relative links.
    pub url: String,
}

impl Site {
    fn link(&self, slug: &str) -> String {
        if slug.is_empty() {
            format!("{}/", self.url)
        } else {
            format!("{}/{}/", self.url, slug)
        }
    }
}

pub fn is_publishable(doc: &Document) -> bool {
    doc.published && !doc.draft && !doc.private
}

fn publish_document(
    manager: &Manager,
    doc: &Document,
    site: &Site,
    output_dir: &Path,
    fingerprint: &str,
) -> io::Result<()> {
    let key = doc.key();
    let input_hash = hash_document(doc);
    if manager
        .cache()
        .lookup(&key, &input_hash, fingerprint, output_dir)
        .is_some()
    {
        return Ok(());
    }

    let output_path = page_path(&doc.slug);
    let bytes = render_document_page(doc, site).into_string().into_bytes();
    write_if_changed(&output_dir.join(&output_path), &bytes)?;
    manager.cache().insert(
        key,
        CacheEntry {
            input_hash,
            fingerprint: fingerprint.to_string(),
            artifact: ArtifactDescriptor {
                output_path,
                output_hash: hash_bytes(&bytes),
            },
        },
    );
    Ok(())
}

/// Write `bytes` unless the file already holds exactly them.
fn write_if_changed(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if fs::read(path).is_ok_and(|existing| existing == bytes) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

// ============================================================================
// Templates
// ============================================================================

fn base_document(title: &str, site: &Site, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                header.site-header {
                    a href=(site.link("")) { (site.title) }
                }
                (content)
            }
        }
    }
}

pub fn render_document_page(doc: &Document, site: &Site) -> Markup {
    let title = doc.title.as_deref().unwrap_or(&doc.slug);
    let content = html! {
        main {
            article {
                h1 { (title) }
                @if let Some(date) = doc.date {
                    p.meta {
                        time datetime=(date.format("%Y-%m-%d").to_string()) {
                            (date.format("%B %-d, %Y").to_string())
                        }
                    }
                }
                div.content {
                    (PreEscaped(&doc.html))
                }
                @if !doc.tags.is_empty() {
                    ul.tags {
                        @for tag in &doc.tags {
                            li { (tag) }
                        }
                    }
                }
            }
        }
    };
    base_document(title, site, content)
}

pub fn render_feed_page(feed: &Feed, site: &Site) -> Markup {
    let content = html! {
        main {
            h1 { (feed.title) }
            ul.feed-list {
                @for doc in feed.documents.iter().filter(|d| is_publishable(d)) {
                    li {
                        a href=(site.link(&doc.slug)) {
                            (doc.title.as_deref().unwrap_or(&doc.slug))
                        }
                        @if let Some(date) = doc.date {
                            " "
                            span.meta { (date.format("%Y-%m-%d").to_string()) }
                        }
                    }
                }
            }
        }
    };
    base_document(&feed.title, site, content)
}
