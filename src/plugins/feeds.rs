//! `feeds`: materialise the configured feeds.
//!
//! Each `[[feeds]]` entry becomes a [`Feed`]: the documents matching its
//! filter, stable-sorted on its sort field, written later to
//! `<output>/<slug>/index.html`. The output path always goes through
//! [`sanitize_slug`], so a slug can never point outside the output directory.
//! A feed whose filter doesn't parse is a critical error; the other feeds are
//! still built.

use crate::config::FeedConfig;
use crate::document::{Document, Feed};
use crate::error::{HookError, HookErrors, HookResult};
use crate::filter::{FilterError, filter_documents, sort_documents};
use crate::manager::Manager;
use crate::plugin::Plugin;
use crate::plugins::slugs::page_path;
use crate::slug::sanitize_slug;
use crate::stage::Stage;
use std::path::PathBuf;

pub struct Feeds;

impl Plugin for Feeds {
    fn name(&self) -> &str {
        "feeds"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Collect]
    }

    fn collect(&self, manager: &Manager) -> HookResult {
        let configs = manager.config().feeds.clone();
        let mut feeds = Vec::with_capacity(configs.len());
        let mut errors = HookErrors::new();
        {
            let documents = manager.documents();
            for config in &configs {
                match build_feed(config, &documents) {
                    Ok(feed) => {
                        tracing::debug!(feed = %feed.slug, documents = feed.documents.len(), "feed built");
                        feeds.push(feed);
                    }
                    Err(e) => errors.push(HookError::critical(format!(
                        "feed '{}': {e}",
                        config.slug
                    ))),
                }
            }
        }
        manager.set_feeds(feeds);
        errors.into_result()
    }
}

/// Filter and sort `documents` for one feed.
pub fn build_feed(config: &FeedConfig, documents: &[Document]) -> Result<Feed, FilterError> {
    let mut selected = filter_documents(documents, &config.filter)?;
    sort_documents(&mut selected, &config.sort, config.reverse);
    Ok(Feed {
        slug: config.slug.clone(),
        title: if config.title.is_empty() {
            config.slug.clone()
        } else {
            config.title.clone()
        },
        filter: config.filter.clone(),
        sort: config.sort.clone(),
        reverse: config.reverse,
        output_path: PathBuf::from(page_path(&sanitize_slug(&config.slug))),
        documents: selected,
    })
}
