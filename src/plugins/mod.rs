//! Built-in plugins.
//!
//! [`defaults`] returns the set a plain site build needs, one plugin per
//! stage that does real work:
//!
//! | Stage | Plugin | Does |
//! |-------|--------|------|
//! | validate | [`validate::Validate`] | checks config and directories |
//! | glob | [`glob::Glob`] | discovers source files |
//! | load | [`load::Load`] | reads files, parses `+++` TOML frontmatter |
//! | transform | [`slugs::Slugs`] | derives output slugs, warns on duplicates |
//! | render | [`markdown::Markdown`] | markdown to HTML |
//! | collect | [`feeds::Feeds`] | materialises configured feeds |
//! | write | [`publish::Publish`] | writes pages through the build cache |
//!
//! Extra plugins registered after the defaults run after them within a stage
//! unless they ask for an earlier priority.

pub mod feeds;
pub mod glob;
pub mod load;
pub mod markdown;
pub mod publish;
pub mod slugs;
pub mod validate;

use crate::plugin::Plugin;
use std::sync::Arc;

/// The default plugin set, in registration order.
pub fn defaults() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(validate::Validate),
        Arc::new(glob::Glob),
        Arc::new(load::Load),
        Arc::new(slugs::Slugs),
        Arc::new(markdown::Markdown),
        Arc::new(feeds::Feeds),
        Arc::new(publish::Publish),
    ]
}
