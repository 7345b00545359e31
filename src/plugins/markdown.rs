//! `markdown`: render document bodies to HTML with pulldown-cmark.

use crate::error::HookResult;
use crate::manager::Manager;
use crate::plugin::Plugin;
use crate::stage::Stage;
use pulldown_cmark::{Options, Parser, html as md_html};

pub struct Markdown;

impl Plugin for Markdown {
    fn name(&self) -> &str {
        "markdown"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Render]
    }

    fn render(&self, manager: &Manager) -> HookResult {
        manager
            .process_posts_concurrently(|doc| {
                doc.html = render_markdown(&doc.content);
                Ok(())
            })
            .into_result()
    }
}

/// Markdown to HTML. Tables, footnotes and strikethrough are enabled.
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(text, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}
