use std::path::Path;

use pulldown_cmark::{Options, Parser as CmarkParser, html};

/// File extensions treated as Markdown sources.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|m| m.eq_ignore_ascii_case(ext))
        })
}

/// Render Markdown to markup text. Raw markup in the source (including
/// `<extends>` and `<block>` tags) passes through untouched.
pub fn render(source: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
