//! Markdown to HTML conversion.
//!
//! CommonMark plus tables, footnotes, strikethrough and task lists. Raw HTML
//! in the source passes through untouched, which is how `<embed>` markers
//! written in Markdown reach the embed resolver.

use pulldown_cmark::{Options, Parser, html as md_html};

pub fn to_html(source: &str) -> String {
    let parser = Parser::new_ext(source, options());
    let mut html = String::with_capacity(source.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_paragraph() {
        assert_eq!(to_html("# Hi\nBody text"), "<h1>Hi</h1>\n<p>Body text</p>\n");
    }

    #[test]
    fn inline_html_passes_through() {
        let html = to_html("Intro\n\n<embed src=\"a.md\" type=\"text/markdown\">\n");
        assert!(html.contains("<embed src=\"a.md\" type=\"text/markdown\">"), "got: {html}");
    }

    #[test]
    fn tables_enabled() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn strikethrough_enabled() {
        assert!(to_html("~~gone~~").contains("<del>gone</del>"));
    }

    #[test]
    fn task_list_enabled() {
        assert!(to_html("- [x] done\n").contains("type=\"checkbox\""));
    }

    #[test]
    fn special_characters_escaped() {
        assert_eq!(to_html("a & b"), "<p>a &amp; b</p>\n");
    }
}
