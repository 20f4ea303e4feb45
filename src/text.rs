//! HTML to plain text helpers shared by the jobs.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Visible text of a document: every text node trimmed, empty ones dropped,
/// joined with newlines.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    lines.join("\n")
}

/// Text of the first element matching `css`, or `None` when nothing matches.
pub fn selector_text(html: &str, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let document = Html::parse_document(html);
    document.select(&selector).next().map(element_text)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `max_words` whitespace-separated words, joined by single spaces.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_visible_text_lines() {
        let html = r#"<html><head><title>10-K</title><style>p { color: red }</style></head>
            <body><h1> Annual Report </h1><script>var x = 1;</script>
            <p>Revenue   grew</p><p>   </p><div>Net <b>income</b></div></body></html>"#;

        assert_eq!(
            html_to_text(html),
            "10-K\nAnnual Report\nRevenue   grew\nNet\nincome"
        );
    }

    #[test]
    fn selector_text_reads_first_match_only() {
        let html = r#"<div class="caas-body"><p>First</p><p>Second</p></div>
            <div class="caas-body"><p>Other</p></div>"#;

        assert_eq!(
            selector_text(html, "div.caas-body").as_deref(),
            Some("First\nSecond")
        );
        assert_eq!(selector_text(html, "div.missing"), None);
    }

    #[test]
    fn truncate_collapses_whitespace() {
        assert_eq!(truncate_words("a  b\n\nc\td e", 3), "a b c");
        assert_eq!(truncate_words("short", 10), "short");
        assert_eq!(truncate_words("   ", 10), "");
    }
}
