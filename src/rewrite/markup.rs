//! Replacement text emphasis syntax.
//!
//! `**text**` renders as strong emphasis and `*text*` as light emphasis.
//! Everything else is literal text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::{Document, NodeId};

static EMPHASIS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|\*([^*]+?)\*").unwrap());

/// One piece of a parsed replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Strong(String),
    Emphasis(String),
}

/// Parsed replacement text, ready to be rendered as markup or as nodes.
///
/// # Examples
/// ```
/// use feedguard::rewrite::ReplacementMarkup;
///
/// let markup = ReplacementMarkup::parse("**<b>** and *soft*");
/// assert_eq!(markup.to_html(), "<strong>&lt;b&gt;</strong> and <em>soft</em>");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementMarkup {
    segments: Vec<Segment>,
}

impl ReplacementMarkup {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in EMPHASIS_PATTERN.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            if let Some(strong) = caps.get(1) {
                segments.push(Segment::Strong(strong.as_str().to_string()));
            } else if let Some(em) = caps.get(2) {
                segments.push(Segment::Emphasis(em.as_str().to_string()));
            }
            last = whole.end();
        }

        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Markup with literal text escaped before emphasis tags are added.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(&html_escape::encode_text(text)),
                Segment::Strong(text) => {
                    out.push_str("<strong>");
                    out.push_str(&html_escape::encode_text(text));
                    out.push_str("</strong>");
                }
                Segment::Emphasis(text) => {
                    out.push_str("<em>");
                    out.push_str(&html_escape::encode_text(text));
                    out.push_str("</em>");
                }
            }
        }
        out
    }

    /// Create detached nodes for this replacement, in order.
    pub fn build_nodes(&self, doc: &mut Document) -> Vec<NodeId> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => doc.create_text(text),
                Segment::Strong(text) => wrap(doc, "strong", text),
                Segment::Emphasis(text) => wrap(doc, "em", text),
            })
            .collect()
    }
}

fn wrap(doc: &mut Document, tag: &str, text: &str) -> NodeId {
    let element = doc.create_element(tag);
    let inner = doc.create_text(text);
    doc.append_child(element, inner);
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let markup = ReplacementMarkup::parse("[SPONSORED CONTENT]");
        assert_eq!(
            markup.segments(),
            &[Segment::Text("[SPONSORED CONTENT]".to_string())]
        );
        assert_eq!(markup.to_html(), "[SPONSORED CONTENT]");
    }

    #[test]
    fn test_strong_and_emphasis() {
        let markup = ReplacementMarkup::parse("a **bold** and *soft* end");
        assert_eq!(
            markup.segments(),
            &[
                Segment::Text("a ".to_string()),
                Segment::Strong("bold".to_string()),
                Segment::Text(" and ".to_string()),
                Segment::Emphasis("soft".to_string()),
                Segment::Text(" end".to_string()),
            ]
        );
    }

    #[test]
    fn test_injection_is_escaped() {
        let markup = ReplacementMarkup::parse("<script>alert(1)</script> **<img>**");
        assert_eq!(
            markup.to_html(),
            "&lt;script&gt;alert(1)&lt;/script&gt; <strong>&lt;img&gt;</strong>"
        );
    }

    #[test]
    fn test_unbalanced_markers_stay_literal() {
        let markup = ReplacementMarkup::parse("5 * 3 = 15");
        assert_eq!(markup.to_html(), "5 * 3 = 15");
        let markup = ReplacementMarkup::parse("****");
        assert_eq!(markup.segments(), &[Segment::Text("****".to_string())]);
    }

    #[test]
    fn test_build_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let nodes = ReplacementMarkup::parse("x **y**").build_nodes(&mut doc);
        assert_eq!(nodes.len(), 2);
        for node in nodes {
            doc.append_child(body, node);
        }
        assert_eq!(doc.inner_html(body), "x <strong>y</strong>");
    }

    #[test]
    fn test_empty() {
        assert!(ReplacementMarkup::parse("").is_empty());
    }
}
