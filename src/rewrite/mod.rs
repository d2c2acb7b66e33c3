//! In-place text rewriting.

mod markup;

pub use markup::{ReplacementMarkup, Segment};

use crate::dom::{Document, NodeId};
use crate::rule::Matcher;

/// Replaces matched spans inside the text nodes of a subtree.
///
/// Text nodes without a match are never touched, so surrounding elements
/// (links, mentions, formatting) keep their identity. Each matched text node
/// is replaced by the sequence: preceding text, replacement nodes, ..., trailing
/// text.
pub struct TextRewriter;

impl TextRewriter {
    /// Rewrite every match under `root`. Returns the number of replaced spans.
    pub fn apply(
        doc: &mut Document,
        root: NodeId,
        matcher: &Matcher,
        replacement: &ReplacementMarkup,
    ) -> usize {
        // Collect first: rewriting replaces nodes while we iterate.
        let targets = doc.text_nodes(root);
        let mut replaced = 0;

        for node in targets {
            let Some(text) = doc.text(node) else {
                continue;
            };

            let mut pieces = Vec::new();
            let mut last = 0;
            let before = replaced;
            for m in matcher.find_iter(&text) {
                if m.start() > last {
                    pieces.push(doc.create_text(&text[last..m.start()]));
                }
                pieces.extend(replacement.build_nodes(doc));
                last = m.end();
                replaced += 1;
            }

            if replaced == before {
                continue;
            }

            if last < text.len() {
                pieces.push(doc.create_text(&text[last..]));
            }
            doc.replace_with(node, &pieces);
        }

        replaced
    }
}
