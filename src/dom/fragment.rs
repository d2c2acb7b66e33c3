//! Detached copies of document content.

use std::fmt;

use kuchikikiki::NodeRef;

/// An ordered list of detached nodes.
///
/// Snapshots of a text region are stored as fragments so they can be
/// re-instantiated into the document without parsing markup. The nodes are
/// never attached; [`Document::restore_children`](super::Document::restore_children)
/// inserts fresh copies.
#[derive(Clone, Default)]
pub struct Fragment {
    nodes: Vec<NodeRef>,
}

impl Fragment {
    pub(crate) fn new(nodes: Vec<NodeRef>) -> Self {
        Self { nodes }
    }

    pub(crate) fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Concatenated text of every text node, in document order.
    pub fn text_content(&self) -> String {
        self.nodes.iter().map(|node| node.text_contents()).collect()
    }

    /// Text of each text node, in document order.
    pub fn text_segments(&self) -> Vec<String> {
        self.nodes
            .iter()
            .flat_map(|node| node.inclusive_descendants())
            .filter_map(|node| node.as_text().map(|text| text.borrow().clone()))
            .collect()
    }

    /// Serialize to markup. Text and attribute values are escaped.
    pub fn to_html(&self) -> String {
        self.nodes.iter().map(|node| node.to_string()).collect()
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fragment").field(&self.to_html()).finish()
    }
}

/// Deep copy of an element, text or comment node and its subtree.
/// Other node kinds are skipped.
pub(crate) fn deep_copy(node: &NodeRef) -> Option<NodeRef> {
    if let Some(element) = node.as_element() {
        let copy = NodeRef::new_element(
            element.name.clone(),
            element.attributes.borrow().map.clone(),
        );
        for child in node.children() {
            if let Some(child) = deep_copy(&child) {
                copy.append(child);
            }
        }
        return Some(copy);
    }
    if let Some(text) = node.as_text() {
        return Some(NodeRef::new_text(text.borrow().clone()));
    }
    node.as_comment()
        .map(|comment| NodeRef::new_comment(comment.borrow().clone()))
}

#[cfg(test)]
mod tests {
    use crate::dom::Document;

    #[test]
    fn test_to_html_escapes_text_and_attributes() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let text = doc.create_text("1 < 2 & ");
        let link = doc.create_element("a");
        doc.set_attribute(link, "href", "/q?a=1&b=\"2\"");
        let label = doc.create_text("<link>");
        doc.append_child(link, label);
        doc.append_child(div, text);
        doc.append_child(div, link);

        let fragment = doc.snapshot_children(div);
        assert_eq!(
            fragment.to_html(),
            "1 &lt; 2 &amp; <a href=\"/q?a=1&amp;b=&quot;2&quot;\">&lt;link&gt;</a>"
        );
        assert_eq!(fragment.text_content(), "1 < 2 & <link>");
        assert_eq!(fragment.text_segments(), vec!["1 < 2 & ", "<link>"]);
    }

    #[test]
    fn test_void_and_display() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let br = doc.create_element("br");
        let hidden = doc.create_element("div");
        doc.set_display(hidden, Some("none"));
        doc.append_child(div, br);
        doc.append_child(div, hidden);

        let fragment = doc.snapshot_children(div);
        assert_eq!(fragment.to_html(), "<br><div style=\"display: none\"></div>");
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let t = doc.create_text("before");
        doc.append_child(div, t);
        let fragment = doc.snapshot_children(div);

        doc.remove_children(div);
        let t = doc.create_text("after");
        doc.append_child(div, t);

        assert_eq!(fragment.to_html(), "before");
        assert_eq!(fragment.text_content(), "before");
    }
}
