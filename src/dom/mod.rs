//! Document model over a `kuchikikiki` tree.
//!
//! The document stands in for the page the filter runs against. Nodes are
//! addressed by [`NodeId`] handles. A handle stays valid while its node is in
//! the tree or detached by a move. [`Document::remove`],
//! [`Document::remove_children`] and [`Document::replace_with`] release the
//! removed subtree: its handles go stale and their slots are reused under a
//! new generation, so a stale handle never resolves to another node.
//!
//! Tree mutations below an observed node are queued as [`MutationRecord`]s,
//! the same way a MutationObserver batches them, and drained with
//! [`Document::take_records`].

mod fragment;
mod selector;

pub use fragment::Fragment;
pub use selector::Selector;

use ahash::AHashMap;
use kuchikikiki::traits::TendrilSink;
use kuchikikiki::{ElementData, NodeDataRef, NodeRef};

use fragment::deep_copy;

/// Handle of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// A batch entry describing one change to a node's child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    node: Option<NodeRef>,
}

/// Identity of a tree node, stable while the node is alive.
fn node_key(node: &NodeRef) -> usize {
    let ptr: *const kuchikikiki::Node = &**node;
    ptr as usize
}

/// An HTML document with handle-based access below its `body` element.
pub struct Document {
    // Owns html/head so that body keeps its ancestors
    _tree: NodeRef,
    body_element: NodeDataRef<ElementData>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    handles: AHashMap<usize, NodeId>,
    body: NodeId,
    observed: Option<NodeId>,
    records: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document. Only `body` is addressable.
    pub fn new() -> Self {
        let tree = kuchikikiki::parse_html().one("");
        let body_element = tree
            .select_first("body")
            .unwrap_or_else(|()| panic!("HTML parser produced no <body>"));
        let body_node = body_element.as_node().clone();

        let mut doc = Self {
            _tree: tree,
            body_element,
            slots: Vec::new(),
            free: Vec::new(),
            handles: AHashMap::new(),
            body: NodeId {
                index: 0,
                generation: 0,
            },
            observed: None,
            records: Vec::new(),
        };
        doc.body = doc.register(&body_node);
        doc
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn register(&mut self, node: &NodeRef) -> NodeId {
        let key = node_key(node);
        if let Some(&id) = self.handles.get(&key) {
            return id;
        }

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node.clone());
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node.clone()),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        self.handles.insert(key, id);
        id
    }

    /// Register `node` and its whole subtree.
    fn adopt(&mut self, node: &NodeRef) -> NodeId {
        let id = self.register(node);
        for descendant in node.inclusive_descendants().skip(1) {
            self.register(&descendant);
        }
        id
    }

    /// Drop the handles of `node` and its subtree.
    fn release(&mut self, node: &NodeRef) {
        for descendant in node.inclusive_descendants() {
            let Some(id) = self.handles.remove(&node_key(&descendant)) else {
                continue;
            };
            let slot = &mut self.slots[id.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    fn resolve(&self, id: NodeId) -> Option<&NodeRef> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn id_of(&self, node: &NodeRef) -> Option<NodeId> {
        self.handles.get(&node_key(node)).copied()
    }

    /// Number of handle slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of nodes currently addressable by a handle.
    pub fn live_nodes(&self) -> usize {
        self.handles.len()
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let mut name = self.body_element.name.clone();
        name.local = tag.to_lowercase().as_str().into();
        let node = NodeRef::new_element(name, Vec::new());
        self.register(&node)
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let node = NodeRef::new_text(text);
        self.register(&node)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.resolve(id).is_some_and(|node| node.as_element().is_some())
    }

    /// Text of a text node, `None` for elements.
    pub fn text(&self, id: NodeId) -> Option<String> {
        self.resolve(id)?
            .as_text()
            .map(|text| text.borrow().clone())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.resolve(id)?
            .as_element()
            .map(|element| &*element.name.local)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let element = self.resolve(id)?.as_element()?;
        let attributes = element.attributes.borrow();
        attributes.get(name).map(str::to_string)
    }

    /// Set an attribute. No-op on text nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.resolve(id).and_then(|node| node.as_element()) {
            element
                .attributes
                .borrow_mut()
                .insert(name, value.to_string());
        }
    }

    /// Inline `display` value, read from the `style` attribute.
    pub fn display(&self, id: NodeId) -> Option<String> {
        let style = self.attribute(id, "style")?;
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(property, _)| property.trim() == "display")
            .map(|(_, value)| value.trim().to_string())
    }

    /// Set or clear the inline display value. The `style` attribute holds
    /// nothing else. No-op on text nodes.
    pub fn set_display(&mut self, id: NodeId, display: Option<&str>) {
        let Some(element) = self.resolve(id).and_then(|node| node.as_element()) else {
            return;
        };
        let mut attributes = element.attributes.borrow_mut();
        match display {
            Some(value) => {
                attributes.insert("style", format!("display: {}", value));
            }
            None => {
                attributes.remove("style");
            }
        }
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.display(id).as_deref() == Some("none")
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.resolve(id)?.parent()?;
        self.id_of(&parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.resolve(id) {
            Some(node) => node.children().filter_map(|c| self.id_of(&c)).collect(),
            None => Vec::new(),
        }
    }

    /// Whether the node is attached below `body` (or is `body`).
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.body, id)
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let (Some(ancestor), Some(node)) = (self.resolve(ancestor), self.resolve(node)) else {
            return false;
        };
        node.inclusive_ancestors().any(|a| a == *ancestor)
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// `child` must not be an inclusive ancestor of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` before `reference` (or at the end when `None` or when
    /// `reference` is not a child of `parent`).
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let (Some(parent_node), Some(child_node)) = (self.resolve(parent), self.resolve(child))
        else {
            return;
        };
        let (parent_node, child_node) = (parent_node.clone(), child_node.clone());

        child_node.detach();
        let reference = reference
            .and_then(|r| self.resolve(r))
            .filter(|r| r.parent().as_ref() == Some(&parent_node));
        match reference {
            Some(r) => r.insert_before(child_node),
            None => parent_node.append(child_node),
        }
        self.record(parent, vec![child], Vec::new());
    }

    /// Insert `new_node` right after `node` in its parent. Returns false when
    /// `node` has no parent.
    pub fn insert_after(&mut self, node: NodeId, new_node: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        let next = self
            .resolve(node)
            .and_then(|n| n.next_sibling())
            .and_then(|n| self.id_of(&n));
        if next == Some(new_node) {
            return true;
        }
        self.insert_before(parent, new_node, next);
        true
    }

    /// Remove a node from the tree. Its subtree is released.
    ///
    /// `body` cannot be removed.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.body {
            return;
        }
        let Some(node) = self.resolve(id).cloned() else {
            return;
        };
        let parent = self.parent(id);
        node.detach();
        if let Some(parent) = parent {
            self.record(parent, Vec::new(), vec![id]);
        }
        self.release(&node);
    }

    /// Replace `old` with `replacements`, in order, at the same position.
    /// `old` is released.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        let Some(old_node) = self.resolve(old).cloned() else {
            return;
        };
        for &id in replacements {
            if let Some(node) = self.resolve(id) {
                old_node.insert_before(node.clone());
            }
        }
        old_node.detach();
        self.record(parent, replacements.to_vec(), vec![old]);
        self.release(&old_node);
    }

    /// Remove every child of `id`, releasing them.
    pub fn remove_children(&mut self, id: NodeId) {
        let Some(node) = self.resolve(id).cloned() else {
            return;
        };
        let children: Vec<NodeRef> = node.children().collect();
        if children.is_empty() {
            return;
        }

        let removed = children.iter().filter_map(|c| self.id_of(c)).collect();
        for child in &children {
            child.detach();
        }
        self.record(id, Vec::new(), removed);
        for child in &children {
            self.release(child);
        }
    }

    /// Descendants of `root` in document order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        match self.resolve(root) {
            Some(node) => node
                .inclusive_descendants()
                .skip(1)
                .filter_map(|n| self.id_of(&n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Text nodes of the subtree at `root` (including `root`), in document order.
    pub fn text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        match self.resolve(root) {
            Some(node) => node
                .inclusive_descendants()
                .filter(|n| n.as_text().is_some())
                .filter_map(|n| self.id_of(&n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Concatenated text of the subtree at `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.resolve(id)
            .map(|node| node.text_contents())
            .unwrap_or_default()
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.resolve(id).is_some_and(|node| selector.matches(node))
    }

    /// First descendant of `root` matching `selector`.
    pub fn query(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        let node = self.resolve(root)?;
        node.inclusive_descendants()
            .skip(1)
            .filter(|n| selector.matches(n))
            .find_map(|n| self.id_of(&n))
    }

    /// Every descendant of `root` matching `selector`, in document order.
    pub fn query_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        match self.resolve(root) {
            Some(node) => node
                .inclusive_descendants()
                .skip(1)
                .filter(|n| selector.matches(n))
                .filter_map(|n| self.id_of(&n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Deep copy of the children of `id`.
    pub fn snapshot_children(&self, id: NodeId) -> Fragment {
        match self.resolve(id) {
            Some(node) => Fragment::new(node.children().filter_map(|c| deep_copy(&c)).collect()),
            None => Fragment::default(),
        }
    }

    /// Replace the children of `id` with fresh nodes built from `fragment`.
    pub fn restore_children(&mut self, id: NodeId, fragment: &Fragment) {
        self.remove_children(id);
        for template in fragment.nodes() {
            let Some(copy) = deep_copy(template) else {
                continue;
            };
            let child = self.adopt(&copy);
            self.append_child(id, child);
        }
    }

    /// Serialized markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        match self.resolve(id) {
            Some(node) => node.children().map(|c| c.to_string()).collect(),
            None => String::new(),
        }
    }

    /// Start queueing mutation records for the subtree at `target`.
    pub fn observe(&mut self, target: NodeId) {
        self.observed = Some(target);
    }

    /// Stop queueing records and drop any pending ones.
    pub fn disconnect(&mut self) {
        self.observed = None;
        self.records.clear();
    }

    pub fn is_observing(&self) -> bool {
        self.observed.is_some()
    }

    /// Drain pending mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    fn record(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        let Some(observed) = self.observed else {
            return;
        };
        if self.is_inclusive_ancestor(observed, target) {
            self.records.push(MutationRecord {
                target,
                added,
                removed,
            });
        }
    }
}
