//! Per-post modification state.
//!
//! The store is the only holder of what a post looked like before it was
//! touched. Records are keyed by the post's [`NodeId`]; entries for posts that
//! left the document are dropped by [`PostStateStore::prune`].

use ahash::AHashMap;

use crate::bridge::FlaggedEvent;
use crate::dom::{Document, Fragment, NodeId};

/// Which effect is currently applied to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EffectApplied {
    #[default]
    None,
    Replace,
    Hide,
}

/// Which of the two views of a modified post is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Original,
    Modified,
}

/// Result of the last processing pass over a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Filtering is switched off
    Disabled,
    /// Post already shows a modification; nothing was done
    AlreadyModified,
    /// Post has no text region; it is skipped for the node's lifetime
    NoText,
    /// No enabled rule matched
    NoMatch,
    Replaced { rule_id: String },
    Hidden { rule_id: String },
}

/// What the filter remembers about one modified post.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub text_region: NodeId,
    /// Children of the text region before the first modification
    pub original_text_markup: Fragment,
    /// Inline display of the text region before the first modification
    pub original_visibility: Option<String>,
    /// Text region children after a replacement; only set for `Replace`
    pub modified_text_markup: Option<Fragment>,
    pub effect_applied: EffectApplied,
    pub is_showing_modified: bool,
    pub matched_rule_id: Option<String>,
    /// Pattern of the rule behind the current modification
    pub matched_rule_target: Option<String>,
    pub already_logged: bool,
    /// Event waiting to be delivered after a failed attempt
    pub pending_event: Option<FlaggedEvent>,
    pub placeholder: Option<NodeId>,
    pub badge: Option<NodeId>,
}

impl PostRecord {
    fn capture(doc: &Document, text_region: NodeId) -> Self {
        Self {
            text_region,
            original_text_markup: doc.snapshot_children(text_region),
            original_visibility: doc.display(text_region),
            modified_text_markup: None,
            effect_applied: EffectApplied::None,
            is_showing_modified: false,
            matched_rule_id: None,
            matched_rule_target: None,
            already_logged: false,
            pending_event: None,
            placeholder: None,
            badge: None,
        }
    }

    /// Text the rules are evaluated against.
    pub fn original_text(&self) -> String {
        self.original_text_markup.text_content()
    }

    /// Original text split at text node boundaries.
    pub fn original_text_segments(&self) -> Vec<String> {
        self.original_text_markup.text_segments()
    }

    pub fn current_view(&self) -> View {
        if self.is_showing_modified {
            View::Modified
        } else {
            View::Original
        }
    }
}

/// Records and processing outcomes, keyed by post.
#[derive(Debug, Default)]
pub struct PostStateStore {
    records: AHashMap<NodeId, PostRecord>,
    outcomes: AHashMap<NodeId, Outcome>,
}

impl PostStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the post's record, capturing the text region's current content
    /// and visibility if this is the first time the post is modified.
    ///
    /// An existing record is never re-captured.
    pub fn ensure_captured(
        &mut self,
        doc: &Document,
        post: NodeId,
        text_region: NodeId,
    ) -> &mut PostRecord {
        self.records
            .entry(post)
            .or_insert_with(|| PostRecord::capture(doc, text_region))
    }

    pub fn get(&self, post: NodeId) -> Option<&PostRecord> {
        self.records.get(&post)
    }

    pub fn get_mut(&mut self, post: NodeId) -> Option<&mut PostRecord> {
        self.records.get_mut(&post)
    }

    pub fn remove(&mut self, post: NodeId) -> Option<PostRecord> {
        self.records.remove(&post)
    }

    pub fn contains(&self, post: NodeId) -> bool {
        self.records.contains_key(&post)
    }

    pub fn mark_processed(&mut self, post: NodeId, outcome: Outcome) {
        self.outcomes.insert(post, outcome);
    }

    pub fn outcome(&self, post: NodeId) -> Option<&Outcome> {
        self.outcomes.get(&post)
    }

    pub fn clear_outcome(&mut self, post: NodeId) {
        self.outcomes.remove(&post);
    }

    /// Forget processing outcomes so posts are evaluated again. `NoText`
    /// markers are permanent for their node and are kept.
    pub fn clear_outcomes(&mut self) {
        self.outcomes
            .retain(|_, outcome| matches!(outcome, Outcome::NoText));
    }

    /// Posts with a record, in ascending id order.
    pub fn modified_posts(&self) -> Vec<NodeId> {
        let mut posts: Vec<_> = self.records.keys().copied().collect();
        posts.sort();
        posts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop state of posts no longer connected to the document.
    /// Returns the number of records removed.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.records.len();
        self.records.retain(|&post, _| doc.is_connected(post));
        self.outcomes.retain(|&post, _| doc.is_connected(post));
        before - self.records.len()
    }
}
