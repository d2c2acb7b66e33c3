//! Per-post rule evaluation and modification.
//!
//! A post moves between `Unprocessed`, `Matched(replace)`, `Matched(hide)` and
//! `NoMatch`. Every modification goes through the [`PostStateStore`] first, so
//! it can be undone ([`PostProcessor::revert`]) or flipped between its original
//! and modified views ([`PostProcessor::toggle`]).

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::bridge::{now_millis, FlaggedEvent, StorageBridge};
use crate::config::{Configuration, PageLayout, Settings};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::rewrite::{ReplacementMarkup, TextRewriter};
use crate::rule::{Matcher, Rule, RuleCompiler};
use crate::state::{EffectApplied, Outcome, PostRecord, PostStateStore, View};
use crate::Effect;

/// Attribute set on every element the filter inserts.
pub const MARKER_ATTR: &str = "data-feedguard";

const PLACEHOLDER_MARK: &str = "placeholder";
const BADGE_MARK: &str = "badge";

static HANDLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").unwrap());

/// Applies the first matching rule to posts and keeps them reversible.
pub struct PostProcessor {
    config: ArcSwap<Configuration>,
    layout: PageLayout,
    compiler: RuleCompiler,
    store: PostStateStore,
    bridge: Arc<dyn StorageBridge>,
}

impl PostProcessor {
    /// Create a processor for the default page layout.
    pub fn new(config: Configuration, bridge: Arc<dyn StorageBridge>) -> Self {
        Self::with_layout(config, PageLayout::default(), bridge)
    }

    pub fn with_layout(
        config: Configuration,
        layout: PageLayout,
        bridge: Arc<dyn StorageBridge>,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            layout,
            compiler: RuleCompiler::new(),
            store: PostStateStore::new(),
            bridge,
        }
    }

    /// Snapshot of the configuration in effect.
    pub fn configuration(&self) -> Arc<Configuration> {
        self.config.load_full()
    }

    /// Replace the whole configuration. Posts are not re-evaluated here.
    pub fn update_configuration(&self, config: Configuration) {
        self.config.store(Arc::new(config));
    }

    /// Replace the settings, keeping the current rules.
    pub fn update_settings(&self, settings: Settings) {
        let rules = self.config.load().rules.clone();
        self.update_configuration(Configuration::new(settings, rules));
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn store(&self) -> &PostStateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PostStateStore {
        &mut self.store
    }

    pub fn bridge(&self) -> &Arc<dyn StorageBridge> {
        &self.bridge
    }

    /// Evaluate the rules against a post and apply the first match.
    pub fn process(&mut self, doc: &mut Document, post: NodeId) -> Outcome {
        let config = self.config.load_full();
        if !config.settings.extension_enabled {
            return Outcome::Disabled;
        }

        if matches!(self.store.outcome(post), Some(Outcome::NoText)) {
            return Outcome::NoText;
        }

        let showing_modified = self
            .store
            .get(post)
            .is_some_and(|record| record.is_showing_modified);
        if showing_modified && self.store.outcome(post).is_some() {
            self.retry_pending(post, &config.settings);
            return Outcome::AlreadyModified;
        }

        let Some(text_region) = doc.query(post, &self.layout.text_region) else {
            log::debug!("Post {:?} has no text region, skipping", post);
            self.store.mark_processed(post, Outcome::NoText);
            return Outcome::NoText;
        };

        // Evaluate against the pristine text, never a previous rewrite.
        let (text, segments) = match self.store.get(post) {
            Some(record) => (record.original_text(), record.original_text_segments()),
            None => (
                doc.text_content(text_region),
                doc.text_nodes(text_region)
                    .into_iter()
                    .filter_map(|node| doc.text(node))
                    .collect::<Vec<_>>(),
            ),
        };

        let matched = config.enabled_rules().find_map(|rule| {
            let matcher = self.compiler.compile(rule)?;
            let span = match rule.effect {
                // Rewrites happen per text node, so a replace rule must match
                // inside one of them.
                Effect::Replace => segments.iter().find_map(|s| matcher.first_match(s))?,
                Effect::Hide => matcher.first_match(&text)?,
            }
            .to_string();
            Some((rule, matcher, span))
        });

        let outcome = match matched {
            Some((rule, matcher, span)) => {
                let outcome = match rule.effect {
                    Effect::Hide => {
                        self.apply_hide(doc, post, text_region, rule, &config.settings);
                        Outcome::Hidden {
                            rule_id: rule.id.clone(),
                        }
                    }
                    Effect::Replace => {
                        self.apply_replace(doc, post, text_region, rule, &matcher, &config.settings);
                        Outcome::Replaced {
                            rule_id: rule.id.clone(),
                        }
                    }
                };
                self.emit_event(doc, post, rule, span, &config.settings);
                outcome
            }
            None => {
                if self.store.contains(post) {
                    self.revert(doc, post);
                }
                Outcome::NoMatch
            }
        };

        self.store.mark_processed(post, outcome.clone());
        outcome
    }

    fn apply_hide(
        &mut self,
        doc: &mut Document,
        post: NodeId,
        text_region: NodeId,
        rule: &Rule,
        settings: &Settings,
    ) {
        let record = self.store.ensure_captured(doc, post, text_region);
        let changed = record.matched_rule_id.as_deref() != Some(rule.id.as_str())
            || record.effect_applied != EffectApplied::Hide;

        if record.effect_applied == EffectApplied::Replace {
            doc.restore_children(text_region, &record.original_text_markup);
        }
        doc.set_display(text_region, Some("none"));

        if let Some(old) = record.placeholder.take() {
            doc.remove(old);
        }
        let placeholder = create_placeholder(doc, &rule.pattern);
        doc.insert_after(text_region, placeholder);
        record.placeholder = Some(placeholder);

        record.effect_applied = EffectApplied::Hide;
        record.modified_text_markup = None;
        record.is_showing_modified = true;
        record.matched_rule_id = Some(rule.id.clone());
        record.matched_rule_target = Some(rule.pattern.clone());
        if changed {
            record.already_logged = false;
            record.pending_event = None;
        }

        sync_badge(doc, record, settings);
        log::debug!("Hid post {:?} by rule {}", post, rule.id);
    }

    fn apply_replace(
        &mut self,
        doc: &mut Document,
        post: NodeId,
        text_region: NodeId,
        rule: &Rule,
        matcher: &Matcher,
        settings: &Settings,
    ) {
        let record = self.store.ensure_captured(doc, post, text_region);
        let changed = record.matched_rule_id.as_deref() != Some(rule.id.as_str())
            || record.effect_applied != EffectApplied::Replace;

        if let Some(old) = record.placeholder.take() {
            doc.remove(old);
        }
        doc.set_display(text_region, record.original_visibility.as_deref());

        // Undo any stale rewrite before applying this one.
        if record.effect_applied != EffectApplied::None {
            doc.restore_children(text_region, &record.original_text_markup);
        }

        let markup = ReplacementMarkup::parse(&rule.replacement_text);
        let count = TextRewriter::apply(doc, text_region, matcher, &markup);

        record.modified_text_markup = Some(doc.snapshot_children(text_region));
        record.effect_applied = EffectApplied::Replace;
        record.is_showing_modified = true;
        record.matched_rule_id = Some(rule.id.clone());
        record.matched_rule_target = Some(rule.pattern.clone());
        if changed {
            record.already_logged = false;
            record.pending_event = None;
        }

        sync_badge(doc, record, settings);
        log::debug!("Replaced {} span(s) in post {:?} by rule {}", count, post, rule.id);
    }

    /// Restore a post to its pristine state and forget it.
    ///
    /// Returns false when the post had no recorded modification.
    pub fn revert(&mut self, doc: &mut Document, post: NodeId) -> bool {
        let Some(mut record) = self.store.remove(post) else {
            return false;
        };

        if record.effect_applied == EffectApplied::Replace {
            doc.restore_children(record.text_region, &record.original_text_markup);
        }
        doc.set_display(record.text_region, record.original_visibility.as_deref());

        if let Some(placeholder) = record.placeholder.take() {
            doc.remove(placeholder);
        }
        if let Some(badge) = record.badge.take() {
            doc.remove(badge);
        }

        self.store.clear_outcome(post);
        log::debug!("Reverted post {:?}", post);
        true
    }

    /// Flip a modified post between its original and modified views without
    /// re-running the rules.
    ///
    /// A replaced post missing its modified markup cannot be re-applied; it is
    /// fully reverted instead and `View::Original` is returned.
    pub fn toggle(&mut self, doc: &mut Document, post: NodeId) -> Result<View> {
        let settings = self.config.load().settings.clone();
        let record = self.store.get(post).ok_or(Error::UnknownPost)?;

        let consistent = record.is_showing_modified
            || match record.effect_applied {
                EffectApplied::Replace => record.modified_text_markup.is_some(),
                EffectApplied::Hide => true,
                EffectApplied::None => false,
            };
        if !consistent {
            log::warn!("Post {:?} has no modified view to show, reverting", post);
            self.revert(doc, post);
            return Ok(View::Original);
        }

        let record = self.store.get_mut(post).ok_or(Error::UnknownPost)?;
        let region = record.text_region;

        let view = if record.is_showing_modified {
            match record.effect_applied {
                EffectApplied::Replace => {
                    doc.restore_children(region, &record.original_text_markup);
                }
                EffectApplied::Hide => {
                    if let Some(placeholder) = record.placeholder.take() {
                        doc.remove(placeholder);
                    }
                    doc.set_display(region, record.original_visibility.as_deref());
                }
                EffectApplied::None => {}
            }
            record.is_showing_modified = false;
            View::Original
        } else {
            match record.effect_applied {
                EffectApplied::Replace => {
                    if let Some(ref modified) = record.modified_text_markup {
                        doc.restore_children(region, modified);
                    }
                }
                EffectApplied::Hide => {
                    doc.set_display(region, Some("none"));
                    let pattern = record.matched_rule_target.clone().unwrap_or_default();
                    let placeholder = create_placeholder(doc, &pattern);
                    doc.insert_after(region, placeholder);
                    record.placeholder = Some(placeholder);
                }
                EffectApplied::None => {}
            }
            record.is_showing_modified = true;
            View::Modified
        };

        sync_badge(doc, record, &settings);
        Ok(view)
    }

    fn emit_event(
        &mut self,
        doc: &Document,
        post: NodeId,
        rule: &Rule,
        matched_text: String,
        settings: &Settings,
    ) {
        if !settings.enable_local_logging {
            return;
        }
        if self.store.get(post).map_or(true, |record| record.already_logged) {
            return;
        }

        let event = FlaggedEvent {
            timestamp: now_millis(),
            post_url: self.post_url(doc, post),
            username: self.author_handle(doc, post),
            matched_rule_id: rule.id.clone(),
            matched_identifier: rule.pattern.clone(),
            action_taken: rule.effect.action_taken(),
            matched_text,
            replacement_text: match rule.effect {
                Effect::Replace => Some(rule.replacement_text.clone()),
                Effect::Hide => None,
            },
        };

        if let Some(record) = self.store.get_mut(post) {
            record.pending_event = Some(event);
        }
        self.deliver_pending(post);
    }

    fn retry_pending(&mut self, post: NodeId, settings: &Settings) {
        if !settings.enable_local_logging {
            return;
        }
        let due = self
            .store
            .get(post)
            .is_some_and(|record| !record.already_logged && record.pending_event.is_some());
        if due {
            log::debug!("Retrying flagged event for post {:?}", post);
            self.deliver_pending(post);
        }
    }

    fn deliver_pending(&mut self, post: NodeId) {
        let bridge = Arc::clone(&self.bridge);
        let Some(record) = self.store.get_mut(post) else {
            return;
        };
        let Some(event) = record.pending_event.as_ref() else {
            return;
        };

        match bridge.log_flagged_event(event) {
            Ok(()) => {
                record.already_logged = true;
                record.pending_event = None;
            }
            Err(e) => {
                log::warn!("Failed to log flagged event for post {:?}: {}", post, e);
            }
        }
    }

    /// Absolute permalink of a post, or an empty string when none is found.
    pub fn post_url(&self, doc: &Document, post: NodeId) -> String {
        let Some(href) = doc
            .query(post, &self.layout.permalink)
            .and_then(|link| doc.attribute(link, "href"))
        else {
            return String::new();
        };

        if href.starts_with("http://") || href.starts_with("https://") {
            return href;
        }
        let base = self.layout.base_url.trim_end_matches('/');
        if href.starts_with('/') {
            format!("{}{}", base, href)
        } else {
            format!("{}/{}", base, href)
        }
    }

    /// The `@handle` of a post's author (without `@`), falling back to the
    /// author block's trimmed text.
    pub fn author_handle(&self, doc: &Document, post: NodeId) -> String {
        let Some(author) = doc.query(post, &self.layout.author) else {
            return String::new();
        };
        let text = doc.text_content(author);
        match HANDLE_PATTERN.captures(&text).and_then(|caps| caps.get(1)) {
            Some(handle) => handle.as_str().to_string(),
            None => text.trim().to_string(),
        }
    }
}

fn create_placeholder(doc: &mut Document, pattern: &str) -> NodeId {
    let placeholder = doc.create_element("div");
    doc.set_attribute(placeholder, MARKER_ATTR, PLACEHOLDER_MARK);
    let label = doc.create_text(&format!("Post hidden by rule: \"{}\"", pattern));
    doc.append_child(placeholder, label);
    placeholder
}

fn badge_label(view: View) -> &'static str {
    match view {
        View::Modified => "Show original",
        View::Original => "Show modified",
    }
}

/// Create, relabel or remove the toggle badge of a record.
fn sync_badge(doc: &mut Document, record: &mut PostRecord, settings: &Settings) {
    if !settings.show_modification_badge {
        if let Some(badge) = record.badge.take() {
            doc.remove(badge);
        }
        return;
    }

    let badge = match record.badge {
        Some(badge) => badge,
        None => {
            let badge = doc.create_element("button");
            doc.set_attribute(badge, MARKER_ATTR, BADGE_MARK);
            record.badge = Some(badge);
            badge
        }
    };

    // Keep the badge right after the placeholder (or the text region).
    let anchor = record.placeholder.unwrap_or(record.text_region);
    doc.insert_after(anchor, badge);

    doc.remove_children(badge);
    let label = doc.create_text(badge_label(record.current_view()));
    doc.append_child(badge, label);
}
