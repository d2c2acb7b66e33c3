//! Post discovery and reaction to configuration changes.

use ahash::AHashSet;

use crate::bridge::Notification;
use crate::config::Settings;
use crate::dom::{Document, MutationRecord, NodeId};
use crate::processor::PostProcessor;
use crate::state::Outcome;

/// Feeds posts found in the document to a [`PostProcessor`].
///
/// The watcher observes the document body. Inserted nodes that are posts, or
/// contain posts, are processed when the queued mutations are handled
/// ([`FeedWatcher::pump`]). Removed posts have their state pruned.
pub struct FeedWatcher {
    processor: PostProcessor,
    running: bool,
}

impl FeedWatcher {
    pub fn new(processor: PostProcessor) -> Self {
        Self {
            processor,
            running: false,
        }
    }

    pub fn processor(&self) -> &PostProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut PostProcessor {
        &mut self.processor
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin observing and process the posts already present.
    ///
    /// Returns false without observing when filtering is disabled.
    pub fn start(&mut self, doc: &mut Document) -> bool {
        if !self.processor.configuration().settings.extension_enabled {
            log::info!("Filtering disabled, watcher not started");
            return false;
        }

        doc.observe(doc.body());
        self.running = true;
        let processed = self.process_all(doc);
        log::info!("Watcher started, {} post(s) present", processed.len());
        true
    }

    /// Stop observing. Existing modifications are left in place.
    pub fn stop(&mut self, doc: &mut Document) {
        doc.disconnect();
        if self.running {
            log::info!("Watcher stopped");
        }
        self.running = false;
    }

    /// Handle one batch of mutation records. Returns the number of posts
    /// handed to the processor.
    pub fn handle_mutations(&mut self, doc: &mut Document, records: &[MutationRecord]) -> usize {
        if !self.running {
            return 0;
        }

        let selector = self.processor.layout().post.clone();
        let mut seen = AHashSet::new();
        let mut posts = Vec::new();
        let mut removals = false;

        for record in records {
            removals |= !record.removed.is_empty();
            for &added in &record.added {
                if !doc.is_connected(added) {
                    continue;
                }
                if doc.matches(added, &selector) && seen.insert(added) {
                    posts.push(added);
                }
                for post in doc.query_all(added, &selector) {
                    if seen.insert(post) {
                        posts.push(post);
                    }
                }
            }
        }

        for &post in &posts {
            self.processor.process(doc, post);
        }

        if removals {
            let pruned = self.processor.store_mut().prune(doc);
            if pruned > 0 {
                log::debug!("Pruned state of {} removed post(s)", pruned);
            }
        }

        posts.len()
    }

    /// Drain the document's pending mutation records and handle them.
    pub fn pump(&mut self, doc: &mut Document) -> usize {
        let records = doc.take_records();
        if records.is_empty() {
            return 0;
        }
        self.handle_mutations(doc, &records)
    }

    /// React to a change made outside the filter.
    pub fn on_notification(&mut self, doc: &mut Document, notification: Notification) {
        match notification {
            Notification::SettingsChanged(settings) => self.apply_settings(doc, settings),
            Notification::RulesChanged => {
                let config = match self.processor.bridge().get_configuration() {
                    Ok(config) => config,
                    Err(e) => {
                        log::warn!("Failed to refetch rules, keeping current set: {}", e);
                        return;
                    }
                };
                log::info!("Rules changed, {} rule(s) loaded", config.rules.len());
                let settings = config.settings.clone();
                self.processor.update_configuration(config);
                self.rerender(doc, &settings);
            }
        }
    }

    fn apply_settings(&mut self, doc: &mut Document, settings: Settings) {
        self.processor.update_settings(settings.clone());
        self.rerender(doc, &settings);
    }

    fn rerender(&mut self, doc: &mut Document, settings: &Settings) {
        if !settings.extension_enabled {
            self.stop(doc);
            let reverted = self.revert_all(doc);
            log::info!("Filtering disabled, reverted {} post(s)", reverted);
            return;
        }

        self.revert_all(doc);
        if self.running {
            self.process_all(doc);
        } else {
            self.start(doc);
        }
    }

    /// Revert every modified post and forget all outcomes.
    pub fn revert_all(&mut self, doc: &mut Document) -> usize {
        let mut reverted = 0;
        for post in self.processor.store().modified_posts() {
            if self.processor.revert(doc, post) {
                reverted += 1;
            }
        }
        self.processor.store_mut().clear_outcomes();
        reverted
    }

    /// Process every post currently in the document.
    pub fn process_all(&mut self, doc: &mut Document) -> Vec<(NodeId, Outcome)> {
        let selector = self.processor.layout().post.clone();
        let posts = doc.query_all(doc.body(), &selector);
        let mut outcomes = Vec::with_capacity(posts.len());
        for post in posts {
            outcomes.push((post, self.processor.process(doc, post)));
        }
        outcomes
    }
}
