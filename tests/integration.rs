//! End-to-end filtering scenarios against a simulated feed.

use feedguard::dom::{Document, NodeId};
use feedguard::{
    CompileError, Configuration, Error, FeedWatcher, FlaggedEvent, MemoryStore, Notification,
    Outcome, PageLayout, PostProcessor, Rule, RuleCompiler, Settings, StorageBridge, View,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Append a post shaped like the default page layout.
fn add_post(doc: &mut Document, handle: &str, status: u64, text: &str) -> NodeId {
    let body = doc.body();
    let post = doc.create_element("article");
    doc.set_attribute(post, "data-testid", "tweet");

    let author = doc.create_element("div");
    doc.set_attribute(author, "data-testid", "User-Name");
    let name = doc.create_text(&format!("Display Name @{}", handle));
    doc.append_child(author, name);
    doc.append_child(post, author);

    let link = doc.create_element("a");
    doc.set_attribute(link, "href", &format!("/{}/status/{}", handle, status));
    let when = doc.create_text("1h");
    doc.append_child(link, when);
    doc.append_child(post, link);

    let region = doc.create_element("div");
    doc.set_attribute(region, "data-testid", "tweetText");
    let t = doc.create_text(text);
    doc.append_child(region, t);
    doc.append_child(post, region);

    doc.append_child(body, post);
    post
}

fn text_region(doc: &Document, post: NodeId) -> NodeId {
    doc.query(post, &PageLayout::default().text_region).unwrap()
}

fn watcher_with(store: &Arc<MemoryStore>) -> FeedWatcher {
    let processor = PostProcessor::new(store.configuration(), store.clone());
    FeedWatcher::new(processor)
}

#[test]
fn test_sponsored_replacement_and_round_trip() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "brand", 1, "This is a sponsored post");

    // Mixed inline markup must survive a toggle byte for byte
    let region = text_region(&doc, post);
    let mention = doc.create_element("a");
    doc.set_attribute(mention, "href", "/friend");
    let mention_text = doc.create_text(" @friend & co");
    doc.append_child(mention, mention_text);
    doc.append_child(region, mention);
    let original = doc.inner_html(region);

    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::literal("r1", "sponsored").replace_with("[SPONSORED CONTENT]")],
    )));
    let mut watcher = watcher_with(&store);
    assert!(watcher.start(&mut doc));

    assert_eq!(
        doc.inner_html(region),
        "This is a [SPONSORED CONTENT] post<a href=\"/friend\"> @friend &amp; co</a>"
    );
    let modified = doc.inner_html(region);

    let processor = watcher.processor_mut();
    assert_eq!(processor.toggle(&mut doc, post).unwrap(), View::Original);
    assert_eq!(doc.inner_html(region), original);
    assert_eq!(processor.toggle(&mut doc, post).unwrap(), View::Modified);
    assert_eq!(doc.inner_html(region), modified);

    let log = store.flagged_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].post_url, "https://x.com/brand/status/1");
    assert_eq!(log[0].username, "brand");
    assert_eq!(log[0].matched_rule_id, "r1");
}

#[test]
fn test_full_revert_leaves_no_trace() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "bot", 2, "free crypto giveaway");
    let before = doc.inner_html(post);

    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::literal("c", "crypto").hide()],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);
    assert_ne!(doc.inner_html(post), before);

    assert_eq!(watcher.revert_all(&mut doc), 1);
    assert_eq!(doc.inner_html(post), before);
    assert!(!doc.is_hidden(text_region(&doc, post)));
}

#[test]
fn test_whole_word_ad_does_not_hide_advertisement() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "shop", 3, "Look at this advertisement");
    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::literal("ad", "ad").whole_word(true).hide()],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);

    assert!(!doc.is_hidden(text_region(&doc, post)));
    assert!(watcher.processor().store().is_empty());
    assert!(store.flagged_log().is_empty());
}

#[test]
fn test_idempotent_processing() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "spammer", 4, "spam and more spam");
    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::literal("s", "spam").replace_with("**ham**")],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);

    let region = text_region(&doc, post);
    let once = doc.inner_html(region);
    assert_eq!(once, "<strong>ham</strong> and more <strong>ham</strong>");

    let processor = watcher.processor_mut();
    assert_eq!(processor.process(&mut doc, post), Outcome::AlreadyModified);
    assert_eq!(processor.process(&mut doc, post), Outcome::AlreadyModified);
    assert_eq!(doc.inner_html(region), once);
    assert_eq!(store.flagged_log().len(), 1);
}

#[test]
fn test_first_rule_in_list_wins() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "mixed", 5, "win a free phone");
    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![
            Rule::wildcard("w", "fr?e").replace_with("*gratis*"),
            Rule::literal("h", "phone").hide(),
        ],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);

    let region = text_region(&doc, post);
    assert!(!doc.is_hidden(region));
    assert_eq!(doc.inner_html(region), "win a <em>gratis</em> phone");
    assert_eq!(store.flagged_log()[0].matched_rule_id, "w");
}

#[test]
fn test_invalid_rule_is_skipped_and_next_rule_wins() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "loud", 17, "spam everywhere");

    // Thousands of Unicode `\w*` runs exceed the compiled size limit
    let oversized = Rule::wildcard("huge", "x*".repeat(5_000)).hide();
    assert!(matches!(
        RuleCompiler::new().try_compile(&oversized),
        Err(CompileError::InvalidExpression(_))
    ));

    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![oversized, Rule::literal("valid", "spam").replace_with("ham")],
    )));
    let mut watcher = watcher_with(&store);
    let outcomes = watcher.process_all(&mut doc);

    assert_eq!(
        outcomes,
        vec![(post, Outcome::Replaced { rule_id: "valid".to_string() })]
    );
    let region = text_region(&doc, post);
    assert!(!doc.is_hidden(region));
    assert_eq!(doc.inner_html(region), "ham everywhere");
    assert_eq!(store.flagged_log()[0].matched_rule_id, "valid");
}

#[test]
fn test_disabling_reverts_posts_and_stops_watching() {
    let mut doc = Document::new();
    let a = add_post(&mut doc, "one", 6, "spam one");
    let b = add_post(&mut doc, "two", 7, "spam two");
    let originals = [doc.inner_html(a), doc.inner_html(b)];

    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![
            Rule::literal("s1", "one").hide(),
            Rule::literal("s2", "spam").replace_with("x"),
        ],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);
    assert_eq!(watcher.processor().store().len(), 2);

    store
        .save_settings(&Settings {
            extension_enabled: false,
            ..Settings::default()
        })
        .unwrap();
    for notification in store.take_notifications() {
        watcher.on_notification(&mut doc, notification);
    }

    assert!(!watcher.is_running());
    assert!(!doc.is_observing());
    assert_eq!(doc.inner_html(a), originals[0]);
    assert_eq!(doc.inner_html(b), originals[1]);

    // Nothing new is processed while disabled
    add_post(&mut doc, "three", 8, "spam three");
    assert_eq!(watcher.pump(&mut doc), 0);
    assert!(watcher.processor().store().is_empty());
}

#[test]
fn test_rules_change_reevaluates_posts() {
    let mut doc = Document::new();
    let a = add_post(&mut doc, "one", 9, "spam here");
    let b = add_post(&mut doc, "two", 10, "eggs here");
    let region_a = text_region(&doc, a);
    let region_b = text_region(&doc, b);
    let original_a = doc.inner_html(region_a);

    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::literal("s", "spam").replace_with("x")],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);
    assert_eq!(doc.inner_html(region_a), "x here");

    store.save_rules(&[Rule::literal("e", "eggs").hide()]).unwrap();
    for notification in store.take_notifications() {
        watcher.on_notification(&mut doc, notification);
    }

    assert_eq!(doc.inner_html(region_a), original_a);
    assert!(doc.is_hidden(region_b));
    assert_eq!(watcher.processor().store().modified_posts(), vec![b]);
    assert_eq!(store.flagged_log().len(), 2);
}

#[test]
fn test_reprocessing_does_not_duplicate_log_entries() {
    let mut doc = Document::new();
    add_post(&mut doc, "one", 11, "spam");
    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::literal("s", "spam").hide()],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);

    // Same rules saved again: revert, re-apply, same post URL
    store.save_rules(&[Rule::literal("s", "spam").hide()]).unwrap();
    for notification in store.take_notifications() {
        watcher.on_notification(&mut doc, notification);
    }
    assert_eq!(store.flagged_log().len(), 1);
    assert_eq!(store.analytics().flags_by_user["one"], 1);
}

#[test]
fn test_posts_inserted_after_start() {
    let mut doc = Document::new();
    let store = Arc::new(MemoryStore::with_configuration(Configuration::new(
        Settings::default(),
        vec![Rule::wildcard("bait", "click*").whole_word(true).hide()],
    )));
    let mut watcher = watcher_with(&store);
    watcher.start(&mut doc);

    let hit = add_post(&mut doc, "a", 12, "CLICKHERE now");
    let miss = add_post(&mut doc, "b", 13, "doubleclick");
    assert_eq!(watcher.pump(&mut doc), 2);

    assert!(doc.is_hidden(text_region(&doc, hit)));
    assert!(!doc.is_hidden(text_region(&doc, miss)));
}

struct FlakyBridge {
    inner: MemoryStore,
    down: AtomicBool,
}

impl StorageBridge for FlakyBridge {
    fn get_configuration(&self) -> feedguard::Result<Configuration> {
        self.inner.get_configuration()
    }

    fn save_rules(&self, rules: &[Rule]) -> feedguard::Result<()> {
        self.inner.save_rules(rules)
    }

    fn save_settings(&self, settings: &Settings) -> feedguard::Result<()> {
        self.inner.save_settings(settings)
    }

    fn log_flagged_event(&self, event: &FlaggedEvent) -> feedguard::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Transport("no receiver".to_string()));
        }
        self.inner.log_flagged_event(event)
    }
}

#[test]
fn test_log_failure_keeps_dom_action_and_retries() {
    let mut doc = Document::new();
    let post = add_post(&mut doc, "late", 14, "spam");
    let bridge = Arc::new(FlakyBridge {
        inner: MemoryStore::with_configuration(Configuration::new(
            Settings::default(),
            vec![Rule::literal("s", "spam").hide()],
        )),
        down: AtomicBool::new(true),
    });
    let processor = PostProcessor::new(bridge.inner.configuration(), bridge.clone());
    let mut watcher = FeedWatcher::new(processor);
    watcher.start(&mut doc);

    assert!(doc.is_hidden(text_region(&doc, post)));
    assert!(bridge.inner.flagged_log().is_empty());

    bridge.down.store(false, Ordering::SeqCst);
    let outcome = watcher.processor_mut().process(&mut doc, post);
    assert_eq!(outcome, Outcome::AlreadyModified);
    assert_eq!(bridge.inner.flagged_log().len(), 1);
}
