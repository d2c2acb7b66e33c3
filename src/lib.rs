//! Feedguard - rule-based filtering of social feed posts.
//!
//! Users define ordered rules (literal phrases, `*`/`?` wildcards) that either
//! rewrite the matched text of a post or hide its text body. Every modification
//! is recorded so it can be toggled off and on again, or fully reverted.
//!
//! # Components
//!
//! - [`RuleCompiler`]: turns a [`Rule`] into a cached [`Matcher`]
//! - [`TextRewriter`]: replaces matched spans inside text nodes
//! - [`PostStateStore`]: remembers original and modified markup per post
//! - [`PostProcessor`]: first-match-wins evaluation, hide/replace, toggle, revert
//! - [`FeedWatcher`]: discovers posts and reacts to configuration changes
//!
//! Pages are modelled by [`dom::Document`], a handle-based view of an HTML tree. Persistent state lives
//! behind a [`StorageBridge`]; [`MemoryStore`] is an in-process implementation.
//!
//! # Quick Start
//!
//! ```
//! use feedguard::{Rule, RuleCompiler};
//!
//! let compiler = RuleCompiler::new();
//! let matcher = compiler
//!     .compile(&Rule::wildcard("bait", "click*").whole_word(true))
//!     .unwrap();
//!
//! assert!(matcher.is_match("Clickbait ahead"));
//! assert!(!matcher.is_match("doubleclick"));
//! ```
//!
//! Replacement text supports `**strong**` and `*emphasis*`:
//!
//! ```
//! use feedguard::rewrite::ReplacementMarkup;
//!
//! let markup = ReplacementMarkup::parse("**[AD]** <removed>");
//! assert_eq!(markup.to_html(), "<strong>[AD]</strong> &lt;removed&gt;");
//! ```
//!
//! # Rule Evaluation
//!
//! 1. Disabled, semantic and empty-pattern rules are skipped
//! 2. Remaining rules are tried in configuration order
//! 3. The first rule that matches the post's original text wins

mod effect;
mod error;
mod rule_kind;

pub mod analytics;
pub mod bridge;
pub mod config;
pub mod dom;
pub mod message;
pub mod processor;
pub mod rewrite;
pub mod rule;
pub mod state;
pub mod store;
pub mod watcher;

pub use analytics::LocalAnalytics;
pub use bridge::{FlaggedEvent, Notification, StorageBridge};
pub use config::{Configuration, PageLayout, Settings};
pub use effect::{ActionTaken, Effect};
pub use error::{CompileError, Error, Result};
pub use message::{Request, Response};
pub use processor::PostProcessor;
pub use rewrite::{ReplacementMarkup, TextRewriter};
pub use rule::{default_rules, CompilerConfig, Matcher, Rule, RuleCompiler};
pub use rule_kind::RuleKind;
pub use state::{EffectApplied, Outcome, PostRecord, PostStateStore, View};
pub use store::MemoryStore;
pub use watcher::FeedWatcher;
