//! Rule definitions and compilation.

pub mod compiler;

pub use compiler::{CompilerConfig, Matcher, RuleCompiler};

use serde::{Deserialize, Serialize};

use crate::{Effect, RuleKind};

fn default_true() -> bool {
    true
}

/// A user-defined matching directive.
///
/// Rules are evaluated in list order; the first enabled rule whose matcher
/// finds a span in a post's text decides the post's effect.
///
/// # Examples
/// ```
/// use feedguard::{Effect, Rule};
///
/// let rule = Rule::literal("r1", "sponsored").replace_with("[SPONSORED CONTENT]");
/// assert_eq!(rule.effect, Effect::Replace);
/// assert_eq!(rule.alternatives(), vec!["sponsored"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Opaque identifier, stable across edits
    pub id: String,
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: RuleKind,
    /// One or more `|`-separated alternatives
    #[serde(alias = "target")]
    pub pattern: String,
    #[serde(alias = "replacement", default)]
    pub replacement_text: String,
    #[serde(alias = "action", default)]
    pub effect: Effect,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub match_whole_word: bool,
    /// Shipped with the extension rather than user-created
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

impl Rule {
    /// Create an enabled rule with default flags.
    pub fn new(id: impl Into<String>, kind: RuleKind, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            pattern: pattern.into(),
            replacement_text: String::new(),
            effect: Effect::Replace,
            enabled: true,
            case_sensitive: false,
            match_whole_word: false,
            is_default: false,
        }
    }

    pub fn literal(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(id, RuleKind::Literal, pattern)
    }

    pub fn wildcard(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(id, RuleKind::Wildcard, pattern)
    }

    pub fn semantic(id: impl Into<String>, intent: impl Into<String>) -> Self {
        Self::new(id, RuleKind::Semantic, intent)
    }

    /// Use the `replace` effect with the given replacement text.
    pub fn replace_with(mut self, replacement: impl Into<String>) -> Self {
        self.effect = Effect::Replace;
        self.replacement_text = replacement.into();
        self
    }

    /// Use the `hide` effect.
    pub fn hide(mut self) -> Self {
        self.effect = Effect::Hide;
        self
    }

    pub fn case_sensitive(mut self, on: bool) -> Self {
        self.case_sensitive = on;
        self
    }

    pub fn whole_word(mut self, on: bool) -> Self {
        self.match_whole_word = on;
        self
    }

    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }

    /// Trimmed, non-empty alternatives of the pattern.
    pub fn alternatives(&self) -> Vec<&str> {
        self.pattern
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    }
}

/// Rules installed on first run.
pub fn default_rules() -> Vec<Rule> {
    let mut sponsored =
        Rule::literal("default-sponsored", "sponsored|promoted").replace_with("[SPONSORED CONTENT]");
    sponsored.match_whole_word = true;
    sponsored.is_default = true;

    let mut engagement = Rule::wildcard("default-engagement-bait", "like if you*|retweet if you*")
        .hide()
        .enabled(false);
    engagement.is_default = true;

    let mut crypto = Rule::literal("default-crypto-giveaway", "crypto giveaway|free airdrop")
        .replace_with("**[scam filtered]**")
        .enabled(false);
    crypto.is_default = true;

    vec![sponsored, engagement, crypto]
}
