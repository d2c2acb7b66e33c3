//! Rule compilation into executable matchers.
//!
//! A rule compiles to a single regular expression: its alternatives are
//! translated independently and joined with `|`. Compilation is pure, so
//! results (failures included) are cached by a fingerprint of the fields that
//! influence the expression.

use quick_cache::sync::Cache;
use regex::{Regex, RegexBuilder};
use std::hash::{Hash, Hasher};

use super::Rule;
use crate::error::CompileError;
use crate::RuleKind;

/// Default cache capacity (number of compiled rules).
const DEFAULT_CACHE_CAPACITY: usize = 1_024;

/// Default compiled regex size limit in bytes.
const DEFAULT_SIZE_LIMIT: usize = 1 << 20;

/// Regex fragment a `*` wildcard expands to. `\w` is Unicode-aware, so `*`
/// also runs over non-ASCII letters and digits (`caf*` matches "cafés").
const STAR_EXPANSION: &str = r"\w*";

/// Regex fragment a `?` wildcard expands to: one Unicode scalar value other
/// than a newline, not one byte.
const QUESTION_EXPANSION: &str = ".";

// Private-use code points; `regex::escape` leaves them untouched.
const STAR_PLACEHOLDER: char = '\u{E000}';
const QUESTION_PLACEHOLDER: char = '\u{E001}';

/// Executable form of a rule's pattern.
///
/// Matching is always global: every non-overlapping match in a text is
/// reported. Zero-length matches are ignored, so a wildcard-only pattern
/// such as `*` never matches by itself.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    case_sensitive: bool,
}

impl Matcher {
    /// Whether `text` contains at least one non-empty match.
    pub fn is_match(&self, text: &str) -> bool {
        self.find_iter(text).next().is_some()
    }

    /// First non-empty match in `text`.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.find_iter(text).next().map(|m| m.as_str())
    }

    /// All non-empty matches in `text`, left to right.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> impl Iterator<Item = regex::Match<'t>> + 'r
    where
        't: 'r,
    {
        self.regex.find_iter(text).filter(|m| !m.is_empty())
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// The generated expression (without flags).
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Configuration for the rule compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Maximum number of cached compilation results.
    pub cache_capacity: usize,
    /// Whether to cache compilation results.
    pub cache_enabled: bool,
    /// Size limit passed to the regex engine.
    pub size_limit: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }
}

impl CompilerConfig {
    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
            ..Self::default()
        }
    }
}

/// Compiles rules into matchers.
///
/// # Examples
/// ```
/// use feedguard::{Rule, RuleCompiler};
///
/// let compiler = RuleCompiler::new();
/// let matcher = compiler.compile(&Rule::wildcard("w", "buy*now")).unwrap();
/// assert!(matcher.is_match("BUYITNOW"));
/// assert!(compiler.compile(&Rule::semantic("s", "rage bait")).is_none());
/// ```
pub struct RuleCompiler {
    cache: Option<Cache<u64, Option<Matcher>>>,
    config: CompilerConfig,
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        let cache = if config.cache_enabled && config.cache_capacity > 0 {
            Some(Cache::new(config.cache_capacity))
        } else {
            None
        };
        Self { cache, config }
    }

    /// Compile a rule, returning `None` when the rule is inert.
    ///
    /// Construction failures are logged, never propagated.
    pub fn compile(&self, rule: &Rule) -> Option<Matcher> {
        let Some(cache) = &self.cache else {
            return self.compile_logged(rule);
        };

        let key = fingerprint(rule);
        if let Some(result) = cache.get(&key) {
            return result;
        }
        let result = self.compile_logged(rule);
        cache.insert(key, result.clone());
        result
    }

    fn compile_logged(&self, rule: &Rule) -> Option<Matcher> {
        match self.try_compile(rule) {
            Ok(matcher) => Some(matcher),
            Err(CompileError::InvalidExpression(e)) => {
                log::warn!("Rule {} has an invalid pattern, skipping: {}", rule.id, e);
                None
            }
            Err(e) => {
                log::debug!("Rule {} is inert: {}", rule.id, e);
                None
            }
        }
    }

    /// Compile a rule, reporting why it could not be compiled.
    pub fn try_compile(&self, rule: &Rule) -> Result<Matcher, CompileError> {
        if rule.kind == RuleKind::Semantic {
            return Err(CompileError::SemanticUnsupported);
        }

        let alternatives = rule.alternatives();
        if alternatives.is_empty() {
            return Err(CompileError::EmptyPattern);
        }

        let pattern = alternatives
            .iter()
            .map(|alt| translate_alternative(alt, rule.kind, rule.match_whole_word))
            .collect::<Vec<_>>()
            .join("|");

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!rule.case_sensitive)
            .size_limit(self.config.size_limit)
            .build()?;

        Ok(Matcher {
            regex,
            case_sensitive: rule.case_sensitive,
        })
    }

    /// Number of cached compilation results.
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }
}

/// Translate one trimmed alternative into a regex fragment.
fn translate_alternative(alt: &str, kind: RuleKind, whole_word: bool) -> String {
    let is_wildcard = |c: char| kind == RuleKind::Wildcard && (c == '*' || c == '?');

    let body = if kind == RuleKind::Wildcard {
        // Placeholders first, then escape, then expand the placeholders.
        let marked: String = alt
            .chars()
            .map(|c| match c {
                '*' => STAR_PLACEHOLDER,
                '?' => QUESTION_PLACEHOLDER,
                other => other,
            })
            .collect();
        regex::escape(&marked)
            .replace(STAR_PLACEHOLDER, STAR_EXPANSION)
            .replace(QUESTION_PLACEHOLDER, QUESTION_EXPANSION)
    } else {
        regex::escape(alt)
    };

    if !whole_word || alt.chars().all(is_wildcard) {
        return body;
    }

    let leading = alt.chars().next().is_some_and(is_wildcard);
    let trailing = alt.chars().last().is_some_and(is_wildcard);

    let mut out = String::with_capacity(body.len() + 4);
    if !leading {
        out.push_str(r"\b");
    }
    out.push_str(&body);
    if !trailing {
        out.push_str(r"\b");
    }
    out
}

fn fingerprint(rule: &Rule) -> u64 {
    let mut hasher = ahash::AHasher::default();
    rule.kind.as_u8().hash(&mut hasher);
    rule.pattern.hash(&mut hasher);
    rule.case_sensitive.hash(&mut hasher);
    rule.match_whole_word.hash(&mut hasher);
    hasher.finish()
}
