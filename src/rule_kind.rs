//! Rule kind definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// RuleKind describes how a rule's pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Exact phrase matching
    #[default]
    Literal,
    /// Pattern with `*` (zero or more word characters) and `?` (any character)
    #[serde(alias = "simple-regex")]
    Wildcard,
    /// Intent description (no matcher, always inert)
    Semantic,
}

impl RuleKind {
    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Literal => "literal",
            RuleKind::Wildcard => "wildcard",
            RuleKind::Semantic => "semantic",
        }
    }

    /// Stable numeric tag, used when fingerprinting rules.
    pub fn as_u8(&self) -> u8 {
        match self {
            RuleKind::Literal => 0,
            RuleKind::Wildcard => 1,
            RuleKind::Semantic => 2,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
