//! Effect types for rule matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Effect represents the action to take when a rule matches a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Replace matched spans with the rule's replacement text
    #[default]
    Replace,
    /// Hide the post's text region behind a placeholder
    Hide,
}

impl Effect {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Replace => "replace",
            Effect::Hide => "hide",
        }
    }

    /// Past-tense label used in flagged event logs.
    pub fn action_taken(&self) -> ActionTaken {
        match self {
            Effect::Replace => ActionTaken::Replaced,
            Effect::Hide => ActionTaken::Hidden,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What was done to a post, as recorded in the flagged log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    Replaced,
    Hidden,
}
