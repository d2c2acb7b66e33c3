//! Contract with the storage owner.
//!
//! The filter never owns persistent state. Settings, rules and the flagged
//! log live behind a [`StorageBridge`]; changes made elsewhere reach the
//! filter as [`Notification`]s.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{Configuration, Settings};
use crate::effect::ActionTaken;
use crate::error::Result;
use crate::rule::Rule;

/// A record of one modified post, reported to the local log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub post_url: String,
    pub username: String,
    pub matched_rule_id: String,
    /// Pattern of the matched rule
    pub matched_identifier: String,
    pub action_taken: ActionTaken,
    #[serde(default)]
    pub matched_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_text: Option<String>,
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Requests the filter sends to the storage owner.
///
/// Every call may fail; callers treat failures as recoverable.
pub trait StorageBridge: Send + Sync {
    /// Fetch the current settings and rules.
    fn get_configuration(&self) -> Result<Configuration>;

    /// Replace the stored rule list.
    fn save_rules(&self, rules: &[Rule]) -> Result<()>;

    /// Replace the stored settings.
    fn save_settings(&self, settings: &Settings) -> Result<()>;

    /// Append an event to the flagged log.
    fn log_flagged_event(&self, event: &FlaggedEvent) -> Result<()>;
}

/// Inbound change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Notification {
    #[serde(rename = "SETTINGS_CHANGED")]
    SettingsChanged(Settings),
    /// Rules changed; the receiver refetches them
    #[serde(rename = "RULES_CHANGED")]
    RulesChanged,
}
