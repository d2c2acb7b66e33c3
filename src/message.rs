//! Request/response messages exchanged with the storage owner.

use serde::{Deserialize, Serialize};

use crate::analytics::LocalAnalytics;
use crate::bridge::FlaggedEvent;
use crate::config::{Configuration, Settings};
use crate::rule::Rule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    GetConfiguration,
    SaveRules(Vec<Rule>),
    SaveSettings(Settings),
    LogFlaggedEvent(FlaggedEvent),
    GetLocalAnalytics,
    ClearLocalLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Pong,
    Configuration(Configuration),
    Ok,
    Analytics(LocalAnalytics),
    Error(String),
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}
