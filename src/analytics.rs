//! Summary counts over the flagged log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bridge::FlaggedEvent;

/// Totals of flagged posts, by rule and by author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAnalytics {
    pub total_flags: usize,
    pub flags_by_rule: BTreeMap<String, usize>,
    pub flags_by_user: BTreeMap<String, usize>,
}

impl LocalAnalytics {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a FlaggedEvent>) -> Self {
        let mut analytics = Self::default();
        for event in events {
            analytics.total_flags += 1;
            *analytics
                .flags_by_rule
                .entry(event.matched_rule_id.clone())
                .or_default() += 1;
            if !event.username.is_empty() {
                *analytics
                    .flags_by_user
                    .entry(event.username.clone())
                    .or_default() += 1;
            }
        }
        analytics
    }

    /// The `n` rules with the most flags, highest first.
    pub fn top_rules(&self, n: usize) -> Vec<(&str, usize)> {
        top(&self.flags_by_rule, n)
    }

    /// The `n` authors with the most flags, highest first.
    pub fn top_users(&self, n: usize) -> Vec<(&str, usize)> {
        top(&self.flags_by_user, n)
    }
}

// Ties keep key order.
fn top(counts: &BTreeMap<String, usize>, n: usize) -> Vec<(&str, usize)> {
    let mut entries: Vec<_> = counts.iter().map(|(k, &v)| (k.as_str(), v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::ActionTaken;

    fn event(rule: &str, user: &str) -> FlaggedEvent {
        FlaggedEvent {
            timestamp: 0,
            post_url: String::new(),
            username: user.to_string(),
            matched_rule_id: rule.to_string(),
            matched_identifier: String::new(),
            action_taken: ActionTaken::Hidden,
            matched_text: String::new(),
            replacement_text: None,
        }
    }

    #[test]
    fn test_counts_and_top() {
        let events = vec![
            event("spam", "alice"),
            event("spam", "bob"),
            event("ads", "alice"),
            event("spam", ""),
        ];
        let analytics = LocalAnalytics::from_events(&events);

        assert_eq!(analytics.total_flags, 4);
        assert_eq!(analytics.flags_by_rule["spam"], 3);
        assert_eq!(analytics.flags_by_user.len(), 2);
        assert_eq!(analytics.top_rules(1), vec![("spam", 3)]);
        assert_eq!(analytics.top_users(5), vec![("alice", 2), ("bob", 1)]);
    }

    #[test]
    fn test_empty() {
        let analytics = LocalAnalytics::from_events(&Vec::<FlaggedEvent>::new());
        assert_eq!(analytics, LocalAnalytics::default());
        assert!(analytics.top_rules(3).is_empty());
    }
}
