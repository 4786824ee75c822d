//! # Two-level subscription index.
//!
//! [`SubscriptionIndex`] keeps exact topics and first-segment wildcards in two
//! separate tables, so resolving a topic is two hash lookups.
//!
//! ```text
//! subscribe("user.created", a)   ─► exact["user.created"]  = [a]
//! subscribe("user.*", b)         ─► wildcard["user"]       = [b]
//! subscribe("user.*", a)         ─► wildcard["user"]       = [b, a]
//!
//! resolve("user.created") = [a, b]   (exact first, then wildcard; `a` not repeated)
//! resolve("user.deleted") = [b, a]
//! resolve("user")         = []       (single segment never matches a wildcard)
//! ```
//!
//! ## Rules
//! - A key `<segment>.*` where `<segment>` contains no `.` is a wildcard;
//!   every other key (including `a.b.*`) is matched literally.
//! - Registration order is preserved per key.
//! - The same handle on the same key is stored once.

use std::collections::HashMap;

use crate::subscribers::Subscriber;

/// Parsed subscription key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    /// Matches one topic exactly.
    Exact(String),
    /// Matches every multi-segment topic whose first segment equals the prefix.
    Prefix(String),
}

impl TopicPattern {
    /// Classifies a subscription key.
    ///
    /// # Example
    /// ```
    /// use logbus::TopicPattern;
    ///
    /// assert_eq!(TopicPattern::parse("user.*"), TopicPattern::Prefix("user".into()));
    /// assert_eq!(TopicPattern::parse("user.created"), TopicPattern::Exact("user.created".into()));
    /// assert_eq!(TopicPattern::parse("a.b.*"), TopicPattern::Exact("a.b.*".into()));
    /// ```
    pub fn parse(key: &str) -> Self {
        match key.strip_suffix(".*") {
            Some(prefix) if !prefix.is_empty() && !prefix.contains('.') => {
                TopicPattern::Prefix(prefix.to_owned())
            }
            _ => TopicPattern::Exact(key.to_owned()),
        }
    }
}

/// Returns the first segment of a multi-segment topic.
fn first_segment(topic: &str) -> Option<&str> {
    topic.split_once('.').map(|(head, _)| head)
}

/// Exact-topic table plus first-segment wildcard table.
#[derive(Default, Debug)]
pub struct SubscriptionIndex {
    exact: HashMap<String, Vec<Subscriber>>,
    wildcard: HashMap<String, Vec<Subscriber>>,
}

impl SubscriptionIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, key: &str) -> (&mut HashMap<String, Vec<Subscriber>>, String) {
        match TopicPattern::parse(key) {
            TopicPattern::Exact(topic) => (&mut self.exact, topic),
            TopicPattern::Prefix(prefix) => (&mut self.wildcard, prefix),
        }
    }

    /// Registers `subscriber` under `key`. Returns `false` if it was already there.
    pub fn insert(&mut self, key: &str, subscriber: Subscriber) -> bool {
        let (table, slot) = self.table_mut(key);
        let list = table.entry(slot).or_default();
        if list.contains(&subscriber) {
            return false;
        }
        list.push(subscriber);
        true
    }

    /// Removes `subscriber` from `key`. Returns `false` if it was not registered.
    ///
    /// Keys left without subscribers are dropped.
    pub fn remove(&mut self, key: &str, subscriber: &Subscriber) -> bool {
        let (table, slot) = self.table_mut(key);
        let Some(list) = table.get_mut(&slot) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s != subscriber);
        let removed = list.len() != before;
        if list.is_empty() {
            table.remove(&slot);
        }
        removed
    }

    /// Resolves `topic` to its ordered, deduplicated subscriber list.
    pub fn resolve(&self, topic: &str) -> Vec<Subscriber> {
        let mut out: Vec<Subscriber> = self.exact.get(topic).cloned().unwrap_or_default();

        if let Some(wild) = first_segment(topic).and_then(|head| self.wildcard.get(head)) {
            for sub in wild {
                if !out.contains(sub) {
                    out.push(sub.clone());
                }
            }
        }
        out
    }

    /// Removes every subscription.
    pub fn clear(&mut self) {
        self.exact.clear();
        self.wildcard.clear();
    }

    /// Total number of (key, subscriber) registrations.
    pub fn len(&self) -> usize {
        self.exact.values().chain(self.wildcard.values()).map(Vec::len).sum()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcard.is_empty()
    }

    /// Registered keys, exact topics first then wildcards (`prefix.*`), each sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut exact: Vec<String> = self.exact.keys().cloned().collect();
        exact.sort_unstable();
        let mut wild: Vec<String> = self.wildcard.keys().map(|p| format!("{p}.*")).collect();
        wild.sort_unstable();
        exact.extend(wild);
        exact
    }
}
