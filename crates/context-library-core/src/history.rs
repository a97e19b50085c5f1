//! Bounded per-conversation message history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Ordered messages of one conversation, oldest evicted first once full.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    entries: VecDeque<HistoryEntry>,
    max_size: usize,
}

impl MessageHistory {
    /// A history holding at most `max_size` entries. `0` keeps nothing.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        if self.max_size == 0 {
            return;
        }
        if self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            role,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut h = MessageHistory::new(2);
        h.push(Role::User, "one");
        h.push(Role::Assistant, "two");
        h.push(Role::User, "three");
        let contents: Vec<&str> = h.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_zero_size_keeps_nothing() {
        let mut h = MessageHistory::new(0);
        h.push(Role::User, "ignored");
        assert!(h.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut h = MessageHistory::new(3);
        h.push(Role::User, "a");
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.max_size(), 3);
    }
}
