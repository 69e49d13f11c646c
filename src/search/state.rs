//! Search state and cyclic navigation

use serde::{Deserialize, Serialize};

/// One match, in chars of the page's original extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchLocation {
    /// 0-based page index
    pub page_index: usize,
    pub range_start: usize,
    pub range_length: usize,
    /// Surrounding text for display
    pub excerpt: String,
}

/// Navigation direction through matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Result of a query plus the current position within it
///
/// `matches` is sorted by `(page_index, range_start)`; `current_index` is -1
/// or a valid index into `matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub matches: Vec<MatchLocation>,
    pub current_index: i64,
}

impl SearchState {
    /// State with no query and no matches
    pub fn empty() -> Self {
        Self {
            query: String::new(),
            matches: Vec::new(),
            current_index: -1,
        }
    }

    /// Fresh state for a completed scan; lands on the first match if any
    pub fn from_matches(query: impl Into<String>, matches: Vec<MatchLocation>) -> Self {
        let current_index = if matches.is_empty() { -1 } else { 0 };
        Self {
            query: query.into(),
            matches,
            current_index,
        }
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn current(&self) -> Option<&MatchLocation> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|i| self.matches.get(i))
    }

    /// Move to the next or previous match, wrapping at both ends
    pub fn advance(&mut self, direction: Direction) -> Option<&MatchLocation> {
        let count = self.matches.len() as i64;
        if count == 0 {
            return None;
        }

        self.current_index = match (self.current_index < 0, direction) {
            (true, Direction::Forward) => 0,
            (true, Direction::Backward) => count - 1,
            (false, Direction::Forward) => (self.current_index + 1) % count,
            (false, Direction::Backward) => (self.current_index - 1 + count) % count,
        };

        self.current()
    }
}
