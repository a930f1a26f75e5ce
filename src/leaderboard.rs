//! Leaderboard of players by best score
//!
//! One row per player, top 10, highest first.

use serde::{Deserialize, Serialize};

/// Maximum number of rows to keep
pub const MAX_LEADERBOARD_ENTRIES: usize = 10;

/// A single leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    /// Player's best score
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from every player's record
    pub fn from_records<'a>(records: impl IntoIterator<Item = (&'a str, &'a str, u32)>) -> Self {
        let mut board = Self::new();
        for (user_id, username, score) in records {
            board.submit(user_id, username, score);
        }
        board
    }

    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: u32) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_LEADERBOARD_ENTRIES {
            return true;
        }
        // Check if score beats the lowest entry
        self.entries.last().is_none_or(|e| score > e.score)
    }

    /// Record a player's score, keeping only their best row.
    /// Returns the rank achieved (1-indexed) or None if it didn't place.
    pub fn submit(&mut self, user_id: &str, username: &str, score: u32) -> Option<usize> {
        if let Some(existing) = self.entries.iter().position(|e| e.user_id == user_id) {
            if self.entries[existing].score >= score {
                return None;
            }
            self.entries.remove(existing);
        }
        if !self.qualifies(score) {
            return None;
        }

        let entry = LeaderboardEntry {
            user_id: user_id.to_string(),
            username: username.to_string(),
            score,
        };

        // Sorted descending by score; ties keep arrival order
        let pos = self.entries.iter().position(|e| score > e.score);
        let rank = match pos {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };

        self.entries.truncate(MAX_LEADERBOARD_ENTRIES);

        (rank <= MAX_LEADERBOARD_ENTRIES).then_some(rank)
    }

    /// 1-indexed rank of a player, if listed
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.user_id == user_id)
            .map(|i| i + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u32> {
        self.entries.first().map(|e| e.score)
    }
}
