//! Player progress: the store boundary and the in-game tracker
//!
//! The store is an external collaborator. Its failures never roll back
//! in-game state; the tracker logs them and carries on.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Challenge;
use crate::leaderboard::Leaderboard;
use crate::sim::{GameEvent, GameState};

/// What the store remembers about a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProgress {
    pub high_score: u32,
    pub completed: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("progress store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("progress document is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("progress store unavailable: {0}")]
    Unavailable(String),
}

/// Backend holding per-player records
pub trait ProgressStore {
    fn get_progress(&self, user_id: &str) -> Result<UserProgress, StoreError>;
    fn set_high_score(&mut self, user_id: &str, value: u32) -> Result<(), StoreError>;
    /// Idempotent: adding a known id is not an error
    fn add_completed_challenge(&mut self, user_id: &str, challenge_id: &str) -> Result<(), StoreError>;
    fn leaderboard(&self) -> Result<Leaderboard, StoreError>;
}

/// A player's record as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(flatten)]
    pub progress: UserProgress,
}

fn leaderboard_of(users: &BTreeMap<String, UserRecord>) -> Leaderboard {
    Leaderboard::from_records(
        users
            .iter()
            .map(|(id, record)| (id.as_str(), record.username.as_str(), record.progress.high_score)),
    )
}

/// In-process store; can be switched offline to exercise failure paths
#[derive(Debug, Clone)]
pub struct MemoryProgressStore {
    users: BTreeMap<String, UserRecord>,
    available: bool,
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            available: true,
        }
    }

    /// Add a player with an empty record (existing records are kept)
    pub fn register(&mut self, user_id: &str, username: &str) {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord {
                username: username.to_string(),
                progress: UserProgress::default(),
            });
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".into()))
        }
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut UserRecord, StoreError> {
        self.check()?;
        self.users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get_progress(&self, user_id: &str) -> Result<UserProgress, StoreError> {
        self.check()?;
        self.users
            .get(user_id)
            .map(|record| record.progress.clone())
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))
    }

    fn set_high_score(&mut self, user_id: &str, value: u32) -> Result<(), StoreError> {
        self.user_mut(user_id)?.progress.high_score = value;
        Ok(())
    }

    fn add_completed_challenge(&mut self, user_id: &str, challenge_id: &str) -> Result<(), StoreError> {
        self.user_mut(user_id)?
            .progress
            .completed
            .insert(challenge_id.to_string());
        Ok(())
    }

    fn leaderboard(&self) -> Result<Leaderboard, StoreError> {
        self.check()?;
        Ok(leaderboard_of(&self.users))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
struct StoreDocument {
    users: BTreeMap<String, UserRecord>,
}

/// Store backed by a JSON document on disk, rewritten on every update
#[derive(Debug)]
pub struct JsonFileProgressStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl JsonFileProgressStore {
    /// Open the document at `path`; a missing file starts empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let doc: StoreDocument = serde_json::from_str(&json)?;
            log::info!("Loaded {} player records from {}", doc.users.len(), path.display());
            doc
        } else {
            log::info!("No progress file at {}, starting fresh", path.display());
            StoreDocument::default()
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a player with an empty record and persist
    pub fn register(&mut self, user_id: &str, username: &str) -> Result<(), StoreError> {
        if self.doc.users.contains_key(user_id) {
            return Ok(());
        }
        self.doc.users.insert(
            user_id.to_string(),
            UserRecord {
                username: username.to_string(),
                progress: UserProgress::default(),
            },
        );
        self.persist()
    }

    /// Write via a sibling temp file so a crash never leaves half a document
    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Progress saved to {}", self.path.display());
        Ok(())
    }

    fn update(&mut self, user_id: &str, apply: impl FnOnce(&mut UserProgress)) -> Result<(), StoreError> {
        let record = self
            .doc
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))?;
        apply(&mut record.progress);
        self.persist()
    }
}

impl ProgressStore for JsonFileProgressStore {
    fn get_progress(&self, user_id: &str) -> Result<UserProgress, StoreError> {
        self.doc
            .users
            .get(user_id)
            .map(|record| record.progress.clone())
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))
    }

    fn set_high_score(&mut self, user_id: &str, value: u32) -> Result<(), StoreError> {
        self.update(user_id, |progress| progress.high_score = value)
    }

    fn add_completed_challenge(&mut self, user_id: &str, challenge_id: &str) -> Result<(), StoreError> {
        self.update(user_id, |progress| {
            progress.completed.insert(challenge_id.to_string());
        })
    }

    fn leaderboard(&self) -> Result<Leaderboard, StoreError> {
        Ok(leaderboard_of(&self.doc.users))
    }
}

#[derive(Debug, Clone)]
struct SignedIn {
    user_id: String,
    /// Last record the store confirmed
    record: UserProgress,
}

/// Applies awards to the game state and mirrors them to the store
pub struct ProgressTracker {
    store: Box<dyn ProgressStore>,
    user: Option<SignedIn>,
}

impl ProgressTracker {
    pub fn new(store: Box<dyn ProgressStore>) -> Self {
        Self { store, user: None }
    }

    /// Load a player's record and attach it to the session
    pub fn sign_in(&mut self, user_id: &str) -> Result<&UserProgress, StoreError> {
        let record = self.store.get_progress(user_id)?;
        log::info!(
            "Signed in {user_id}: high score {}, {} challenges completed",
            record.high_score,
            record.completed.len()
        );
        let user = self.user.insert(SignedIn {
            user_id: user_id.to_string(),
            record,
        });
        Ok(&user.record)
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("Signed out {}", user.user_id);
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }

    /// Cached record of the signed-in player
    pub fn record(&self) -> Option<&UserProgress> {
        self.user.as_ref().map(|u| &u.record)
    }

    /// Credit a solved challenge to the run and, if signed in, to the player
    pub fn award_challenge(&mut self, state: &mut GameState, challenge: &Challenge) -> GameEvent {
        state.score += challenge.points;
        state.solved.insert(challenge.id.clone());
        log::info!("+{} points for {} (score {})", challenge.points, challenge.id, state.score);

        if let Some(user) = self.user.as_mut()
            && !user.record.completed.contains(&challenge.id)
        {
            match self.store.add_completed_challenge(&user.user_id, &challenge.id) {
                Ok(()) => {
                    user.record.completed.insert(challenge.id.clone());
                }
                Err(err) => log::warn!("Could not record {} as completed: {err}", challenge.id),
            }
        }

        GameEvent::ChallengeSolved {
            challenge_id: challenge.id.clone(),
            points: challenge.points,
        }
    }

    /// Push `score` to the store if it beats the player's best. Returns true
    /// when a new high score was recorded.
    pub fn maybe_update_high_score(&mut self, score: u32) -> bool {
        let Some(user) = self.user.as_mut() else {
            return false;
        };
        if score <= user.record.high_score {
            return false;
        }
        match self.store.set_high_score(&user.user_id, score) {
            Ok(()) => {
                log::info!("New high score for {}: {score}", user.user_id);
                user.record.high_score = score;
                true
            }
            Err(err) => {
                log::warn!("Could not save high score {score}: {err}");
                false
            }
        }
    }

    /// Challenges solved: the player's record when signed in, else this run
    pub fn solved_count(&self, state: &GameState) -> usize {
        match &self.user {
            Some(user) => user.record.completed.union(&state.solved).count(),
            None => state.solved.len(),
        }
    }

    pub fn leaderboard(&self) -> Result<Leaderboard, StoreError> {
        self.store.leaderboard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn tracker_with(store: MemoryProgressStore) -> ProgressTracker {
        ProgressTracker::new(Box::new(store))
    }

    fn registered() -> MemoryProgressStore {
        let mut store = MemoryProgressStore::new();
        store.register("u1", "Ada");
        store
    }

    #[test]
    fn test_award_anonymous() {
        let catalog = Catalog::builtin();
        let mut tracker = tracker_with(registered());
        let mut state = GameState::new(1);
        let event = tracker.award_challenge(&mut state, catalog.by_index(0));
        assert_eq!(state.score, 100);
        assert!(state.solved.contains("array-sum"));
        assert_eq!(
            event,
            GameEvent::ChallengeSolved {
                challenge_id: "array-sum".into(),
                points: 100
            }
        );
        assert_eq!(tracker.solved_count(&state), 1);
    }

    #[test]
    fn test_award_signed_in_records_completion() {
        let catalog = Catalog::builtin();
        let mut tracker = tracker_with(registered());
        tracker.sign_in("u1").unwrap();
        let mut state = GameState::new(1);
        tracker.award_challenge(&mut state, catalog.by_index(1));
        tracker.award_challenge(&mut state, catalog.by_index(1));
        assert_eq!(state.score, 400);
        assert_eq!(tracker.record().unwrap().completed.len(), 1);
    }

    #[test]
    fn test_high_score_only_increases() {
        let mut tracker = tracker_with(registered());
        assert!(!tracker.maybe_update_high_score(50));
        tracker.sign_in("u1").unwrap();
        assert!(tracker.maybe_update_high_score(50));
        assert!(!tracker.maybe_update_high_score(40));
        assert!(!tracker.maybe_update_high_score(50));
        assert_eq!(tracker.record().unwrap().high_score, 50);
        assert_eq!(tracker.leaderboard().unwrap().top_score(), Some(50));
    }

    #[test]
    fn test_store_failure_is_swallowed() {
        let catalog = Catalog::builtin();
        let mut store = registered();
        store.set_available(false);
        let mut tracker = tracker_with(store);
        // Sign-in surfaces the error, the session stays anonymous
        assert!(matches!(tracker.sign_in("u1"), Err(StoreError::Unavailable(_))));
        assert_eq!(tracker.user_id(), None);

        let mut state = GameState::new(1);
        tracker.award_challenge(&mut state, catalog.by_index(0));
        assert_eq!(state.score, 100);
    }

    #[test]
    fn test_failed_write_keeps_cached_record() {
        let mut store = registered();
        store.set_high_score("u1", 30).unwrap();
        let mut tracker = tracker_with(store);
        tracker.sign_in("u1").unwrap();
        // Unknown user after sign-in: point the session at a missing id
        if let Some(user) = tracker.user.as_mut() {
            user.user_id = "ghost".into();
        }
        assert!(!tracker.maybe_update_high_score(90));
        assert_eq!(tracker.record().unwrap().high_score, 30);
    }

    #[test]
    fn test_unknown_user() {
        let mut tracker = tracker_with(MemoryProgressStore::new());
        assert!(matches!(tracker.sign_in("nobody"), Err(StoreError::UnknownUser(_))));
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        {
            let mut store = JsonFileProgressStore::open(&path).unwrap();
            store.register("u1", "Ada").unwrap();
            store.set_high_score("u1", 120).unwrap();
            store.add_completed_challenge("u1", "find-bug").unwrap();
            store.add_completed_challenge("u1", "find-bug").unwrap();
        }
        let store = JsonFileProgressStore::open(&path).unwrap();
        let progress = store.get_progress("u1").unwrap();
        assert_eq!(progress.high_score, 120);
        assert_eq!(progress.completed.len(), 1);
        assert_eq!(store.leaderboard().unwrap().rank_of("u1"), Some(1));
    }

    #[test]
    fn test_json_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileProgressStore::open(&path),
            Err(StoreError::Format(_))
        ));
    }
}
