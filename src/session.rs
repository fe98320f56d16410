use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppliedState, BondRuntime, RandomOddsMemory, StateDirectives};

fn default_true() -> bool {
    true
}

/// An ascension proposal waiting for the generator's questionnaire reply.
/// The turn that raised it is kept whole so the reply can finish applying
/// it exactly as classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAscension {
    pub change: i32,
    pub directives: StateDirectives,
}

/// Everything a conversation accumulates, persisted as JSON in the
/// character's logs directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub bond: f64,
    #[serde(default)]
    pub second_bond: f64,
    #[serde(default = "default_true")]
    pub stranger: bool,
    #[serde(default)]
    pub messages_exchanged: u32,
    #[serde(default)]
    pub applied_states: Vec<AppliedState>,
    #[serde(default)]
    pub random_odds_memory: RandomOddsMemory,
    /// False between composing roleplay instructions and scoring the reply.
    /// Guards the prompt/score alternation.
    #[serde(default = "default_true")]
    pub ran_post_inference_last: bool,
    #[serde(default)]
    pub pending_ascension: Option<PendingAscension>,
    /// Emotion-trigger names to add next turn if absent.
    #[serde(default)]
    pub carry_add: Vec<String>,
    /// Emotion-trigger names to remove next turn.
    #[serde(default)]
    pub carry_discard: Vec<String>,
    /// Resolved end-state text once a dead end has been reached.
    #[serde(default)]
    pub ended: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        let now = Utc::now();
        SessionState {
            id: Uuid::new_v4().to_string(),
            started_at: now,
            updated_at: now,
            username: None,
            bond: 0.0,
            second_bond: 0.0,
            stranger: true,
            messages_exchanged: 0,
            applied_states: Vec::new(),
            random_odds_memory: RandomOddsMemory::default(),
            ran_post_inference_last: true,
            pending_ascension: None,
            carry_add: Vec::new(),
            carry_discard: Vec::new(),
            ended: None,
        }
    }

    /// Loads the session at `path`, or starts a fresh one when no file
    /// exists yet. A file that parses but carries an out-of-range applied
    /// state is rejected rather than repaired.
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SessionState::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(SessionState::new());
        }

        let session: SessionState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", path.display()))?;
        for state in &session.applied_states {
            state
                .validate()
                .with_context(|| format!("Corrupt session file: {}", path.display()))?;
        }
        Ok(session)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Utc::now();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create session directory")?;
        }
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize session")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }

    /// Moves an existing session file aside to `<stem>_archived_<n>.json`,
    /// picking the first free `n`. Returns the archive path, or `None`
    /// when there was nothing to archive.
    pub fn archive(path: &Path) -> Result<Option<PathBuf>> {
        if !path.exists() {
            return Ok(None);
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("session");
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut n = 1u32;
        let dest = loop {
            let candidate = parent.join(format!("{}_archived_{}.json", stem, n));
            if !candidate.exists() {
                break candidate;
            }
            n += 1;
        };
        std::fs::rename(path, &dest)
            .with_context(|| format!("Failed to archive session file: {}", path.display()))?;
        Ok(Some(dest))
    }

    pub fn runtime(&self) -> BondRuntime {
        BondRuntime {
            bond: self.bond,
            second_bond: self.second_bond,
            stranger: self.stranger,
            messages_exchanged: self.messages_exchanged,
        }
    }

    pub fn apply_runtime(&mut self, runtime: BondRuntime) {
        self.bond = runtime.bond;
        self.second_bond = runtime.second_bond;
        self.stranger = runtime.stranger;
        self.messages_exchanged = runtime.messages_exchanged;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateDirectives;
    use tempfile::TempDir;

    #[test]
    fn fresh_session_defaults() {
        let session = SessionState::new();
        assert_eq!(session.bond, 0.0);
        assert_eq!(session.second_bond, 0.0);
        assert!(session.stranger);
        assert!(session.ran_post_inference_last);
        assert!(session.pending_ascension.is_none());
        assert!(session.ended.is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let mut session = SessionState::new();
        session.bond = 42.5;
        session.second_bond = 10.0;
        session.stranger = false;
        session.messages_exchanged = 8;
        session.applied_states = vec![AppliedState::new("HAPPY", 3, 2).unwrap()];
        session.random_odds_memory.record("CURIOUS");
        session.ran_post_inference_last = false;
        session.pending_ascension = Some(PendingAscension {
            change: 2,
            directives: StateDirectives {
                increase: vec!["HAPPY".to_string()],
                ..StateDirectives::default()
            },
        });
        session.carry_add = vec!["WORRIED".to_string()];
        session.save(&path).unwrap();

        let loaded = SessionState::load_or_new(&path).unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.bond, 42.5);
        assert!(!loaded.stranger);
        assert_eq!(loaded.applied_states, session.applied_states);
        assert!(loaded.random_odds_memory.remembers("CURIOUS"));
        assert!(!loaded.ran_post_inference_last);
        assert_eq!(loaded.pending_ascension, session.pending_ascension);
        assert_eq!(loaded.carry_add, vec!["WORRIED".to_string()]);
    }

    #[test]
    fn missing_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let session = SessionState::load_or_new(&dir.path().join("none.json")).unwrap();
        assert!(session.stranger);
        assert_eq!(session.messages_exchanged, 0);
    }

    #[test]
    fn sparse_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            format!(
                r#"{{"id":"x","started_at":"{0}","updated_at":"{0}","bond":5.0}}"#,
                Utc::now().to_rfc3339()
            ),
        )
        .unwrap();

        let session = SessionState::load_or_new(&path).unwrap();
        assert_eq!(session.bond, 5.0);
        assert!(session.stranger);
        assert!(session.ran_post_inference_last);
        assert!(session.applied_states.is_empty());
    }

    #[test]
    fn rejects_out_of_range_applied_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let mut session = SessionState::new();
        session.applied_states = vec![AppliedState::new("HAPPY", 2, 3).unwrap()];
        session.save(&path).unwrap();

        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("\"intensity\": 2", "\"intensity\": 9");
        std::fs::write(&path, tampered).unwrap();

        assert!(SessionState::load_or_new(&path).is_err());
    }

    #[test]
    fn archive_picks_first_free_slot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        assert!(SessionState::archive(&path).unwrap().is_none());

        let mut session = SessionState::new();
        session.save(&path).unwrap();
        let first = SessionState::archive(&path).unwrap().unwrap();
        assert_eq!(first, dir.path().join("session_archived_1.json"));
        assert!(!path.exists());

        session.save(&path).unwrap();
        let second = SessionState::archive(&path).unwrap().unwrap();
        assert_eq!(second, dir.path().join("session_archived_2.json"));
    }

    #[test]
    fn runtime_round_trip() {
        let mut session = SessionState::new();
        let mut runtime = session.runtime();
        assert!(runtime.stranger);

        runtime.bond = -12.0;
        runtime.stranger = false;
        runtime.messages_exchanged = 4;
        session.apply_runtime(runtime);
        assert_eq!(session.bond, -12.0);
        assert!(!session.stranger);
        assert_eq!(session.messages_exchanged, 4);
    }
}
