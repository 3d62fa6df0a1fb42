use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Role of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single turn in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether this turn carries an error message rather than SQL
    pub fn is_error(&self) -> bool {
        self.role == ChatRole::Assistant && self.content.to_lowercase().contains("error:")
    }
}

/// Owns the ordered conversation log and keeps its on-disk copy in step.
///
/// Every mutation writes the whole log back to disk before returning, so the
/// persisted file always reflects the in-memory sequence.
pub struct ConversationStore {
    path: PathBuf,
    turns: Vec<ChatTurn>,
}

impl ConversationStore {
    /// Open the store at `path`, replaying the persisted log.
    ///
    /// An absent or malformed file yields an empty log.
    pub fn open(path: PathBuf) -> Self {
        let turns = Self::load_from(&path);
        Self { path, turns }
    }

    fn load_from(path: &Path) -> Vec<ChatTurn> {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(turns) => turns,
                Err(e) => {
                    tracing::warn!("discarding malformed chat history: {e}");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    /// Append a turn and persist the whole log before returning.
    pub fn append(&mut self, turn: ChatTurn) -> Result<()> {
        self.turns.push(turn);
        self.persist()
    }

    /// Replace the log with an empty sequence and erase the file.
    ///
    /// Destructive; callers must confirm with the user first.
    pub fn clear(&mut self) -> Result<()> {
        self.turns.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)
                .context("Failed to remove chat history file")?;
        }
        Ok(())
    }

    /// Replay the stored turns in original order.
    pub fn load_all(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create history directory")?;
        }
        let content = serde_json::to_string_pretty(&self.turns)
            .context("Failed to serialize chat history")?;
        fs::write(&self.path, content)
            .context("Failed to write chat history")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConversationStore {
        ConversationStore::open(dir.path().join("chat_history.json"))
    }

    #[test]
    fn append_then_reload_reproduces_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.append(ChatTurn::user("show me all users")).unwrap();
        store.append(ChatTurn::assistant("SELECT * FROM users;")).unwrap();
        store.append(ChatTurn::user("now the orders")).unwrap();

        let reloaded = store_in(&dir);
        let got: Vec<_> = reloaded
            .load_all()
            .map(|t| (t.role, t.content.clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                (ChatRole::User, "show me all users".to_string()),
                (ChatRole::Assistant, "SELECT * FROM users;".to_string()),
                (ChatRole::User, "now the orders".to_string()),
            ]
        );
    }

    #[test]
    fn clear_then_reload_yields_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.append(ChatTurn::user("hello")).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.load_all().count(), 0);
        assert!(!dir.path().join("chat_history.json").exists());
    }

    #[test]
    fn malformed_file_yields_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = ConversationStore::open(path);
        assert!(store.is_empty());
    }

    #[test]
    fn roles_serialize_lowercase() {
        let turn = ChatTurn::assistant("SELECT 1;");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
    }

    #[test]
    fn error_turns_are_detected_case_insensitively() {
        assert!(ChatTurn::assistant("Error: no such table").is_error());
        assert!(ChatTurn::assistant("ERROR: boom").is_error());
        assert!(!ChatTurn::assistant("SELECT * FROM errors;").is_error());
        assert!(!ChatTurn::user("Error: typed by the user").is_error());
    }
}
