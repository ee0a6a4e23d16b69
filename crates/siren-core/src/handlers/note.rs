//! Note-taking handler

use crate::error::{Error, Result};
use crate::handlers::Handler;
use crate::text::ResponseText;
use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One stored note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// The note body.
    pub text: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
}

/// Takes, lists and deletes notes in `config/notes.json`.
pub struct NoteHandler {
    path: PathBuf,
    text: Arc<ResponseText>,
    claim: Regex,
    take: Regex,
    list: Regex,
    delete: Regex,
}

impl NoteHandler {
    /// Handler over the given notes file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, text: Arc<ResponseText>) -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("note pattern must compile");
        Self {
            path: path.into(),
            text,
            claim: re(r"(?i)\b(note|notes|take a note|delete note|show notes)\b"),
            take: re(r"(?i)take a note[:\-]?\s*(.+)"),
            list: re(r"(?i)\b(show|list) notes\b"),
            delete: re(r"(?i)delete note (\d+)"),
        }
    }

    fn load(&self) -> Result<Vec<Note>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| Error::Handler(format!("bad notes file: {e}")))
    }

    fn save(&self, notes: &[Note]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(notes)
            .map_err(|e| Error::Handler(format!("notes serialize failed: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Notes file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Handler for NoteHandler {
    fn claims(&self, text: &str) -> bool {
        self.claim.is_match(text)
    }

    async fn handle(&self, text: &str) -> Result<String> {
        if let Some(captures) = self.take.captures(text) {
            let mut notes = self.load()?;
            notes.push(Note {
                text: captures[1].trim().to_string(),
                timestamp: Local::now().to_rfc3339(),
            });
            self.save(&notes)?;
            return Ok(self.text.get("note.saved"));
        }

        if self.list.is_match(text) {
            let notes = self.load()?;
            if notes.is_empty() {
                return Ok(self.text.get("note.empty"));
            }
            let listing = notes
                .iter()
                .enumerate()
                .map(|(i, n)| format!("{}. {}", i + 1, n.text))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(format!("{}\n{listing}", self.text.get("note.list_prefix")));
        }

        if let Some(captures) = self.delete.captures(text) {
            let index: usize = captures[1]
                .parse()
                .map_err(|_| Error::Handler("note number out of range".to_string()))?;
            let mut notes = self.load()?;
            if index == 0 || index > notes.len() {
                return Ok(self.text.get("note.missing"));
            }
            let removed = notes.remove(index - 1);
            self.save(&notes)?;
            return Ok(self
                .text
                .format("note.deleted", &[("text", removed.text)]));
        }

        Ok(self.text.get("note.unknown"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn handler(dir: &Path) -> NoteHandler {
        NoteHandler::new(dir.join("notes.json"), Arc::new(ResponseText::default()))
    }

    #[tokio::test]
    async fn taking_a_note_persists_text_and_timestamp() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());

        let reply = handler.handle("take a note buy milk").await.unwrap();
        assert_eq!(reply, "Got it. Note saved.");

        let raw = std::fs::read_to_string(handler.path()).unwrap();
        let notes: Vec<Note> = serde_json::from_str(&raw).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "buy milk");
        assert!(notes[0].timestamp.contains('T'));
    }

    #[tokio::test]
    async fn listing_and_deleting() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());
        handler.handle("take a note buy milk").await.unwrap();
        handler.handle("take a note call mom").await.unwrap();

        let listing = handler.handle("show notes").await.unwrap();
        assert!(listing.contains("1. buy milk"));
        assert!(listing.contains("2. call mom"));

        let reply = handler.handle("delete note 1").await.unwrap();
        assert!(reply.contains("buy milk"));

        let listing = handler.handle("show notes").await.unwrap();
        assert!(listing.contains("1. call mom"));
        assert!(!listing.contains("buy milk"));
    }

    #[tokio::test]
    async fn deleting_a_missing_note_is_graceful() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());
        let reply = handler.handle("delete note 7").await.unwrap();
        assert_eq!(reply, "Couldn't find that note to delete.");
    }

    #[test]
    fn claims_note_phrases_only() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());
        assert!(handler.claims("take a note buy milk"));
        assert!(handler.claims("show notes"));
        assert!(!handler.claims("tell me a joke"));
    }
}
