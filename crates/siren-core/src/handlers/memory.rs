//! Memory file handler

use crate::error::Result;
use crate::handlers::Handler;
use crate::text::ResponseText;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Adds, updates, removes and lists entries in `config/memory.log`, one
/// memory per line. Entries are not deduplicated; remembering the same
/// thing twice stores it twice.
pub struct MemoryHandler {
    path: PathBuf,
    text: Arc<ResponseText>,
    claim: Regex,
    add: Regex,
    update: Regex,
    remove: Regex,
    list: Regex,
}

impl MemoryHandler {
    /// Handler over the given memory file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, text: Arc<ResponseText>) -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("memory pattern must compile");
        Self {
            path: path.into(),
            text,
            claim: re(
                r"(?i)\b(remember to|update memory|remove memory|list memories|what do you remember)\b",
            ),
            add: re(r"(?i)remember to (.+)"),
            update: re(r"(?i)update memory (\d+) to (.+)"),
            remove: re(r"(?i)remove memory (\d+)"),
            list: re(r"(?i)\b(list memories|what do you remember)\b"),
        }
    }

    fn load(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()),
            Err(_) => Ok(Vec::new()),
        }
    }

    fn save(&self, memories: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = memories.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Memory file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Handler for MemoryHandler {
    fn claims(&self, text: &str) -> bool {
        self.claim.is_match(text)
    }

    async fn handle(&self, text: &str) -> Result<String> {
        if let Some(captures) = self.add.captures(text) {
            let mut memories = self.load()?;
            memories.push(captures[1].trim().to_string());
            self.save(&memories)?;
            return Ok(self.text.get("memory.add"));
        }

        if let Some(captures) = self.update.captures(text) {
            let index: usize = captures[1].parse().unwrap_or(0);
            let mut memories = self.load()?;
            if index == 0 || index > memories.len() {
                return Ok(self.text.get("memory.missing"));
            }
            memories[index - 1] = captures[2].trim().to_string();
            self.save(&memories)?;
            return Ok(self
                .text
                .format("memory.update", &[("index", index.to_string())]));
        }

        if let Some(captures) = self.remove.captures(text) {
            let index: usize = captures[1].parse().unwrap_or(0);
            let mut memories = self.load()?;
            if index == 0 || index > memories.len() {
                return Ok(self.text.get("memory.missing"));
            }
            memories.remove(index - 1);
            self.save(&memories)?;
            return Ok(self
                .text
                .format("memory.remove", &[("index", index.to_string())]));
        }

        if self.list.is_match(text) {
            let memories = self.load()?;
            if memories.is_empty() {
                return Ok(self.text.get("memory.empty"));
            }
            let listing = memories
                .iter()
                .enumerate()
                .map(|(i, m)| format!("{}. {m}", i + 1))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(format!("{}\n{listing}", self.text.get("memory.list_prefix")));
        }

        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn handler(dir: &Path) -> MemoryHandler {
        MemoryHandler::new(dir.join("memory.log"), Arc::new(ResponseText::default()))
    }

    #[tokio::test]
    async fn remembering_appends_a_line() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());

        handler.handle("remember to water the plants").await.unwrap();
        let content = std::fs::read_to_string(handler.path()).unwrap();
        assert_eq!(content, "water the plants\n");
    }

    #[tokio::test]
    async fn duplicate_memories_are_kept() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());

        handler.handle("remember to feed the cat").await.unwrap();
        handler.handle("remember to feed the cat").await.unwrap();

        let listing = handler.handle("list memories").await.unwrap();
        assert!(listing.contains("1. feed the cat"));
        assert!(listing.contains("2. feed the cat"));
    }

    #[tokio::test]
    async fn update_and_remove_by_index() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());
        handler.handle("remember to buy eggs").await.unwrap();
        handler.handle("remember to call the bank").await.unwrap();

        handler
            .handle("update memory 1 to buy oat milk")
            .await
            .unwrap();
        let listing = handler.handle("list memories").await.unwrap();
        assert!(listing.contains("1. buy oat milk"));

        handler.handle("remove memory 2").await.unwrap();
        let listing = handler.handle("list memories").await.unwrap();
        assert!(!listing.contains("call the bank"));
    }

    #[tokio::test]
    async fn out_of_range_index_is_graceful() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());
        let reply = handler.handle("remove memory 3").await.unwrap();
        assert_eq!(reply, "I don't have a memory with that number.");
    }

    #[tokio::test]
    async fn empty_list_reports_nothing_remembered() {
        let dir = tempdir().unwrap();
        let handler = handler(dir.path());
        let reply = handler.handle("list memories").await.unwrap();
        assert_eq!(reply, "I don't remember anything yet.");
    }
}
