//! Session state: persona, memories, dialog history

use chrono::Local;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Turns of history retained in memory.
const MAX_TURNS: usize = 16;

const DEFAULT_PERSONA: &str = "You are Siren, a helpful local voice assistant.";

/// Who said a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The composed system prompt.
    System,
    /// The human speaker.
    User,
    /// The assistant's reply.
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// One conversational turn.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Speaker.
    pub role: Role,
    /// Spoken or generated text.
    pub text: String,
}

/// One running conversation, bounded by process lifetime.
///
/// Owns the persona prefix, the memory list loaded at startup, and the
/// last [`MAX_TURNS`] turns. Every turn is appended to a per-session
/// dialog log named after the start timestamp.
pub struct Session {
    persona: String,
    memories: Vec<String>,
    turns: VecDeque<Turn>,
    dialog_path: PathBuf,
}

impl Session {
    /// Start a session, loading persona and memories from `config_dir`
    /// and opening a dialog log under `logs_dir`.
    ///
    /// A missing persona file substitutes the default persona; a missing
    /// memory file is created empty.
    pub fn start(config_dir: impl AsRef<Path>, logs_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref();
        let logs_dir = logs_dir.as_ref();

        let persona = std::fs::read_to_string(config_dir.join("system_prompt.txt"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| {
                debug!("no persona file, using default persona");
                DEFAULT_PERSONA.to_string()
            });

        let memories = load_memories(&config_dir.join("memory.log"));

        if let Err(e) = std::fs::create_dir_all(logs_dir) {
            warn!("cannot create log directory {}: {}", logs_dir.display(), e);
        }
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let dialog_path = logs_dir.join(format!("dialog_{stamp}.log"));

        let session = Self {
            persona,
            memories,
            turns: VecDeque::new(),
            dialog_path,
        };
        session.append_dialog(Role::System, &session.system_prompt());
        session
    }

    /// The composed system prompt: memory block first, persona after.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        if self.memories.is_empty() {
            return self.persona.clone();
        }
        let mut prompt = String::from("[MEMORY]\n");
        for memory in &self.memories {
            prompt.push_str("- ");
            prompt.push_str(memory);
            prompt.push('\n');
        }
        prompt.push_str("[/MEMORY]\n\n");
        prompt.push_str(&self.persona);
        prompt
    }

    /// Record what the user said.
    pub fn record_user(&mut self, text: &str) {
        self.push_turn(Role::User, text);
    }

    /// Record what the assistant answered.
    pub fn record_assistant(&mut self, text: &str) {
        self.push_turn(Role::Assistant, text);
    }

    fn push_turn(&mut self, role: Role, text: &str) {
        self.turns.push_back(Turn {
            role,
            text: text.to_string(),
        });
        while self.turns.len() > MAX_TURNS {
            self.turns.pop_front();
        }
        self.append_dialog(role, text);
    }

    fn append_dialog(&self, role: Role, text: &str) {
        let stamp = Local::now().format("%d-%m-%H-%M-%S");
        let line = format!("[{stamp}] {}: {}\n", role.label(), text.trim());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.dialog_path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!("failed to append dialog line: {}", e);
        }
    }

    /// Retained history, oldest first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<Turn> {
        &self.turns
    }

    /// Path of this session's dialog log.
    #[must_use]
    pub fn dialog_path(&self) -> &Path {
        &self.dialog_path
    }
}

fn load_memories(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => {
            // Auto-create the file so later writes have a target.
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(path, "") {
                warn!("cannot create memory file {}: {}", path.display(), e);
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_persona_when_file_missing() {
        let dir = tempdir().unwrap();
        let session = Session::start(dir.path().join("config"), dir.path().join("logs"));
        assert_eq!(session.system_prompt(), DEFAULT_PERSONA);
        // The memory file was auto-created.
        assert!(dir.path().join("config/memory.log").exists());
    }

    #[test]
    fn memories_prefix_the_persona() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config");
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(config.join("system_prompt.txt"), "Be terse.").unwrap();
        std::fs::write(config.join("memory.log"), "likes jazz\n\nfeeds the cat\n").unwrap();

        let session = Session::start(&config, dir.path().join("logs"));
        let prompt = session.system_prompt();
        assert!(prompt.starts_with("[MEMORY]\n- likes jazz\n- feeds the cat\n[/MEMORY]"));
        assert!(prompt.ends_with("Be terse."));
    }

    #[test]
    fn history_is_capped_at_sixteen_turns() {
        let dir = tempdir().unwrap();
        let mut session = Session::start(dir.path().join("config"), dir.path().join("logs"));
        for i in 0..20 {
            session.record_user(&format!("question {i}"));
        }
        assert_eq!(session.history().len(), MAX_TURNS);
        assert_eq!(session.history()[0].text, "question 4");
    }

    #[test]
    fn dialog_log_records_every_turn() {
        let dir = tempdir().unwrap();
        let mut session = Session::start(dir.path().join("config"), dir.path().join("logs"));
        session.record_user("hello");
        session.record_assistant("hi there");

        let content = std::fs::read_to_string(session.dialog_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("] SYSTEM: "));
        assert!(lines[1].contains("] USER: hello"));
        assert!(lines[2].contains("] ASSISTANT: hi there"));
    }
}
