//! Performance and transcription logs

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Rotated transcription files older than this are pruned.
const TRANSCRIPTION_RETENTION_DAYS: i64 = 7;

const TRANSCRIPTION_FILE: &str = "transcriptions.log";

#[derive(Serialize)]
struct PerfEntry<'a> {
    timestamp: String,
    event: &'a str,
    duration_ms: f64,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    context: serde_json::Value,
}

/// Append-only JSONL performance log (`logs/performance.jsonl`).
///
/// Write failures never reach callers; a latency record is not worth a
/// broken turn.
pub struct PerfLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PerfLog {
    /// Performance log under `logs_dir`.
    pub fn new(logs_dir: impl AsRef<Path>) -> Self {
        let logs_dir = logs_dir.as_ref();
        if let Err(e) = std::fs::create_dir_all(logs_dir) {
            warn!("cannot create log directory {}: {}", logs_dir.display(), e);
        }
        Self {
            path: logs_dir.join("performance.jsonl"),
            lock: Mutex::new(()),
        }
    }

    /// Record one event with its duration and optional context.
    pub fn record(&self, event: &str, duration: Duration, context: serde_json::Value) {
        let entry = PerfEntry {
            timestamp: Local::now().to_rfc3339(),
            event,
            duration_ms: duration.as_secs_f64() * 1000.0,
            context,
        };
        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!("failed to append performance record: {}", e);
        }
    }
}

struct TranscriptionState {
    current_date: NaiveDate,
}

/// Timestamped transcription log with daily rotation and 7-day retention.
pub struct TranscriptionLog {
    dir: PathBuf,
    state: Mutex<TranscriptionState>,
}

impl TranscriptionLog {
    /// Transcription log under `logs_dir`.
    pub fn new(logs_dir: impl AsRef<Path>) -> Self {
        let dir = logs_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("cannot create log directory {}: {}", dir.display(), e);
        }

        // Resume the active file's day so rotation survives restarts.
        let current_date = std::fs::metadata(dir.join(TRANSCRIPTION_FILE))
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| chrono::DateTime::<Local>::from(t).date_naive())
            .unwrap_or_else(|| Local::now().date_naive());

        Self {
            dir,
            state: Mutex::new(TranscriptionState { current_date }),
        }
    }

    /// Append one transcription line, rotating first when the day changed.
    pub fn append(&self, text: &str) {
        let now = Local::now();
        let today = now.date_naive();

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if today != state.current_date {
            self.rotate(state.current_date);
            state.current_date = today;
        }

        let line = format!("[{}] {}\n", now.format("%Y-%m-%d %H:%M:%S"), text.trim());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(TRANSCRIPTION_FILE))
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!("failed to append transcription: {}", e);
        }
    }

    fn rotate(&self, day: NaiveDate) {
        let active = self.dir.join(TRANSCRIPTION_FILE);
        if !active.exists() {
            return;
        }
        let rotated = self
            .dir
            .join(format!("{TRANSCRIPTION_FILE}.{}", day.format("%Y-%m-%d")));
        if let Err(e) = std::fs::rename(&active, &rotated) {
            warn!("transcription rotation failed: {}", e);
            return;
        }
        debug!("rotated transcriptions to {}", rotated.display());
        self.prune();
    }

    fn prune(&self) {
        let cutoff = Local::now().date_naive() - chrono::Duration::days(TRANSCRIPTION_RETENTION_DAYS);
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        let prefix = format!("{TRANSCRIPTION_FILE}.");
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(date_part) = name.to_string_lossy().strip_prefix(&prefix).map(String::from)
            else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(&date_part, "%Y-%m-%d") else {
                continue;
            };
            if date < cutoff {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    warn!("failed to prune {}: {}", entry.path().display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn perf_records_are_one_json_object_per_line() {
        let dir = tempdir().unwrap();
        let perf = PerfLog::new(dir.path());
        perf.record(
            "llm_first_token",
            Duration::from_millis(250),
            serde_json::json!({"prompt_chars": 12}),
        );
        perf.record("app_startup", Duration::from_secs(3), serde_json::Value::Null);

        let content = std::fs::read_to_string(dir.path().join("performance.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "llm_first_token");
        assert!((first["duration_ms"].as_f64().unwrap() - 250.0).abs() < 1e-6);
        assert_eq!(first["context"]["prompt_chars"], 12);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second.get("context").is_none());
    }

    #[test]
    fn transcriptions_are_timestamped_lines() {
        let dir = tempdir().unwrap();
        let log = TranscriptionLog::new(dir.path());
        log.append("turn on the lights");
        log.append("what time is it");

        let content = std::fs::read_to_string(dir.path().join(TRANSCRIPTION_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("turn on the lights"));
    }

    #[test]
    fn old_rotated_files_are_pruned() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(format!("{TRANSCRIPTION_FILE}.2001-01-01"));
        let fresh_day = Local::now().date_naive() - chrono::Duration::days(1);
        let fresh = dir
            .path()
            .join(format!("{TRANSCRIPTION_FILE}.{}", fresh_day.format("%Y-%m-%d")));
        std::fs::write(&stale, "old").unwrap();
        std::fs::write(&fresh, "recent").unwrap();

        let log = TranscriptionLog::new(dir.path());
        log.prune();

        assert!(!stale.exists());
        assert!(fresh.exists());
    }
}
