use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::constants::history::MAX_ENTRIES;

/// One dispatched command and what it produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub input: String,
    pub result: String,
}

/// Bounded, persisted log of dispatch outcomes.
///
/// Stores the untruncated result text (spoken-output truncation is
/// presentation only), keeps the most recent entries, and saves best
/// effort: a failed write warns but never fails a dispatch.
pub struct HistoryLog {
    path: Option<PathBuf>,
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Load the persisted log, starting empty on a missing or unreadable
    /// file.
    pub fn load(path: PathBuf) -> Self {
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();

        HistoryLog {
            path: Some(path),
            entries,
        }
    }

    /// A log that never touches disk, for tests and embedding.
    pub fn in_memory() -> Self {
        HistoryLog {
            path: None,
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, input: &str, result: &str) {
        self.entries.push(HistoryEntry {
            timestamp: Local::now().to_rfc3339(),
            input: input.to_string(),
            result: result.to_string(),
        });

        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(0..excess);
        }

        if self.path.is_some() {
            if let Err(e) = self.save() {
                eprintln!("⚠️  Failed to save command history: {e:#}");
            }
        }
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    fn save(&self) -> Result<()> {
        let path = self.path.as_ref().context("History log has no path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create history directory")?;
        }

        let json =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize history")?;
        fs::write(path, json).context("Failed to write history file")?;

        Ok(())
    }
}
