use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::events::HistoryStore;

const HISTORY_FILE: &str = "history.jsonl";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub url: String,
    pub folder: PathBuf,
    pub filename: String,
    pub timestamp: DateTime<Local>,
}

/// Append-only JSON-lines download history.
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store in the application data directory.
    pub fn open_default() -> Self {
        Self::new(crate::settings::app_data_dir().join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, newest first. Unparseable lines are skipped.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read history {:?}", self.path))
            }
        };

        let mut entries: Vec<HistoryEntry> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping malformed history line");
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

impl HistoryStore for JsonHistoryStore {
    fn record(&self, url: &str, final_path: &Path) -> Result<()> {
        let entry = HistoryEntry {
            url: url.to_string(),
            folder: final_path.parent().map(Path::to_path_buf).unwrap_or_default(),
            filename: final_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            timestamp: Local::now(),
        };
        let line = serde_json::to_string(&entry)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create history directory {:?}", parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history {:?}", self.path))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
