use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::data_dir;

/// One emitted card document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRecord {
    pub timestamp: DateTime<Utc>,
    pub document: PathBuf,
    pub cards: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl PrintRecord {
    pub fn new(document: &Path, cards: Vec<String>, job_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            document: document.to_path_buf(),
            cards,
            job_id,
        }
    }
}

/// Append-only JSONL log of every document the pipeline produced.
#[derive(Debug, Clone)]
pub struct PrintLog {
    path: PathBuf,
}

impl Default for PrintLog {
    fn default() -> Self {
        Self::new(data_dir().join("print-history.jsonl"))
    }
}

impl PrintLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &PrintRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Most recent records last. Unreadable lines are skipped.
    pub fn read(&self, limit: Option<usize>) -> Vec<PrintRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut records: Vec<PrintRecord> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if let Some(limit) = limit {
            let len = records.len();
            if len > limit {
                records = records.split_off(len - limit);
            }
        }

        records
    }
}
