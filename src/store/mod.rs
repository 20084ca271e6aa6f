//! File-backed session log store.
//!
//! One JSON object per line. Retrieval is best-effort keyword overlap; the
//! store exists so solved sessions can season future prompts, not as a
//! database of record.

use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub prompt: String,
    pub output: String,
    pub feedback: bool,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn from_config(cfg: &Config) -> Self {
        Self::at(cfg.log_storage_path())
    }

    pub fn at(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        Self { path }
    }

    pub fn add(&self, entry: &LogEntry) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// Top `limit` entries ranked by keyword overlap with the query.
    /// A missing store file is an empty store.
    pub fn lookup(&self, query: &str, limit: usize) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)?;
        let wanted = keywords(query);
        let mut scored: Vec<(usize, LogEntry)> = text
            .lines()
            .filter_map(|line| serde_json::from_str::<LogEntry>(line).ok())
            .map(|entry| (overlap(&wanted, &entry.prompt), entry))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, e)| e).collect())
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

fn overlap(wanted: &HashSet<String>, prompt: &str) -> usize {
    keywords(prompt).intersection(wanted).count()
}
