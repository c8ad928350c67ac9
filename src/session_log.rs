use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::stats::GameStatsSnapshot;

/// One finished session, as appended to the results log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub date: String,
    pub source: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub correct: usize,
    pub incorrect: usize,
    pub extra: usize,
    pub corrections: usize,
}

impl SessionRecord {
    pub fn from_results(source: &str, snapshot: &GameStatsSnapshot, consistency: f64) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source: source.to_string(),
            wpm: snapshot.words_per_minute,
            accuracy: snapshot.accuracy,
            consistency,
            correct: snapshot.chars.correct,
            incorrect: snapshot.chars.incorrect,
            extra: snapshot.chars.extra,
            corrections: snapshot.chars.corrections,
        }
    }
}

/// Append-only CSV history of completed sessions
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Log at the default state-dir location, `None` when no home directory
    /// can be resolved
    pub fn new() -> Option<Self> {
        AppDirs::session_log_path().map(|path| Self { path })
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &SessionRecord) -> csv::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // emit the header only when starting a fresh file
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    pub fn records(&self) -> csv::Result<Vec<SessionRecord>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: SessionRecord = result?;
            records.push(record);
        }
        Ok(records)
    }
}
