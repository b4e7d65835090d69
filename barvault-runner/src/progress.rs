//! Batch progress persistence — versioned JSON with atomic saves.
//!
//! The progress file is the checkpoint a batch run resumes from. Writes go
//! to a `.tmp` sibling and rename into place so a crash mid-save never
//! leaves a truncated file. The schema is versioned; loading a file with a
//! different version fails rather than silently misinterpreting it.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const PROGRESS_SCHEMA_VERSION: u32 = 1;

/// Final statistics written once a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub end_time: DateTime<Local>,
    pub elapsed_secs: f64,
    pub final_tier: String,
    pub final_success_rate: f64,
}

/// Checkpointed state of a batch update run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    pub schema_version: u32,
    pub total_symbols: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub total_records: usize,
    /// Index of the last symbol fully processed; -1 before the first.
    pub last_processed_index: i64,
    pub failed_symbols: Vec<String>,
    pub paused_symbols: Vec<String>,
    pub start_time: DateTime<Local>,
    pub last_update: DateTime<Local>,
    pub network_pause_count: u32,
    pub total_pause_secs: f64,
    pub window_days: i64,
    pub summary: Option<RunSummary>,
}

impl BatchProgress {
    pub fn new(total_symbols: usize, window_days: i64) -> Self {
        let now = Local::now();
        Self {
            schema_version: PROGRESS_SCHEMA_VERSION,
            total_symbols,
            success_count: 0,
            failed_count: 0,
            total_records: 0,
            last_processed_index: -1,
            failed_symbols: Vec::new(),
            paused_symbols: Vec::new(),
            start_time: now,
            last_update: now,
            network_pause_count: 0,
            total_pause_secs: 0.0,
            window_days,
            summary: None,
        }
    }

    /// Index of the next symbol to process.
    pub fn resume_index(&self) -> usize {
        (self.last_processed_index + 1) as usize
    }

    pub fn is_finished(&self) -> bool {
        self.summary.is_some()
    }

    /// Save atomically: write to `.tmp`, then rename into place.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })
    }

    /// Load a progress file. `Ok(None)` when the file does not exist;
    /// an error when it exists but is unreadable or the wrong schema.
    pub fn load(path: &Path) -> io::Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let progress: Self = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if progress.schema_version != PROGRESS_SCHEMA_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "progress schema version {} (expected {})",
                    progress.schema_version, PROGRESS_SCHEMA_VERSION
                ),
            ));
        }

        Ok(Some(progress))
    }
}
