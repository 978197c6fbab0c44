use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// What one consolidation run did, persisted next to its outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Quarters selected by discovery, e.g. "3T2025"
    pub quarters: Vec<String>,
    pub archives_downloaded: usize,
    pub archives_processed: usize,
    pub files_normalized: usize,
    pub records_normalized: usize,
    pub records_consolidated: usize,
    pub registry_entries: usize,
    pub consolidated_csv: String,
    pub consolidated_zip: String,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Run summary written to {}", path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}
