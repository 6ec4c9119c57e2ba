//! Flat JSON archive of snapshots, keyed by meeting day then race number.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{HorseRecord, RaceKey, RaceSnapshot};

/// One race as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRace {
    pub records: Vec<HorseRecord>,
    #[serde(default)]
    pub raw_inputs: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ArchivedRace {
    fn from_snapshot(snapshot: &RaceSnapshot) -> Self {
        Self {
            records: snapshot.records.clone(),
            raw_inputs: snapshot.raw_inputs.clone(),
            timestamp: snapshot.captured_at,
        }
    }
}

/// `{ "YYYY-MM-DD": { "<race>": ArchivedRace } }`
pub type ArchiveFile = BTreeMap<NaiveDate, BTreeMap<u8, ArchivedRace>>;

/// Archive file handle; every call reads the file afresh
pub struct SnapshotArchive {
    path: PathBuf,
}

impl SnapshotArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole archive; a missing file is an empty archive
    pub fn load(&self) -> Result<ArchiveFile> {
        if !self.path.exists() {
            debug!("archive {} not found, starting empty", self.path.display());
            return Ok(ArchiveFile::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read archive {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(ArchiveFile::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse archive {}", self.path.display()))
    }

    /// Write one day's snapshots, replacing the races they cover
    pub fn archive_day<'a>(
        &self,
        date: NaiveDate,
        snapshots: impl IntoIterator<Item = &'a RaceSnapshot>,
    ) -> Result<usize> {
        let mut archive = self.load()?;
        let day = archive.entry(date).or_default();

        let mut written = 0;
        for snapshot in snapshots.into_iter().filter(|s| s.key.date == date) {
            day.insert(snapshot.key.race_number, ArchivedRace::from_snapshot(snapshot));
            written += 1;
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&archive)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write archive {}", self.path.display()))?;

        info!("Archived {} races for {} to {}", written, date, self.path.display());
        Ok(written)
    }

    pub fn day(&self, date: NaiveDate) -> Result<BTreeMap<u8, ArchivedRace>> {
        Ok(self.load()?.remove(&date).unwrap_or_default())
    }

    pub fn race(&self, key: &RaceKey) -> Result<Option<ArchivedRace>> {
        Ok(self.day(key.date)?.remove(&key.race_number))
    }

    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.load()?.into_keys().collect())
    }
}
