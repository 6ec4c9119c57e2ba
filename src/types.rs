//! Record, snapshot and API types shared across the crate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extractor::{InputHint, Strategy};

/// Win odds (獨贏) as quoted for one horse
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum WinOdds {
    /// Decimal payout multiplier, always >= 1.0
    Posted(f64),
    /// No price quoted yet
    #[default]
    NotPosted,
    /// Horse withdrawn after the race card was published (SCR)
    Scratched,
}

impl WinOdds {
    pub fn posted(&self) -> Option<f64> {
        match self {
            WinOdds::Posted(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, WinOdds::NotPosted)
    }
}

impl fmt::Display for WinOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinOdds::Posted(v) => write!(f, "{:.1}", v),
            WinOdds::NotPosted => write!(f, "-"),
            WinOdds::Scratched => write!(f, "SCR"),
        }
    }
}

/// One horse row recovered from a race card or odds page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HorseRecord {
    pub horse_number: u8,
    pub horse_name: Option<String>,
    pub jockey: Option<String>,
    pub trainer: Option<String>,
    /// Post position (檔位), only known when the source has a draw column
    pub draw: Option<u8>,
    pub win_odds: WinOdds,
}

impl HorseRecord {
    pub fn new(horse_number: u8) -> Self {
        Self {
            horse_number,
            ..Default::default()
        }
    }

    /// Horse name, or the `Horse {number}` placeholder when unrecovered
    pub fn display_name(&self) -> String {
        self.horse_name
            .clone()
            .unwrap_or_else(|| format!("Horse {}", self.horse_number))
    }

    pub fn jockey_or_unknown(&self) -> &str {
        self.jockey.as_deref().unwrap_or("unknown")
    }

    pub fn trainer_or_unknown(&self) -> &str {
        self.trainer.as_deref().unwrap_or("unknown")
    }

    /// Number of fields beyond the horse number that were recovered
    pub fn resolved_fields(&self) -> usize {
        [
            self.horse_name.is_some(),
            self.jockey.is_some(),
            self.trainer.is_some(),
            self.draw.is_some(),
            self.win_odds.is_resolved(),
        ]
        .iter()
        .filter(|&&set| set)
        .count()
    }
}

/// Composite identifier of one race on one meeting day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaceKey {
    pub date: NaiveDate,
    pub race_number: u8,
}

impl RaceKey {
    pub fn new(date: NaiveDate, race_number: u8) -> Self {
        Self { date, race_number }
    }

    /// Key for a race on the local calendar day
    pub fn today(race_number: u8) -> Self {
        Self::new(chrono::Local::now().date_naive(), race_number)
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} R{}", self.date, self.race_number)
    }
}

/// Point-in-time collection of records for one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub key: RaceKey,
    pub records: Vec<HorseRecord>,
    /// Raw fetched or pasted inputs the records were extracted from
    #[serde(default)]
    pub raw_inputs: Vec<String>,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RaceSnapshot {
    pub fn new(key: RaceKey, records: Vec<HorseRecord>) -> Self {
        Self {
            key,
            records,
            raw_inputs: Vec::new(),
            captured_at: Utc::now(),
            source: None,
        }
    }

    pub fn record(&self, horse_number: u8) -> Option<&HorseRecord> {
        self.records.iter().find(|r| r.horse_number == horse_number)
    }
}

/// Odds movement of one horse between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsMovement {
    pub horse_number: u8,
    pub horse_name: String,
    pub previous: f64,
    pub current: f64,
    /// (previous - current) / previous * 100, one decimal
    pub trend_pct: f64,
}

/// Odds-drop (落飛) classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropSignal {
    /// 強力落飛: price came in from above the long-shot line
    Strong,
    /// 一般落飛
    Normal,
}

impl fmt::Display for DropSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropSignal::Strong => write!(f, "strong drop"),
            DropSignal::Normal => write!(f, "drop"),
        }
    }
}

/// Movement that crossed the drop threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalledMovement {
    #[serde(flatten)]
    pub movement: OddsMovement,
    pub signal: DropSignal,
}

/// Record with its linear score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: HorseRecord,
    /// None for scratched horses
    pub score: Option<f64>,
}

// ==================== API bodies ====================

/// Extraction request (paste-box input)
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    pub raw: String,
    #[serde(default)]
    pub hint: InputHint,
}

/// Extraction response
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub records: Vec<HorseRecord>,
    pub strategy: Option<Strategy>,
    pub partial: bool,
    pub log: Vec<String>,
}

/// Snapshot submission for one race
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRequest {
    pub raw: String,
    #[serde(default)]
    pub hint: InputHint,
    /// Meeting day, defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Result of storing a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub key: RaceKey,
    pub stored: bool,
    pub warning: Option<String>,
    pub scored: Vec<ScoredRecord>,
    pub movements: Vec<OddsMovement>,
    /// Movements are against simulated earlier odds, no snapshot preceded this one
    pub simulated: bool,
    pub signals: Vec<SignalledMovement>,
    pub log: Vec<String>,
}

/// Result of archiving one meeting day
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveResponse {
    pub date: NaiveDate,
    pub archived: usize,
    pub path: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
