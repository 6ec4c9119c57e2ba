//! Configuration for the odds-drop service.

use serde::{Deserialize, Serialize};

use crate::extractor::{InputHint, DEFAULT_MAX_HORSE_NUMBER};
use crate::roster::RosterEntry;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One odds source, tried in the order listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// URL template with `{race_no}` and `{date}` placeholders
    pub url: String,
    #[serde(default)]
    pub hint: InputHint,
    #[serde(default)]
    pub referer: Option<String>,
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig {
        name: "51saima".to_string(),
        url: "https://www.51saima.com/mobi/odds.jsp?raceNo={race_no}".to_string(),
        hint: InputHint::HtmlTable,
        referer: None,
    }]
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Races on the card when none is given
    #[serde(default = "default_race_count")]
    pub race_count: u8,
    /// Seconds between watch cycles
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_race_count() -> u8 {
    10
}

fn default_refresh_secs() -> u64 {
    300
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            race_count: default_race_count(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

/// What to do with an extraction below the row floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialPolicy {
    /// Store it and surface a warning
    #[default]
    Warn,
    /// Keep the previous snapshot
    Discard,
}

/// Extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_max_horse_number")]
    pub max_horse_number: u8,
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    #[serde(default)]
    pub partial_policy: PartialPolicy,
}

fn default_max_horse_number() -> u8 {
    DEFAULT_MAX_HORSE_NUMBER
}

fn default_min_rows() -> usize {
    5
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_horse_number: default_max_horse_number(),
            min_rows: default_min_rows(),
            partial_policy: PartialPolicy::default(),
        }
    }
}

/// Odds-drop thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum trend (%) for a drop signal, exclusive
    #[serde(default = "default_drop_threshold_pct")]
    pub drop_threshold_pct: f64,
    /// Current odds must be at or below this
    #[serde(default = "default_max_signal_odds")]
    pub max_signal_odds: f64,
    /// Previous odds above this make the drop strong
    #[serde(default = "default_strong_from_odds")]
    pub strong_from_odds: f64,
    /// Simulated movement when only one snapshot exists
    #[serde(default = "default_simulate_pct")]
    pub simulate_pct: f64,
}

fn default_drop_threshold_pct() -> f64 {
    5.0
}

fn default_max_signal_odds() -> f64 {
    10.0
}

fn default_strong_from_odds() -> f64 {
    10.0
}

fn default_simulate_pct() -> f64 {
    15.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            drop_threshold_pct: default_drop_threshold_pct(),
            max_signal_odds: default_max_signal_odds(),
            strong_from_odds: default_strong_from_odds(),
            simulate_pct: default_simulate_pct(),
        }
    }
}

/// Linear score weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_odds_weight")]
    pub odds_weight: f64,
    #[serde(default = "default_jockey_weight")]
    pub jockey_weight: f64,
    #[serde(default = "default_trainer_weight")]
    pub trainer_weight: f64,
    #[serde(default = "default_draw_bonus")]
    pub draw_bonus: f64,
    #[serde(default = "default_draw_penalty")]
    pub draw_penalty: f64,
}

fn default_odds_weight() -> f64 {
    0.5
}

fn default_jockey_weight() -> f64 {
    2.0
}

fn default_trainer_weight() -> f64 {
    1.0
}

fn default_draw_bonus() -> f64 {
    3.0
}

fn default_draw_penalty() -> f64 {
    3.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            odds_weight: default_odds_weight(),
            jockey_weight: default_jockey_weight(),
            trainer_weight: default_trainer_weight(),
            draw_bonus: default_draw_bonus(),
            draw_penalty: default_draw_penalty(),
        }
    }
}

/// Snapshot archive location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_path")]
    pub path: String,
}

fn default_archive_path() -> String {
    "data/odds_history.json".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            path: default_archive_path(),
        }
    }
}

/// Extra roster entries on top of the built-in table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub jockeys: Vec<RosterEntry>,
    #[serde(default)]
    pub trainers: Vec<RosterEntry>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub roster: RosterConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // ODDSDROP_SERVER__PORT, ODDSDROP_ANALYSIS__DROP_THRESHOLD_PCT, ...
            .add_source(
                config::Environment::with_prefix("ODDSDROP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Extractor built from the built-in roster plus configured extras
    pub fn extractor(&self) -> crate::extractor::Extractor {
        let roster =
            crate::roster::Roster::with_extras(&self.roster.jockeys, &self.roster.trainers);
        crate::extractor::Extractor::new(roster, self.extract.max_horse_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.retries, 1);
        assert_eq!(config.fetch.sources[0].name, "51saima");
        assert_eq!(config.extract.min_rows, 5);
        assert_eq!(config.extract.partial_policy, PartialPolicy::Warn);
        assert_eq!(config.analysis.drop_threshold_pct, 5.0);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"extract": {"partial_policy": "discard"}, "fetch": {"sources": [
                {"name": "hkjc", "url": "https://example.test/{date}/{race_no}",
                 "hint": "json_like"}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(config.extract.partial_policy, PartialPolicy::Discard);
        assert_eq!(config.extract.max_horse_number, 24);
        assert_eq!(config.fetch.sources[0].hint, InputHint::JsonLike);
        assert_eq!(config.fetch.user_agent, default_user_agent());
    }
}
