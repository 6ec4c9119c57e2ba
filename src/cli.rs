//! CLI commands for odds-drop.
//!
//! Supports API server mode, one-shot extraction and fetching, the
//! auto-refresh watch loop and the archive viewer.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::analysis;
use crate::archive::{ArchivedRace, SnapshotArchive};
use crate::config::AppConfig;
use crate::extractor::InputHint;
use crate::fetch::OddsFetcher;
use crate::routes::MAX_RACES_PER_DAY;
use crate::scoring;
use crate::store::SnapshotStore;
use crate::types::{ExtractResponse, HorseRecord, RaceKey, ScoredRecord, SignalledMovement};

#[derive(Parser)]
#[command(name = "odds-drop")]
#[command(
    version,
    about = "Odds-drop (落飛) tracker: extraction, scoring and snapshot API",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },

    /// Extract records from a saved page or pasted text
    Extract {
        /// Input file (stdin when omitted)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Input shape (text, html, json, xml); sniffed when omitted
        #[arg(long)]
        hint: Option<InputHint>,

        /// Charset of the input bytes (big5, gbk, ...)
        #[arg(long)]
        charset: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Fetch every race of the day once and report drop signals
    Fetch {
        /// Races on the card
        #[arg(short, long)]
        races: Option<u8>,

        /// Meeting day (YYYY-MM-DD), today when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Simulated earlier movement (%) to compare against
        #[arg(long)]
        simulate_pct: Option<f64>,

        /// Write the fetched snapshots to the archive file
        #[arg(long)]
        archive: bool,
    },

    /// Re-fetch on an interval and compare against the previous cycle
    Watch {
        /// Races on the card
        #[arg(short, long)]
        races: Option<u8>,

        /// Seconds between cycles
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show archived snapshots
    History {
        /// Meeting day (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Only this race
        #[arg(short, long)]
        race: Option<u8>,
    },
}

fn race_count(races: Option<u8>, config: &AppConfig) -> anyhow::Result<u8> {
    let count = races.unwrap_or(config.fetch.race_count);
    anyhow::ensure!(
        (1..=MAX_RACES_PER_DAY).contains(&count),
        "race count must be 1-{}, got {}",
        MAX_RACES_PER_DAY,
        count
    );
    Ok(count)
}

/// Run extraction on a file or stdin.
pub async fn run_extract(
    input: Option<PathBuf>,
    hint: Option<InputHint>,
    charset: Option<String>,
    format: String,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let extractor = config.extractor();

    let bytes = match &input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("Failed to read stdin")?;
            buf
        }
    };

    let hint = hint.unwrap_or_else(|| InputHint::sniff(&String::from_utf8_lossy(&bytes)));
    eprintln!("Extracting {} bytes as {:?}", bytes.len(), hint);

    let extraction = extractor.extract_bytes(&bytes, hint, charset.as_deref());
    for line in &extraction.log {
        eprintln!("  {}", line);
    }

    let response = ExtractResponse {
        partial: extraction.is_partial(config.extract.min_rows),
        records: extraction.records,
        strategy: extraction.strategy,
        log: extraction.log,
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&response)?),
        _ => {
            let scored = scoring::rank(&response.records, extractor.roster(), &config.scoring);
            print_scored(&scored);
            if response.partial {
                eprintln!("Warning: only {} records", response.records.len());
            }
        }
    }

    Ok(())
}

/// Fetch each race once and compare against simulated earlier odds.
pub async fn run_fetch(
    races: Option<u8>,
    date: Option<NaiveDate>,
    format: String,
    simulate_pct: Option<f64>,
    archive: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let count = race_count(races, &config)?;
    let date = date.unwrap_or_else(|| RaceKey::today(1).date);
    let pct = simulate_pct.unwrap_or(config.analysis.simulate_pct);
    let extractor = config.extractor();
    let roster = extractor.roster().clone();
    let fetcher = OddsFetcher::new(&config.fetch, extractor)?;

    let mut snapshots = Vec::new();
    let mut signals: Vec<(u8, SignalledMovement)> = Vec::new();
    let mut report = Vec::new();

    for race_no in 1..=count {
        eprintln!("Fetching race {}/{}...", race_no, count);
        let collection = fetcher.collect_race(RaceKey::new(date, race_no)).await;
        for line in &collection.log {
            tracing::debug!("R{}: {}", race_no, line);
        }
        let snapshot = collection.snapshot;
        if snapshot.records.is_empty() {
            eprintln!("  race {}: no data", race_no);
            continue;
        }

        let previous = analysis::simulate_previous(&snapshot.records, pct);
        let movements = analysis::compare(&previous, &snapshot.records);
        let race_signals = analysis::signals(&movements, &config.analysis);
        let scored = scoring::rank(&snapshot.records, &roster, &config.scoring);

        report.push(serde_json::json!({
            "race": race_no,
            "source": snapshot.source,
            "scored": scored,
            "movements": movements,
            "signals": race_signals,
        }));
        signals.extend(race_signals.into_iter().map(|s| (race_no, s)));
        snapshots.push(snapshot);
    }

    let horses: usize = snapshots.iter().map(|s| s.records.len()).sum();
    if snapshots.is_empty() {
        eprintln!("No data fetched. The source may have changed layout or has no odds yet.");
    } else {
        eprintln!("Fetched {} horses across {} races", horses, snapshots.len());
    }

    if archive && !snapshots.is_empty() {
        let archive = SnapshotArchive::new(&config.archive.path);
        let written = archive.archive_day(date, &snapshots)?;
        eprintln!("Archived {} races to {}", written, archive.path().display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_signals(&signals),
    }

    Ok(())
}

/// Fetch on an interval until Ctrl-C, comparing each cycle to the last.
pub async fn run_watch(races: Option<u8>, interval: Option<u64>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let count = race_count(races, &config)?;
    let interval = Duration::from_secs(interval.unwrap_or(config.fetch.refresh_secs).max(1));
    let fetcher = OddsFetcher::new(&config.fetch, config.extractor())?;
    let mut store = SnapshotStore::init();

    eprintln!("Watching {} races every {:?} (Ctrl-C to stop)", count, interval);

    let mut cycle = 0u64;
    loop {
        cycle += 1;
        let date = RaceKey::today(1).date;
        let mut signals = Vec::new();

        for race_no in 1..=count {
            let collection = fetcher.collect_race(RaceKey::new(date, race_no)).await;
            if collection.snapshot.records.is_empty() {
                tracing::info!("R{}: no data this cycle", race_no);
                continue;
            }
            let current = collection.snapshot.records.clone();
            if let Some(previous) = store.put(collection.snapshot) {
                let movements = analysis::compare(&previous.records, &current);
                signals.extend(
                    analysis::signals(&movements, &config.analysis)
                        .into_iter()
                        .map(|s| (race_no, s)),
                );
            }
        }

        println!("=== Cycle {} ({}) ===", cycle, chrono::Local::now().format("%H:%M:%S"));
        if cycle == 1 {
            println!("  baseline stored for {} races", store.snapshots_on(date).len());
        } else {
            print_signals(&signals);
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping watch");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Print archived snapshots of one day.
pub async fn run_history(date: NaiveDate, race: Option<u8>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let archive = SnapshotArchive::new(&config.archive.path);

    let races: Vec<(u8, ArchivedRace)> = match race {
        Some(race_no) => archive
            .race(&RaceKey::new(date, race_no))?
            .map(|r| vec![(race_no, r)])
            .unwrap_or_default(),
        None => archive.day(date)?.into_iter().collect(),
    };

    if races.is_empty() {
        let dates = archive.dates()?;
        eprintln!("Nothing archived for {}", date);
        if !dates.is_empty() {
            let list: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
            eprintln!("Archived days: {}", list.join(", "));
        }
        return Ok(());
    }

    for (race_no, archived) in races {
        println!("Race {} (captured {})", race_no, archived.timestamp.format("%Y-%m-%d %H:%M:%S"));
        print_records(&archived.records);
        println!();
    }
    Ok(())
}

fn print_records(records: &[HorseRecord]) {
    println!(
        "  {:>3}  {:<16} {:<10} {:<10} {:>4} {:>7}",
        "No", "Horse", "Jockey", "Trainer", "Draw", "Win"
    );
    for r in records {
        println!(
            "  {:>3}  {:<16} {:<10} {:<10} {:>4} {:>7}",
            r.horse_number,
            r.display_name(),
            r.jockey_or_unknown(),
            r.trainer_or_unknown(),
            r.draw.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            r.win_odds
        );
    }
}

fn print_scored(scored: &[ScoredRecord]) {
    println!(
        "  {:>3}  {:<16} {:<10} {:<10} {:>7} {:>7}",
        "No", "Horse", "Jockey", "Trainer", "Win", "Score"
    );
    for s in scored {
        let r = &s.record;
        println!(
            "  {:>3}  {:<16} {:<10} {:<10} {:>7} {:>7}",
            r.horse_number,
            r.display_name(),
            r.jockey_or_unknown(),
            r.trainer_or_unknown(),
            r.win_odds,
            s.score.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
        );
    }
}

/// Signals ordered by race then horse number
fn print_signals(signals: &[(u8, SignalledMovement)]) {
    if signals.is_empty() {
        println!("  no horses meet the drop conditions");
        return;
    }
    let mut sorted: Vec<&(u8, SignalledMovement)> = signals.iter().collect();
    sorted.sort_by_key(|(race, s)| (*race, s.movement.horse_number));

    println!(
        "  {:>4} {:>3}  {:<16} {:>7} {:>7} {:>7}  Signal",
        "Race", "No", "Horse", "Before", "Now", "Drop"
    );
    for (race, s) in sorted {
        let m = &s.movement;
        println!(
            "  {:>4} {:>3}  {:<16} {:>7.1} {:>7.1} {:>6.1}%  {}",
            race, m.horse_number, m.horse_name, m.previous, m.current, m.trend_pct, s.signal
        );
    }
}
