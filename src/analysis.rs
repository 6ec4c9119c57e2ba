//! Odds-drop (落飛) analysis between two snapshots of a race.

use crate::config::AnalysisConfig;
use crate::types::{DropSignal, HorseRecord, OddsMovement, SignalledMovement};

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage the price shortened by, one decimal; negative when it drifted
pub fn trend_pct(previous: f64, current: f64) -> f64 {
    if previous <= 0.0 {
        return 0.0;
    }
    round1((previous - current) / previous * 100.0)
}

/// Movements for every horse with posted odds in both snapshots, by horse number
pub fn compare(previous: &[HorseRecord], current: &[HorseRecord]) -> Vec<OddsMovement> {
    let mut movements: Vec<OddsMovement> = current
        .iter()
        .filter_map(|now| {
            let current_odds = now.win_odds.posted()?;
            let before = previous.iter().find(|r| r.horse_number == now.horse_number)?;
            let previous_odds = before.win_odds.posted()?;
            Some(OddsMovement {
                horse_number: now.horse_number,
                horse_name: now.display_name(),
                previous: previous_odds,
                current: current_odds,
                trend_pct: trend_pct(previous_odds, current_odds),
            })
        })
        .collect();
    movements.sort_by_key(|m| m.horse_number);
    movements
}

/// Classify one movement
pub fn signal(movement: &OddsMovement, config: &AnalysisConfig) -> Option<DropSignal> {
    if movement.current > config.max_signal_odds
        || movement.trend_pct <= config.drop_threshold_pct
    {
        return None;
    }
    if movement.previous > config.strong_from_odds {
        Some(DropSignal::Strong)
    } else {
        Some(DropSignal::Normal)
    }
}

/// Movements that crossed the threshold
pub fn signals(movements: &[OddsMovement], config: &AnalysisConfig) -> Vec<SignalledMovement> {
    movements
        .iter()
        .filter_map(|m| {
            signal(m, config).map(|signal| SignalledMovement {
                movement: m.clone(),
                signal,
            })
        })
        .collect()
}

/// Stand-in for the earlier snapshot when only one exists: every posted
/// price inflated by `pct` percent, one decimal.
pub fn simulate_previous(current: &[HorseRecord], pct: f64) -> Vec<HorseRecord> {
    current
        .iter()
        .map(|record| {
            let mut earlier = record.clone();
            if let Some(odds) = record.win_odds.posted() {
                let raised = round1(odds * (1.0 + pct / 100.0));
                earlier.win_odds = crate::types::WinOdds::Posted(raised);
            }
            earlier
        })
        .collect()
}
