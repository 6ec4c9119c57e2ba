//! Linear per-horse score: inverse odds, jockey and trainer skill, draw.

use crate::config::ScoringConfig;
use crate::roster::{Roster, DEFAULT_SKILL};
use crate::types::{HorseRecord, ScoredRecord, WinOdds};

/// Draws at or below this get the bonus
const INSIDE_DRAW_MAX: u8 = 3;
/// Draws at or above this get the penalty
const WIDE_DRAW_MIN: u8 = 11;

/// Post-position term of the score.
///
/// # Arguments
/// * `draw` - Barrier draw, `None` when the source had no draw column
/// * `config` - Scoring weights
pub fn draw_term(draw: Option<u8>, config: &ScoringConfig) -> f64 {
    match draw {
        Some(d) if (1..=INSIDE_DRAW_MAX).contains(&d) => config.draw_bonus,
        Some(d) if d >= WIDE_DRAW_MIN => -config.draw_penalty,
        _ => 0.0,
    }
}

/// Score one record.
///
/// # Returns
/// `None` for a scratched horse; otherwise the weighted sum rounded to two
/// decimals. Unposted odds contribute nothing to the odds term.
pub fn score_record(record: &HorseRecord, roster: &Roster, config: &ScoringConfig) -> Option<f64> {
    let odds_term = match record.win_odds {
        WinOdds::Scratched => return None,
        WinOdds::Posted(odds) if odds > 0.0 => 100.0 / odds,
        _ => 0.0,
    };

    let jockey_skill = record
        .jockey
        .as_deref()
        .map(|j| roster.jockey_skill(j))
        .unwrap_or(DEFAULT_SKILL);
    let trainer_skill = record
        .trainer
        .as_deref()
        .map(|t| roster.trainer_skill(t))
        .unwrap_or(DEFAULT_SKILL);

    let score = config.odds_weight * odds_term
        + config.jockey_weight * jockey_skill
        + config.trainer_weight * trainer_skill
        + draw_term(record.draw, config);

    Some((score * 100.0).round() / 100.0)
}

/// Score and rank records: score descending, horse number on ties,
/// scratched horses last.
pub fn rank(records: &[HorseRecord], roster: &Roster, config: &ScoringConfig) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .iter()
        .map(|record| ScoredRecord {
            score: score_record(record, roster, config),
            record: record.clone(),
        })
        .collect();

    scored.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y
            .total_cmp(&x)
            .then(a.record.horse_number.cmp(&b.record.horse_number)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.record.horse_number.cmp(&b.record.horse_number),
    });

    scored
}
