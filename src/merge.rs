//! Combine record lists from several sources in precedence order.

use std::collections::BTreeMap;

use crate::types::{HorseRecord, WinOdds};

/// Merge per-source records; `sources[0]` has the highest precedence.
///
/// Odds come from the first source with a resolved price, so a withdrawal
/// reported by a higher source beats a later posted price. Text fields and
/// draw are filled from the first source that has them.
pub fn merge_by_precedence(sources: &[Vec<HorseRecord>]) -> Vec<HorseRecord> {
    let mut merged: BTreeMap<u8, HorseRecord> = BTreeMap::new();

    for records in sources {
        for record in records {
            let entry = merged
                .entry(record.horse_number)
                .or_insert_with(|| HorseRecord::new(record.horse_number));

            if entry.horse_name.is_none() {
                entry.horse_name.clone_from(&record.horse_name);
            }
            if entry.jockey.is_none() {
                entry.jockey.clone_from(&record.jockey);
            }
            if entry.trainer.is_none() {
                entry.trainer.clone_from(&record.trainer);
            }
            if entry.draw.is_none() {
                entry.draw = record.draw;
            }
            if entry.win_odds == WinOdds::NotPosted {
                entry.win_odds = record.win_odds;
            }
        }
    }

    merged.into_values().collect()
}
