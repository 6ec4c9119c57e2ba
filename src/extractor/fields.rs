//! Field roles for keyed inputs (table headers, JSON keys, XML names).

use super::tokens::{anchor, odds_from_text};
use crate::types::{HorseRecord, WinOdds};

/// Which record field a column or key carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Number,
    Name,
    Jockey,
    Trainer,
    Draw,
    Odds,
}

/// Role of a table header cell, by case-insensitive substring
pub fn header_role(text: &str) -> Option<FieldRole> {
    let t = text.trim().trim_end_matches(['.', ':', '：']).to_lowercase();
    if t.is_empty() {
        return None;
    }

    if t.contains("jockey") || t.contains("騎師") {
        return Some(FieldRole::Jockey);
    }
    if t.contains("trainer") || t.contains("練馬師") {
        return Some(FieldRole::Trainer);
    }
    if t == "no"
        || t == "#"
        || t == "號"
        || t.ends_with(" no")
        || t.contains("number")
        || t.contains("馬號")
        || t.contains("編號")
    {
        return Some(FieldRole::Number);
    }
    if t.contains("draw") || t.contains("檔") {
        return Some(FieldRole::Draw);
    }
    if t.contains("odds")
        || t == "win"
        || t.starts_with("win ")
        || t.contains("獨贏")
        || t.contains("賠率")
    {
        return Some(FieldRole::Odds);
    }
    if t.contains("horse") || t.contains("name") || t.contains("馬名") {
        return Some(FieldRole::Name);
    }
    None
}

/// Role of a JSON key or XML element/attribute name
pub fn key_role(key: &str) -> Option<FieldRole> {
    let k: String = key
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();

    if k.contains("jockey") || k.contains("騎師") {
        return Some(FieldRole::Jockey);
    }
    if k.contains("trainer") || k.contains("練馬師") {
        return Some(FieldRole::Trainer);
    }
    match k.as_str() {
        "no" | "horseno" | "number" | "horsenumber" | "num" | "runnerno" | "runnernumber"
        | "combstring" | "saddlecloth" | "馬號" | "編號" => Some(FieldRole::Number),
        "name" | "horse" | "horsename" | "namech" | "nameen" | "horsenamech" | "horsenameen"
        | "馬名" => Some(FieldRole::Name),
        "draw" | "barrier" | "barrierdrawnumber" | "檔位" | "檔" => Some(FieldRole::Draw),
        "odds" | "win" | "winodds" | "winodd" | "oddsvalue" | "獨贏" | "賠率" => {
            Some(FieldRole::Odds)
        }
        _ => None,
    }
}

/// Keys that carry a runner status
pub fn is_status_key(key: &str) -> bool {
    let k = key.to_lowercase();
    k == "status" || k == "runnerstatus" || k == "runner_status" || k == "狀態"
}

/// Status values that mean withdrawn
pub fn is_scratched_status(value: &str) -> bool {
    let v = value.to_lowercase();
    v.contains("scr") || v.contains("withdrawn") || v.contains("退出")
}

/// Record assembled from key/value pairs, first value wins per role
#[derive(Debug, Default)]
pub struct KeyedRecord {
    number: Option<u8>,
    record: HorseRecord,
    scratched: bool,
}

impl KeyedRecord {
    pub fn has_number(&self) -> bool {
        self.number.is_some()
    }

    /// Something besides the number: a name, person, draw, odds or a status
    pub fn has_runner_fields(&self) -> bool {
        self.scratched || self.record.resolved_fields() > 0
    }

    /// Apply one value; returns false when a number value is not an anchor
    pub fn set(&mut self, role: FieldRole, value: &str, max_horse_number: u8) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return role != FieldRole::Number;
        }

        match role {
            FieldRole::Number => {
                let Some(number) = anchor(value, max_horse_number) else {
                    return false;
                };
                self.number.get_or_insert(number);
            }
            FieldRole::Name => set_text(&mut self.record.horse_name, value),
            FieldRole::Jockey => set_text(&mut self.record.jockey, value),
            FieldRole::Trainer => set_text(&mut self.record.trainer, value),
            FieldRole::Draw => {
                if self.record.draw.is_none() {
                    self.record.draw = value.parse().ok().filter(|d| *d > 0);
                }
            }
            FieldRole::Odds => {
                if !self.record.win_odds.is_resolved() {
                    self.record.win_odds = odds_from_text(value);
                }
            }
        }
        true
    }

    pub fn mark_scratched(&mut self) {
        self.scratched = true;
    }

    pub fn build(self) -> Option<HorseRecord> {
        let number = self.number?;
        let mut record = self.record;
        record.horse_number = number;
        if self.scratched {
            record.win_odds = WinOdds::Scratched;
        }
        Some(record)
    }
}

fn set_text(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && value != "-" {
        *slot = Some(value.to_string());
    }
}
