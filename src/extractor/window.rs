//! Windowed field recovery after an anchor token.

use super::tokens::{is_latin, is_name_like, odds_token, OddsToken};
use crate::roster::Roster;
use crate::types::{HorseRecord, WinOdds};

#[derive(Debug, Clone, Copy, PartialEq)]
enum NameRun {
    /// No name seen yet
    Waiting,
    /// Latin name still accepting words
    Open,
    Closed,
}

/// Accumulates the fields of one record, first match wins per field
pub struct FieldWindow<'r> {
    roster: &'r Roster,
    record: HorseRecord,
    name_run: NameRun,
    decimal: Option<f64>,
    integer: Option<f64>,
    scratched: bool,
}

impl<'r> FieldWindow<'r> {
    pub fn new(horse_number: u8, roster: &'r Roster) -> Self {
        Self {
            roster,
            record: HorseRecord::new(horse_number),
            name_run: NameRun::Waiting,
            decimal: None,
            integer: None,
            scratched: false,
        }
    }

    pub fn feed_all<'t>(&mut self, tokens: impl IntoIterator<Item = &'t str>) {
        for token in tokens {
            self.feed(token);
        }
    }

    pub fn feed(&mut self, token: &str) {
        if let Some(m) = self.roster.match_jockey(token) {
            self.close_name();
            if self.record.jockey.is_none() {
                self.record.jockey = Some(m.spelling.to_string());
            }
            return;
        }

        if let Some(m) = self.roster.match_trainer(token) {
            self.close_name();
            if self.record.trainer.is_none() {
                self.record.trainer = Some(m.spelling.to_string());
            }
            return;
        }

        if let Some(odds) = odds_token(token) {
            self.close_name();
            match odds {
                OddsToken::Scratched => self.scratched = true,
                OddsToken::Decimal(v) => {
                    self.decimal.get_or_insert(v);
                }
                OddsToken::Integer(v) => {
                    self.integer.get_or_insert(v);
                }
            }
            return;
        }

        if is_name_like(token) {
            self.take_name(token);
            return;
        }

        self.close_name();
    }

    /// Line breaks end a Latin name run
    pub fn end_line(&mut self) {
        self.close_name();
    }

    pub fn finish(mut self) -> HorseRecord {
        self.record.win_odds = if self.scratched {
            WinOdds::Scratched
        } else {
            match self.decimal.or(self.integer) {
                Some(v) => WinOdds::Posted(v),
                None => WinOdds::NotPosted,
            }
        };
        self.record
    }

    fn take_name(&mut self, token: &str) {
        match self.name_run {
            NameRun::Waiting => {
                self.record.horse_name = Some(token.to_string());
                self.name_run = if is_latin(token) {
                    NameRun::Open
                } else {
                    NameRun::Closed
                };
            }
            NameRun::Open if is_latin(token) => {
                if let Some(name) = self.record.horse_name.as_mut() {
                    name.push(' ');
                    name.push_str(token);
                }
            }
            _ => self.close_name(),
        }
    }

    fn close_name(&mut self) {
        if self.name_run == NameRun::Open {
            self.name_run = NameRun::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::tokens::tokenize;

    fn window(line: &str) -> HorseRecord {
        let roster = Roster::builtin();
        let mut w = FieldWindow::new(1, &roster);
        w.feed_all(tokenize(line));
        w.finish()
    }

    #[test]
    fn test_full_row() {
        let record = window("浪漫勇士 潘頓 蔡約翰 2.3");
        assert_eq!(record.horse_name.as_deref(), Some("浪漫勇士"));
        assert_eq!(record.jockey.as_deref(), Some("潘頓"));
        assert_eq!(record.trainer.as_deref(), Some("蔡約翰"));
        assert_eq!(record.win_odds, WinOdds::Posted(2.3));
    }

    #[test]
    fn test_latin_name_joins_until_other_field() {
        let record = window("LUCKY STAR Z Purton J Size 9.5");
        assert_eq!(record.horse_name.as_deref(), Some("LUCKY STAR"));
        assert_eq!(record.jockey.as_deref(), Some("Purton"));
        assert_eq!(record.trainer.as_deref(), Some("Size"));
        assert_eq!(record.win_odds, WinOdds::Posted(9.5));
    }

    #[test]
    fn test_decimal_preferred_over_integer() {
        let record = window("好馬 5 126 4.4 3.1");
        assert_eq!(record.win_odds, WinOdds::Posted(4.4));

        let record = window("好馬 8");
        assert_eq!(record.win_odds, WinOdds::Posted(8.0));
    }

    #[test]
    fn test_scratched_marker() {
        let record = window("好馬 SCR");
        assert_eq!(record.win_odds, WinOdds::Scratched);
        assert_eq!(record.horse_name.as_deref(), Some("好馬"));
    }

    #[test]
    fn test_first_name_wins() {
        let record = window("好馬 快馬 2.0");
        assert_eq!(record.horse_name.as_deref(), Some("好馬"));
    }

    #[test]
    fn test_empty_window() {
        let record = window("");
        assert_eq!(record.horse_name, None);
        assert_eq!(record.win_odds, WinOdds::NotPosted);
    }
}
