//! Tabular record extractor.
//!
//! Turns pasted text, HTML pages and JSON/XML-ish blobs into [`HorseRecord`]s.
//! Every strategy in the hint's fallback chain is tried; the one that
//! recovers the most (records plus resolved fields) wins, ties going to the
//! earlier strategy. Nothing here fails: an empty record list plus the
//! diagnostic log is the failure result.

pub mod decode;
pub mod fields;
pub mod html_table;
pub mod json_like;
pub mod text;
pub mod tokens;
pub mod window;
pub mod xml_like;

use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::roster::Roster;
use crate::types::HorseRecord;

pub use decode::{decode, Decoded};
pub use html_table::TableSniffParser;
pub use json_like::JsonFieldsParser;
pub use text::{PlainPairsParser, WindowedScanParser};
pub use xml_like::XmlFieldsParser;

/// Largest horse number on Hong Kong race cards
pub const DEFAULT_MAX_HORSE_NUMBER: u8 = 24;

/// Believed shape of the input, selects which strategy runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputHint {
    #[default]
    FreeText,
    HtmlTable,
    JsonLike,
    XmlLike,
}

impl InputHint {
    /// Guess from the first non-blank characters
    pub fn sniff(raw: &str) -> Self {
        let head = raw.trim_start();
        let lower: String = head.chars().take(512).collect::<String>().to_lowercase();
        if head.starts_with('{') || head.starts_with('[') {
            InputHint::JsonLike
        } else if lower.starts_with("<?xml") {
            InputHint::XmlLike
        } else if lower.contains("<table") || lower.contains("<html") {
            InputHint::HtmlTable
        } else {
            InputHint::FreeText
        }
    }

    /// Strategies in the order they are tried
    pub fn chain(self) -> [Strategy; 5] {
        use Strategy::*;
        match self {
            InputHint::FreeText => [
                WindowedTripleScan,
                PlainTextPairs,
                HtmlTableSniff,
                JsonFields,
                XmlFields,
            ],
            InputHint::HtmlTable => [
                HtmlTableSniff,
                WindowedTripleScan,
                PlainTextPairs,
                JsonFields,
                XmlFields,
            ],
            InputHint::JsonLike => [
                JsonFields,
                WindowedTripleScan,
                PlainTextPairs,
                HtmlTableSniff,
                XmlFields,
            ],
            InputHint::XmlLike => [
                XmlFields,
                HtmlTableSniff,
                WindowedTripleScan,
                PlainTextPairs,
                JsonFields,
            ],
        }
    }
}

impl FromStr for InputHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "free_text" | "freetext" => Ok(InputHint::FreeText),
            "html" | "html_table" | "table" => Ok(InputHint::HtmlTable),
            "json" | "json_like" => Ok(InputHint::JsonLike),
            "xml" | "xml_like" => Ok(InputHint::XmlLike),
            other => Err(format!("unknown input hint: {} (text, html, json, xml)", other)),
        }
    }
}

/// Parsing strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PlainTextPairs,
    WindowedTripleScan,
    HtmlTableSniff,
    JsonFields,
    XmlFields,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::PlainTextPairs => "plain-text pairs",
            Strategy::WindowedTripleScan => "windowed scan",
            Strategy::HtmlTableSniff => "html table",
            Strategy::JsonFields => "json fields",
            Strategy::XmlFields => "xml fields",
        };
        f.write_str(name)
    }
}

/// Parameters every strategy reads
pub struct Context<'r> {
    pub roster: &'r Roster,
    pub max_horse_number: u8,
}

impl<'r> Context<'r> {
    pub fn new(roster: &'r Roster, max_horse_number: u8) -> Self {
        Self {
            roster,
            max_horse_number,
        }
    }
}

/// Raw output of one strategy, in encounter order
#[derive(Debug, Default)]
pub struct Parsed {
    pub rows: Vec<HorseRecord>,
    pub notes: Vec<String>,
}

impl Parsed {
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Extraction result plus diagnostics
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Extraction {
    pub records: Vec<HorseRecord>,
    pub strategy: Option<Strategy>,
    pub log: Vec<String>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fewer rows than a full race is expected to have
    pub fn is_partial(&self, min_rows: usize) -> bool {
        !self.records.is_empty() && self.records.len() < min_rows
    }
}

/// Extractor owning its roster; holds no other state
#[derive(Debug, Clone)]
pub struct Extractor {
    roster: Roster,
    max_horse_number: u8,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Roster::builtin(), DEFAULT_MAX_HORSE_NUMBER)
    }
}

impl Extractor {
    pub fn new(roster: Roster, max_horse_number: u8) -> Self {
        Self {
            roster,
            max_horse_number,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Decode raw bytes first, then extract
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        hint: InputHint,
        declared_charset: Option<&str>,
    ) -> Extraction {
        let decoded = decode(bytes, declared_charset);
        let mut extraction = self.extract(&decoded.text, hint);
        let note = if decoded.had_errors {
            format!("decoded as {} with replacement characters", decoded.encoding)
        } else {
            format!("decoded as {}", decoded.encoding)
        };
        extraction.log.insert(0, note);
        extraction
    }

    pub fn extract(&self, raw: &str, hint: InputHint) -> Extraction {
        let mut log = Vec::new();

        if raw.trim().is_empty() {
            log.push("empty input".to_string());
            log.push("no anchor token found".to_string());
            return Extraction {
                records: Vec::new(),
                strategy: None,
                log,
            };
        }

        let ctx = Context::new(&self.roster, self.max_horse_number);
        let lines = visible_lines(raw);
        let mut best: Option<(Strategy, Vec<HorseRecord>, i64)> = None;

        for strategy in hint.chain() {
            let parsed = match strategy {
                Strategy::WindowedTripleScan => WindowedScanParser::parse(&lines, &ctx),
                Strategy::PlainTextPairs => PlainPairsParser::parse(&lines, &ctx),
                Strategy::HtmlTableSniff => TableSniffParser::parse(raw, &ctx),
                Strategy::JsonFields => JsonFieldsParser::parse(raw, &ctx),
                Strategy::XmlFields => XmlFieldsParser::parse(raw, &ctx),
            };

            let (records, replaced) = dedupe_last_wins(parsed.rows);
            let score = selection_score(&records);

            let mut line = format!("{}: {} records, score {}", strategy, records.len(), score);
            if !replaced.is_empty() {
                line.push_str(&format!(", repeated numbers {:?} keep last", replaced));
            }
            for note in &parsed.notes {
                line.push_str("; ");
                line.push_str(note);
            }
            log.push(line);

            if !records.is_empty() && best.as_ref().map_or(true, |(_, _, s)| score > *s) {
                best = Some((strategy, records, score));
            }
        }

        match best {
            Some((strategy, records, _)) => {
                log.push(format!("using {} ({} records)", strategy, records.len()));
                Extraction {
                    records,
                    strategy: Some(strategy),
                    log,
                }
            }
            None => {
                log.push("no anchor token found".to_string());
                Extraction {
                    records: Vec::new(),
                    strategy: None,
                    log,
                }
            }
        }
    }
}

/// Keep the last record per horse number, ordered by number
fn dedupe_last_wins(rows: Vec<HorseRecord>) -> (Vec<HorseRecord>, Vec<u8>) {
    let mut by_number = BTreeMap::new();
    let mut replaced = Vec::new();
    for row in rows {
        let number = row.horse_number;
        if by_number.insert(number, row).is_some() && !replaced.contains(&number) {
            replaced.push(number);
        }
    }
    (by_number.into_values().collect(), replaced)
}

/// Resolved fields minus records that carry nothing but a number.
///
/// A strategy that splits one row into several bare-number records
/// scores below one that keeps the fields together.
fn selection_score(records: &[HorseRecord]) -> i64 {
    records
        .iter()
        .map(|r| match r.resolved_fields() {
            0 => -1,
            n => n as i64,
        })
        .sum()
}

/// Text lines as a reader would see them; markup becomes one line per text node
pub fn visible_lines(raw: &str) -> Vec<String> {
    if !looks_like_markup(raw) {
        return raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
    }

    let document = Html::parse_document(raw);
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        for line in text.lines() {
            let line = tokens::collapse_whitespace(line);
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }
    lines
}

fn looks_like_markup(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    ["<table", "<tr", "<td", "<div", "<html", "<body", "<span", "<p>", "<br"]
        .iter()
        .any(|tag| lower.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WinOdds;

    fn extract(raw: &str, hint: InputHint) -> Extraction {
        Extractor::default().extract(raw, hint)
    }

    #[test]
    fn test_well_formed_rows() {
        for (raw, number, name, odds) in [
            ("1 浪漫勇士 2.3", 1, "浪漫勇士", 2.3),
            ("24 金鎗六十 15.5", 24, "金鎗六十", 15.5),
            ("12 好馬 101.0", 12, "好馬", 101.0),
        ] {
            let result = extract(raw, InputHint::FreeText);
            assert_eq!(result.records.len(), 1, "{}", raw);
            let record = &result.records[0];
            assert_eq!(record.horse_number, number);
            assert_eq!(record.horse_name.as_deref(), Some(name));
            assert_eq!(record.win_odds, WinOdds::Posted(odds));
        }
    }

    #[test]
    fn test_last_occurrence_wins() {
        let result = extract("3 好馬 4.4\n5 快馬 6.0\n3 好馬 3.1", InputHint::FreeText);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].horse_number, 3);
        assert_eq!(result.records[0].win_odds, WinOdds::Posted(3.1));
        assert!(result.log.iter().any(|l| l.contains("keep last")));
    }

    #[test]
    fn test_idempotent() {
        let extractor = Extractor::default();
        let raw = "1\n浪漫勇士\n2.3\n2\n金鎗六十\n5.6\n";
        let first = extractor.extract(raw, InputHint::FreeText);
        let second = extractor.extract(raw, InputHint::FreeText);
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_range_number_rejected() {
        let result = extract("25 壞馬 3.0", InputHint::FreeText);
        assert!(result.records.is_empty());
        assert!(result.log.iter().any(|l| l == "no anchor token found"));
    }

    #[test]
    fn test_scratched_sentinel() {
        let result = extract("9 退出馬 SCR", InputHint::FreeText);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].win_odds, WinOdds::Scratched);
    }

    #[test]
    fn test_vertical_layout() {
        let result = extract("1\n浪漫勇士\n2.3\n2\n金鎗六十\n5.6\n", InputHint::FreeText);
        assert_eq!(result.strategy, Some(Strategy::PlainTextPairs));
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].horse_number, 1);
        assert_eq!(result.records[0].horse_name.as_deref(), Some("浪漫勇士"));
        assert_eq!(result.records[0].win_odds, WinOdds::Posted(2.3));
        assert_eq!(result.records[1].horse_number, 2);
        assert_eq!(result.records[1].horse_name.as_deref(), Some("金鎗六十"));
        assert_eq!(result.records[1].win_odds, WinOdds::Posted(5.6));
    }

    #[test]
    fn test_malformed_row_skipped() {
        let result = extract("abc xyz\n3 好馬 4.4", InputHint::FreeText);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].horse_number, 3);
        assert_eq!(result.records[0].horse_name.as_deref(), Some("好馬"));
        assert_eq!(result.records[0].win_odds, WinOdds::Posted(4.4));
    }

    #[test]
    fn test_empty_input() {
        let result = extract("", InputHint::FreeText);
        assert!(result.is_empty());
        assert_eq!(result.strategy, None);
        assert!(!result.log.is_empty());
    }

    #[test]
    fn test_html_table_header() {
        let html = "<table><tr><th>No.</th><th>Horse</th><th>Win</th></tr>\
                    <tr><td>7</td><td>LUCKY STAR</td><td>9.5</td></tr></table>";
        for hint in [InputHint::HtmlTable, InputHint::FreeText] {
            let result = extract(html, hint);
            assert_eq!(result.records.len(), 1);
            assert_eq!(result.records[0].horse_number, 7);
            assert_eq!(result.records[0].horse_name.as_deref(), Some("LUCKY STAR"));
            assert_eq!(result.records[0].win_odds, WinOdds::Posted(9.5));
        }
    }

    fn numbers(result: &Extraction) -> Vec<u8> {
        result.records.iter().map(|r| r.horse_number).collect()
    }

    #[test]
    fn test_table_wins_over_split_cells() {
        let html = "<table>\
                    <tr><th>No.</th><th>Horse</th><th>Age</th><th>Draw</th><th>Win</th></tr>\
                    <tr><td>1</td><td>LUCKY STAR</td><td>4</td><td>7</td><td>9.5</td></tr>\
                    <tr><td>2</td><td>GOLDEN SIXTY</td><td>5</td><td>3</td><td>1.8</td></tr>\
                    </table>";
        let result = extract(html, InputHint::HtmlTable);
        assert_eq!(result.strategy, Some(Strategy::HtmlTableSniff));
        assert_eq!(numbers(&result), vec![1, 2]);
        assert_eq!(result.records[0].draw, Some(7));
        assert_eq!(result.records[1].horse_name.as_deref(), Some("GOLDEN SIXTY"));
        assert_eq!(result.records[1].win_odds, WinOdds::Posted(1.8));
    }

    #[test]
    fn test_integer_odds_cell_is_not_a_horse() {
        let html = "<table><tr><th>No.</th><th>Horse</th><th>Win</th></tr>\
                    <tr><td>1</td><td>LUCKY STAR</td><td>9</td></tr>\
                    <tr><td>2</td><td>GOLDEN SIXTY</td><td>4.5</td></tr></table>";
        for hint in [InputHint::FreeText, InputHint::HtmlTable] {
            let result = extract(html, hint);
            assert_eq!(result.strategy, Some(Strategy::HtmlTableSniff), "{:?}", hint);
            assert_eq!(numbers(&result), vec![1, 2]);
            assert_eq!(result.records[0].win_odds, WinOdds::Posted(9.0));
        }
    }

    #[test]
    fn test_nested_json_race_number_ignored() {
        let raw = r#"{"races": [{"no": 8, "runners": [
            {"no": 1, "name": "好馬", "jockey": "潘頓", "trainer": "蔡約翰",
             "draw": 3, "winOdds": 4.4},
            {"no": 2, "name": "快馬", "jockey": "何澤堯", "trainer": "呂健威",
             "draw": 6, "winOdds": 7.0}
        ]}]}"#;
        let result = extract(raw, InputHint::JsonLike);
        assert_eq!(result.strategy, Some(Strategy::JsonFields));
        assert_eq!(numbers(&result), vec![1, 2]);
    }

    #[test]
    fn test_xml_race_element_ignored() {
        let raw = r#"<race no="3">
            <horse no="1" name="好馬" win="4.4"/>
            <horse no="2" name="快馬" win="7.0"/>
        </race>"#;
        let result = extract(raw, InputHint::XmlLike);
        assert_eq!(result.strategy, Some(Strategy::XmlFields));
        assert_eq!(numbers(&result), vec![1, 2]);
    }

    #[test]
    fn test_fallback_ignores_wrong_hint() {
        let raw = r#"[{"no": 4, "name": "好馬", "winOdds": 5.0}]"#;
        let result = extract(raw, InputHint::XmlLike);
        assert_eq!(result.strategy, Some(Strategy::JsonFields));
        assert_eq!(result.records[0].win_odds, WinOdds::Posted(5.0));
    }

    #[test]
    fn test_partial_flag() {
        let result = extract("3 好馬 4.4", InputHint::FreeText);
        assert!(result.is_partial(5));
        assert!(!result.is_partial(1));
    }

    #[test]
    fn test_extract_big5_bytes() {
        let (bytes, _, _) = encoding_rs::BIG5.encode("3 好馬 4.4");
        let result =
            Extractor::default().extract_bytes(&bytes, InputHint::FreeText, Some("big5"));
        assert_eq!(result.records[0].horse_name.as_deref(), Some("好馬"));
        assert!(result.log[0].contains("Big5"));
    }

    #[test]
    fn test_hint_sniff_and_parse() {
        assert_eq!(InputHint::sniff("  [1, 2]"), InputHint::JsonLike);
        assert_eq!(InputHint::sniff("<?xml version=\"1.0\"?>"), InputHint::XmlLike);
        assert_eq!(InputHint::sniff("<html><table>"), InputHint::HtmlTable);
        assert_eq!(InputHint::sniff("1 好馬 2.3"), InputHint::FreeText);
        assert_eq!("html".parse::<InputHint>(), Ok(InputHint::HtmlTable));
        assert!("csv".parse::<InputHint>().is_err());
    }

    #[test]
    fn test_visible_lines_strip_markup() {
        let lines =
            visible_lines("<div><script>var x = 1;</script><p>3</p><p>好馬  4.4</p></div>");
        assert_eq!(lines, vec!["3".to_string(), "好馬 4.4".to_string()]);
    }
}
