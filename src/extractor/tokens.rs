//! Token classification shared by every strategy.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::WinOdds;

static DECIMAL_ODDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\.\d{1,2}$").expect("valid decimal odds regex"));

/// Markers for a withdrawn horse
const SCRATCHED_MARKERS: [&str; 6] = ["SCR", "(SCR)", "W/D", "WD", "退出", "已退出"];

/// Carried weights (lb) sit in this band and must never be read as numbers or odds
const WEIGHT_RANGE: std::ops::RangeInclusive<u16> = 100..=135;

/// Odds-shaped token
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OddsToken {
    Decimal(f64),
    Integer(f64),
    Scratched,
}

/// Split one line into tokens.
///
/// Whitespace (including full-width spaces) and the usual pasted-table
/// separators delimit tokens; brackets around a token are dropped.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split(|c: char| {
        c.is_whitespace() || matches!(c, '|' | '｜' | ',' | '，' | ';' | '；' | '、')
    })
        .map(clean_token)
        .filter(|t| !t.is_empty())
        .collect()
}

fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| {
        matches!(c, '[' | ']' | '【' | '】' | ':' | '：' | '"' | '“' | '”')
    })
}

/// Horse number anchor: bare integer in `1..=max`
pub fn anchor(token: &str, max: u8) -> Option<u8> {
    let digits = token.strip_suffix('.').unwrap_or(token);
    let digits = digits
        .strip_prefix('(')
        .and_then(|d| d.strip_suffix(')'))
        .unwrap_or(digits);

    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let value: u16 = digits.parse().ok()?;
    if WEIGHT_RANGE.contains(&value) || value == 0 || value > max as u16 {
        return None;
    }
    Some(value as u8)
}

pub fn is_scratched(token: &str) -> bool {
    let upper = token.trim().to_uppercase();
    SCRATCHED_MARKERS.iter().any(|m| upper == *m)
}

/// Classify a token as odds
pub fn odds_token(token: &str) -> Option<OddsToken> {
    if is_scratched(token) {
        return Some(OddsToken::Scratched);
    }

    let cleaned = token.replace(',', "");
    if DECIMAL_ODDS.is_match(&cleaned) {
        let value: f64 = cleaned.parse().ok()?;
        return (1.0..=999.0).contains(&value).then_some(OddsToken::Decimal(value));
    }

    if !cleaned.is_empty() && cleaned.len() <= 3 && cleaned.bytes().all(|b| b.is_ascii_digit()) {
        let value: u16 = cleaned.parse().ok()?;
        if (1..=999).contains(&value) && !WEIGHT_RANGE.contains(&value) {
            return Some(OddsToken::Integer(value as f64));
        }
    }

    None
}

/// Odds from a free-text cell or value.
///
/// A scratched marker wins, then the first decimal, then the first bare integer.
pub fn odds_from_text(text: &str) -> WinOdds {
    let mut decimal = None;
    let mut integer = None;

    for token in tokenize(text) {
        match odds_token(token) {
            Some(OddsToken::Scratched) => return WinOdds::Scratched,
            Some(OddsToken::Decimal(v)) if decimal.is_none() => decimal = Some(v),
            Some(OddsToken::Integer(v)) if integer.is_none() => integer = Some(v),
            _ => {}
        }
    }

    match decimal.or(integer) {
        Some(v) => WinOdds::Posted(v),
        None => WinOdds::NotPosted,
    }
}

/// Run of CJK or Latin letters, at least 2 characters
pub fn is_name_like(token: &str) -> bool {
    if token.chars().count() < 2 || is_scratched(token) {
        return false;
    }
    let mut has_letter = false;
    for c in token.chars() {
        if c.is_alphabetic() {
            has_letter = true;
        } else if !matches!(c, '\'' | '’' | '-' | '.' | '·') {
            return false;
        }
    }
    has_letter
}

/// Latin-script name tokens join with their neighbours ("LUCKY STAR")
pub fn is_latin(token: &str) -> bool {
    token.is_ascii()
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
