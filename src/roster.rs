//! Static jockey and trainer roster.
//!
//! Used by the extractor to recognise name tokens and by scoring for the
//! skill lookup. Extra entries can be supplied through configuration.

use serde::{Deserialize, Serialize};

/// Skill assumed for people missing from the roster
pub const DEFAULT_SKILL: f64 = 5.0;

/// One jockey or trainer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// 0-10
    #[serde(default = "default_skill")]
    pub skill: f64,
}

fn default_skill() -> f64 {
    DEFAULT_SKILL
}

impl RosterEntry {
    fn new(name: &str, aliases: &[&str], skill: f64) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            skill,
        }
    }

    fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// A token matched against a roster entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RosterMatch<'a> {
    pub entry: &'a RosterEntry,
    /// The roster spelling that matched
    pub spelling: &'a str,
}

/// Jockey and trainer tables
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    pub jockeys: Vec<RosterEntry>,
    pub trainers: Vec<RosterEntry>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Roster {
    /// Hong Kong jockeys and trainers
    pub fn builtin() -> Self {
        let jockeys = vec![
            RosterEntry::new("潘頓", &["Z Purton", "Purton"], 9.5),
            RosterEntry::new("莫雷拉", &["J Moreira", "Moreira"], 9.0),
            RosterEntry::new("布文", &["H Bowman", "Bowman"], 8.5),
            RosterEntry::new("田泰安", &["K Teetan", "Teetan"], 7.0),
            RosterEntry::new("巴度", &["A Badel", "Badel"], 7.0),
            RosterEntry::new("霍宏聲", &["L Ferraris", "Ferraris"], 6.5),
            RosterEntry::new("鍾易禮", &["L Hewitson", "Hewitson"], 6.5),
            RosterEntry::new("周俊樂", &["J Chau"], 6.0),
            RosterEntry::new("何澤堯", &["V Ho"], 6.5),
            RosterEntry::new("梁家俊", &["K C Leung"], 5.5),
            RosterEntry::new("蔡明紹", &["M Chadwick", "Chadwick"], 6.0),
            RosterEntry::new("潘明輝", &["M L Yeung"], 5.0),
        ];

        let trainers = vec![
            RosterEntry::new("蔡約翰", &["J Size", "Size"], 8.5),
            RosterEntry::new("呂健威", &["K W Lui"], 8.0),
            RosterEntry::new("沈集成", &["C S Shum", "Shum"], 7.5),
            RosterEntry::new("方嘉柏", &["C Fownes", "Fownes"], 7.5),
            RosterEntry::new("告東尼", &["A S Cruz", "Cruz"], 7.0),
            RosterEntry::new("大衛希斯", &["D A Hayes", "Hayes"], 7.5),
            RosterEntry::new("葉楚航", &["C H Yip"], 6.5),
            RosterEntry::new("姚本輝", &["P F Yiu"], 6.5),
            RosterEntry::new("羅富全", &["F C Lor"], 7.0),
            RosterEntry::new("苗禮德", &["A T Millard", "Millard"], 6.0),
            RosterEntry::new("徐雨石", &["Y S Tsui", "Tsui"], 6.0),
            RosterEntry::new("伍鵬志", &["P C Ng"], 6.0),
            RosterEntry::new("文家良", &["M Newnham", "Newnham"], 6.0),
            RosterEntry::new("賀賢", &["D J Hall", "Hall"], 6.5),
            RosterEntry::new("韋達", &["D J Whyte", "Whyte"], 6.0),
            RosterEntry::new("丁冠豪", &["K H Ting", "Ting"], 5.5),
            RosterEntry::new("容天鵬", &["T P Yung", "Yung"], 5.5),
        ];

        Self { jockeys, trainers }
    }

    /// Builtin roster plus configured extras
    pub fn with_extras(jockeys: &[RosterEntry], trainers: &[RosterEntry]) -> Self {
        let mut roster = Self::builtin();
        roster.jockeys.extend(jockeys.iter().cloned());
        roster.trainers.extend(trainers.iter().cloned());
        roster
    }

    pub fn match_jockey(&self, token: &str) -> Option<RosterMatch<'_>> {
        find_match(&self.jockeys, token)
    }

    pub fn match_trainer(&self, token: &str) -> Option<RosterMatch<'_>> {
        find_match(&self.trainers, token)
    }

    pub fn jockey_skill(&self, name: &str) -> f64 {
        self.match_jockey(name)
            .map(|m| m.entry.skill)
            .unwrap_or(DEFAULT_SKILL)
    }

    pub fn trainer_skill(&self, name: &str) -> f64 {
        self.match_trainer(name)
            .map(|m| m.entry.skill)
            .unwrap_or(DEFAULT_SKILL)
    }
}

fn find_match<'a>(entries: &'a [RosterEntry], token: &str) -> Option<RosterMatch<'a>> {
    // Drop allowance/claim suffixes such as "(-2)"
    let token = token
        .split(['(', '（'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if token.is_empty() {
        return None;
    }

    // Exact spellings take priority over fragments
    for entry in entries {
        for spelling in entry.spellings() {
            if spelling.to_lowercase() == token {
                return Some(RosterMatch { entry, spelling });
            }
        }
    }

    for entry in entries {
        for spelling in entry.spellings() {
            if is_fragment_match(&token, &spelling.to_lowercase()) {
                return Some(RosterMatch { entry, spelling });
            }
        }
    }

    None
}

fn is_fragment_match(token: &str, spelling: &str) -> bool {
    if token.is_ascii() {
        // Latin fragments have to be whole words: "size" in "j size", never "hall" in "hallmark"
        return token.len() >= 3 && spelling.split_whitespace().any(|w| w == token);
    }

    let token_len = token.chars().count();
    let spelling_len = spelling.chars().count();
    (token_len >= 2 && spelling.contains(token)) || (spelling_len >= 2 && token.contains(spelling))
}
