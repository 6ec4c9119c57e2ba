//! JSON-ish strategy: an object carrying a horse number key and at least one
//! runner field is a record, unless it holds such objects itself.

use serde_json::{Map, Value};

use super::fields::{is_scratched_status, is_status_key, key_role, FieldRole, KeyedRecord};
use super::{Context, Parsed};

/// Parser for JSON, JSONP and single-quoted JSON blobs
pub struct JsonFieldsParser;

impl JsonFieldsParser {
    pub fn parse(raw: &str, ctx: &Context) -> Parsed {
        let mut parsed = Parsed::default();

        let Some(value) = Self::relaxed_parse(raw, &mut parsed) else {
            return parsed;
        };

        Self::walk(&value, ctx, &mut parsed);
        if parsed.rows.is_empty() {
            parsed.note("no object with a horse number key");
        }
        parsed
    }

    fn relaxed_parse(raw: &str, parsed: &mut Parsed) -> Option<Value> {
        let start = raw.find(['{', '['])?;
        let end = raw.rfind(['}', ']'])?;
        if end < start {
            parsed.note("no JSON body");
            return None;
        }
        let body = &raw[start..=end];

        match serde_json::from_str::<Value>(body) {
            Ok(value) => return Some(value),
            Err(e) => parsed.note(format!("not JSON: {}", e)),
        }

        if body.contains('\'') {
            if let Ok(value) = serde_json::from_str::<Value>(&body.replace('\'', "\"")) {
                parsed.note("parsed after quote repair");
                return Some(value);
            }
        }
        None
    }

    /// Pre-order walk, so nested runners are seen after their container
    fn walk(value: &Value, ctx: &Context, parsed: &mut Parsed) {
        match value {
            Value::Object(map) => {
                if let Some(record) = Self::record_from_object(map, ctx) {
                    parsed.rows.push(record);
                }
                for child in map.values() {
                    Self::walk(child, ctx, parsed);
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::walk(item, ctx, parsed);
                }
            }
            _ => {}
        }
    }

    fn record_from_object(
        map: &Map<String, Value>,
        ctx: &Context,
    ) -> Option<crate::types::HorseRecord> {
        let mut keyed = KeyedRecord::default();

        // Number first so an invalid number rejects the object early
        for (key, value) in map {
            if key_role(key) == Some(FieldRole::Number) {
                if let Some(text) = scalar_text(value) {
                    keyed.set(FieldRole::Number, &text, ctx.max_horse_number);
                }
            }
        }
        if !keyed.has_number() {
            return None;
        }
        // A race numbered like a runner, with its runners below it
        if map.values().any(holds_numbered_object) {
            return None;
        }

        for (key, value) in map {
            if is_status_key(key) {
                if scalar_text(value).is_some_and(|s| is_scratched_status(&s)) {
                    keyed.mark_scratched();
                }
                continue;
            }

            let Some(role) = key_role(key) else {
                continue;
            };
            if role == FieldRole::Number {
                continue;
            }

            let text = match value {
                Value::Object(inner) => nested_name(inner),
                other => scalar_text(other),
            };
            if let Some(text) = text {
                keyed.set(role, &text, ctx.max_horse_number);
            }
        }

        if !keyed.has_runner_fields() {
            return None;
        }
        keyed.build()
    }
}

fn holds_numbered_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| key_role(k) == Some(FieldRole::Number) || holds_numbered_object(v)),
        Value::Array(items) => items.iter().any(holds_numbered_object),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `{"jockey": {"code": "PZ", "name_ch": "潘頓"}}` -> first string under a name-ish key
fn nested_name(map: &Map<String, Value>) -> Option<String> {
    map.iter()
        .filter(|(k, _)| k.to_lowercase().contains("name"))
        .find_map(|(_, v)| v.as_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::types::WinOdds;

    fn parse(raw: &str) -> Parsed {
        let roster = Roster::builtin();
        let ctx = Context::new(&roster, 24);
        JsonFieldsParser::parse(raw, &ctx)
    }

    #[test]
    fn test_flat_runner_list() {
        let parsed = parse(
            r#"[{"horseNo": "1", "horseName": "浪漫勇士", "winOdds": "2.3"},
                {"horseNo": 2, "horseName": "金鎗六十", "winOdds": 5.6, "draw": 4}]"#,
        );
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].horse_name.as_deref(), Some("浪漫勇士"));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Posted(5.6));
        assert_eq!(parsed.rows[1].draw, Some(4));
    }

    #[test]
    fn test_nested_meeting_structure() {
        let parsed = parse(
            r#"{"data": {"raceMeetings": [{"races": [{"no": 1, "runners": [
                {"no": "1", "name_ch": "好馬", "jockey": {"code": "PZ", "name_ch": "潘頓"},
                 "trainer": {"name_ch": "蔡約翰"}, "barrierDrawNumber": "3",
                 "winOdds": "4.4", "status": "Declared"},
                {"no": "2", "name_ch": "快馬", "status": "Scratched", "winOdds": "8.0"}
            ]}]}]}}"#,
        );
        let numbers: Vec<u8> = parsed.rows.iter().map(|r| r.horse_number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let one = &parsed.rows[0];
        assert_eq!(one.horse_name.as_deref(), Some("好馬"));
        assert_eq!(one.jockey.as_deref(), Some("潘頓"));
        assert_eq!(one.trainer.as_deref(), Some("蔡約翰"));
        assert_eq!(one.draw, Some(3));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Scratched);
    }

    #[test]
    fn test_named_race_container_skipped() {
        let parsed = parse(
            r#"{"races": [{"no": 8, "name": "Sha Tin Trophy", "runners": [
                {"no": 1, "name": "好馬", "winOdds": 4.4},
                {"no": 2, "name": "快馬", "winOdds": 6.0}
            ]}]}"#,
        );
        let numbers: Vec<u8> = parsed.rows.iter().map(|r| r.horse_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_bare_number_object_skipped() {
        let parsed = parse(r#"[{"no": 3, "raceClass": "4"}, {"no": 5, "name": "快馬"}]"#);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].horse_number, 5);
    }

    #[test]
    fn test_odds_nodes() {
        let parsed = parse(
            r#"{"pmPools": [{"oddsType": "WIN", "oddsNodes": [
                {"combString": "01", "oddsValue": "3.2"},
                {"combString": "02", "oddsValue": "SCR"}
            ]}]}"#,
        );
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].win_odds, WinOdds::Posted(3.2));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Scratched);
    }

    #[test]
    fn test_jsonp_and_single_quotes() {
        let parsed = parse("callback([{'no': '6', 'name': 'GOLDEN SIXTY', 'odds': '1.8'}]);");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].horse_name.as_deref(), Some("GOLDEN SIXTY"));
        assert!(parsed.notes.iter().any(|n| n.contains("quote repair")));
    }

    #[test]
    fn test_not_json() {
        let parsed = parse("3 好馬 4.4");
        assert!(parsed.rows.is_empty());
    }
}
