//! XML-ish strategy: attribute records and leaf-element records.

use regex::Regex;
use std::sync::LazyLock;

use super::fields::{is_scratched_status, is_status_key, key_role, FieldRole, KeyedRecord};
use super::{Context, Parsed};

static ELEMENT_WITH_ATTRS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([A-Za-z_][\w:.-]*)((?:\s+[\w:.-]+\s*=\s*(?:"[^"]*"|'[^']*'))+)\s*(/?)>"#)
        .expect("valid element regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

static LEAF_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w:.-]*)(?:\s[^>]*)?>([^<]*)</([A-Za-z_][\w:.-]*)\s*>")
        .expect("valid leaf regex")
});

/// Parser for XML feeds and XML-shaped fragments
pub struct XmlFieldsParser;

impl XmlFieldsParser {
    pub fn parse(raw: &str, ctx: &Context) -> Parsed {
        let mut parsed = Parsed::default();
        if !raw.contains('<') {
            parsed.note("no markup");
            return parsed;
        }

        let text = raw.replace("<![CDATA[", "").replace("]]>", "");

        let from_attrs = Self::attribute_records(&text, ctx, &mut parsed);
        let from_leaves = Self::leaf_records(&text, ctx, &mut parsed);
        parsed.note(format!(
            "{} attribute records, {} element records",
            from_attrs, from_leaves
        ));
        parsed
    }

    /// `<horse no="1" name="..." odds="2.3"/>`; an open element with
    /// numbered elements inside it is a container, not a runner
    fn attribute_records(text: &str, ctx: &Context, parsed: &mut Parsed) -> usize {
        let elements: Vec<AttrElement> = ELEMENT_WITH_ATTRS
            .captures_iter(text)
            .map(|caps| {
                let whole = caps.get(0).map_or(0..0, |m| m.range());
                let pairs: Vec<(String, String)> = ATTRIBUTE
                    .captures_iter(&caps[2])
                    .map(|a| {
                        let value = a.get(2).or_else(|| a.get(3)).map_or("", |m| m.as_str());
                        (a[1].to_string(), unescape(value))
                    })
                    .collect();
                AttrElement {
                    numbered: pairs.iter().any(|(k, v)| {
                        key_role(k) == Some(FieldRole::Number)
                            && super::tokens::anchor(v, ctx.max_horse_number).is_some()
                    }),
                    name: caps[1].to_string(),
                    self_closing: !caps[3].is_empty(),
                    start: whole.start,
                    end: whole.end,
                    pairs,
                }
            })
            .collect();

        let mut count = 0;
        let mut containers = 0;
        for element in &elements {
            if !element.numbered {
                continue;
            }
            if !element.self_closing {
                let close = text[element.end..]
                    .find(&format!("</{}", element.name))
                    .map(|at| element.end + at);
                if let Some(close) = close {
                    let holds_numbered = elements.iter().any(|inner| {
                        inner.numbered && inner.start >= element.end && inner.start < close
                    });
                    if holds_numbered {
                        containers += 1;
                        continue;
                    }
                }
            }
            if let Some(record) = record_from_pairs(&element.pairs, ctx) {
                parsed.rows.push(record);
                count += 1;
            }
        }
        if containers > 0 {
            parsed.note(format!("skipped {} container elements", containers));
        }
        count
    }

    /// `<runner><no>1</no><name>...</name><odds>2.3</odds></runner>`; a new
    /// number element starts the next record
    fn leaf_records(text: &str, ctx: &Context, parsed: &mut Parsed) -> usize {
        let mut count = 0;
        let mut group: Vec<(String, String)> = Vec::new();
        let mut has_number = false;

        for caps in LEAF_ELEMENT.captures_iter(text) {
            if caps[1] != caps[3] {
                continue;
            }
            let key = caps[1].to_string();
            let value = unescape(caps[2].trim());
            let is_number = key_role(&key) == Some(FieldRole::Number)
                && super::tokens::anchor(&value, ctx.max_horse_number).is_some();

            if is_number {
                if has_number {
                    if let Some(record) = record_from_pairs(&group, ctx) {
                        parsed.rows.push(record);
                        count += 1;
                    }
                    group.clear();
                }
                has_number = true;
            }
            if has_number {
                group.push((key, value));
            }
        }

        if let Some(record) = record_from_pairs(&group, ctx) {
            parsed.rows.push(record);
            count += 1;
        }
        count
    }
}

struct AttrElement {
    name: String,
    self_closing: bool,
    numbered: bool,
    start: usize,
    end: usize,
    pairs: Vec<(String, String)>,
}

/// Number plus at least one runner field, or nothing
fn record_from_pairs(
    pairs: &[(String, String)],
    ctx: &Context,
) -> Option<crate::types::HorseRecord> {
    let mut keyed = KeyedRecord::default();

    for (key, value) in pairs {
        if key_role(key) == Some(FieldRole::Number) {
            keyed.set(FieldRole::Number, value, ctx.max_horse_number);
        }
    }
    if !keyed.has_number() {
        return None;
    }

    for (key, value) in pairs {
        if is_status_key(key) {
            if is_scratched_status(value) {
                keyed.mark_scratched();
            }
            continue;
        }
        match key_role(key) {
            Some(FieldRole::Number) | None => {}
            Some(role) => {
                keyed.set(role, value, ctx.max_horse_number);
            }
        }
    }
    if !keyed.has_runner_fields() {
        return None;
    }
    keyed.build()
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::types::WinOdds;

    fn parse(raw: &str) -> Parsed {
        let roster = Roster::builtin();
        let ctx = Context::new(&roster, 24);
        XmlFieldsParser::parse(raw, &ctx)
    }

    #[test]
    fn test_attribute_form() {
        let parsed = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <race no="3">
              <horse no="1" name="浪漫勇士" jockey="潘頓" win="2.3"/>
              <horse no='2' name='BLACK &amp; WHITE' status='SCR'/>
            </race>"#,
        );
        let numbers: Vec<u8> = parsed.rows.iter().map(|r| r.horse_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(parsed.rows[0].jockey.as_deref(), Some("潘頓"));
        assert_eq!(parsed.rows[0].win_odds, WinOdds::Posted(2.3));
        assert_eq!(parsed.rows[1].horse_name.as_deref(), Some("BLACK & WHITE"));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Scratched);
    }

    #[test]
    fn test_named_race_element_skipped() {
        let parsed = parse(
            r#"<meeting><race no="8" name="Sha Tin Trophy">
              <horse no="1" name="好馬" win="4.4"/>
              <horse no="2" name="快馬" win="6.0"/>
            </race></meeting>"#,
        );
        let numbers: Vec<u8> = parsed.rows.iter().map(|r| r.horse_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(parsed.notes.iter().any(|n| n.contains("skipped 1 container")));
    }

    #[test]
    fn test_leaf_race_number_skipped() {
        let parsed = parse(
            "<race><no>3</no>\
             <runner><no>1</no><name>好馬</name><odds>4.4</odds></runner>\
             </race>",
        );
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].horse_number, 1);
    }

    #[test]
    fn test_leaf_elements() {
        let parsed = parse(
            "<runners>\
             <runner><no>4</no><name><![CDATA[好馬]]></name><odds>5.6</odds></runner>\
             <runner><no>5</no><name>快馬</name><trainer>蔡約翰</trainer>\
             <odds>12</odds></runner>\
             </runners>",
        );
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].horse_name.as_deref(), Some("好馬"));
        assert_eq!(parsed.rows[1].trainer.as_deref(), Some("蔡約翰"));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Posted(12.0));
    }

    #[test]
    fn test_plain_text_is_not_xml() {
        let parsed = parse("1 浪漫勇士 2.3");
        assert!(parsed.rows.is_empty());
    }
}
