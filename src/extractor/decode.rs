//! Best-effort byte decoding for pages served as UTF-8, Big5 or something declared.

use encoding_rs::{Encoding, BIG5, UTF_8};
use regex::Regex;
use std::sync::LazyLock;

static DECLARED_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:charset|encoding)\s*=\s*["']?([A-Za-z0-9_\-]+)"#)
        .expect("valid charset regex")
});

/// Bytes inspected for a `<meta charset>` or XML `encoding=` declaration
const SNIFF_LEN: usize = 1024;

/// Decoded text and the encoding that was used
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
    /// True when replacement characters had to be inserted
    pub had_errors: bool,
}

/// Decode `bytes`, trying UTF-8 first and falling back to the declared or
/// sniffed encoding, then Big5. The candidate with the fewest replacement
/// characters wins when none decodes cleanly.
pub fn decode(bytes: &[u8], declared: Option<&str>) -> Decoded {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Decoded {
            text: text.into_owned(),
            encoding: encoding.name(),
            had_errors,
        };
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: text.to_string(),
            encoding: UTF_8.name(),
            had_errors: false,
        };
    }

    let mut candidates: Vec<&'static Encoding> = Vec::new();
    if let Some(encoding) =
        declared.and_then(|label| Encoding::for_label(label.trim().as_bytes()))
    {
        candidates.push(encoding);
    }
    if let Some(encoding) = sniff_declaration(bytes) {
        candidates.push(encoding);
    }
    candidates.push(BIG5);

    let lossy = String::from_utf8_lossy(bytes).into_owned();
    let mut best = Decoded {
        encoding: UTF_8.name(),
        had_errors: true,
        text: lossy,
    };
    let mut best_damage = replacement_count(&best.text);

    for encoding in candidates {
        if encoding == UTF_8 {
            continue;
        }
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Decoded {
                text: text.into_owned(),
                encoding: encoding.name(),
                had_errors: false,
            };
        }
        let damage = replacement_count(&text);
        if damage < best_damage {
            best_damage = damage;
            best = Decoded {
                text: text.into_owned(),
                encoding: encoding.name(),
                had_errors: true,
            };
        }
    }

    best
}

/// Encoding named by a `<meta charset>` / `encoding="..."` near the top of the document
fn sniff_declaration(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let head = String::from_utf8_lossy(head);
    let caps = DECLARED_CHARSET.captures(&head)?;
    Encoding::for_label(caps[1].as_bytes())
}

fn replacement_count(text: &str) -> usize {
    text.chars().filter(|&c| c == '\u{FFFD}').count()
}
