//! Line-oriented strategies for pasted or stripped text.

use super::tokens::{anchor, tokenize};
use super::window::FieldWindow;
use super::{Context, Parsed};

/// One line per horse: `<no> <name> [jockey] [trainer] <odds> ...`
pub struct WindowedScanParser;

impl WindowedScanParser {
    pub fn parse(lines: &[String], ctx: &Context) -> Parsed {
        let mut parsed = Parsed::default();
        let mut skipped = 0;

        for line in lines {
            let tokens = tokenize(line);
            let Some(pos) = tokens.iter().position(|t| anchor(t, ctx.max_horse_number).is_some())
            else {
                skipped += 1;
                continue;
            };
            let Some(number) = anchor(tokens[pos], ctx.max_horse_number) else {
                continue;
            };

            let mut window = FieldWindow::new(number, ctx.roster);
            window.feed_all(tokens[pos + 1..].iter().copied());
            parsed.rows.push(window.finish());
        }

        if skipped > 0 {
            parsed.note(format!("{} lines without an anchor skipped", skipped));
        }
        parsed
    }
}

/// Vertical layout: a line holding only the horse number opens a record,
/// the following lines carry its fields
pub struct PlainPairsParser;

impl PlainPairsParser {
    pub fn parse(lines: &[String], ctx: &Context) -> Parsed {
        let mut parsed = Parsed::default();
        let mut current: Option<FieldWindow> = None;
        let mut leading = 0;

        for line in lines {
            let tokens = tokenize(line);
            if tokens.is_empty() {
                continue;
            }

            if tokens.len() == 1 {
                if let Some(number) = anchor(tokens[0], ctx.max_horse_number) {
                    if let Some(done) = current.take() {
                        parsed.rows.push(done.finish());
                    }
                    current = Some(FieldWindow::new(number, ctx.roster));
                    continue;
                }
            }

            match current.as_mut() {
                Some(window) => {
                    window.feed_all(tokens);
                    window.end_line();
                }
                None => leading += 1,
            }
        }

        if let Some(done) = current {
            parsed.rows.push(done.finish());
        }

        if leading > 0 {
            parsed.note(format!("{} lines before the first number line ignored", leading));
        }
        parsed
    }
}
