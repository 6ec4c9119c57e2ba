//! HTML table strategy: header-sniffed or content-sniffed column roles.

use scraper::{ElementRef, Html, Selector};

use super::fields::{header_role, FieldRole, KeyedRecord};
use super::tokens::{anchor, collapse_whitespace, is_name_like, odds_token, tokenize, OddsToken};
use super::{Context, Parsed};

/// Column index per role
#[derive(Debug, Default, Clone, PartialEq)]
struct ColumnRoles {
    number: Option<usize>,
    name: Option<usize>,
    jockey: Option<usize>,
    trainer: Option<usize>,
    draw: Option<usize>,
    odds: Option<usize>,
}

impl ColumnRoles {
    fn slot(&mut self, role: FieldRole) -> &mut Option<usize> {
        match role {
            FieldRole::Number => &mut self.number,
            FieldRole::Name => &mut self.name,
            FieldRole::Jockey => &mut self.jockey,
            FieldRole::Trainer => &mut self.trainer,
            FieldRole::Draw => &mut self.draw,
            FieldRole::Odds => &mut self.odds,
        }
    }

    fn assign(&mut self, role: FieldRole, column: usize) {
        self.slot(role).get_or_insert(column);
    }

    fn count(&self) -> usize {
        [self.number, self.name, self.jockey, self.trainer, self.draw, self.odds]
            .iter()
            .filter(|c| c.is_some())
            .count()
    }

    fn is_assigned(&self, column: usize) -> bool {
        [self.number, self.name, self.jockey, self.trainer, self.draw, self.odds]
            .contains(&Some(column))
    }

    fn pairs(&self) -> Vec<(FieldRole, usize)> {
        [
            (FieldRole::Number, self.number),
            (FieldRole::Name, self.name),
            (FieldRole::Jockey, self.jockey),
            (FieldRole::Trainer, self.trainer),
            (FieldRole::Draw, self.draw),
            (FieldRole::Odds, self.odds),
        ]
        .into_iter()
        .filter_map(|(role, col)| col.map(|c| (role, c)))
        .collect()
    }
}

/// One table row: cell texts plus whether it was a header-cell row
struct Row {
    cells: Vec<String>,
    has_th: bool,
}

/// Parser for race cards and odds pages laid out as `<table>`s
pub struct TableSniffParser;

impl TableSniffParser {
    pub fn parse(html: &str, ctx: &Context) -> Parsed {
        let mut parsed = Parsed::default();
        let document = Html::parse_document(html);

        let Ok(table_selector) = Selector::parse("table") else {
            return parsed;
        };
        let Ok(row_selector) = Selector::parse("tr") else {
            return parsed;
        };

        let mut tables = 0;
        for (index, table) in document.select(&table_selector).enumerate() {
            tables += 1;
            let rows = Self::own_rows(&table, &row_selector);
            if rows.is_empty() {
                continue;
            }

            match Self::identify_columns(&rows, ctx) {
                Some((roles, data_start, method)) => {
                    let before = parsed.rows.len();
                    for row in &rows[data_start..] {
                        if let Some(record) = Self::parse_row(&row.cells, &roles, ctx) {
                            parsed.rows.push(record);
                        }
                    }
                    parsed.note(format!(
                        "table {}: columns by {}, {} rows",
                        index,
                        method,
                        parsed.rows.len() - before
                    ));
                }
                None => parsed.note(format!("table {}: no horse number column", index)),
            }
        }

        if tables == 0 {
            parsed.note("no <table> element");
        }
        parsed
    }

    /// Rows whose nearest enclosing table is `table` (nested tables are visited on their own)
    fn own_rows(table: &ElementRef, row_selector: &Selector) -> Vec<Row> {
        table
            .select(row_selector)
            .filter(|row| {
                row.ancestors()
                    .find(|n| n.value().as_element().is_some_and(|e| e.name() == "table"))
                    .is_some_and(|t| t.id() == table.id())
            })
            .map(|row| {
                let cells: Vec<ElementRef> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| matches!(e.value().name(), "td" | "th"))
                    .collect();
                Row {
                    has_th: cells.iter().any(|c| c.value().name() == "th"),
                    cells: cells
                        .iter()
                        .map(|c| collapse_whitespace(&c.text().collect::<Vec<_>>().join(" ")))
                        .collect(),
                }
            })
            .filter(|row| !row.cells.is_empty())
            .collect()
    }

    /// Column roles, index of the first data row, and how the roles were found
    fn identify_columns(rows: &[Row], ctx: &Context) -> Option<(ColumnRoles, usize, &'static str)> {
        if let Some((header_index, mut roles)) = Self::find_header(rows) {
            let data_start = header_index + 1;
            if roles.number.is_none() {
                let first = rows[data_start..]
                    .iter()
                    .find(|r| Self::anchor_column(&r.cells, &roles, ctx).is_some())?;
                roles.number = Self::anchor_column(&first.cells, &roles, ctx);
            }
            return Some((roles, data_start, "header"));
        }

        let (index, row) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| Self::anchor_column(&r.cells, &ColumnRoles::default(), ctx).is_some())?;
        let roles = Self::sniff_content(&row.cells, ctx)?;
        Some((roles, index, "content"))
    }

    fn find_header(rows: &[Row]) -> Option<(usize, ColumnRoles)> {
        for (index, row) in rows.iter().enumerate() {
            let mut roles = ColumnRoles::default();
            for (column, cell) in row.cells.iter().enumerate() {
                if let Some(role) = header_role(cell) {
                    roles.assign(role, column);
                }
            }
            if (row.has_th && roles.count() >= 1) || roles.count() >= 2 {
                return Some((index, roles));
            }
        }
        None
    }

    fn anchor_column(cells: &[String], roles: &ColumnRoles, ctx: &Context) -> Option<usize> {
        cells
            .iter()
            .enumerate()
            .find(|(column, cell)| {
                !roles.is_assigned(*column) && anchor(cell, ctx.max_horse_number).is_some()
            })
            .map(|(column, _)| column)
    }

    /// Apply the anchor/window token rules per column of the first data row
    fn sniff_content(cells: &[String], ctx: &Context) -> Option<ColumnRoles> {
        let mut roles = ColumnRoles::default();
        let number = Self::anchor_column(cells, &roles, ctx)?;
        roles.number = Some(number);

        let mut integer_odds = None;
        for (column, cell) in cells.iter().enumerate().skip(number + 1) {
            if ctx.roster.match_jockey(cell).is_some() {
                roles.assign(FieldRole::Jockey, column);
                continue;
            }
            if ctx.roster.match_trainer(cell).is_some() {
                roles.assign(FieldRole::Trainer, column);
                continue;
            }
            match odds_token(cell) {
                Some(OddsToken::Decimal(_)) | Some(OddsToken::Scratched) => {
                    roles.assign(FieldRole::Odds, column);
                    continue;
                }
                Some(OddsToken::Integer(_)) => {
                    integer_odds.get_or_insert(column);
                    continue;
                }
                None => {}
            }
            let tokens = tokenize(cell);
            if !tokens.is_empty() && tokens.iter().all(|t| is_name_like(t)) {
                roles.assign(FieldRole::Name, column);
            }
        }

        if roles.odds.is_none() {
            roles.odds = integer_odds;
        }
        Some(roles)
    }

    fn parse_row(
        cells: &[String],
        roles: &ColumnRoles,
        ctx: &Context,
    ) -> Option<crate::types::HorseRecord> {
        let mut keyed = KeyedRecord::default();
        for (role, column) in roles.pairs() {
            let value = cells.get(column).map(String::as_str).unwrap_or_default();
            if !keyed.set(role, value, ctx.max_horse_number) {
                return None;
            }
        }
        keyed.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::types::WinOdds;

    fn parse(html: &str) -> Parsed {
        let roster = Roster::builtin();
        let ctx = Context::new(&roster, 24);
        TableSniffParser::parse(html, &ctx)
    }

    #[test]
    fn test_header_table() {
        let parsed = parse(
            "<table><tr><th>No.</th><th>Horse</th><th>Win</th></tr>\
             <tr><td>7</td><td>LUCKY STAR</td><td>9.5</td></tr></table>",
        );
        assert_eq!(parsed.rows.len(), 1);
        let record = &parsed.rows[0];
        assert_eq!(record.horse_number, 7);
        assert_eq!(record.horse_name.as_deref(), Some("LUCKY STAR"));
        assert_eq!(record.win_odds, WinOdds::Posted(9.5));
        assert!(parsed.notes[0].contains("header"));
    }

    #[test]
    fn test_header_with_all_roles() {
        let parsed = parse(
            r#"<table>
              <thead><tr>
                <th>馬號</th><th>馬名</th><th>檔位</th><th>騎師</th><th>練馬師</th><th>獨贏</th>
              </tr></thead>
              <tbody>
                <tr><td>1</td><td>浪漫勇士</td><td>3</td>
                    <td>麥道朗</td><td>沈集成</td><td>2.3</td></tr>
                <tr><td>2</td><td>金鎗六十</td><td>12</td>
                    <td>何澤堯</td><td>蔡約翰</td><td>SCR</td></tr>
              </tbody>
            </table>"#,
        );
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].draw, Some(3));
        // Header-identified columns keep names missing from the roster
        assert_eq!(parsed.rows[0].jockey.as_deref(), Some("麥道朗"));
        assert_eq!(parsed.rows[1].trainer.as_deref(), Some("蔡約翰"));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Scratched);
    }

    #[test]
    fn test_content_sniff_without_header() {
        let parsed = parse(
            "<table>\
             <tr><td colspan=3>第 1 場 賠率</td></tr>\
             <tr><td>4</td><td>好馬</td><td>潘頓</td><td>5.6</td></tr>\
             <tr><td>5</td><td>快馬</td><td>布文</td><td>12.0</td></tr>\
             </table>",
        );
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].jockey.as_deref(), Some("潘頓"));
        assert_eq!(parsed.rows[1].win_odds, WinOdds::Posted(12.0));
        assert!(parsed.notes[0].contains("content"));
    }

    #[test]
    fn test_rows_without_anchor_skipped() {
        let parsed = parse(
            "<table><tr><th>No.</th><th>Horse</th><th>Win</th></tr>\
             <tr><td>30</td><td>BAD</td><td>2.0</td></tr>\
             <tr><td>8</td><td>GOOD</td><td></td></tr></table>",
        );
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].horse_number, 8);
        assert_eq!(parsed.rows[0].win_odds, WinOdds::NotPosted);
    }

    #[test]
    fn test_nested_tables() {
        let parsed = parse(
            "<table><tr><td><table>\
             <tr><td>3</td><td>好馬</td><td>4.4</td></tr>\
             </table></td></tr></table>",
        );
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].horse_number, 3);
    }

    #[test]
    fn test_no_table() {
        let parsed = parse("<div>nothing</div>");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.notes, vec!["no <table> element".to_string()]);
    }
}
