//! Helpers for formula text as it is read from and written to the host grid.
//!
//! Formulas travel in display form (leading `'='`). The optimizer never evaluates
//! formulas; it only needs to recognize a handful of shapes and build new text.

use crate::address::{Column, MAX_ROWS};

/// Quote a sheet name for use in a cross-sheet reference (`'My Sheet'`).
///
/// Names are always quoted; embedded single quotes are doubled.
pub fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Shape of a single-range `SUM` formula.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SumForm {
    /// `=SUM(S5:S)`: the range runs to the bottom of the column.
    Open {
        start_column: Column,
        start_row: u32,
        end_column: Column,
    },
    /// `=SUM(S5:S169)`.
    Closed {
        start_column: Column,
        start_row: u32,
        end_column: Column,
        end_row: u32,
    },
    /// Anything that is not exactly one of the two forms above.
    Unrecognized,
}

impl SumForm {
    /// Explicit upper row bound, if the range has one.
    pub fn end_row(&self) -> Option<u32> {
        match self {
            SumForm::Closed { end_row, .. } => Some(*end_row),
            _ => None,
        }
    }

    /// Formula text bounding this range at `end_row`, or `None` for unrecognized formulas.
    pub fn closed_at(&self, end_row: u32) -> Option<String> {
        let (start_column, start_row, end_column) = match *self {
            SumForm::Open {
                start_column,
                start_row,
                end_column,
            }
            | SumForm::Closed {
                start_column,
                start_row,
                end_column,
                ..
            } => (start_column, start_row, end_column),
            SumForm::Unrecognized => return None,
        };
        Some(format!(
            "=SUM({start_column}{start_row}:{end_column}{end_row})"
        ))
    }
}

/// Classify formula text against the grammar
/// `'='? SUM '(' col row ':' col row? ')'`.
///
/// Whitespace around tokens is tolerated; the function name and column letters are
/// case-insensitive. The whole formula must match: `=SUM(S5:S)+1` is
/// [`SumForm::Unrecognized`], not an open range.
pub fn classify_sum(formula: &str) -> SumForm {
    parse_sum(formula).unwrap_or(SumForm::Unrecognized)
}

fn parse_sum(formula: &str) -> Option<SumForm> {
    let mut cur = Cursor::new(formula.trim());
    cur.eat(b'=');
    cur.skip_ws();
    cur.keyword("SUM")?;
    cur.skip_ws();
    cur.expect(b'(')?;
    cur.skip_ws();

    let start_column = cur.column()?;
    let start_row = cur.row()?;
    cur.skip_ws();
    cur.expect(b':')?;
    cur.skip_ws();
    let end_column = cur.column()?;
    let end_row = if cur.peek().is_some_and(|b| b.is_ascii_digit()) {
        Some(cur.row()?)
    } else {
        None
    };

    cur.skip_ws();
    cur.expect(b')')?;
    cur.skip_ws();
    if !cur.at_end() {
        return None;
    }

    Some(match end_row {
        Some(end_row) => SumForm::Closed {
            start_column,
            start_row,
            end_column,
            end_row,
        },
        None => SumForm::Open {
            start_column,
            start_row,
            end_column,
        },
    })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            bytes: src.as_bytes(),
            src,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> Option<()> {
        self.eat(b).then_some(())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn keyword(&mut self, word: &str) -> Option<()> {
        let end = self.pos + word.len();
        let candidate = self.bytes.get(self.pos..end)?;
        if !candidate.eq_ignore_ascii_case(word.as_bytes()) {
            return None;
        }
        self.pos = end;
        Some(())
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn column(&mut self) -> Option<Column> {
        let letters = self.take_while(|b| b.is_ascii_alphabetic());
        Column::from_letters(letters).ok()
    }

    fn row(&mut self) -> Option<u32> {
        let digits = self.take_while(|b| b.is_ascii_digit());
        let row: u32 = digits.parse().ok()?;
        (row >= 1 && row <= MAX_ROWS).then_some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_always_quoted() {
        assert_eq!(quote_sheet_name("Master"), "'Master'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
    }

    #[test]
    fn open_range_closes_at_end_row() {
        let form = classify_sum("=SUM(S5:S)");
        assert_eq!(form.end_row(), None);
        assert_eq!(form.closed_at(169).as_deref(), Some("=SUM(S5:S169)"));
    }

    #[test]
    fn closed_range_reports_its_end() {
        let form = classify_sum("=sum( aj170 : aj210 )");
        assert_eq!(form.end_row(), Some(210));
        assert_eq!(form.closed_at(200).as_deref(), Some("=SUM(AJ170:AJ200)"));
    }

    #[test]
    fn trailing_expressions_are_unrecognized() {
        assert_eq!(classify_sum("=SUM(S5:S)+1"), SumForm::Unrecognized);
        assert_eq!(classify_sum("=SUM(S5:S169,T5:T169)"), SumForm::Unrecognized);
        assert_eq!(classify_sum("=SUMIF(S5:S,\">0\")"), SumForm::Unrecognized);
        assert_eq!(classify_sum("=SUM(S:S)"), SumForm::Unrecognized);
        assert_eq!(classify_sum("=SUM(S0:S)"), SumForm::Unrecognized);
        assert_eq!(classify_sum(""), SumForm::Unrecognized);
        assert_eq!(SumForm::Unrecognized.closed_at(10), None);
    }
}
