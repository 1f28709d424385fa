//! Cell and range references as written in formulas

use lazy_regex::regex_is_match;
use std::fmt;
use tabula_core::{CellAddress, CellRange, MAX_COLS, MAX_ROWS};

/// A reference to one cell or a rectangular range, optionally on another sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Sheet name as written, `None` for the formula's own sheet
    pub sheet: Option<String>,
    /// Corners as written, not normalized
    pub start: CellAddress,
    pub end: CellAddress,
    /// Written as a single cell (`A1`) rather than a range (`A1:B2`)
    pub single: bool,
}

impl Reference {
    /// Parse `A1`, `$A$1:B2`, `Sheet2!A1` or `'My sheet'!A1:C3`
    ///
    /// # Examples
    /// ```
    /// use tabula_formula::Reference;
    ///
    /// let r = Reference::parse("'Q1 data'!$B2:C4").unwrap();
    /// assert_eq!(r.sheet.as_deref(), Some("Q1 data"));
    /// assert_eq!(r.to_string(), "'Q1 data'!$B2:C4");
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let (sheet, local) = split_sheet(text)?;
        match local.split_once(':') {
            Some((start, end)) => Some(Self {
                sheet,
                start: CellAddress::parse(start).ok()?,
                end: CellAddress::parse(end).ok()?,
                single: false,
            }),
            None => Some(Self::cell(sheet, CellAddress::parse(local).ok()?)),
        }
    }

    /// A reference to a single cell
    pub fn cell(sheet: Option<String>, address: CellAddress) -> Self {
        Self {
            sheet,
            start: address,
            end: address,
            single: true,
        }
    }

    /// The covered zone, top-left to bottom-right
    pub fn range(&self) -> CellRange {
        CellRange::new(self.start, self.end)
    }

    /// Shift the relative coordinates; `None` when the result leaves the grid
    pub fn translated(&self, dcol: i64, drow: i64) -> Option<Self> {
        Some(Self {
            sheet: self.sheet.clone(),
            start: shift(&self.start, dcol, drow)?,
            end: shift(&self.end, dcol, drow)?,
            single: self.single,
        })
    }

    /// Whether this reference points at `sheet` (case-insensitive)
    pub fn is_on_sheet(&self, sheet: &str) -> bool {
        self.sheet
            .as_deref()
            .map_or(false, |s| s.eq_ignore_ascii_case(sheet))
    }
}

fn shift(address: &CellAddress, dcol: i64, drow: i64) -> Option<CellAddress> {
    let col = if address.col_absolute {
        address.col as i64
    } else {
        address.col as i64 + dcol
    };
    let row = if address.row_absolute {
        address.row as i64
    } else {
        address.row as i64 + drow
    };
    if col < 0 || col >= MAX_COLS as i64 || row < 0 || row >= MAX_ROWS as i64 {
        return None;
    }
    Some(CellAddress::with_absolute(
        row as u32,
        col as u16,
        address.row_absolute,
        address.col_absolute,
    ))
}

/// Split an optional `sheet!` prefix off a reference
fn split_sheet(text: &str) -> Option<(Option<String>, &str)> {
    if let Some(quoted) = text.strip_prefix('\'') {
        let bang = quoted.rfind("'!")?;
        let name = quoted[..bang].replace("''", "'");
        return Some((Some(name), &quoted[bang + 2..]));
    }
    match text.rsplit_once('!') {
        Some((sheet, local)) if !sheet.is_empty() => Some((Some(sheet.to_string()), local)),
        Some(_) => None,
        None => Some((None, text)),
    }
}

/// Sheet name as it must appear in a formula, quoted when it holds anything but word characters
pub fn quote_sheet_name(name: &str) -> String {
    if regex_is_match!(r"^[A-Za-z_]\w*$", name) {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", quote_sheet_name(sheet))?;
        }
        if self.single {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_forms() {
        let r = Reference::parse("B3").unwrap();
        assert!(r.single && r.sheet.is_none());
        assert_eq!((r.start.row, r.start.col), (2, 1));

        let r = Reference::parse("Sheet2!$A$1:B2").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Sheet2"));
        assert!(r.start.row_absolute && r.start.col_absolute);
        assert!(!r.single);

        let r = Reference::parse("'It''s here'!C1").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("It's here"));
        assert_eq!(r.to_string(), "'It''s here'!C1");

        assert!(Reference::parse("A0").is_none());
        assert!(Reference::parse("!A1").is_none());
        assert!(Reference::parse("XFE1").is_none());
    }

    #[test]
    fn test_translation_keeps_absolute_parts() {
        let r = Reference::parse("$A1:B$2").unwrap();
        let moved = r.translated(2, 3).unwrap();
        assert_eq!(moved.to_string(), "$A4:D$2");
        assert_eq!((moved.range().top(), moved.range().bottom()), (1, 3));
        assert_eq!(Reference::parse("A1").unwrap().translated(-1, 0), None);
        assert_eq!(
            Reference::parse("$A$1").unwrap().translated(-5, -5).map(|r| r.to_string()),
            Some("$A$1".to_string())
        );
    }
}
