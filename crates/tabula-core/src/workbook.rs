//! Workbook type - the sheet container

use crate::cell::SheetId;
use crate::error::{Error, Result};
use crate::style::StylePool;
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// Characters a sheet name cannot contain
pub const FORBIDDEN_SHEET_CHARS: &[char] = &['\'', '*', '?', '/', '\\', '[', ']'];

/// A workbook: ordered sheets with stable ids plus the shared style pool
#[derive(Debug, Clone)]
pub struct Workbook<C> {
    sheets: Vec<Worksheet<C>>,
    next_sheet_id: u32,
    /// Styles shared by every sheet
    pub styles: StylePool,
}

impl<C> Workbook<C> {
    /// Create a workbook with no sheets
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            next_sheet_id: 1,
            styles: StylePool::new(),
        }
    }

    /// Create a workbook holding one empty `Sheet1`
    pub fn with_default_sheet() -> Self {
        Self {
            sheets: vec![Worksheet::new(SheetId(1), "Sheet1")],
            next_sheet_id: 2,
            styles: StylePool::new(),
        }
    }

    /// Get the number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Ids of all sheets, in display order
    pub fn sheet_ids(&self) -> Vec<SheetId> {
        self.sheets.iter().map(|s| s.id()).collect()
    }

    /// Iterate over all sheets in display order
    pub fn sheets(&self) -> impl Iterator<Item = &Worksheet<C>> {
        self.sheets.iter()
    }

    /// Get a sheet by id
    pub fn sheet(&self, id: SheetId) -> Option<&Worksheet<C>> {
        self.sheets.iter().find(|s| s.id() == id)
    }

    /// Get a mutable sheet by id
    pub fn sheet_mut(&mut self, id: SheetId) -> Option<&mut Worksheet<C>> {
        self.sheets.iter_mut().find(|s| s.id() == id)
    }

    /// Find a sheet id by name (case-insensitive)
    pub fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        let lower = name.to_lowercase();
        self.sheets
            .iter()
            .find(|s| s.name().to_lowercase() == lower)
            .map(|s| s.id())
    }

    /// Get a sheet name
    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.sheet(id).map(|s| s.name())
    }

    /// Add a sheet at `position` (or at the end), returning its id
    pub fn add_sheet(&mut self, name: &str, position: Option<usize>) -> Result<SheetId> {
        self.validate_sheet_name(name, None)?;
        let id = SheetId(self.next_sheet_id);
        self.next_sheet_id += 1;
        let index = position.unwrap_or(self.sheets.len()).min(self.sheets.len());
        self.sheets.insert(index, Worksheet::new(id, name));
        Ok(id)
    }

    /// Rename a sheet
    pub fn rename_sheet(&mut self, id: SheetId, new_name: &str) -> Result<()> {
        self.validate_sheet_name(new_name, Some(id))?;
        let sheet = self
            .sheet_mut(id)
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))?;
        sheet.set_name(new_name);
        Ok(())
    }

    /// Remove a sheet; the last sheet cannot be removed
    pub fn remove_sheet(&mut self, id: SheetId) -> Result<Worksheet<C>> {
        let index = self
            .sheets
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))?;
        if self.sheets.len() == 1 {
            return Err(Error::LastSheet);
        }
        Ok(self.sheets.remove(index))
    }

    /// Check a sheet name, optionally ignoring one sheet in the duplicate check
    pub fn validate_sheet_name(&self, name: &str, exclude: Option<SheetId>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }
        if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        let lower = name.to_lowercase();
        if self
            .sheets
            .iter()
            .any(|s| Some(s.id()) != exclude && s.name().to_lowercase() == lower)
        {
            return Err(Error::DuplicateSheetName(name.into()));
        }
        Ok(())
    }

    /// Generate an unused "SheetN" name
    pub fn next_sheet_name(&self) -> String {
        let mut n = self.sheets.len() + 1;
        loop {
            let name = format!("Sheet{}", n);
            if self.sheet_id_by_name(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }
}

impl<C> Default for Workbook<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup_sheets() {
        let mut wb: Workbook<()> = Workbook::new();
        let first = wb.add_sheet("Sheet1", None).unwrap();
        let second = wb.add_sheet("Data", Some(0)).unwrap();
        assert_ne!(first, second);
        assert_eq!(wb.sheet_ids(), vec![second, first]);
        assert_eq!(wb.sheet_id_by_name("data"), Some(second));
        assert_eq!(wb.sheet_name(first), Some("Sheet1"));
        assert_eq!(wb.next_sheet_name(), "Sheet3");
    }

    #[test]
    fn test_default_sheet_ids_do_not_collide() {
        let mut wb: Workbook<()> = Workbook::with_default_sheet();
        let added = wb.add_sheet("Data", None).unwrap();
        assert_eq!(wb.sheet_ids(), vec![SheetId(1), added]);
        assert_ne!(added, SheetId(1));
    }

    #[test]
    fn test_sheet_name_validation() {
        let mut wb: Workbook<()> = Workbook::new();
        wb.add_sheet("Data", None).unwrap();
        assert!(matches!(wb.add_sheet("DATA", None), Err(Error::DuplicateSheetName(_))));
        assert!(matches!(wb.add_sheet("", None), Err(Error::InvalidSheetName(_))));
        assert!(matches!(wb.add_sheet("a/b", None), Err(Error::InvalidSheetName(_))));
        assert!(wb.add_sheet("My Sheet", None).is_ok());
    }

    #[test]
    fn test_rename_sheet() {
        let mut wb: Workbook<()> = Workbook::new();
        let data = wb.add_sheet("Data", None).unwrap();
        let other = wb.add_sheet("Other", None).unwrap();
        // Renaming to its own name with a different case is allowed
        wb.rename_sheet(data, "DATA").unwrap();
        assert_eq!(wb.sheet_name(data), Some("DATA"));
        assert!(wb.rename_sheet(other, "data").is_err());
    }

    #[test]
    fn test_cannot_remove_last_sheet() {
        let mut wb: Workbook<()> = Workbook::new();
        let a = wb.add_sheet("A", None).unwrap();
        let b = wb.add_sheet("B", None).unwrap();
        wb.remove_sheet(a).unwrap();
        assert_eq!(wb.remove_sheet(b).unwrap_err(), Error::LastSheet);
        assert_eq!(wb.sheet_count(), 1);
    }
}
