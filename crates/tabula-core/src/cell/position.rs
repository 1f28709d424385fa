//! Sheet-qualified cell positions

use std::fmt;

/// Stable identifier of a sheet; survives renames and reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetId(pub u32);

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet#{}", self.0)
    }
}

/// Stable identifier of a stored cell, unique within a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId(pub u64);

/// A cell location: sheet, column and row (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellPosition {
    /// Owning sheet
    pub sheet: SheetId,
    /// Column index
    pub col: u16,
    /// Row index
    pub row: u32,
}

impl CellPosition {
    /// Create a new position
    pub fn new(sheet: SheetId, col: u16, row: u32) -> Self {
        Self { sheet, col, row }
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}",
            self.sheet,
            crate::CellAddress::new(self.row, self.col)
        )
    }
}
