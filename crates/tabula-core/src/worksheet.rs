//! Worksheet type

use crate::cell::{CellStorage, SheetId};

/// Default number of rows of a new sheet
pub const DEFAULT_ROWS: u32 = 100;

/// Default number of columns of a new sheet
pub const DEFAULT_COLS: u16 = 26;

/// A worksheet: a named, identified grid of sparse cells
///
/// The cell payload `C` is chosen by the engine; the core only stores and moves it.
#[derive(Debug, Clone)]
pub struct Worksheet<C> {
    id: SheetId,
    name: String,
    /// Sparse cell storage
    pub cells: CellStorage<C>,
    /// Number of rows currently displayed
    pub num_rows: u32,
    /// Number of columns currently displayed
    pub num_cols: u16,
}

impl<C> Worksheet<C> {
    /// Create a new empty worksheet
    pub fn new(id: SheetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            cells: CellStorage::new(),
            num_rows: DEFAULT_ROWS,
            num_cols: DEFAULT_COLS,
        }
    }

    /// Stable id of the sheet
    pub fn id(&self) -> SheetId {
        self.id
    }

    /// Get the worksheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the worksheet name (validation is done by the owning workbook)
    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Grow the displayed grid so that `(row, col)` is visible
    pub fn ensure_size(&mut self, row: u32, col: u16) {
        self.num_rows = self.num_rows.max(row.saturating_add(1));
        self.num_cols = self.num_cols.max(col.saturating_add(1));
    }
}
