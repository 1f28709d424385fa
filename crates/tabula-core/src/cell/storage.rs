//! Sparse cell storage
//!
//! Only occupied positions are stored, using a row-based BTreeMap structure.

use std::collections::BTreeMap;

/// Sparse row-based storage for the cells of one sheet
///
/// Structure: `BTreeMap<row_index, BTreeMap<col_index, C>>`. Rows that become empty are
/// dropped so iteration stays proportional to the number of stored cells.
#[derive(Debug, Clone)]
pub struct CellStorage<C> {
    rows: BTreeMap<u32, BTreeMap<u16, C>>,
}

impl<C> CellStorage<C> {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&C> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut C> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Store a cell, returning the previous occupant
    pub fn set(&mut self, row: u32, col: u16, cell: C) -> Option<C> {
        self.rows.entry(row).or_default().insert(col, cell)
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<C> {
        let row_map = self.rows.get_mut(&row)?;
        let removed = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        removed
    }

    /// Clear all cells
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the bounds of used cells
    ///
    /// Returns (min_row, min_col, max_row, max_col) or None if empty
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;
        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        for row_data in self.rows.values() {
            if let Some(&col) = row_data.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = row_data.keys().next_back() {
                max_col = max_col.max(col);
            }
        }
        Some((min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &C)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, data)| (row, col, data)))
    }

    /// Iterate over cells in a specific row
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &C)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&col, data)| (col, data)))
    }
}

impl<C> Default for CellStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut storage = CellStorage::new();
        assert!(storage.is_empty());
        storage.set(2, 3, "x");
        assert_eq!(storage.get(2, 3), Some(&"x"));
        assert_eq!(storage.set(2, 3, "y"), Some("x"));
        assert_eq!(storage.cell_count(), 1);
        assert_eq!(storage.remove(2, 3), Some("y"));
        assert!(storage.is_empty());
        assert_eq!(storage.remove(2, 3), None);
    }

    #[test]
    fn test_used_bounds() {
        let mut storage = CellStorage::new();
        assert_eq!(storage.used_bounds(), None);
        storage.set(4, 1, 1);
        storage.set(0, 7, 2);
        assert_eq!(storage.used_bounds(), Some((0, 1, 4, 7)));
    }

    #[test]
    fn test_iter_row_order() {
        let mut storage = CellStorage::new();
        storage.set(1, 0, 'b');
        storage.set(0, 1, 'a');
        storage.set(1, 2, 'c');
        let cells: Vec<_> = storage.iter().map(|(r, c, v)| (r, c, *v)).collect();
        assert_eq!(cells, vec![(0, 1, 'a'), (1, 0, 'b'), (1, 2, 'c')]);
        assert_eq!(storage.iter_row(1).count(), 2);
    }
}
