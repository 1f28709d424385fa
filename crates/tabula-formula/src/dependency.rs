//! Dependency tracking for formula calculation

use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use tabula_core::{CellPosition, CellRange, SheetId};

/// A zone read by a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precedent {
    pub sheet: SheetId,
    pub range: CellRange,
}

impl Precedent {
    pub fn new(sheet: SheetId, range: CellRange) -> Self {
        Self { sheet, range }
    }

    pub fn contains(&self, cell: &CellPosition) -> bool {
        self.sheet == cell.sheet && self.range.contains(cell.row, cell.col)
    }

    fn is_single(&self) -> bool {
        self.range.cell_count() == 1
    }

    fn single_position(&self) -> CellPosition {
        CellPosition::new(self.sheet, self.range.left(), self.range.top())
    }
}

/// Dependency graph for formula cells
///
/// Single-cell reads are indexed per cell. Multi-cell reads are kept per reader and scanned,
/// which keeps large ranges (`A:A`-sized sums) from exploding the index.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Formula cell → zones it reads
    precedents: AHashMap<CellPosition, Vec<Precedent>>,
    /// Cell → formula cells reading it as a single cell
    dependents: AHashMap<CellPosition, AHashSet<CellPosition>>,
    /// Formula cells reading at least one multi-cell zone
    range_readers: AHashSet<CellPosition>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything `cell` reads
    pub fn set_precedents(&mut self, cell: CellPosition, precedents: Vec<Precedent>) {
        self.clear_dependencies(cell);
        if precedents.is_empty() {
            return;
        }
        for precedent in &precedents {
            if precedent.is_single() {
                self.dependents
                    .entry(precedent.single_position())
                    .or_default()
                    .insert(cell);
            } else {
                self.range_readers.insert(cell);
            }
        }
        self.precedents.insert(cell, precedents);
    }

    /// Forget what `cell` reads
    pub fn clear_dependencies(&mut self, cell: CellPosition) {
        let Some(precedents) = self.precedents.remove(&cell) else {
            return;
        };
        for precedent in precedents.iter().filter(|p| p.is_single()) {
            let key = precedent.single_position();
            if let Some(readers) = self.dependents.get_mut(&key) {
                readers.remove(&cell);
                if readers.is_empty() {
                    self.dependents.remove(&key);
                }
            }
        }
        self.range_readers.remove(&cell);
    }

    /// Zones read by `cell`
    pub fn get_precedents(&self, cell: CellPosition) -> &[Precedent] {
        self.precedents.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Formula cells reading `cell` directly
    pub fn get_dependents(&self, cell: CellPosition) -> Vec<CellPosition> {
        let mut result: Vec<CellPosition> = self
            .dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .collect();
        for reader in &self.range_readers {
            let reads = self.precedents.get(reader).map_or(false, |zones| {
                zones.iter().any(|p| !p.is_single() && p.contains(&cell))
            });
            if reads && !result.contains(reader) {
                result.push(*reader);
            }
        }
        result
    }

    /// Every formula cell whose value may change when the given cells change, excluding the
    /// changed cells themselves unless they sit on a cycle
    pub fn transitive_dependents(&self, changed: &[CellPosition]) -> AHashSet<CellPosition> {
        let mut seen = AHashSet::new();
        let mut queue: VecDeque<CellPosition> = changed.iter().copied().collect();
        while let Some(cell) = queue.pop_front() {
            for dependent in self.get_dependents(cell) {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        seen
    }

    /// Cells to recalculate after a change, precedents before dependents
    ///
    /// Cells on a cycle appear once, in an arbitrary position among themselves.
    pub fn get_recalc_order(&self, changed: &[CellPosition]) -> Vec<CellPosition> {
        let mut result = Vec::new();
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for &cell in changed {
            self.topological_sort(cell, &mut result, &mut visited, &mut in_stack);
        }

        result.reverse();
        result
    }

    /// Depth-first post-order over dependents
    fn topological_sort(
        &self,
        cell: CellPosition,
        result: &mut Vec<CellPosition>,
        visited: &mut AHashSet<CellPosition>,
        in_stack: &mut AHashSet<CellPosition>,
    ) {
        if visited.contains(&cell) || in_stack.contains(&cell) {
            return;
        }
        in_stack.insert(cell);
        for dependent in self.get_dependents(cell) {
            self.topological_sort(dependent, result, visited, in_stack);
        }
        in_stack.remove(&cell);
        visited.insert(cell);
        result.push(cell);
    }

    /// Whether `cell` can reach itself through the formulas it reads
    pub fn has_circular_reference(&self, cell: CellPosition) -> bool {
        self.transitive_dependents(&[cell]).contains(&cell)
    }

    /// Drop every formula located on `sheet`
    ///
    /// Formulas elsewhere that read `sheet` keep their entries until they are recompiled.
    pub fn remove_sheet(&mut self, sheet: SheetId) {
        let cells: Vec<CellPosition> = self
            .precedents
            .keys()
            .filter(|c| c.sheet == sheet)
            .copied()
            .collect();
        for cell in cells {
            self.clear_dependencies(cell);
        }
    }

    /// Number of formula cells tracked
    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.precedents.clear();
        self.dependents.clear();
        self.range_readers.clear();
    }
}
