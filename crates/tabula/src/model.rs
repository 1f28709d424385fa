//! The spreadsheet model: cells, commands, and the recalculation pipeline

use crate::calculation::{self, CalculationStats};
use crate::cell::{Cell, EvaluatedCell};
use crate::command::{CancelledReason, Command, CommandResult, SortDirection, SortOptions};
use crate::config::ModelConfig;
use crate::sort;
use ahash::{AHashMap, AHashSet};
use std::fmt;
use tabula_core::format::change_decimal_places;
use tabula_core::{
    CellAddress, CellId, CellPosition, CellRange, Error as CoreError, Locale, SheetId, Style, Workbook, MAX_COLS,
    MAX_ROWS,
};
use tabula_formula::{Arg, CompiledFormula, DependencyGraph, Precedent, Value};

/// Which formula cells a recalculation pass covers
enum Scope {
    All,
    /// The given cells and everything that transitively reads them
    From(Vec<CellPosition>),
}

/// A workbook of cells with their evaluated values
///
/// Every mutation goes through [`Model::dispatch`], which validates the command, applies it and
/// recomputes the affected formulas before returning.
///
/// # Example
///
/// ```rust
/// use tabula::{Command, Model, Value};
///
/// let mut model = Model::default();
/// let sheet = model.get_sheet_ids()[0];
/// model.dispatch(Command::update_content(sheet, 0, 0, "2"));
/// model.dispatch(Command::update_content(sheet, 1, 0, "=A1*21"));
/// assert_eq!(model.evaluated_at(sheet, "B1").map(|c| c.value), Some(Value::Number(42.0)));
/// ```
pub struct Model {
    config: ModelConfig,
    workbook: Workbook<Cell>,
    graph: DependencyGraph,
    /// Last computed value of every formula cell
    evaluated: AHashMap<CellPosition, Arg>,
    positions: AHashMap<CellId, CellPosition>,
    next_cell_id: u64,
    last_stats: CalculationStats,
    evaluation_count: u64,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("config", &self.config)
            .field("sheets", &self.workbook.sheet_count())
            .field("formulas", &self.evaluated.len())
            .field("evaluation_count", &self.evaluation_count)
            .finish_non_exhaustive()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl Model {
    /// Create a model with a single empty sheet
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            workbook: Workbook::with_default_sheet(),
            graph: DependencyGraph::new(),
            evaluated: AHashMap::new(),
            positions: AHashMap::new(),
            next_cell_id: 1,
            last_stats: CalculationStats::default(),
            evaluation_count: 0,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn locale(&self) -> &Locale {
        &self.config.locale
    }

    /// Validate and apply a command
    pub fn dispatch(&mut self, command: Command) -> CommandResult {
        if let Err(reason) = self.check(&command) {
            log::debug!("{} cancelled: {}", command.name(), reason);
            return CommandResult::Cancelled(reason);
        }
        log::trace!("applying {}", command.name());
        self.handle(command);
        CommandResult::Success
    }

    /// Create a sheet, returning its id
    pub fn create_sheet(&mut self, name: &str, position: usize) -> Result<SheetId, CancelledReason> {
        let command = Command::CreateSheet {
            name: Some(name.to_string()),
            position,
        };
        match self.dispatch(command) {
            CommandResult::Success => self.workbook.sheet_id_by_name(name).ok_or(CancelledReason::InvalidSheet),
            CommandResult::Cancelled(reason) => Err(reason),
        }
    }

    /// Set a cell's content by A1 address
    pub fn update_cell_at(&mut self, sheet: SheetId, address: &str, content: &str) -> CommandResult {
        match CellAddress::parse(address) {
            Ok(addr) => self.dispatch(Command::update_content(sheet, addr.col, addr.row, content)),
            Err(_) => CommandResult::Cancelled(CancelledReason::InvalidZone),
        }
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    fn check(&self, command: &Command) -> Result<(), CancelledReason> {
        match command {
            Command::UpdateCell {
                sheet,
                col,
                row,
                content,
                style,
                format,
            } => {
                self.check_sheet(*sheet)?;
                check_zone(&CellRange::from_indices(*row, *col, *row, *col))?;
                if content.is_none() && style.is_none() && format.is_none() {
                    return Err(CancelledReason::NoChange);
                }
                Ok(())
            }
            Command::SetDecimal { sheet, zones, step } => {
                self.check_zones(*sheet, zones)?;
                if *step == 0 {
                    return Err(CancelledReason::NoChange);
                }
                Ok(())
            }
            Command::SetFormatting {
                sheet,
                zones,
                style,
                format,
            } => {
                self.check_zones(*sheet, zones)?;
                if style.is_none() && format.is_none() {
                    return Err(CancelledReason::NoChange);
                }
                Ok(())
            }
            Command::ClearFormatting { sheet, zones } => self.check_zones(*sheet, zones),
            Command::SortCells {
                sheet,
                anchor_col,
                anchor_row,
                zone,
                ..
            } => {
                self.check_sheet(*sheet)?;
                check_zone(zone)?;
                if !zone.contains(*anchor_row, *anchor_col) {
                    return Err(CancelledReason::InvalidAnchor);
                }
                if zone.row_count() < 2 {
                    return Err(CancelledReason::InvalidSortZone);
                }
                Ok(())
            }
            Command::CreateSheet { name, .. } => match name {
                Some(name) => self.workbook.validate_sheet_name(name, None).map_err(name_error),
                None => Ok(()),
            },
            Command::RenameSheet { sheet, name } => {
                let current = self.workbook.sheet_name(*sheet).ok_or(CancelledReason::InvalidSheet)?;
                if current == name {
                    return Err(CancelledReason::NoChange);
                }
                self.workbook.validate_sheet_name(name, Some(*sheet)).map_err(name_error)
            }
            Command::DeleteSheet { sheet } => {
                self.check_sheet(*sheet)?;
                if self.workbook.sheet_count() < 2 {
                    return Err(CancelledReason::NotEnoughSheets);
                }
                Ok(())
            }
            Command::UpdateLocale { locale } => {
                if !locale.is_valid() {
                    return Err(CancelledReason::InvalidLocale);
                }
                if *locale == self.config.locale {
                    return Err(CancelledReason::NoChange);
                }
                Ok(())
            }
        }
    }

    fn check_sheet(&self, sheet: SheetId) -> Result<(), CancelledReason> {
        self.workbook
            .sheet(sheet)
            .map(|_| ())
            .ok_or(CancelledReason::InvalidSheet)
    }

    fn check_zones(&self, sheet: SheetId, zones: &[CellRange]) -> Result<(), CancelledReason> {
        self.check_sheet(sheet)?;
        if zones.is_empty() {
            return Err(CancelledReason::EmptyTarget);
        }
        zones.iter().try_for_each(check_zone)
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    fn handle(&mut self, command: Command) {
        match command {
            Command::UpdateCell {
                sheet,
                col,
                row,
                content,
                style,
                format,
            } => {
                let position = CellPosition::new(sheet, col, row);
                self.apply_cell_update(position, content.as_deref(), style, format);
                self.recompute(Scope::From(vec![position]));
            }
            Command::SetDecimal { sheet, zones, step } => self.set_decimal(sheet, &zones, step),
            Command::SetFormatting {
                sheet,
                zones,
                style,
                format,
            } => {
                let mut changed = Vec::new();
                for zone in &zones {
                    for (row, col) in zone.cells() {
                        let position = CellPosition::new(sheet, col, row);
                        self.apply_cell_update(position, None, style.clone(), format.clone());
                        changed.push(position);
                    }
                }
                self.recompute(Scope::From(changed));
            }
            Command::ClearFormatting { sheet, zones } => {
                let changed = self.cells_in_zones(sheet, &zones);
                for &position in &changed {
                    self.apply_cell_update(position, None, Some(Style::default()), Some(String::new()));
                }
                self.recompute(Scope::From(changed));
            }
            Command::SortCells {
                sheet,
                anchor_col,
                zone,
                direction,
                options,
                ..
            } => self.sort_cells(sheet, anchor_col, zone, direction, options),
            Command::CreateSheet { name, position } => {
                let name = name.unwrap_or_else(|| self.workbook.next_sheet_name());
                match self.workbook.add_sheet(&name, Some(position)) {
                    Ok(id) => log::debug!("created sheet {} ({})", name, id),
                    Err(e) => log::warn!("sheet {:?} was not created: {}", name, e),
                }
                // Formulas that named the sheet before it existed now resolve
                self.rebuild_dependencies();
                self.recompute(Scope::All);
            }
            Command::RenameSheet { sheet, name } => self.rename_sheet(sheet, &name),
            Command::DeleteSheet { sheet } => self.delete_sheet(sheet),
            Command::UpdateLocale { locale } => {
                self.config.locale = locale;
                self.recompute(Scope::All);
            }
        }
    }

    /// Write the parts of a cell that are `Some`; does not recompute
    fn apply_cell_update(
        &mut self,
        position: CellPosition,
        content: Option<&str>,
        style: Option<Style>,
        format: Option<String>,
    ) {
        let style = style.map(|s| match s.is_default() {
            true => None,
            false => Some(self.workbook.styles.get_or_insert(s)),
        });
        let locale = self.config.locale.clone();
        let Some(sheet) = self.workbook.sheet_mut(position.sheet) else {
            return;
        };

        let mut cell = match sheet.cells.remove(position.row, position.col) {
            Some(cell) => cell,
            None => {
                let id = CellId(self.next_cell_id);
                self.next_cell_id += 1;
                Cell::new(id, "", &locale)
            }
        };
        if let Some(content) = content {
            let (id, style, format) = (cell.id, cell.style, cell.format.take());
            cell = Cell::new(id, content, &locale);
            cell.style = style;
            cell.format = format;
        }
        if let Some(style) = style {
            cell.style = style;
        }
        if let Some(format) = format {
            cell.format = (!format.is_empty()).then_some(format);
        }

        if cell.is_blank() {
            self.positions.remove(&cell.id);
        } else {
            self.positions.insert(cell.id, position);
            sheet.ensure_size(position.row, position.col);
            sheet.cells.set(position.row, position.col, cell);
        }
        self.register_formula(position);
    }

    /// Refresh the precedents of the cell at `position`
    fn register_formula(&mut self, position: CellPosition) {
        let Some(formula) = self.cell(position).and_then(Cell::formula) else {
            self.graph.clear_dependencies(position);
            self.evaluated.remove(&position);
            return;
        };
        let precedents = formula
            .dependencies()
            .filter_map(|reference| {
                let sheet = match &reference.sheet {
                    Some(name) => self.workbook.sheet_id_by_name(name)?,
                    None => position.sheet,
                };
                Some(Precedent::new(sheet, reference.range()))
            })
            .collect();
        self.graph.set_precedents(position, precedents);
    }

    fn rebuild_dependencies(&mut self) {
        self.graph.clear();
        for position in self.formula_positions() {
            self.register_formula(position);
        }
    }

    fn formula_positions(&self) -> Vec<CellPosition> {
        self.workbook
            .sheets()
            .flat_map(|sheet| {
                sheet
                    .cells
                    .iter()
                    .filter(|(_, _, cell)| cell.formula().is_some())
                    .map(move |(row, col, _)| CellPosition::new(sheet.id(), col, row))
            })
            .collect()
    }

    /// Existing cells of `sheet` inside any of `zones`
    fn cells_in_zones(&self, sheet: SheetId, zones: &[CellRange]) -> Vec<CellPosition> {
        let Some(worksheet) = self.workbook.sheet(sheet) else {
            return Vec::new();
        };
        let mut positions: Vec<CellPosition> = worksheet
            .cells
            .iter()
            .filter(|(row, col, _)| zones.iter().any(|z| z.contains(*row, *col)))
            .map(|(row, col, _)| CellPosition::new(sheet, col, row))
            .collect();
        positions.sort();
        positions
    }

    fn recompute(&mut self, scope: Scope) {
        let pending: AHashSet<CellPosition> = match scope {
            Scope::All => {
                self.evaluated.clear();
                self.formula_positions().into_iter().collect()
            }
            Scope::From(changed) => {
                let mut pending = self.graph.transitive_dependents(&changed);
                for position in changed {
                    if self.cell(position).and_then(Cell::formula).is_some() {
                        pending.insert(position);
                    } else {
                        self.evaluated.remove(&position);
                    }
                }
                pending
            }
        };
        if pending.is_empty() {
            return;
        }

        let now = self.config.current_time();
        let stats = calculation::recalculate(
            &self.workbook,
            &self.config.locale,
            now,
            &mut self.evaluated,
            pending,
            &self.config.calculation,
        );
        self.evaluation_count += stats.cells_evaluated as u64;
        self.last_stats = stats;
    }

    fn set_decimal(&mut self, sheet: SheetId, zones: &[CellRange], step: i32) {
        let mut changed = Vec::new();
        for position in self.cells_in_zones(sheet, zones) {
            let evaluated = self.get_evaluated_cell(position);
            let Value::Number(value) = evaluated.value else {
                continue;
            };
            if let Some(format) = change_decimal_places(evaluated.format.as_deref(), value, step) {
                self.apply_cell_update(position, None, None, Some(format));
                changed.push(position);
            }
        }
        self.recompute(Scope::From(changed));
    }

    fn sort_cells(
        &mut self,
        sheet: SheetId,
        anchor_col: u16,
        zone: CellRange,
        direction: SortDirection,
        options: SortOptions,
    ) {
        let columns: Vec<Vec<EvaluatedCell>> = (zone.left()..=zone.right())
            .map(|col| {
                (zone.top()..=zone.bottom())
                    .map(|row| self.get_evaluated_cell(CellPosition::new(sheet, col, row)))
                    .collect()
            })
            .collect();
        let skip = usize::from(!options.sort_headers && sort::has_header(&columns));
        let Some(keys) = columns.get(usize::from(anchor_col - zone.left())) else {
            return;
        };
        let order = sort::sort_order(&keys[skip..], direction, options);
        let top = zone.top() + skip as u32;
        log::debug!("sorting {} rows of {} on column {}", order.len(), zone, anchor_col);

        let Some(worksheet) = self.workbook.sheet_mut(sheet) else {
            return;
        };
        for col in zone.left()..=zone.right() {
            let mut taken: Vec<Option<Cell>> = (0..order.len())
                .map(|i| worksheet.cells.remove(top + i as u32, col))
                .collect();
            for (target, &source) in order.iter().enumerate() {
                let Some(mut cell) = taken.get_mut(source).and_then(Option::take) else {
                    continue;
                };
                let row = top + target as u32;
                if let Some(formula) = cell.formula() {
                    let moved = formula.translate(0, target as i64 - source as i64);
                    cell.set_formula(moved);
                }
                self.positions.insert(cell.id, CellPosition::new(sheet, col, row));
                worksheet.cells.set(row, col, cell);
            }
        }

        let changed: Vec<CellPosition> = zone
            .cells()
            .filter(|(row, _)| *row >= top)
            .map(|(row, col)| CellPosition::new(sheet, col, row))
            .collect();
        for &position in &changed {
            self.register_formula(position);
        }
        self.recompute(Scope::From(changed));
    }

    fn rename_sheet(&mut self, sheet: SheetId, name: &str) {
        let Some(old) = self.workbook.sheet_name(sheet).map(str::to_string) else {
            return;
        };
        if let Err(e) = self.workbook.rename_sheet(sheet, name) {
            log::warn!("sheet {:?} was not renamed: {}", old, e);
            return;
        }
        self.rewrite_formulas(|formula| formula.rename_sheet(&old, name));
        self.rebuild_dependencies();
        self.recompute(Scope::All);
    }

    fn delete_sheet(&mut self, sheet: SheetId) {
        let Some(name) = self.workbook.sheet_name(sheet).map(str::to_string) else {
            return;
        };
        match self.workbook.remove_sheet(sheet) {
            Ok(removed) => {
                for (_, _, cell) in removed.cells.iter() {
                    self.positions.remove(&cell.id);
                }
            }
            Err(e) => {
                log::warn!("sheet {:?} was not deleted: {}", name, e);
                return;
            }
        }
        self.rewrite_formulas(|formula| formula.invalidate_sheet(&name));
        self.graph.remove_sheet(sheet);
        self.rebuild_dependencies();
        self.recompute(Scope::All);
    }

    /// Replace every formula for which `rewrite` returns a new version
    fn rewrite_formulas(&mut self, rewrite: impl Fn(&CompiledFormula) -> Option<CompiledFormula>) {
        for id in self.workbook.sheet_ids() {
            let Some(worksheet) = self.workbook.sheet_mut(id) else {
                continue;
            };
            let rewritten: Vec<(u32, u16, CompiledFormula)> = worksheet
                .cells
                .iter()
                .filter_map(|(row, col, cell)| Some((row, col, rewrite(cell.formula()?)?)))
                .collect();
            for (row, col, formula) in rewritten {
                if let Some(cell) = worksheet.cells.get_mut(row, col) {
                    cell.set_formula(formula);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    fn cell(&self, position: CellPosition) -> Option<&Cell> {
        self.workbook
            .sheet(position.sheet)
            .and_then(|s| s.cells.get(position.row, position.col))
    }

    pub fn get_cell(&self, position: CellPosition) -> Option<&Cell> {
        self.cell(position)
    }

    /// The evaluated value of a cell; empty positions give an empty cell
    pub fn get_evaluated_cell(&self, position: CellPosition) -> EvaluatedCell {
        let Some(cell) = self.cell(position) else {
            return EvaluatedCell::empty();
        };
        let arg = match cell.formula() {
            Some(_) => self.evaluated.get(&position).cloned().unwrap_or_default(),
            None => cell.static_value(),
        };
        EvaluatedCell::from_arg(arg, &self.config.locale)
    }

    /// Evaluated cells of a zone, column by column
    pub fn get_evaluated_cells_in_zone(&self, sheet: SheetId, zone: &CellRange) -> Vec<EvaluatedCell> {
        zone.cells()
            .map(|(row, col)| self.get_evaluated_cell(CellPosition::new(sheet, col, row)))
            .collect()
    }

    /// Display text of a cell, or its raw formula when `show_formula` is set
    pub fn get_cell_text(&self, position: CellPosition, show_formula: bool) -> String {
        match self.cell(position) {
            Some(cell) if show_formula && cell.is_formula() => cell.content.clone(),
            Some(_) => self.get_evaluated_cell(position).formatted_value,
            None => String::new(),
        }
    }

    pub fn get_cell_formatted_value(&self, position: CellPosition) -> String {
        self.get_evaluated_cell(position).formatted_value
    }

    /// Where the cell with `id` currently lives
    pub fn get_cell_position(&self, id: CellId) -> Option<CellPosition> {
        self.positions.get(&id).copied()
    }

    /// Text of `formula` moved by `(dcol, drow)`; `None` when `sheet` does not exist
    pub fn get_translated_cell_formula(
        &self,
        sheet: SheetId,
        dcol: i64,
        drow: i64,
        formula: &CompiledFormula,
    ) -> Option<String> {
        self.workbook.sheet(sheet)?;
        Some(formula.translate(dcol, drow).to_formula_string())
    }

    pub fn get_sheet_ids(&self) -> Vec<SheetId> {
        self.workbook.sheet_ids()
    }

    pub fn get_sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.workbook.sheet_name(sheet)
    }

    pub fn get_sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.workbook.sheet_id_by_name(name)
    }

    /// Positions of every stored cell of `sheet`, in no particular order
    pub fn cell_positions(&self, sheet: SheetId) -> Vec<CellPosition> {
        self.workbook.sheet(sheet).map_or_else(Vec::new, |s| {
            s.cells
                .iter()
                .map(|(row, col, _)| CellPosition::new(sheet, col, row))
                .collect()
        })
    }

    /// Resolved style of a cell
    pub fn get_cell_style(&self, position: CellPosition) -> Option<&Style> {
        self.cell(position)
            .and_then(|c| c.style)
            .and_then(|id| self.workbook.styles.get(id))
    }

    /// Evaluated cell by A1 address
    pub fn evaluated_at(&self, sheet: SheetId, address: &str) -> Option<EvaluatedCell> {
        let addr = CellAddress::parse(address).ok()?;
        Some(self.get_evaluated_cell(CellPosition::new(sheet, addr.col, addr.row)))
    }

    /// Statistics of the last recalculation pass
    pub fn calculation_stats(&self) -> &CalculationStats {
        &self.last_stats
    }

    /// Total formula evaluations since the model was created
    pub fn evaluation_count(&self) -> u64 {
        self.evaluation_count
    }
}

fn check_zone(zone: &CellRange) -> Result<(), CancelledReason> {
    if zone.bottom() >= MAX_ROWS || zone.right() >= MAX_COLS {
        return Err(CancelledReason::InvalidZone);
    }
    Ok(())
}

fn name_error(error: CoreError) -> CancelledReason {
    match error {
        CoreError::DuplicateSheetName(_) => CancelledReason::DuplicatedSheetName,
        _ => CancelledReason::WrongSheetName,
    }
}
