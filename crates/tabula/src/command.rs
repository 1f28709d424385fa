//! Commands: the only way to mutate a [`Model`](crate::Model)

use tabula_core::{CellRange, Locale, SheetId, Style};

/// A structured edit request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replace a cell's content, style or format; `None` leaves that part unchanged
    UpdateCell {
        sheet: SheetId,
        col: u16,
        row: u32,
        content: Option<String>,
        style: Option<Style>,
        /// An empty string clears the format
        format: Option<String>,
    },
    /// Show one more (`step = 1`) or one less (`step = -1`) decimal
    SetDecimal {
        sheet: SheetId,
        zones: Vec<CellRange>,
        step: i32,
    },
    SetFormatting {
        sheet: SheetId,
        zones: Vec<CellRange>,
        style: Option<Style>,
        format: Option<String>,
    },
    ClearFormatting {
        sheet: SheetId,
        zones: Vec<CellRange>,
    },
    /// Sort the rows of `zone` by the values in the anchor's column
    SortCells {
        sheet: SheetId,
        anchor_col: u16,
        anchor_row: u32,
        zone: CellRange,
        direction: SortDirection,
        options: SortOptions,
    },
    /// Create a sheet; a free `SheetN` name is picked when `name` is `None`
    CreateSheet {
        name: Option<String>,
        position: usize,
    },
    RenameSheet {
        sheet: SheetId,
        name: String,
    },
    DeleteSheet {
        sheet: SheetId,
    },
    UpdateLocale {
        locale: Locale,
    },
}

impl Command {
    /// Shorthand for setting a cell's content only
    pub fn update_content(sheet: SheetId, col: u16, row: u32, content: impl Into<String>) -> Self {
        Command::UpdateCell {
            sheet,
            col,
            row,
            content: Some(content.into()),
            style: None,
            format: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::UpdateCell { .. } => "UPDATE_CELL",
            Command::SetDecimal { .. } => "SET_DECIMAL",
            Command::SetFormatting { .. } => "SET_FORMATTING",
            Command::ClearFormatting { .. } => "CLEAR_FORMATTING",
            Command::SortCells { .. } => "SORT_CELLS",
            Command::CreateSheet { .. } => "CREATE_SHEET",
            Command::RenameSheet { .. } => "RENAME_SHEET",
            Command::DeleteSheet { .. } => "DELETE_SHEET",
            Command::UpdateLocale { .. } => "UPDATE_LOCALE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortOptions {
    /// Sort the first row too, even when it looks like a header
    pub sort_headers: bool,
    /// Rank empty cells as zero instead of putting them last
    pub empty_cell_as_zero: bool,
}

/// Why a command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelledReason {
    #[error("the sheet does not exist")]
    InvalidSheet,
    #[error("the zone is outside the grid")]
    InvalidZone,
    #[error("the anchor is outside the zone")]
    InvalidAnchor,
    #[error("the sheet name is invalid")]
    WrongSheetName,
    #[error("a sheet with this name already exists")]
    DuplicatedSheetName,
    #[error("a workbook must keep at least one sheet")]
    NotEnoughSheets,
    #[error("no zone was given")]
    EmptyTarget,
    #[error("the zone has nothing to sort")]
    InvalidSortZone,
    #[error("the locale separators are ambiguous")]
    InvalidLocale,
    #[error("the command changes nothing")]
    NoChange,
}

/// Outcome of [`Model::dispatch`](crate::Model::dispatch)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    Cancelled(CancelledReason),
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success)
    }

    pub fn reason(&self) -> Option<CancelledReason> {
        match self {
            CommandResult::Success => None,
            CommandResult::Cancelled(reason) => Some(*reason),
        }
    }

    /// `Err` with the reason when the command was cancelled
    pub fn into_result(self) -> Result<(), CancelledReason> {
        match self {
            CommandResult::Success => Ok(()),
            CommandResult::Cancelled(reason) => Err(reason),
        }
    }
}

impl From<Result<(), CancelledReason>> for CommandResult {
    fn from(result: Result<(), CancelledReason>) -> Self {
        match result {
            Ok(()) => CommandResult::Success,
            Err(reason) => CommandResult::Cancelled(reason),
        }
    }
}
