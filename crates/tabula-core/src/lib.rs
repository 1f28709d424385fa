//! # tabula-core
//!
//! Core data structures for the tabula spreadsheet engine.
//!
//! This crate provides the fundamental types used throughout tabula:
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing and rectangular zones
//! - [`CellPosition`] - a cell location qualified by its sheet
//! - [`CellError`] - the error markers a cell can display
//! - [`Workbook`], [`Worksheet`] - sheet containers with sparse cell storage
//! - [`Style`], [`StylePool`] - deduplicated cell styles
//! - [`Locale`] and [`format`] - locale configuration and number display
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{CellAddress, Workbook};
//!
//! let mut workbook: Workbook<String> = Workbook::new();
//! let sheet_id = workbook.add_sheet("Data", None).unwrap();
//! let sheet = workbook.sheet_mut(sheet_id).unwrap();
//!
//! let addr = CellAddress::parse("B2").unwrap();
//! sheet.cells.set(addr.row, addr.col, "hello".to_string());
//! assert_eq!(sheet.cells.get(1, 1).map(String::as_str), Some("hello"));
//! ```

pub mod cell;
pub mod datetime;
pub mod error;
pub mod format;
pub mod locale;
pub mod style;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{CellAddress, CellError, CellId, CellPosition, CellRange, CellStorage, SheetId};
pub use error::{Error, Result};
pub use locale::Locale;
pub use style::{Color, HorizontalAlignment, Style, StyleId, StylePool};
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
