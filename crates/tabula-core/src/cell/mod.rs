//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangular zone (e.g., "A1:B10")
//! - [`CellPosition`] - A location qualified by its sheet
//! - [`CellError`] - The error markers displayed by cells
//! - [`CellStorage`] - Sparse storage for cell payloads

mod address;
mod error;
mod position;
mod storage;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use error::CellError;
pub use position::{CellId, CellPosition, SheetId};
pub use storage::CellStorage;
