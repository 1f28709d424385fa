//! JSON workbook files
//!
//! ```json
//! {
//!   "locale": { "decimalSeparator": ",", "thousandsSeparator": ".", "formulaArgSeparator": ";" },
//!   "sheets": [
//!     { "name": "Sales", "cells": { "A1": "10", "A2": "=A1*2" }, "formats": { "A2": "0.00" } }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabula::prelude::*;

#[derive(Debug, Deserialize)]
pub struct WorkbookFile {
    #[serde(default)]
    pub locale: Option<Locale>,
    pub sheets: Vec<SheetFile>,
}

#[derive(Debug, Deserialize)]
pub struct SheetFile {
    pub name: String,
    /// Raw content by A1 address
    #[serde(default)]
    pub cells: BTreeMap<String, String>,
    /// Display formats by A1 address
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
}

/// One evaluated cell in the output
#[derive(Debug, Serialize, PartialEq)]
pub struct CellReport {
    pub sheet: String,
    pub address: String,
    pub content: String,
    pub value: serde_json::Value,
    pub text: String,
}

impl WorkbookFile {
    pub fn parse(json: &str) -> Result<Self> {
        let file: WorkbookFile = serde_json::from_str(json).context("Invalid workbook file")?;
        if file.sheets.is_empty() {
            bail!("A workbook file needs at least one sheet");
        }
        Ok(file)
    }

    /// Build and evaluate a model holding every sheet of the file
    pub fn into_model(self) -> Result<Model> {
        let config = ModelConfig::default().with_locale(self.locale.unwrap_or_default());
        let mut model = Model::new(config);
        let first = model.get_sheet_ids()[0];

        let mut sheet_ids = Vec::with_capacity(self.sheets.len());
        for (index, sheet) in self.sheets.iter().enumerate() {
            let id = if index == 0 {
                let result = model.dispatch(Command::RenameSheet {
                    sheet: first,
                    name: sheet.name.clone(),
                });
                match result.reason() {
                    None | Some(CancelledReason::NoChange) => first,
                    Some(reason) => bail!("Cannot name sheet '{}': {}", sheet.name, reason),
                }
            } else {
                model
                    .create_sheet(&sheet.name, index)
                    .with_context(|| format!("Cannot create sheet '{}'", sheet.name))?
            };
            sheet_ids.push(id);
        }

        for (sheet, id) in self.sheets.iter().zip(sheet_ids) {
            for (address, content) in &sheet.cells {
                model
                    .update_cell_at(id, address, content)
                    .into_result()
                    .with_context(|| format!("Cannot set {}!{}", sheet.name, address))?;
            }
            for (address, format) in &sheet.formats {
                let addr =
                    CellAddress::parse(address).with_context(|| format!("Invalid address {}!{}", sheet.name, address))?;
                model
                    .dispatch(Command::UpdateCell {
                        sheet: id,
                        col: addr.col,
                        row: addr.row,
                        content: None,
                        style: None,
                        format: Some(format.clone()),
                    })
                    .into_result()
                    .with_context(|| format!("Cannot format {}!{}", sheet.name, address))?;
            }
        }
        Ok(model)
    }
}

/// Evaluated non-empty cells of every sheet, sheet by sheet, row by row
pub fn report(model: &Model) -> Vec<CellReport> {
    let mut reports = Vec::new();
    for sheet in model.get_sheet_ids() {
        let name = model.get_sheet_name(sheet).unwrap_or_default().to_string();
        let mut positions: Vec<CellPosition> = model.cell_positions(sheet);
        positions.sort_by_key(|p| (p.row, p.col));
        for position in positions {
            let Some(cell) = model.get_cell(position) else {
                continue;
            };
            let evaluated = model.get_evaluated_cell(position);
            reports.push(CellReport {
                sheet: name.clone(),
                address: CellAddress::new(position.row, position.col).to_a1_string(),
                content: cell.content.clone(),
                value: json_value(&evaluated.value),
                text: evaluated.formatted_value,
            });
        }
    }
    reports
}

pub fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Empty | Value::Matrix(_) => serde_json::Value::Null,
        Value::Number(n) => serde_json::json!(n),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Error(e) => serde_json::Value::String(e.kind.as_str().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_and_report() {
        let file = WorkbookFile::parse(
            r#"{
                "sheets": [
                    { "name": "Inputs", "cells": { "A1": "4", "A2": "6" } },
                    { "name": "Totals", "cells": { "B1": "=SUM(Inputs!A1:A2)" }, "formats": { "B1": "0.0" } }
                ]
            }"#,
        )
        .unwrap();
        let model = file.into_model().unwrap();
        let reports = report(&model);

        assert_eq!(reports.len(), 3);
        let total = &reports[2];
        assert_eq!(total.sheet, "Totals");
        assert_eq!(total.address, "B1");
        assert_eq!(total.value, serde_json::json!(10.0));
        assert_eq!(total.text, "10.0");
    }

    #[test]
    fn test_locale_from_file() {
        let file = WorkbookFile::parse(
            r#"{
                "locale": { "decimalSeparator": ",", "thousandsSeparator": ".", "formulaArgSeparator": ";" },
                "sheets": [ { "name": "Sheet1", "cells": { "A1": "=1/4" } } ]
            }"#,
        )
        .unwrap();
        let model = file.into_model().unwrap();
        assert_eq!(report(&model)[0].text, "0,25");
    }

    #[test]
    fn test_rejects_bad_files() {
        assert!(WorkbookFile::parse(r#"{ "sheets": [] }"#).is_err());
        assert!(WorkbookFile::parse("not json").is_err());

        let file = WorkbookFile::parse(r#"{ "sheets": [ { "name": "A" }, { "name": "a" } ] }"#).unwrap();
        let err = file.into_model().unwrap_err();
        assert_eq!(err.to_string(), "Cannot create sheet 'a'");

        let file = WorkbookFile::parse(r#"{ "sheets": [ { "name": "A", "cells": { "1A": "x" } } ] }"#).unwrap();
        assert!(file.into_model().is_err());
    }
}
