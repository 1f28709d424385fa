//! Tests for command validation and the formatting, sorting and sheet commands

use pretty_assertions::assert_eq;
use tabula::prelude::*;

fn setup() -> (Model, SheetId) {
    let model = Model::default();
    let sheet = model.get_sheet_ids()[0];
    (model, sheet)
}

fn zone(a1: &str) -> CellRange {
    CellRange::parse(a1).unwrap()
}

fn text(model: &Model, sheet: SheetId, address: &str) -> String {
    model.evaluated_at(sheet, address).unwrap().formatted_value
}

fn column(model: &Model, sheet: SheetId, range: &str) -> Vec<Value> {
    model
        .get_evaluated_cells_in_zone(sheet, &zone(range))
        .into_iter()
        .map(|c| c.value)
        .collect()
}

/// Test the cancellation reason of each invalid command
#[test]
fn test_cancelled_commands() {
    let (mut model, sheet) = setup();
    let missing = SheetId(99);

    let cases = vec![
        (Command::update_content(missing, 0, 0, "1"), CancelledReason::InvalidSheet),
        (
            Command::UpdateCell {
                sheet,
                col: 0,
                row: 0,
                content: None,
                style: None,
                format: None,
            },
            CancelledReason::NoChange,
        ),
        (
            Command::SetDecimal {
                sheet,
                zones: vec![],
                step: 1,
            },
            CancelledReason::EmptyTarget,
        ),
        (
            Command::SetDecimal {
                sheet,
                zones: vec![zone("A1")],
                step: 0,
            },
            CancelledReason::NoChange,
        ),
        (
            Command::SetFormatting {
                sheet,
                zones: vec![zone("A1")],
                style: None,
                format: None,
            },
            CancelledReason::NoChange,
        ),
        (
            Command::ClearFormatting {
                sheet: missing,
                zones: vec![zone("A1")],
            },
            CancelledReason::InvalidSheet,
        ),
        (
            Command::SortCells {
                sheet,
                anchor_col: 3,
                anchor_row: 0,
                zone: zone("A1:B5"),
                direction: SortDirection::Ascending,
                options: SortOptions::default(),
            },
            CancelledReason::InvalidAnchor,
        ),
        (
            Command::SortCells {
                sheet,
                anchor_col: 0,
                anchor_row: 0,
                zone: zone("A1:C1"),
                direction: SortDirection::Ascending,
                options: SortOptions::default(),
            },
            CancelledReason::InvalidSortZone,
        ),
        (
            Command::CreateSheet {
                name: Some("sheet1".to_string()),
                position: 1,
            },
            CancelledReason::DuplicatedSheetName,
        ),
        (
            Command::CreateSheet {
                name: Some("a/b".to_string()),
                position: 1,
            },
            CancelledReason::WrongSheetName,
        ),
        (
            Command::RenameSheet {
                sheet,
                name: "Sheet1".to_string(),
            },
            CancelledReason::NoChange,
        ),
        (Command::DeleteSheet { sheet }, CancelledReason::NotEnoughSheets),
        (
            Command::UpdateLocale {
                locale: Locale::default(),
            },
            CancelledReason::NoChange,
        ),
        (
            Command::UpdateLocale {
                locale: Locale {
                    decimal_separator: ',',
                    ..Locale::default()
                },
            },
            CancelledReason::InvalidLocale,
        ),
    ];

    for (command, reason) in cases {
        let name = command.name();
        assert_eq!(model.dispatch(command), CommandResult::Cancelled(reason), "{}", name);
    }
    // Nothing was applied
    assert_eq!(model.get_sheet_ids(), vec![sheet]);
    assert_eq!(model.evaluation_count(), 0);
}

/// Test that a cancellation converts into an error
#[test]
fn test_command_result_into_result() {
    let (mut model, _) = setup();
    let err = model
        .dispatch(Command::DeleteSheet { sheet: SheetId(42) })
        .into_result()
        .unwrap_err();
    assert_eq!(err, CancelledReason::InvalidSheet);
    assert_eq!(err.to_string(), "the sheet does not exist");
}

/// Test adding and removing decimals
#[test]
fn test_set_decimal() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "1.5");
    model.update_cell_at(sheet, "A2", "hello");
    model.update_cell_at(sheet, "B1", "=A1");

    let more = Command::SetDecimal {
        sheet,
        zones: vec![zone("A1:A2")],
        step: 1,
    };
    assert!(model.dispatch(more).is_success());
    assert_eq!(text(&model, sheet, "A1"), "1.50");
    // Text cells are left alone
    let a2 = CellPosition::new(sheet, 0, 1);
    assert_eq!(model.get_cell(a2).and_then(|c| c.format.clone()), None);
    // Readers pick up the new format
    assert_eq!(text(&model, sheet, "B1"), "1.50");

    let fewer = Command::SetDecimal {
        sheet,
        zones: vec![zone("A1")],
        step: -1,
    };
    model.dispatch(fewer);
    assert_eq!(text(&model, sheet, "A1"), "1.5");
}

/// Test setting and clearing styles and formats on a zone
#[test]
fn test_formatting_commands() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "0.25");

    let result = model.dispatch(Command::SetFormatting {
        sheet,
        zones: vec![zone("A1:B2")],
        style: Some(Style::new().bold(true)),
        format: Some("0%".to_string()),
    });
    assert!(result.is_success());
    assert_eq!(text(&model, sheet, "A1"), "25%");
    let b2 = CellPosition::new(sheet, 1, 1);
    assert_eq!(model.get_cell_style(b2).map(|s| s.bold), Some(true));

    // Content typed later keeps the zone's format
    model.update_cell_at(sheet, "B2", "0.5");
    assert_eq!(text(&model, sheet, "B2"), "50%");

    model.dispatch(Command::ClearFormatting {
        sheet,
        zones: vec![zone("A1:B2")],
    });
    assert_eq!(text(&model, sheet, "A1"), "0.25");
    assert_eq!(model.get_cell_style(b2), None);
    // Cells holding only formatting are gone
    assert!(model.get_cell(CellPosition::new(sheet, 0, 1)).is_none());
}

/// Test sorting rows under a header by one column
#[test]
fn test_sort_with_header() {
    let (mut model, sheet) = setup();
    let rows = [["Score", "Name"], ["3", "c"], ["1", "a"], ["2", "b"]];
    for (row, values) in rows.iter().enumerate() {
        for (col, content) in values.iter().enumerate() {
            model.dispatch(Command::update_content(sheet, col as u16, row as u32, *content));
        }
    }

    let result = model.dispatch(Command::SortCells {
        sheet,
        anchor_col: 0,
        anchor_row: 1,
        zone: zone("A1:B4"),
        direction: SortDirection::Ascending,
        options: SortOptions::default(),
    });
    assert!(result.is_success());
    assert_eq!(
        column(&model, sheet, "A1:A4"),
        vec![Value::from("Score"), Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]
    );
    assert_eq!(
        column(&model, sheet, "B1:B4"),
        vec![Value::from("Name"), Value::from("a"), Value::from("b"), Value::from("c")]
    );
}

/// Test descending sort with empty cells and header rows sorted too
#[test]
fn test_sort_descending_with_headers() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "Total");
    model.update_cell_at(sheet, "A2", "4");
    model.update_cell_at(sheet, "A4", "9");

    model.dispatch(Command::SortCells {
        sheet,
        anchor_col: 0,
        anchor_row: 0,
        zone: zone("A1:A4"),
        direction: SortDirection::Descending,
        options: SortOptions {
            sort_headers: true,
            ..SortOptions::default()
        },
    });
    assert_eq!(
        column(&model, sheet, "A1:A4"),
        vec![Value::from("Total"), Value::Number(9.0), Value::Number(4.0), Value::Empty]
    );
}

/// Test that formulas move with their rows and are translated
#[test]
fn test_sort_moves_formulas() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "30");
    model.update_cell_at(sheet, "A2", "10");
    model.update_cell_at(sheet, "A3", "20");
    for row in 1..=3 {
        model.update_cell_at(sheet, &format!("B{}", row), &format!("=A{}*2", row));
    }
    model.update_cell_at(sheet, "D1", "=B1");
    let id = model.get_cell(CellPosition::new(sheet, 1, 0)).map(|c| c.id).unwrap();

    model.dispatch(Command::SortCells {
        sheet,
        anchor_col: 0,
        anchor_row: 0,
        zone: zone("A1:B3"),
        direction: SortDirection::Ascending,
        options: SortOptions::default(),
    });

    assert_eq!(
        column(&model, sheet, "B1:B3"),
        vec![Value::Number(20.0), Value::Number(40.0), Value::Number(60.0)]
    );
    let b3 = CellPosition::new(sheet, 1, 2);
    assert_eq!(model.get_cell_text(b3, true), "=A3*2");
    assert_eq!(model.get_cell_position(id), Some(b3));
    // Readers of the zone see the new order
    assert_eq!(text(&model, sheet, "D1"), "20");
}

/// Test creating sheets with generated names and positions
#[test]
fn test_create_sheet() {
    let (mut model, sheet) = setup();
    assert!(model
        .dispatch(Command::CreateSheet {
            name: None,
            position: 0,
        })
        .is_success());
    let ids = model.get_sheet_ids();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[1], sheet);
    assert_eq!(model.get_sheet_name(ids[0]), Some("Sheet2"));
    assert_eq!(model.create_sheet("Sheet2", 5), Err(CancelledReason::DuplicatedSheetName));
}
