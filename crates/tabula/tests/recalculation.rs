//! Tests for incremental recalculation, cycles and sheet structure changes

use pretty_assertions::assert_eq;
use tabula::prelude::*;

fn setup() -> (Model, SheetId) {
    let model = Model::default();
    let sheet = model.get_sheet_ids()[0];
    (model, sheet)
}

fn value(model: &Model, sheet: SheetId, address: &str) -> Value {
    model.evaluated_at(sheet, address).unwrap().value
}

fn error_kind(model: &Model, sheet: SheetId, address: &str) -> Option<CellError> {
    value(model, sheet, address).as_error().map(|e| e.kind)
}

/// Test that every cell of a cycle and its readers end as #CYCLE
#[test]
fn test_cycle_reaches_dependents() {
    let (mut model, sheet) = setup();

    model.update_cell_at(sheet, "A1", "=B1");
    model.update_cell_at(sheet, "B1", "=A1");
    model.update_cell_at(sheet, "C1", "=B1+1");

    assert_eq!(error_kind(&model, sheet, "A1"), Some(CellError::Cycle));
    assert_eq!(error_kind(&model, sheet, "B1"), Some(CellError::Cycle));
    assert_eq!(error_kind(&model, sheet, "C1"), Some(CellError::Cycle));
    assert_eq!(model.evaluated_at(sheet, "C1").unwrap().formatted_value, "#CYCLE");
}

/// Test a cell reading itself
#[test]
fn test_self_reference() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "=A1+1");
    assert_eq!(error_kind(&model, sheet, "A1"), Some(CellError::Cycle));
    assert_eq!(model.calculation_stats().cycles, 1);
}

/// Test a cycle through a range reference
#[test]
fn test_cycle_through_range() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "1");
    model.update_cell_at(sheet, "A3", "=SUM(A1:A2)");
    model.update_cell_at(sheet, "A2", "=A3");
    assert_eq!(error_kind(&model, sheet, "A2"), Some(CellError::Cycle));
    assert_eq!(error_kind(&model, sheet, "A3"), Some(CellError::Cycle));
}

/// Test that breaking a cycle restores numeric values
#[test]
fn test_breaking_a_cycle() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "=B1");
    model.update_cell_at(sheet, "B1", "=A1");
    model.update_cell_at(sheet, "C1", "=B1+1");

    model.update_cell_at(sheet, "B1", "7");
    assert_eq!(value(&model, sheet, "A1"), Value::Number(7.0));
    assert_eq!(value(&model, sheet, "B1"), Value::Number(7.0));
    assert_eq!(value(&model, sheet, "C1"), Value::Number(8.0));
}

/// Test that an edit only recomputes the cells that read it
#[test]
fn test_incremental_recompute_scope() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "1");
    model.update_cell_at(sheet, "B1", "=A1+1");
    model.update_cell_at(sheet, "C1", "=5");
    model.update_cell_at(sheet, "D1", "=C1*2");

    let before = model.evaluation_count();
    model.update_cell_at(sheet, "A1", "2");

    assert_eq!(value(&model, sheet, "B1"), Value::Number(3.0));
    assert_eq!(model.evaluation_count() - before, 1);
    assert_eq!(model.calculation_stats().cells_evaluated, 1);
    assert_eq!(value(&model, sheet, "D1"), Value::Number(10.0));
}

/// Test that changes travel through chains and ranges
#[test]
fn test_transitive_recompute() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "1");
    model.update_cell_at(sheet, "A2", "2");
    model.update_cell_at(sheet, "B1", "=SUM(A1:A5)");
    model.update_cell_at(sheet, "C1", "=B1*10");
    model.update_cell_at(sheet, "D1", "=C1+B1");
    model.update_cell_at(sheet, "E1", "=100");

    let before = model.evaluation_count();
    model.update_cell_at(sheet, "A4", "7");

    assert_eq!(value(&model, sheet, "B1"), Value::Number(10.0));
    assert_eq!(value(&model, sheet, "C1"), Value::Number(100.0));
    assert_eq!(value(&model, sheet, "D1"), Value::Number(110.0));
    // B1, C1 and D1, each once
    assert_eq!(model.evaluation_count() - before, 3);
}

/// Test that clearing an input recomputes its readers
#[test]
fn test_clearing_an_input() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "5");
    model.update_cell_at(sheet, "B1", "=A1*3");
    model.update_cell_at(sheet, "A1", "");
    assert_eq!(value(&model, sheet, "B1"), Value::Number(0.0));
}

/// Test that replacing a formula by a constant drops its dependencies
#[test]
fn test_formula_replaced_by_constant() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "1");
    model.update_cell_at(sheet, "B1", "=A1");
    model.update_cell_at(sheet, "B1", "42");

    let before = model.evaluation_count();
    model.update_cell_at(sheet, "A1", "2");
    assert_eq!(model.evaluation_count(), before);
    assert_eq!(value(&model, sheet, "B1"), Value::Number(42.0));
}

/// Test that renaming a sheet rewrites the formulas that name it
#[test]
fn test_rename_sheet_rewrites_formulas() {
    let (mut model, sheet) = setup();
    let data = model.create_sheet("Sheet2", 1).unwrap();
    model.update_cell_at(data, "A1", "3");
    model.update_cell_at(sheet, "A1", "=Sheet2!A1");

    let result = model.dispatch(Command::RenameSheet {
        sheet: data,
        name: "My Data".to_string(),
    });
    assert!(result.is_success());

    let a1 = CellPosition::new(sheet, 0, 0);
    assert_eq!(model.get_cell_text(a1, true), "='My Data'!A1");
    assert_eq!(value(&model, sheet, "A1"), Value::Number(3.0));
    assert_eq!(model.get_sheet_id_by_name("my data"), Some(data));

    // Dependencies still follow the renamed sheet
    model.update_cell_at(data, "A1", "4");
    assert_eq!(value(&model, sheet, "A1"), Value::Number(4.0));
}

/// Test that deleting a sheet turns formulas reading it into #REF
#[test]
fn test_delete_sheet_invalidates_formulas() {
    let (mut model, sheet) = setup();
    let data = model.create_sheet("Sheet2", 1).unwrap();
    model.update_cell_at(data, "A1", "3");
    model.update_cell_at(sheet, "A1", "=Sheet2!A1+1");
    model.update_cell_at(sheet, "A2", "=A1");
    let moved_id = model.get_cell(CellPosition::new(data, 0, 0)).map(|c| c.id).unwrap();

    assert!(model.dispatch(Command::DeleteSheet { sheet: data }).is_success());

    let a1 = CellPosition::new(sheet, 0, 0);
    assert_eq!(model.get_cell_text(a1, true), "=#REF");
    assert_eq!(error_kind(&model, sheet, "A1"), Some(CellError::Ref));
    assert_eq!(error_kind(&model, sheet, "A2"), Some(CellError::Ref));
    assert_eq!(model.get_sheet_ids(), vec![sheet]);
    assert_eq!(model.get_cell_position(moved_id), None);
}

/// Test that a new locale changes how values are displayed
#[test]
fn test_update_locale() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "1234.5");
    model.update_cell_at(sheet, "A2", "=A1*2");
    model.dispatch(Command::SetFormatting {
        sheet,
        zones: vec![CellRange::parse("A1:A2").unwrap()],
        style: None,
        format: Some("#,##0.00".to_string()),
    });
    assert_eq!(model.evaluated_at(sheet, "A2").unwrap().formatted_value, "2,469.00");

    let german = Locale {
        name: "German".to_string(),
        code: "de_DE".to_string(),
        decimal_separator: ',',
        thousands_separator: Some('.'),
        formula_arg_separator: ';',
        date_format: "dd.mm.yyyy".to_string(),
        time_format: "hh:mm:ss".to_string(),
    };
    assert!(model.dispatch(Command::UpdateLocale { locale: german }).is_success());
    assert_eq!(model.evaluated_at(sheet, "A1").unwrap().formatted_value, "1.234,50");
    assert_eq!(model.evaluated_at(sheet, "A2").unwrap().formatted_value, "2.469,00");
    assert_eq!(model.locale().code, "de_DE");
}

/// Test that statistics describe the last pass
#[test]
fn test_calculation_stats() {
    let (mut model, sheet) = setup();
    model.update_cell_at(sheet, "A1", "=1/0");
    let stats = model.calculation_stats();
    assert_eq!(stats.formula_count, 1);
    assert_eq!(stats.cells_evaluated, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.cycles, 0);
}

/// Test that statistics timing can be turned off
#[test]
fn test_stats_without_timing() {
    let config = ModelConfig {
        calculation: CalculationOptions { collect_stats: false },
        ..ModelConfig::default()
    };
    let mut model = Model::new(config);
    let sheet = model.get_sheet_ids()[0];
    model.update_cell_at(sheet, "A1", "=1+1");
    assert_eq!(model.calculation_stats().elapsed, std::time::Duration::ZERO);
    assert_eq!(model.calculation_stats().cells_evaluated, 1);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn build(values: &[i32]) -> (Model, SheetId) {
        let (mut model, sheet) = setup();
        for (i, v) in values.iter().enumerate() {
            model.update_cell_at(sheet, &format!("A{}", i + 1), &v.to_string());
            model.update_cell_at(sheet, &format!("B{}", i + 1), &format!("=SUM($A$1:A{})", i + 1));
        }
        (model, sheet)
    }

    proptest! {
        /// Test that edits recalculate to the same values as a fresh build
        #[test]
        fn prop_incremental_matches_fresh(
            values in prop::collection::vec(-1000i32..1000, 1..12),
            edits in prop::collection::vec((0usize..12, -1000i32..1000), 1..8),
        ) {
            let (mut model, sheet) = build(&values);
            let mut expected = values.clone();
            for (index, v) in edits {
                let index = index % expected.len();
                expected[index] = v;
                model.update_cell_at(sheet, &format!("A{}", index + 1), &v.to_string());
            }

            let (fresh, fresh_sheet) = build(&expected);
            let mut running = 0.0;
            for (i, v) in expected.iter().enumerate() {
                running += f64::from(*v);
                let address = format!("B{}", i + 1);
                prop_assert_eq!(value(&model, sheet, &address), Value::Number(running));
                prop_assert_eq!(value(&model, sheet, &address), value(&fresh, fresh_sheet, &address));
            }
        }
    }
}
