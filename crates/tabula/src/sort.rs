//! Row ordering for SORT_CELLS

use crate::cell::{CellValueType, EvaluatedCell};
use crate::command::{SortDirection, SortOptions};
use std::cmp::Ordering;
use tabula_formula::Value;

/// Rank of a value type; lower sorts first in ascending order
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) | Value::Empty | Value::Matrix(_) => 0,
        Value::Error(_) => 1,
        Value::Text(_) => 2,
        Value::Boolean(_) => 3,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Error(x), Value::Error(y)) => x.kind.as_str().cmp(y.kind.as_str()),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// New order of `keys`, as indices into `keys`
///
/// The sort is stable. Empty keys go last in both directions unless
/// `empty_cell_as_zero` is set, in which case they rank as the number 0.
pub(crate) fn sort_order(keys: &[EvaluatedCell], direction: SortDirection, options: SortOptions) -> Vec<usize> {
    let zero = Value::Number(0.0);
    let key = |i: usize| match &keys[i].value {
        Value::Empty => &zero,
        value => value,
    };

    let (mut ranked, empty): (Vec<usize>, Vec<usize>) = (0..keys.len())
        .partition(|&i| options.empty_cell_as_zero || keys[i].value_type != CellValueType::Empty);
    match direction {
        SortDirection::Ascending => ranked.sort_by(|&a, &b| compare(key(a), key(b))),
        SortDirection::Descending => ranked.sort_by(|&a, &b| compare(key(b), key(a))),
    }
    ranked.extend(empty);
    ranked
}

/// Whether the first row of a zone looks like a header
///
/// `columns` holds the evaluated cells of each column of the zone, top to bottom. The left-most
/// column is ignored when its top cell is empty; every other top cell must be filled, and at
/// least one of them must differ in type from the first filled cell below it.
pub(crate) fn has_header(columns: &[Vec<EvaluatedCell>]) -> bool {
    if columns.first().map_or(true, |c| c.len() < 2) {
        return false;
    }
    let top_type = |column: &Vec<EvaluatedCell>| column.first().map_or(CellValueType::Empty, |c| c.value_type);
    let columns = match columns.split_first() {
        Some((first, rest)) if top_type(first) == CellValueType::Empty => rest,
        _ => columns,
    };
    if columns.is_empty() || columns.iter().any(|c| top_type(c) == CellValueType::Empty) {
        return false;
    }
    columns.iter().any(|column| {
        column
            .iter()
            .skip(1)
            .find(|c| c.value_type != CellValueType::Empty)
            .map_or(false, |below| below.value_type != top_type(column))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::{CellError, Locale};
    use tabula_formula::Arg;

    fn cell(value: Value) -> EvaluatedCell {
        EvaluatedCell::from_arg(Arg::from(value), &Locale::default())
    }

    fn cells(values: Vec<Value>) -> Vec<EvaluatedCell> {
        values.into_iter().map(cell).collect()
    }

    #[test]
    fn test_mixed_types_ascending() {
        let keys = cells(vec![
            Value::Boolean(true),
            Value::from("b"),
            Value::Empty,
            Value::error(CellError::Generic, "oops"),
            Value::Number(3.0),
            Value::from("A"),
            Value::Number(-1.0),
        ]);
        let order = sort_order(&keys, SortDirection::Ascending, SortOptions::default());
        assert_eq!(order, vec![6, 4, 3, 5, 1, 0, 2]);
    }

    #[test]
    fn test_empty_cells_stay_last_when_descending() {
        let keys = cells(vec![Value::Empty, Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(
            sort_order(&keys, SortDirection::Descending, SortOptions::default()),
            vec![2, 1, 0]
        );
    }

    #[test]
    fn test_empty_cell_as_zero() {
        let keys = cells(vec![Value::Number(1.0), Value::Empty, Value::Number(-1.0)]);
        let options = SortOptions {
            empty_cell_as_zero: true,
            ..SortOptions::default()
        };
        assert_eq!(sort_order(&keys, SortDirection::Ascending, options), vec![2, 1, 0]);
    }

    #[test]
    fn test_sort_is_stable() {
        let keys = cells(vec![Value::from("x"), Value::from("X"), Value::from("a"), Value::from("x")]);
        assert_eq!(
            sort_order(&keys, SortDirection::Ascending, SortOptions::default()),
            vec![2, 0, 1, 3]
        );
        assert_eq!(
            sort_order(&keys, SortDirection::Descending, SortOptions::default()),
            vec![0, 1, 3, 2]
        );
    }

    #[test]
    fn test_header_detection() {
        // Text header over numbers
        let columns = vec![cells(vec![Value::from("Amount"), Value::Number(3.0), Value::Number(1.0)])];
        assert!(has_header(&columns));

        // All texts: nothing distinguishes the first row
        let columns = vec![cells(vec![Value::from("b"), Value::from("a")])];
        assert!(!has_header(&columns));

        // A gap in the top row means no header
        let columns = vec![
            cells(vec![Value::from("Name"), Value::from("x")]),
            cells(vec![Value::Empty, Value::Number(1.0)]),
        ];
        assert!(!has_header(&columns));

        // An empty top-left corner is ignored
        let columns = vec![
            cells(vec![Value::Empty, Value::from("row")]),
            cells(vec![Value::from("Score"), Value::Empty, Value::Number(4.0)]),
        ];
        assert!(has_header(&columns));

        assert!(!has_header(&[cells(vec![Value::from("only")])]));
    }
}
