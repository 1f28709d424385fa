//! Cell error markers

use std::fmt;

/// Error markers a cell can hold as its evaluated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    /// #ERROR - Generic evaluation failure (bad argument, coercion failure, ...)
    Generic,
    /// #CYCLE - The cell depends on itself
    Cycle,
    /// #BAD_EXPR - The formula could not be compiled
    BadExpression,
    /// #REF - The formula references a deleted sheet or a position outside the grid
    Ref,
    /// #N/A - Value not available
    NotAvailable,
    /// #NAME? - Unknown name
    Name,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Generic => "#ERROR",
            CellError::Cycle => "#CYCLE",
            CellError::BadExpression => "#BAD_EXPR",
            CellError::Ref => "#REF",
            CellError::NotAvailable => "#N/A",
            CellError::Name => "#NAME?",
        }
    }

    /// Parse an error string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#ERROR" => Some(CellError::Generic),
            "#CYCLE" => Some(CellError::Cycle),
            "#BAD_EXPR" => Some(CellError::BadExpression),
            "#REF" | "#REF!" => Some(CellError::Ref),
            "#N/A" => Some(CellError::NotAvailable),
            "#NAME?" => Some(CellError::Name),
            _ => None,
        }
    }

    /// The marker a reader of an errored cell inherits
    ///
    /// Cycles, missing values and broken references keep their identity; every other failure
    /// surfaces as a generic `#ERROR` in dependent cells.
    pub fn propagated(&self) -> CellError {
        match self {
            CellError::Cycle | CellError::NotAvailable | CellError::Ref => *self,
            _ => CellError::Generic,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_markers() {
        for err in [
            CellError::Generic,
            CellError::Cycle,
            CellError::BadExpression,
            CellError::Ref,
            CellError::NotAvailable,
            CellError::Name,
        ] {
            assert_eq!(CellError::from_str(err.as_str()), Some(err));
        }
        assert_eq!(CellError::from_str("#ref!"), Some(CellError::Ref));
        assert_eq!(CellError::from_str("#DIV/0!"), None);
    }

    #[test]
    fn test_propagation() {
        assert_eq!(CellError::BadExpression.propagated(), CellError::Generic);
        assert_eq!(CellError::Cycle.propagated(), CellError::Cycle);
        assert_eq!(CellError::Ref.propagated(), CellError::Ref);
    }
}
