//! Locale configuration
//!
//! The engine treats a locale as an opaque input threaded through every evaluation pass: it
//! drives how numeric and date strings are parsed by the coercion layer and how numbers and
//! dates are displayed.

/// Locale settings used for parsing and display
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct Locale {
    /// Display name, e.g. "English (US)"
    pub name: String,
    /// Locale code, e.g. "en_US"
    pub code: String,
    /// Decimal separator used in numeric strings
    pub decimal_separator: char,
    /// Thousands separator used in numeric strings, if any
    pub thousands_separator: Option<char>,
    /// Separator between function arguments when formulas are displayed
    pub formula_arg_separator: char,
    /// Date format, e.g. "m/d/yyyy"
    pub date_format: String,
    /// Time format, e.g. "hh:mm:ss a"
    pub time_format: String,
}

impl Locale {
    /// Combined date and time format
    pub fn date_time_format(&self) -> String {
        format!("{} {}", self.date_format, self.time_format)
    }

    /// Check that the separators can be told apart
    pub fn is_valid(&self) -> bool {
        Some(self.decimal_separator) != self.thousands_separator
            && self.decimal_separator != self.formula_arg_separator
            && !self.date_format.is_empty()
            && !self.time_format.is_empty()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            name: "English (US)".to_string(),
            code: "en_US".to_string(),
            decimal_separator: '.',
            thousands_separator: Some(','),
            formula_arg_separator: ',',
            date_format: "m/d/yyyy".to_string(),
            time_format: "hh:mm:ss a".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locale() {
        let locale = Locale::default();
        assert_eq!(locale.code, "en_US");
        assert_eq!(locale.date_time_format(), "m/d/yyyy hh:mm:ss a");
        assert!(locale.is_valid());
    }

    #[test]
    fn test_invalid_separators() {
        let locale = Locale {
            decimal_separator: ',',
            ..Locale::default()
        };
        assert!(!locale.is_valid());
    }
}
