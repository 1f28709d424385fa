//! Model configuration

use chrono::NaiveDateTime;
use tabula_core::Locale;

/// Options for recalculation passes
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Time each pass and keep its statistics
    pub collect_stats: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self { collect_stats: true }
    }
}

/// Everything a [`Model`](crate::Model) is created with
#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    pub locale: Locale,
    /// Fixed clock for NOW and TODAY; the system clock when `None`
    pub now: Option<NaiveDateTime>,
    pub calculation: CalculationOptions,
}

impl ModelConfig {
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// The instant volatile date functions see in the next pass
    pub(crate) fn current_time(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}
