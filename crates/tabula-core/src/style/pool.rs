//! Style pool for deduplication

use super::Style;
use ahash::AHashMap;

/// Index of a style inside a [`StylePool`]; `StyleId(0)` is the default style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleId(pub u32);

impl StyleId {
    /// The default style
    pub const DEFAULT: StyleId = StyleId(0);
}

/// Style pool for deduplicating styles
///
/// Many cells share the same style. The pool stores each unique style once and cells
/// reference styles by index.
#[derive(Debug, Clone)]
pub struct StylePool {
    /// All unique styles (index 0 is default)
    styles: Vec<Style>,
    /// Fast lookup for deduplication
    index_map: AHashMap<Style, StyleId>,
}

impl StylePool {
    /// Create a new style pool with default style at index 0
    pub fn new() -> Self {
        let mut pool = Self {
            styles: Vec::with_capacity(16),
            index_map: AHashMap::with_capacity(16),
        };
        pool.styles.push(Style::default());
        pool.index_map.insert(Style::default(), StyleId::DEFAULT);
        pool
    }

    /// Get or create a style, returning its index
    pub fn get_or_insert(&mut self, style: Style) -> StyleId {
        if let Some(&id) = self.index_map.get(&style) {
            return id;
        }
        let id = StyleId(self.styles.len() as u32);
        self.index_map.insert(style.clone(), id);
        self.styles.push(style);
        id
    }

    /// Get a style by index
    pub fn get(&self, id: StyleId) -> Option<&Style> {
        self.styles.get(id.0 as usize)
    }

    /// Get the number of styles, default included
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if the pool only holds the default style
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn test_default_style() {
        let pool = StylePool::new();
        assert_eq!(pool.len(), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.get(StyleId::DEFAULT), Some(&Style::default()));
    }

    #[test]
    fn test_deduplication() {
        let mut pool = StylePool::new();
        let bold = pool.get_or_insert(Style::new().bold(true));
        let bold_again = pool.get_or_insert(Style::new().bold(true));
        let italic = pool.get_or_insert(Style::new().italic(true));
        assert_eq!(bold, bold_again);
        assert_ne!(bold, italic);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get_or_insert(Style::default()), StyleId::DEFAULT);
    }

    #[test]
    fn test_lookup_by_id() {
        let mut pool = StylePool::new();
        let style = Style::new().fill_color(Color::rgb(255, 0, 0)).font_size(14);
        let id = pool.get_or_insert(style.clone());
        assert_eq!(pool.get(id), Some(&style));
        assert_eq!(pool.get(StyleId(99)), None);
    }
}
