//! Cell styling types
//!
//! Styles only matter to the engine as opaque, comparable payloads carried by cells: sorting
//! moves them with their cells and formatting commands replace or clear them. Cells hold a
//! [`StyleId`] into the workbook's [`StylePool`].

mod color;
mod pool;

pub use color::Color;
pub use pool::{StyleId, StylePool};

/// Horizontal alignment of the cell text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

/// Complete cell style
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    /// Font size in points; `None` means the sheet default
    pub font_size: Option<u16>,
    pub text_color: Option<Color>,
    pub fill_color: Option<Color>,
    pub align: Option<HorizontalAlignment>,
}

impl Style {
    /// Create a new default style
    pub fn new() -> Self {
        Self::default()
    }

    /// Set font to bold
    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Set font to italic
    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    /// Set font size in points
    pub fn font_size(mut self, size: u16) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Set text color
    pub fn text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self
    }

    /// Set fill color
    pub fn fill_color(mut self, color: Color) -> Self {
        self.fill_color = Some(color);
        self
    }

    /// Set horizontal alignment
    pub fn align(mut self, align: HorizontalAlignment) -> Self {
        self.align = Some(align);
        self
    }

    /// Overlay the set attributes of `other` on top of this style
    pub fn merge(&self, other: &Style) -> Style {
        Style {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            strikethrough: self.strikethrough || other.strikethrough,
            font_size: other.font_size.or(self.font_size),
            text_color: other.text_color.or(self.text_color),
            fill_color: other.fill_color.or(self.fill_color),
            align: other.align.or(self.align),
        }
    }

    /// Whether this is the default style
    pub fn is_default(&self) -> bool {
        *self == Style::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_set_attributes() {
        let base = Style::new().bold(true).fill_color(Color::rgb(255, 0, 0));
        let overlay = Style::new().fill_color(Color::rgb(0, 0, 255)).align(HorizontalAlignment::Center);
        let merged = base.merge(&overlay);
        assert!(merged.bold);
        assert_eq!(merged.fill_color, Some(Color::rgb(0, 0, 255)));
        assert_eq!(merged.align, Some(HorizontalAlignment::Center));
        assert!(!merged.is_default());
        assert!(Style::new().is_default());
    }
}
