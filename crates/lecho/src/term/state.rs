//! Terminal grid data model: cells, colors, attributes and the screen buffer
//! backing the reference [`VtGrid`](super::VtGrid).

use serde::{Deserialize, Serialize};

// =============================================================================
// Color Types
// =============================================================================

/// Terminal color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Color {
    /// Default foreground/background color.
    #[default]
    Default,
    /// Standard 16-color palette (0-15) or 256-color palette (16-255).
    Indexed(u8),
    /// 24-bit RGB color.
    Rgb(u8, u8, u8),
}

// =============================================================================
// Cell Attributes
// =============================================================================

/// Cell display attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellAttrs {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub reverse: bool,
}

impl CellAttrs {
    /// Returns true if all attributes are default (off).
    pub fn is_default(&self) -> bool {
        !self.bold && !self.dim && !self.italic && !self.underline && !self.reverse
    }

    /// Reset all attributes to default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// Cell
// =============================================================================

/// A single terminal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// The character displayed (space for empty).
    pub ch: char,
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Display attributes.
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    /// Create a new cell with a character and default styling.
    pub fn new(ch: char) -> Self {
        Self {
            ch,
            ..Default::default()
        }
    }

    /// Create a cell with full styling.
    pub fn with_style(ch: char, fg: Color, bg: Color, attrs: CellAttrs) -> Self {
        Self { ch, fg, bg, attrs }
    }

    /// Check if this is a default (empty space, default colors) cell.
    pub fn is_default(&self) -> bool {
        self.ch == ' '
            && self.fg == Color::Default
            && self.bg == Color::Default
            && self.attrs.is_default()
    }
}

// =============================================================================
// Screen
// =============================================================================

/// A terminal screen buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    cells: Vec<Cell>,
    cols: u16,
    rows: u16,
}

impl Screen {
    /// Create a new screen with given dimensions, filled with default cells.
    pub fn new(cols: u16, rows: u16) -> Self {
        let size = cols as usize * rows as usize;
        Self {
            cells: vec![Cell::default(); size],
            cols,
            rows,
        }
    }

    /// Get screen width in columns.
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Get screen height in rows.
    pub fn rows(&self) -> u16 {
        self.rows
    }

    fn index(&self, col: u16, row: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Get a cell by position.
    pub fn get(&self, col: u16, row: u16) -> Option<&Cell> {
        if col < self.cols && row < self.rows {
            Some(&self.cells[self.index(col, row)])
        } else {
            None
        }
    }

    /// Set a cell at position. Out-of-bounds writes are ignored.
    pub fn set(&mut self, col: u16, row: u16, cell: Cell) {
        if col < self.cols && row < self.rows {
            let idx = self.index(col, row);
            self.cells[idx] = cell;
        }
    }

    /// Erase `count` cells starting at (col, row) without shifting (ECH).
    pub fn erase_chars(&mut self, col: u16, row: u16, count: u16) {
        for x in col..col.saturating_add(count).min(self.cols) {
            self.set(x, row, Cell::default());
        }
    }

    /// Delete `count` cells at (col, row), shifting the rest of the row left
    /// and filling the tail with default cells (DCH).
    pub fn delete_chars(&mut self, col: u16, row: u16, count: u16) {
        if col >= self.cols || row >= self.rows {
            return;
        }
        for x in col..self.cols {
            let src = x.saturating_add(count);
            let cell = if src < self.cols {
                self.get(src, row).copied().unwrap_or_default()
            } else {
                Cell::default()
            };
            self.set(x, row, cell);
        }
    }

    /// Erase from (col, row) to the end of the row (EL 0).
    pub fn clear_line_from(&mut self, col: u16, row: u16) {
        for x in col..self.cols {
            self.set(x, row, Cell::default());
        }
    }

    /// Scroll the whole screen up by `count` rows, filling the bottom with
    /// default cells. Scrolled-out rows are discarded.
    pub fn scroll_up(&mut self, count: u16) {
        let count = count.min(self.rows) as usize;
        let row_len = self.cols as usize;
        self.cells.drain(..count * row_len);
        self.cells
            .extend(std::iter::repeat(Cell::default()).take(count * row_len));
    }

    /// The text content of a row, trailing blanks trimmed. Test helper.
    pub fn row_text(&self, row: u16) -> String {
        let mut text: String = (0..self.cols)
            .filter_map(|col| self.get(col, row))
            .map(|cell| cell.ch)
            .collect();
        while text.ends_with(' ') {
            text.pop();
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cell_is_default() {
        assert!(Cell::default().is_default());
        assert!(!Cell::new('x').is_default());
        let styled_blank = Cell::with_style(
            ' ',
            Color::Default,
            Color::Indexed(4),
            CellAttrs::default(),
        );
        assert!(!styled_blank.is_default());
    }

    #[test]
    fn screen_set_get() {
        let mut screen = Screen::new(10, 4);
        screen.set(3, 1, Cell::new('a'));
        assert_eq!(screen.get(3, 1).map(|c| c.ch), Some('a'));
        assert_eq!(screen.get(10, 1), None);
        // Out of bounds writes are dropped silently
        screen.set(10, 1, Cell::new('b'));
    }

    #[test]
    fn erase_chars_stops_at_edge() {
        let mut screen = Screen::new(5, 1);
        for x in 0..5 {
            screen.set(x, 0, Cell::new('x'));
        }
        screen.erase_chars(3, 0, 10);
        assert_eq!(screen.row_text(0), "xxx");
    }

    #[test]
    fn delete_chars_shifts_left() {
        let mut screen = Screen::new(6, 1);
        for (x, c) in "abcdef".chars().enumerate() {
            screen.set(x as u16, 0, Cell::new(c));
        }
        screen.delete_chars(1, 0, 2);
        assert_eq!(screen.row_text(0), "adef");
        screen.delete_chars(2, 0, 100);
        assert_eq!(screen.row_text(0), "ad");
    }

    #[test]
    fn scroll_up_discards_top_row() {
        let mut screen = Screen::new(3, 2);
        screen.set(0, 0, Cell::new('a'));
        screen.set(0, 1, Cell::new('b'));
        screen.scroll_up(1);
        assert_eq!(screen.row_text(0), "b");
        assert_eq!(screen.row_text(1), "");
    }

    #[test]
    fn row_text_trims_trailing_blanks() {
        let mut screen = Screen::new(8, 1);
        screen.set(0, 0, Cell::new('h'));
        screen.set(1, 0, Cell::new('i'));
        assert_eq!(screen.row_text(0), "hi");
    }
}
