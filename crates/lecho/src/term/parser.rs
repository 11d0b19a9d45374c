//! VTE-based reference grid.
//!
//! [`VtGrid`] implements [`Grid`] on top of the `vte` parser. It mirrors what
//! a hosting terminal would display, which is what the engine needs both to
//! capture cell contents before speculating over them and to verify in tests
//! that apply/rollback sequences leave the display byte-identical.

use unicode_width::UnicodeWidthChar;
use vte::{Params, Parser, Perform};

use super::state::{Cell, CellAttrs, Color, Screen};
use super::Grid;
use crate::cursor::Coordinate;

/// Current drawing attributes, updated by SGR sequences.
#[derive(Debug, Clone, Copy, Default)]
struct Pen {
    fg: Color,
    bg: Color,
    attrs: CellAttrs,
}

/// Reference implementation of [`Grid`] driven by escape-sequence parsing.
pub struct VtGrid {
    inner: GridInner,
    parser: Parser,
}

struct GridInner {
    screen: Screen,
    x: u16,
    y: u16,
    base_y: i64,
    /// Deferred wrap: set after printing in the last column, consumed by the
    /// next printable character.
    pending_wrap: bool,
    cursor_visible: bool,
    alternate: bool,
    title: String,
    pen: Pen,
}

impl VtGrid {
    /// Create a grid with the given viewport dimensions.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            inner: GridInner {
                screen: Screen::new(cols.max(1), rows.max(1)),
                x: 0,
                y: 0,
                base_y: 0,
                pending_wrap: false,
                cursor_visible: true,
                alternate: false,
                title: String::new(),
                pen: Pen::default(),
            },
            parser: Parser::new(),
        }
    }

    /// Process raw output bytes.
    pub fn process(&mut self, data: &[u8]) {
        for &byte in data {
            self.parser.advance(&mut self.inner, byte);
        }
    }

    /// Resize the viewport, keeping overlapping content.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut screen = Screen::new(cols, rows);
        for row in 0..rows.min(self.inner.screen.rows()) {
            for col in 0..cols.min(self.inner.screen.cols()) {
                if let Some(cell) = self.inner.screen.get(col, row) {
                    screen.set(col, row, *cell);
                }
            }
        }
        self.inner.screen = screen;
        self.inner.x = self.inner.x.min(cols - 1);
        self.inner.y = self.inner.y.min(rows - 1);
        self.inner.pending_wrap = false;
    }

    /// Whether the cursor is currently shown.
    pub fn cursor_visible(&self) -> bool {
        self.inner.cursor_visible
    }

    /// The text content of an absolute row, trailing blanks trimmed.
    pub fn row_text(&self, row: i64) -> String {
        let viewport = row - self.inner.base_y;
        if viewport < 0 || viewport >= self.inner.screen.rows() as i64 {
            return String::new();
        }
        self.inner.screen.row_text(viewport as u16)
    }
}

impl Grid for VtGrid {
    fn cols(&self) -> u16 {
        self.inner.screen.cols()
    }

    fn rows(&self) -> u16 {
        self.inner.screen.rows()
    }

    fn base_y(&self) -> i64 {
        self.inner.base_y
    }

    fn cursor(&self) -> Coordinate {
        Coordinate {
            x: self.inner.x,
            y: self.inner.y,
            base_y: self.inner.base_y,
        }
    }

    fn cell(&self, x: u16, row: i64) -> Option<Cell> {
        let viewport = row - self.inner.base_y;
        if viewport < 0 || viewport >= self.inner.screen.rows() as i64 {
            return None;
        }
        self.inner.screen.get(x, viewport as u16).copied()
    }

    fn title(&self) -> &str {
        &self.inner.title
    }

    fn alternate_active(&self) -> bool {
        self.inner.alternate
    }

    fn write(&mut self, text: &str) {
        self.process(text.as_bytes());
    }
}

impl GridInner {
    fn line_feed(&mut self) {
        if self.y + 1 >= self.screen.rows() {
            self.screen.scroll_up(1);
            self.base_y += 1;
        } else {
            self.y += 1;
        }
    }

    fn apply_sgr(&mut self, params: &Params) {
        let parts: Vec<&[u16]> = params.iter().collect();
        if parts.is_empty() {
            self.pen = Pen::default();
            return;
        }
        let mut i = 0;
        while i < parts.len() {
            let sub = parts[i];
            let code = sub.first().copied().unwrap_or(0);
            match code {
                0 => self.pen = Pen::default(),
                1 => self.pen.attrs.bold = true,
                2 => self.pen.attrs.dim = true,
                3 => self.pen.attrs.italic = true,
                4 => self.pen.attrs.underline = sub.get(1) != Some(&0),
                7 => self.pen.attrs.reverse = true,
                22 => {
                    self.pen.attrs.bold = false;
                    self.pen.attrs.dim = false;
                }
                23 => self.pen.attrs.italic = false,
                24 => self.pen.attrs.underline = false,
                27 => self.pen.attrs.reverse = false,
                30..=37 => self.pen.fg = Color::Indexed((code - 30) as u8),
                39 => self.pen.fg = Color::Default,
                40..=47 => self.pen.bg = Color::Indexed((code - 40) as u8),
                49 => self.pen.bg = Color::Default,
                90..=97 => self.pen.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.pen.bg = Color::Indexed((code - 100 + 8) as u8),
                38 | 48 => {
                    let (color, consumed) = if sub.len() > 1 {
                        // Colon-packed form arrives as one subparameter list
                        (parse_packed_color(&sub[1..]), 0)
                    } else {
                        parse_legacy_color(&parts[i + 1..])
                    };
                    if let Some(color) = color {
                        if code == 38 {
                            self.pen.fg = color;
                        } else {
                            self.pen.bg = color;
                        }
                    }
                    i += consumed;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parse `2:[cs:]r:g:b` or `5:n` already split into one subparameter list.
fn parse_packed_color(sub: &[u16]) -> Option<Color> {
    match sub.first()? {
        5 => Some(Color::Indexed(*sub.get(1)? as u8)),
        2 if sub.len() >= 4 => {
            // An optional color-space identifier may precede the channels
            let rgb = &sub[sub.len() - 3..];
            Some(Color::Rgb(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8))
        }
        _ => None,
    }
}

/// Parse the semicolon form, where `2;r;g;b` / `5;n` arrive as separate
/// parameters. Returns the color and how many extra parameters it consumed.
fn parse_legacy_color(rest: &[&[u16]]) -> (Option<Color>, usize) {
    let first = |i: usize| rest.get(i).and_then(|s| s.first()).copied();
    match first(0) {
        Some(5) => match first(1) {
            Some(n) => (Some(Color::Indexed(n as u8)), 2),
            None => (None, 1),
        },
        Some(2) => match (first(1), first(2), first(3)) {
            (Some(r), Some(g), Some(b)) => {
                (Some(Color::Rgb(r as u8, g as u8, b as u8)), 4)
            }
            _ => (None, rest.len().min(4)),
        },
        _ => (None, 0),
    }
}

impl Perform for GridInner {
    fn print(&mut self, c: char) {
        let width = UnicodeWidthChar::width(c).unwrap_or(1) as u16;
        if width == 0 {
            return;
        }
        if self.pending_wrap {
            self.x = 0;
            self.line_feed();
            self.pending_wrap = false;
        }
        let cell = Cell::with_style(c, self.pen.fg, self.pen.bg, self.pen.attrs);
        self.screen.set(self.x, self.y, cell);
        if width == 2 {
            self.screen.set(self.x + 1, self.y, Cell::default());
        }
        if self.x + width >= self.screen.cols() {
            self.x = self.screen.cols() - 1;
            self.pending_wrap = true;
        } else {
            self.x += width;
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // Backspace
            0x08 => {
                self.x = self.x.saturating_sub(1);
                self.pending_wrap = false;
            }
            // Tab
            0x09 => {
                let next_tab = ((self.x / 8) + 1) * 8;
                self.x = next_tab.min(self.screen.cols() - 1);
            }
            // Line feed: column is unchanged, shells pair it with CR
            0x0A => {
                self.line_feed();
                self.pending_wrap = false;
            }
            // Carriage return
            0x0D => {
                self.x = 0;
                self.pending_wrap = false;
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let param0 = params
            .iter()
            .next()
            .and_then(|p| p.first().copied())
            .unwrap_or(0) as u16;
        let param1 = params
            .iter()
            .nth(1)
            .and_then(|p| p.first().copied())
            .unwrap_or(0) as u16;

        match (action, intermediates) {
            // Cursor Up (CUU)
            ('A', []) => {
                self.y = self.y.saturating_sub(param0.max(1));
                self.pending_wrap = false;
            }
            // Cursor Down (CUD)
            ('B', []) => {
                let max = self.screen.rows() - 1;
                self.y = (self.y + param0.max(1)).min(max);
                self.pending_wrap = false;
            }
            // Cursor Forward (CUF)
            ('C', []) => {
                let max = self.screen.cols() - 1;
                self.x = (self.x + param0.max(1)).min(max);
                self.pending_wrap = false;
            }
            // Cursor Back (CUB)
            ('D', []) => {
                self.x = self.x.saturating_sub(param0.max(1));
                self.pending_wrap = false;
            }
            // Cursor Position (CUP)
            ('H', []) | ('f', []) => {
                let row = param0.max(1) - 1;
                let col = param1.max(1) - 1;
                self.y = row.min(self.screen.rows() - 1);
                self.x = col.min(self.screen.cols() - 1);
                self.pending_wrap = false;
            }
            // Erase Line (EL)
            ('K', []) => match param0 {
                0 => self.screen.clear_line_from(self.x, self.y),
                2 => self.screen.clear_line_from(0, self.y),
                _ => {}
            },
            // Erase Character (ECH)
            ('X', []) => {
                self.screen.erase_chars(self.x, self.y, param0.max(1));
            }
            // Delete Character (DCH)
            ('P', []) => {
                self.screen.delete_chars(self.x, self.y, param0.max(1));
            }
            // Select Graphic Rendition
            ('m', []) => self.apply_sgr(params),
            // Private modes (DEC)
            ('h', [b'?']) | ('l', [b'?']) => {
                let enable = action == 'h';
                match param0 {
                    25 => self.cursor_visible = enable,
                    47 | 1047 | 1049 => self.alternate = enable,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        // OSC 0/2: set window title
        if let [kind, title, ..] = params {
            if kind == b"0" || kind == b"2" {
                self.title = String::from_utf8_lossy(title).into_owned();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_text_and_advances_cursor() {
        let mut grid = VtGrid::new(80, 24);
        grid.write("hello");
        assert_eq!(grid.row_text(0), "hello");
        assert_eq!(grid.cursor(), Coordinate { x: 5, y: 0, base_y: 0 });
    }

    #[test]
    fn wrap_is_deferred_until_next_print() {
        let mut grid = VtGrid::new(4, 2);
        grid.write("abcd");
        // Cursor stays on the last column until another character arrives
        assert_eq!(grid.cursor().x, 3);
        grid.write("e");
        assert_eq!(grid.row_text(0), "abcd");
        assert_eq!(grid.row_text(1), "e");
        assert_eq!(grid.cursor(), Coordinate { x: 1, y: 1, base_y: 0 });
    }

    #[test]
    fn scroll_increments_base_y() {
        let mut grid = VtGrid::new(10, 2);
        grid.write("one\r\ntwo\r\nthree");
        assert_eq!(grid.base_y(), 1);
        assert_eq!(grid.row_text(1), "two");
        assert_eq!(grid.row_text(2), "three");
        assert_eq!(grid.cell(0, 0), None);
    }

    #[test]
    fn cup_and_erase() {
        let mut grid = VtGrid::new(10, 4);
        grid.write("abcdef\x1b[1;3H\x1b[K");
        assert_eq!(grid.row_text(0), "ab");
        grid.write("xyz\x1b[1;4H\x1b[2X");
        assert_eq!(grid.row_text(0), "abx");
    }

    #[test]
    fn sgr_sets_cell_attributes() {
        let mut grid = VtGrid::new(10, 2);
        grid.write("\x1b[1;31mx\x1b[0my");
        let styled = grid.cell(0, 0).unwrap();
        assert!(styled.attrs.bold);
        assert_eq!(styled.fg, Color::Indexed(1));
        let plain = grid.cell(1, 0).unwrap();
        assert!(plain.attrs.is_default());
        assert_eq!(plain.fg, Color::Default);
    }

    #[test]
    fn sgr_extended_colors_both_encodings() {
        let mut grid = VtGrid::new(10, 1);
        grid.write("\x1b[38;2;10;20;30ma");
        assert_eq!(grid.cell(0, 0).unwrap().fg, Color::Rgb(10, 20, 30));
        grid.write("\x1b[38;5;196mb");
        assert_eq!(grid.cell(1, 0).unwrap().fg, Color::Indexed(196));
        grid.write("\x1b[38:2::1:2:3mc");
        assert_eq!(grid.cell(2, 0).unwrap().fg, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn cursor_visibility_and_title() {
        let mut grid = VtGrid::new(10, 2);
        assert!(grid.cursor_visible());
        grid.write("\x1b[?25l");
        assert!(!grid.cursor_visible());
        grid.write("\x1b[?25h");
        assert!(grid.cursor_visible());
        grid.write("\x1b]0;vim ~/notes.txt\x07");
        assert_eq!(grid.title(), "vim ~/notes.txt");
    }

    #[test]
    fn alternate_screen_flag() {
        let mut grid = VtGrid::new(10, 2);
        assert!(!grid.alternate_active());
        grid.write("\x1b[?1049h");
        assert!(grid.alternate_active());
        grid.write("\x1b[?1049l");
        assert!(!grid.alternate_active());
    }

    #[test]
    fn backspace_and_cub() {
        let mut grid = VtGrid::new(10, 1);
        grid.write("abc\x08\x08");
        assert_eq!(grid.cursor().x, 1);
        grid.write("\x1b[2C");
        assert_eq!(grid.cursor().x, 3);
        grid.write("\x1b[10D");
        assert_eq!(grid.cursor().x, 0);
    }
}
