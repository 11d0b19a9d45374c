//! Terminal-side collaborators: the [`Grid`] trait the engine reads terminal
//! state through, and a vte-backed reference implementation.

mod parser;
mod state;

pub use parser::VtGrid;
pub use state::{Cell, CellAttrs, Color, Screen};

use crate::cursor::Coordinate;

/// Read/write boundary between the engine and a hosting terminal.
///
/// `x` is a viewport column, `row` arguments are absolute line numbers
/// (`base_y() + viewport row`), so positions stay meaningful across scrolls.
pub trait Grid {
    /// Viewport width in columns.
    fn cols(&self) -> u16;

    /// Viewport height in rows.
    fn rows(&self) -> u16;

    /// Absolute line number of the top viewport row.
    fn base_y(&self) -> i64;

    /// Current cursor position.
    fn cursor(&self) -> Coordinate;

    /// Cell contents at a viewport column and absolute row. `None` when out
    /// of bounds or scrolled out.
    fn cell(&self, x: u16, row: i64) -> Option<Cell>;

    /// Current terminal title (used by the exclude-programs policy).
    fn title(&self) -> &str;

    /// Whether the alternate screen is active. Full-screen programs manage
    /// their own display, so predictions are suspended while it is.
    fn alternate_active(&self) -> bool {
        false
    }

    /// Sink for text the engine renders (predictions, rollbacks).
    fn write(&mut self, text: &str);
}
