//! Positional bookkeeping for speculative rendering.
//!
//! [`Cursor`] tracks where predicted output will land and emits CUP
//! instructions to get the real terminal there. Coordinates carry the
//! absolute line of the top viewport row (`base_y`) so positions survive
//! scrolling; moves past the bottom of the viewport shift `base_y` the same
//! way the terminal scrolls.

use crate::constants::CSI;
use crate::term::Grid;

/// A scroll-stable position: viewport column/row plus the absolute line
/// number of the top viewport row at the time of capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub x: u16,
    pub y: u16,
    pub base_y: i64,
}

/// A terminal cursor that can be moved both as bookkeeping (no output) and
/// with emitted move instructions.
#[derive(Debug, Clone)]
pub struct Cursor {
    cols: u16,
    rows: u16,
    x: i32,
    y: i32,
    base_y: i64,
}

impl Cursor {
    /// Create a cursor over a `cols` x `rows` viewport at `pos`.
    pub fn new(cols: u16, rows: u16, pos: Coordinate) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
            x: pos.x as i32,
            y: pos.y as i32,
            base_y: pos.base_y,
        }
    }

    /// Snapshot a cursor from the grid's current state.
    pub fn from_grid(grid: &(impl Grid + ?Sized)) -> Self {
        Self::new(grid.cols(), grid.rows(), grid.cursor())
    }

    /// Clamp into the viewport, converting vertical overflow into a `base_y`
    /// shift (the terminal scrolls rather than moving past the last row).
    fn normalize(&mut self) {
        self.x = self.x.clamp(0, self.cols as i32 - 1);
        let max_y = self.rows as i32 - 1;
        if self.y > max_y {
            self.base_y += (self.y - max_y) as i64;
            self.y = max_y;
        } else if self.y < 0 {
            self.base_y += self.y as i64;
            self.y = 0;
        }
    }

    /// The current position.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            x: self.x as u16,
            y: self.y as u16,
            base_y: self.base_y,
        }
    }

    pub fn x(&self) -> u16 {
        self.x as u16
    }

    pub fn y(&self) -> u16 {
        self.y as u16
    }

    pub fn base_y(&self) -> i64 {
        self.base_y
    }

    /// The CUP sequence that moves the real terminal cursor here.
    pub fn move_instruction(&self) -> String {
        format!("{CSI}{};{}H", self.y + 1, self.x + 1)
    }

    /// Move to an absolute coordinate, emitting the move instruction. The
    /// target's `base_y` is reconciled against this cursor's.
    pub fn move_to(&mut self, pos: Coordinate) -> String {
        self.x = pos.x as i32;
        self.y = pos.y as i32 + (pos.base_y - self.base_y) as i32;
        self.normalize();
        self.move_instruction()
    }

    /// Move to a viewport position, emitting the move instruction.
    pub fn move_xy(&mut self, x: u16, y: u16) -> String {
        self.x = x as i32;
        self.y = y as i32;
        self.normalize();
        self.move_instruction()
    }

    /// Move relatively, emitting the move instruction.
    pub fn shift(&mut self, dx: i32, dy: i32) -> String {
        self.x += dx;
        self.y += dy;
        self.normalize();
        self.move_instruction()
    }

    /// Relative move as pure bookkeeping; used when emitted text (a printed
    /// character, a newline) already moves the real cursor.
    pub fn advance(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
        self.normalize();
    }

    /// Set the column as pure bookkeeping.
    pub fn set_x(&mut self, x: u16) {
        self.x = x as i32;
        self.normalize();
    }

    /// Jump to an absolute coordinate as pure bookkeeping.
    pub fn warp(&mut self, pos: Coordinate) {
        self.x = pos.x as i32;
        self.y = pos.y as i32 + (pos.base_y - self.base_y) as i32;
        self.normalize();
    }
}
