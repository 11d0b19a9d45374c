//! Prediction variants: what the engine speculates, how speculation is
//! rendered, undone, and verified against real server output.
//!
//! Each prediction supports four operations:
//! - `apply` renders the speculative effect and captures what it displaced,
//! - `rollback` emits the byte-exact undo of that rendering,
//! - `matches` tests whether buffered server output confirms the prediction,
//! - `roll_forwards` re-plays the confirmed server bytes at the right spot.
//!
//! The captured per-application state ([`Applied`]) is owned by the timeline
//! queue entry, not the prediction itself, so predictions stay cheap values.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{DELETE_CHAR, DELETE_REST_OF_LINE};
use crate::cursor::{Coordinate, Cursor};
use crate::reader::{MatchResult, StringReader};
use crate::style::{cell_style_sequence, TypeAheadStyle};
use crate::term::{Cell, Grid};

/// SGR styling that may precede an echoed character.
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\x1b\[[0-9;:]*m").expect("pattern compiles"));

/// A chunk boundary may fall inside an SGR sequence; this matches an entire
/// remainder that could still grow into one.
static PARTIAL_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\x1b(?:\[[0-9;:]*)?$").expect("pattern compiles"));

/// Direction of a cursor-move prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Back,
    Forwards,
}

impl MoveDirection {
    /// The final byte of the matching CSI cursor sequences.
    fn csi_char(self) -> char {
        match self {
            MoveDirection::Back => 'D',
            MoveDirection::Forwards => 'C',
        }
    }
}

/// A predicted echoed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterPrediction {
    pub ch: char,
}

/// A predicted horizontal cursor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMovePrediction {
    pub direction: MoveDirection,
    /// Word-wise motion (alt-b/f, ctrl-arrows); the distance is measured
    /// against grid content when the prediction is applied.
    pub by_words: bool,
    /// Cell count for character-wise motion; ignored for word-wise.
    pub amount: usize,
}

/// One unit of speculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// Never matches: forces reconciliation to stop and roll back at this
    /// point. Queued for input the engine cannot model.
    HardBoundary,
    /// Wraps a prediction that is valid to expect but too risky to render;
    /// it participates in matching without ever producing display output.
    Tentative(Box<Prediction>),
    Character(CharacterPrediction),
    /// Backspace over the cursor's left neighbor.
    Backspace,
    /// Carriage return + line feed.
    Newline,
    /// The wrap shells force with a space + CR when typing in the last
    /// column.
    Linewrap,
    CursorMove(CursorMovePrediction),
}

/// State captured when a prediction was applied, owned by the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Boundary,
    Tentative {
        inner: Box<Applied>,
        end: Coordinate,
    },
    Character {
        prev: Coordinate,
        end: Coordinate,
        old_cell: Option<Cell>,
    },
    Backspace {
        prev: Coordinate,
        end: Coordinate,
        old_cell: Option<Cell>,
        /// Whether everything right of the cursor was blank; mid-line
        /// deletion redraws are not predictable.
        at_eol: bool,
    },
    Newline {
        prev: Coordinate,
        end: Coordinate,
    },
    Linewrap {
        prev: Coordinate,
        end: Coordinate,
    },
    CursorMove {
        prev: Coordinate,
        end: Coordinate,
        amount: usize,
    },
}

impl Applied {
    /// The cursor position before the prediction was applied, when the
    /// variant renders anything positional.
    fn prev(&self) -> Option<Coordinate> {
        match self {
            Applied::Boundary | Applied::Tentative { .. } => None,
            Applied::Character { prev, .. }
            | Applied::Backspace { prev, .. }
            | Applied::Newline { prev, .. }
            | Applied::Linewrap { prev, .. }
            | Applied::CursorMove { prev, .. } => Some(*prev),
        }
    }
}

impl Prediction {
    /// Render the speculative effect at `cursor`, capturing displaced state.
    /// Returns the text to write (empty for non-rendering variants).
    pub fn apply(
        &self,
        grid: &dyn Grid,
        cursor: &mut Cursor,
        style: &TypeAheadStyle,
    ) -> (String, Applied) {
        match self {
            Prediction::HardBoundary => (String::new(), Applied::Boundary),
            Prediction::Tentative(inner) => {
                // Bookkeeping only: the wrapped prediction advances a copy of
                // the cursor so later predictions stack correctly, but
                // nothing reaches the display
                let mut probe = cursor.clone();
                let (_, inner_applied) = inner.apply(grid, &mut probe, style);
                (
                    String::new(),
                    Applied::Tentative {
                        inner: Box::new(inner_applied),
                        end: probe.coordinate(),
                    },
                )
            }
            Prediction::Character(c) => {
                let prev = cursor.coordinate();
                let old_cell = grid.cell(prev.x, prev.base_y + prev.y as i64);
                cursor.advance(1, 0);
                let text = format!(
                    "{}{}{}",
                    style.apply_sequence(),
                    c.ch,
                    style.undo_sequence()
                );
                (
                    text,
                    Applied::Character {
                        prev,
                        end: cursor.coordinate(),
                        old_cell,
                    },
                )
            }
            Prediction::Backspace => {
                let prev = cursor.coordinate();
                let row = prev.base_y + prev.y as i64;
                let at_eol = (prev.x..grid.cols())
                    .all(|x| grid.cell(x, row).map_or(true, |cell| cell.ch == ' '));
                let old_cell = if prev.x > 0 {
                    grid.cell(prev.x - 1, row)
                } else {
                    None
                };
                let mut text = cursor.shift(-1, 0);
                text.push_str(DELETE_CHAR);
                (
                    text,
                    Applied::Backspace {
                        prev,
                        end: cursor.coordinate(),
                        old_cell,
                        at_eol,
                    },
                )
            }
            Prediction::Newline => {
                let prev = cursor.coordinate();
                cursor.set_x(0);
                cursor.advance(0, 1);
                (
                    "\r\n".into(),
                    Applied::Newline {
                        prev,
                        end: cursor.coordinate(),
                    },
                )
            }
            Prediction::Linewrap => {
                let prev = cursor.coordinate();
                cursor.set_x(0);
                cursor.advance(0, 1);
                (
                    " \r".into(),
                    Applied::Linewrap {
                        prev,
                        end: cursor.coordinate(),
                    },
                )
            }
            Prediction::CursorMove(m) => {
                let prev = cursor.coordinate();
                let amount = if m.by_words {
                    word_move_amount(grid, prev, m.direction)
                } else {
                    m.amount
                };
                let delta = match m.direction {
                    MoveDirection::Back => -(amount as i32),
                    MoveDirection::Forwards => amount as i32,
                };
                let text = cursor.shift(delta, 0);
                (
                    text,
                    Applied::CursorMove {
                        prev,
                        end: cursor.coordinate(),
                        amount,
                    },
                )
            }
        }
    }

    /// Test whether the reader's upcoming bytes confirm this prediction.
    /// Consumes the matched bytes on Success, restores the index on Failure.
    pub fn matches(
        &self,
        applied: Option<&Applied>,
        reader: &mut StringReader<'_>,
        look_behind: Option<&Prediction>,
    ) -> MatchResult {
        match self {
            Prediction::HardBoundary => MatchResult::Failure,
            Prediction::Tentative(inner) => match applied {
                Some(Applied::Tentative { inner: applied, .. }) => {
                    inner.matches(Some(applied), reader, look_behind)
                }
                _ => MatchResult::Failure,
            },
            Prediction::Character(c) => {
                let start = reader.index;
                // Servers may restyle before echoing
                while reader.eat_re(&STYLE_RE).is_some() {}
                if reader.eof() || PARTIAL_STYLE_RE.is_match(reader.rest()) {
                    reader.skip_to_end();
                    return MatchResult::Buffer;
                }
                if reader.eat_char(c.ch).is_some() {
                    return MatchResult::Success;
                }
                // Some shells redraw the preceding character along with the
                // echoed one
                if let Some(behind) = look_behind.and_then(Prediction::as_character) {
                    let quirk = format!("\x08{}{}", behind.ch, c.ch);
                    let result = reader.eat_gradually(&quirk);
                    if result != MatchResult::Failure {
                        return result;
                    }
                }
                reader.index = start;
                MatchResult::Failure
            }
            Prediction::Backspace => {
                let Some(Applied::Backspace { at_eol, .. }) = applied else {
                    return MatchResult::Failure;
                };
                if !at_eol {
                    return MatchResult::Failure;
                }
                let result = reader.eat_gradually("\x08\x1b[K");
                if result != MatchResult::Failure {
                    return result;
                }
                reader.eat_gradually("\x08 \x08")
            }
            Prediction::Newline => reader.eat_gradually("\r\n"),
            Prediction::Linewrap => {
                // bash wraps with a space + CR
                match reader.eat_gradually(" \r") {
                    MatchResult::Failure => MatchResult::Failure,
                    MatchResult::Buffer => MatchResult::Buffer,
                    MatchResult::Success => {
                        // zsh additionally clears the rest of the line
                        match reader.eat_gradually(DELETE_REST_OF_LINE) {
                            MatchResult::Buffer => MatchResult::Buffer,
                            _ => MatchResult::Success,
                        }
                    }
                }
            }
            Prediction::CursorMove(m) => {
                let Some(Applied::CursorMove { end, amount, .. }) = applied else {
                    return MatchResult::Failure;
                };
                let (end, amount) = (*end, *amount);
                let csi = m.direction.csi_char();
                if m.direction == MoveDirection::Back {
                    let result = reader.eat_gradually(&"\x08".repeat(amount));
                    if result != MatchResult::Failure {
                        return result;
                    }
                }
                let single = format!("\x1b[{csi}");
                let result = reader.eat_gradually(&single.repeat(amount));
                if result != MatchResult::Failure {
                    return result;
                }
                let absolute = format!("\x1b[{};{}H", end.y + 1, end.x + 1);
                let result = reader.eat_gradually(&absolute);
                if result != MatchResult::Failure {
                    return result;
                }
                reader.eat_gradually(&format!("\x1b[{amount}{csi}"))
            }
        }
    }

    /// The byte-exact undo of `apply`'s rendering. Returns an empty string
    /// for predictions that never rendered (or were never applied).
    pub fn rollback(&self, applied: Option<&Applied>, cursor: &mut Cursor) -> String {
        match (self, applied) {
            (Prediction::Character(_), Some(Applied::Character { prev, old_cell, .. })) => {
                let mut out = cursor.move_to(*prev);
                match old_cell {
                    Some(cell) if !cell.is_default() => {
                        out.push_str(&cell_style_sequence(cell));
                        out.push(cell.ch);
                        out.push_str(&cursor.move_to(*prev));
                    }
                    _ => out.push_str(DELETE_CHAR),
                }
                out
            }
            (Prediction::Backspace, Some(Applied::Backspace { prev, old_cell, .. })) => {
                let mut out = String::new();
                if prev.x > 0 {
                    if let Some(cell) = old_cell.filter(|cell| !cell.is_default()) {
                        let erased = Coordinate {
                            x: prev.x - 1,
                            ..*prev
                        };
                        out.push_str(&cursor.move_to(erased));
                        out.push_str(&cell_style_sequence(&cell));
                        out.push(cell.ch);
                    }
                }
                out.push_str(&cursor.move_to(*prev));
                out
            }
            (Prediction::Newline, Some(Applied::Newline { prev, .. }))
            | (Prediction::Linewrap, Some(Applied::Linewrap { prev, .. }))
            | (Prediction::CursorMove(_), Some(Applied::CursorMove { prev, .. })) => {
                cursor.move_to(*prev)
            }
            _ => String::new(),
        }
    }

    /// Re-emit the confirmed server bytes positioned where the prediction
    /// was applied. The physical cursor is not repositioned here; the
    /// reconciler appends one final move instruction per pass.
    pub fn roll_forwards(
        &self,
        applied: Option<&Applied>,
        matched: &str,
        cursor: &mut Cursor,
    ) -> String {
        match applied {
            Some(Applied::Tentative { end, .. }) => {
                // The real bytes did the work; just sync bookkeeping
                cursor.warp(*end);
                matched.to_string()
            }
            Some(applied) => match applied.prev() {
                Some(prev) => {
                    let mut probe = cursor.clone();
                    format!("{}{}", probe.move_to(prev), matched)
                }
                None => matched.to_string(),
            },
            None => String::new(),
        }
    }

    /// Whether rolling this prediction back can leave the terminal in a
    /// different SGR state, requiring the current style to be re-emitted.
    pub fn affects_style(&self) -> bool {
        matches!(self, Prediction::Character(_) | Prediction::Backspace)
    }

    /// The character prediction inside this one, unwrapping tentative
    /// wrappers. Used for the look-behind echo quirk.
    pub fn as_character(&self) -> Option<&CharacterPrediction> {
        match self {
            Prediction::Character(c) => Some(c),
            Prediction::Tentative(inner) => inner.as_character(),
            _ => None,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Distance of one word-wise motion over grid content: skip any leading
/// non-word run, then consume word characters until the next boundary.
fn word_move_amount(grid: &dyn Grid, pos: Coordinate, direction: MoveDirection) -> usize {
    let row = pos.base_y + pos.y as i64;
    let char_at = |x: u16| grid.cell(x, row).map(|cell| cell.ch).unwrap_or(' ');
    let mut amount = 0usize;
    match direction {
        MoveDirection::Back => {
            let mut x = pos.x;
            while x > 0 && !is_word_char(char_at(x - 1)) {
                x -= 1;
                amount += 1;
            }
            while x > 0 && is_word_char(char_at(x - 1)) {
                x -= 1;
                amount += 1;
            }
        }
        MoveDirection::Forwards => {
            let cols = grid.cols();
            let mut x = pos.x;
            while x < cols && !is_word_char(char_at(x)) {
                x += 1;
                amount += 1;
            }
            while x < cols && is_word_char(char_at(x)) {
                x += 1;
                amount += 1;
            }
        }
    }
    amount
}
