//! The prediction timeline: a generation-ordered FIFO of speculation,
//! reconciled in order against real server output.
//!
//! Predictions queue in generations. Only the oldest generation is rendered;
//! later generations (anything queued behind a boundary) are applied against
//! a tentative cursor for bookkeeping and shown only once every older
//! prediction has resolved. Server output is consumed entry by entry: a
//! match rolls the prediction forward, a mismatch rolls the rendered
//! generation back in reverse and drops all remaining speculation, and a
//! partial match buffers the tail until more output arrives.

use std::collections::VecDeque;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, trace};

use crate::constants::{CURSOR_HIDE, CURSOR_SHOW};
use crate::cursor::{Coordinate, Cursor};
use crate::prediction::{Applied, Prediction};
use crate::reader::{MatchResult, StringReader};
use crate::style::TypeAheadStyle;
use crate::term::Grid;

/// Sequences that interleave with echoed input without confirming or
/// refuting any prediction: cursor visibility toggles and status queries.
static PREDICTION_OMITTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\x1b\[\??25[hl]|\x1b\[6n)+").expect("pattern compiles"));

/// Outcome of one resolved prediction, drained by the stats layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub correct: bool,
    pub latency: Duration,
}

struct Entry {
    gen: u64,
    prediction: Prediction,
    applied: Option<Applied>,
    queued_at: Instant,
}

/// Generation-ordered queue of pending predictions plus the cursors and
/// style state needed to render and reconcile them.
pub struct PredictionTimeline {
    expected: VecDeque<Entry>,
    current_gen: u64,
    /// Where the next rendered prediction goes; `None` until predictions are
    /// queued, and dropped whenever speculation is invalidated.
    physical_cursor: Option<Cursor>,
    /// Where speculation behind a boundary would go.
    tentative_cursor: Option<Cursor>,
    /// Unconsumed tail of a partially-matched chunk.
    input_buffer: Option<String>,
    show_predictions: bool,
    /// The last confirmed prediction, kept for shell echo quirks that redraw
    /// the preceding character.
    look_behind: Option<Prediction>,
    resolutions: Vec<Resolution>,
    style: TypeAheadStyle,
}

impl PredictionTimeline {
    pub fn new(style: TypeAheadStyle) -> Self {
        Self {
            expected: VecDeque::new(),
            current_gen: 0,
            physical_cursor: None,
            tentative_cursor: None,
            input_buffer: None,
            show_predictions: false,
            look_behind: None,
            resolutions: Vec::new(),
            style,
        }
    }

    /// Number of queued predictions.
    pub fn len(&self) -> usize {
        self.expected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    pub fn current_gen(&self) -> u64 {
        self.current_gen
    }

    pub fn is_showing_predictions(&self) -> bool {
        self.show_predictions
    }

    /// Toggle rendering. Queued speculation keeps accumulating either way,
    /// feeding the stats that drive this very decision.
    pub fn set_show_predictions(&mut self, show: bool) {
        self.show_predictions = show;
    }

    pub fn style(&self) -> &TypeAheadStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut TypeAheadStyle {
        &mut self.style
    }

    /// Resolutions recorded since the last drain.
    pub fn drain_resolutions(&mut self) -> Vec<Resolution> {
        std::mem::take(&mut self.resolutions)
    }

    /// Where the next queued prediction would land, accounting for pending
    /// speculation behind boundaries.
    pub fn tentative_coordinate(&mut self, grid: &dyn Grid) -> Coordinate {
        self.tentative_mut(grid).coordinate()
    }

    fn physical_take(&mut self, grid: &dyn Grid) -> Cursor {
        self.physical_cursor
            .take()
            .unwrap_or_else(|| Cursor::from_grid(grid))
    }

    fn tentative_mut(&mut self, grid: &dyn Grid) -> &mut Cursor {
        let snapshot = self
            .physical_cursor
            .get_or_insert_with(|| Cursor::from_grid(grid))
            .clone();
        self.tentative_cursor.get_or_insert(snapshot)
    }

    fn clear_cursor(&mut self) {
        self.physical_cursor = None;
        self.tentative_cursor = None;
    }

    fn clear_prediction_state(&mut self) {
        self.expected.clear();
        self.clear_cursor();
        self.look_behind = None;
    }

    /// Drop all speculation without emitting anything. Used when the display
    /// is invalidated wholesale (resize, disposal).
    pub fn clear(&mut self) {
        self.clear_prediction_state();
        self.input_buffer = None;
    }

    /// Queue a prediction in the current generation. Returns whether it was
    /// rendered immediately (only oldest-generation predictions are).
    pub fn add_prediction(&mut self, grid: &mut dyn Grid, prediction: Prediction) -> bool {
        let gen = self.current_gen;
        let oldest_gen = self.expected.front().map_or(gen, |entry| entry.gen);
        let queued_at = Instant::now();

        if gen != oldest_gen {
            // Boundary pending: speculate against the tentative cursor only
            let mut cursor = self.tentative_mut(grid).clone();
            let (_, applied) = prediction.apply(grid, &mut cursor, &self.style);
            self.tentative_cursor = Some(cursor);
            trace!(gen, deferred = true, "queued prediction");
            self.expected.push_back(Entry {
                gen,
                prediction,
                applied: Some(applied),
                queued_at,
            });
            return false;
        }

        let mut cursor = self.physical_take(grid);
        let (text, applied) = prediction.apply(grid, &mut cursor, &self.style);
        self.physical_cursor = Some(cursor);
        // Tentative state re-derives from the physical cursor on next use
        self.tentative_cursor = None;
        trace!(gen, deferred = false, "queued prediction");
        self.expected.push_back(Entry {
            gen,
            prediction,
            applied: Some(applied),
            queued_at,
        });
        if self.show_predictions && !text.is_empty() {
            grid.write(&text);
        }
        true
    }

    /// Start a new generation, optionally queueing a tentative prediction
    /// ahead of the boundary.
    pub fn add_boundary(&mut self, grid: &mut dyn Grid, prediction: Option<Prediction>) {
        if let Some(p) = prediction {
            self.add_prediction(grid, Prediction::Tentative(Box::new(p)));
        }
        self.current_gen += 1;
        debug!(gen = self.current_gen, "prediction boundary");
    }

    /// Reconcile a chunk of server output against the queue, returning the
    /// text that should reach the terminal in its place.
    pub fn before_server_input(&mut self, grid: &mut dyn Grid, input: &str) -> String {
        let original = input;
        let combined;
        let input: &str = match self.input_buffer.take() {
            Some(mut stash) => {
                stash.push_str(input);
                combined = stash;
                &combined
            }
            None => input,
        };

        if self.expected.is_empty() {
            self.clear_prediction_state();
            return input.to_string();
        }

        let starting_gen = self.expected.front().map_or(self.current_gen, |e| e.gen);
        let mut output = String::new();
        let mut reader = StringReader::new(input);

        'read: while !reader.eof() {
            if let Some(omitted) = reader.eat_re(&PREDICTION_OMITTED_RE) {
                output.push_str(omitted);
                continue;
            }
            let Some(front) = self.expected.front() else {
                break;
            };
            let before_index = reader.index;
            let result =
                front
                    .prediction
                    .matches(front.applied.as_ref(), &mut reader, self.look_behind.as_ref());
            match result {
                MatchResult::Success => {
                    let matched = &input[before_index..reader.index];
                    let Some(mut entry) = self.expected.pop_front() else {
                        break;
                    };
                    let latency = entry.queued_at.elapsed();
                    let mut cursor = self.physical_take(grid);
                    if entry.gen == starting_gen {
                        output.push_str(&entry.prediction.roll_forwards(
                            entry.applied.as_ref(),
                            matched,
                            &mut cursor,
                        ));
                    } else {
                        // Promote a never-rendered prediction: catch the
                        // render bookkeeping up and let the real bytes draw
                        let (_, applied) = entry.prediction.apply(grid, &mut cursor, &self.style);
                        entry.applied = Some(applied);
                        output.push_str(matched);
                    }
                    self.physical_cursor = Some(cursor);
                    trace!(gen = entry.gen, "prediction confirmed");
                    self.resolutions.push(Resolution {
                        correct: true,
                        latency,
                    });
                    self.look_behind = Some(entry.prediction);
                }
                MatchResult::Buffer => {
                    // Withhold the ambiguous tail until more output arrives
                    self.input_buffer = Some(input[before_index..].to_string());
                    reader.skip_to_end();
                    break 'read;
                }
                MatchResult::Failure => {
                    let latency = front.queued_at.elapsed();
                    debug!(gen = starting_gen, "prediction mismatch, rolling back");
                    let entries: Vec<Entry> = self.expected.drain(..).collect();
                    let mut cursor = self.physical_take(grid);
                    let mut restore_style = false;
                    for entry in entries.iter().rev() {
                        // Only the oldest generation ever rendered anything
                        if entry.gen != starting_gen {
                            continue;
                        }
                        restore_style |= entry.prediction.affects_style();
                        output.push_str(
                            &entry.prediction.rollback(entry.applied.as_ref(), &mut cursor),
                        );
                    }
                    if restore_style {
                        output.push_str(&self.style.current_sequence());
                    }
                    self.resolutions.push(Resolution {
                        correct: false,
                        latency,
                    });
                    self.clear_prediction_state();
                    break 'read;
                }
            }
        }

        // Output we never predicted invalidates whatever is still queued
        if !reader.eof() {
            output.push_str(reader.rest());
            if !self.expected.is_empty() {
                debug!(
                    pending = self.expected.len(),
                    "unpredicted output, dropping speculation"
                );
                self.expected.clear();
            }
            self.clear_cursor();
        }

        // A fully-resolved generation uncovers the next one: render it now
        if let Some(front_gen) = self.expected.front().map(|e| e.gen) {
            if front_gen != starting_gen {
                let mut cursor = self.physical_take(grid);
                let mut styled = 0;
                for entry in self.expected.iter_mut() {
                    if entry.gen != front_gen {
                        break;
                    }
                    let (text, applied) = entry.prediction.apply(grid, &mut cursor, &self.style);
                    entry.applied = Some(applied);
                    // Only character renders carry an apply/undo SGR pair;
                    // backspace output is a move plus an erase
                    if matches!(entry.prediction, Prediction::Character(_)) {
                        styled += 1;
                    }
                    output.push_str(&text);
                }
                self.physical_cursor = Some(cursor);
                self.tentative_cursor = None;
                if self.show_predictions && styled > 0 {
                    self.style.expect_incoming_style(styled);
                }
            }
        }

        if !self.show_predictions {
            // Speculation ran purely for statistics; the terminal gets the
            // raw bytes
            return original.to_string();
        }
        if output.is_empty() || output == input {
            return output;
        }
        if let Some(cursor) = &self.physical_cursor {
            output.push_str(&cursor.move_instruction());
        }
        // Hide the cursor while the reconciled text replays
        format!("{CURSOR_HIDE}{output}{CURSOR_SHOW}")
    }

    /// Roll back everything rendered, in reverse order, and drop the queue.
    /// Used when speculation went stale or the viewport changed.
    pub fn undo_all_predictions(&mut self) -> String {
        let mut output = String::new();
        if let Some(mut cursor) = self.physical_cursor.take() {
            let oldest_gen = self.expected.front().map(|e| e.gen);
            let mut restore_style = false;
            for entry in self.expected.iter().rev() {
                if Some(entry.gen) != oldest_gen {
                    continue;
                }
                restore_style |= entry.prediction.affects_style();
                output.push_str(&entry.prediction.rollback(entry.applied.as_ref(), &mut cursor));
            }
            if restore_style {
                output.push_str(&self.style.current_sequence());
            }
        }
        self.clear_prediction_state();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;
    use crate::prediction::{CharacterPrediction, CursorMovePrediction, MoveDirection};
    use crate::term::VtGrid;

    fn setup(content: &str) -> (VtGrid, PredictionTimeline) {
        let mut grid = VtGrid::new(80, 24);
        grid.write(content);
        let mut timeline = PredictionTimeline::new(TypeAheadStyle::new(StyleConfig::Dim));
        timeline.set_show_predictions(true);
        (grid, timeline)
    }

    fn character(ch: char) -> Prediction {
        Prediction::Character(CharacterPrediction { ch })
    }

    #[test]
    fn confirmed_prediction_rolls_forward() {
        let (mut grid, mut timeline) = setup("$ ");
        assert!(timeline.add_prediction(&mut grid, character('h')));
        assert_eq!(grid.row_text(0), "$ h");
        assert!(grid.cell(2, 0).unwrap().attrs.dim);

        let out = timeline.before_server_input(&mut grid, "h");
        assert!(out.starts_with(CURSOR_HIDE) && out.ends_with(CURSOR_SHOW));
        assert!(out.contains('h'));
        assert!(timeline.is_empty());

        grid.write(&out);
        assert_eq!(grid.row_text(0), "$ h");
        // The confirming byte replaced the styled speculation
        assert!(!grid.cell(2, 0).unwrap().attrs.dim);
        assert_eq!(grid.cursor().x, 3);

        let resolutions = timeline.drain_resolutions();
        assert_eq!(resolutions.len(), 1);
        assert!(resolutions[0].correct);
    }

    #[test]
    fn mismatch_rolls_back_in_reverse_and_passes_output_through() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('l'));
        timeline.add_prediction(&mut grid, character('s'));
        assert_eq!(grid.row_text(0), "$ ls");

        let out = timeline.before_server_input(&mut grid, "Err.\r\n");
        grid.write(&out);
        assert_eq!(grid.row_text(0), "$ Err.");
        assert!(timeline.is_empty());

        let resolutions = timeline.drain_resolutions();
        assert_eq!(resolutions.len(), 1);
        assert!(!resolutions[0].correct);
    }

    #[test]
    fn empty_queue_passes_input_through_untouched() {
        let (mut grid, mut timeline) = setup("$ ");
        let out = timeline.before_server_input(&mut grid, "banner text\r\n");
        assert_eq!(out, "banner text\r\n");
    }

    #[test]
    fn partial_match_buffers_across_chunks() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('a'));
        timeline.add_prediction(&mut grid, character('b'));

        // First chunk confirms 'a' and ends inside an SGR sequence
        let out = timeline.before_server_input(&mut grid, "a\x1b[");
        grid.write(&out);
        assert_eq!(timeline.len(), 1);

        let out = timeline.before_server_input(&mut grid, "2mb");
        grid.write(&out);
        assert!(timeline.is_empty());
        assert_eq!(grid.row_text(0), "$ ab");
        assert!(timeline.drain_resolutions().iter().all(|r| r.correct));
    }

    #[test]
    fn boundary_defers_rendering_until_promotion() {
        let (mut grid, mut timeline) = setup("$ ");
        assert!(timeline.add_prediction(&mut grid, character('a')));
        timeline.add_boundary(&mut grid, None);
        // Behind the boundary: queued but not rendered
        assert!(!timeline.add_prediction(&mut grid, character('b')));
        assert_eq!(grid.row_text(0), "$ a");

        let out = timeline.before_server_input(&mut grid, "ab");
        grid.write(&out);
        assert!(timeline.is_empty());
        assert_eq!(grid.row_text(0), "$ ab");
        assert_eq!(grid.cursor().x, 4);
    }

    #[test]
    fn resolved_generation_uncovers_the_next() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('a'));
        timeline.add_boundary(&mut grid, None);
        timeline.add_prediction(&mut grid, character('b'));

        // Only the first generation resolves; the second renders now
        let out = timeline.before_server_input(&mut grid, "a");
        grid.write(&out);
        assert_eq!(timeline.len(), 1);
        assert_eq!(grid.row_text(0), "$ ab");
        assert!(grid.cell(3, 0).unwrap().attrs.dim);

        let out = timeline.before_server_input(&mut grid, "b");
        grid.write(&out);
        assert!(timeline.is_empty());
        assert!(!grid.cell(3, 0).unwrap().attrs.dim);
    }

    #[test]
    fn uncovered_backspace_leaves_no_style_expectation() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('c'));
        timeline.add_boundary(&mut grid, None);
        timeline.add_prediction(&mut grid, Prediction::Backspace);

        // Resolving 'c' uncovers and renders the backspace, whose output
        // contains no SGR
        let out = timeline.before_server_input(&mut grid, "c");
        grid.write(&out);
        assert_eq!(timeline.len(), 1);

        // A genuinely external dim must update tracking, not be consumed as
        // the echo of a styled render
        timeline.style_mut().on_did_write_sgr("2");
        assert_eq!(timeline.style().undo_sequence(), "\x1b[2m");
    }

    #[test]
    fn hard_boundary_forces_rollback_on_any_output() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('x'));
        timeline.add_boundary(&mut grid, Some(Prediction::HardBoundary));

        let out = timeline.before_server_input(&mut grid, "x\x07");
        grid.write(&out);
        // 'x' confirmed, then the boundary refused the bell
        assert!(timeline.is_empty());
        let resolutions = timeline.drain_resolutions();
        assert_eq!(resolutions.len(), 2);
        assert!(resolutions[0].correct);
        assert!(!resolutions[1].correct);
    }

    #[test]
    fn cursor_visibility_toggles_are_passed_over() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('h'));
        let out = timeline.before_server_input(&mut grid, "\x1b[?25lh\x1b[?25h");
        grid.write(&out);
        assert!(timeline.is_empty());
        assert_eq!(grid.row_text(0), "$ h");
    }

    #[test]
    fn unpredicted_trailing_output_clears_queue() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('h'));
        timeline.add_boundary(&mut grid, None);
        timeline.add_prediction(&mut grid, character('i'));

        let out = timeline.before_server_input(&mut grid, "h\r\nlots of output");
        grid.write(&out);
        assert!(timeline.is_empty());
        assert_eq!(grid.row_text(0), "$ h");
        assert_eq!(grid.row_text(1), "lots of output");
    }

    #[test]
    fn hidden_predictions_return_raw_input() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.set_show_predictions(false);
        timeline.add_prediction(&mut grid, character('h'));
        // Nothing rendered
        assert_eq!(grid.row_text(0), "$");

        let out = timeline.before_server_input(&mut grid, "h");
        assert_eq!(out, "h");
        // Resolution still recorded for the stats
        assert!(timeline.drain_resolutions()[0].correct);
    }

    #[test]
    fn undo_all_predictions_restores_display() {
        let (mut grid, mut timeline) = setup("$ ");
        timeline.add_prediction(&mut grid, character('h'));
        timeline.add_prediction(&mut grid, character('i'));
        assert_eq!(grid.row_text(0), "$ hi");

        let out = timeline.undo_all_predictions();
        grid.write(&out);
        assert_eq!(grid.row_text(0), "$");
        assert_eq!(grid.cursor().x, 2);
        assert!(timeline.is_empty());
    }

    #[test]
    fn cursor_move_prediction_reconciles() {
        let (mut grid, mut timeline) = setup("$ echo");
        timeline.add_prediction(
            &mut grid,
            Prediction::CursorMove(CursorMovePrediction {
                direction: MoveDirection::Back,
                by_words: false,
                amount: 1,
            }),
        );
        let out = timeline.before_server_input(&mut grid, "\x08");
        grid.write(&out);
        assert!(timeline.is_empty());
        assert_eq!(grid.cursor().x, 5);
    }
}
