//! The typeahead controller: translates user keystrokes into predictions,
//! routes server output through the timeline, and decides whether
//! predictions are shown at all.
//!
//! Speculation always runs (it feeds the latency/accuracy stats); rendering
//! is gated by the policy: a negative latency threshold disables display, a
//! zero threshold forces it, and a positive threshold enables it adaptively
//! once the connection is demonstrably slow and predictions demonstrably
//! land.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use crate::config::TypeAheadConfig;
use crate::constants::{
    MAX_PREDICTED_INPUT_LEN, STALE_LATENCY_FACTOR, STALE_PREDICTION_FLOOR, STATS_MIN_ACCURACY,
    STATS_MIN_SAMPLES_TO_TURN_ON, STATS_TOGGLE_OFF_THRESHOLD,
};
use crate::prediction::{
    CharacterPrediction, CursorMovePrediction, MoveDirection, Prediction,
};
use crate::reader::StringReader;
use crate::stats::{PredictionStats, StatsReport};
use crate::style::TypeAheadStyle;
use crate::term::Grid;
use crate::timeline::PredictionTimeline;
use crate::Result;

/// Arrow keys (normal and application mode), ctrl/alt arrows, and the
/// alt-b/alt-f word motions.
static CURSOR_MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x1b(?:\[1;[35][CD]|\[[CD]|O[CD]|[bf])").expect("pattern compiles")
});

/// SGR sequences in terminal-bound output, fed to the style tracker.
static SGR_SCAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[([0-9;:]*)m").expect("pattern compiles"));

/// The row the user is editing: backspaces and left motions that would cross
/// the leftmost column typed here run into the prompt, whose redraw behavior
/// is shell-specific.
#[derive(Debug, Clone, Copy)]
struct LastRow {
    y: i64,
    starting_x: u16,
}

/// Top-level typeahead engine driver.
pub struct TypeAheadController {
    timeline: PredictionTimeline,
    stats: PredictionStats,
    config: TypeAheadConfig,
    exclude_re: Option<Regex>,
    last_row: Option<LastRow>,
    stale_deadline: Option<Instant>,
}

impl TypeAheadController {
    pub fn new(config: TypeAheadConfig) -> Result<Self> {
        let exclude_re = compile_exclude(&config.exclude_programs)?;
        let mut timeline = PredictionTimeline::new(TypeAheadStyle::new(config.style));
        timeline.set_show_predictions(config.latency_threshold_ms == 0);
        Ok(Self {
            timeline,
            stats: PredictionStats::new(),
            config,
            exclude_re,
            last_row: None,
            stale_deadline: None,
        })
    }

    pub fn config(&self) -> &TypeAheadConfig {
        &self.config
    }

    pub fn timeline(&self) -> &PredictionTimeline {
        &self.timeline
    }

    /// Snapshot of the rolling prediction stats.
    pub fn stats_report(&self) -> StatsReport {
        self.stats.report()
    }

    /// Translate a chunk of user input into predictions.
    pub fn on_user_input(&mut self, grid: &mut dyn Grid, data: &str) {
        if grid.alternate_active() {
            // Full-screen programs manage their own display
            return;
        }
        // The grid has seen all prior output by now; decide visibility
        // before anything renders
        self.reevaluate(grid);
        if data.len() > MAX_PREDICTED_INPUT_LEN {
            // A paste; the echo of that much input is anyone's guess
            self.timeline
                .add_boundary(grid, Some(Prediction::HardBoundary));
            self.rearm_stale_timer();
            return;
        }

        self.track_prompt_row(grid);
        let starting_x = self.last_row.map_or(0, |row| row.starting_x);

        let mut reader = StringReader::new(data);
        while !reader.eof() {
            if reader.eat_char('\x7f').is_some() {
                // Deleting left of anything typed on this row hits the
                // prompt, which we cannot model
                if self.timeline.tentative_coordinate(grid).x > starting_x {
                    self.timeline.add_prediction(grid, Prediction::Backspace);
                } else {
                    self.timeline
                        .add_boundary(grid, Some(Prediction::Backspace));
                }
                continue;
            }
            if reader.eat_char('\r').is_some() {
                let at_bottom =
                    self.timeline.tentative_coordinate(grid).y + 1 >= grid.rows();
                if at_bottom {
                    // The viewport scrolls; what gets redrawn varies
                    self.timeline
                        .add_boundary(grid, Some(Prediction::Newline));
                } else {
                    self.timeline.add_prediction(grid, Prediction::Newline);
                }
                continue;
            }
            if let Some(seq) = reader.eat_re(&CURSOR_MOVE_RE) {
                let movement = parse_cursor_move(seq);
                let guarded = movement.direction == MoveDirection::Back
                    && self.timeline.tentative_coordinate(grid).x <= starting_x;
                if guarded {
                    self.timeline
                        .add_boundary(grid, Some(Prediction::CursorMove(movement)));
                } else {
                    self.timeline
                        .add_prediction(grid, Prediction::CursorMove(movement));
                }
                continue;
            }
            let Some(c) = reader.rest().chars().next() else {
                break;
            };
            if ('\x20'..='\x7e').contains(&c) {
                let _ = reader.eat_char(c);
                let at_last_col =
                    self.timeline.tentative_coordinate(grid).x + 1 >= grid.cols();
                self.timeline
                    .add_prediction(grid, Prediction::Character(CharacterPrediction { ch: c }));
                if at_last_col {
                    self.timeline
                        .add_boundary(grid, Some(Prediction::Linewrap));
                }
                continue;
            }
            // Tabs, escape chords, control characters: no safe model
            self.timeline
                .add_boundary(grid, Some(Prediction::HardBoundary));
            break;
        }
        self.rearm_stale_timer();
    }

    /// Reconcile server output, update stats and style tracking, and
    /// re-evaluate the display policy. The returned text is what should
    /// reach the terminal.
    pub fn before_server_input(&mut self, grid: &mut dyn Grid, input: &str) -> String {
        let output = self.timeline.before_server_input(grid, input);
        for resolution in self.timeline.drain_resolutions() {
            self.stats.record(resolution.latency, resolution.correct);
        }
        for caps in SGR_SCAN_RE.captures_iter(&output) {
            if let Some(params) = caps.get(1) {
                self.timeline.style_mut().on_did_write_sgr(params.as_str());
            }
        }
        self.reevaluate(grid);
        self.rearm_stale_timer();
        output
    }

    /// When the next queued prediction should be considered stale.
    pub fn stale_deadline(&self) -> Option<Instant> {
        self.stale_deadline
    }

    /// Give up on pending speculation: undo everything rendered and drop the
    /// queue. Returns the undo text (also written to the grid).
    pub fn on_stale_timeout(&mut self, grid: &mut dyn Grid) -> String {
        debug!(pending = self.timeline.len(), "typeahead predictions went stale");
        self.last_row = None;
        self.stale_deadline = None;
        let undo = self.timeline.undo_all_predictions();
        if !undo.is_empty() {
            grid.write(&undo);
        }
        undo
    }

    /// Resizing reflows wrapped rows; every cached coordinate is suspect.
    pub fn on_resize(&mut self, grid: &mut dyn Grid) -> String {
        self.last_row = None;
        self.stale_deadline = None;
        let undo = self.timeline.undo_all_predictions();
        if !undo.is_empty() {
            grid.write(&undo);
        }
        undo
    }

    fn track_prompt_row(&mut self, grid: &dyn Grid) {
        let cursor = grid.cursor();
        let absolute_y = cursor.base_y + cursor.y as i64;
        match &mut self.last_row {
            Some(row) if row.y == absolute_y => {
                row.starting_x = row.starting_x.min(cursor.x);
            }
            _ => {
                self.last_row = Some(LastRow {
                    y: absolute_y,
                    starting_x: cursor.x,
                });
            }
        }
    }

    fn reevaluate(&mut self, grid: &dyn Grid) {
        let show = self.evaluate_policy(grid.title());
        if show != self.timeline.is_showing_predictions() {
            debug!(show, "typeahead display toggled");
        }
        self.timeline.set_show_predictions(show);
    }

    fn evaluate_policy(&self, title: &str) -> bool {
        if let Some(re) = &self.exclude_re {
            if re.is_match(title) {
                return false;
            }
        }
        let threshold = self.config.latency_threshold_ms;
        if threshold < 0 {
            return false;
        }
        if threshold == 0 {
            return true;
        }
        if self.stats.sample_count() >= STATS_MIN_SAMPLES_TO_TURN_ON
            && self.stats.accuracy() > STATS_MIN_ACCURACY
        {
            if let Some(median) = self.stats.latency().median {
                let median_ms = median.as_millis() as f64;
                if median_ms >= threshold as f64 {
                    return true;
                }
                if median_ms < threshold as f64 / STATS_TOGGLE_OFF_THRESHOLD {
                    return false;
                }
            }
        }
        // Not enough signal either way: keep the current decision
        self.timeline.is_showing_predictions()
    }

    fn cleanup_timeout(&self) -> Duration {
        match self.stats.max_latency() {
            Some(max) => STALE_PREDICTION_FLOOR.max(max.mul_f64(STALE_LATENCY_FACTOR)),
            None => STALE_PREDICTION_FLOOR,
        }
    }

    fn rearm_stale_timer(&mut self) {
        self.stale_deadline = if self.timeline.is_empty() {
            None
        } else {
            Some(Instant::now() + self.cleanup_timeout())
        };
    }
}

fn compile_exclude(programs: &[String]) -> Result<Option<Regex>> {
    if programs.is_empty() {
        return Ok(None);
    }
    let alternation: Vec<String> = programs.iter().map(|p| regex::escape(p)).collect();
    let pattern = format!(r"(?i)\b(?:{})\b", alternation.join("|"));
    Ok(Some(Regex::new(&pattern)?))
}

fn parse_cursor_move(seq: &str) -> CursorMovePrediction {
    let last = seq.chars().last().unwrap_or('D');
    let by_words = last == 'b' || last == 'f' || seq.contains(";3") || seq.contains(";5");
    let direction = match last {
        'C' | 'f' => MoveDirection::Forwards,
        _ => MoveDirection::Back,
    };
    CursorMovePrediction {
        direction,
        by_words,
        amount: 1,
    }
}
