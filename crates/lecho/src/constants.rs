//! Escape sequences, policy thresholds and timing constants for lecho.

use std::time::Duration;

// =============================================================================
// Escape Sequences
// =============================================================================

/// Control Sequence Introducer.
pub const CSI: &str = "\x1b[";

/// Erase the character under the cursor without moving it (ECH).
pub const DELETE_CHAR: &str = "\x1b[X";

/// Erase from the cursor to the end of the line (EL).
pub const DELETE_REST_OF_LINE: &str = "\x1b[K";

/// Hide the cursor while reconciled output is replayed.
pub const CURSOR_HIDE: &str = "\x1b[?25l";

/// Show the cursor again after reconciled output is replayed.
pub const CURSOR_SHOW: &str = "\x1b[?25h";

// =============================================================================
// Prediction Constants
// =============================================================================

/// Sample ring capacity; old samples are overwritten once full.
pub const STATS_BUFFER_SIZE: usize = 24;

/// Minimum samples before the adaptive policy may turn predictions on.
pub const STATS_MIN_SAMPLES_TO_TURN_ON: usize = 5;

/// Minimum accuracy before the adaptive policy may turn predictions on.
pub const STATS_MIN_ACCURACY: f64 = 0.3;

/// Predictions turn off only when median latency falls below
/// `threshold / STATS_TOGGLE_OFF_THRESHOLD`.
pub const STATS_TOGGLE_OFF_THRESHOLD: f64 = 0.5;

/// User input larger than this (a paste, most likely) is never predicted.
pub const MAX_PREDICTED_INPUT_LEN: usize = 100;

// =============================================================================
// Timing Constants
// =============================================================================

/// Floor for the stale-prediction cleanup timeout.
pub const STALE_PREDICTION_FLOOR: Duration = Duration::from_millis(500);

/// The cleanup timeout scales with the worst observed latency by this factor.
pub const STALE_LATENCY_FACTOR: f64 = 1.5;

/// Interval between telemetry flushes of the prediction stats.
pub const STATS_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

// =============================================================================
// Default Values
// =============================================================================

/// Default adaptive latency threshold in milliseconds.
pub const DEFAULT_LATENCY_THRESHOLD_MS: i64 = 30;

/// Default terminal columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows.
pub const DEFAULT_ROWS: u16 = 24;
