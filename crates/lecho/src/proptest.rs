//! Property-based tests for prediction rendering and reconciliation.
//!
//! These tests use proptest to verify:
//! - Rolling back speculation restores the display byte-for-byte
//! - Reconciling an exact echo resolves every prediction as correct
//! - Reconciliation is insensitive to how the echo is chunked

#![cfg(test)]

use proptest::prelude::*;

use crate::config::StyleConfig;
use crate::prediction::{CharacterPrediction, Prediction};
use crate::style::TypeAheadStyle;
use crate::term::{Cell, Grid, VtGrid};
use crate::timeline::PredictionTimeline;

fn prompt_grid() -> VtGrid {
    let mut grid = VtGrid::new(80, 24);
    grid.write("$ ");
    grid
}

fn timeline() -> PredictionTimeline {
    let mut timeline = PredictionTimeline::new(TypeAheadStyle::new(StyleConfig::Dim));
    timeline.set_show_predictions(true);
    timeline
}

fn predict_all(grid: &mut VtGrid, timeline: &mut PredictionTimeline, input: &str) {
    for ch in input.chars() {
        timeline.add_prediction(grid, Prediction::Character(CharacterPrediction { ch }));
    }
}

fn snapshot_row(grid: &VtGrid, row: i64) -> Vec<Option<Cell>> {
    (0..grid.cols()).map(|x| grid.cell(x, row)).collect()
}

proptest! {
    #[test]
    fn rollback_restores_the_display(input in "[ -~]{1,40}") {
        let mut grid = prompt_grid();
        let mut timeline = timeline();
        let cells_before = snapshot_row(&grid, 0);
        let cursor_before = grid.cursor();

        predict_all(&mut grid, &mut timeline, &input);
        let undo = timeline.undo_all_predictions();
        grid.write(&undo);

        prop_assert_eq!(snapshot_row(&grid, 0), cells_before);
        prop_assert_eq!(grid.cursor(), cursor_before);
    }

    #[test]
    fn exact_echo_confirms_every_prediction(input in "[ -~]{1,40}") {
        let mut grid = prompt_grid();
        let mut timeline = timeline();
        predict_all(&mut grid, &mut timeline, &input);

        let out = timeline.before_server_input(&mut grid, &input);
        grid.write(&out);

        prop_assert!(timeline.is_empty());
        let resolutions = timeline.drain_resolutions();
        prop_assert_eq!(resolutions.len(), input.chars().count());
        prop_assert!(resolutions.iter().all(|r| r.correct));
        let expected = format!("$ {input}");
        prop_assert_eq!(grid.row_text(0), expected.trim_end());
        // Confirmed text sheds the speculative styling
        for (i, _) in input.chars().enumerate() {
            let cell = grid.cell(2 + i as u16, 0).unwrap();
            prop_assert!(!cell.attrs.dim);
        }
    }

    #[test]
    fn reconciliation_is_chunking_insensitive(
        input in "[ -~]{2,40}",
        split in 1usize..40,
    ) {
        let split = split.min(input.len() - 1);
        prop_assume!(input.is_char_boundary(split));

        let mut grid = prompt_grid();
        let mut timeline = timeline();
        predict_all(&mut grid, &mut timeline, &input);

        let out = timeline.before_server_input(&mut grid, &input[..split]);
        grid.write(&out);
        let out = timeline.before_server_input(&mut grid, &input[split..]);
        grid.write(&out);

        prop_assert!(timeline.is_empty());
        let resolutions = timeline.drain_resolutions();
        prop_assert_eq!(resolutions.len(), input.chars().count());
        prop_assert!(resolutions.iter().all(|r| r.correct));
        let expected = format!("$ {input}");
        prop_assert_eq!(grid.row_text(0), expected.trim_end());
    }
}
