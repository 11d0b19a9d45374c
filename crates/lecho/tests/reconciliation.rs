//! End-to-end reconciliation tests driving a controller against a vte grid:
//! keystrokes go in, reconciled terminal bytes come out, and the grid must
//! end up exactly as a prediction-free terminal would.

use lecho::{Grid, TypeAheadConfig, TypeAheadController, VtGrid};

fn forced_on() -> TypeAheadController {
    TypeAheadController::new(TypeAheadConfig::new().with_latency_threshold_ms(0))
        .expect("default config compiles")
}

fn prompt_grid() -> VtGrid {
    let mut grid = VtGrid::new(80, 24);
    grid.write("$ ");
    grid
}

fn echo(controller: &mut TypeAheadController, grid: &mut VtGrid, server: &str) {
    let out = controller.before_server_input(grid, server);
    grid.write(&out);
}

#[test]
fn typed_input_confirmed_by_echo() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "ls");
    assert_eq!(grid.row_text(0), "$ ls");
    assert!(grid.cell(2, 0).unwrap().attrs.dim);

    echo(&mut controller, &mut grid, "ls");
    assert_eq!(grid.row_text(0), "$ ls");
    assert!(!grid.cell(2, 0).unwrap().attrs.dim);
    assert!(!grid.cell(3, 0).unwrap().attrs.dim);
    assert_eq!(grid.cursor().x, 4);

    let report = controller.stats_report();
    assert_eq!(report.latency_count, 2);
    assert_eq!(report.prediction_accuracy, 1.0);
}

#[test]
fn mispredicted_echo_is_replaced() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "l");
    assert_eq!(grid.row_text(0), "$ l");

    // The server disagrees about what was typed
    echo(&mut controller, &mut grid, "X");
    assert_eq!(grid.row_text(0), "$ X");
    assert!(controller.timeline().is_empty());
    assert!(controller.stats_report().prediction_accuracy < 1.0);
}

#[test]
fn backspace_round_trip() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "ab\x7f");
    assert_eq!(grid.row_text(0), "$ a");

    echo(&mut controller, &mut grid, "ab\x08 \x08");
    assert_eq!(grid.row_text(0), "$ a");
    assert!(controller.timeline().is_empty());
    assert_eq!(controller.stats_report().latency_count, 3);
    assert_eq!(controller.stats_report().prediction_accuracy, 1.0);
}

#[test]
fn echo_split_across_chunks() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "cat");
    echo(&mut controller, &mut grid, "c");
    assert_eq!(controller.timeline().len(), 2);
    echo(&mut controller, &mut grid, "at");
    assert!(controller.timeline().is_empty());
    assert_eq!(grid.row_text(0), "$ cat");
}

#[test]
fn styled_echo_buffered_mid_sequence() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "ab");
    // The chunk ends inside an SGR sequence preceding the echoed 'b'
    echo(&mut controller, &mut grid, "a\x1b[3");
    assert_eq!(controller.timeline().len(), 1);
    echo(&mut controller, &mut grid, "2mb");
    assert!(controller.timeline().is_empty());
    assert_eq!(grid.row_text(0), "$ ab");
}

#[test]
fn typing_to_last_column_starts_a_boundary() {
    let mut grid = VtGrid::new(10, 4);
    grid.write("$ ");
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "abcdefgh");
    // The final keystroke landed in the last column; later input defers
    assert_eq!(controller.timeline().current_gen(), 1);
    assert_eq!(grid.row_text(0), "$ abcdefgh");
}

#[test]
fn command_output_flushes_speculation() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "ls\r");
    echo(&mut controller, &mut grid, "ls\r\nfile-a  file-b\r\n$ ");
    assert!(controller.timeline().is_empty());
    assert_eq!(grid.row_text(0), "$ ls");
    assert_eq!(grid.row_text(1), "file-a  file-b");
    assert_eq!(grid.row_text(2), "$");
    assert_eq!(grid.cursor().y, 2);
}

#[test]
fn excluded_program_suppresses_rendering() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    // The shell announces vim via the title before going full-screen
    echo(&mut controller, &mut grid, "\x1b]0;vim\x07");
    controller.on_user_input(&mut grid, "jjj");
    assert_eq!(grid.row_text(0), "$");
}

#[test]
fn negative_threshold_disables_rendering_but_not_stats() {
    let mut grid = prompt_grid();
    let mut controller =
        TypeAheadController::new(TypeAheadConfig::new().with_latency_threshold_ms(-1))
            .expect("default config compiles");

    controller.on_user_input(&mut grid, "hi");
    assert_eq!(grid.row_text(0), "$");

    let out = controller.before_server_input(&mut grid, "hi");
    // Hidden mode passes server bytes through untouched
    assert_eq!(out, "hi");
    grid.write(&out);
    assert_eq!(grid.row_text(0), "$ hi");
    assert_eq!(controller.stats_report().latency_count, 2);
}

#[test]
fn resize_invalidates_speculation() {
    let mut grid = prompt_grid();
    let mut controller = forced_on();

    controller.on_user_input(&mut grid, "abc");
    controller.on_resize(&mut grid);
    grid.resize(40, 12);
    assert!(controller.timeline().is_empty());
    assert_eq!(grid.row_text(0), "$");

    // Prediction resumes cleanly afterwards
    controller.on_user_input(&mut grid, "x");
    echo(&mut controller, &mut grid, "x");
    assert_eq!(grid.row_text(0), "$ x");
}
