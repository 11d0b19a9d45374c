//! Async session loop tying a [`TypeAheadController`] to byte channels.
//!
//! The session consumes [`SessionInput`] messages (user keystrokes, server
//! output, resizes) and emits terminal-bound bytes on its output channel:
//! rendered predictions, reconciled server output, and rollbacks when
//! speculation goes stale.

use std::future;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant as TokioInstant, MissedTickBehavior};
use tracing::{debug, info};

use crate::constants::STATS_FLUSH_INTERVAL;
use crate::controller::TypeAheadController;
use crate::cursor::Coordinate;
use crate::stats::StatsReport;
use crate::term::{Cell, Grid, VtGrid};
use crate::Result;

/// Messages driving a session.
#[derive(Debug)]
pub enum SessionInput {
    /// Bytes typed by the user (already forwarded to the server by the
    /// caller; the session only speculates about their echo).
    User(Vec<u8>),
    /// Bytes received from the server, to be reconciled before display.
    Server(Vec<u8>),
    /// The terminal viewport changed.
    Resize { cols: u16, rows: u16 },
    /// Stop the session loop.
    Shutdown,
}

/// Tracks terminal state and collects every byte that must reach the real
/// terminal, so renders issued deep inside the controller are not lost.
struct TeeGrid {
    grid: VtGrid,
    pending: Vec<u8>,
}

impl TeeGrid {
    fn new(cols: u16, rows: u16) -> Self {
        Self {
            grid: VtGrid::new(cols, rows),
            pending: Vec::new(),
        }
    }

    fn drain(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

impl Grid for TeeGrid {
    fn cols(&self) -> u16 {
        self.grid.cols()
    }

    fn rows(&self) -> u16 {
        self.grid.rows()
    }

    fn base_y(&self) -> i64 {
        self.grid.base_y()
    }

    fn cursor(&self) -> Coordinate {
        self.grid.cursor()
    }

    fn cell(&self, x: u16, row: i64) -> Option<Cell> {
        self.grid.cell(x, row)
    }

    fn title(&self) -> &str {
        self.grid.title()
    }

    fn alternate_active(&self) -> bool {
        self.grid.alternate_active()
    }

    fn write(&mut self, text: &str) {
        self.pending.extend_from_slice(text.as_bytes());
        self.grid.write(text);
    }
}

/// One terminal session with typeahead.
pub struct Session {
    controller: TypeAheadController,
    grid: TeeGrid,
    input: mpsc::Receiver<SessionInput>,
    output: mpsc::Sender<Vec<u8>>,
    stats_tx: Option<mpsc::Sender<StatsReport>>,
}

impl Session {
    pub fn new(
        controller: TypeAheadController,
        cols: u16,
        rows: u16,
        input: mpsc::Receiver<SessionInput>,
        output: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        Self {
            controller,
            grid: TeeGrid::new(cols, rows),
            input,
            output,
            stats_tx: None,
        }
    }

    /// Also publish periodic stats snapshots on `tx`.
    pub fn with_stats_channel(mut self, tx: mpsc::Sender<StatsReport>) -> Self {
        self.stats_tx = Some(tx);
        self
    }

    pub async fn run(mut self) -> Result<()> {
        let mut stats_flush = interval(STATS_FLUSH_INTERVAL);
        stats_flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let stale = self.controller.stale_deadline();
            tokio::select! {
                biased;

                msg = self.input.recv() => {
                    match msg {
                        Some(SessionInput::User(bytes)) => {
                            let data = String::from_utf8_lossy(&bytes).into_owned();
                            self.controller.on_user_input(&mut self.grid, &data);
                            self.flush_pending().await?;
                        }
                        Some(SessionInput::Server(bytes)) => {
                            let data = String::from_utf8_lossy(&bytes).into_owned();
                            let out =
                                self.controller.before_server_input(&mut self.grid, &data);
                            self.grid.write(&out);
                            self.flush_pending().await?;
                        }
                        Some(SessionInput::Resize { cols, rows }) => {
                            debug!(cols, rows, "session resize");
                            // Undo against the old geometry, then reflow
                            self.controller.on_resize(&mut self.grid);
                            self.grid.grid.resize(cols, rows);
                            self.flush_pending().await?;
                        }
                        Some(SessionInput::Shutdown) | None => break,
                    }
                }

                _ = stats_flush.tick() => {
                    let report = self.controller.stats_report();
                    info!(
                        latency_median_ms = report.latency_median_ms,
                        accuracy = report.prediction_accuracy,
                        samples = report.latency_count,
                        "typeahead stats"
                    );
                    if let Some(tx) = &self.stats_tx {
                        let _ = tx.send(report).await;
                    }
                }

                _ = wait_until(stale), if stale.is_some() => {
                    self.controller.on_stale_timeout(&mut self.grid);
                    self.flush_pending().await?;
                }
            }
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<()> {
        if let Some(bytes) = self.grid.drain() {
            self.output
                .send(bytes)
                .await
                .map_err(|_| crate::Error::ChannelClosed)?;
        }
        Ok(())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(TokioInstant::from_std(deadline)).await,
        None => future::pending().await,
    }
}
