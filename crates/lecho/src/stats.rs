//! Rolling prediction statistics driving the adaptive policy and telemetry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::STATS_BUFFER_SIZE;

/// Latency summary over correct predictions in the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub min: Option<Duration>,
    pub median: Option<Duration>,
    pub max: Option<Duration>,
    pub count: usize,
}

/// Telemetry snapshot of the stats window, flushed periodically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub latency_min_ms: u64,
    pub latency_median_ms: u64,
    pub latency_max_ms: u64,
    pub latency_count: usize,
    pub prediction_accuracy: f64,
}

/// Fixed-capacity ring of `(latency, was_correct)` samples.
#[derive(Debug, Clone, Default)]
pub struct PredictionStats {
    samples: Vec<(Duration, bool)>,
    /// Next slot to overwrite once the ring is full.
    write_index: usize,
}

impl PredictionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one resolved prediction.
    pub fn record(&mut self, latency: Duration, correct: bool) {
        if self.samples.len() < STATS_BUFFER_SIZE {
            self.samples.push((latency, correct));
        } else {
            self.samples[self.write_index] = (latency, correct);
        }
        self.write_index = (self.write_index + 1) % STATS_BUFFER_SIZE;
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Fraction of window samples that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let correct = self.samples.iter().filter(|(_, ok)| *ok).count();
        correct as f64 / self.samples.len() as f64
    }

    /// Latency distribution over correct samples only; mispredictions are
    /// resolved by boundary-crossing output and would skew it.
    pub fn latency(&self) -> LatencySummary {
        let mut latencies: Vec<Duration> = self
            .samples
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(latency, _)| *latency)
            .collect();
        latencies.sort_unstable();
        LatencySummary {
            min: latencies.first().copied(),
            median: latencies.get(latencies.len() / 2).copied(),
            max: latencies.last().copied(),
            count: latencies.len(),
        }
    }

    /// Worst successful latency in the window, if any.
    pub fn max_latency(&self) -> Option<Duration> {
        self.latency().max
    }

    /// Snapshot for telemetry.
    pub fn report(&self) -> StatsReport {
        let latency = self.latency();
        let ms = |d: Option<Duration>| d.map(|d| d.as_millis() as u64).unwrap_or(0);
        StatsReport {
            latency_min_ms: ms(latency.min),
            latency_median_ms: ms(latency.median),
            latency_max_ms: ms(latency.max),
            latency_count: latency.count,
            prediction_accuracy: self.accuracy(),
        }
    }
}
