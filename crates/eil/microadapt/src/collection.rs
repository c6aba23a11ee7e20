//! Dynamic data collection: rolling per-level histories and multi-scale decomposition.
//!
//! Every level sees the same stream of points; levels differ only in how much
//! history they retain (their window size) and how much smoothing they apply:
//!
//! ```text
//!   level 1  ── raw samples (high frequency)
//!   level 2  ── moving average, window 3
//!   level 3+ ── moving average, window 5
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::MicroAdaptConfig;
use crate::ring::RingBuffer;
use crate::stats;
use crate::window::{HierarchicalWindow, WindowSet};

/// Smoothing window applied at level 2.
pub const LEVEL_TWO_SMOOTHING: usize = 3;

/// Smoothing window applied at level 3 and above.
pub const COARSE_SMOOTHING: usize = 5;

/// Diagnostic summary of one level's buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelState {
    pub size: usize,
    pub mean: f64,
    pub std: f64,
}

/// Rolling multi-level history of a scalar signal.
#[derive(Clone, Debug)]
pub struct DynamicDataCollection {
    window_sizes: Vec<usize>,
    history: Vec<RingBuffer<f64>>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl DynamicDataCollection {
    /// Create one bounded buffer per configured window size.
    pub fn new(config: &MicroAdaptConfig) -> Self {
        Self::with_window_sizes(config.window_sizes.clone())
    }

    /// Create directly from window sizes (finest first, strictly increasing).
    pub fn with_window_sizes(window_sizes: Vec<usize>) -> Self {
        let history = window_sizes.iter().map(|&s| RingBuffer::new(s)).collect();
        Self {
            window_sizes,
            history,
            last_timestamp: None,
        }
    }

    /// Number of active hierarchy levels.
    pub fn hierarchy_levels(&self) -> usize {
        self.window_sizes.len()
    }

    pub fn window_sizes(&self) -> &[usize] {
        &self.window_sizes
    }

    /// Push `value` onto every level's buffer, evicting the oldest points when full.
    pub fn add_data_point(&mut self, value: f64, timestamp: DateTime<Utc>) {
        for buffer in &mut self.history {
            buffer.push(value);
        }
        self.last_timestamp = Some(timestamp);
    }

    /// Optionally ingest `current_data`, then emit one window per non-empty level.
    pub fn decompose(&mut self, current_data: Option<&[f64]>) -> WindowSet {
        if let Some(batch) = current_data {
            let now = Utc::now();
            for &value in batch {
                self.add_data_point(value, now);
            }
        }
        self.windows()
    }

    /// Decompose the current history without ingesting anything.
    pub fn windows(&self) -> WindowSet {
        let mut windows = Vec::with_capacity(self.history.len());
        for (idx, buffer) in self.history.iter().enumerate() {
            if buffer.is_empty() {
                continue;
            }
            let level = idx + 1;
            let raw = buffer.to_vec();
            let data = match level {
                1 => raw,
                2 => moving_average(&raw, LEVEL_TWO_SMOOTHING),
                _ => moving_average(&raw, COARSE_SMOOTHING),
            };
            windows.push(HierarchicalWindow::new(level, self.window_sizes[idx], data));
        }
        trace!(levels = windows.len(), "decomposed history");
        WindowSet::from_ordered(windows)
    }

    /// Per-level `{size, mean, std}` snapshot.
    pub fn get_current_state(&self) -> BTreeMap<usize, LevelState> {
        self.history
            .iter()
            .enumerate()
            .map(|(idx, buffer)| {
                let data = buffer.to_vec();
                (
                    idx + 1,
                    LevelState {
                        size: data.len(),
                        mean: stats::mean(&data),
                        std: stats::std_dev(&data),
                    },
                )
            })
            .collect()
    }

    /// Raw buffered samples of `level` (1-based), oldest first.
    pub fn history(&self, level: usize) -> Option<Vec<f64>> {
        level
            .checked_sub(1)
            .and_then(|idx| self.history.get(idx))
            .map(RingBuffer::to_vec)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }
}

/// Valid-mode moving average, front-padded with its first value to keep the input length.
///
/// Inputs shorter than `window` are returned unsmoothed.
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || data.len() < window {
        return data.to_vec();
    }
    let valid: Vec<f64> = data
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect();
    let mut out = Vec::with_capacity(data.len());
    out.extend(std::iter::repeat(valid[0]).take(window - 1));
    out.extend(valid);
    out
}
