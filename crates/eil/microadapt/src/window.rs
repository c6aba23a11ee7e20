//! Per-scale window containers produced by decomposition.

use serde::{Deserialize, Serialize};

use crate::error::{MicroAdaptError, MicroAdaptResult};

/// One hierarchy level's buffered (and possibly smoothed) samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalWindow {
    /// Hierarchy level, 1 = finest.
    pub level: usize,
    /// Seconds spanned by this level's buffer.
    pub window_size: usize,
    /// Samples, oldest first.
    pub data: Vec<f64>,
}

impl HierarchicalWindow {
    pub fn new(level: usize, window_size: usize, data: Vec<f64>) -> Self {
        Self {
            level,
            window_size,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The active windows of one processing tick, ordered by increasing window size.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSet {
    windows: Vec<HierarchicalWindow>,
}

impl WindowSet {
    /// Build a window set, checking that levels are distinct and sizes increase.
    pub fn new(windows: Vec<HierarchicalWindow>) -> MicroAdaptResult<Self> {
        for pair in windows.windows(2) {
            if pair[0].level >= pair[1].level || pair[0].window_size >= pair[1].window_size {
                return Err(MicroAdaptError::InvalidConfig(format!(
                    "window levels must be distinct and ordered: level {} ({}s) before level {} ({}s)",
                    pair[0].level, pair[0].window_size, pair[1].level, pair[1].window_size
                )));
            }
        }
        Ok(Self { windows })
    }

    /// Windows already known to be ordered (built from a validated config).
    pub(crate) fn from_ordered(windows: Vec<HierarchicalWindow>) -> Self {
        Self { windows }
    }

    /// Cold-start window set: every level holds `copies` repetitions of `value`.
    pub fn repeated(value: f64, copies: usize, window_sizes: &[usize]) -> Self {
        let windows = window_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| HierarchicalWindow::new(i + 1, size, vec![value; copies]))
            .collect();
        Self { windows }
    }

    pub fn windows(&self) -> &[HierarchicalWindow] {
        &self.windows
    }

    /// The finest (raw) window, if any level produced data.
    pub fn finest(&self) -> Option<&HierarchicalWindow> {
        self.windows.first()
    }

    /// Finest-level samples, or an error when there are none.
    pub fn finest_data(&self) -> MicroAdaptResult<&[f64]> {
        match self.finest() {
            Some(w) if !w.is_empty() => Ok(&w.data),
            _ => Err(MicroAdaptError::EmptyWindow),
        }
    }

    pub fn level(&self, level: usize) -> Option<&HierarchicalWindow> {
        self.windows.iter().find(|w| w.level == level)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
