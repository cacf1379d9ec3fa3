use crate::backend::ComputePath;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// How per-iteration samples collapse into one frame time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Median,
    Last,
}

/// Tracks the measured samples for each compute path in a run
#[derive(Debug, Clone, Default)]
pub struct PathTimings {
    /// Samples per path, in recording order
    samples: IndexMap<ComputePath, Vec<Duration>>,
}

impl PathTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one measured sample for a path
    pub fn record(&mut self, path: ComputePath, duration: Duration) {
        self.samples.entry(path).or_default().push(duration);
    }

    pub fn samples(&self, path: ComputePath) -> &[Duration] {
        self.samples
            .get(&path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn sample_count(&self, path: ComputePath) -> usize {
        self.samples(path).len()
    }

    /// Aggregated frame time for a path in milliseconds, zero when the path
    /// has no samples.
    pub fn aggregate_ms(&self, path: ComputePath, aggregation: Aggregation) -> f64 {
        let mut millis: Vec<f64> = self.samples(path).iter().map(as_millis).collect();
        if millis.is_empty() {
            return 0.0;
        }

        match aggregation {
            Aggregation::Mean => millis.iter().sum::<f64>() / millis.len() as f64,
            Aggregation::Median => {
                millis.sort_by(f64::total_cmp);
                let mid = millis.len() / 2;
                if millis.len() % 2 == 0 {
                    (millis[mid - 1] + millis[mid]) / 2.0
                } else {
                    millis[mid]
                }
            }
            Aggregation::Last => millis[millis.len() - 1],
        }
    }

    pub fn min(&self, path: ComputePath) -> Option<Duration> {
        self.samples(path).iter().min().copied()
    }

    pub fn max(&self, path: ComputePath) -> Option<Duration> {
        self.samples(path).iter().max().copied()
    }
}

pub(crate) fn as_millis(duration: &Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Frames per second for a frame time, zero when nothing was measured.
pub(crate) fn fps_for(frame_ms: f64) -> f64 {
    if frame_ms > 0.0 {
        1000.0 / frame_ms
    } else {
        0.0
    }
}
