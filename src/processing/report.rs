use serde::Serialize;

use super::result::ProcessingResult;
use super::timings::PathTimings;

/// Aggregated result of a benchmark run.
///
/// Serializes as the flat result map plus `iterations`, which echoes the
/// requested count.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    #[serde(flatten)]
    result: ProcessingResult,
    iterations: u32,
    #[serde(skip)]
    timings: PathTimings,
}

impl BenchmarkReport {
    pub fn new(result: ProcessingResult, iterations: u32, timings: PathTimings) -> Self {
        Self {
            result,
            iterations,
            timings,
        }
    }

    pub fn result(&self) -> &ProcessingResult {
        &self.result
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn timings(&self) -> &PathTimings {
        &self.timings
    }
}
