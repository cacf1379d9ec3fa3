use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::report::BenchmarkReport;
use super::result::ProcessingResult;
use super::timings::{as_millis, fps_for, PathTimings};
use crate::backend::{ComputePath, ProcessingBackend};
use crate::common::Frame;
use crate::config::BenchmarkConfiguration;
use crate::error::ProcessorError;

/// Repeats the edge kernel on both paths and aggregates the per-frame times.
pub struct BenchmarkRunner {
    backend: Arc<dyn ProcessingBackend>,
    config: BenchmarkConfiguration,
}

impl BenchmarkRunner {
    pub fn new(backend: Arc<dyn ProcessingBackend>, config: BenchmarkConfiguration) -> Self {
        Self { backend, config }
    }

    pub fn validate_iterations(&self, iterations: u32) -> Result<(), ProcessorError> {
        if iterations == 0 {
            return Err(ProcessorError::InvalidArgument(
                "iterations must be a positive integer".to_string(),
            ));
        }
        if iterations > self.config.max_iterations {
            return Err(ProcessorError::InvalidArgument(format!(
                "iterations must not exceed {} (got {})",
                self.config.max_iterations, iterations
            )));
        }
        Ok(())
    }

    /// Runs `iterations` rounds of CPU then GPU on `frame`.
    ///
    /// `cpuTime` and `gpuTime` are the aggregated per-frame times and `fps`
    /// is derived from the CPU frame time.
    #[instrument(
        skip(self, frame),
        fields(frame_id = %frame.frame_id(), loaded_at = %frame.loaded_at(), backend = self.backend.name())
    )]
    pub fn run(&self, frame: &Frame, iterations: u32) -> Result<BenchmarkReport, ProcessorError> {
        self.validate_iterations(iterations)?;

        let (width, height) = frame.dimensions();
        info!(
            "Starting benchmark: {} iterations on {}x{} image",
            iterations, width, height
        );

        for round in 0..self.config.warmup_iterations {
            debug!("Warmup round {}", round);
            self.measure(frame, ComputePath::Cpu)?;
            self.measure(frame, ComputePath::Gpu)?;
        }

        let mut timings = PathTimings::new();
        for _ in 0..iterations {
            timings.record(ComputePath::Cpu, self.measure(frame, ComputePath::Cpu)?);
            timings.record(ComputePath::Gpu, self.measure(frame, ComputePath::Gpu)?);
        }

        let cpu_ms = timings.aggregate_ms(ComputePath::Cpu, self.config.aggregation);
        let gpu_ms = timings.aggregate_ms(ComputePath::Gpu, self.config.aggregation);
        let result = ProcessingResult::new(fps_for(cpu_ms), cpu_ms, gpu_ms)?;

        info!(
            "Benchmark complete: {} frames, CPU {:.2} ms ({:.2} FPS), GPU {:.2} ms ({:.2} FPS), speedup {:.2}x",
            iterations,
            cpu_ms,
            fps_for(cpu_ms),
            gpu_ms,
            fps_for(gpu_ms),
            result.speedup()
        );

        for path in [ComputePath::Cpu, ComputePath::Gpu] {
            if let (Some(min), Some(max)) = (timings.min(path), timings.max(path)) {
                debug!(
                    "{} path spread: min {:.2} ms, max {:.2} ms",
                    path,
                    as_millis(&min),
                    as_millis(&max)
                );
            }
        }

        Ok(BenchmarkReport::new(result, iterations, timings))
    }

    fn measure(&self, frame: &Frame, path: ComputePath) -> Result<Duration, ProcessorError> {
        self.backend
            .detect_edges(frame.image(), path)
            .map(|output| output.elapsed)
            .map_err(|e| ProcessorError::Benchmark(format!("{} path: {}", path, e)))
    }
}
