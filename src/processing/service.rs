use image::GrayImage;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

use super::benchmark::BenchmarkRunner;
use super::report::BenchmarkReport;
use super::result::ProcessingResult;
use super::timings::{as_millis, fps_for, Aggregation};
use crate::backend::{ComputePath, NativeBackend, ProcessingBackend};
use crate::common::Frame;
use crate::config::Configuration;
use crate::error::ProcessorError;

/// Result of processing one image, with the edge map it produced.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub result: ProcessingResult,
    pub path: ComputePath,
    pub edges: GrayImage,
}

impl ProcessOutcome {
    pub fn save_edges(&self, path: &Path) -> Result<(), ProcessorError> {
        self.edges.save(path).map_err(|source| ProcessorError::Output {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Entry point for single-image processing and benchmarks.
///
/// `initialize` must succeed once before any processing call.
pub struct ProcessingService {
    backend: Arc<dyn ProcessingBackend>,
    runner: BenchmarkRunner,
    configuration: Configuration,
    initialized: Mutex<bool>,
}

impl ProcessingService {
    pub fn builder(configuration: Configuration) -> ProcessingServiceBuilder {
        ProcessingServiceBuilder::new(configuration)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Initializes the backend. Later calls are no-ops; a failed call may be
    /// retried.
    pub fn initialize(&self) -> Result<(), ProcessorError> {
        let mut initialized = self
            .initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *initialized {
            debug!("Backend '{}' already initialized", self.backend.name());
            return Ok(());
        }

        self.backend.initialize().map_err(|e| {
            warn!("Backend '{}' failed to initialize: {}", self.backend.name(), e);
            ProcessorError::Processing(e.to_string())
        })?;
        *initialized = true;

        info!("Backend '{}' initialized", self.backend.name());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        *self
            .initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_initialized(&self) -> Result<(), ProcessorError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ProcessorError::NotInitialized)
        }
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn process_image(
        &self,
        image_path: &Path,
        use_gpu: bool,
    ) -> Result<ProcessOutcome, ProcessorError> {
        self.ensure_initialized()?;
        let frame = Frame::load(image_path)?;
        self.process_frame(&frame, use_gpu)
    }

    /// Runs the selected path on `frame`. With `measure_both_paths` the other
    /// path runs too so both times are real measurements; otherwise the other
    /// time is zero. When both run, the CPU path always runs first.
    pub fn process_frame(
        &self,
        frame: &Frame,
        use_gpu: bool,
    ) -> Result<ProcessOutcome, ProcessorError> {
        self.ensure_initialized()?;

        let path = ComputePath::from_use_gpu(use_gpu);
        let (width, height) = frame.dimensions();
        debug!(
            "Processing {}x{} frame {} (loaded {}) on {} path",
            width,
            height,
            frame.frame_id(),
            frame.loaded_at(),
            path
        );

        let (selected, other_ms) = if !self.configuration.measure_both_paths {
            (self.detect(frame, path)?, 0.0)
        } else if path == ComputePath::Gpu {
            let cpu = self.detect(frame, ComputePath::Cpu)?;
            (self.detect(frame, ComputePath::Gpu)?, as_millis(&cpu.elapsed))
        } else {
            let cpu = self.detect(frame, ComputePath::Cpu)?;
            let gpu = self.detect(frame, ComputePath::Gpu)?;
            (cpu, as_millis(&gpu.elapsed))
        };
        let selected_ms = as_millis(&selected.elapsed);

        let (cpu_ms, gpu_ms) = match path {
            ComputePath::Cpu => (selected_ms, other_ms),
            ComputePath::Gpu => (other_ms, selected_ms),
        };
        let result = ProcessingResult::new(fps_for(selected_ms), cpu_ms, gpu_ms)?;

        info!("Processing complete: {}", result);

        Ok(ProcessOutcome {
            result,
            path,
            edges: selected.edges,
        })
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub fn benchmark_image(
        &self,
        image_path: &Path,
        iterations: u32,
    ) -> Result<BenchmarkReport, ProcessorError> {
        self.ensure_initialized()?;
        self.runner.validate_iterations(iterations)?;
        let frame = Frame::load(image_path)?;
        self.runner.run(&frame, iterations)
    }

    fn detect(
        &self,
        frame: &Frame,
        path: ComputePath,
    ) -> Result<crate::backend::FrameOutput, ProcessorError> {
        self.backend
            .detect_edges(frame.image(), path)
            .map_err(|e| ProcessorError::Processing(format!("{} path: {}", path, e)))
    }
}

pub struct ProcessingServiceBuilder {
    configuration: Configuration,
    backend: Option<Arc<dyn ProcessingBackend>>,
}

impl ProcessingServiceBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            backend: None,
        }
    }

    // Sets the edge threshold, this will override the configuration.
    pub fn edge_threshold(mut self, edge_threshold: u8) -> Self {
        self.configuration.edge_threshold = edge_threshold;
        self
    }

    pub fn measure_both_paths(mut self, measure_both_paths: bool) -> Self {
        self.configuration.measure_both_paths = measure_both_paths;
        self
    }

    // Adjusts the accelerated pool size, this will override the configuration.
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.configuration.worker_threads = worker_threads;
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.configuration.benchmark.aggregation = aggregation;
        self
    }

    pub fn warmup_iterations(mut self, warmup_iterations: u32) -> Self {
        self.configuration.benchmark.warmup_iterations = warmup_iterations;
        self
    }

    /// Replaces the native backend.
    pub fn backend(mut self, backend: Arc<dyn ProcessingBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<ProcessingService, ProcessorError> {
        self.configuration.validate()?;

        let configuration = self.configuration;
        let backend = self.backend.unwrap_or_else(|| {
            Arc::new(NativeBackend::new(
                configuration.edge_threshold,
                configuration.worker_threads,
            ))
        });
        let runner = BenchmarkRunner::new(backend.clone(), configuration.benchmark.clone());

        Ok(ProcessingService {
            backend,
            runner,
            configuration,
            initialized: Mutex::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SimulatedBackend, SimulatedFailure};
    use image::Luma;
    use std::time::Duration;
    use tempfile::TempDir;

    fn simulated(cpu_ms: u64, gpu_ms: u64) -> Arc<SimulatedBackend> {
        Arc::new(SimulatedBackend::new(
            Duration::from_millis(cpu_ms),
            Duration::from_millis(gpu_ms),
        ))
    }

    fn service(backend: Arc<SimulatedBackend>) -> ProcessingService {
        ProcessingService::builder(Configuration::default())
            .backend(backend)
            .build()
            .unwrap()
    }

    fn write_png(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("frame.png");
        GrayImage::from_fn(16, 16, |x, _| if x < 8 { Luma([0]) } else { Luma([255]) })
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_processing_requires_initialize() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let backend = simulated(16, 4);
        let service = service(backend.clone());

        assert!(matches!(
            service.process_image(&path, true),
            Err(ProcessorError::NotInitialized)
        ));
        assert!(matches!(
            service.benchmark_image(&path, 5),
            Err(ProcessorError::NotInitialized)
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let backend = simulated(16, 4);
        let service = service(backend.clone());

        service.initialize().unwrap();
        service.initialize().unwrap();

        assert!(service.is_initialized());
        assert_eq!(backend.init_calls(), 1);
    }

    #[test]
    fn test_failed_initialize_can_be_retried() {
        let backend = Arc::new(
            SimulatedBackend::new(Duration::ZERO, Duration::ZERO).failing(SimulatedFailure::Init),
        );
        let service = service(backend.clone());

        assert!(service.initialize().is_err());
        assert!(service.initialize().is_err());
        assert!(!service.is_initialized());
        assert_eq!(backend.init_calls(), 2);
    }

    #[test]
    fn test_process_gpu_measures_both_paths() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let backend = simulated(16, 4);
        let service = service(backend.clone());
        service.initialize().unwrap();

        let outcome = service.process_image(&path, true).unwrap();

        assert_eq!(outcome.path, ComputePath::Gpu);
        assert_eq!(outcome.result.gpu_time(), 4.0);
        assert_eq!(outcome.result.cpu_time(), 16.0);
        assert_eq!(outcome.result.fps(), 250.0);
        assert_eq!(outcome.result.speedup(), 4.0);
        assert_eq!(backend.calls(ComputePath::Gpu), 1);
        assert_eq!(backend.calls(ComputePath::Cpu), 1);
        assert_eq!(
            backend.call_order(),
            vec![ComputePath::Cpu, ComputePath::Gpu]
        );
    }

    #[test]
    fn test_builder_overrides_benchmark_settings() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let backend = Arc::new(SimulatedBackend::with_samples(
            vec![
                Duration::from_millis(50),
                Duration::from_millis(10),
                Duration::from_millis(30),
            ],
            vec![Duration::from_millis(5)],
        ));
        let service = ProcessingService::builder(Configuration::default())
            .aggregation(Aggregation::Last)
            .warmup_iterations(1)
            .backend(backend.clone())
            .build()
            .unwrap();
        service.initialize().unwrap();

        let report = service.benchmark_image(&path, 2).unwrap();

        // The 50ms sample is spent on warmup; the last measured one wins.
        assert_eq!(report.result().cpu_time(), 30.0);
        assert_eq!(service.configuration().benchmark.aggregation, Aggregation::Last);
        assert_eq!(backend.calls(ComputePath::Cpu), 3);
    }

    #[test]
    fn test_builder_edge_threshold_reaches_native_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faint.png");
        // A step of 10 gives a Sobel magnitude of 40 along the boundary.
        GrayImage::from_fn(16, 16, |x, _| if x < 8 { Luma([0]) } else { Luma([10]) })
            .save(&path)
            .unwrap();

        let strict = ProcessingService::builder(Configuration::default())
            .build()
            .unwrap();
        strict.initialize().unwrap();
        let edges = strict.process_image(&path, false).unwrap().edges;
        assert!(edges.pixels().all(|p| p[0] == 0));

        let sensitive = ProcessingService::builder(Configuration::default())
            .edge_threshold(30)
            .build()
            .unwrap();
        sensitive.initialize().unwrap();
        let edges = sensitive.process_image(&path, false).unwrap().edges;
        assert_eq!(edges.get_pixel(8, 8)[0], 255);
        assert_eq!(edges.get_pixel(0, 8)[0], 0);
    }

    #[test]
    fn test_process_cpu_only_leaves_gpu_time_zero() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let backend = simulated(20, 4);
        let service = ProcessingService::builder(Configuration::default())
            .measure_both_paths(false)
            .backend(backend.clone())
            .build()
            .unwrap();
        service.initialize().unwrap();

        let outcome = service.process_image(&path, false).unwrap();

        assert_eq!(outcome.result.cpu_time(), 20.0);
        assert_eq!(outcome.result.gpu_time(), 0.0);
        assert_eq!(outcome.result.fps(), 50.0);
        assert_eq!(outcome.result.speedup(), f64::INFINITY);
        assert_eq!(backend.calls(ComputePath::Gpu), 0);
    }

    #[test]
    fn test_missing_and_undecodable_inputs() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("readme.txt");
        std::fs::write(&text, "hello").unwrap();
        let service = service(simulated(1, 1));
        service.initialize().unwrap();

        assert!(matches!(
            service.process_image(&dir.path().join("gone.png"), false),
            Err(ProcessorError::FileNotFound(_))
        ));
        assert!(matches!(
            service.process_image(&text, false),
            Err(ProcessorError::Decode { .. })
        ));
    }

    #[test]
    fn test_backend_error_is_processing_error() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let backend = Arc::new(
            SimulatedBackend::new(Duration::ZERO, Duration::ZERO).failing(SimulatedFailure::Error),
        );
        let service = service(backend);
        service.initialize().unwrap();

        assert!(matches!(
            service.process_image(&path, true),
            Err(ProcessorError::Processing(_))
        ));
    }

    #[test]
    fn test_benchmark_zero_iterations_skips_loading() {
        let dir = TempDir::new().unwrap();
        let backend = simulated(16, 4);
        let service = service(backend.clone());
        service.initialize().unwrap();

        // The image does not even exist; validation comes first.
        assert!(matches!(
            service.benchmark_image(&dir.path().join("gone.png"), 0),
            Err(ProcessorError::InvalidArgument(_))
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn test_benchmark_echoes_iterations() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let service = service(simulated(16, 4));
        service.initialize().unwrap();

        let report = service.benchmark_image(&path, 5).unwrap();
        assert_eq!(report.iterations(), 5);
        assert_eq!(report.result().speedup(), 4.0);
    }

    #[test]
    fn test_native_backend_end_to_end() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let out = dir.path().join("edges.png");
        let service = ProcessingService::builder(Configuration::default())
            .worker_threads(2)
            .build()
            .unwrap();
        service.initialize().unwrap();

        let outcome = service.process_image(&path, true).unwrap();
        outcome.save_edges(&out).unwrap();

        assert_eq!(outcome.edges.get_pixel(8, 8)[0], 255);
        assert_eq!(outcome.edges.get_pixel(0, 8)[0], 0);
        assert!(out.exists());
    }
}
