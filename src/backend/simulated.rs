use image::GrayImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{ComputePath, FrameOutput, ProcessingBackend};
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    /// Every kernel call returns an error.
    Error,
    /// Every kernel call panics.
    Panic,
    /// `initialize` fails.
    Init,
}

/// Backend with scripted timings, used where real hardware timing would make
/// results non-deterministic.
///
/// Each path cycles through its configured samples, one per call. The edge
/// map returned is a copy of the input frame.
pub struct SimulatedBackend {
    cpu_samples: Vec<Duration>,
    gpu_samples: Vec<Duration>,
    failure: Option<SimulatedFailure>,
    delay: Option<Duration>,
    cpu_calls: AtomicUsize,
    gpu_calls: AtomicUsize,
    init_calls: AtomicUsize,
    order: Mutex<Vec<ComputePath>>,
}

impl SimulatedBackend {
    pub fn new(cpu_time: Duration, gpu_time: Duration) -> Self {
        Self::with_samples(vec![cpu_time], vec![gpu_time])
    }

    pub fn with_samples(cpu_samples: Vec<Duration>, gpu_samples: Vec<Duration>) -> Self {
        Self {
            cpu_samples,
            gpu_samples,
            failure: None,
            delay: None,
            cpu_calls: AtomicUsize::new(0),
            gpu_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, failure: SimulatedFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Sleeps for `delay` inside every kernel call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, path: ComputePath) -> usize {
        match path {
            ComputePath::Cpu => self.cpu_calls.load(Ordering::SeqCst),
            ComputePath::Gpu => self.gpu_calls.load(Ordering::SeqCst),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls(ComputePath::Cpu) + self.calls(ComputePath::Gpu)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Paths in the order their kernel calls arrived.
    pub fn call_order(&self) -> Vec<ComputePath> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_sample(samples: &[Duration], call: usize) -> Duration {
        if samples.is_empty() {
            Duration::ZERO
        } else {
            samples[call % samples.len()]
        }
    }
}

impl ProcessingBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn initialize(&self) -> Result<(), BackendError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.failure == Some(SimulatedFailure::Init) {
            return Err(BackendError::InitFailed("simulated init failure".to_string()));
        }
        Ok(())
    }

    fn detect_edges(
        &self,
        frame: &GrayImage,
        path: ComputePath,
    ) -> Result<FrameOutput, BackendError> {
        let (counter, samples) = match path {
            ComputePath::Cpu => (&self.cpu_calls, &self.cpu_samples),
            ComputePath::Gpu => (&self.gpu_calls, &self.gpu_samples),
        };
        let call = counter.fetch_add(1, Ordering::SeqCst);
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match self.failure {
            Some(SimulatedFailure::Error) => {
                return Err(BackendError::Kernel(format!(
                    "simulated {} kernel failure",
                    path
                )));
            }
            Some(SimulatedFailure::Panic) => panic!("simulated {} kernel panic", path),
            _ => {}
        }

        Ok(FrameOutput {
            edges: frame.clone(),
            elapsed: Self::next_sample(samples, call),
        })
    }
}
