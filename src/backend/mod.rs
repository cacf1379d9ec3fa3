use image::GrayImage;
use std::fmt;
use std::time::Duration;

use crate::error::BackendError;

pub mod kernel;
pub mod native;
pub mod simulated;

pub use native::NativeBackend;
pub use simulated::{SimulatedBackend, SimulatedFailure};

/// Where a backend runs the edge kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputePath {
    /// Serial baseline.
    Cpu,
    /// Accelerated path.
    Gpu,
}

impl ComputePath {
    pub fn from_use_gpu(use_gpu: bool) -> Self {
        if use_gpu {
            ComputePath::Gpu
        } else {
            ComputePath::Cpu
        }
    }
}

impl fmt::Display for ComputePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputePath::Cpu => f.write_str("cpu"),
            ComputePath::Gpu => f.write_str("gpu"),
        }
    }
}

/// Edge map produced by one kernel run and the time the kernel took.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub edges: GrayImage,
    pub elapsed: Duration,
}

/// A component that runs the edge kernel on one of its compute paths.
///
/// `initialize` is called once by the owning service before any
/// `detect_edges` call. Backends time their own kernel so that simulated
/// backends can report deterministic numbers.
pub trait ProcessingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn initialize(&self) -> Result<(), BackendError>;

    fn detect_edges(
        &self,
        frame: &GrayImage,
        path: ComputePath,
    ) -> Result<FrameOutput, BackendError>;
}
