pub mod backend;
pub mod bridge;
pub mod common;
pub mod config;
pub mod error;
pub mod processing;

pub use error::{BackendError, BridgeError, ErrorCode, ProcessorError};

pub use backend::{ComputePath, NativeBackend, ProcessingBackend, SimulatedBackend};
pub use bridge::{BridgeRequest, BridgeResponse, ProcessorBridge};
pub use config::Configuration;
pub use processing::{BenchmarkReport, BenchmarkRunner, ProcessingResult, ProcessingService};
