use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::bridge::Operation;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Image file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to decode image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("Native processing failed: {0}")]
    Processing(String),
    #[error("Benchmark failed: {0}")]
    Benchmark(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid measurement for {field}: {value}")]
    InvalidMeasurement { field: &'static str, value: f64 },
    #[error("Processor has not been initialized")]
    NotInitialized,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to write output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl ProcessorError {
    /// Machine-readable tag for this failure when it ends `operation`.
    pub fn code(&self, operation: Operation) -> ErrorCode {
        match self {
            ProcessorError::FileNotFound(_) => ErrorCode::FileNotFound,
            ProcessorError::Decode { .. } => ErrorCode::DecodeError,
            ProcessorError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ProcessorError::NotInitialized => ErrorCode::NotInitialized,
            _ => operation.failure_code(),
        }
    }
}

// Backend Error Type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend initialization failed: {0}")]
    InitFailed(String),
    #[error("Backend used before initialization")]
    NotInitialized,
    #[error("Frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("Kernel failed: {0}")]
    Kernel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    FileNotFound,
    DecodeError,
    ProcessingError,
    BenchmarkError,
    InvalidArgument,
    NotInitialized,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::DecodeError => "DECODE_ERROR",
            ErrorCode::ProcessingError => "PROCESSING_ERROR",
            ErrorCode::BenchmarkError => "BENCHMARK_ERROR",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged failure surfaced at the async boundary.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_processor(operation: Operation, error: &ProcessorError) -> Self {
        Self::new(error.code(operation), error.to_string())
    }
}
