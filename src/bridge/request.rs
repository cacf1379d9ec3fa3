use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::error::ErrorCode;
use crate::processing::{BenchmarkReport, ProcessingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ProcessImage,
    Benchmark,
}

impl Operation {
    /// Code reported for faults that have no more specific tag.
    pub fn failure_code(self) -> ErrorCode {
        match self {
            Operation::ProcessImage => ErrorCode::ProcessingError,
            Operation::Benchmark => ErrorCode::BenchmarkError,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ProcessImage => f.write_str("processImage"),
            Operation::Benchmark => f.write_str("benchmark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeRequest {
    /// The edge map is written to `output_path` when one is given.
    ProcessImage {
        image_path: PathBuf,
        use_gpu: bool,
        output_path: Option<PathBuf>,
    },
    /// `iterations` is signed as callers send it; non-positive counts are
    /// rejected by the service.
    Benchmark { image_path: PathBuf, iterations: i64 },
}

impl BridgeRequest {
    pub fn process_image(image_path: impl Into<PathBuf>, use_gpu: bool) -> Self {
        BridgeRequest::ProcessImage {
            image_path: image_path.into(),
            use_gpu,
            output_path: None,
        }
    }

    /// Sets where a processing request writes its edge map. Benchmarks have
    /// no output and are returned unchanged.
    pub fn with_output(self, output: impl Into<PathBuf>) -> Self {
        match self {
            BridgeRequest::ProcessImage {
                image_path,
                use_gpu,
                ..
            } => BridgeRequest::ProcessImage {
                image_path,
                use_gpu,
                output_path: Some(output.into()),
            },
            benchmark => benchmark,
        }
    }

    pub fn benchmark(image_path: impl Into<PathBuf>, iterations: i64) -> Self {
        BridgeRequest::Benchmark {
            image_path: image_path.into(),
            iterations,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            BridgeRequest::ProcessImage { .. } => Operation::ProcessImage,
            BridgeRequest::Benchmark { .. } => Operation::Benchmark,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BridgeResponse {
    Processed(ProcessingResult),
    Benchmarked(BenchmarkReport),
}

impl BridgeResponse {
    pub fn result(&self) -> &ProcessingResult {
        match self {
            BridgeResponse::Processed(result) => result,
            BridgeResponse::Benchmarked(report) => report.result(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
