use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

use crate::error::ProcessorError;

/// Outcome of one measured processing run.
///
/// Times are milliseconds per frame. `gpu_time` is zero when the GPU path did
/// not run. Fields are only readable, so a result never changes after it is
/// constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingResult {
    fps: f64,
    cpu_time: f64,
    gpu_time: f64,
}

impl ProcessingResult {
    pub fn new(fps: f64, cpu_time: f64, gpu_time: f64) -> Result<Self, ProcessorError> {
        Self::check("fps", fps)?;
        Self::check("cpuTime", cpu_time)?;
        Self::check("gpuTime", gpu_time)?;

        Ok(Self {
            fps,
            cpu_time,
            gpu_time,
        })
    }

    fn check(field: &'static str, value: f64) -> Result<(), ProcessorError> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(ProcessorError::InvalidMeasurement { field, value })
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn cpu_time(&self) -> f64 {
        self.cpu_time
    }

    pub fn gpu_time(&self) -> f64 {
        self.gpu_time
    }

    /// Ratio of CPU time to GPU time.
    ///
    /// Returns `f64::INFINITY` when `gpu_time` is zero, including when the CPU
    /// time is zero as well, so the value is never NaN.
    pub fn speedup(&self) -> f64 {
        self.checked_speedup().unwrap_or(f64::INFINITY)
    }

    /// Like [`speedup`](Self::speedup) but `None` when the GPU path has no time.
    pub fn checked_speedup(&self) -> Option<f64> {
        if self.gpu_time == 0.0 {
            None
        } else {
            Some(self.cpu_time / self.gpu_time)
        }
    }

    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FPS: {:.1}, CPU: {:.1}ms, GPU: {:.1}ms, Speedup: {:.2}x",
            self.fps,
            self.cpu_time,
            self.gpu_time,
            self.speedup()
        )
    }
}

impl Serialize for ProcessingResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingResult", 4)?;
        state.serialize_field("fps", &self.fps)?;
        state.serialize_field("cpuTime", &self.cpu_time)?;
        state.serialize_field("gpuTime", &self.gpu_time)?;
        state.serialize_field("speedup", &self.speedup())?;
        state.end()
    }
}
