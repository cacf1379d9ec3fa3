use image::GrayImage;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::debug;

use super::kernel::sobel_row;
use super::{ComputePath, FrameOutput, ProcessingBackend};
use crate::error::BackendError;

/// Runs the Sobel edge kernel on the host.
///
/// The CPU path walks rows serially. The GPU path splits the same rows
/// across a dedicated rayon pool, which is built by `initialize`.
pub struct NativeBackend {
    edge_threshold: u8,
    worker_threads: usize,
    pool: OnceLock<ThreadPool>,
}

impl NativeBackend {
    pub fn new(edge_threshold: u8, worker_threads: usize) -> Self {
        Self {
            edge_threshold,
            worker_threads,
            pool: OnceLock::new(),
        }
    }

    fn check_frame(frame: &GrayImage) -> Result<(u32, u32), BackendError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(BackendError::EmptyFrame { width, height });
        }
        Ok((width, height))
    }

    fn run_serial(&self, frame: &GrayImage, buffer: &mut [u8], width: usize) {
        for (y, row) in buffer.chunks_mut(width).enumerate() {
            sobel_row(frame, y as u32, self.edge_threshold, row);
        }
    }

    fn run_parallel(
        &self,
        frame: &GrayImage,
        buffer: &mut [u8],
        width: usize,
    ) -> Result<(), BackendError> {
        let pool = self.pool.get().ok_or(BackendError::NotInitialized)?;
        let threshold = self.edge_threshold;
        pool.install(|| {
            buffer
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| sobel_row(frame, y as u32, threshold, row));
        });
        Ok(())
    }
}

impl ProcessingBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn initialize(&self) -> Result<(), BackendError> {
        if self.pool.get().is_some() {
            return Ok(());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .thread_name(|index| format!("framebench-gpu-{}", index))
            .build()
            .map_err(|e| BackendError::InitFailed(e.to_string()))?;
        debug!(
            "Native backend ready with {} worker threads",
            pool.current_num_threads()
        );

        if self.pool.set(pool).is_err() {
            debug!("Native backend pool already set by a concurrent initializer");
        }
        Ok(())
    }

    fn detect_edges(
        &self,
        frame: &GrayImage,
        path: ComputePath,
    ) -> Result<FrameOutput, BackendError> {
        let (width, height) = Self::check_frame(frame)?;
        let mut buffer = vec![0u8; width as usize * height as usize];

        let start = Instant::now();
        match path {
            ComputePath::Cpu => self.run_serial(frame, &mut buffer, width as usize),
            ComputePath::Gpu => self.run_parallel(frame, &mut buffer, width as usize)?,
        }
        let elapsed = start.elapsed();

        let edges = GrayImage::from_raw(width, height, buffer)
            .ok_or_else(|| BackendError::Kernel("edge buffer size mismatch".to_string()))?;

        Ok(FrameOutput { edges, elapsed })
    }
}
