use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, ImageReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ProcessorError;

/// A decoded grayscale frame owned by a single request.
#[derive(Clone)]
pub struct Frame {
    frame_id: Uuid,
    source: PathBuf,
    image: Arc<GrayImage>,
    loaded_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(source: impl Into<PathBuf>, image: DynamicImage) -> Self {
        Self {
            frame_id: Uuid::new_v4(),
            source: source.into(),
            image: Arc::new(image.into_luma8()),
            loaded_at: Utc::now(),
        }
    }

    /// Reads and decodes the image at `path`.
    ///
    /// A path that does not exist is `FileNotFound`; anything else that keeps
    /// the file from decoding is `Decode`.
    pub fn load(path: &Path) -> Result<Self, ProcessorError> {
        if !path.exists() {
            return Err(ProcessorError::FileNotFound(path.to_path_buf()));
        }

        let decode_error = |reason: String| ProcessorError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let image = ImageReader::open(path)
            .map_err(|e| decode_error(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?
            .decode()
            .map_err(|e| decode_error(e.to_string()))?;

        Ok(Self::new(path, image))
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
