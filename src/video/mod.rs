mod concat;

pub use concat::FfmpegConcatenator;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ToolError;

/// Joins ordered video segments into one file.
#[async_trait]
pub trait Concatenator: Send + Sync {
    /// Concatenate `inputs` in order into `output`, forcing the frame rate to `fps`.
    async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        fps: u32,
    ) -> Result<PathBuf, ToolError>;
}
