use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::Concatenator;
use crate::error::ToolError;

/// Concatenates segments with FFmpeg's concat demuxer, copying streams without re-encoding.
pub struct FfmpegConcatenator {
    program: PathBuf,
}

fn io_err(context: &'static str) -> impl FnOnce(std::io::Error) -> ToolError {
    move |source| ToolError::Io {
        context: context.to_string(),
        source,
    }
}

impl FfmpegConcatenator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// One `file '<path>'` line per input, with absolute paths since the
    /// demuxer resolves relative entries against the manifest's directory.
    fn manifest_contents(inputs: &[PathBuf]) -> Result<String, ToolError> {
        let mut contents = String::new();
        for input in inputs {
            let absolute = std::path::absolute(input).map_err(|source| ToolError::Io {
                context: format!("Failed to resolve segment path {}", input.display()),
                source,
            })?;
            // 转义单引号
            let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
            contents.push_str(&format!("file '{}'\n", escaped));
        }
        Ok(contents)
    }

    /// Write the manifest next to the output; it is deleted when the handle drops.
    fn write_manifest(dir: &Path, contents: &str) -> Result<NamedTempFile, ToolError> {
        let mut manifest = tempfile::Builder::new()
            .prefix("concat_list_")
            .suffix(".txt")
            .tempfile_in(dir)
            .map_err(io_err("Failed to create concat manifest"))?;
        manifest
            .write_all(contents.as_bytes())
            .map_err(io_err("Failed to write concat manifest"))?;
        manifest
            .flush()
            .map_err(io_err("Failed to write concat manifest"))?;
        Ok(manifest)
    }
}

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        fps: u32,
    ) -> Result<PathBuf, ToolError> {
        if inputs.is_empty() {
            return Err(ToolError::NoInputs);
        }
        info!(segments = inputs.len(), output = %output.display(), "Concatenating video segments");

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| ToolError::Io {
                context: format!("Failed to create output directory {}", output_dir.display()),
                source,
            })?;

        let contents = Self::manifest_contents(inputs)?;
        let manifest = Self::write_manifest(&output_dir, &contents)?;

        let fps = fps.to_string();
        let program = self.program.display().to_string();
        debug!(program = %program, manifest = %manifest.path().display(), "Running concat");

        // -f concat: 输入为文件列表
        // -safe 0: 允许绝对路径
        // -c copy: 不重新编码, 所有片段必须同一编码
        // -r: 输出帧率
        let result = Command::new(&self.program)
            .arg("-y")
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest.path())
            .args(["-c", "copy", "-r", fps.as_str()])
            .arg(output)
            .output()
            .await;

        // Remove the manifest before inspecting the result so no exit path leaves it behind.
        if let Err(e) = manifest.close() {
            error!(error = %e, "Failed to remove concat manifest");
        }

        let result = result.map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&result.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&result.stderr).into_owned();
        if !result.status.success() {
            error!(program = %program, status = %result.status, "Concatenation failed");
            error!(stdout = %stdout, "Tool stdout");
            error!(stderr = %stderr, "Tool stderr");
            return Err(ToolError::Failed {
                program,
                status: result.status.to_string(),
                stdout,
                stderr,
            });
        }

        debug!(stdout = %stdout, "Concatenation output");
        info!(output = %output.display(), "Concatenated video");
        Ok(output.to_path_buf())
    }
}
