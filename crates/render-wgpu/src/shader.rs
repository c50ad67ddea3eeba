//! Shader compilation with stage-tagged failure reporting.
//!
//! wgpu reports validation trouble through error scopes rather than return
//! values. Each compile or pipeline build runs inside its own scope here, so
//! a failure names the stage it came from and the caller can keep running
//! without a usable program.

use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stage a shader failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    /// Whole-program failures: stage interfaces that do not line up, missing
    /// entry points, bind group mismatches.
    Program,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
            ShaderStage::Program => "PROGRAM",
        })
    }
}

/// Errors from building a shader program.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read shader {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader error: {message}")]
    Compile { stage: ShaderStage, message: String },
}

/// Run `build` under a validation error scope, tagging any failure with `stage`.
pub fn with_stage_scope<T>(
    device: &wgpu::Device,
    stage: ShaderStage,
    build: impl FnOnce() -> T,
) -> Result<T, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(ShaderError::Compile {
            stage,
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}

/// Read a WGSL file and compile it, attributing errors to `stage`.
pub fn compile_shader_module(
    device: &wgpu::Device,
    path: &Path,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    with_stage_scope(device, stage, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: path.file_name().and_then(|name| name.to_str()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
}
