//! Errors raised by textures, shaders, programs and batches

use thiserror::Error;

use crate::backend::{BackendError, ShaderStage};
use crate::geometry::GeometryError;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to compile {stage} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("Failed to link program: {log}")]
    ProgramLink { log: String },
    #[error("Program needs at least one shader")]
    NoShaders,
    #[error("Failed to decode image {name}: {source}")]
    ImageDecode {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Texture data for {name} holds {got} bytes, expected {expected}")]
    TextureSize {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Texture dimensions must be non-zero, got {width}x{height}x{depth}")]
    ZeroSizedTexture { width: u32, height: u32, depth: u32 },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
