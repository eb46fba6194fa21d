//! Core backend abstraction traits
//!
//! [`GraphicsApi`] is the seam between the geometry/resource layer and the
//! actual OpenGL entry points. Both the glow backend and the recording dummy
//! backend implement it.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to create program: {0}")]
    ProgramCreationFailed(String),
    #[error("Unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u64 },
    #[error("Upload of {len} bytes at offset {offset} exceeds buffer size {size}")]
    UploadOutOfBounds { offset: usize, len: usize, size: usize },
    #[error("Operation not supported by this context: {0}")]
    Unsupported(&'static str),
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a compiled shader object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Handle to a linked program object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Resolved uniform location inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u64);

/// Result of a shader compilation. Compilation failures are not errors at
/// this level; the handle is `None` and the log explains why.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub handle: Option<ShaderHandle>,
    pub log: String,
}

/// Result of a program link, same convention as [`CompiledShader`]
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub handle: Option<ProgramHandle>,
    pub log: String,
}

/// Graphics API abstraction
///
/// Methods take `&self`; implementations keep their mutable state behind
/// interior mutability so a single API object can be shared by every
/// resource created on the same context.
pub trait GraphicsApi {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Probe what the current context supports
    fn capabilities(&self) -> Capabilities;

    /// Whether server-side buffer objects can be created
    fn buffers_supported(&self) -> bool {
        self.capabilities().buffer_objects
    }

    /// Pop the next pending error from the API error queue
    fn check_error(&self) -> Option<GlErrorCode>;

    // === Buffer operations ===

    /// Allocate an uninitialized buffer of `size` bytes
    fn create_buffer(&self, target: BufferTarget, size: usize) -> BackendResult<BufferHandle>;

    /// Bind `handle` to `target` and overwrite `data.len()` bytes at `offset`
    fn upload_buffer(
        &self,
        handle: BufferHandle,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> BackendResult<()>;

    fn bind_buffer(&self, target: BufferTarget, handle: Option<BufferHandle>);

    fn delete_buffer(&self, handle: BufferHandle);

    // === Vertex attributes and draws ===

    /// Enable the attribute slot of `kind` and point it at `source`
    fn enable_attribute(
        &self,
        kind: AttributeKind,
        components: u32,
        stride: usize,
        source: AttributeSource<'_>,
    );

    fn disable_attribute(&self, kind: AttributeKind);

    fn draw_arrays(&self, primitive: PrimitiveType, first: usize, count: usize);

    fn draw_elements(&self, primitive: PrimitiveType, count: usize, indices: IndexSource<'_>);

    // === Texture operations ===

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<TextureHandle>;

    /// Set min and mag filters on the texture currently bound to `target`
    fn set_texture_filter(&self, target: TextureTarget, min: TextureFilter, mag: TextureFilter);

    fn set_texture_wrap(&self, target: TextureTarget, coordinate: TextureCoordinate, mode: WrapMode);

    fn generate_mipmaps(&self, target: TextureTarget);

    fn active_texture_unit(&self, unit: u32);

    fn bind_texture(&self, target: TextureTarget, handle: Option<TextureHandle>);

    /// Toggle the fixed-function texture enable on the active unit
    fn set_texture_enabled(&self, target: TextureTarget, enabled: bool);

    fn delete_texture(&self, handle: TextureHandle);

    // === Shader operations ===

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> BackendResult<CompiledShader>;

    /// Link `shaders`, binding each `(slot, name)` attribute before linking
    fn link_program(
        &self,
        shaders: &[ShaderHandle],
        attribute_bindings: &[(u32, &str)],
    ) -> BackendResult<LinkedProgram>;

    fn use_program(&self, program: Option<ProgramHandle>);

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Upload to a location of the program currently in use
    fn set_uniform(&self, location: UniformLocation, value: &UniformValue);

    fn delete_shader(&self, handle: ShaderHandle);

    fn delete_program(&self, handle: ProgramHandle);
}
