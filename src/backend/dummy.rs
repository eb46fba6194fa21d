//! Dummy graphics backend for testing.
//!
//! Nothing reaches a GPU. Every call is appended to a log that tests can
//! inspect, and buffer uploads are applied to in-memory byte vectors so the
//! exact contents of a buffer object can be read back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Attribute pointer source, owned so it can outlive the call
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedSource {
    Offset(usize),
    Client(Vec<u8>),
}

/// Index source of a draw, owned so it can outlive the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedIndices {
    Offset(usize),
    Client(Vec<u32>),
}

/// One call made against a [`DummyBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateBuffer {
        handle: BufferHandle,
        target: BufferTarget,
        size: usize,
    },
    UploadBuffer {
        handle: BufferHandle,
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    BindBuffer {
        target: BufferTarget,
        handle: Option<BufferHandle>,
    },
    DeleteBuffer(BufferHandle),
    EnableAttribute {
        kind: AttributeKind,
        components: u32,
        stride: usize,
        source: RecordedSource,
    },
    DisableAttribute(AttributeKind),
    DrawArrays {
        primitive: PrimitiveType,
        first: usize,
        count: usize,
    },
    DrawElements {
        primitive: PrimitiveType,
        count: usize,
        indices: RecordedIndices,
    },
    CreateTexture {
        handle: TextureHandle,
        target: TextureTarget,
        width: u32,
        height: u32,
        depth: u32,
        format: InternalFormat,
        with_data: bool,
    },
    SetTextureFilter {
        target: TextureTarget,
        min: TextureFilter,
        mag: TextureFilter,
    },
    SetTextureWrap {
        target: TextureTarget,
        coordinate: TextureCoordinate,
        mode: WrapMode,
    },
    GenerateMipmaps(TextureTarget),
    ActiveTextureUnit(u32),
    BindTexture {
        target: TextureTarget,
        handle: Option<TextureHandle>,
    },
    SetTextureEnabled {
        target: TextureTarget,
        enabled: bool,
    },
    DeleteTexture(TextureHandle),
    CompileShader {
        stage: ShaderStage,
        handle: Option<ShaderHandle>,
    },
    LinkProgram {
        handle: Option<ProgramHandle>,
        bindings: Vec<(u32, String)>,
    },
    UseProgram(Option<ProgramHandle>),
    SetUniform {
        location: UniformLocation,
        name: String,
        value: UniformValue,
    },
    DeleteShader(ShaderHandle),
    DeleteProgram(ProgramHandle),
}

impl RecordedCall {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RecordedCall::DrawArrays { .. } | RecordedCall::DrawElements { .. }
        )
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, RecordedCall::UploadBuffer { .. })
    }
}

#[derive(Debug)]
struct DummyState {
    next_id: u64,
    buffers_supported: bool,
    /// Successful buffer creations left before one fails
    fail_buffer_after: Option<usize>,
    pending_errors: VecDeque<GlErrorCode>,
    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, TextureDescriptor>,
    shaders: HashMap<u64, String>,
    /// Program id to the sources of its attached shaders
    programs: HashMap<u64, Vec<String>>,
    /// Location id to (program id, uniform name)
    uniforms: HashMap<u64, (u64, String)>,
    calls: Vec<RecordedCall>,
}

impl DummyState {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Recording backend used by the test-suite.
///
/// Cloning shares the underlying state, so a test can keep one clone for
/// inspection and hand another to a [`crate::RenderContext`].
#[derive(Debug, Clone)]
pub struct DummyBackend {
    state: Arc<Mutex<DummyState>>,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a backend that reports buffer object support.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DummyState {
                next_id: 1,
                buffers_supported: true,
                fail_buffer_after: None,
                pending_errors: VecDeque::new(),
                buffers: HashMap::new(),
                textures: HashMap::new(),
                shaders: HashMap::new(),
                programs: HashMap::new(),
                uniforms: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Create a backend emulating a context without buffer objects.
    pub fn without_buffer_objects() -> Self {
        let backend = Self::new();
        backend.state.lock().buffers_supported = false;
        backend
    }

    /// Make the next `create_buffer` call fail.
    pub fn fail_next_buffer_creation(&self) {
        self.fail_buffer_creation_after(0);
    }

    /// Let `successes` buffer creations through, then fail one.
    pub fn fail_buffer_creation_after(&self, successes: usize) {
        self.state.lock().fail_buffer_after = Some(successes);
    }

    /// Queue an error to be returned by `check_error`.
    pub fn push_error(&self, error: GlErrorCode) {
        self.state.lock().pending_errors.push_back(error);
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded draw calls only.
    pub fn draw_calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_draw())
            .cloned()
            .collect()
    }

    /// Number of buffer uploads recorded so far.
    pub fn upload_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.is_upload()).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Current contents of a live buffer object.
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&handle.0).cloned()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.state.lock().programs.len()
    }

    fn record(&self, call: RecordedCall) {
        log::trace!("DummyBackend: {:?}", call);
        self.state.lock().calls.push(call);
    }
}

impl GraphicsApi for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn capabilities(&self) -> Capabilities {
        let state = self.state.lock();
        Capabilities {
            buffer_objects: state.buffers_supported,
            texture_enables: true,
            description: "dummy".to_string(),
        }
    }

    fn check_error(&self) -> Option<GlErrorCode> {
        self.state.lock().pending_errors.pop_front()
    }

    fn create_buffer(&self, target: BufferTarget, size: usize) -> BackendResult<BufferHandle> {
        let handle = {
            let mut state = self.state.lock();
            if !state.buffers_supported {
                return Err(BackendError::Unsupported("buffer objects"));
            }
            match state.fail_buffer_after {
                Some(0) => {
                    state.fail_buffer_after = None;
                    return Err(BackendError::BufferCreationFailed(
                        "simulated allocation failure".to_string(),
                    ));
                }
                Some(n) => state.fail_buffer_after = Some(n - 1),
                None => {}
            }
            let id = state.allocate_id();
            state.buffers.insert(id, vec![0; size]);
            BufferHandle(id)
        };
        self.record(RecordedCall::CreateBuffer {
            handle,
            target,
            size,
        });
        Ok(handle)
    }

    fn upload_buffer(
        &self,
        handle: BufferHandle,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> BackendResult<()> {
        {
            let mut state = self.state.lock();
            let buffer = state
                .buffers
                .get_mut(&handle.0)
                .ok_or(BackendError::InvalidHandle {
                    kind: "buffer",
                    id: handle.0,
                })?;
            let end = offset + data.len();
            if end > buffer.len() {
                return Err(BackendError::UploadOutOfBounds {
                    offset,
                    len: data.len(),
                    size: buffer.len(),
                });
            }
            buffer[offset..end].copy_from_slice(data);
        }
        self.record(RecordedCall::UploadBuffer {
            handle,
            target,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn bind_buffer(&self, target: BufferTarget, handle: Option<BufferHandle>) {
        self.record(RecordedCall::BindBuffer { target, handle });
    }

    fn delete_buffer(&self, handle: BufferHandle) {
        self.state.lock().buffers.remove(&handle.0);
        self.record(RecordedCall::DeleteBuffer(handle));
    }

    fn enable_attribute(
        &self,
        kind: AttributeKind,
        components: u32,
        stride: usize,
        source: AttributeSource<'_>,
    ) {
        let source = match source {
            AttributeSource::Offset(offset) => RecordedSource::Offset(offset),
            AttributeSource::Client(bytes) => RecordedSource::Client(bytes.to_vec()),
        };
        self.record(RecordedCall::EnableAttribute {
            kind,
            components,
            stride,
            source,
        });
    }

    fn disable_attribute(&self, kind: AttributeKind) {
        self.record(RecordedCall::DisableAttribute(kind));
    }

    fn draw_arrays(&self, primitive: PrimitiveType, first: usize, count: usize) {
        self.record(RecordedCall::DrawArrays {
            primitive,
            first,
            count,
        });
    }

    fn draw_elements(&self, primitive: PrimitiveType, count: usize, indices: IndexSource<'_>) {
        let indices = match indices {
            IndexSource::Offset(offset) => RecordedIndices::Offset(offset),
            IndexSource::Client(values) => RecordedIndices::Client(values.to_vec()),
        };
        self.record(RecordedCall::DrawElements {
            primitive,
            count,
            indices,
        });
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<TextureHandle> {
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.depth == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "zero-sized texture {}x{}x{}",
                descriptor.width, descriptor.height, descriptor.depth
            )));
        }
        if let Some(bytes) = data {
            if bytes.len() < descriptor.byte_size() {
                return Err(BackendError::TextureCreationFailed(format!(
                    "expected {} bytes of pixel data, got {}",
                    descriptor.byte_size(),
                    bytes.len()
                )));
            }
        }
        let handle = {
            let mut state = self.state.lock();
            let id = state.allocate_id();
            state.textures.insert(id, descriptor.clone());
            TextureHandle(id)
        };
        self.record(RecordedCall::CreateTexture {
            handle,
            target: descriptor.target,
            width: descriptor.width,
            height: descriptor.height,
            depth: descriptor.depth,
            format: descriptor.format,
            with_data: data.is_some(),
        });
        Ok(handle)
    }

    fn set_texture_filter(&self, target: TextureTarget, min: TextureFilter, mag: TextureFilter) {
        self.record(RecordedCall::SetTextureFilter { target, min, mag });
    }

    fn set_texture_wrap(&self, target: TextureTarget, coordinate: TextureCoordinate, mode: WrapMode) {
        self.record(RecordedCall::SetTextureWrap {
            target,
            coordinate,
            mode,
        });
    }

    fn generate_mipmaps(&self, target: TextureTarget) {
        self.record(RecordedCall::GenerateMipmaps(target));
    }

    fn active_texture_unit(&self, unit: u32) {
        self.record(RecordedCall::ActiveTextureUnit(unit));
    }

    fn bind_texture(&self, target: TextureTarget, handle: Option<TextureHandle>) {
        self.record(RecordedCall::BindTexture { target, handle });
    }

    fn set_texture_enabled(&self, target: TextureTarget, enabled: bool) {
        self.record(RecordedCall::SetTextureEnabled { target, enabled });
    }

    fn delete_texture(&self, handle: TextureHandle) {
        self.state.lock().textures.remove(&handle.0);
        self.record(RecordedCall::DeleteTexture(handle));
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> BackendResult<CompiledShader> {
        let (handle, log) = if source.trim().is_empty() {
            (None, format!("{stage} shader: empty source"))
        } else if let Some(line) = source.lines().position(|l| l.trim_start().starts_with("#error")) {
            (None, format!("0:{}: error: #error directive", line + 1))
        } else {
            let mut state = self.state.lock();
            let id = state.allocate_id();
            state.shaders.insert(id, source.to_string());
            (Some(ShaderHandle(id)), String::new())
        };
        self.record(RecordedCall::CompileShader { stage, handle });
        Ok(CompiledShader { handle, log })
    }

    fn link_program(
        &self,
        shaders: &[ShaderHandle],
        attribute_bindings: &[(u32, &str)],
    ) -> BackendResult<LinkedProgram> {
        let (handle, log) = {
            let mut state = self.state.lock();
            let mut sources = Vec::with_capacity(shaders.len());
            for shader in shaders {
                let source = state
                    .shaders
                    .get(&shader.0)
                    .cloned()
                    .ok_or(BackendError::InvalidHandle {
                        kind: "shader",
                        id: shader.0,
                    })?;
                sources.push(source);
            }
            if sources.is_empty() {
                (None, "no shaders attached".to_string())
            } else {
                let id = state.allocate_id();
                state.programs.insert(id, sources);
                (Some(ProgramHandle(id)), String::new())
            }
        };
        self.record(RecordedCall::LinkProgram {
            handle,
            bindings: attribute_bindings
                .iter()
                .map(|(slot, name)| (*slot, name.to_string()))
                .collect(),
        });
        Ok(LinkedProgram { handle, log })
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        self.record(RecordedCall::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.lock();
        let declared = state
            .programs
            .get(&program.0)?
            .iter()
            .any(|source| source.contains(name));
        if !declared {
            return None;
        }
        let existing = state
            .uniforms
            .iter()
            .find(|(_, (p, n))| *p == program.0 && n == name)
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = state.allocate_id();
                state.uniforms.insert(id, (program.0, name.to_string()));
                id
            }
        };
        Some(UniformLocation(id))
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        let name = self
            .state
            .lock()
            .uniforms
            .get(&location.0)
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
        self.record(RecordedCall::SetUniform {
            location,
            name,
            value: *value,
        });
    }

    fn delete_shader(&self, handle: ShaderHandle) {
        self.state.lock().shaders.remove(&handle.0);
        self.record(RecordedCall::DeleteShader(handle));
    }

    fn delete_program(&self, handle: ProgramHandle) {
        {
            let mut state = self.state.lock();
            state.programs.remove(&handle.0);
            state.uniforms.retain(|_, (program, _)| *program != handle.0);
        }
        self.record(RecordedCall::DeleteProgram(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_upload_is_byte_accurate() {
        let backend = DummyBackend::new();
        let handle = backend.create_buffer(BufferTarget::Array, 8).unwrap();
        backend
            .upload_buffer(handle, BufferTarget::Array, 2, &[1, 2, 3])
            .unwrap();
        assert_eq!(
            backend.buffer_contents(handle).unwrap(),
            vec![0, 0, 1, 2, 3, 0, 0, 0]
        );
    }

    #[test]
    fn test_upload_out_of_bounds() {
        let backend = DummyBackend::new();
        let handle = backend.create_buffer(BufferTarget::Array, 4).unwrap();
        let err = backend
            .upload_buffer(handle, BufferTarget::Array, 2, &[0; 4])
            .unwrap_err();
        assert!(matches!(err, BackendError::UploadOutOfBounds { .. }));
    }

    #[test]
    fn test_injected_buffer_failure_is_one_shot() {
        let backend = DummyBackend::new();
        backend.fail_next_buffer_creation();
        assert!(backend.create_buffer(BufferTarget::Array, 4).is_err());
        assert!(backend.create_buffer(BufferTarget::Array, 4).is_ok());
    }

    #[test]
    fn test_no_buffer_objects() {
        let backend = DummyBackend::without_buffer_objects();
        assert!(!backend.capabilities().buffer_objects);
        assert_eq!(
            backend.create_buffer(BufferTarget::Array, 4),
            Err(BackendError::Unsupported("buffer objects"))
        );
    }

    #[test]
    fn test_shader_compile_and_uniform_lookup() {
        let backend = DummyBackend::new();
        let vs = backend
            .compile_shader(ShaderStage::Vertex, "uniform mat4 u_view;")
            .unwrap();
        assert!(vs.handle.is_some());
        let bad = backend
            .compile_shader(ShaderStage::Fragment, "#error nope")
            .unwrap();
        assert!(bad.handle.is_none());
        assert!(bad.log.contains("error"));

        let program = backend
            .link_program(&[vs.handle.unwrap()], &[(0, "a_position")])
            .unwrap()
            .handle
            .unwrap();
        let first = backend.uniform_location(program, "u_view");
        assert!(first.is_some());
        assert_eq!(first, backend.uniform_location(program, "u_view"));
        assert!(backend.uniform_location(program, "u_missing").is_none());
    }

    #[test]
    fn test_error_queue() {
        let backend = DummyBackend::new();
        assert_eq!(backend.check_error(), None);
        backend.push_error(GlErrorCode::InvalidOperation);
        assert_eq!(backend.check_error(), Some(GlErrorCode::InvalidOperation));
        assert_eq!(backend.check_error(), None);
    }
}
