//! OpenGL backend implementation on top of glow

mod conversion;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use glow::{HasContext, PixelUnpackData};

use crate::backend::traits::*;
use crate::backend::types::*;
use conversion::*;

/// Buffer object together with its allocated size
struct GlowBuffer {
    raw: glow::Buffer,
    size: usize,
}

#[derive(Default)]
struct GlowState {
    // Resource storage
    buffers: HashMap<u64, GlowBuffer>,
    textures: HashMap<u64, glow::Texture>,
    shaders: HashMap<u64, glow::Shader>,
    programs: HashMap<u64, glow::Program>,
    uniforms: HashMap<u64, glow::UniformLocation>,

    // Handle counters
    next_buffer_id: u64,
    next_texture_id: u64,
    next_shader_id: u64,
    next_program_id: u64,
    next_uniform_id: u64,

    // Bindings that client-array streaming has to restore
    bound_array: Option<glow::Buffer>,
    bound_element: Option<glow::Buffer>,

    /// Orphaned per-frame buffers used to feed client-side attribute data
    stream_attributes: [Option<glow::Buffer>; 4],
    stream_indices: Option<glow::Buffer>,
}

/// OpenGL backend
///
/// Client-side arrays are not available on core profiles, so attribute and
/// index data living in process memory is streamed through small buffers
/// that are re-specified on every use.
///
/// That streaming path itself needs buffer objects. On a context without
/// them (pre-1.5 GL without `ARB_vertex_buffer_object`) geometry is still
/// created in client memory, but attribute setup and client-indexed draws
/// are skipped and nothing reaches the screen.
pub struct GlowBackend {
    gl: Arc<glow::Context>,
    vao: Option<glow::VertexArray>,
    capabilities: Capabilities,
    state: RefCell<GlowState>,
}

impl GlowBackend {
    /// Wrap an existing context.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread for as long as the
    /// backend, and every resource created through it, is alive.
    pub unsafe fn new(gl: Arc<glow::Context>) -> BackendResult<Self> {
        let capabilities = unsafe { Self::probe(&gl) };
        log::info!("GlowBackend: {}", capabilities.description);
        if !capabilities.buffer_objects {
            log::error!(
                "GlowBackend: buffer objects unavailable; client-memory geometry cannot be streamed and will not draw"
            );
        }

        let version = gl.version();
        let vao = if version.major >= 3 {
            let vao = unsafe { gl.create_vertex_array() }
                .map_err(BackendError::InitializationFailed)?;
            unsafe { gl.bind_vertex_array(Some(vao)) };
            Some(vao)
        } else {
            None
        };

        Ok(Self {
            gl,
            vao,
            capabilities,
            state: RefCell::new(GlowState {
                next_buffer_id: 1,
                next_texture_id: 1,
                next_shader_id: 1,
                next_program_id: 1,
                next_uniform_id: 1,
                ..Default::default()
            }),
        })
    }

    /// Underlying glow context
    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    unsafe fn probe(gl: &glow::Context) -> Capabilities {
        let version = gl.version();
        let has_extension = gl
            .supported_extensions()
            .contains("GL_ARB_vertex_buffer_object");
        let buffer_objects = if version.is_embedded {
            version.major >= 2
        } else {
            (version.major, version.minor) >= (1, 5) || has_extension
        };

        let texture_enables = if version.is_embedded {
            false
        } else if (version.major, version.minor) >= (3, 2) {
            let mask = unsafe { gl.get_parameter_i32(glow::CONTEXT_PROFILE_MASK) } as u32;
            mask & glow::CONTEXT_COMPATIBILITY_PROFILE_BIT != 0
        } else {
            true
        };

        let description = unsafe {
            format!(
                "{} ({})",
                gl.get_parameter_string(glow::VERSION),
                gl.get_parameter_string(glow::RENDERER)
            )
        };

        Capabilities {
            buffer_objects,
            texture_enables,
            description,
        }
    }

    fn raw_buffer(&self, handle: BufferHandle) -> BackendResult<(glow::Buffer, usize)> {
        self.state
            .borrow()
            .buffers
            .get(&handle.0)
            .map(|b| (b.raw, b.size))
            .ok_or(BackendError::InvalidHandle {
                kind: "buffer",
                id: handle.0,
            })
    }

    fn set_binding(&self, target: BufferTarget, raw: Option<glow::Buffer>) {
        let mut state = self.state.borrow_mut();
        match target {
            BufferTarget::Array => state.bound_array = raw,
            BufferTarget::ElementArray => state.bound_element = raw,
        }
    }

    /// Lazily create the stream buffer for `kind` (or for indices when `None`)
    fn stream_buffer(&self, kind: Option<AttributeKind>) -> Option<glow::Buffer> {
        if !self.capabilities.buffer_objects {
            return None;
        }
        let mut state = self.state.borrow_mut();
        let slot = match kind {
            Some(kind) => &mut state.stream_attributes[kind.index()],
            None => &mut state.stream_indices,
        };
        if slot.is_none() {
            match unsafe { self.gl.create_buffer() } {
                Ok(raw) => *slot = Some(raw),
                Err(e) => log::error!("GlowBackend: failed to create stream buffer: {}", e),
            }
        }
        *slot
    }
}

impl Drop for GlowBackend {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        unsafe {
            for raw in state.stream_attributes.iter().flatten() {
                self.gl.delete_buffer(*raw);
            }
            if let Some(raw) = state.stream_indices {
                self.gl.delete_buffer(raw);
            }
            if let Some(vao) = self.vao {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vao);
            }
        }
        if !state.buffers.is_empty() || !state.textures.is_empty() || !state.programs.is_empty() {
            log::warn!(
                "GlowBackend dropped with {} buffers, {} textures and {} programs still alive",
                state.buffers.len(),
                state.textures.len(),
                state.programs.len()
            );
        }
    }
}

impl GraphicsApi for GlowBackend {
    fn name(&self) -> &'static str {
        "OpenGL (glow)"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn check_error(&self) -> Option<GlErrorCode> {
        convert_error(unsafe { self.gl.get_error() })
    }

    fn create_buffer(&self, target: BufferTarget, size: usize) -> BackendResult<BufferHandle> {
        if !self.capabilities.buffer_objects {
            return Err(BackendError::Unsupported("buffer objects"));
        }
        let gl_target = convert_buffer_target(target);
        let raw = unsafe { self.gl.create_buffer() }.map_err(BackendError::BufferCreationFailed)?;
        unsafe {
            self.gl.bind_buffer(gl_target, Some(raw));
            self.gl.buffer_data_size(gl_target, size as i32, glow::STATIC_DRAW);
        }
        self.set_binding(target, Some(raw));
        match convert_error(unsafe { self.gl.get_error() }) {
            Some(GlErrorCode::OutOfMemory) => {
                unsafe { self.gl.delete_buffer(raw) };
                self.set_binding(target, None);
                return Err(BackendError::OutOfMemory);
            }
            Some(other) => log::warn!("GlowBackend: {} while allocating buffer", other),
            None => {}
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_buffer_id;
        state.next_buffer_id += 1;
        state.buffers.insert(id, GlowBuffer { raw, size });
        log::trace!("GlowBackend: created buffer {} ({} bytes)", id, size);
        Ok(BufferHandle(id))
    }

    fn upload_buffer(
        &self,
        handle: BufferHandle,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> BackendResult<()> {
        let (raw, size) = self.raw_buffer(handle)?;
        if offset + data.len() > size {
            return Err(BackendError::UploadOutOfBounds {
                offset,
                len: data.len(),
                size,
            });
        }
        let gl_target = convert_buffer_target(target);
        unsafe {
            self.gl.bind_buffer(gl_target, Some(raw));
            self.gl.buffer_sub_data_u8_slice(gl_target, offset as i32, data);
        }
        self.set_binding(target, Some(raw));
        Ok(())
    }

    fn bind_buffer(&self, target: BufferTarget, handle: Option<BufferHandle>) {
        let raw = match handle {
            Some(handle) => match self.raw_buffer(handle) {
                Ok((raw, _)) => Some(raw),
                Err(e) => {
                    log::error!("GlowBackend: bind_buffer: {}", e);
                    return;
                }
            },
            None => None,
        };
        unsafe { self.gl.bind_buffer(convert_buffer_target(target), raw) };
        self.set_binding(target, raw);
    }

    fn delete_buffer(&self, handle: BufferHandle) {
        let removed = self.state.borrow_mut().buffers.remove(&handle.0);
        if let Some(buffer) = removed {
            unsafe { self.gl.delete_buffer(buffer.raw) };
            let mut state = self.state.borrow_mut();
            if state.bound_array == Some(buffer.raw) {
                state.bound_array = None;
            }
            if state.bound_element == Some(buffer.raw) {
                state.bound_element = None;
            }
        }
    }

    fn enable_attribute(
        &self,
        kind: AttributeKind,
        components: u32,
        stride: usize,
        source: AttributeSource<'_>,
    ) {
        let slot = kind.slot();
        unsafe { self.gl.enable_vertex_attrib_array(slot) };
        match source {
            AttributeSource::Offset(offset) => unsafe {
                self.gl.vertex_attrib_pointer_f32(
                    slot,
                    components as i32,
                    glow::FLOAT,
                    false,
                    stride as i32,
                    offset as i32,
                );
            },
            AttributeSource::Client(bytes) => {
                let Some(stream) = self.stream_buffer(Some(kind)) else {
                    return;
                };
                let previous = self.state.borrow().bound_array;
                unsafe {
                    self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(stream));
                    self.gl
                        .buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::STREAM_DRAW);
                    self.gl.vertex_attrib_pointer_f32(
                        slot,
                        components as i32,
                        glow::FLOAT,
                        false,
                        stride as i32,
                        0,
                    );
                    self.gl.bind_buffer(glow::ARRAY_BUFFER, previous);
                }
            }
        }
    }

    fn disable_attribute(&self, kind: AttributeKind) {
        unsafe { self.gl.disable_vertex_attrib_array(kind.slot()) };
    }

    fn draw_arrays(&self, primitive: PrimitiveType, first: usize, count: usize) {
        unsafe {
            self.gl
                .draw_arrays(convert_primitive(primitive), first as i32, count as i32)
        };
    }

    fn draw_elements(&self, primitive: PrimitiveType, count: usize, indices: IndexSource<'_>) {
        let mode = convert_primitive(primitive);
        match indices {
            IndexSource::Offset(offset) => unsafe {
                self.gl
                    .draw_elements(mode, count as i32, glow::UNSIGNED_INT, offset as i32);
            },
            IndexSource::Client(values) => {
                let Some(stream) = self.stream_buffer(None) else {
                    return;
                };
                let previous = self.state.borrow().bound_element;
                unsafe {
                    self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(stream));
                    self.gl.buffer_data_u8_slice(
                        glow::ELEMENT_ARRAY_BUFFER,
                        bytemuck::cast_slice(values),
                        glow::STREAM_DRAW,
                    );
                    self.gl.draw_elements(mode, count as i32, glow::UNSIGNED_INT, 0);
                    self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, previous);
                }
            }
        }
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<TextureHandle> {
        if let Some(bytes) = data {
            if bytes.len() < descriptor.byte_size() {
                return Err(BackendError::TextureCreationFailed(format!(
                    "expected {} bytes of pixel data, got {}",
                    descriptor.byte_size(),
                    bytes.len()
                )));
            }
        }
        let target = convert_texture_target(descriptor.target);
        let internal = convert_internal_format(descriptor.format);
        let format = convert_pixel_format(descriptor.format.pixel_format());
        let ty = convert_pixel_type(descriptor.format.pixel_type());

        let raw = unsafe { self.gl.create_texture() }.map_err(BackendError::TextureCreationFailed)?;
        unsafe {
            self.gl.bind_texture(target, Some(raw));
            match descriptor.target {
                TextureTarget::Texture2D => self.gl.tex_image_2d(
                    target,
                    0,
                    internal,
                    descriptor.width as i32,
                    descriptor.height as i32,
                    0,
                    format,
                    ty,
                    PixelUnpackData::Slice(data),
                ),
                TextureTarget::Texture3D => self.gl.tex_image_3d(
                    target,
                    0,
                    internal,
                    descriptor.width as i32,
                    descriptor.height as i32,
                    descriptor.depth as i32,
                    0,
                    format,
                    ty,
                    PixelUnpackData::Slice(data),
                ),
            }
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_texture_id;
        state.next_texture_id += 1;
        state.textures.insert(id, raw);
        log::trace!(
            "GlowBackend: created texture {} {:?} ({}x{}x{})",
            id,
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.depth
        );
        Ok(TextureHandle(id))
    }

    fn set_texture_filter(&self, target: TextureTarget, min: TextureFilter, mag: TextureFilter) {
        let target = convert_texture_target(target);
        unsafe {
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, convert_filter(min));
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, convert_filter(mag));
        }
    }

    fn set_texture_wrap(&self, target: TextureTarget, coordinate: TextureCoordinate, mode: WrapMode) {
        unsafe {
            self.gl.tex_parameter_i32(
                convert_texture_target(target),
                convert_coordinate(coordinate),
                convert_wrap_mode(mode),
            );
        }
    }

    fn generate_mipmaps(&self, target: TextureTarget) {
        unsafe { self.gl.generate_mipmap(convert_texture_target(target)) };
    }

    fn active_texture_unit(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&self, target: TextureTarget, handle: Option<TextureHandle>) {
        let raw = match handle {
            Some(handle) => match self.state.borrow().textures.get(&handle.0) {
                Some(raw) => Some(*raw),
                None => {
                    log::error!("GlowBackend: bind_texture: unknown texture {}", handle.0);
                    return;
                }
            },
            None => None,
        };
        unsafe { self.gl.bind_texture(convert_texture_target(target), raw) };
    }

    fn set_texture_enabled(&self, target: TextureTarget, enabled: bool) {
        if !self.capabilities.texture_enables {
            return;
        }
        let cap = convert_texture_target(target);
        unsafe {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn delete_texture(&self, handle: TextureHandle) {
        let removed = self.state.borrow_mut().textures.remove(&handle.0);
        if let Some(raw) = removed {
            unsafe { self.gl.delete_texture(raw) };
        }
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> BackendResult<CompiledShader> {
        let raw = unsafe { self.gl.create_shader(convert_shader_stage(stage)) }
            .map_err(BackendError::ShaderCreationFailed)?;
        let (ok, log) = unsafe {
            self.gl.shader_source(raw, source);
            self.gl.compile_shader(raw);
            (
                self.gl.get_shader_compile_status(raw),
                self.gl.get_shader_info_log(raw),
            )
        };
        if !ok {
            unsafe { self.gl.delete_shader(raw) };
            return Ok(CompiledShader { handle: None, log });
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_shader_id;
        state.next_shader_id += 1;
        state.shaders.insert(id, raw);
        Ok(CompiledShader {
            handle: Some(ShaderHandle(id)),
            log,
        })
    }

    fn link_program(
        &self,
        shaders: &[ShaderHandle],
        attribute_bindings: &[(u32, &str)],
    ) -> BackendResult<LinkedProgram> {
        let raw_shaders = {
            let state = self.state.borrow();
            shaders
                .iter()
                .map(|shader| {
                    state.shaders.get(&shader.0).copied().ok_or(BackendError::InvalidHandle {
                        kind: "shader",
                        id: shader.0,
                    })
                })
                .collect::<BackendResult<Vec<_>>>()?
        };

        let raw = unsafe { self.gl.create_program() }.map_err(BackendError::ProgramCreationFailed)?;
        let (ok, log) = unsafe {
            for shader in &raw_shaders {
                self.gl.attach_shader(raw, *shader);
            }
            for (slot, name) in attribute_bindings {
                self.gl.bind_attrib_location(raw, *slot, name);
            }
            self.gl.link_program(raw);
            for shader in &raw_shaders {
                self.gl.detach_shader(raw, *shader);
            }
            (
                self.gl.get_program_link_status(raw),
                self.gl.get_program_info_log(raw),
            )
        };
        if !ok {
            unsafe { self.gl.delete_program(raw) };
            return Ok(LinkedProgram { handle: None, log });
        }

        let mut state = self.state.borrow_mut();
        let id = state.next_program_id;
        state.next_program_id += 1;
        state.programs.insert(id, raw);
        Ok(LinkedProgram {
            handle: Some(ProgramHandle(id)),
            log,
        })
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let raw = program.and_then(|p| self.state.borrow().programs.get(&p.0).copied());
        unsafe { self.gl.use_program(raw) };
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let raw_program = self.state.borrow().programs.get(&program.0).copied()?;
        let location = unsafe { self.gl.get_uniform_location(raw_program, name) }?;
        let mut state = self.state.borrow_mut();
        let id = state.next_uniform_id;
        state.next_uniform_id += 1;
        state.uniforms.insert(id, location);
        Some(UniformLocation(id))
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        let state = self.state.borrow();
        let Some(raw) = state.uniforms.get(&location.0) else {
            log::error!("GlowBackend: unknown uniform location {}", location.0);
            return;
        };
        let raw = Some(raw);
        unsafe {
            match value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(raw, *v),
                UniformValue::Int(v) => self.gl.uniform_1_i32(raw, *v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(raw, v.x, v.y),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(raw, v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(raw, v.x, v.y, v.z, v.w),
                UniformValue::Mat4(m) => {
                    self.gl
                        .uniform_matrix_4_f32_slice(raw, false, &m.to_cols_array())
                }
            }
        }
    }

    fn delete_shader(&self, handle: ShaderHandle) {
        let removed = self.state.borrow_mut().shaders.remove(&handle.0);
        if let Some(raw) = removed {
            unsafe { self.gl.delete_shader(raw) };
        }
    }

    fn delete_program(&self, handle: ProgramHandle) {
        let removed = self.state.borrow_mut().programs.remove(&handle.0);
        if let Some(raw) = removed {
            unsafe { self.gl.delete_program(raw) };
        }
    }
}
