//! GLSL shaders and linked programs

use std::cell::RefCell;
use std::collections::HashMap;

use super::error::{ResourceError, ResourceResult};
use crate::backend::*;
use crate::context::RenderContext;

/// A compiled shader stage; deleted on drop
pub struct Shader {
    ctx: RenderContext,
    handle: ShaderHandle,
    stage: ShaderStage,
    log: String,
}

impl Shader {
    /// Compile `source` for `stage`. A failed compile is logged with the
    /// compiler output and returned as [`ResourceError::ShaderCompile`].
    pub fn new(ctx: &RenderContext, stage: ShaderStage, source: &str) -> ResourceResult<Self> {
        let compiled = ctx.api().compile_shader(stage, source)?;
        match compiled.handle {
            Some(handle) => {
                if !compiled.log.is_empty() {
                    log::debug!("{} shader compile log:\n{}", stage, compiled.log);
                }
                Ok(Self {
                    ctx: ctx.clone(),
                    handle,
                    stage,
                    log: compiled.log,
                })
            }
            None => {
                log::error!("Failed to compile {} shader:\n{}", stage, compiled.log);
                Err(ResourceError::ShaderCompile {
                    stage,
                    log: compiled.log,
                })
            }
        }
    }

    pub fn vertex(ctx: &RenderContext, source: &str) -> ResourceResult<Self> {
        Self::new(ctx, ShaderStage::Vertex, source)
    }

    pub fn fragment(ctx: &RenderContext, source: &str) -> ResourceResult<Self> {
        Self::new(ctx, ShaderStage::Fragment, source)
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    /// Compiler output, usually empty for a clean compile
    pub fn compile_log(&self) -> &str {
        &self.log
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.ctx.api().delete_shader(self.handle);
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish()
    }
}

/// A linked program with cached uniform locations
pub struct Program {
    ctx: RenderContext,
    handle: ProgramHandle,
    log: String,
    locations: RefCell<HashMap<String, Option<UniformLocation>>>,
}

impl Program {
    /// Link `shaders` with the vertex attributes bound to their fixed slots.
    pub fn new(ctx: &RenderContext, shaders: &[&Shader]) -> ResourceResult<Self> {
        if shaders.is_empty() {
            log::error!("Cannot link a program without shaders");
            return Err(ResourceError::NoShaders);
        }

        let handles: Vec<ShaderHandle> = shaders.iter().map(|s| s.handle()).collect();
        let bindings: Vec<(u32, &str)> = AttributeKind::ALL
            .iter()
            .map(|kind| (kind.slot(), kind.binding_name()))
            .collect();

        let linked = ctx.api().link_program(&handles, &bindings)?;
        match linked.handle {
            Some(handle) => {
                log::debug!("Linked program {:?} from {} shaders", handle, shaders.len());
                Ok(Self {
                    ctx: ctx.clone(),
                    handle,
                    log: linked.log,
                    locations: RefCell::new(HashMap::new()),
                })
            }
            None => {
                log::error!("Failed to link program:\n{}", linked.log);
                Err(ResourceError::ProgramLink { log: linked.log })
            }
        }
    }

    /// Compile a vertex and a fragment shader and link them. Both compile
    /// logs are reported before the first failure is returned.
    pub fn from_sources(ctx: &RenderContext, vertex: &str, fragment: &str) -> ResourceResult<Self> {
        let vs = Shader::vertex(ctx, vertex);
        let fs = Shader::fragment(ctx, fragment);
        let (vs, fs) = (vs?, fs?);
        Self::new(ctx, &[&vs, &fs])
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn link_log(&self) -> &str {
        &self.log
    }

    pub fn bind(&self) {
        self.ctx.api().use_program(Some(self.handle));
        self.ctx.debug_check("Program::bind");
    }

    pub fn unbind(&self) {
        self.ctx.api().use_program(None);
    }

    /// Location of `name`, looked up once and cached, misses included
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        if let Some(location) = self.locations.borrow().get(name) {
            return *location;
        }
        let location = self.ctx.api().uniform_location(self.handle, name);
        if location.is_none() {
            log::debug!("Uniform {} not found in program {:?}", name, self.handle);
        }
        self.locations.borrow_mut().insert(name.to_string(), location);
        location
    }

    /// Set a uniform on the bound program; returns false when the program
    /// has no such uniform.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) -> bool {
        match self.uniform_location(name) {
            Some(location) => {
                self.ctx.api().set_uniform(location, &value.into());
                true
            }
            None => false,
        }
    }

    /// Forget cached locations
    pub fn invalidate_locations(&self) {
        self.locations.borrow_mut().clear();
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.ctx.api().delete_program(self.handle);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("handle", &self.handle)
            .field("cached_locations", &self.locations.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderConfig;
    use glam::Mat4;

    const VS: &str = "uniform mat4 u_view;\nvoid main() { gl_Position = u_view * a_position; }";
    const FS: &str = "uniform vec4 u_tint;\nvoid main() { gl_FragColor = u_tint; }";

    fn context() -> (DummyBackend, RenderContext) {
        let backend = DummyBackend::new();
        (backend.clone(), RenderContext::new(backend, RenderConfig::default()))
    }

    #[test]
    fn test_compile_failure_carries_log() {
        let (_, ctx) = context();
        let err = Shader::fragment(&ctx, "#error broken\n").unwrap_err();
        match err {
            ResourceError::ShaderCompile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("#error"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_link_binds_attribute_slots() {
        let (backend, ctx) = context();
        let program = Program::from_sources(&ctx, VS, FS).unwrap();
        let bindings = backend
            .calls()
            .into_iter()
            .find_map(|call| match call {
                RecordedCall::LinkProgram { bindings, .. } => Some(bindings),
                _ => None,
            })
            .unwrap();
        assert_eq!(bindings.len(), 4);
        assert!(bindings.contains(&(AttributeKind::Vertex.slot(), "a_position".to_string())));
        assert_eq!(backend.live_program_count(), 1);
        drop(program);
        assert_eq!(backend.live_program_count(), 0);
    }

    #[test]
    fn test_empty_program_is_rejected() {
        let (_, ctx) = context();
        assert!(matches!(Program::new(&ctx, &[]), Err(ResourceError::NoShaders)));
    }

    #[test]
    fn test_set_uniform_caches_location() {
        let (backend, ctx) = context();
        let program = Program::from_sources(&ctx, VS, FS).unwrap();
        program.bind();

        assert!(program.set_uniform("u_view", Mat4::IDENTITY));
        assert!(program.set_uniform("u_view", Mat4::IDENTITY));
        assert!(!program.set_uniform("u_missing", 1.0f32));

        let sets: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RecordedCall::SetUniform { .. }))
            .collect();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0], sets[1]);
    }

    #[test]
    fn test_vertex_failure_reported_first() {
        let (_, ctx) = context();
        let err = Program::from_sources(&ctx, "", FS).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }
}
