//! glkit - a thin OpenGL helper library
//!
//! The core of the crate is the geometry layer: [`geometry::BufferFormat`]
//! describes which vertex attributes exist, [`geometry::GeometryBuffer`] lays
//! them out in separate contiguous regions either in client memory or in
//! buffer objects, and [`resources::Batch`] materializes caller data into a
//! private buffer or into its own sub-range of a buffer shared with other
//! batches.
//!
//! Around it sit the usual helpers:
//! - [`resources::Mesh`]: a batch with textures and a shader program
//! - [`resources::Texture`], [`resources::Texture3D`]
//! - [`resources::Shader`], [`resources::Program`]
//! - [`scene::Camera`], [`scene::Trackball`]
//! - [`time::FpsCounter`]
//!
//! Every GPU call goes through a [`RenderContext`], which wraps a
//! [`backend::GraphicsApi`] implementation. The `glow-backend` feature provides
//! the OpenGL one; [`backend::DummyBackend`] records calls for tests.

pub mod backend;
pub mod context;
pub mod geometry;
#[cfg(not(target_arch = "wasm32"))]
pub mod logging;
pub mod resources;
pub mod scene;
pub mod time;

pub use backend::{GraphicsApi, PrimitiveType, TextureFilter, WrapMode};
pub use context::RenderContext;

/// Configuration for a [`RenderContext`]
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Keep geometry in client memory even when buffer objects are available
    pub force_client_arrays: bool,
    /// Minification filter used by textures created without an explicit one
    pub default_texture_filter: TextureFilter,
    /// Wrap mode applied to newly created textures
    pub default_wrap_mode: WrapMode,
    /// Poll the error queue after every call that can raise a GL error
    pub auto_debug_output: bool,
    /// Primitive type of new buffers, and of batches that never set their own
    pub default_primitive: PrimitiveType,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            force_client_arrays: false,
            default_texture_filter: TextureFilter::LinearMipmapLinear,
            default_wrap_mode: WrapMode::ClampToEdge,
            auto_debug_output: false,
            default_primitive: PrimitiveType::Triangles,
        }
    }
}

impl RenderConfig {
    pub fn with_client_arrays(mut self, force: bool) -> Self {
        self.force_client_arrays = force;
        self
    }

    pub fn with_texture_filter(mut self, filter: TextureFilter) -> Self {
        self.default_texture_filter = filter;
        self
    }

    pub fn with_wrap_mode(mut self, mode: WrapMode) -> Self {
        self.default_wrap_mode = mode;
        self
    }

    pub fn with_debug_output(mut self, enabled: bool) -> Self {
        self.auto_debug_output = enabled;
        self
    }

    pub fn with_primitive(mut self, primitive: PrimitiveType) -> Self {
        self.default_primitive = primitive;
        self
    }
}
