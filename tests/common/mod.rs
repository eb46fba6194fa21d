//! Shared helpers for the integration tests.
//!
//! Every test runs against a recording [`DummyBackend`], once per storage
//! mode, and reads uploaded data back through whichever path that mode has.

#![allow(dead_code)]

use glkit::backend::{DummyBackend, RecordedCall};
use glkit::geometry::GeometryBuffer;
use glkit::{RenderConfig, RenderContext};

/// Where geometry ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Client memory, the context has no buffer objects
    ClientArrays,
    /// Buffer objects
    BufferObjects,
}

/// A context plus a handle on its backend for inspection
pub struct TestContext {
    pub backend: DummyBackend,
    pub ctx: RenderContext,
}

impl TestContext {
    pub fn new(storage: Storage) -> Self {
        Self::with_config(storage, RenderConfig::default())
    }

    pub fn with_config(storage: Storage, config: RenderConfig) -> Self {
        let backend = match storage {
            Storage::ClientArrays => DummyBackend::without_buffer_objects(),
            Storage::BufferObjects => DummyBackend::new(),
        };
        let ctx = RenderContext::new(backend.clone(), config);
        assert_eq!(ctx.use_buffer_objects(), storage == Storage::BufferObjects);
        Self { backend, ctx }
    }

    /// Vertex region bytes of `buffer` as floats
    pub fn vertex_data(&self, buffer: &GeometryBuffer) -> Vec<f32> {
        let bytes = match buffer.read_back() {
            Some(bytes) => bytes.to_vec(),
            None => {
                let (vertices, _) = buffer.buffer_handles().expect("buffer has no storage");
                self.backend
                    .buffer_contents(vertices)
                    .expect("vertex buffer was deleted")
            }
        };
        bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
    }

    /// Index region of `buffer`
    pub fn index_data(&self, buffer: &GeometryBuffer) -> Vec<u32> {
        if let Some(indices) = buffer.read_back_indices() {
            return indices.to_vec();
        }
        let (_, indices) = buffer.buffer_handles().expect("buffer has no storage");
        let Some(indices) = indices else {
            return Vec::new();
        };
        let bytes = self
            .backend
            .buffer_contents(indices)
            .expect("index buffer was deleted");
        bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
    }

    pub fn draw_calls(&self) -> Vec<RecordedCall> {
        self.backend.draw_calls()
    }
}

/// Three vertices of a triangle in the z = 0 plane
pub const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

/// Four vertices of a unit square in the z = 0 plane
pub const QUAD: [f32; 12] = [
    0.0, 0.0, 0.0, //
    1.0, 0.0, 0.0, //
    1.0, 1.0, 0.0, //
    0.0, 1.0, 0.0,
];
