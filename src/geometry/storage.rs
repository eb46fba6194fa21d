//! Storage backends for geometry buffers.
//!
//! Both backends receive the same [`GeometryLayout`]; they only differ in
//! where the bytes live. Range checks happen in
//! [`GeometryBuffer`](super::GeometryBuffer) before a backend is called.

use super::error::{GeometryError, GeometryResult};
use super::layout::GeometryLayout;
use crate::backend::{
    AttributeSource, BufferHandle, BufferTarget, IndexSource, PrimitiveType,
};
use crate::context::RenderContext;

/// Where geometry bytes live and how they reach a draw call
pub trait GeometryStorage {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Make the storage current and point every attribute of `layout` at it
    fn bind(&self, ctx: &RenderContext, layout: &GeometryLayout);

    fn unbind(&self, ctx: &RenderContext, layout: &GeometryLayout);

    /// Overwrite vertex data starting at `byte_offset`
    fn write(&mut self, ctx: &RenderContext, byte_offset: usize, bytes: &[u8]) -> GeometryResult<()>;

    /// Overwrite indices starting at index `first`
    fn write_indices(&mut self, ctx: &RenderContext, first: usize, indices: &[u32]) -> GeometryResult<()>;

    fn draw_arrays(&self, ctx: &RenderContext, primitive: PrimitiveType, first: usize, count: usize);

    fn draw_elements(&self, ctx: &RenderContext, primitive: PrimitiveType, first: usize, count: usize);

    /// Free any GPU objects. Safe to call more than once.
    fn release(&mut self, ctx: &RenderContext);

    /// Vertex bytes, when they live in process memory
    fn client_vertices(&self) -> Option<&[u8]> {
        None
    }

    /// Indices, when they live in process memory
    fn client_indices(&self) -> Option<&[u32]> {
        None
    }

    /// Vertex and index buffer objects, when the storage uses them
    fn buffer_handles(&self) -> Option<(BufferHandle, Option<BufferHandle>)> {
        None
    }
}

/// Geometry kept in process memory and handed to the API as client sources
#[derive(Debug)]
pub struct ClientArrayStorage {
    vertices: Vec<u8>,
    indices: Vec<u32>,
}

impl ClientArrayStorage {
    pub fn new(layout: &GeometryLayout) -> Self {
        Self {
            vertices: vec![0; layout.vertex_data_size()],
            indices: vec![0; layout.format().index_count],
        }
    }
}

impl GeometryStorage for ClientArrayStorage {
    fn name(&self) -> &'static str {
        "client arrays"
    }

    fn bind(&self, ctx: &RenderContext, layout: &GeometryLayout) {
        for region in layout.regions() {
            let bytes = &self.vertices[region.offset..region.offset + region.size];
            ctx.api()
                .enable_attribute(region.kind, region.components, 0, AttributeSource::Client(bytes));
        }
    }

    fn unbind(&self, ctx: &RenderContext, layout: &GeometryLayout) {
        for region in layout.regions() {
            ctx.api().disable_attribute(region.kind);
        }
    }

    fn write(&mut self, _ctx: &RenderContext, byte_offset: usize, bytes: &[u8]) -> GeometryResult<()> {
        let end = byte_offset + bytes.len();
        let capacity = self.vertices.len();
        let target = self
            .vertices
            .get_mut(byte_offset..end)
            .ok_or(GeometryError::OutOfRange {
                what: "vertex bytes",
                offset: byte_offset,
                count: bytes.len(),
                capacity,
            })?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    fn write_indices(&mut self, _ctx: &RenderContext, first: usize, indices: &[u32]) -> GeometryResult<()> {
        let capacity = self.indices.len();
        let target = self
            .indices
            .get_mut(first..first + indices.len())
            .ok_or(GeometryError::OutOfRange {
                what: "indices",
                offset: first,
                count: indices.len(),
                capacity,
            })?;
        target.copy_from_slice(indices);
        Ok(())
    }

    fn draw_arrays(&self, ctx: &RenderContext, primitive: PrimitiveType, first: usize, count: usize) {
        ctx.api().draw_arrays(primitive, first, count);
    }

    fn draw_elements(&self, ctx: &RenderContext, primitive: PrimitiveType, first: usize, count: usize) {
        ctx.api()
            .draw_elements(primitive, count, IndexSource::Client(&self.indices[first..first + count]));
    }

    fn release(&mut self, _ctx: &RenderContext) {
        self.vertices = Vec::new();
        self.indices = Vec::new();
    }

    fn client_vertices(&self) -> Option<&[u8]> {
        Some(&self.vertices)
    }

    fn client_indices(&self) -> Option<&[u32]> {
        Some(&self.indices)
    }
}

/// Geometry kept in a vertex buffer object plus an optional index buffer object
#[derive(Debug)]
pub struct BufferObjectStorage {
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
}

impl BufferObjectStorage {
    pub fn new(ctx: &RenderContext, layout: &GeometryLayout) -> GeometryResult<Self> {
        let api = ctx.api();
        let vertex_buffer = api.create_buffer(BufferTarget::Array, layout.vertex_data_size())?;
        let index_buffer = if layout.format().is_indexed() {
            match api.create_buffer(BufferTarget::ElementArray, layout.index_data_size()) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    api.delete_buffer(vertex_buffer);
                    return Err(e.into());
                }
            }
        } else {
            None
        };
        // Creation leaves the new buffers bound.
        api.bind_buffer(BufferTarget::Array, None);
        if index_buffer.is_some() {
            api.bind_buffer(BufferTarget::ElementArray, None);
        }
        ctx.debug_check("BufferObjectStorage::new");

        Ok(Self {
            vertex_buffer: Some(vertex_buffer),
            index_buffer,
        })
    }
}

impl GeometryStorage for BufferObjectStorage {
    fn name(&self) -> &'static str {
        "buffer objects"
    }

    fn bind(&self, ctx: &RenderContext, layout: &GeometryLayout) {
        let api = ctx.api();
        api.bind_buffer(BufferTarget::Array, self.vertex_buffer);
        if self.index_buffer.is_some() {
            api.bind_buffer(BufferTarget::ElementArray, self.index_buffer);
        }
        for region in layout.regions() {
            api.enable_attribute(region.kind, region.components, 0, AttributeSource::Offset(region.offset));
        }
    }

    fn unbind(&self, ctx: &RenderContext, layout: &GeometryLayout) {
        let api = ctx.api();
        for region in layout.regions() {
            api.disable_attribute(region.kind);
        }
        api.bind_buffer(BufferTarget::Array, None);
        if self.index_buffer.is_some() {
            api.bind_buffer(BufferTarget::ElementArray, None);
        }
    }

    fn write(&mut self, ctx: &RenderContext, byte_offset: usize, bytes: &[u8]) -> GeometryResult<()> {
        let handle = self.vertex_buffer.ok_or(GeometryError::NotBound)?;
        ctx.api()
            .upload_buffer(handle, BufferTarget::Array, byte_offset, bytes)?;
        Ok(())
    }

    fn write_indices(&mut self, ctx: &RenderContext, first: usize, indices: &[u32]) -> GeometryResult<()> {
        let handle = self.index_buffer.ok_or(GeometryError::NotIndexed)?;
        ctx.api().upload_buffer(
            handle,
            BufferTarget::ElementArray,
            first * std::mem::size_of::<u32>(),
            bytemuck::cast_slice(indices),
        )?;
        Ok(())
    }

    fn draw_arrays(&self, ctx: &RenderContext, primitive: PrimitiveType, first: usize, count: usize) {
        ctx.api().draw_arrays(primitive, first, count);
    }

    fn draw_elements(&self, ctx: &RenderContext, primitive: PrimitiveType, first: usize, count: usize) {
        ctx.api().draw_elements(
            primitive,
            count,
            IndexSource::Offset(first * std::mem::size_of::<u32>()),
        );
    }

    fn release(&mut self, ctx: &RenderContext) {
        if let Some(handle) = self.vertex_buffer.take() {
            ctx.api().delete_buffer(handle);
        }
        if let Some(handle) = self.index_buffer.take() {
            ctx.api().delete_buffer(handle);
        }
    }

    fn buffer_handles(&self) -> Option<(BufferHandle, Option<BufferHandle>)> {
        self.vertex_buffer.map(|vertex| (vertex, self.index_buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCall, RecordedSource};
    use crate::geometry::{BufferFormat, FormatFlags};
    use crate::RenderConfig;

    fn layout() -> GeometryLayout {
        GeometryLayout::new(BufferFormat::from_flags(
            FormatFlags::VERTEX3 | FormatFlags::COLOR3,
            2,
            3,
        ))
    }

    #[test]
    fn test_client_storage_binds_region_slices() {
        let backend = DummyBackend::new();
        let ctx = RenderContext::new(backend.clone(), RenderConfig::default());
        let layout = layout();
        let mut storage = ClientArrayStorage::new(&layout);
        storage.write(&ctx, 24, &[7; 24]).unwrap();
        storage.bind(&ctx, &layout);

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            RecordedCall::EnableAttribute {
                kind: crate::backend::AttributeKind::Color,
                components: 3,
                stride: 0,
                source: RecordedSource::Client(vec![7; 24]),
            }
        );
    }

    #[test]
    fn test_client_storage_rejects_overflow() {
        let ctx = RenderContext::new(DummyBackend::new(), RenderConfig::default());
        let mut storage = ClientArrayStorage::new(&layout());
        assert!(storage.write(&ctx, 40, &[0; 16]).is_err());
        assert!(storage.write_indices(&ctx, 2, &[1, 2]).is_err());
    }

    #[test]
    fn test_buffer_object_storage_lifecycle() {
        let backend = DummyBackend::new();
        let ctx = RenderContext::new(backend.clone(), RenderConfig::default());
        let mut storage = BufferObjectStorage::new(&ctx, &layout()).unwrap();
        assert_eq!(backend.live_buffer_count(), 2);

        storage.write_indices(&ctx, 1, &[5, 6]).unwrap();
        let (_, index_buffer) = storage.buffer_handles().unwrap();
        assert_eq!(
            backend.buffer_contents(index_buffer.unwrap()).unwrap(),
            bytemuck::cast_slice::<u32, u8>(&[0, 5, 6]).to_vec()
        );

        storage.release(&ctx);
        storage.release(&ctx);
        assert_eq!(backend.live_buffer_count(), 0);
        assert!(storage.buffer_handles().is_none());
    }

    #[test]
    fn test_index_buffer_failure_frees_vertex_buffer() {
        let backend = DummyBackend::new();
        let ctx = RenderContext::new(backend.clone(), RenderConfig::default());
        backend.fail_buffer_creation_after(1);
        assert!(BufferObjectStorage::new(&ctx, &layout()).is_err());
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
