//! Geometry buffer: attribute and index storage with a fixed layout

use std::cell::Cell;
use std::fmt;

use super::error::{GeometryError, GeometryResult};
use super::format::{BufferFormat, FormatFlags};
use super::layout::{check_range, GeometryLayout};
use super::storage::{BufferObjectStorage, ClientArrayStorage, GeometryStorage};
use crate::backend::{AttributeKind, BufferHandle, PrimitiveType};
use crate::context::RenderContext;

/// Vertex attribute and index storage laid out by a [`BufferFormat`].
///
/// The layout is fixed at creation; only region contents can be rewritten.
/// Uploads and draws must happen between [`bind`](Self::bind) and
/// [`unbind`](Self::unbind), otherwise they fail with
/// [`GeometryError::NotBound`].
pub struct GeometryBuffer {
    ctx: RenderContext,
    layout: GeometryLayout,
    storage: Box<dyn GeometryStorage>,
    primitive: PrimitiveType,
    bound: Cell<bool>,
}

impl GeometryBuffer {
    /// Allocate a buffer for `format`, in buffer objects when the context
    /// allows it and in client memory otherwise.
    pub fn create(ctx: &RenderContext, format: BufferFormat) -> GeometryResult<Self> {
        for kind in AttributeKind::ALL {
            let components = format.components(kind);
            if !kind.accepts(components) {
                return Err(GeometryError::InvalidComponentCount { kind, components });
            }
        }
        if format.checked_byte_size().is_none() {
            return Err(GeometryError::SizeOverflow {
                what: "vertices",
                count: format.vertex_count,
            });
        }
        if format.checked_index_byte_size().is_none() {
            return Err(GeometryError::SizeOverflow {
                what: "indices",
                count: format.index_count,
            });
        }
        let layout = GeometryLayout::new(format);
        let storage: Box<dyn GeometryStorage> = if ctx.use_buffer_objects() {
            match BufferObjectStorage::new(ctx, &layout) {
                Ok(storage) => Box::new(storage),
                Err(e) => {
                    log::error!("Failed to allocate geometry buffer {}: {}", format, e);
                    return Err(e);
                }
            }
        } else {
            Box::new(ClientArrayStorage::new(&layout))
        };
        log::debug!("Created geometry buffer {} in {}", format, storage.name());

        Ok(Self {
            ctx: ctx.clone(),
            layout,
            storage,
            primitive: ctx.config().default_primitive,
            bound: Cell::new(false),
        })
    }

    /// [`create`](Self::create) with a shorthand format
    pub fn create_with_flags(
        ctx: &RenderContext,
        flags: FormatFlags,
        vertex_count: usize,
        index_count: usize,
    ) -> GeometryResult<Self> {
        Self::create(ctx, BufferFormat::from_flags(flags, vertex_count, index_count))
    }

    pub fn format(&self) -> &BufferFormat {
        self.layout.format()
    }

    pub fn layout(&self) -> &GeometryLayout {
        &self.layout
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Primitive used by the draw calls that do not name one
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn set_primitive_type(&mut self, primitive: PrimitiveType) {
        self.primitive = primitive;
    }

    /// Which storage backend holds the bytes
    pub fn storage_name(&self) -> &'static str {
        self.storage.name()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    pub fn bind(&self) {
        self.storage.bind(&self.ctx, &self.layout);
        self.bound.set(true);
        self.ctx.debug_check("GeometryBuffer::bind");
    }

    pub fn unbind(&self) {
        self.storage.unbind(&self.ctx, &self.layout);
        self.bound.set(false);
        self.ctx.debug_check("GeometryBuffer::unbind");
    }

    /// Copy `count` vertices of `kind` from `data` into the buffer, starting
    /// at vertex `offset` of that attribute's region.
    pub fn add_attribute(
        &mut self,
        kind: AttributeKind,
        data: &[f32],
        count: usize,
        offset: usize,
    ) -> GeometryResult<()> {
        if !self.is_bound() {
            return Err(GeometryError::NotBound);
        }
        let components = self.format().components(kind) as usize;
        if components == 0 {
            return Err(GeometryError::MissingAttribute(kind));
        }
        let needed = count.checked_mul(components).ok_or(GeometryError::SizeOverflow {
            what: "attribute values",
            count,
        })?;
        if data.len() < needed {
            return Err(GeometryError::InsufficientData {
                what: "attribute values",
                needed,
                got: data.len(),
            });
        }
        let range = self.layout.attribute_range(kind, offset, count)?;
        log::trace!(
            "Uploading {} {:?} values ({} bytes) at vertex {}",
            count,
            kind,
            range.len(),
            offset
        );
        self.storage
            .write(&self.ctx, range.start, bytemuck::cast_slice(&data[..needed]))?;
        self.ctx.debug_check("GeometryBuffer::add_attribute");
        Ok(())
    }

    pub fn add_vertices(&mut self, data: &[f32], count: usize, offset: usize) -> GeometryResult<()> {
        self.add_attribute(AttributeKind::Vertex, data, count, offset)
    }

    pub fn add_colors(&mut self, data: &[f32], count: usize, offset: usize) -> GeometryResult<()> {
        self.add_attribute(AttributeKind::Color, data, count, offset)
    }

    pub fn add_normals(&mut self, data: &[f32], count: usize, offset: usize) -> GeometryResult<()> {
        self.add_attribute(AttributeKind::Normal, data, count, offset)
    }

    pub fn add_tex_coords(&mut self, data: &[f32], count: usize, offset: usize) -> GeometryResult<()> {
        self.add_attribute(AttributeKind::TexCoord, data, count, offset)
    }

    /// Copy `count` indices from `data`, starting at index `offset`.
    pub fn add_indices(&mut self, data: &[u32], count: usize, offset: usize) -> GeometryResult<()> {
        if !self.is_bound() {
            return Err(GeometryError::NotBound);
        }
        if data.len() < count {
            return Err(GeometryError::InsufficientData {
                what: "indices",
                needed: count,
                got: data.len(),
            });
        }
        self.layout.index_range(offset, count)?;
        log::trace!("Uploading {} indices at index {}", count, offset);
        self.storage.write_indices(&self.ctx, offset, &data[..count])?;
        self.ctx.debug_check("GeometryBuffer::add_indices");
        Ok(())
    }

    fn check_drawable(&self) -> GeometryResult<()> {
        if !self.is_bound() {
            return Err(GeometryError::NotBound);
        }
        if !self.format().has(AttributeKind::Vertex) {
            return Err(GeometryError::NoVertices);
        }
        Ok(())
    }

    /// Draw `vertex_count` vertices starting at `vertex_offset`.
    pub fn render_subset(&self, vertex_count: usize, vertex_offset: usize) -> GeometryResult<()> {
        self.render_subset_as(self.primitive, vertex_count, vertex_offset)
    }

    pub fn render_subset_as(
        &self,
        primitive: PrimitiveType,
        vertex_count: usize,
        vertex_offset: usize,
    ) -> GeometryResult<()> {
        self.check_drawable()?;
        check_range("vertices", vertex_offset, vertex_count, self.format().vertex_count)?;
        self.storage
            .draw_arrays(&self.ctx, primitive, vertex_offset, vertex_count);
        self.ctx.debug_check("GeometryBuffer::render_subset");
        Ok(())
    }

    /// Draw `index_count` indices starting at `index_offset`.
    pub fn render_indexed_subset(&self, index_count: usize, index_offset: usize) -> GeometryResult<()> {
        self.render_indexed_subset_as(self.primitive, index_count, index_offset)
    }

    pub fn render_indexed_subset_as(
        &self,
        primitive: PrimitiveType,
        index_count: usize,
        index_offset: usize,
    ) -> GeometryResult<()> {
        self.check_drawable()?;
        self.layout.index_range(index_offset, index_count)?;
        self.storage
            .draw_elements(&self.ctx, primitive, index_offset, index_count);
        self.ctx.debug_check("GeometryBuffer::render_indexed_subset");
        Ok(())
    }

    /// Draw the whole buffer, indexed when the format has indices.
    pub fn render(&self) -> GeometryResult<()> {
        let format = *self.format();
        if format.is_indexed() {
            self.render_indexed_subset(format.index_count, 0)
        } else {
            self.render_subset(format.vertex_count, 0)
        }
    }

    /// Raw vertex bytes, available for client-array storage only
    pub fn read_back(&self) -> Option<&[u8]> {
        self.storage.client_vertices()
    }

    /// Indices, available for client-array storage only
    pub fn read_back_indices(&self) -> Option<&[u32]> {
        self.storage.client_indices()
    }

    /// Vertex and index buffer objects, for buffer-object storage only
    pub fn buffer_handles(&self) -> Option<(BufferHandle, Option<BufferHandle>)> {
        self.storage.buffer_handles()
    }
}

impl Drop for GeometryBuffer {
    fn drop(&mut self) {
        if self.is_bound() {
            log::warn!("Geometry buffer {} dropped while bound", self.format());
            self.unbind();
        }
        self.storage.release(&self.ctx);
        log::debug!("Released geometry buffer {}", self.format());
    }
}

impl fmt::Debug for GeometryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryBuffer")
            .field("format", self.format())
            .field("storage", &self.storage.name())
            .field("primitive", &self.primitive)
            .field("bound", &self.is_bound())
            .finish()
    }
}
