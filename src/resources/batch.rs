//! Batches: logical drawables living in a private or shared geometry buffer

use std::borrow::Cow;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::backend::{AttributeKind, PrimitiveType};
use crate::context::RenderContext;
use crate::geometry::{BufferFormat, GeometryBuffer, GeometryError, GeometryResult};

/// One attribute stream, copied from the caller at set time
#[derive(Debug, Clone, PartialEq)]
struct AttributeData {
    components: u32,
    values: Vec<f32>,
}

/// Geometry buffer referenced by several batches.
///
/// Each batch owns a disjoint sub-range; the storage is freed when the last
/// holder (batch or caller) drops its handle.
#[derive(Clone)]
pub struct SharedBuffer(Rc<RefCell<GeometryBuffer>>);

impl SharedBuffer {
    pub fn new(buffer: GeometryBuffer) -> Self {
        Self(Rc::new(RefCell::new(buffer)))
    }

    /// Panics if the buffer is currently being written by a batch update.
    pub fn borrow(&self) -> Ref<'_, GeometryBuffer> {
        self.0.borrow()
    }

    pub fn try_borrow_mut(&self) -> GeometryResult<RefMut<'_, GeometryBuffer>> {
        self.0.try_borrow_mut().map_err(|_| GeometryError::SharedBufferBusy)
    }

    pub fn format(&self) -> BufferFormat {
        *self.borrow().format()
    }

    /// Bind once before drawing several batches with [`Batch::render_once`]
    pub fn bind(&self) {
        self.borrow().bind();
    }

    pub fn unbind(&self) {
        self.borrow().unbind();
    }

    pub fn ptr_eq(&self, other: &SharedBuffer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles, batches included
    pub fn holders(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(buffer) => f.debug_tuple("SharedBuffer").field(&*buffer).finish(),
            Err(_) => f.write_str("SharedBuffer(<borrowed>)"),
        }
    }
}

#[derive(Debug, Default)]
enum BufferSlot {
    /// Private buffer not created yet
    #[default]
    Unallocated,
    Private(GeometryBuffer),
    Shared {
        buffer: SharedBuffer,
        vertex_offset: usize,
        index_offset: usize,
    },
}

/// Borrowed view of a batch's buffer, whichever slot it lives in
pub enum BufferRef<'a> {
    Private(&'a GeometryBuffer),
    Shared(Ref<'a, GeometryBuffer>),
}

impl Deref for BufferRef<'_> {
    type Target = GeometryBuffer;

    fn deref(&self) -> &GeometryBuffer {
        match self {
            BufferRef::Private(buffer) => *buffer,
            BufferRef::Shared(buffer) => &**buffer,
        }
    }
}

/// A logical drawable: attribute streams, optional indices, a vertex count
/// and a primitive type, uploaded lazily into a geometry buffer.
///
/// Setters copy the given data and mark the batch dirty. The next
/// [`update`](Self::update) (or [`bind`](Self::bind)) uploads it, either
/// into a freshly created private buffer or into this batch's sub-range of a
/// shared buffer. Indices are relative to the batch's own vertices; they are
/// shifted by the vertex offset on upload.
#[derive(Debug)]
pub struct Batch {
    attributes: [Option<AttributeData>; 4],
    indices: Option<Vec<u32>>,
    vertex_count: usize,
    // None follows the buffer, whose default comes from the context config
    primitive: Option<PrimitiveType>,
    dirty: bool,
    slot: BufferSlot,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    pub fn new() -> Self {
        Self {
            attributes: Default::default(),
            indices: None,
            vertex_count: 0,
            primitive: None,
            dirty: true,
            slot: BufferSlot::Unallocated,
        }
    }

    /// Batch placed at a sub-range of `buffer` from the start
    pub fn with_buffer(buffer: SharedBuffer, vertex_offset: usize, index_offset: usize) -> Self {
        let mut batch = Self::new();
        batch.set_buffer(buffer, vertex_offset, index_offset);
        batch
    }

    // === Attribute data ===

    /// Set the stream for `kind`, `components` values per vertex.
    ///
    /// The slice may hold more than `vertex_count` vertices; the extra values
    /// are ignored on upload.
    pub fn set_attribute(&mut self, kind: AttributeKind, data: &[f32], components: u32) -> GeometryResult<()> {
        if components == 0 || !kind.accepts(components) {
            return Err(GeometryError::InvalidComponentCount { kind, components });
        }
        self.attributes[kind.index()] = Some(AttributeData {
            components,
            values: data.to_vec(),
        });
        self.dirty = true;
        Ok(())
    }

    /// Remove the stream for `kind`
    pub fn clear_attribute(&mut self, kind: AttributeKind) {
        self.attributes[kind.index()] = None;
        self.dirty = true;
    }

    pub fn set_vertices(&mut self, data: &[f32], components: u32) -> GeometryResult<()> {
        self.set_attribute(AttributeKind::Vertex, data, components)
    }

    pub fn set_colors(&mut self, data: &[f32], components: u32) -> GeometryResult<()> {
        self.set_attribute(AttributeKind::Color, data, components)
    }

    pub fn set_normals(&mut self, data: &[f32]) -> GeometryResult<()> {
        self.set_attribute(AttributeKind::Normal, data, 3)
    }

    pub fn set_tex_coords(&mut self, data: &[f32], components: u32) -> GeometryResult<()> {
        self.set_attribute(AttributeKind::TexCoord, data, components)
    }

    pub fn has_attribute(&self, kind: AttributeKind) -> bool {
        self.attributes[kind.index()].is_some()
    }

    /// Values of the stream for `kind`, as last set
    pub fn attribute(&self, kind: AttributeKind) -> Option<&[f32]> {
        self.attributes[kind.index()].as_ref().map(|a| a.values.as_slice())
    }

    pub fn set_indices(&mut self, indices: &[u32]) {
        self.indices = Some(indices.to_vec());
        self.dirty = true;
    }

    pub fn clear_indices(&mut self) {
        self.indices = None;
        self.dirty = true;
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map_or(0, Vec::len)
    }

    pub fn set_vertex_count(&mut self, count: usize) {
        self.vertex_count = count;
        self.dirty = true;
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Primitive used when drawing this batch.
    ///
    /// Also becomes the default of a private buffer. A shared buffer keeps
    /// its own default, since each batch passes its primitive explicitly.
    pub fn set_primitive_type(&mut self, primitive: PrimitiveType) {
        self.primitive = Some(primitive);
        if let BufferSlot::Private(buffer) = &mut self.slot {
            buffer.set_primitive_type(primitive);
        }
    }

    /// Primitive this batch draws with: the one set explicitly, else the
    /// buffer's default, else triangles while no buffer exists.
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
            .or_else(|| self.buffer().map(|buffer| buffer.primitive_type()))
            .unwrap_or_default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Format describing exactly the streams currently set
    pub fn best_buffer_format(&self) -> BufferFormat {
        let mut format = BufferFormat::new(self.vertex_count, self.index_count());
        for kind in AttributeKind::ALL {
            if let Some(data) = &self.attributes[kind.index()] {
                // Component counts were validated by the setters.
                if let Err(e) = format.set_components(kind, data.components) {
                    log::error!("Batch::best_buffer_format: {}", e);
                }
            }
        }
        format
    }

    // === Buffer placement ===

    /// Move this batch into `buffer` at the given vertex and index offsets.
    ///
    /// A private buffer is dropped. Data is uploaded on the next update.
    pub fn set_buffer(&mut self, buffer: SharedBuffer, vertex_offset: usize, index_offset: usize) {
        self.slot = BufferSlot::Shared {
            buffer,
            vertex_offset,
            index_offset,
        };
        self.dirty = true;
    }

    /// Go back to a private buffer, created on the next update.
    pub fn clear_buffer(&mut self) {
        self.slot = BufferSlot::Unallocated;
        self.dirty = true;
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.slot, BufferSlot::Shared { .. })
    }

    /// Shared buffer this batch lives in, if any
    pub fn shared_buffer(&self) -> Option<&SharedBuffer> {
        match &self.slot {
            BufferSlot::Shared { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// First vertex of this batch inside its buffer
    pub fn vertex_offset(&self) -> usize {
        match self.slot {
            BufferSlot::Shared { vertex_offset, .. } => vertex_offset,
            _ => 0,
        }
    }

    /// First index of this batch inside its buffer
    pub fn index_offset(&self) -> usize {
        match self.slot {
            BufferSlot::Shared { index_offset, .. } => index_offset,
            _ => 0,
        }
    }

    /// Buffer holding this batch's data, once one exists
    pub fn buffer(&self) -> Option<BufferRef<'_>> {
        match &self.slot {
            BufferSlot::Unallocated => None,
            BufferSlot::Private(buffer) => Some(BufferRef::Private(buffer)),
            BufferSlot::Shared { buffer, .. } => Some(BufferRef::Shared(buffer.borrow())),
        }
    }

    // === Upload and drawing ===

    /// Upload pending changes. Does nothing when the batch is clean.
    ///
    /// In private mode the old buffer is dropped and a new one sized by
    /// [`best_buffer_format`](Self::best_buffer_format) takes its place. In
    /// shared mode only this batch's sub-range is rewritten. The batch stays
    /// dirty when the upload fails.
    pub fn update(&mut self, ctx: &RenderContext) -> GeometryResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let format = self.best_buffer_format();
        self.check_streams()?;

        let streams = Streams {
            attributes: &self.attributes,
            indices: self.indices.as_deref(),
            vertex_count: self.vertex_count,
        };
        if let BufferSlot::Shared {
            buffer,
            vertex_offset,
            index_offset,
        } = &self.slot
        {
            let mut shared = buffer.try_borrow_mut()?;
            if !shared.format().same_layout(&format) {
                return Err(GeometryError::IncompatibleFormats(format!(
                    "batch has {}, shared buffer has {}",
                    format,
                    shared.format()
                )));
            }
            streams.upload(&mut shared, *vertex_offset, *index_offset)?;
        } else {
            self.slot = BufferSlot::Unallocated;
            let mut buffer = GeometryBuffer::create(ctx, format)?;
            if let Some(primitive) = self.primitive {
                buffer.set_primitive_type(primitive);
            }
            streams.upload(&mut buffer, 0, 0)?;
            self.slot = BufferSlot::Private(buffer);
        }
        self.dirty = false;
        Ok(())
    }

    fn check_streams(&self) -> GeometryResult<()> {
        for data in self.attributes.iter().flatten() {
            let needed = self
                .vertex_count
                .checked_mul(data.components as usize)
                .ok_or(GeometryError::SizeOverflow {
                    what: "attribute values",
                    count: self.vertex_count,
                })?;
            if data.values.len() < needed {
                return Err(GeometryError::InsufficientData {
                    what: "attribute values",
                    needed,
                    got: data.values.len(),
                });
            }
        }
        Ok(())
    }

    /// Update if dirty, then bind the buffer.
    pub fn bind(&mut self, ctx: &RenderContext) -> GeometryResult<()> {
        self.update(ctx)?;
        let buffer = self.buffer().ok_or(GeometryError::NotBound)?;
        buffer.bind();
        Ok(())
    }

    pub fn unbind(&self) {
        if let Some(buffer) = self.buffer() {
            buffer.unbind();
        }
    }

    /// Draw this batch's sub-range without binding.
    ///
    /// The buffer must already be bound, typically once for all batches
    /// sharing it. Draws indexed when both the buffer and the batch have
    /// indices.
    pub fn render_once(&self) -> GeometryResult<()> {
        let buffer = self.buffer().ok_or(GeometryError::NotBound)?;
        if !buffer.is_bound() {
            return Err(GeometryError::NotBound);
        }
        let primitive = self.primitive.unwrap_or(buffer.primitive_type());
        if buffer.format().is_indexed() && self.index_count() > 0 {
            buffer.render_indexed_subset_as(primitive, self.index_count(), self.index_offset())
        } else {
            buffer.render_subset_as(primitive, self.vertex_count, self.vertex_offset())
        }
    }

    /// Bind, draw, unbind.
    pub fn render(&mut self, ctx: &RenderContext) -> GeometryResult<()> {
        self.bind(ctx)?;
        let result = self.render_once();
        self.unbind();
        result
    }

    /// Allocate one buffer holding every batch back to back, and move each
    /// batch into its sub-range, in list order.
    ///
    /// All batches must have the same attribute layout; counts may differ.
    pub fn create_shared_buffer(
        ctx: &RenderContext,
        batches: &mut [&mut Batch],
    ) -> GeometryResult<SharedBuffer> {
        let first = batches
            .first()
            .ok_or(GeometryError::EmptyBatchList)?
            .best_buffer_format();
        for (i, batch) in batches.iter().enumerate().skip(1) {
            let format = batch.best_buffer_format();
            if !format.same_layout(&first) {
                return Err(GeometryError::IncompatibleFormats(format!(
                    "batch {} has {}, batch 0 has {}",
                    i, format, first
                )));
            }
        }

        let mut format = first;
        format.vertex_count = checked_total("vertices", batches.iter().map(|b| b.vertex_count()))?;
        format.index_count = checked_total("indices", batches.iter().map(|b| b.index_count()))?;
        let buffer = GeometryBuffer::create(ctx, format)?;
        let shared = SharedBuffer::new(buffer);

        let mut vertex_offset = 0;
        let mut index_offset = 0;
        for batch in batches.iter_mut() {
            batch.set_buffer(shared.clone(), vertex_offset, index_offset);
            vertex_offset += batch.vertex_count();
            index_offset += batch.index_count();
        }
        log::debug!(
            "Created shared buffer {} for {} batches",
            format,
            batches.len()
        );
        Ok(shared)
    }
}

/// Borrowed streams of a batch, split off so the slot can be borrowed mutably
struct Streams<'a> {
    attributes: &'a [Option<AttributeData>; 4],
    indices: Option<&'a [u32]>,
    vertex_count: usize,
}

impl Streams<'_> {
    /// Write every stream, binding around it unless the buffer already is
    fn upload(&self, buffer: &mut GeometryBuffer, vertex_offset: usize, index_offset: usize) -> GeometryResult<()> {
        let was_bound = buffer.is_bound();
        if !was_bound {
            buffer.bind();
        }
        let result = self.write(buffer, vertex_offset, index_offset);
        if !was_bound {
            buffer.unbind();
        }
        result
    }

    fn write(&self, buffer: &mut GeometryBuffer, vertex_offset: usize, index_offset: usize) -> GeometryResult<()> {
        for kind in AttributeKind::ALL {
            if let Some(data) = &self.attributes[kind.index()] {
                buffer.add_attribute(kind, &data.values, self.vertex_count, vertex_offset)?;
            }
        }

        let Some(indices) = self.indices.filter(|i| !i.is_empty()) else {
            return Ok(());
        };
        let adjusted = offset_indices(indices, vertex_offset, buffer.format().vertex_count)?;
        buffer.add_indices(&adjusted, adjusted.len(), index_offset)
    }
}

/// Sum of per-batch counts, failing instead of wrapping
fn checked_total(what: &'static str, counts: impl Iterator<Item = usize>) -> GeometryResult<usize> {
    let mut total: usize = 0;
    for count in counts {
        total = total
            .checked_add(count)
            .ok_or(GeometryError::SizeOverflow { what, count })?;
    }
    Ok(total)
}

/// Shift `indices` by `vertex_offset`, checking each lands inside the buffer
fn offset_indices(indices: &[u32], vertex_offset: usize, vertex_count: usize) -> GeometryResult<Cow<'_, [u32]>> {
    let mut adjusted = Cow::Borrowed(indices);
    if vertex_offset != 0 {
        let shifted = indices
            .iter()
            .map(|&index| u32::try_from(index as usize + vertex_offset).unwrap_or(u32::MAX))
            .collect();
        adjusted = Cow::Owned(shifted);
    }
    for (position, &index) in adjusted.iter().enumerate() {
        if index as usize >= vertex_count {
            return Err(GeometryError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            });
        }
    }
    Ok(adjusted)
}
