//! Byte layout of a geometry buffer.
//!
//! Attributes are not interleaved. Each present attribute owns one contiguous
//! region of `components * 4 * vertex_count` bytes, and regions follow each
//! other in the order vertices, colors, normals, texture coordinates:
//!
//! ```text
//! | vertices ........ | colors ...... | normals ...... | texcoords .. |
//! 0                   v               v + c            v + c + n
//! ```
//!
//! Indices live in their own buffer (or array) and are laid out as plain
//! 32-bit values.

use std::ops::Range;

use super::error::{GeometryError, GeometryResult};
use super::format::{BufferFormat, COMPONENT_SIZE, INDEX_SIZE};
use crate::backend::AttributeKind;

/// Placement of one attribute inside the vertex data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRegion {
    pub kind: AttributeKind,
    pub components: u32,
    /// Byte offset of the region from the start of the vertex data
    pub offset: usize,
    /// Region size in bytes
    pub size: usize,
}

impl AttributeRegion {
    /// Bytes used by one vertex inside this region
    pub fn element_size(&self) -> usize {
        self.components as usize * COMPONENT_SIZE
    }
}

/// Region offsets computed once from a [`BufferFormat`].
///
/// Shared by both storage backends, which only differ in where the bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryLayout {
    format: BufferFormat,
    regions: [Option<AttributeRegion>; 4],
}

fn region_name(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Vertex => "vertices",
        AttributeKind::Color => "colors",
        AttributeKind::Normal => "normals",
        AttributeKind::TexCoord => "texture coordinates",
    }
}

impl GeometryLayout {
    pub fn new(format: BufferFormat) -> Self {
        let mut regions = [None; 4];
        let mut offset = 0;
        for (kind, components) in format.attributes() {
            let size = format.attribute_byte_size(kind);
            regions[kind.index()] = Some(AttributeRegion {
                kind,
                components,
                offset,
                size,
            });
            offset = offset.saturating_add(size);
        }
        Self { format, regions }
    }

    pub fn format(&self) -> &BufferFormat {
        &self.format
    }

    pub fn region(&self, kind: AttributeKind) -> Option<&AttributeRegion> {
        self.regions[kind.index()].as_ref()
    }

    /// Present regions in layout order
    pub fn regions(&self) -> impl Iterator<Item = &AttributeRegion> {
        self.regions.iter().flatten()
    }

    pub fn vertex_data_size(&self) -> usize {
        self.format.byte_size()
    }

    pub fn index_data_size(&self) -> usize {
        self.format.index_byte_size()
    }

    /// Byte range covering `count` vertices of `kind` starting at vertex `first`
    pub fn attribute_range(
        &self,
        kind: AttributeKind,
        first: usize,
        count: usize,
    ) -> GeometryResult<Range<usize>> {
        let region = self.region(kind).ok_or(GeometryError::MissingAttribute(kind))?;
        check_range(region_name(kind), first, count, self.format.vertex_count)?;
        let start = region.offset + first * region.element_size();
        Ok(start..start + count * region.element_size())
    }

    /// Byte range covering `count` indices starting at index `first`
    pub fn index_range(&self, first: usize, count: usize) -> GeometryResult<Range<usize>> {
        if !self.format.is_indexed() {
            return Err(GeometryError::NotIndexed);
        }
        check_range("indices", first, count, self.format.index_count)?;
        Ok(first * INDEX_SIZE..(first + count) * INDEX_SIZE)
    }
}

/// Check that `first..first + count` fits in `capacity` elements
pub(crate) fn check_range(
    what: &'static str,
    first: usize,
    count: usize,
    capacity: usize,
) -> GeometryResult<()> {
    match first.checked_add(count) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(GeometryError::OutOfRange {
            what,
            offset: first,
            count,
            capacity,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FormatFlags;

    #[test]
    fn test_region_offsets() {
        let format = BufferFormat::from_flags(
            FormatFlags::VERTEX3 | FormatFlags::COLOR4 | FormatFlags::TEXCOORD2,
            10,
            0,
        );
        let layout = GeometryLayout::new(format);

        let vertices = layout.region(AttributeKind::Vertex).unwrap();
        assert_eq!((vertices.offset, vertices.size), (0, 120));
        let colors = layout.region(AttributeKind::Color).unwrap();
        assert_eq!((colors.offset, colors.size), (120, 160));
        assert!(layout.region(AttributeKind::Normal).is_none());
        let tex_coords = layout.region(AttributeKind::TexCoord).unwrap();
        assert_eq!((tex_coords.offset, tex_coords.size), (280, 80));

        assert_eq!(layout.vertex_data_size(), 360);
        assert_eq!(layout.regions().count(), 3);
    }

    #[test]
    fn test_attribute_range() {
        let format = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::COLOR3, 8, 0);
        let layout = GeometryLayout::new(format);
        assert_eq!(layout.attribute_range(AttributeKind::Vertex, 3, 5).unwrap(), 36..96);
        assert_eq!(layout.attribute_range(AttributeKind::Color, 0, 2).unwrap(), 96..120);
        assert_eq!(
            layout.attribute_range(AttributeKind::Normal, 0, 1),
            Err(GeometryError::MissingAttribute(AttributeKind::Normal))
        );
        assert!(matches!(
            layout.attribute_range(AttributeKind::Vertex, 4, 5),
            Err(GeometryError::OutOfRange { capacity: 8, .. })
        ));
    }

    #[test]
    fn test_index_range() {
        let indexed = GeometryLayout::new(BufferFormat::from_flags(FormatFlags::VERTEX3, 4, 6));
        assert_eq!(indexed.index_range(3, 3).unwrap(), 12..24);
        assert!(indexed.index_range(4, 3).is_err());

        let plain = GeometryLayout::new(BufferFormat::from_flags(FormatFlags::VERTEX3, 4, 0));
        assert_eq!(plain.index_range(0, 0), Err(GeometryError::NotIndexed));
    }

    #[test]
    fn test_check_range_overflow() {
        assert!(check_range("x", usize::MAX, 2, 10).is_err());
        assert!(check_range("x", 10, 0, 10).is_ok());
    }
}
