//! Buffer format: which attributes a geometry buffer holds, and how many.

use std::fmt;

use bitflags::bitflags;

use super::error::{GeometryError, GeometryResult};
use crate::backend::AttributeKind;

/// Size of one attribute component (32-bit float) and of one index
pub const COMPONENT_SIZE: usize = 4;
pub const INDEX_SIZE: usize = 4;

bitflags! {
    /// Shorthand attribute selection for common formats
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFlags: u32 {
        const VERTEX3 = 1 << 0;
        const VERTEX4 = 1 << 1;
        const COLOR3 = 1 << 2;
        const COLOR4 = 1 << 3;
        const NORMAL = 1 << 4;
        const TEXCOORD2 = 1 << 5;
    }
}

/// Attribute layout and element counts of a geometry buffer.
///
/// A component count of 0 means the attribute is absent. Indices are always
/// 32-bit; an index count of 0 means the buffer is drawn non-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFormat {
    components: [u32; 4],
    pub vertex_count: usize,
    pub index_count: usize,
}

impl BufferFormat {
    /// Format without attributes
    pub fn new(vertex_count: usize, index_count: usize) -> Self {
        Self {
            components: [0; 4],
            vertex_count,
            index_count,
        }
    }

    /// Build from shorthand flags. `VERTEX3` wins over `VERTEX4` and
    /// `COLOR3` over `COLOR4` when both are given.
    pub fn from_flags(flags: FormatFlags, vertex_count: usize, index_count: usize) -> Self {
        let mut format = Self::new(vertex_count, index_count);
        format.components[AttributeKind::Vertex.index()] = if flags.contains(FormatFlags::VERTEX3) {
            3
        } else if flags.contains(FormatFlags::VERTEX4) {
            4
        } else {
            0
        };
        format.components[AttributeKind::Color.index()] = if flags.contains(FormatFlags::COLOR3) {
            3
        } else if flags.contains(FormatFlags::COLOR4) {
            4
        } else {
            0
        };
        if flags.contains(FormatFlags::NORMAL) {
            format.components[AttributeKind::Normal.index()] = 3;
        }
        if flags.contains(FormatFlags::TEXCOORD2) {
            format.components[AttributeKind::TexCoord.index()] = 2;
        }
        format
    }

    pub fn with_attribute(mut self, kind: AttributeKind, components: u32) -> GeometryResult<Self> {
        self.set_components(kind, components)?;
        Ok(self)
    }

    pub fn with_vertices(self, components: u32) -> GeometryResult<Self> {
        self.with_attribute(AttributeKind::Vertex, components)
    }

    pub fn with_colors(self, components: u32) -> GeometryResult<Self> {
        self.with_attribute(AttributeKind::Color, components)
    }

    pub fn with_normals(self) -> GeometryResult<Self> {
        self.with_attribute(AttributeKind::Normal, 3)
    }

    pub fn with_tex_coords(self, components: u32) -> GeometryResult<Self> {
        self.with_attribute(AttributeKind::TexCoord, components)
    }

    pub fn set_components(&mut self, kind: AttributeKind, components: u32) -> GeometryResult<()> {
        if !kind.accepts(components) {
            return Err(GeometryError::InvalidComponentCount { kind, components });
        }
        self.components[kind.index()] = components;
        Ok(())
    }

    pub fn components(&self, kind: AttributeKind) -> u32 {
        self.components[kind.index()]
    }

    pub fn has(&self, kind: AttributeKind) -> bool {
        self.components(kind) > 0
    }

    /// Attributes present in this format, in region order
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeKind, u32)> + '_ {
        AttributeKind::ALL
            .into_iter()
            .map(|kind| (kind, self.components(kind)))
            .filter(|(_, components)| *components > 0)
    }

    /// Check every component count, plus the presence of vertices.
    pub fn validate(&self) -> GeometryResult<()> {
        for kind in AttributeKind::ALL {
            let components = self.components(kind);
            if !kind.accepts(components) {
                return Err(GeometryError::InvalidComponentCount { kind, components });
            }
        }
        if !self.has(AttributeKind::Vertex) {
            return Err(GeometryError::NoVertices);
        }
        Ok(())
    }

    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }

    /// Bytes of attribute data per vertex, summed over all regions
    pub fn vertex_stride(&self) -> usize {
        self.components.iter().map(|c| *c as usize * COMPONENT_SIZE).sum()
    }

    /// Size of the region holding `kind`, saturating at `usize::MAX`
    pub fn attribute_byte_size(&self, kind: AttributeKind) -> usize {
        (self.components(kind) as usize * COMPONENT_SIZE).saturating_mul(self.vertex_count)
    }

    /// Total size of the attribute data, saturating at `usize::MAX`
    pub fn byte_size(&self) -> usize {
        self.checked_byte_size().unwrap_or(usize::MAX)
    }

    /// Index data size, saturating at `usize::MAX`
    pub fn index_byte_size(&self) -> usize {
        self.checked_index_byte_size().unwrap_or(usize::MAX)
    }

    /// Total size of the attribute data, `None` when it does not fit in `usize`
    pub fn checked_byte_size(&self) -> Option<usize> {
        self.vertex_stride().checked_mul(self.vertex_count)
    }

    pub fn checked_index_byte_size(&self) -> Option<usize> {
        INDEX_SIZE.checked_mul(self.index_count)
    }

    /// Equal attribute presence and widths, counts ignored
    pub fn same_layout(&self, other: &BufferFormat) -> bool {
        self.components == other.components
    }
}

impl fmt::Display for BufferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} c{} n{} t{} x{}",
            self.components[0], self.components[1], self.components[2], self.components[3], self.vertex_count
        )?;
        if self.is_indexed() {
            write!(f, " i{}", self.index_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::vertices_only(FormatFlags::VERTEX3, 10, 0, 120)]
    #[case::vertex_color(FormatFlags::VERTEX3 | FormatFlags::COLOR4, 4, 6, 112)]
    #[case::everything(
        FormatFlags::VERTEX4 | FormatFlags::COLOR3 | FormatFlags::NORMAL | FormatFlags::TEXCOORD2,
        3,
        3,
        144
    )]
    #[case::empty(FormatFlags::VERTEX3, 0, 0, 0)]
    fn test_byte_size_law(
        #[case] flags: FormatFlags,
        #[case] vertex_count: usize,
        #[case] index_count: usize,
        #[case] expected: usize,
    ) {
        let format = BufferFormat::from_flags(flags, vertex_count, index_count);
        let per_vertex: usize = format.attributes().map(|(_, c)| c as usize * 4).sum();
        assert_eq!(format.byte_size(), expected);
        assert_eq!(format.byte_size(), vertex_count * per_vertex);
        assert_eq!(format.index_byte_size(), 4 * index_count);
        assert_eq!(format.is_indexed(), index_count > 0);
    }

    #[test]
    fn test_flags_precedence() {
        let format = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::VERTEX4, 1, 0);
        assert_eq!(format.components(AttributeKind::Vertex), 3);
        let format = BufferFormat::from_flags(FormatFlags::COLOR3 | FormatFlags::COLOR4, 1, 0);
        assert_eq!(format.components(AttributeKind::Color), 3);
    }

    #[rstest]
    #[case(AttributeKind::Vertex, 1)]
    #[case(AttributeKind::Vertex, 5)]
    #[case(AttributeKind::Color, 2)]
    #[case(AttributeKind::Normal, 2)]
    #[case(AttributeKind::TexCoord, 5)]
    fn test_rejects_invalid_widths(#[case] kind: AttributeKind, #[case] components: u32) {
        let err = BufferFormat::new(1, 0).with_attribute(kind, components).unwrap_err();
        assert_eq!(err, GeometryError::InvalidComponentCount { kind, components });
    }

    #[test]
    fn test_validate_requires_vertices() {
        let format = BufferFormat::new(3, 0).with_colors(4).unwrap();
        assert_eq!(format.validate(), Err(GeometryError::NoVertices));
        assert!(format.with_vertices(2).unwrap().validate().is_ok());
    }

    #[test]
    fn test_same_layout_ignores_counts() {
        let a = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::COLOR3, 3, 0);
        let b = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::COLOR3, 5, 9);
        let c = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::COLOR4, 3, 0);
        assert!(a.same_layout(&b));
        assert!(!a.same_layout(&c));
        assert_ne!(a, b);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let format = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::NORMAL, usize::MAX / 2, usize::MAX);
        assert_eq!(format.checked_byte_size(), None);
        assert_eq!(format.byte_size(), usize::MAX);
        assert_eq!(format.attribute_byte_size(AttributeKind::Normal), usize::MAX);
        assert_eq!(format.checked_index_byte_size(), None);
        assert_eq!(format.index_byte_size(), usize::MAX);
    }

    #[test]
    fn test_display() {
        let format = BufferFormat::from_flags(FormatFlags::VERTEX3 | FormatFlags::NORMAL, 8, 12);
        assert_eq!(format.to_string(), "v3 c0 n3 t0 x8 i12");
    }
}
