//! Common types shared between backends

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Primitive assembly mode for draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    /// Legacy quads, only valid on compatibility contexts
    Quads,
    QuadStrip,
    Polygon,
}

impl PrimitiveType {
    /// Number of vertices consumed by a single primitive, when fixed
    pub fn vertices_per_primitive(&self) -> Option<usize> {
        match self {
            PrimitiveType::Points => Some(1),
            PrimitiveType::Lines => Some(2),
            PrimitiveType::Triangles => Some(3),
            PrimitiveType::Quads => Some(4),
            _ => None,
        }
    }
}

/// Vertex attribute kinds understood by the geometry layer.
///
/// Each kind has a fixed attribute slot and a fixed shader input name, so
/// programs linked through [`crate::resources::Program`] line up with the
/// pointers set by geometry buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Vertex,
    Color,
    Normal,
    TexCoord,
}

impl AttributeKind {
    /// All kinds, in region order.
    pub const ALL: [AttributeKind; 4] = [
        AttributeKind::Vertex,
        AttributeKind::Color,
        AttributeKind::Normal,
        AttributeKind::TexCoord,
    ];

    pub fn index(&self) -> usize {
        match self {
            AttributeKind::Vertex => 0,
            AttributeKind::Color => 1,
            AttributeKind::Normal => 2,
            AttributeKind::TexCoord => 3,
        }
    }

    /// Attribute slot used when setting attribute pointers
    pub fn slot(&self) -> u32 {
        self.index() as u32
    }

    /// Shader input bound to [`Self::slot`] before a program is linked
    pub fn binding_name(&self) -> &'static str {
        match self {
            AttributeKind::Vertex => "a_position",
            AttributeKind::Color => "a_color",
            AttributeKind::Normal => "a_normal",
            AttributeKind::TexCoord => "a_texcoord",
        }
    }

    /// Component counts accepted for this kind (0, meaning absent, is always accepted)
    pub fn allowed_components(&self) -> &'static [u32] {
        match self {
            AttributeKind::Vertex => &[2, 3, 4],
            AttributeKind::Color => &[3, 4],
            AttributeKind::Normal => &[3],
            AttributeKind::TexCoord => &[1, 2, 3, 4],
        }
    }

    pub fn accepts(&self, components: u32) -> bool {
        components == 0 || self.allowed_components().contains(&components)
    }
}

/// Buffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// 32-bit index data
    ElementArray,
}

/// Where an attribute pointer reads its data from
#[derive(Debug, Clone, Copy)]
pub enum AttributeSource<'a> {
    /// Byte offset into the currently bound array buffer
    Offset(usize),
    /// Bytes living in process memory (client-side arrays)
    Client(&'a [u8]),
}

/// Where an indexed draw reads its indices from
#[derive(Debug, Clone, Copy)]
pub enum IndexSource<'a> {
    /// Byte offset into the currently bound element buffer
    Offset(usize),
    /// Indices living in process memory
    Client(&'a [u32]),
}

/// Texture binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture3D,
}

/// Texture minification / magnification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    #[default]
    LinearMipmapLinear,
}

impl TextureFilter {
    pub fn uses_mipmaps(&self) -> bool {
        !matches!(self, TextureFilter::Nearest | TextureFilter::Linear)
    }

    /// Magnification filter paired with this minification filter
    pub fn mag_filter(&self) -> TextureFilter {
        if *self == TextureFilter::Nearest {
            TextureFilter::Nearest
        } else {
            TextureFilter::Linear
        }
    }
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    Repeat,
    #[default]
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

/// Texture coordinate axis a wrap mode applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureCoordinate {
    S,
    T,
    R,
}

/// Texture storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    #[default]
    Rgba8,
    Srgb8,
    Srgb8Alpha8,
    R16F,
    Rgb16F,
    Rgba16F,
    R32F,
    Rgb32F,
    Rgba32F,
    Depth16,
    Depth24,
    Depth32F,
}

/// Layout of pixel data handed to a texture upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rg,
    Rgb,
    Rgba,
    Depth,
}

/// Component type of pixel data handed to a texture upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte,
    HalfFloat,
    Float,
}

impl InternalFormat {
    /// Pixel layout matching this storage format
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            InternalFormat::R8 | InternalFormat::R16F | InternalFormat::R32F => PixelFormat::Red,
            InternalFormat::Rg8 => PixelFormat::Rg,
            InternalFormat::Rgb8
            | InternalFormat::Srgb8
            | InternalFormat::Rgb16F
            | InternalFormat::Rgb32F => PixelFormat::Rgb,
            InternalFormat::Rgba8
            | InternalFormat::Srgb8Alpha8
            | InternalFormat::Rgba16F
            | InternalFormat::Rgba32F => PixelFormat::Rgba,
            InternalFormat::Depth16 | InternalFormat::Depth24 | InternalFormat::Depth32F => {
                PixelFormat::Depth
            }
        }
    }

    /// Component type matching this storage format
    pub fn pixel_type(&self) -> PixelType {
        match self {
            InternalFormat::R32F
            | InternalFormat::Rgb32F
            | InternalFormat::Rgba32F
            | InternalFormat::Depth32F => PixelType::Float,
            InternalFormat::R16F | InternalFormat::Rgb16F | InternalFormat::Rgba16F => {
                PixelType::HalfFloat
            }
            _ => PixelType::UnsignedByte,
        }
    }

    pub fn is_depth(&self) -> bool {
        self.pixel_format() == PixelFormat::Depth
    }

    pub fn bytes_per_pixel(&self) -> usize {
        let components = match self.pixel_format() {
            PixelFormat::Red | PixelFormat::Depth => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        };
        let component_size = match self.pixel_type() {
            PixelType::UnsignedByte => 1,
            PixelType::HalfFloat => 2,
            PixelType::Float => 4,
        };
        components * component_size
    }
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub target: TextureTarget,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: InternalFormat,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            target: TextureTarget::Texture2D,
            width: 1,
            height: 1,
            depth: 1,
            format: InternalFormat::Rgba8,
        }
    }
}

impl TextureDescriptor {
    /// Size in bytes of a full upload for this descriptor
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize * self.format.bytes_per_pixel()
    }
}

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Value uploaded to a shader uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value)
    }
}

/// Error codes reported by the graphics API error queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlErrorCode {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    StackOverflow,
    StackUnderflow,
    OutOfMemory,
    InvalidFramebufferOperation,
    Unknown(u32),
}

impl GlErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            GlErrorCode::InvalidEnum => "invalid enum",
            GlErrorCode::InvalidValue => "invalid value",
            GlErrorCode::InvalidOperation => "invalid operation",
            GlErrorCode::StackOverflow => "stack overflow",
            GlErrorCode::StackUnderflow => "stack underflow",
            GlErrorCode::OutOfMemory => "out of memory",
            GlErrorCode::InvalidFramebufferOperation => "invalid framebuffer operation",
            GlErrorCode::Unknown(_) => "unknown error",
        }
    }
}

impl std::fmt::Display for GlErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlErrorCode::Unknown(code) => write!(f, "unknown error 0x{code:04x}"),
            other => f.write_str(other.description()),
        }
    }
}

/// What the current context can do, probed once per context
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Server-side buffer objects are available
    pub buffer_objects: bool,
    /// Fixed-function texture enables (`glEnable(GL_TEXTURE_2D)`) are meaningful
    pub texture_enables: bool,
    /// Human readable version / renderer string
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_widths() {
        assert!(AttributeKind::Vertex.accepts(0));
        assert!(AttributeKind::Vertex.accepts(3));
        assert!(!AttributeKind::Vertex.accepts(1));
        assert!(!AttributeKind::Color.accepts(2));
        assert!(AttributeKind::Normal.accepts(3));
        assert!(!AttributeKind::Normal.accepts(4));
        assert!(AttributeKind::TexCoord.accepts(1));
    }

    #[test]
    fn test_filter_pairs() {
        assert_eq!(TextureFilter::Nearest.mag_filter(), TextureFilter::Nearest);
        assert_eq!(TextureFilter::LinearMipmapLinear.mag_filter(), TextureFilter::Linear);
        assert_eq!(TextureFilter::NearestMipmapNearest.mag_filter(), TextureFilter::Linear);
        assert!(TextureFilter::LinearMipmapNearest.uses_mipmaps());
        assert!(!TextureFilter::Linear.uses_mipmaps());
    }

    #[test]
    fn test_internal_format_derivation() {
        assert_eq!(InternalFormat::Srgb8Alpha8.pixel_format(), PixelFormat::Rgba);
        assert_eq!(InternalFormat::Rgba16F.pixel_type(), PixelType::HalfFloat);
        assert_eq!(InternalFormat::Rgb32F.bytes_per_pixel(), 12);
        assert!(InternalFormat::Depth24.is_depth());
    }

    #[test]
    fn test_error_strings() {
        assert_eq!(GlErrorCode::InvalidValue.to_string(), "invalid value");
        assert_eq!(GlErrorCode::Unknown(0x1234).to_string(), "unknown error 0x1234");
    }
}
