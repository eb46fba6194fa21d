//! Mapping between backend-neutral enums and raw GL constants

use crate::backend::types::*;

// Legacy primitives are absent from the core-profile constant tables.
const GL_QUADS: u32 = 0x0007;
const GL_QUAD_STRIP: u32 = 0x0008;
const GL_POLYGON: u32 = 0x0009;
const GL_STACK_OVERFLOW: u32 = 0x0503;
const GL_STACK_UNDERFLOW: u32 = 0x0504;

pub(super) fn convert_primitive(primitive: PrimitiveType) -> u32 {
    match primitive {
        PrimitiveType::Points => glow::POINTS,
        PrimitiveType::Lines => glow::LINES,
        PrimitiveType::LineLoop => glow::LINE_LOOP,
        PrimitiveType::LineStrip => glow::LINE_STRIP,
        PrimitiveType::Triangles => glow::TRIANGLES,
        PrimitiveType::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveType::TriangleFan => glow::TRIANGLE_FAN,
        PrimitiveType::Quads => GL_QUADS,
        PrimitiveType::QuadStrip => GL_QUAD_STRIP,
        PrimitiveType::Polygon => GL_POLYGON,
    }
}

pub(super) fn convert_buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

pub(super) fn convert_texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::Texture3D => glow::TEXTURE_3D,
    }
}

pub(super) fn convert_filter(filter: TextureFilter) -> i32 {
    let value = match filter {
        TextureFilter::Nearest => glow::NEAREST,
        TextureFilter::Linear => glow::LINEAR,
        TextureFilter::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        TextureFilter::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
        TextureFilter::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        TextureFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    };
    value as i32
}

pub(super) fn convert_wrap_mode(mode: WrapMode) -> i32 {
    let value = match mode {
        WrapMode::Repeat => glow::REPEAT,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        WrapMode::ClampToBorder => glow::CLAMP_TO_BORDER,
        WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
    };
    value as i32
}

pub(super) fn convert_coordinate(coordinate: TextureCoordinate) -> u32 {
    match coordinate {
        TextureCoordinate::S => glow::TEXTURE_WRAP_S,
        TextureCoordinate::T => glow::TEXTURE_WRAP_T,
        TextureCoordinate::R => glow::TEXTURE_WRAP_R,
    }
}

pub(super) fn convert_internal_format(format: InternalFormat) -> i32 {
    let value = match format {
        InternalFormat::R8 => glow::R8,
        InternalFormat::Rg8 => glow::RG8,
        InternalFormat::Rgb8 => glow::RGB8,
        InternalFormat::Rgba8 => glow::RGBA8,
        InternalFormat::Srgb8 => glow::SRGB8,
        InternalFormat::Srgb8Alpha8 => glow::SRGB8_ALPHA8,
        InternalFormat::R16F => glow::R16F,
        InternalFormat::Rgb16F => glow::RGB16F,
        InternalFormat::Rgba16F => glow::RGBA16F,
        InternalFormat::R32F => glow::R32F,
        InternalFormat::Rgb32F => glow::RGB32F,
        InternalFormat::Rgba32F => glow::RGBA32F,
        InternalFormat::Depth16 => glow::DEPTH_COMPONENT16,
        InternalFormat::Depth24 => glow::DEPTH_COMPONENT24,
        InternalFormat::Depth32F => glow::DEPTH_COMPONENT32F,
    };
    value as i32
}

pub(super) fn convert_pixel_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Red => glow::RED,
        PixelFormat::Rg => glow::RG,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Rgba => glow::RGBA,
        PixelFormat::Depth => glow::DEPTH_COMPONENT,
    }
}

pub(super) fn convert_pixel_type(ty: PixelType) -> u32 {
    match ty {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::HalfFloat => glow::HALF_FLOAT,
        PixelType::Float => glow::FLOAT,
    }
}

pub(super) fn convert_shader_stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

/// `None` for `GL_NO_ERROR`
pub(super) fn convert_error(code: u32) -> Option<GlErrorCode> {
    match code {
        glow::NO_ERROR => None,
        glow::INVALID_ENUM => Some(GlErrorCode::InvalidEnum),
        glow::INVALID_VALUE => Some(GlErrorCode::InvalidValue),
        glow::INVALID_OPERATION => Some(GlErrorCode::InvalidOperation),
        GL_STACK_OVERFLOW => Some(GlErrorCode::StackOverflow),
        GL_STACK_UNDERFLOW => Some(GlErrorCode::StackUnderflow),
        glow::OUT_OF_MEMORY => Some(GlErrorCode::OutOfMemory),
        glow::INVALID_FRAMEBUFFER_OPERATION => Some(GlErrorCode::InvalidFramebufferOperation),
        other => Some(GlErrorCode::Unknown(other)),
    }
}
