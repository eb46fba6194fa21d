//! Texture loading and management

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use super::error::{ResourceError, ResourceResult};
use crate::backend::*;
use crate::context::RenderContext;

/// Decoded RGBA8 pixels, bottom row first as GL expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ResourceResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|source| ResourceError::ImageDecode {
            name: name.clone(),
            source,
        })?;
        Ok(Self::from_image(img, &name))
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> ResourceResult<Self> {
        let img = image::load_from_memory(bytes).map_err(|source| ResourceError::ImageDecode {
            name: name.to_string(),
            source,
        })?;
        Ok(Self::from_image(img, name))
    }

    /// Convert a decoded image, flipping it to a bottom-left origin
    pub fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img.flipv().to_rgba8().into_raw();

        Self {
            width,
            height,
            pixels,
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Create a checkerboard texture with 8x8 pixel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                pixels.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
            name: "checkerboard".to_string(),
        }
    }

    fn validate(&self) -> ResourceResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ResourceError::ZeroSizedTexture {
                width: self.width,
                height: self.height,
                depth: 1,
            });
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(ResourceError::TextureSize {
                name: self.name.clone(),
                expected,
                got: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Operations shared by 2D and 3D textures
pub trait TextureBase {
    fn context(&self) -> &RenderContext;

    fn handle(&self) -> TextureHandle;

    fn target(&self) -> TextureTarget;

    fn name(&self) -> &str;

    /// Coordinates a wrap mode applies to
    fn wrap_coordinates(&self) -> &'static [TextureCoordinate];

    fn bind(&self) {
        self.context().api().bind_texture(self.target(), Some(self.handle()));
        self.context().debug_check("TextureBase::bind");
    }

    fn unbind(&self) {
        self.context().api().bind_texture(self.target(), None);
        self.context().debug_check("TextureBase::unbind");
    }

    /// Turn texturing on for the active unit and bind
    fn enable(&self) {
        self.context().api().set_texture_enabled(self.target(), true);
        self.bind();
    }

    /// Turn texturing off for the active unit and unbind
    fn disable(&self) {
        self.context().api().set_texture_enabled(self.target(), false);
        self.unbind();
    }

    /// Bind and set the minification filter; magnification is nearest only
    /// when minification is, linear otherwise.
    fn set_filter(&self, filter: TextureFilter) {
        self.bind();
        self.context()
            .api()
            .set_texture_filter(self.target(), filter, filter.mag_filter());
    }

    /// Bind and apply `mode` on every wrap coordinate
    fn set_wrap_mode(&self, mode: WrapMode) {
        self.bind();
        for coordinate in self.wrap_coordinates() {
            self.context()
                .api()
                .set_texture_wrap(self.target(), *coordinate, mode);
        }
    }

    fn debug_string(&self) -> String {
        if self.name().is_empty() {
            format!("<Texture id {}>", self.handle().0)
        } else {
            format!("<Texture name {}>", self.name())
        }
    }
}

/// Texture object plus what it was created with; deleted on drop
struct TextureObject {
    ctx: RenderContext,
    handle: TextureHandle,
    descriptor: TextureDescriptor,
    name: String,
}

impl TextureObject {
    fn create(ctx: &RenderContext, descriptor: TextureDescriptor, data: Option<&[u8]>) -> ResourceResult<Self> {
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.depth == 0 {
            return Err(ResourceError::ZeroSizedTexture {
                width: descriptor.width,
                height: descriptor.height,
                depth: descriptor.depth,
            });
        }
        let handle = ctx.api().create_texture(&descriptor, data).map_err(|e| {
            log::error!("Failed to create texture {:?}: {}", descriptor.label, e);
            e
        })?;
        ctx.debug_check("TextureObject::create");
        Ok(Self {
            ctx: ctx.clone(),
            handle,
            name: descriptor.label.clone().unwrap_or_default(),
            descriptor,
        })
    }
}

impl Drop for TextureObject {
    fn drop(&mut self) {
        self.ctx.api().delete_texture(self.handle);
    }
}

/// 2D texture
pub struct Texture {
    object: TextureObject,
}

impl Texture {
    /// Upload RGBA8 `data` with `filter`; mipmaps are generated when the
    /// filter samples them.
    pub fn new(ctx: &RenderContext, data: &TextureData, filter: TextureFilter) -> ResourceResult<Self> {
        data.validate()?;
        let descriptor = TextureDescriptor {
            label: Some(data.name.clone()),
            target: TextureTarget::Texture2D,
            width: data.width,
            height: data.height,
            depth: 1,
            format: InternalFormat::Rgba8,
        };
        let texture = Self {
            object: TextureObject::create(ctx, descriptor, Some(&data.pixels))?,
        };
        texture.set_filter(filter);
        texture.set_wrap_mode(ctx.config().default_wrap_mode);
        if filter.uses_mipmaps() {
            ctx.api().generate_mipmaps(TextureTarget::Texture2D);
        }
        texture.unbind();
        log::debug!(
            "Created texture {} ({}x{})",
            texture.debug_string(),
            data.width,
            data.height
        );
        Ok(texture)
    }

    /// [`new`](Self::new) with the context's default filter
    pub fn from_data(ctx: &RenderContext, data: &TextureData) -> ResourceResult<Self> {
        Self::new(ctx, data, ctx.config().default_texture_filter)
    }

    /// Allocate uninitialized storage; the upload layout follows `format`.
    pub fn empty(ctx: &RenderContext, width: u32, height: u32, format: InternalFormat) -> ResourceResult<Self> {
        let descriptor = TextureDescriptor {
            label: None,
            target: TextureTarget::Texture2D,
            width,
            height,
            depth: 1,
            format,
        };
        let texture = Self {
            object: TextureObject::create(ctx, descriptor, None)?,
        };
        texture.set_filter(TextureFilter::Linear);
        texture.set_wrap_mode(ctx.config().default_wrap_mode);
        texture.unbind();
        Ok(texture)
    }

    pub fn width(&self) -> u32 {
        self.object.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.object.descriptor.height
    }

    pub fn format(&self) -> InternalFormat {
        self.object.descriptor.format
    }
}

impl TextureBase for Texture {
    fn context(&self) -> &RenderContext {
        &self.object.ctx
    }

    fn handle(&self) -> TextureHandle {
        self.object.handle
    }

    fn target(&self) -> TextureTarget {
        TextureTarget::Texture2D
    }

    fn name(&self) -> &str {
        &self.object.name
    }

    fn wrap_coordinates(&self) -> &'static [TextureCoordinate] {
        &[TextureCoordinate::S, TextureCoordinate::T]
    }
}

/// 3D texture
pub struct Texture3D {
    object: TextureObject,
}

impl Texture3D {
    pub fn new(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        depth: u32,
        format: InternalFormat,
    ) -> ResourceResult<Self> {
        Self::with_data(ctx, width, height, depth, format, None)
    }

    /// Create and fill with `data`, laid out slice by slice
    pub fn with_data(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        depth: u32,
        format: InternalFormat,
        data: Option<&[u8]>,
    ) -> ResourceResult<Self> {
        let descriptor = TextureDescriptor {
            label: None,
            target: TextureTarget::Texture3D,
            width,
            height,
            depth,
            format,
        };
        if let Some(bytes) = data {
            if bytes.len() != descriptor.byte_size() {
                return Err(ResourceError::TextureSize {
                    name: "3d texture".to_string(),
                    expected: descriptor.byte_size(),
                    got: bytes.len(),
                });
            }
        }
        let texture = Self {
            object: TextureObject::create(ctx, descriptor, data)?,
        };
        texture.set_filter(TextureFilter::Linear);
        texture.set_wrap_mode(ctx.config().default_wrap_mode);
        texture.unbind();
        Ok(texture)
    }

    pub fn dimensions(&self) -> (u32, u32, u32) {
        let d = &self.object.descriptor;
        (d.width, d.height, d.depth)
    }

    pub fn format(&self) -> InternalFormat {
        self.object.descriptor.format
    }
}

impl TextureBase for Texture3D {
    fn context(&self) -> &RenderContext {
        &self.object.ctx
    }

    fn handle(&self) -> TextureHandle {
        self.object.handle
    }

    fn target(&self) -> TextureTarget {
        TextureTarget::Texture3D
    }

    fn name(&self) -> &str {
        &self.object.name
    }

    fn wrap_coordinates(&self) -> &'static [TextureCoordinate] {
        &[TextureCoordinate::S, TextureCoordinate::T, TextureCoordinate::R]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderConfig;

    fn context() -> (DummyBackend, RenderContext) {
        let backend = DummyBackend::new();
        (backend.clone(), RenderContext::new(backend, RenderConfig::default()))
    }

    #[test]
    fn test_checkerboard_cells() {
        let data = TextureData::checkerboard(16, [255; 4], [0, 0, 0, 255]);
        assert_eq!(data.pixels.len(), 16 * 16 * 4);
        assert_eq!(&data.pixels[0..4], &[255; 4]);
        // First pixel of the second cell on row 0
        assert_eq!(&data.pixels[8 * 4..8 * 4 + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_from_image_flips_rows() {
        let mut img = image::RgbaImage::new(1, 2);
        img.put_pixel(0, 0, image::Rgba([1, 2, 3, 4]));
        img.put_pixel(0, 1, image::Rgba([5, 6, 7, 8]));
        let data = TextureData::from_image(DynamicImage::ImageRgba8(img), "flip");
        assert_eq!(data.pixels, vec![5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = TextureData::from_bytes(&[1, 2, 3], "junk").unwrap_err();
        assert!(matches!(err, ResourceError::ImageDecode { .. }));
    }

    #[test]
    fn test_texture_creation_sequence() {
        let (backend, ctx) = context();
        let data = TextureData::solid_color([10, 20, 30, 255], "solid");
        let texture = Texture::new(&ctx, &data, TextureFilter::Nearest).unwrap();

        let calls = backend.calls();
        assert!(calls.contains(&RecordedCall::SetTextureFilter {
            target: TextureTarget::Texture2D,
            min: TextureFilter::Nearest,
            mag: TextureFilter::Nearest,
        }));
        assert!(calls.contains(&RecordedCall::SetTextureWrap {
            target: TextureTarget::Texture2D,
            coordinate: TextureCoordinate::T,
            mode: WrapMode::ClampToEdge,
        }));
        assert!(!calls.contains(&RecordedCall::GenerateMipmaps(TextureTarget::Texture2D)));
        assert_eq!(texture.debug_string(), "<Texture name solid>");

        drop(texture);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_mipmap_filter_generates_mipmaps() {
        let (backend, ctx) = context();
        let data = TextureData::checkerboard(8, [255; 4], [0; 4]);
        let _texture = Texture::from_data(&ctx, &data).unwrap();
        assert!(backend
            .calls()
            .contains(&RecordedCall::GenerateMipmaps(TextureTarget::Texture2D)));
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let (_, ctx) = context();
        let mut data = TextureData::solid_color([0; 4], "short");
        data.width = 2;
        assert!(matches!(
            Texture::from_data(&ctx, &data),
            Err(ResourceError::TextureSize { expected: 8, got: 4, .. })
        ));
    }

    #[test]
    fn test_3d_wrap_covers_r() {
        let (backend, ctx) = context();
        let texture = Texture3D::new(&ctx, 4, 4, 4, InternalFormat::R8).unwrap();
        backend.clear_calls();
        texture.set_wrap_mode(WrapMode::Repeat);
        let wraps = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RecordedCall::SetTextureWrap { .. }))
            .count();
        assert_eq!(wraps, 3);
        assert_eq!(texture.debug_string(), format!("<Texture id {}>", texture.handle().0));
    }

    #[test]
    fn test_enable_and_disable() {
        let (backend, ctx) = context();
        let texture = Texture::empty(&ctx, 2, 2, InternalFormat::Rgba16F).unwrap();
        backend.clear_calls();
        texture.enable();
        texture.disable();
        assert_eq!(
            backend.calls(),
            vec![
                RecordedCall::SetTextureEnabled {
                    target: TextureTarget::Texture2D,
                    enabled: true
                },
                RecordedCall::BindTexture {
                    target: TextureTarget::Texture2D,
                    handle: Some(texture.handle())
                },
                RecordedCall::SetTextureEnabled {
                    target: TextureTarget::Texture2D,
                    enabled: false
                },
                RecordedCall::BindTexture {
                    target: TextureTarget::Texture2D,
                    handle: None
                },
            ]
        );
    }
}
