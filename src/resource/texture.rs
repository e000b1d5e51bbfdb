//! Texture descriptors and their GPU storage.

use crate::context::{GraphicsContext, TextureDescriptor, TextureId, TextureUsage};
use crate::error::Result;
use std::rc::Rc;

/// Channel layout of the pixel data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    R,
    Rg,
    Rgb,
    #[default]
    Rgba,
}

impl PixelFormat {
    /// The format matching a channel count, if any.
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::R),
            2 => Some(PixelFormat::Rg),
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            PixelFormat::R => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// Sampling filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TextureFilter {
    /// Whether texels are blended linearly within a level.
    pub fn is_linear(self) -> bool {
        matches!(
            self,
            TextureFilter::Linear
                | TextureFilter::LinearMipmapNearest
                | TextureFilter::LinearMipmapLinear
        )
    }

    /// Whether levels are blended linearly, when mipmaps are sampled at all.
    pub fn is_mipmap_linear(self) -> bool {
        matches!(
            self,
            TextureFilter::NearestMipmapLinear | TextureFilter::LinearMipmapLinear
        )
    }
}

/// Behavior of out-of-range texture coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

/// Kind of texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    #[default]
    Texture2d,
}

/// A 2D texture: a sampling descriptor, its decoded pixels and a shared GPU image.
///
/// Cloning a `Texture` duplicates the descriptor and shares the GPU storage. Two
/// textures are the same image when their [`Texture::id`] match. The GPU image is
/// deleted when the last clone is released with [`Texture::release`].
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub target: TextureTarget,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub border_color: [f32; 4],
    pub mipmap: bool,
    pixels: Rc<Vec<u8>>,
    gpu: Option<Rc<TextureId>>,
}

impl Default for Texture {
    fn default() -> Self {
        Texture {
            width: 0,
            height: 0,
            format: PixelFormat::Rgba,
            target: TextureTarget::Texture2d,
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
            border_color: [0.0; 4],
            mipmap: true,
            pixels: Rc::new(Vec::new()),
            gpu: None,
        }
    }
}

impl Texture {
    /// A texture holding the given pixels, not yet uploaded.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Self {
        Texture {
            width,
            height,
            format,
            pixels: Rc::new(pixels),
            ..Default::default()
        }
    }

    /// An empty RGBA texture meant to be rendered to.
    pub fn render_target(width: u32, height: u32) -> Self {
        Texture {
            width,
            height,
            min_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            mipmap: false,
            ..Default::default()
        }
    }

    /// `true` if this texture has no pixels (e.g. a failed load).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The GPU image, once uploaded.
    pub fn id(&self) -> Option<TextureId> {
        self.gpu.as_deref().copied()
    }

    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            usage: TextureUsage::Sampled,
            width: self.width,
            height: self.height,
            format: self.format,
            min_filter: self.min_filter,
            mag_filter: self.mag_filter,
            wrap_s: self.wrap_s,
            wrap_t: self.wrap_t,
            border_color: self.border_color,
            mipmap: self.mipmap,
        }
    }

    /// Allocates the GPU image with the current sampling parameters and uploads the pixels.
    ///
    /// Does nothing if the texture is already uploaded or empty.
    pub fn upload(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        if self.is_initialized() || self.is_empty() {
            return Ok(());
        }

        let id = ctx.create_texture(&self.descriptor(), &self.pixels)?;
        log::debug!(
            "Uploaded {}x{} {:?} texture as {:?}.",
            self.width,
            self.height,
            self.format,
            id
        );
        self.gpu = Some(Rc::new(id));
        Ok(())
    }

    /// Allocates the GPU image without uploading pixels, for render targets.
    pub fn allocate(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let id = ctx.create_texture(&self.descriptor(), &[])?;
        self.gpu = Some(Rc::new(id));
        Ok(())
    }

    /// Drops this clone's reference to the GPU image, deleting it if no other clone uses it.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        if let Some(gpu) = self.gpu.take() {
            if let Ok(id) = Rc::try_unwrap(gpu) {
                ctx.delete_texture(id);
            }
        }
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => Rc::ptr_eq(&self.pixels, &other.pixels),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;

    fn checker() -> Texture {
        Texture::new(2, 1, PixelFormat::Rgb, vec![255, 0, 0, 0, 255, 0])
    }

    #[test]
    fn defaults() {
        let texture = Texture::default();
        assert!(texture.mipmap);
        assert_eq!(texture.border_color, [0.0; 4]);
        assert_eq!(texture.target, TextureTarget::Texture2d);
        assert!(texture.is_empty());
        assert!(!texture.is_initialized());
    }

    #[test]
    fn clones_share_the_gpu_image() {
        let mut ctx = GraphicsContext::headless();
        let mut texture = checker();
        texture.upload(&mut ctx).unwrap();
        let mut copy = texture.clone();
        assert_eq!(copy.id(), texture.id());
        assert_eq!(copy, texture);

        copy.release(&mut ctx);
        assert_eq!(
            ctx.downcast_device::<HeadlessDevice>()
                .unwrap()
                .live_textures(),
            1
        );

        texture.release(&mut ctx);
        assert_eq!(
            ctx.downcast_device::<HeadlessDevice>()
                .unwrap()
                .live_textures(),
            0
        );
    }

    #[test]
    fn upload_happens_once() {
        let mut ctx = GraphicsContext::headless();
        let mut texture = checker();
        texture.upload(&mut ctx).unwrap();
        let id = texture.id();
        texture.upload(&mut ctx).unwrap();
        assert_eq!(texture.id(), id);
    }

    #[test]
    fn empty_texture_is_never_uploaded() {
        let mut ctx = GraphicsContext::headless();
        let mut texture = Texture::default();
        texture.upload(&mut ctx).unwrap();
        assert!(!texture.is_initialized());
    }

    #[test]
    fn channel_counts_map_to_formats() {
        assert_eq!(PixelFormat::from_channels(1), Some(PixelFormat::R));
        assert_eq!(PixelFormat::from_channels(2), Some(PixelFormat::Rg));
        assert_eq!(PixelFormat::from_channels(3), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::from_channels(4), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::from_channels(5), None);
    }
}
