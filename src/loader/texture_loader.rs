use crate::context::GraphicsContext;
use crate::loader::{LoadError, TextureKind};
use crate::resource::{PixelFormat, Texture};
use image::DynamicImage;
use std::path::Path;

/// Decodes image files into textures.
#[derive(Copy, Clone, Debug, Default)]
pub struct TextureLoader;

impl TextureLoader {
    pub fn new() -> Self {
        TextureLoader
    }

    /// Decodes and uploads the image at `path`.
    ///
    /// `flip` mirrors the rows so the first row is the bottom of the image, as texture
    /// coordinates expect. Failures are logged and yield an empty texture.
    pub fn load(
        &self,
        ctx: &mut GraphicsContext,
        path: &Path,
        kind: TextureKind,
        flip: bool,
    ) -> Texture {
        let loaded = self.decode(path, flip).and_then(|mut texture| {
            texture.upload(ctx)?;
            Ok(texture)
        });

        match loaded {
            Ok(texture) => {
                log::info!(
                    "Loaded {:?} texture {} ({}x{} {:?}).",
                    kind,
                    path.display(),
                    texture.width,
                    texture.height,
                    texture.format
                );
                texture
            }
            Err(e) => {
                log::error!("Failed to load {:?} texture {}: {}", kind, path.display(), e);
                Texture::default()
            }
        }
    }

    /// Decodes the image at `path` without uploading it.
    pub(crate) fn decode(&self, path: &Path, flip: bool) -> Result<Texture, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let mut image = image::open(path)?;
        if flip {
            image = image.flipv();
        }
        Ok(texture_from_image(image))
    }
}

/// Keeps the channel count of the image, with 8 bits per channel.
fn texture_from_image(image: DynamicImage) -> Texture {
    let (width, height) = (image.width(), image.height());
    let channels = image.color().channel_count();

    let (format, pixels) = match PixelFormat::from_channels(channels) {
        Some(PixelFormat::R) => (PixelFormat::R, image.into_luma8().into_raw()),
        Some(PixelFormat::Rg) => (PixelFormat::Rg, image.into_luma_alpha8().into_raw()),
        Some(PixelFormat::Rgba) => (PixelFormat::Rgba, image.into_rgba8().into_raw()),
        Some(PixelFormat::Rgb) | None => (PixelFormat::Rgb, image.into_rgb8().into_raw()),
    };

    Texture::new(width, height, format, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn temp_file(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("modelview-texture-loader");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn channel_count_selects_the_format() {
        let path = temp_file("gray.png");
        GrayImage::from_pixel(2, 3, Luma([7])).save(&path).unwrap();

        let texture = TextureLoader::new().decode(&path, false).unwrap();
        assert_eq!(texture.format, PixelFormat::R);
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.pixels().len(), 6);
    }

    #[test]
    fn flipping_mirrors_the_rows() {
        let path = temp_file("rows.png");
        let mut image = RgbImage::new(1, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));
        image.save(&path).unwrap();

        let loader = TextureLoader::new();
        let upright = loader.decode(&path, false).unwrap();
        let flipped = loader.decode(&path, true).unwrap();
        assert_eq!(upright.format, PixelFormat::Rgb);
        assert_eq!(&upright.pixels()[..3], &[255, 0, 0]);
        assert_eq!(&flipped.pixels()[..3], &[0, 0, 255]);
    }

    #[test]
    fn loading_uploads_or_falls_back_to_an_empty_texture() {
        let mut ctx = GraphicsContext::headless();
        let path = temp_file("upload.png");
        RgbImage::new(4, 4).save(&path).unwrap();

        let loader = TextureLoader::new();
        let texture = loader.load(&mut ctx, &path, TextureKind::Diffuse, true);
        assert!(texture.is_initialized());

        let missing = loader.load(&mut ctx, &temp_file("missing.png"), TextureKind::Diffuse, true);
        assert!(missing.is_empty());
        assert!(!missing.is_initialized());

        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(device.live_textures(), 1);
    }
}
