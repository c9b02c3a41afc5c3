// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Textures for images of arbitrary size.

Devices with size restrictions (power-of-two or square textures) get a backing texture rounded up
to a supported size. [`PixmapTexture`] keeps track of the region actually holding the image and
the texture coordinates that address it.
*/

use crate::Error;
use crate::device::ExternalImage;
use crate::image_source::ImageSource;
use crate::pixel_formats::{PixelFormat, PixmapDesc, Point, Rect, Size};
use crate::pixmap::Pixmap;
use crate::task::GpuTask;
use crate::texture::{BufferFlags, LockedBuffer, Texture, TextureConfig, WriteFlags};
use std::ops::Deref;

/**
A [`Texture`] whose backing store may be larger than the image in it.

The image occupies the top-left [`PixmapTexture::used_size`] pixels. Dereferences to the backing
texture for reads and binding. Changes to the backing store go through this type, so the used
size and texture coordinates follow them.
*/
#[derive(Debug)]
pub struct PixmapTexture {
    texture: Texture,
    used_size: Size,
    uv_bounds: (f32, f32),
}

impl PixmapTexture {
    pub fn uninitialized(task: &GpuTask) -> Self {
        PixmapTexture {
            texture: Texture::uninitialized(task),
            used_size: Size::default(),
            uv_bounds: (0.0, 0.0),
        }
    }

    pub fn new(task: &GpuTask, config: TextureConfig) -> Result<Self, Error> {
        let mut texture = Self::uninitialized(task);
        let config = config.for_device(texture.texture.capabilities());
        texture.texture.set_debug_name(config.debug_name);
        texture.set_format(config.desc, config.levels)?;
        Ok(texture)
    }

    /**
    Creates a texture holding `image`.

    An image without pixels gets a 1x1 alpha placeholder, so the result can always be bound.
    */
    pub fn from_image_source(
        task: &GpuTask,
        image: &mut dyn ImageSource,
        make_mipmaps: bool,
    ) -> Result<Self, Error> {
        let Some(desc) = image.desc() else {
            logwise::warn_sync!("image has no pixels; using a placeholder texture");
            let placeholder = PixmapDesc::new(Size::new(1, 1), PixelFormat::A8);
            let mut texture = Self::new(task, TextureConfig::new(placeholder).with_levels(1))?;
            texture.clear(0)?;
            return Ok(texture);
        };
        let config = TextureConfig::new(desc).with_mipmaps(make_mipmaps);
        let mut texture = Self::new(task, config)?;
        texture.texture.load_image_source(image, make_mipmaps)?;
        Ok(texture)
    }

    /**
    Defines storage for an image described by `desc`.

    The backing store gets the nearest size the device supports. Any padding outside the image is
    cleared so it samples as transparent black.
    */
    pub fn set_format(&mut self, desc: PixmapDesc, levels: u8) -> Result<(), Error> {
        let full = self
            .texture
            .capabilities()
            .size_support
            .pixmap_desc_with_supported_size(desc);
        self.texture.set_format(full, levels)?;
        if desc != full {
            logwise::debuginternal_sync!(
                "padding {w}x{h} image to {fw}x{fh}",
                w = desc.width(),
                h = desc.height(),
                fw = full.width(),
                fh = full.height()
            );
            self.texture.clear(0)?;
        }
        self.update_used_size(desc.size(), full.size());
        Ok(())
    }

    /**
    Backs the texture with an external image of `desc`, whose top-left `used_size` pixels hold
    the image.

    # Panics
    If `used_size` is larger than `desc` on either axis.
    */
    pub fn set_from_external(
        &mut self,
        used_size: Size,
        image: ExternalImage,
        desc: PixmapDesc,
    ) -> Result<(), Error> {
        assert!(
            used_size.width <= desc.width() && used_size.height <= desc.height(),
            "used size {}x{} exceeds external image {}x{}",
            used_size.width,
            used_size.height,
            desc.width(),
            desc.height()
        );
        self.texture.set_from_external(image, desc)?;
        self.update_used_size(used_size, desc.size());
        Ok(())
    }

    fn update_used_size(&mut self, used: Size, full: Size) {
        self.used_size = used;
        self.uv_bounds = if full.width == 0 || full.height == 0 {
            (0.0, 0.0)
        } else {
            (
                used.width as f32 / full.width as f32,
                used.height as f32 / full.height as f32,
            )
        };
    }

    /// See [`Texture::write`].
    pub fn write(
        &mut self,
        level: u8,
        pixmap: Pixmap<'_>,
        dest: Point,
        flags: WriteFlags,
    ) -> Result<(), Error> {
        self.texture.write(level, pixmap, dest, flags)
    }

    /// See [`Texture::write_aligned`].
    pub fn write_aligned(
        &mut self,
        level: u8,
        pixmap: Pixmap<'_>,
        dest: Point,
        assume_align: u8,
        flags: WriteFlags,
    ) -> Result<(), Error> {
        self.texture
            .write_aligned(level, pixmap, dest, assume_align, flags)
    }

    pub fn clear(&mut self, level: u8) -> Result<(), Error> {
        self.texture.clear(level)
    }

    pub fn lock(
        &mut self,
        level: u8,
        rect: Rect,
        flags: BufferFlags,
    ) -> Result<LockedBuffer, Error> {
        self.texture.lock(level, rect, flags)
    }

    pub fn lock_level(&mut self, level: u8, flags: BufferFlags) -> Result<LockedBuffer, Error> {
        self.texture.lock_level(level, flags)
    }

    pub fn unlock(&mut self, buffer: LockedBuffer, flags: WriteFlags) -> Result<(), Error> {
        self.texture.unlock(buffer, flags)
    }

    pub fn generate_mipmaps(&mut self) -> bool {
        self.texture.generate_mipmaps()
    }

    /// Texture coordinates of the image's bottom-right corner.
    pub fn uv_bounds(&self) -> (f32, f32) {
        self.uv_bounds
    }

    pub fn used_size(&self) -> Size {
        self.used_size
    }

    /// Description of the image, as opposed to the backing store.
    pub fn used_pixmap_desc(&self) -> Option<PixmapDesc> {
        self.texture
            .pixmap_desc()
            .map(|desc| desc.with_size(self.used_size))
    }

    pub fn into_texture(self) -> Texture {
        self.texture
    }
}

impl Deref for PixmapTexture {
    type Target = Texture;

    fn deref(&self) -> &Texture {
        &self.texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use crate::imp::SoftwareDevice;
    use crate::task::TaskConfig;

    fn task(caps: Capabilities) -> GpuTask {
        GpuTask::new(TaskConfig::default(), move || Ok(SoftwareDevice::new(caps))).unwrap()
    }

    #[test]
    fn unrestricted_device_uses_exact_size() {
        let task = task(Capabilities::full());
        let desc = PixmapDesc::new(Size::new(30, 10), PixelFormat::RGBA8888);
        let texture = PixmapTexture::new(&task, TextureConfig::new(desc)).unwrap();
        assert_eq!(texture.size(0), Size::new(30, 10));
        assert_eq!(texture.uv_bounds(), (1.0, 1.0));
        assert_eq!(texture.used_pixmap_desc(), Some(desc));
    }

    #[test]
    fn debug_name_reaches_backing_texture() {
        let task = task(Capabilities::full());
        let desc = PixmapDesc::new(Size::new(8, 8), PixelFormat::I8);
        let texture =
            PixmapTexture::new(&task, TextureConfig::new(desc).with_debug_name("font atlas"))
                .unwrap();
        assert_eq!(texture.debug_name(), "font atlas");
    }

    #[test]
    fn uninitialized_has_no_image() {
        let task = task(Capabilities::full());
        let texture = PixmapTexture::uninitialized(&task);
        assert_eq!(texture.used_size(), Size::default());
        assert!(texture.used_pixmap_desc().is_none());
    }
}
