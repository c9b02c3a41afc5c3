// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
What the device can do, and how logical pixel formats map onto it.

A [`Capabilities`] value is queried from the device once, on the GPU task's thread, and then
shared with every producer. All format and storage decisions consult it, rather than
compile-time configuration, so the same build can drive very different devices.
*/

use crate::bittricks::{is_pow2, round_up_pow2};
use crate::pixel_formats::{PixelFormat, PixmapDesc, Size};

/// Which size constraints the device imposes on textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSizeSupport {
    /// Non-power-of-two sizes can be allocated.
    pub non_pow2: bool,
    /// Non-power-of-two sizes can also have mipmaps.
    pub non_pow2_can_mipmap: bool,
    /// Width and height may differ.
    pub non_square: bool,
    /// Treat the device as power-of-two only even if it claims otherwise.
    pub force_pow2: bool,
    /**
    Allocate small power-of-two textures (either side <= 16) as squares.

    Works around a driver bug on one family of legacy PowerVR devices, which corrupts
    small non-square textures.
    */
    pub square_small_pow2: bool,
}

impl TextureSizeSupport {
    pub const fn unrestricted() -> Self {
        TextureSizeSupport {
            non_pow2: true,
            non_pow2_can_mipmap: true,
            non_square: true,
            force_pow2: false,
            square_small_pow2: false,
        }
    }

    /// Square power-of-two textures only.
    pub const fn square_pow2() -> Self {
        TextureSizeSupport {
            non_pow2: false,
            non_pow2_can_mipmap: false,
            non_square: false,
            force_pow2: false,
            square_small_pow2: false,
        }
    }

    /// The smallest size the device can allocate that holds `size`.
    pub fn supported_size(&self, size: Size) -> Size {
        let mut supported = if self.non_pow2 && !self.force_pow2 {
            size
        } else if self.non_square {
            Size::new(round_up_pow2(size.width), round_up_pow2(size.height))
        } else {
            let side = round_up_pow2(size.width.max(size.height));
            Size::new(side, side)
        };
        if self.square_small_pow2 && (supported.width <= 16 || supported.height <= 16) {
            let side = supported.width.max(supported.height);
            supported = Size::new(side, side);
        }
        supported
    }

    pub fn pixmap_desc_with_supported_size(&self, desc: PixmapDesc) -> PixmapDesc {
        desc.with_size(self.supported_size(desc.size()))
    }

    pub fn supports_mipmaps(&self, width: u32, height: u32) -> bool {
        width != 0
            && height != 0
            && (self.non_pow2_can_mipmap || (is_pow2(width) && is_pow2(height)))
    }
}

impl Default for TextureSizeSupport {
    fn default() -> Self {
        Self::unrestricted()
    }
}

/// Channel layout of pixels in a transfer, or of a base internal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Red,
    Rg,
    Rgb,
    Rgba,
    Bgr,
    Bgra,
    Luminance,
    LuminanceAlpha,
    Alpha,
}

/// How channels are packed into memory for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    UnsignedByte,
    UnsignedShort565,
    UnsignedShort5551,
    UnsignedShort4444,
    UnsignedShort4444Rev,
    UnsignedShort1555Rev,
    UnsignedInt8888,
    UnsignedInt8888Rev,
}

/// Layout plus packing: everything needed to interpret client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferFormat {
    pub layout: ChannelLayout,
    pub data_type: DataType,
}

impl TransferFormat {
    /// Bytes per pixel of client data in this format.
    pub const fn bytes_per_pixel(&self) -> usize {
        match self.data_type {
            DataType::UnsignedByte => match self.layout {
                ChannelLayout::Red | ChannelLayout::Luminance | ChannelLayout::Alpha => 1,
                ChannelLayout::Rg | ChannelLayout::LuminanceAlpha => 2,
                ChannelLayout::Rgb | ChannelLayout::Bgr => 3,
                ChannelLayout::Rgba | ChannelLayout::Bgra => 4,
            },
            DataType::UnsignedShort565
            | DataType::UnsignedShort5551
            | DataType::UnsignedShort4444
            | DataType::UnsignedShort4444Rev
            | DataType::UnsignedShort1555Rev => 2,
            DataType::UnsignedInt8888 | DataType::UnsignedInt8888Rev => 4,
        }
    }
}

/// Internal formats with an explicit size per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizedFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Rgb565,
    Rgb5,
    Rgb5A1,
    Rgba4,
    Luminance8,
    Luminance8Alpha8,
    Alpha8,
}

impl SizedFormat {
    pub const fn bytes_per_texel(&self) -> usize {
        match self {
            SizedFormat::R8 | SizedFormat::Luminance8 | SizedFormat::Alpha8 => 1,
            SizedFormat::Rg8
            | SizedFormat::Luminance8Alpha8
            | SizedFormat::Rgb565
            | SizedFormat::Rgb5
            | SizedFormat::Rgb5A1
            | SizedFormat::Rgba4 => 2,
            SizedFormat::Rgb8 => 3,
            SizedFormat::Rgba8 => 4,
        }
    }
}

/// How the device stores a texture's texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    Sized(SizedFormat),
    /// The device picks the precision; the value names only the channels.
    Base(ChannelLayout),
}

/// Where a sampled channel comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwizzleSource {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

/// Per-channel remapping applied when sampling, in r, g, b, a order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [SwizzleSource; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([
        SwizzleSource::Red,
        SwizzleSource::Green,
        SwizzleSource::Blue,
        SwizzleSource::Alpha,
    ]);
    /// Intensity stored in red, replicated to color, opaque.
    pub const INTENSITY: Swizzle = Swizzle([
        SwizzleSource::Red,
        SwizzleSource::Red,
        SwizzleSource::Red,
        SwizzleSource::One,
    ]);
    /// Intensity in red and alpha in green.
    pub const INTENSITY_ALPHA: Swizzle = Swizzle([
        SwizzleSource::Red,
        SwizzleSource::Red,
        SwizzleSource::Red,
        SwizzleSource::Green,
    ]);
    /// Alpha stored in red, white color.
    pub const ALPHA: Swizzle = Swizzle([
        SwizzleSource::One,
        SwizzleSource::One,
        SwizzleSource::One,
        SwizzleSource::Red,
    ]);
}

/**
Capability flags of a device.

# Examples

```
use imagine_gpu::capabilities::Capabilities;
use imagine_gpu::pixel_formats::Size;

let caps = Capabilities::minimal();
assert_eq!(caps.size_support.supported_size(Size::new(100, 60)), Size::new(128, 128));
```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// All mip levels can be declared once, up front, with a fixed count.
    pub immutable_storage: bool,
    /// Transfers can specify a row length different from the upload width.
    pub unpack_row_length: bool,
    /// BGR/BGRA channel orders are accepted.
    pub bgr_pixels: bool,
    /// Pixel transfer buffers can be mapped into client memory.
    pub mapped_buffers: bool,
    /// Sampling can remap channels.
    pub texture_swizzle: bool,
    /// Samplers are standalone objects, so textures need no per-texture sampler state.
    pub sampler_objects: bool,
    /// Mutable storage takes sized internal formats (otherwise internal format equals layout).
    pub sized_internal_formats: bool,
    /// One and two channel formats use the legacy luminance/alpha layouts instead of red/rg + swizzle.
    pub luminance_formats: bool,
    /// Internal format the device wants for BGRA data in mutable storage.
    pub bgra_internal_format: InternalFormat,
    /// External images can back immutable storage.
    pub external_image_storage: bool,
    pub size_support: TextureSizeSupport,
}

impl Capabilities {
    /// A modern device: everything optional is available.
    pub const fn full() -> Self {
        Capabilities {
            immutable_storage: true,
            unpack_row_length: true,
            bgr_pixels: true,
            mapped_buffers: true,
            texture_swizzle: true,
            sampler_objects: true,
            sized_internal_formats: true,
            luminance_formats: false,
            bgra_internal_format: InternalFormat::Sized(SizedFormat::Rgba8),
            external_image_storage: true,
            size_support: TextureSizeSupport::unrestricted(),
        }
    }

    /// A bare-minimum device: square power-of-two textures and nothing optional.
    pub const fn minimal() -> Self {
        Capabilities {
            immutable_storage: false,
            unpack_row_length: false,
            bgr_pixels: false,
            mapped_buffers: false,
            texture_swizzle: false,
            sampler_objects: false,
            sized_internal_formats: false,
            luminance_formats: true,
            bgra_internal_format: InternalFormat::Base(ChannelLayout::Bgra),
            external_image_storage: false,
            size_support: TextureSizeSupport::square_pow2(),
        }
    }

    /// Whether mapped transfer buffers can stage a locked region.
    ///
    /// Uploads from a transfer buffer reset the row length, so both are required.
    pub fn can_map_transfer_buffers(&self) -> bool {
        self.mapped_buffers && self.unpack_row_length
    }

    /**
    How pixels of `format` are described in a transfer.

    # Panics
    For BGR channel orders on a device without [`Capabilities::bgr_pixels`].
    */
    pub fn transfer_format(&self, format: PixelFormat) -> TransferFormat {
        let layout = match format {
            PixelFormat::I8 => {
                if self.luminance_formats {
                    ChannelLayout::Luminance
                } else {
                    ChannelLayout::Red
                }
            }
            PixelFormat::IA88 => {
                if self.luminance_formats {
                    ChannelLayout::LuminanceAlpha
                } else {
                    ChannelLayout::Rg
                }
            }
            PixelFormat::A8 => {
                if self.luminance_formats {
                    ChannelLayout::Alpha
                } else {
                    ChannelLayout::Red
                }
            }
            PixelFormat::RGB888 | PixelFormat::RGB565 => ChannelLayout::Rgb,
            PixelFormat::RGBA8888
            | PixelFormat::ARGB8888
            | PixelFormat::RGBA5551
            | PixelFormat::RGBA4444 => ChannelLayout::Rgba,
            PixelFormat::BGR888 => {
                assert!(self.bgr_pixels, "BGR888 needs a device with BGR support");
                ChannelLayout::Bgr
            }
            PixelFormat::BGRA8888
            | PixelFormat::ABGR8888
            | PixelFormat::ABGR4444
            | PixelFormat::ABGR1555 => {
                assert!(self.bgr_pixels, "{format:?} needs a device with BGR support");
                ChannelLayout::Bgra
            }
        };
        let data_type = match format {
            PixelFormat::RGBA8888 | PixelFormat::BGRA8888 if self.sized_internal_formats => {
                DataType::UnsignedInt8888Rev
            }
            PixelFormat::ARGB8888 | PixelFormat::ABGR8888 if self.sized_internal_formats => {
                DataType::UnsignedInt8888
            }
            PixelFormat::RGBA8888
            | PixelFormat::BGRA8888
            | PixelFormat::ARGB8888
            | PixelFormat::ABGR8888
            | PixelFormat::RGB888
            | PixelFormat::BGR888
            | PixelFormat::I8
            | PixelFormat::IA88
            | PixelFormat::A8 => DataType::UnsignedByte,
            PixelFormat::RGB565 => DataType::UnsignedShort565,
            PixelFormat::RGBA5551 => DataType::UnsignedShort5551,
            PixelFormat::RGBA4444 => DataType::UnsignedShort4444,
            PixelFormat::ABGR4444 => DataType::UnsignedShort4444Rev,
            PixelFormat::ABGR1555 => DataType::UnsignedShort1555Rev,
        };
        TransferFormat { layout, data_type }
    }

    /// Sized internal format for `format`; immutable storage always takes one of these.
    pub fn sized_internal_format(&self, format: PixelFormat) -> SizedFormat {
        match format {
            PixelFormat::RGBA8888
            | PixelFormat::BGRA8888
            | PixelFormat::ARGB8888
            | PixelFormat::ABGR8888 => SizedFormat::Rgba8,
            PixelFormat::RGB888 | PixelFormat::BGR888 => SizedFormat::Rgb8,
            PixelFormat::RGB565 => {
                if self.sized_internal_formats {
                    SizedFormat::Rgb5
                } else {
                    SizedFormat::Rgb565
                }
            }
            PixelFormat::RGBA5551 | PixelFormat::ABGR1555 => SizedFormat::Rgb5A1,
            PixelFormat::RGBA4444 | PixelFormat::ABGR4444 => SizedFormat::Rgba4,
            PixelFormat::I8 => {
                if self.luminance_formats {
                    SizedFormat::Luminance8
                } else {
                    SizedFormat::R8
                }
            }
            PixelFormat::IA88 => {
                if self.luminance_formats {
                    SizedFormat::Luminance8Alpha8
                } else {
                    SizedFormat::Rg8
                }
            }
            PixelFormat::A8 => {
                if self.luminance_formats {
                    SizedFormat::Alpha8
                } else {
                    SizedFormat::R8
                }
            }
        }
    }

    /// Internal format for mutable storage of `format`.
    pub fn internal_format(&self, format: PixelFormat) -> InternalFormat {
        if self.sized_internal_formats {
            InternalFormat::Sized(self.sized_internal_format(format))
        } else if format == PixelFormat::BGRA8888 {
            self.bgra_internal_format
        } else {
            InternalFormat::Base(self.transfer_format(format).layout)
        }
    }

    /**
    Swizzle to apply after (re)defining storage for `format`, if the device swizzles.

    Four channel formats get the identity so a reused texture name doesn't keep a previous
    format's mapping.
    */
    pub fn swizzle_for(&self, format: PixelFormat) -> Option<Swizzle> {
        if !self.texture_swizzle || self.luminance_formats {
            return None;
        }
        Some(match format {
            PixelFormat::I8 => Swizzle::INTENSITY,
            PixelFormat::IA88 => Swizzle::INTENSITY_ALPHA,
            PixelFormat::A8 => Swizzle::ALPHA,
            _ => Swizzle::IDENTITY,
        })
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_size_unrestricted_is_identity() {
        let support = TextureSizeSupport::unrestricted();
        assert_eq!(support.supported_size(Size::new(100, 60)), Size::new(100, 60));
    }

    #[test]
    fn supported_size_forced_pow2_rounds_each_axis() {
        let support = TextureSizeSupport {
            force_pow2: true,
            ..TextureSizeSupport::unrestricted()
        };
        assert_eq!(support.supported_size(Size::new(100, 60)), Size::new(128, 64));
    }

    #[test]
    fn supported_size_square_uses_larger_axis() {
        let support = TextureSizeSupport::square_pow2();
        assert_eq!(support.supported_size(Size::new(100, 60)), Size::new(128, 128));
        assert_eq!(support.supported_size(Size::new(3, 200)), Size::new(256, 256));
    }

    #[test]
    fn small_textures_squared_on_buggy_driver() {
        let support = TextureSizeSupport {
            non_pow2: false,
            non_square: true,
            square_small_pow2: true,
            ..TextureSizeSupport::unrestricted()
        };
        assert_eq!(support.supported_size(Size::new(64, 10)), Size::new(64, 64));
        assert_eq!(support.supported_size(Size::new(64, 20)), Size::new(64, 32));
    }

    #[test]
    fn mipmap_support_depends_on_pow2() {
        let support = TextureSizeSupport::square_pow2();
        assert!(support.supports_mipmaps(64, 64));
        assert!(support.supports_mipmaps(64, 32));
        assert!(!support.supports_mipmaps(100, 64));
        assert!(!support.supports_mipmaps(0, 64));
        assert!(TextureSizeSupport::unrestricted().supports_mipmaps(100, 60));
    }

    #[test]
    fn single_channel_formats_use_red_and_swizzle() {
        let caps = Capabilities::full();
        assert_eq!(caps.transfer_format(PixelFormat::A8).layout, ChannelLayout::Red);
        assert_eq!(caps.swizzle_for(PixelFormat::A8), Some(Swizzle::ALPHA));
        assert_eq!(caps.swizzle_for(PixelFormat::IA88), Some(Swizzle::INTENSITY_ALPHA));
        assert_eq!(caps.swizzle_for(PixelFormat::RGBA8888), Some(Swizzle::IDENTITY));
        assert_eq!(
            caps.internal_format(PixelFormat::IA88),
            InternalFormat::Sized(SizedFormat::Rg8)
        );
    }

    #[test]
    fn legacy_devices_use_luminance_without_swizzle() {
        let caps = Capabilities::minimal();
        assert_eq!(
            caps.transfer_format(PixelFormat::IA88).layout,
            ChannelLayout::LuminanceAlpha
        );
        assert_eq!(caps.swizzle_for(PixelFormat::IA88), None);
        assert_eq!(
            caps.internal_format(PixelFormat::RGB565),
            InternalFormat::Base(ChannelLayout::Rgb)
        );
        assert_eq!(
            caps.transfer_format(PixelFormat::RGBA8888).data_type,
            DataType::UnsignedByte
        );
    }

    #[test]
    #[should_panic]
    fn bgr_without_support_is_a_contract_violation() {
        Capabilities::minimal().transfer_format(PixelFormat::BGRA8888);
    }

    #[test]
    fn bgra_uses_device_internal_format() {
        let caps = Capabilities {
            bgr_pixels: true,
            ..Capabilities::minimal()
        };
        assert_eq!(
            caps.internal_format(PixelFormat::BGRA8888),
            InternalFormat::Base(ChannelLayout::Bgra)
        );
    }
}
