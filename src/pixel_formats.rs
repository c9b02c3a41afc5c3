// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Logical pixel formats and image geometry.
//!
//! This module describes pixel data the way application code sees it, independent of any
//! graphics API. Each [`PixelFormat`] encodes:
//!
//! - Number of channels (intensity, intensity+alpha, alpha, RGB, RGBA)
//! - Channel order (RGB vs BGR, alpha first vs alpha last)
//! - Packing (one byte per channel vs. 16-bit packed words)
//!
//! Translating a logical format into whatever a device wants is the job of
//! [`crate::capabilities::Capabilities`], since the answer depends on what the device supports.
//!
//! # Available Formats
//!
//! ## One and two channel
//! - [`PixelFormat::I8`] - 8-bit intensity
//! - [`PixelFormat::IA88`] - 8-bit intensity + 8-bit alpha
//! - [`PixelFormat::A8`] - 8-bit alpha
//!
//! ## Packed 16-bit
//! - [`PixelFormat::RGB565`], [`PixelFormat::RGBA5551`], [`PixelFormat::RGBA4444`]
//! - [`PixelFormat::ABGR4444`], [`PixelFormat::ABGR1555`]
//!
//! ## 8 bits per channel
//! - [`PixelFormat::RGB888`], [`PixelFormat::BGR888`]
//! - [`PixelFormat::RGBA8888`], [`PixelFormat::BGRA8888`], [`PixelFormat::ARGB8888`], [`PixelFormat::ABGR8888`]
//!
//! # Examples
//!
//! ```
//! use imagine_gpu::pixel_formats::{PixelFormat, PixmapDesc, Size};
//!
//! let desc = PixmapDesc::new(Size::new(320, 240), PixelFormat::RGB565);
//! assert_eq!(desc.format().bytes_per_pixel(), 2);
//! assert_eq!(desc.pitch_bytes(), 640);
//! ```

use std::fmt::Debug;

/// A logical pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    I8,
    IA88,
    A8,
    RGB565,
    RGBA5551,
    RGBA4444,
    ABGR4444,
    ABGR1555,
    RGB888,
    BGR888,
    RGBA8888,
    BGRA8888,
    ARGB8888,
    ABGR8888,
}

impl PixelFormat {
    /// Number of bytes a single pixel occupies.
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::I8 | PixelFormat::A8 => 1,
            PixelFormat::IA88
            | PixelFormat::RGB565
            | PixelFormat::RGBA5551
            | PixelFormat::RGBA4444
            | PixelFormat::ABGR4444
            | PixelFormat::ABGR1555 => 2,
            PixelFormat::RGB888 | PixelFormat::BGR888 => 3,
            PixelFormat::RGBA8888
            | PixelFormat::BGRA8888
            | PixelFormat::ARGB8888
            | PixelFormat::ABGR8888 => 4,
        }
    }

    /// Bytes needed for `pixels` pixels of this format.
    pub const fn pixel_bytes(&self, pixels: usize) -> usize {
        pixels * self.bytes_per_pixel()
    }

    /// Whether the channels are stored blue-first.
    pub const fn is_bgr_order(&self) -> bool {
        matches!(
            self,
            PixelFormat::BGR888
                | PixelFormat::BGRA8888
                | PixelFormat::ABGR8888
                | PixelFormat::ABGR4444
                | PixelFormat::ABGR1555
        )
    }

    /// How a texture holding this format is classified.
    pub const fn texture_type(&self) -> TextureType {
        match self {
            PixelFormat::A8 => TextureType::OneChannel,
            PixelFormat::IA88 => TextureType::TwoChannel,
            _ => TextureType::FourChannel,
        }
    }
}

/**
Classification of a texture by how shaders sample it.

Single and dual channel images are usually stored in a four channel layout on the device
and remapped with a swizzle, but drawing code still needs to pick a matching program.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    OneChannel,
    TwoChannel,
    #[default]
    FourChannel,
    /// Contents come from an image produced outside this crate (camera, video decoder, ...).
    External,
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    pub const fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A position in pixels, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: u32, y: u32) -> Self {
        Point { x, y }
    }
}

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Rect { origin, size }
    }

    /// A rectangle at the origin covering `size`.
    pub const fn from_size(size: Size) -> Self {
        Rect {
            origin: Point::ZERO,
            size,
        }
    }

    /// Exclusive right edge.
    pub const fn x2(&self) -> u32 {
        self.origin.x + self.size.width
    }

    /// Exclusive bottom edge.
    pub const fn y2(&self) -> u32 {
        self.origin.y + self.size.height
    }

    /// Whether this rectangle lies entirely within a `bounds`-sized image.
    pub const fn fits_within(&self, bounds: Size) -> bool {
        self.x2() <= bounds.width && self.y2() <= bounds.height
    }
}

/// Size and format of an image, without its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixmapDesc {
    size: Size,
    format: PixelFormat,
}

impl PixmapDesc {
    pub const fn new(size: Size, format: PixelFormat) -> Self {
        PixmapDesc { size, format }
    }

    pub const fn size(&self) -> Size {
        self.size
    }

    pub const fn width(&self) -> u32 {
        self.size.width
    }

    pub const fn height(&self) -> u32 {
        self.size.height
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pitch of a tightly packed row.
    pub const fn pitch_bytes(&self) -> usize {
        self.format.pixel_bytes(self.size.width as usize)
    }

    /// Bytes of a tightly packed image.
    pub const fn bytes(&self) -> usize {
        self.format.pixel_bytes(self.size.pixels())
    }

    pub const fn with_size(&self, size: Size) -> Self {
        PixmapDesc {
            size,
            format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_type_classification() {
        assert_eq!(PixelFormat::A8.texture_type(), TextureType::OneChannel);
        assert_eq!(PixelFormat::IA88.texture_type(), TextureType::TwoChannel);
        assert_eq!(PixelFormat::I8.texture_type(), TextureType::FourChannel);
        assert_eq!(PixelFormat::RGBA8888.texture_type(), TextureType::FourChannel);
    }

    #[test]
    fn rect_bounds() {
        let rect = Rect::new(Point::new(8, 8), Size::new(8, 8));
        assert!(rect.fits_within(Size::new(16, 16)));
        assert!(!rect.fits_within(Size::new(15, 16)));
        assert_eq!(rect.x2(), 16);
    }

    #[test]
    fn desc_bytes() {
        let desc = PixmapDesc::new(Size::new(3, 2), PixelFormat::RGB888);
        assert_eq!(desc.pitch_bytes(), 9);
        assert_eq!(desc.bytes(), 18);
        assert!(PixelFormat::ABGR1555.is_bgr_order());
        assert!(!PixelFormat::ARGB8888.is_bgr_order());
    }
}
