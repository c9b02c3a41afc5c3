// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Images that can fill a texture.
//!
//! A source either lends its pixels ([`ImageSource::pixmap_view`]), or writes them into memory
//! provided by the texture ([`ImageSource::write`]) and can then drop any decoded copy
//! ([`ImageSource::free_pixmap`]). Textures use the view when there is one.
//!
//! [`MemoryImage`] lends pixels already in memory. [`PngImage`] decodes on demand.

use crate::Error;
use crate::pixel_formats::{PixelFormat, PixmapDesc, Size};
use crate::pixmap::{Pixmap, PixmapMut};
use std::io::Cursor;

pub trait ImageSource {
    /// Size and format of the image, or `None` if it has no pixels.
    fn desc(&self) -> Option<PixmapDesc>;

    /// The pixels, if the source can lend them.
    fn pixmap_view(&self) -> Option<Pixmap<'_>> {
        None
    }

    /// Writes the image into the top-left corner of `dst`, which has the image's format.
    fn write(&mut self, dst: PixmapMut<'_>);

    /// Releases pixels kept only for [`ImageSource::write`].
    fn free_pixmap(&mut self) {}
}

/// An image already in memory.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    desc: PixmapDesc,
    pitch: usize,
    data: Vec<u8>,
}

impl MemoryImage {
    /// A tightly packed image.
    pub fn new(desc: PixmapDesc, data: Vec<u8>) -> Self {
        Self::with_pitch(desc, data, desc.pitch_bytes())
    }

    /**
    # Panics
    If `data` does not hold the described image with rows `pitch` bytes apart.
    */
    pub fn with_pitch(desc: PixmapDesc, data: Vec<u8>, pitch: usize) -> Self {
        //validates the layout
        Pixmap::with_pitch(desc, &data, pitch);
        MemoryImage { desc, pitch, data }
    }

    pub fn pixmap(&self) -> Pixmap<'_> {
        Pixmap::with_pitch(self.desc, &self.data, self.pitch)
    }
}

impl ImageSource for MemoryImage {
    fn desc(&self) -> Option<PixmapDesc> {
        if self.desc.size().is_empty() {
            None
        } else {
            Some(self.desc)
        }
    }

    fn pixmap_view(&self) -> Option<Pixmap<'_>> {
        Some(self.pixmap())
    }

    fn write(&mut self, mut dst: PixmapMut<'_>) {
        dst.write(self.pixmap());
    }
}

/**
A PNG file, decoded when a texture asks for its pixels.

Palette and 16-bit images are normalized to 8 bits per channel. Grayscale maps to
[`PixelFormat::I8`], grayscale with alpha to [`PixelFormat::IA88`].
*/
#[derive(Debug, Clone)]
pub struct PngImage {
    encoded: Vec<u8>,
    desc: PixmapDesc,
    decoded: Option<Vec<u8>>,
}

impl PngImage {
    /// Reads the header of `encoded`. Pixels are decoded later.
    pub fn new(encoded: Vec<u8>) -> Result<Self, Error> {
        let reader = Self::reader(&encoded)?;
        let info = reader.info();
        let size = Size::new(info.width, info.height);
        let format = match reader.output_color_type().0 {
            png::ColorType::Grayscale => PixelFormat::I8,
            png::ColorType::GrayscaleAlpha => PixelFormat::IA88,
            png::ColorType::Rgb | png::ColorType::Indexed => PixelFormat::RGB888,
            png::ColorType::Rgba => PixelFormat::RGBA8888,
        };
        Ok(PngImage {
            encoded,
            desc: PixmapDesc::new(size, format),
            decoded: None,
        })
    }

    fn reader(encoded: &[u8]) -> Result<png::Reader<Cursor<&[u8]>>, Error> {
        let mut decoder = png::Decoder::new(Cursor::new(encoded));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        Ok(decoder.read_info()?)
    }

    /// Tightly packed pixels, decoding them if needed.
    pub fn decode(&mut self) -> Result<&[u8], Error> {
        let pixels = match self.decoded.take() {
            Some(pixels) => pixels,
            None => {
                let mut reader = Self::reader(&self.encoded)?;
                let mut pixels = vec![0; self.desc.bytes()];
                let info = reader.next_frame(&mut pixels)?;
                //rows come out tightly packed once normalized to 8 bits
                debug_assert_eq!(info.line_size, self.desc.pitch_bytes());
                pixels
            }
        };
        Ok(self.decoded.insert(pixels).as_slice())
    }
}

impl ImageSource for PngImage {
    fn desc(&self) -> Option<PixmapDesc> {
        if self.desc.size().is_empty() {
            None
        } else {
            Some(self.desc)
        }
    }

    fn write(&mut self, mut dst: PixmapMut<'_>) {
        let desc = self.desc;
        match self.decode() {
            Ok(pixels) => dst.write(Pixmap::new(desc, pixels)),
            Err(err) => {
                logwise::error_sync!(
                    "failed decoding PNG: {err}",
                    err = logwise::privacy::LogIt(&err)
                );
            }
        }
    }

    fn free_pixmap(&mut self) {
        self.decoded = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(width: u32, height: u32, color: png::ColorType, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(data).unwrap();
        writer.finish().unwrap();
        out
    }

    #[test]
    fn empty_image_has_no_desc() {
        let image = MemoryImage::new(PixmapDesc::new(Size::new(0, 0), PixelFormat::A8), Vec::new());
        assert!(image.desc().is_none());
    }

    #[test]
    fn writes_into_larger_destination() {
        let desc = PixmapDesc::new(Size::new(1, 2), PixelFormat::A8);
        let mut image = MemoryImage::with_pitch(desc, vec![7, 0, 0, 9], 3);
        let mut out = [0u8; 4];
        image.write(PixmapMut::new(
            PixmapDesc::new(Size::new(2, 2), PixelFormat::A8),
            &mut out,
        ));
        assert_eq!(out, [7, 0, 9, 0]);
    }

    #[test]
    fn png_decodes_into_destination() {
        let mut image = PngImage::new(encode(3, 1, png::ColorType::GrayscaleAlpha, &[
            10, 11, 20, 21, 30, 31,
        ]))
        .unwrap();
        assert_eq!(
            image.desc(),
            Some(PixmapDesc::new(Size::new(3, 1), PixelFormat::IA88))
        );
        assert!(image.pixmap_view().is_none());

        let mut out = [0u8; 8];
        image.write(PixmapMut::new(
            PixmapDesc::new(Size::new(4, 1), PixelFormat::IA88),
            &mut out,
        ));
        assert_eq!(out, [10, 11, 20, 21, 30, 31, 0, 0]);
        image.free_pixmap();
        assert!(image.decoded.is_none());
    }

    #[test]
    fn png_rejects_garbage() {
        assert!(matches!(
            PngImage::new(vec![0, 1, 2, 3]),
            Err(Error::Decode(_))
        ));
    }
}
