// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Views of pixel memory with an explicit row pitch.
//!
//! [`Pixmap`] and [`PixmapMut`] borrow pixels owned elsewhere; rows may be padded, so the
//! distance between rows (`pitch`) can exceed `width * bytes_per_pixel`.
//!
//! [`PixelBuffer`] owns pixels for transfers that must outlive the caller's borrow, such as
//! an asynchronous upload. Its storage always starts on an 8-byte boundary, so the unpack
//! alignment of a copy only depends on its pitch.

use crate::Error;
use crate::pixel_formats::{PixelFormat, PixmapDesc, Size};

/// Bytes spanned by `height` rows of `row_bytes` each, `pitch` bytes apart.
const fn span_bytes(height: u32, pitch: usize, row_bytes: usize) -> usize {
    if height == 0 {
        0
    } else {
        pitch * (height as usize - 1) + row_bytes
    }
}

/// A borrowed, read-only image.
#[derive(Debug, Clone, Copy)]
pub struct Pixmap<'a> {
    desc: PixmapDesc,
    pitch: usize,
    data: &'a [u8],
}

impl<'a> Pixmap<'a> {
    /// Creates a tightly packed view.
    pub fn new(desc: PixmapDesc, data: &'a [u8]) -> Self {
        Self::with_pitch(desc, data, desc.pitch_bytes())
    }

    /**
    Creates a view whose rows are `pitch` bytes apart.

    # Panics
    If `pitch` is shorter than a row, or `data` is too short for the described image.
    */
    pub fn with_pitch(desc: PixmapDesc, data: &'a [u8], pitch: usize) -> Self {
        assert!(
            pitch >= desc.pitch_bytes(),
            "pitch ({}) shorter than a row ({})",
            pitch,
            desc.pitch_bytes()
        );
        let needed = span_bytes(desc.height(), pitch, desc.pitch_bytes());
        assert!(
            data.len() >= needed,
            "pixmap data ({} bytes) too short for {}x{} with pitch {} ({} bytes)",
            data.len(),
            desc.width(),
            desc.height(),
            pitch,
            needed
        );
        Pixmap { desc, pitch, data }
    }

    pub fn desc(&self) -> PixmapDesc {
        self.desc
    }

    pub fn size(&self) -> Size {
        self.desc.size()
    }

    pub fn format(&self) -> PixelFormat {
        self.desc.format()
    }

    pub fn pitch_bytes(&self) -> usize {
        self.pitch
    }

    pub fn pitch_pixels(&self) -> u32 {
        (self.pitch / self.desc.format().bytes_per_pixel()) as u32
    }

    /// Whether rows carry padding past the last pixel.
    pub fn is_padded(&self) -> bool {
        self.pitch != self.desc.pitch_bytes()
    }

    /// Address of the first pixel.
    pub fn address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Bytes from the first pixel through the last pixel of the last row.
    pub fn span(&self) -> &'a [u8] {
        &self.data[..span_bytes(self.desc.height(), self.pitch, self.desc.pitch_bytes())]
    }

    /// Pixels of row `y`, without padding.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.pitch;
        &self.data[start..start + self.desc.pitch_bytes()]
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + use<'a> {
        let this = *self;
        (0..this.desc.height()).map(move |y| this.row(y))
    }
}

/// A borrowed, writable image.
#[derive(Debug)]
pub struct PixmapMut<'a> {
    desc: PixmapDesc,
    pitch: usize,
    data: &'a mut [u8],
}

impl<'a> PixmapMut<'a> {
    pub fn new(desc: PixmapDesc, data: &'a mut [u8]) -> Self {
        Self::with_pitch(desc, data, desc.pitch_bytes())
    }

    /**
    # Panics
    If `pitch` is shorter than a row, or `data` is too short for the described image.
    */
    pub fn with_pitch(desc: PixmapDesc, data: &'a mut [u8], pitch: usize) -> Self {
        assert!(pitch >= desc.pitch_bytes(), "pitch shorter than a row");
        assert!(
            data.len() >= span_bytes(desc.height(), pitch, desc.pitch_bytes()),
            "pixmap data too short"
        );
        PixmapMut { desc, pitch, data }
    }

    pub fn desc(&self) -> PixmapDesc {
        self.desc
    }

    pub fn size(&self) -> Size {
        self.desc.size()
    }

    pub fn format(&self) -> PixelFormat {
        self.desc.format()
    }

    pub fn pitch_bytes(&self) -> usize {
        self.pitch
    }

    pub fn as_pixmap(&self) -> Pixmap<'_> {
        Pixmap::with_pitch(self.desc, self.data, self.pitch)
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.pitch;
        let row_bytes = self.desc.pitch_bytes();
        &mut self.data[start..start + row_bytes]
    }

    /**
    Copies `src` into the top-left corner of this image, row by row.

    # Panics
    If the formats differ or `src` is larger than this image.
    */
    pub fn write(&mut self, src: Pixmap<'_>) {
        assert_eq!(
            src.format(),
            self.format(),
            "pixmap write between different formats"
        );
        assert!(
            src.size().width <= self.size().width && src.size().height <= self.size().height,
            "source {}x{} larger than destination {}x{}",
            src.size().width,
            src.size().height,
            self.size().width,
            self.size().height
        );
        let row_bytes = src.desc().pitch_bytes();
        for (y, row) in src.rows().enumerate() {
            self.row_mut(y as u32)[..row_bytes].copy_from_slice(row);
        }
    }

    /// Sets every pixel byte to zero.
    pub fn clear(&mut self) {
        for y in 0..self.desc.height() {
            self.row_mut(y).fill(0);
        }
    }
}

/**
Owned pixel storage aligned to 8 bytes.

Backed by `u64` words and viewed as bytes, so the address of the first byte always has
the maximum unpack alignment.
*/
#[derive(Clone)]
pub struct PixelBuffer {
    words: Vec<u64>,
    len: usize,
}

impl PixelBuffer {
    /**
    Allocates `len` zeroed bytes.

    Allocation failure is reported instead of aborting, since pixel buffers can be large.
    */
    pub fn try_zeroed(len: usize) -> Result<Self, Error> {
        let word_count = len.div_ceil(8);
        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|_| Error::Allocation { bytes: len })?;
        words.resize(word_count, 0);
        Ok(PixelBuffer { words, len })
    }

    /// Copies the bytes of `pixmap`, keeping its pitch.
    pub fn try_copy_of(pixmap: &Pixmap<'_>) -> Result<Self, Error> {
        let span = pixmap.span();
        let mut buffer = Self::try_zeroed(span.len())?;
        buffer.as_bytes_mut().copy_from_slice(span);
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("len", &self.len)
            .finish()
    }
}
