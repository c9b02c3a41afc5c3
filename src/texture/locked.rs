// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Staging memory for a region of a texture.

A [`LockedBuffer`] is returned by [`super::Texture::lock`], written by the caller on any thread,
and consumed exactly once by [`super::Texture::unlock`], which uploads it on the GPU task.
*/

use crate::device::{Device, MappedMemory, UploadSource};
use crate::pixel_formats::{PixmapDesc, Rect};
use crate::pixmap::{PixelBuffer, Pixmap, PixmapMut};

/// Where the staged pixels live.
#[derive(Debug)]
pub(crate) enum Storage {
    /// Client memory owned by the buffer.
    Heap(PixelBuffer),
    /// A transfer buffer mapped by the device.
    Mapped(MappedMemory),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Heap(buffer) => buffer.as_bytes(),
            Storage::Mapped(memory) => memory.as_bytes(),
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Storage::Heap(buffer) => buffer.as_bytes_mut(),
            Storage::Mapped(memory) => memory.as_bytes_mut(),
        }
    }
}

/**
A locked region of one texture level.

Rows are tightly packed. Contents are unspecified unless the lock asked for
[`super::BufferFlags::CLEARED`].

Dropping a buffer without unlocking it discards the writes.
*/
#[derive(Debug)]
pub struct LockedBuffer {
    storage: Storage,
    desc: PixmapDesc,
    dest: Rect,
    level: u8,
}

impl LockedBuffer {
    pub(crate) fn new(storage: Storage, desc: PixmapDesc, dest: Rect, level: u8) -> Self {
        debug_assert!(storage.bytes().len() >= desc.bytes());
        LockedBuffer {
            storage,
            desc,
            dest,
            level,
        }
    }

    pub fn desc(&self) -> PixmapDesc {
        self.desc
    }

    pub fn pixmap(&self) -> Pixmap<'_> {
        Pixmap::new(self.desc, self.storage.bytes())
    }

    pub fn pixmap_mut(&mut self) -> PixmapMut<'_> {
        PixmapMut::new(self.desc, self.storage.bytes_mut())
    }

    /// Region of the level this buffer replaces on unlock.
    pub fn dirty_rect(&self) -> Rect {
        self.dest
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Whether the pixels live in a device transfer buffer.
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }

    pub(crate) fn upload_source(&self) -> UploadSource<'_> {
        match &self.storage {
            Storage::Heap(buffer) => UploadSource::Client(buffer.as_bytes()),
            Storage::Mapped(memory) => UploadSource::Transfer {
                buffer: memory.buffer(),
                offset: memory.offset(),
            },
        }
    }

    /// Gives the staging memory back: heap memory is freed, transfer buffers are unbound.
    pub(crate) fn release(self, device: &mut dyn Device) {
        match self.storage {
            Storage::Heap(buffer) => drop(buffer),
            Storage::Mapped(memory) => {
                let buffer = memory.buffer();
                drop(memory);
                device.unbind_transfer_buffer(buffer);
            }
        }
    }
}
