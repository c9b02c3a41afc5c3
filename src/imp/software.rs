// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-memory [`Device`].

[`SoftwareDevice`] keeps every level of every texture as plain bytes. It applies the unpack
rules a GL-style device applies to client rows, and checks that each call arrives on the thread
that made it current. Headless tools and this crate's tests drive textures through it.

Calls can be recorded in a [`Journal`]. A journal is shared with whoever constructed the device,
so the order and thread of device work can be inspected without reaching into the GPU task.
*/

use crate::bittricks::{align_up, full_level_count, level_extent};
use crate::capabilities::{Capabilities, InternalFormat, Swizzle, TransferFormat};
use crate::device::{
    BufferName, Device, DeviceError, ExternalImage, FramebufferName, MappedMemory, SamplerDesc,
    TextureName, Upload, UploadSource,
};
use crate::pixel_formats::{Point, Rect, Size};
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

pub const INVALID_ENUM: u32 = 0x0500;
pub const INVALID_VALUE: u32 = 0x0501;
pub const INVALID_OPERATION: u32 = 0x0502;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    MakeCurrent,
    CreateBuffer(BufferName),
    DeleteBuffer(BufferName),
    CreateTexture(TextureName),
    DeleteTexture(TextureName),
    TextureStorage {
        texture: TextureName,
        levels: u8,
        size: Size,
    },
    TextureImage {
        texture: TextureName,
        level: u8,
        size: Size,
    },
    ExternalImage {
        texture: TextureName,
        image: ExternalImage,
    },
    SetSwizzle {
        texture: TextureName,
        swizzle: Swizzle,
    },
    Upload {
        texture: TextureName,
        level: u8,
        origin: Point,
        size: Size,
        alignment: u8,
        row_length: u32,
        from_transfer: bool,
    },
    GenerateMipmaps(TextureName),
    ApplySampler {
        texture: TextureName,
        sampler: SamplerDesc,
    },
    BindTexture(TextureName),
    MapTransferBuffer {
        buffer: BufferName,
        len: usize,
    },
    UnbindTransferBuffer(BufferName),
    ReadPixels {
        texture: TextureName,
        level: u8,
    },
}

impl DeviceCall {
    /// Name of the call, as used in [`DeviceError::call`].
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCall::MakeCurrent => "make_current",
            DeviceCall::CreateBuffer(_) => "create_buffer",
            DeviceCall::DeleteBuffer(_) => "delete_buffer",
            DeviceCall::CreateTexture(_) => "create_texture",
            DeviceCall::DeleteTexture(_) => "delete_texture",
            DeviceCall::TextureStorage { .. } => "texture_storage",
            DeviceCall::TextureImage { .. } => "texture_image",
            DeviceCall::ExternalImage { .. } => "external_image",
            DeviceCall::SetSwizzle { .. } => "set_swizzle",
            DeviceCall::Upload { .. } => "upload",
            DeviceCall::GenerateMipmaps(_) => "generate_mipmaps",
            DeviceCall::ApplySampler { .. } => "apply_sampler",
            DeviceCall::BindTexture(_) => "bind_texture",
            DeviceCall::MapTransferBuffer { .. } => "map_transfer_buffer",
            DeviceCall::UnbindTransferBuffer(_) => "unbind_transfer_buffer",
            DeviceCall::ReadPixels { .. } => "read_pixels",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub call: DeviceCall,
    pub thread: ThreadId,
}

#[derive(Debug, Default)]
struct JournalState {
    entries: Vec<JournalEntry>,
    injected_failures: Vec<&'static str>,
}

/// A shared record of device calls.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    shared: Arc<Mutex<JournalState>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.shared.lock().unwrap().entries.clone()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.shared
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.call.clone())
            .collect()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.shared
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| predicate(&e.call))
            .count()
    }

    pub fn clear(&self) {
        self.shared.lock().unwrap().entries.clear();
    }

    /// Makes the next call named `call` fail with `INVALID_OPERATION`.
    pub fn fail_next(&self, call: &'static str) {
        self.shared.lock().unwrap().injected_failures.push(call);
    }

    fn record(&self, call: DeviceCall) {
        let thread = std::thread::current().id();
        self.shared
            .lock()
            .unwrap()
            .entries
            .push(JournalEntry { call, thread });
    }

    fn take_failure(&self, call: &'static str) -> bool {
        let mut state = self.shared.lock().unwrap();
        match state.injected_failures.iter().position(|c| *c == call) {
            Some(index) => {
                state.injected_failures.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Memory of a transfer buffer. Client and device never touch it at the same time.
struct TransferStorage {
    bytes: Box<[UnsafeCell<u8>]>,
}

//access is handed back and forth through map/unbind
unsafe impl Sync for TransferStorage {}

impl TransferStorage {
    fn zeroed(len: usize) -> Self {
        TransferStorage {
            bytes: (0..len).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    fn as_ptr(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.bytes.as_ptr())
    }

    /**
    # Safety
    No mapping of this storage may be accessed for the lifetime of the returned slice.
    */
    unsafe fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.bytes.len()) }
    }
}

#[derive(Debug, Clone)]
struct Level {
    size: Size,
    bytes_per_texel: usize,
    bytes: Vec<u8>,
}

impl Level {
    fn new(size: Size, bytes_per_texel: usize) -> Self {
        Level {
            size,
            bytes_per_texel,
            bytes: vec![0; size.pixels() * bytes_per_texel],
        }
    }

    fn pitch(&self) -> usize {
        self.size.width as usize * self.bytes_per_texel
    }

    /// 2x2 box filter, clamped at odd edges.
    fn downsample(&self) -> Level {
        let size = Size::new(
            (self.size.width / 2).max(1),
            (self.size.height / 2).max(1),
        );
        let bpt = self.bytes_per_texel;
        let mut next = Level::new(size, bpt);
        let pitch = self.pitch();
        for y in 0..size.height {
            let y0 = (2 * y).min(self.size.height - 1) as usize;
            let y1 = (2 * y + 1).min(self.size.height - 1) as usize;
            for x in 0..size.width {
                let x0 = (2 * x).min(self.size.width - 1) as usize;
                let x1 = (2 * x + 1).min(self.size.width - 1) as usize;
                for c in 0..bpt {
                    let sum = self.bytes[y0 * pitch + x0 * bpt + c] as u32
                        + self.bytes[y0 * pitch + x1 * bpt + c] as u32
                        + self.bytes[y1 * pitch + x0 * bpt + c] as u32
                        + self.bytes[y1 * pitch + x1 * bpt + c] as u32;
                    next.bytes[(y as usize * size.width as usize + x as usize) * bpt + c] =
                        ((sum + 2) / 4) as u8;
                }
            }
        }
        next
    }
}

#[derive(Debug, Default)]
struct TextureObject {
    levels: Vec<Option<Level>>,
    immutable: bool,
    swizzle: Option<Swizzle>,
    sampler: Option<SamplerDesc>,
}

impl TextureObject {
    fn level(&self, level: u8) -> Option<&Level> {
        self.levels.get(level as usize).and_then(Option::as_ref)
    }
}

/**
A device that keeps textures in memory.

External images must be registered with [`SoftwareDevice::with_external_image`] before the
device is handed to a GPU task.
*/
pub struct SoftwareDevice {
    capabilities: Capabilities,
    journal: Option<Journal>,
    thread: Option<ThreadId>,
    next_name: u32,
    textures: HashMap<TextureName, TextureObject>,
    buffers: HashMap<BufferName, Option<Arc<TransferStorage>>>,
    externals: HashMap<ExternalImage, Level>,
    bound: Option<TextureName>,
}

impl SoftwareDevice {
    pub fn new(capabilities: Capabilities) -> Self {
        SoftwareDevice {
            capabilities,
            journal: None,
            thread: None,
            next_name: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            externals: HashMap::new(),
            bound: None,
        }
    }

    pub fn with_journal(capabilities: Capabilities, journal: Journal) -> Self {
        SoftwareDevice {
            journal: Some(journal),
            ..Self::new(capabilities)
        }
    }

    /// Registers a four-byte-per-pixel external image of `size`, tightly packed.
    pub fn with_external_image(mut self, image: ExternalImage, size: Size, pixels: &[u8]) -> Self {
        let mut level = Level::new(size, 4);
        let n = level.bytes.len().min(pixels.len());
        level.bytes[..n].copy_from_slice(&pixels[..n]);
        self.externals.insert(image, level);
        self
    }

    /// Number of live texture objects.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Texture most recently bound for drawing.
    pub fn bound_texture(&self) -> Option<TextureName> {
        self.bound
    }

    /// Swizzle last applied to `texture`.
    pub fn swizzle(&self, texture: TextureName) -> Option<Swizzle> {
        self.textures.get(&texture).and_then(|t| t.swizzle)
    }

    /// Sampler state last applied to `texture`.
    pub fn sampler(&self, texture: TextureName) -> Option<SamplerDesc> {
        self.textures.get(&texture).and_then(|t| t.sampler)
    }

    /// Number of defined levels of `texture`.
    pub fn level_count(&self, texture: TextureName) -> usize {
        self.textures
            .get(&texture)
            .map(|t| t.levels.iter().filter(|l| l.is_some()).count())
            .unwrap_or(0)
    }

    fn verify_thread(&self) {
        match self.thread {
            Some(thread) => assert_eq!(
                thread,
                std::thread::current().id(),
                "SoftwareDevice used from a thread other than the one that made it current"
            ),
            None => panic!("SoftwareDevice used before make_current"),
        }
    }

    /// Verifies the thread, records `call`, and fails it if a failure was injected.
    fn enter(&self, call: DeviceCall) -> Result<(), DeviceError> {
        self.verify_thread();
        let name = call.name();
        if let Some(journal) = &self.journal {
            journal.record(call);
            if journal.take_failure(name) {
                return Err(DeviceError::new(name, INVALID_OPERATION));
            }
        }
        Ok(())
    }

    fn allocate_name(&mut self) -> u32 {
        let raw = self.next_name;
        self.next_name += 1;
        raw
    }

    fn texture_mut(
        &mut self,
        texture: TextureName,
        call: &'static str,
    ) -> Result<&mut TextureObject, DeviceError> {
        self.textures
            .get_mut(&texture)
            .ok_or(DeviceError::new(call, INVALID_OPERATION))
    }
}

fn internal_bytes_per_texel(format: InternalFormat, transfer: TransferFormat) -> usize {
    match format {
        InternalFormat::Sized(sized) => sized.bytes_per_texel(),
        InternalFormat::Base(_) => transfer.bytes_per_pixel(),
    }
}

impl Device for SoftwareDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn make_current(&mut self) -> Result<(), DeviceError> {
        self.thread = Some(std::thread::current().id());
        self.enter(DeviceCall::MakeCurrent)
    }

    fn default_framebuffer(&mut self) -> FramebufferName {
        self.verify_thread();
        FramebufferName(0)
    }

    fn create_buffer(&mut self) -> Result<BufferName, DeviceError> {
        let raw = self.allocate_name();
        let buffer =
            BufferName::new(raw).ok_or(DeviceError::new("create_buffer", INVALID_VALUE))?;
        self.enter(DeviceCall::CreateBuffer(buffer))?;
        self.buffers.insert(buffer, None);
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferName) {
        //deletion can't fail, so injected failures are ignored
        let _ = self.enter(DeviceCall::DeleteBuffer(buffer));
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self) -> Result<TextureName, DeviceError> {
        let raw = self.allocate_name();
        let texture =
            TextureName::new(raw).ok_or(DeviceError::new("create_texture", INVALID_VALUE))?;
        self.enter(DeviceCall::CreateTexture(texture))?;
        self.textures.insert(texture, TextureObject::default());
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureName) {
        let _ = self.enter(DeviceCall::DeleteTexture(texture));
        self.textures.remove(&texture);
        if self.bound == Some(texture) {
            self.bound = None;
        }
    }

    fn texture_storage(
        &mut self,
        texture: TextureName,
        levels: u8,
        format: InternalFormat,
        size: Size,
    ) -> Result<(), DeviceError> {
        self.enter(DeviceCall::TextureStorage {
            texture,
            levels,
            size,
        })?;
        let InternalFormat::Sized(sized) = format else {
            return Err(DeviceError::new("texture_storage", INVALID_ENUM));
        };
        if levels == 0 || levels > full_level_count(size.width, size.height) || size.is_empty() {
            return Err(DeviceError::new("texture_storage", INVALID_VALUE));
        }
        let object = self.texture_mut(texture, "texture_storage")?;
        if object.immutable {
            return Err(DeviceError::new("texture_storage", INVALID_OPERATION));
        }
        object.immutable = true;
        object.levels = (0..levels)
            .map(|level| {
                Some(Level::new(
                    Size::new(
                        level_extent(size.width, level),
                        level_extent(size.height, level),
                    ),
                    sized.bytes_per_texel(),
                ))
            })
            .collect();
        Ok(())
    }

    fn texture_image(
        &mut self,
        texture: TextureName,
        level: u8,
        format: InternalFormat,
        transfer: TransferFormat,
        size: Size,
    ) -> Result<(), DeviceError> {
        self.enter(DeviceCall::TextureImage {
            texture,
            level,
            size,
        })?;
        let bytes_per_texel = internal_bytes_per_texel(format, transfer);
        let object = self.texture_mut(texture, "texture_image")?;
        if object.immutable {
            return Err(DeviceError::new("texture_image", INVALID_OPERATION));
        }
        let index = level as usize;
        if object.levels.len() <= index {
            object.levels.resize(index + 1, None);
        }
        object.levels[index] = Some(Level::new(size, bytes_per_texel));
        Ok(())
    }

    fn external_image(
        &mut self,
        texture: TextureName,
        image: ExternalImage,
        immutable: bool,
    ) -> Result<(), DeviceError> {
        self.enter(DeviceCall::ExternalImage { texture, image })?;
        if immutable && !self.capabilities.external_image_storage {
            return Err(DeviceError::new("external_image", INVALID_OPERATION));
        }
        let level = self
            .externals
            .get(&image)
            .cloned()
            .ok_or(DeviceError::new("external_image", INVALID_VALUE))?;
        let object = self.texture_mut(texture, "external_image")?;
        if object.immutable {
            return Err(DeviceError::new("external_image", INVALID_OPERATION));
        }
        object.immutable = immutable;
        object.levels = vec![Some(level)];
        Ok(())
    }

    fn set_swizzle(&mut self, texture: TextureName, swizzle: Swizzle) -> Result<(), DeviceError> {
        self.enter(DeviceCall::SetSwizzle { texture, swizzle })?;
        if !self.capabilities.texture_swizzle {
            return Err(DeviceError::new("set_swizzle", INVALID_ENUM));
        }
        self.texture_mut(texture, "set_swizzle")?.swizzle = Some(swizzle);
        Ok(())
    }

    fn upload(&mut self, texture: TextureName, upload: Upload<'_>) -> Result<(), DeviceError> {
        let from_transfer = matches!(upload.source, UploadSource::Transfer { .. });
        self.enter(DeviceCall::Upload {
            texture,
            level: upload.level,
            origin: upload.origin,
            size: upload.size,
            alignment: upload.unpack.alignment,
            row_length: upload.unpack.row_length,
            from_transfer,
        })?;
        if !matches!(upload.unpack.alignment, 1 | 2 | 4 | 8) {
            return Err(DeviceError::new("upload", INVALID_VALUE));
        }
        if upload.unpack.row_length != 0 && !self.capabilities.unpack_row_length {
            return Err(DeviceError::new("upload", INVALID_ENUM));
        }
        //resolve the source first; transfer storage is owned by self.buffers
        let transfer_storage = match upload.source {
            UploadSource::Client(_) => None,
            UploadSource::Transfer { buffer, .. } => Some(
                self.buffers
                    .get(&buffer)
                    .cloned()
                    .flatten()
                    .ok_or(DeviceError::new("upload", INVALID_OPERATION))?,
            ),
        };
        let source: &[u8] = match (&upload.source, &transfer_storage) {
            (UploadSource::Client(bytes), _) => *bytes,
            (UploadSource::Transfer { offset, .. }, Some(storage)) => {
                //the client gave up its mapping when the upload was submitted
                let bytes = unsafe { storage.bytes() };
                bytes
                    .get(*offset..)
                    .ok_or(DeviceError::new("upload", INVALID_VALUE))?
            }
            (UploadSource::Transfer { .. }, None) => {
                return Err(DeviceError::new("upload", INVALID_OPERATION));
            }
        };

        let bytes_per_pixel = upload.format.bytes_per_pixel();
        let object = self
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::new("upload", INVALID_OPERATION))?;
        let level = object
            .levels
            .get_mut(upload.level as usize)
            .and_then(Option::as_mut)
            .ok_or(DeviceError::new("upload", INVALID_OPERATION))?;
        if level.bytes_per_texel != bytes_per_pixel {
            return Err(DeviceError::new("upload", INVALID_OPERATION));
        }
        if !Rect::new(upload.origin, upload.size).fits_within(level.size) {
            return Err(DeviceError::new("upload", INVALID_VALUE));
        }
        if upload.size.is_empty() {
            return Ok(());
        }
        let row_pixels = if upload.unpack.row_length == 0 {
            upload.size.width
        } else {
            upload.unpack.row_length
        };
        let stride = align_up(
            row_pixels as usize * bytes_per_pixel,
            upload.unpack.alignment as usize,
        );
        let row_bytes = upload.size.width as usize * bytes_per_pixel;
        let needed = stride * (upload.size.height as usize - 1) + row_bytes;
        if source.len() < needed {
            return Err(DeviceError::new("upload", INVALID_OPERATION));
        }
        let pitch = level.pitch();
        for y in 0..upload.size.height as usize {
            let dst = (upload.origin.y as usize + y) * pitch
                + upload.origin.x as usize * bytes_per_pixel;
            level.bytes[dst..dst + row_bytes]
                .copy_from_slice(&source[y * stride..y * stride + row_bytes]);
        }
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureName) -> Result<(), DeviceError> {
        self.enter(DeviceCall::GenerateMipmaps(texture))?;
        let object = self.texture_mut(texture, "generate_mipmaps")?;
        let base = object
            .level(0)
            .cloned()
            .ok_or(DeviceError::new("generate_mipmaps", INVALID_OPERATION))?;
        let count = if object.immutable {
            object.levels.len()
        } else {
            full_level_count(base.size.width, base.size.height) as usize
        };
        let mut levels = Vec::with_capacity(count);
        levels.push(Some(base));
        while levels.len() < count {
            let next = match levels.last() {
                Some(Some(previous)) => previous.downsample(),
                _ => break,
            };
            levels.push(Some(next));
        }
        object.levels = levels;
        Ok(())
    }

    fn apply_sampler(&mut self, texture: TextureName, sampler: &SamplerDesc) {
        let _ = self.enter(DeviceCall::ApplySampler {
            texture,
            sampler: *sampler,
        });
        if let Some(object) = self.textures.get_mut(&texture) {
            object.sampler = Some(*sampler);
        }
    }

    fn bind_texture(&mut self, texture: TextureName) {
        let _ = self.enter(DeviceCall::BindTexture(texture));
        self.bound = Some(texture);
    }

    fn map_transfer_buffer(&mut self, len: usize) -> Result<MappedMemory, DeviceError> {
        if !self.capabilities.mapped_buffers {
            self.verify_thread();
            return Err(DeviceError::new("map_transfer_buffer", INVALID_OPERATION));
        }
        let raw = self.allocate_name();
        let buffer =
            BufferName::new(raw).ok_or(DeviceError::new("map_transfer_buffer", INVALID_VALUE))?;
        self.enter(DeviceCall::MapTransferBuffer { buffer, len })?;
        let storage = Arc::new(TransferStorage::zeroed(len));
        let ptr = NonNull::new(storage.as_ptr())
            .ok_or(DeviceError::new("map_transfer_buffer", INVALID_VALUE))?;
        self.buffers.insert(buffer, Some(storage.clone()));
        //the storage is kept alive by the mapping, and the device doesn't read it until unbind
        Ok(unsafe { MappedMemory::from_raw_parts(buffer, 0, ptr, len, storage) })
    }

    fn unbind_transfer_buffer(&mut self, buffer: BufferName) {
        let _ = self.enter(DeviceCall::UnbindTransferBuffer(buffer));
        //orphan the storage; the next map gets a fresh allocation
        self.buffers.remove(&buffer);
    }

    fn read_pixels(
        &mut self,
        texture: TextureName,
        level: u8,
        rect: Rect,
        format: TransferFormat,
    ) -> Result<Vec<u8>, DeviceError> {
        self.enter(DeviceCall::ReadPixels { texture, level })?;
        let object = self
            .textures
            .get(&texture)
            .ok_or(DeviceError::new("read_pixels", INVALID_OPERATION))?;
        let level = object
            .level(level)
            .ok_or(DeviceError::new("read_pixels", INVALID_OPERATION))?;
        let bytes_per_pixel = format.bytes_per_pixel();
        if level.bytes_per_texel != bytes_per_pixel {
            return Err(DeviceError::new("read_pixels", INVALID_OPERATION));
        }
        if !rect.fits_within(level.size) {
            return Err(DeviceError::new("read_pixels", INVALID_VALUE));
        }
        let row_bytes = rect.size.width as usize * bytes_per_pixel;
        let pitch = level.pitch();
        let mut out = Vec::with_capacity(row_bytes * rect.size.height as usize);
        for y in rect.origin.y..rect.y2() {
            let start = y as usize * pitch + rect.origin.x as usize * bytes_per_pixel;
            out.extend_from_slice(&level.bytes[start..start + row_bytes]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{ChannelLayout, DataType, SizedFormat};
    use crate::device::UnpackLayout;

    const RGBA: TransferFormat = TransferFormat {
        layout: ChannelLayout::Rgba,
        data_type: DataType::UnsignedByte,
    };

    fn current_device() -> SoftwareDevice {
        let mut device = SoftwareDevice::new(Capabilities::full());
        device.make_current().unwrap();
        device
    }

    fn upload(level: u8, size: Size, unpack: UnpackLayout, bytes: &[u8]) -> Upload<'_> {
        Upload {
            level,
            origin: Point::ZERO,
            size,
            format: RGBA,
            unpack,
            source: UploadSource::Client(bytes),
        }
    }

    #[test]
    fn padded_rows_follow_alignment() {
        let mut device = current_device();
        let texture = device.create_texture().unwrap();
        device
            .texture_image(
                texture,
                0,
                InternalFormat::Sized(SizedFormat::Rgba8),
                RGBA,
                Size::new(1, 2),
            )
            .unwrap();
        //rows are 4 bytes, but an alignment of 8 puts the second row at byte 8
        let source = [1, 1, 1, 1, 9, 9, 9, 9, 2, 2, 2, 2];
        let unpack = UnpackLayout {
            alignment: 8,
            row_length: 0,
        };
        device
            .upload(texture, upload(0, Size::new(1, 2), unpack, &source))
            .unwrap();
        let pixels = device
            .read_pixels(texture, 0, Rect::from_size(Size::new(1, 2)), RGBA)
            .unwrap();
        assert_eq!(pixels, [1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn immutable_storage_cannot_be_redefined() {
        let mut device = current_device();
        let texture = device.create_texture().unwrap();
        let format = InternalFormat::Sized(SizedFormat::Rgba8);
        device
            .texture_storage(texture, 3, format, Size::new(8, 8))
            .unwrap();
        assert_eq!(device.level_count(texture), 3);
        let err = device
            .texture_image(texture, 0, format, RGBA, Size::new(8, 8))
            .unwrap_err();
        assert_eq!(err.code, INVALID_OPERATION);
        assert!(device.texture_storage(texture, 1, format, Size::new(8, 8)).is_err());
    }

    #[test]
    fn mipmaps_box_filter() {
        let mut device = current_device();
        let texture = device.create_texture().unwrap();
        device
            .texture_image(
                texture,
                0,
                InternalFormat::Sized(SizedFormat::Rgba8),
                RGBA,
                Size::new(2, 2),
            )
            .unwrap();
        let source = [0, 0, 0, 0, 4, 4, 4, 4, 8, 8, 8, 8, 12, 12, 12, 12];
        let unpack = UnpackLayout {
            alignment: 4,
            row_length: 0,
        };
        device
            .upload(texture, upload(0, Size::new(2, 2), unpack, &source))
            .unwrap();
        device.generate_mipmaps(texture).unwrap();
        assert_eq!(device.level_count(texture), 2);
        let pixels = device
            .read_pixels(texture, 1, Rect::from_size(Size::new(1, 1)), RGBA)
            .unwrap();
        assert_eq!(pixels, [6, 6, 6, 6]);
    }

    #[test]
    fn transfer_buffer_uploads() {
        let mut device = current_device();
        let texture = device.create_texture().unwrap();
        device
            .texture_storage(
                texture,
                1,
                InternalFormat::Sized(SizedFormat::Rgba8),
                Size::new(2, 1),
            )
            .unwrap();
        let mut mapped = device.map_transfer_buffer(8).unwrap();
        mapped.as_bytes_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let buffer = mapped.buffer();
        device
            .upload(
                texture,
                Upload {
                    level: 0,
                    origin: Point::ZERO,
                    size: Size::new(2, 1),
                    format: RGBA,
                    unpack: UnpackLayout {
                        alignment: 8,
                        row_length: 0,
                    },
                    source: UploadSource::Transfer { buffer, offset: 0 },
                },
            )
            .unwrap();
        drop(mapped);
        device.unbind_transfer_buffer(buffer);
        let pixels = device
            .read_pixels(texture, 0, Rect::from_size(Size::new(2, 1)), RGBA)
            .unwrap();
        assert_eq!(pixels, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn journal_records_and_injects_failures() {
        let journal = Journal::new();
        let mut device = SoftwareDevice::with_journal(Capabilities::full(), journal.clone());
        device.make_current().unwrap();
        journal.fail_next("create_texture");
        assert!(device.create_texture().is_err());
        assert!(device.create_texture().is_ok());
        assert_eq!(
            journal.count(|c| matches!(c, DeviceCall::CreateTexture(_))),
            2
        );
        let here = std::thread::current().id();
        assert!(journal.entries().iter().all(|e| e.thread == here));
    }

    #[test]
    fn calls_from_another_thread_panic() {
        let mut device = current_device();
        let result = std::thread::spawn(move || device.create_texture().map(|_| ())).join();
        assert!(result.is_err());
    }
}
