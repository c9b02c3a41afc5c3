// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The device call surface.

A [`Device`] wraps a graphics context. It is created on the GPU task's thread and never leaves
it, so implementations do not need to be `Send` or `Sync`; every method is called with the
context current.
*/

use crate::capabilities::{Capabilities, InternalFormat, Swizzle, TransferFormat};
use crate::pixel_formats::{Point, Rect, Size};
use std::fmt::Display;
use std::num::NonZeroU32;
use std::ptr::NonNull;
use std::sync::Arc;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Returns `None` for 0, which devices use for "no object".
            pub const fn new(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(raw) => Some($name(raw)),
                    None => None,
                }
            }

            pub const fn get(&self) -> u32 {
                self.0.get()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "0x{:X}", self.0.get())
            }
        }
    };
}

handle!(
    /// Device name of a texture object.
    TextureName
);
handle!(
    /// Device name of a buffer object.
    BufferName
);

/// Device name of a framebuffer. Unlike other objects, 0 is a real framebuffer on many platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FramebufferName(pub u32);

/// Opaque handle to an image produced outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalImage(pub u64);

/// A failing device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{call} failed with error 0x{code:X}")]
pub struct DeviceError {
    /// Name of the call that failed.
    pub call: &'static str,
    /// Device-specific error code.
    pub code: u32,
}

impl DeviceError {
    pub const fn new(call: &'static str, code: u32) -> Self {
        DeviceError { call, code }
    }
}

/// Filtering between texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Filtering between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipFilter {
    #[default]
    None,
    Nearest,
    Linear,
}

/// Addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Sampler state for devices without standalone sampler objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: MipFilter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
}

/// How to walk client rows during an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackLayout {
    /// Rows start on a multiple of this many bytes (1, 2, 4 or 8).
    pub alignment: u8,
    /// Pixels per source row; 0 means the upload width.
    pub row_length: u32,
}

/// Where an upload reads pixels from.
#[derive(Debug, Clone, Copy)]
pub enum UploadSource<'a> {
    /// Client memory.
    Client(&'a [u8]),
    /// A transfer buffer previously handed out by [`Device::map_transfer_buffer`].
    Transfer { buffer: BufferName, offset: usize },
}

/// Destination and layout of a sub-image upload.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub level: u8,
    pub origin: Point,
    pub size: Size,
    pub format: TransferFormat,
    pub unpack: UnpackLayout,
    pub source: UploadSource<'a>,
}

/**
Client-visible memory of a mapped transfer buffer.

The holder has exclusive access to the memory until it passes the buffer to
[`Device::unbind_transfer_buffer`]. The allocation itself is kept alive by `owner`, so a mapping
that outlives its device never dangles.
*/
pub struct MappedMemory {
    buffer: BufferName,
    offset: usize,
    ptr: NonNull<u8>,
    len: usize,
    _owner: Arc<dyn std::any::Any + Send + Sync>,
}

impl std::fmt::Debug for MappedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedMemory")
            .field("buffer", &self.buffer)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

//the memory is owned by the device but exclusively lent to the holder
unsafe impl Send for MappedMemory {}
unsafe impl Sync for MappedMemory {}

impl MappedMemory {
    /**
    # Safety
    `ptr` must point to `len` bytes owned by `owner`, valid for reads and writes for as long
    as `owner` lives. Nothing else may access that memory until `buffer` is unbound.
    */
    pub unsafe fn from_raw_parts(
        buffer: BufferName,
        offset: usize,
        ptr: NonNull<u8>,
        len: usize,
        owner: Arc<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        MappedMemory {
            buffer,
            offset,
            ptr,
            len,
            _owner: owner,
        }
    }

    pub fn buffer(&self) -> BufferName {
        self.buffer
    }

    /// Offset of this memory within the transfer buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        //safe because of the from_raw_parts contract
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        //safe because of the from_raw_parts contract, and we are borrowed mutably
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/**
A graphics context and the calls this crate makes on it.

All methods run on the GPU task's thread. Failing calls return a [`DeviceError`] naming the call.
*/
pub trait Device: 'static {
    /// Capability flags. Queried once, after [`Device::make_current`].
    fn capabilities(&self) -> Capabilities;

    /// Makes the context current on the calling thread.
    fn make_current(&mut self) -> Result<(), DeviceError>;

    /// Framebuffer presenting to the window surface.
    fn default_framebuffer(&mut self) -> FramebufferName;

    fn create_buffer(&mut self) -> Result<BufferName, DeviceError>;

    fn delete_buffer(&mut self, buffer: BufferName);

    fn create_texture(&mut self) -> Result<TextureName, DeviceError>;

    fn delete_texture(&mut self, texture: TextureName);

    /// Declares `levels` levels of fixed storage for all of `texture` at once.
    fn texture_storage(
        &mut self,
        texture: TextureName,
        levels: u8,
        format: InternalFormat,
        size: Size,
    ) -> Result<(), DeviceError>;

    /// (Re)defines one level of mutable storage, leaving its contents undefined.
    fn texture_image(
        &mut self,
        texture: TextureName,
        level: u8,
        format: InternalFormat,
        transfer: TransferFormat,
        size: Size,
    ) -> Result<(), DeviceError>;

    /// Backs `texture` with an external image as a single level.
    fn external_image(
        &mut self,
        texture: TextureName,
        image: ExternalImage,
        immutable: bool,
    ) -> Result<(), DeviceError>;

    fn set_swizzle(&mut self, texture: TextureName, swizzle: Swizzle) -> Result<(), DeviceError>;

    fn upload(&mut self, texture: TextureName, upload: Upload<'_>) -> Result<(), DeviceError>;

    /// Fills mip levels from level 0.
    fn generate_mipmaps(&mut self, texture: TextureName) -> Result<(), DeviceError>;

    fn apply_sampler(&mut self, texture: TextureName, sampler: &SamplerDesc);

    /// Binds `texture` for drawing.
    fn bind_texture(&mut self, texture: TextureName);

    /// Maps `len` bytes of a pixel transfer buffer into client memory.
    fn map_transfer_buffer(&mut self, len: usize) -> Result<MappedMemory, DeviceError>;

    /// Flushes client writes and unbinds the transfer buffer. The memory is no longer accessible.
    fn unbind_transfer_buffer(&mut self, buffer: BufferName);

    /// Reads back `rect` of `level`, tightly packed.
    fn read_pixels(
        &mut self,
        texture: TextureName,
        level: u8,
        rect: Rect,
        format: TransferFormat,
    ) -> Result<Vec<u8>, DeviceError>;
}
