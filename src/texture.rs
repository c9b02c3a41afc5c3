// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Device textures driven through a [`GpuTask`].

A [`Texture`] is a device image object plus what is needed to address it: format, level count
and how shaders sample it. Every device call is a command on the GPU task; the device name is
assigned there and published back to the texture.

# Lifecycle

A texture starts without a format. [`Texture::set_format`] defines storage, picking one of two
paths from the device's [`Capabilities`]:

* Immutable storage declares every level in one call. Each format change allocates a new name.
* Mutable storage defines levels one by one. A new name is allocated only if the level count
  changes; otherwise the existing name is redefined in place.

When a new name is allocated, the caller is released as soon as the name exists, before storage
is defined. Content written later is ordered behind the definition by the task's queue.

Pixels arrive through [`Texture::write`], or through [`Texture::lock`] and [`Texture::unlock`]
when the caller wants to fill a buffer directly. Dropping the texture deletes its device object;
if the task is already gone, the object died with the device.

# Examples

```
use imagine_gpu::capabilities::Capabilities;
use imagine_gpu::imp::SoftwareDevice;
use imagine_gpu::pixel_formats::{PixelFormat, PixmapDesc, Point, Rect, Size};
use imagine_gpu::pixmap::Pixmap;
use imagine_gpu::task::{GpuTask, TaskConfig};
use imagine_gpu::texture::{Texture, TextureConfig, WriteFlags};

let task = GpuTask::new(TaskConfig::default(), || {
    Ok(SoftwareDevice::new(Capabilities::full()))
})
.unwrap();
let desc = PixmapDesc::new(Size::new(2, 1), PixelFormat::RGBA8888);
let mut texture = Texture::new(&task, TextureConfig::new(desc).with_levels(1)).unwrap();

let pixels = [1, 2, 3, 4, 5, 6, 7, 8];
texture
    .write(0, Pixmap::new(desc, &pixels), Point::ZERO, WriteFlags::empty())
    .unwrap();
assert_eq!(texture.read(0, Rect::from_size(desc.size())).unwrap(), pixels);
```
*/

mod locked;

pub use locked::LockedBuffer;

use crate::Error;
use crate::bittricks::{full_level_count, level_extent, unpack_alignment};
use crate::capabilities::{Capabilities, InternalFormat, TransferFormat};
use crate::device::{
    ExternalImage, SamplerDesc, TextureName, UnpackLayout, Upload, UploadSource,
};
use crate::image_source::ImageSource;
use crate::pixel_formats::{PixmapDesc, Point, Rect, Size, TextureType};
use crate::pixmap::{PixelBuffer, Pixmap};
use crate::task::{GpuTask, TaskContext, WeakTask};
use bitflags::bitflags;
use locked::Storage;
use std::sync::{Arc, Mutex};

bitflags! {
    /// Options for [`Texture::write`] and [`Texture::unlock`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct WriteFlags: u32 {
        /// Don't wait for the upload. The pixels are copied first.
        const ASYNC = 1 << 0;
        /// Regenerate every mip level from level 0 afterwards.
        const MAKE_MIPMAPS = 1 << 1;
    }
}

bitflags! {
    /// Options for [`Texture::lock`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// Zero the buffer.
        const CLEARED = 1 << 0;
    }
}

/**
Parameters for a new texture.

```
use imagine_gpu::pixel_formats::{PixelFormat, PixmapDesc, Size};
use imagine_gpu::texture::TextureConfig;

let config = TextureConfig::new(PixmapDesc::new(Size::new(64, 64), PixelFormat::RGB565))
    .with_mipmaps(true)
    .with_debug_name("font atlas");
assert_eq!(config.levels, 0);
```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureConfig {
    pub desc: PixmapDesc,
    /// Mip levels to allocate; 0 means as many as the size allows.
    pub levels: u8,
    /// Levels will be filled by mipmap generation rather than written.
    pub will_generate_mipmaps: bool,
    pub debug_name: String,
}

impl TextureConfig {
    pub fn new(desc: PixmapDesc) -> Self {
        TextureConfig {
            desc,
            levels: 0,
            will_generate_mipmaps: false,
            debug_name: String::new(),
        }
    }

    pub fn with_levels(mut self, levels: u8) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_mipmaps(mut self, will_generate_mipmaps: bool) -> Self {
        self.will_generate_mipmaps = will_generate_mipmaps;
        self
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }

    /// Adjusts the config for a device.
    ///
    /// Mipmap generation fills every level of mutable storage by itself, so only level 0 needs
    /// defining.
    pub fn for_device(mut self, capabilities: &Capabilities) -> Self {
        if self.will_generate_mipmaps && !capabilities.immutable_storage {
            self.levels = 1;
        }
        self
    }
}

/// Device-side state, written by commands on the GPU task.
#[derive(Debug, Default)]
struct Slot {
    name: Option<TextureName>,
    /// Sampler state last applied to `name`.
    sampler: Option<SamplerDesc>,
}

impl Slot {
    fn publish(&mut self, name: TextureName) {
        self.name = Some(name);
        self.sampler = None;
    }
}

/**
A cheap handle for binding a texture from inside commands.

Obtained from [`Texture::binding`]. It follows the texture's name as it changes.
*/
#[derive(Debug, Clone)]
pub struct TextureBinding {
    slot: Arc<Mutex<Slot>>,
}

impl TextureBinding {
    /**
    Binds the texture for drawing.

    On devices without sampler objects, the sampler's parameters are applied to the texture
    itself, unless they already were.
    */
    pub fn bind(&self, ctx: &mut TaskContext<'_>, sampler: &SamplerDesc) {
        let mut slot = self.slot.lock().unwrap();
        let Some(name) = slot.name else {
            logwise::error_sync!("bind called on an uninitialized texture");
            return;
        };
        ctx.device().bind_texture(name);
        if !ctx.capabilities().sampler_objects && slot.sampler != Some(*sampler) {
            logwise::debuginternal_sync!(
                "setting sampler {sampler} for texture {name}",
                sampler = logwise::privacy::LogIt(sampler),
                name = name.get()
            );
            ctx.device().apply_sampler(name, sampler);
            slot.sampler = Some(*sampler);
        }
    }
}

/// One sub-image upload, executed on the GPU task.
#[derive(Debug, Clone, Copy)]
struct UploadJob {
    name: TextureName,
    level: u8,
    origin: Point,
    size: Size,
    format: TransferFormat,
    unpack: UnpackLayout,
    make_mipmaps: bool,
}

impl UploadJob {
    fn run(&self, ctx: &mut TaskContext<'_>, source: UploadSource<'_>) {
        let level = self.level as u32;
        logwise::trace_sync!(
            "upload texture {name} level {level} at ({x},{y}) size {w}x{h}",
            name = self.name.get(),
            level = level,
            x = self.origin.x,
            y = self.origin.y,
            w = self.size.width,
            h = self.size.height
        );
        let upload = Upload {
            level: self.level,
            origin: self.origin,
            size: self.size,
            format: self.format,
            unpack: self.unpack,
            source,
        };
        ctx.call(|device| device.upload(self.name, upload));
        if self.make_mipmaps {
            logwise::debuginternal_sync!(
                "generating mipmaps for texture {name}",
                name = self.name.get()
            );
            ctx.call(|device| device.generate_mipmaps(self.name));
        }
    }
}

/**
A device image object owned through a [`GpuTask`].

The texture does not keep the task alive.
*/
#[derive(Debug)]
pub struct Texture {
    task: WeakTask,
    capabilities: Arc<Capabilities>,
    slot: Arc<Mutex<Slot>>,
    desc: Option<PixmapDesc>,
    levels: u8,
    texture_type: TextureType,
    debug_name: String,
}

impl Texture {
    /// A texture with no format and no device name.
    pub fn uninitialized(task: &GpuTask) -> Self {
        Texture {
            task: task.downgrade(),
            capabilities: task.shared_capabilities(),
            slot: Arc::new(Mutex::new(Slot::default())),
            desc: None,
            levels: 0,
            texture_type: TextureType::default(),
            debug_name: String::new(),
        }
    }

    pub fn new(task: &GpuTask, config: TextureConfig) -> Result<Self, Error> {
        let mut texture = Self::uninitialized(task);
        let config = config.for_device(&texture.capabilities);
        texture.debug_name = config.debug_name;
        texture.set_format(config.desc, config.levels)?;
        Ok(texture)
    }

    /**
    Creates a texture holding `image`.

    An image without pixels produces an uninitialized texture.
    */
    pub fn from_image_source(
        task: &GpuTask,
        image: &mut dyn ImageSource,
        make_mipmaps: bool,
    ) -> Result<Self, Error> {
        let Some(desc) = image.desc() else {
            return Ok(Self::uninitialized(task));
        };
        let mut texture = Self::new(task, TextureConfig::new(desc).with_mipmaps(make_mipmaps))?;
        texture.load_image_source(image, make_mipmaps)?;
        Ok(texture)
    }

    /// Fills level 0 from `image`, preferring its pixel view.
    pub fn load_image_source(
        &mut self,
        image: &mut dyn ImageSource,
        make_mipmaps: bool,
    ) -> Result<(), Error> {
        let flags = if make_mipmaps {
            WriteFlags::MAKE_MIPMAPS
        } else {
            WriteFlags::empty()
        };
        if let Some(pixmap) = image.pixmap_view() {
            return self.write(0, pixmap, Point::ZERO, flags);
        }
        let mut locked = self.lock_level(0, BufferFlags::empty())?;
        image.write(locked.pixmap_mut());
        image.free_pixmap();
        self.unlock(locked, flags)
    }

    fn task(&self) -> Result<GpuTask, Error> {
        self.task.upgrade().ok_or(Error::TaskClosed)
    }

    fn require_name(&self) -> Result<TextureName, Error> {
        match self.name() {
            Some(name) => Ok(name),
            None => {
                logwise::error_sync!(
                    "operation on uninitialized texture {debug_name}",
                    debug_name = logwise::privacy::LogIt(&self.debug_name)
                );
                Err(Error::Uninitialized)
            }
        }
    }

    fn require_desc(&self) -> Result<PixmapDesc, Error> {
        self.desc.ok_or(Error::Uninitialized)
    }

    /**
    Defines storage for `desc` with `levels` mip levels.

    A `levels` of 0 allocates every level the size allows. Sizes the device can't mipmap always
    get a single level.
    */
    pub fn set_format(&mut self, desc: PixmapDesc, levels: u8) -> Result<(), Error> {
        let task = self.task()?;
        let caps = self.capabilities.clone();
        let levels = if caps.size_support.supports_mipmaps(desc.width(), desc.height()) {
            if levels == 0 {
                full_level_count(desc.width(), desc.height())
            } else {
                levels
            }
        } else {
            1
        };
        let format = desc.format();
        let size = desc.size();
        let swizzle = caps.swizzle_for(format);
        let slot = self.slot.clone();
        if caps.immutable_storage {
            let internal = InternalFormat::Sized(caps.sized_internal_format(format));
            self.slot.lock().unwrap().sampler = None;
            task.run_sync(move |ctx| {
                let previous = slot.lock().unwrap().name.take();
                if let Some(previous) = previous {
                    ctx.device().delete_texture(previous);
                }
                let Some(name) = ctx.call(|device| device.create_texture()) else {
                    return;
                };
                slot.lock().unwrap().publish(name);
                ctx.notify();
                let levels_u32 = levels as u32;
                logwise::info_sync!(
                    "texture {name} storage size {w}x{h} levels {levels} internal format {internal}",
                    name = name.get(),
                    w = size.width,
                    h = size.height,
                    levels = levels_u32,
                    internal = logwise::privacy::LogIt(&internal)
                );
                ctx.call(|device| device.texture_storage(name, levels, internal, size));
                if let Some(swizzle) = swizzle {
                    ctx.call(|device| device.set_swizzle(name, swizzle));
                }
            })?;
        } else {
            let remake = levels != self.levels;
            let current = self.slot.lock().unwrap().name;
            let internal = caps.internal_format(format);
            let transfer = caps.transfer_format(format);
            let command = move |ctx: &mut TaskContext<'_>| {
                let name = match (remake, current) {
                    (false, Some(name)) => name,
                    (_, previous) => {
                        //level counts can't change in place, so the old name is abandoned
                        if let Some(previous) = previous {
                            ctx.device().delete_texture(previous);
                        }
                        let Some(name) = ctx.call(|device| device.create_texture()) else {
                            slot.lock().unwrap().name = None;
                            return;
                        };
                        slot.lock().unwrap().publish(name);
                        ctx.notify();
                        name
                    }
                };
                let levels_u32 = levels as u32;
                logwise::info_sync!(
                    "texture {name} storage size {w}x{h} levels {levels} internal format {internal} transfer format {transfer}",
                    name = name.get(),
                    w = size.width,
                    h = size.height,
                    levels = levels_u32,
                    internal = logwise::privacy::LogIt(&internal),
                    transfer = logwise::privacy::LogIt(&transfer)
                );
                for level in 0..levels {
                    let level_size =
                        Size::new(level_extent(size.width, level), level_extent(size.height, level));
                    ctx.call(|device| {
                        device.texture_image(name, level, internal, transfer, level_size)
                    });
                }
                if let Some(swizzle) = swizzle {
                    ctx.call(|device| device.set_swizzle(name, swizzle));
                }
            };
            if remake || current.is_none() {
                task.run_sync(command)?;
            } else {
                task.run(command, false)?;
            }
        }
        self.desc = Some(desc);
        self.levels = levels;
        self.texture_type = format.texture_type();
        Ok(())
    }

    /**
    Backs the texture with an image produced outside this crate, as a single level.

    Returns once the device name is known.
    */
    pub fn set_from_external(&mut self, image: ExternalImage, desc: PixmapDesc) -> Result<(), Error> {
        let task = self.task()?;
        let immutable = self.capabilities.external_image_storage;
        let swizzle = self.capabilities.swizzle_for(desc.format());
        let slot = self.slot.clone();
        if immutable {
            self.slot.lock().unwrap().sampler = None;
        }
        task.run_sync(move |ctx| {
            let current = slot.lock().unwrap().name;
            let name = match current {
                //mutable storage can be re-pointed in place
                Some(name) if !immutable => name,
                previous => {
                    if let Some(previous) = previous {
                        ctx.device().delete_texture(previous);
                    }
                    let Some(name) = ctx.call(|device| device.create_texture()) else {
                        slot.lock().unwrap().name = None;
                        return;
                    };
                    slot.lock().unwrap().publish(name);
                    name
                }
            };
            ctx.call(|device| device.external_image(name, image, immutable));
            ctx.notify();
            if let Some(swizzle) = swizzle {
                ctx.call(|device| device.set_swizzle(name, swizzle));
            }
        })?;
        self.desc = Some(desc);
        self.levels = 1;
        self.texture_type = TextureType::External;
        Ok(())
    }

    /// Unpack alignment for uploading `pixmap` from where it is.
    pub fn best_alignment(pixmap: &Pixmap<'_>) -> u8 {
        unpack_alignment(pixmap.address(), pixmap.pitch_bytes())
    }

    /**
    Writes `pixmap` into `level` with its top-left corner at `dest`.

    Without [`WriteFlags::ASYNC`], returns once the upload ran and reads `pixmap` in place.
    With it, `pixmap` is copied and the upload runs later.

    # Panics
    If the pixmap's format differs from the texture's, or it doesn't fit inside the level at
    `dest`.
    */
    pub fn write(
        &mut self,
        level: u8,
        pixmap: Pixmap<'_>,
        dest: Point,
        flags: WriteFlags,
    ) -> Result<(), Error> {
        self.write_aligned(level, pixmap, dest, Self::best_alignment(&pixmap), flags)
    }

    /**
    Like [`Texture::write`], with the unpack alignment given explicitly.

    An `assume_align` of 0 derives the alignment from the pixmap's address and pitch.

    # Panics
    As [`Texture::write`], and if the pixmap's address isn't a multiple of `assume_align`.
    */
    pub fn write_aligned(
        &mut self,
        level: u8,
        pixmap: Pixmap<'_>,
        dest: Point,
        assume_align: u8,
        flags: WriteFlags,
    ) -> Result<(), Error> {
        let name = self.require_name()?;
        let desc = self.require_desc()?;
        let level_size = self.size(level);
        assert!(
            Rect::new(dest, pixmap.size()).fits_within(level_size),
            "write of {}x{} at ({},{}) outside level {} ({}x{})",
            pixmap.size().width,
            pixmap.size().height,
            dest.x,
            dest.y,
            level,
            level_size.width,
            level_size.height
        );
        assert_eq!(
            pixmap.format(),
            desc.format(),
            "pixmap format differs from texture format"
        );
        let align = if assume_align == 0 {
            Self::best_alignment(&pixmap)
        } else {
            assume_align
        };
        assert!(
            pixmap.address() % align as usize == 0,
            "expected pixels at {:#x} to be aligned to {} bytes",
            pixmap.address(),
            align
        );
        let caps = self.capabilities.clone();
        let has_row_length = caps.unpack_row_length;
        let make_mipmaps = flags.contains(WriteFlags::MAKE_MIPMAPS) && self.can_use_mipmaps();
        if has_row_length || !pixmap.is_padded() {
            let job = UploadJob {
                name,
                level,
                origin: dest,
                size: pixmap.size(),
                format: caps.transfer_format(pixmap.format()),
                unpack: UnpackLayout {
                    alignment: align,
                    row_length: if has_row_length {
                        pixmap.pitch_pixels()
                    } else {
                        0
                    },
                },
                make_mipmaps,
            };
            let task = self.task()?;
            if flags.contains(WriteFlags::ASYNC) {
                let pixels = PixelBuffer::try_copy_of(&pixmap)?;
                task.run(
                    move |ctx| job.run(ctx, UploadSource::Client(pixels.as_bytes())),
                    false,
                )?;
            } else {
                let pixels = pixmap.span();
                task.run_scoped(|ctx| job.run(ctx, UploadSource::Client(pixels)))?;
            }
            if make_mipmaps {
                self.update_levels_for_mipmap_generation();
            }
            Ok(())
        } else {
            //the device can't skip row padding, so stage a tightly packed copy
            logwise::debuginternal_sync!(
                "texture {name} needs a staging buffer for width {w} pitch {pitch}",
                name = name.get(),
                w = pixmap.size().width,
                pitch = pixmap.pitch_pixels()
            );
            let mut locked = self.lock(level, Rect::new(dest, pixmap.size()), BufferFlags::empty())?;
            locked.pixmap_mut().write(pixmap);
            self.unlock(locked, flags)
        }
    }

    /// Zeroes `level`.
    pub fn clear(&mut self, level: u8) -> Result<(), Error> {
        let locked = self.lock_level(level, BufferFlags::CLEARED)?;
        self.unlock(locked, WriteFlags::empty())
    }

    /// Locks all of `level`.
    pub fn lock_level(&mut self, level: u8, flags: BufferFlags) -> Result<LockedBuffer, Error> {
        self.lock(level, Rect::from_size(self.size(level)), flags)
    }

    /**
    Returns a buffer for `rect` of `level`, to be filled and passed to [`Texture::unlock`].

    The buffer is a mapped device transfer buffer when the device supports one, and client
    memory otherwise.

    # Errors
    [`Error::Allocation`] if client memory for the buffer can't be allocated.

    # Panics
    If `rect` lies outside the level.
    */
    pub fn lock(
        &mut self,
        level: u8,
        rect: Rect,
        flags: BufferFlags,
    ) -> Result<LockedBuffer, Error> {
        self.require_name()?;
        let desc = self.require_desc()?;
        let level_size = self.size(level);
        assert!(
            rect.fits_within(level_size),
            "lock of {}x{} at ({},{}) outside level {} ({}x{})",
            rect.size.width,
            rect.size.height,
            rect.origin.x,
            rect.origin.y,
            level,
            level_size.width,
            level_size.height
        );
        let buffer_desc = PixmapDesc::new(rect.size, desc.format());
        let bytes = buffer_desc.bytes();
        let mut mapped = None;
        if self.capabilities.can_map_transfer_buffers() {
            self.task()?
                .run_scoped(|ctx| mapped = ctx.call(|device| device.map_transfer_buffer(bytes)))?;
        }
        let storage = match mapped {
            Some(mut memory) => {
                if flags.contains(BufferFlags::CLEARED) {
                    memory.as_bytes_mut().fill(0);
                }
                Storage::Mapped(memory)
            }
            None => match PixelBuffer::try_zeroed(bytes) {
                Ok(buffer) => Storage::Heap(buffer),
                Err(err) => {
                    logwise::error_sync!(
                        "failed allocating {bytes} bytes for pixel buffer",
                        bytes = bytes
                    );
                    return Err(err);
                }
            },
        };
        Ok(LockedBuffer::new(storage, buffer_desc, rect, level))
    }

    /**
    Uploads a locked buffer to the region it was locked for and releases it.

    The upload runs asynchronously; later commands on the task are ordered after it.
    */
    pub fn unlock(&mut self, buffer: LockedBuffer, flags: WriteFlags) -> Result<(), Error> {
        let name = self.require_name()?;
        let task = self.task()?;
        let make_mipmaps = flags.contains(WriteFlags::MAKE_MIPMAPS) && self.can_use_mipmaps();
        if make_mipmaps {
            self.update_levels_for_mipmap_generation();
        }
        let pixmap = buffer.pixmap();
        let job = UploadJob {
            name,
            level: buffer.level(),
            origin: buffer.dirty_rect().origin,
            size: pixmap.size(),
            format: self.capabilities.transfer_format(pixmap.format()),
            //staged rows are tightly packed and start at an 8-byte boundary
            unpack: UnpackLayout {
                alignment: unpack_alignment(0, pixmap.pitch_bytes()),
                row_length: 0,
            },
            make_mipmaps,
        };
        task.run(
            move |ctx| {
                job.run(ctx, buffer.upload_source());
                buffer.release(ctx.device());
            },
            false,
        )
    }

    /**
    Regenerates every mip level from level 0.

    Returns `false` without doing anything if the texture has no format, or the device can't
    mipmap its size.
    */
    pub fn generate_mipmaps(&mut self) -> bool {
        let Ok(name) = self.require_name() else {
            return false;
        };
        if !self.can_use_mipmaps() {
            return false;
        }
        let Ok(task) = self.task() else {
            return false;
        };
        let submitted = task.run(
            move |ctx| {
                logwise::debuginternal_sync!(
                    "generating mipmaps for texture {name}",
                    name = name.get()
                );
                ctx.call(|device| device.generate_mipmaps(name));
            },
            false,
        );
        if submitted.is_err() {
            return false;
        }
        self.update_levels_for_mipmap_generation();
        true
    }

    fn update_levels_for_mipmap_generation(&mut self) {
        //immutable storage keeps its declared level count
        if self.capabilities.immutable_storage {
            return;
        }
        if let Some(desc) = self.desc {
            self.levels = full_level_count(desc.width(), desc.height());
        }
    }

    /**
    Reads `rect` of `level` back from the device, tightly packed in the device's transfer format.

    # Panics
    If `rect` lies outside the level.
    */
    pub fn read(&self, level: u8, rect: Rect) -> Result<Vec<u8>, Error> {
        let name = self.require_name()?;
        let desc = self.require_desc()?;
        assert!(rect.fits_within(self.size(level)), "read outside level {level}");
        let format = self.capabilities.transfer_format(desc.format());
        let mut result = None;
        self.task()?.run_scoped(|ctx| {
            result = Some(ctx.device().read_pixels(name, level, rect, format));
        })?;
        match result {
            Some(Ok(pixels)) => Ok(pixels),
            Some(Err(err)) => Err(Error::Device(err)),
            None => Err(Error::TaskClosed),
        }
    }

    /// Binds the texture from inside a command. See [`TextureBinding::bind`].
    pub fn bind(&self, ctx: &mut TaskContext<'_>, sampler: &SamplerDesc) {
        self.binding().bind(ctx, sampler);
    }

    pub fn binding(&self) -> TextureBinding {
        TextureBinding {
            slot: self.slot.clone(),
        }
    }

    /// Size of `level`; each level halves the previous one, down to 1.
    pub fn size(&self, level: u8) -> Size {
        match self.desc {
            Some(desc) => Size::new(
                level_extent(desc.width(), level),
                level_extent(desc.height(), level),
            ),
            None => Size::default(),
        }
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    pub fn pixmap_desc(&self) -> Option<PixmapDesc> {
        self.desc
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    /// Device name, once published by the GPU task.
    pub fn name(&self) -> Option<TextureName> {
        self.slot.lock().unwrap().name
    }

    pub fn is_initialized(&self) -> bool {
        self.name().is_some()
    }

    pub fn can_use_mipmaps(&self) -> bool {
        match self.desc {
            Some(desc) => self
                .capabilities
                .size_support
                .supports_mipmaps(desc.width(), desc.height()),
            None => false,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub(crate) fn set_debug_name(&mut self, name: String) {
        self.debug_name = name;
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        let Some(name) = self.slot.lock().unwrap().name.take() else {
            return;
        };
        let Some(task) = self.task.upgrade() else {
            //deleted along with the device
            return;
        };
        logwise::info_sync!("deleting texture {name}", name = name.get());
        if let Err(err) = task.run(move |ctx| ctx.device().delete_texture(name), false) {
            logwise::warn_sync!(
                "texture {name} was not deleted: {err}",
                name = name.get(),
                err = logwise::privacy::LogIt(&err)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::SoftwareDevice;
    use crate::pixel_formats::PixelFormat;
    use crate::task::TaskConfig;

    fn task(caps: Capabilities) -> GpuTask {
        GpuTask::new(TaskConfig::default(), move || Ok(SoftwareDevice::new(caps))).unwrap()
    }

    #[test]
    fn config_for_mutable_mipmapped_texture_defines_one_level() {
        let desc = PixmapDesc::new(Size::new(64, 64), PixelFormat::RGBA8888);
        let config = TextureConfig::new(desc).with_mipmaps(true);
        assert_eq!(config.clone().for_device(&Capabilities::minimal()).levels, 1);
        assert_eq!(config.for_device(&Capabilities::full()).levels, 0);
    }

    #[test]
    fn level_sizes_halve_per_axis() {
        let task = task(Capabilities::full());
        let desc = PixmapDesc::new(Size::new(100, 6), PixelFormat::I8);
        let texture = Texture::new(&task, TextureConfig::new(desc)).unwrap();
        assert_eq!(texture.levels(), 7);
        assert_eq!(texture.size(0), Size::new(100, 6));
        assert_eq!(texture.size(2), Size::new(25, 1));
        assert_eq!(texture.size(6), Size::new(1, 1));
    }

    #[test]
    fn uninitialized_operations_fail() {
        let task = task(Capabilities::full());
        let mut texture = Texture::uninitialized(&task);
        assert!(!texture.generate_mipmaps());
        assert!(matches!(
            texture.lock(0, Rect::default(), BufferFlags::empty()),
            Err(Error::Uninitialized)
        ));
        assert_eq!(texture.size(3), Size::default());
    }

    #[test]
    fn unsupported_mipmap_size_gets_one_level() {
        let task = task(Capabilities::minimal());
        let desc = PixmapDesc::new(Size::new(100, 60), PixelFormat::RGBA8888);
        let mut texture = Texture::new(&task, TextureConfig::new(desc)).unwrap();
        assert_eq!(texture.levels(), 1);
        assert!(!texture.can_use_mipmaps());
        assert!(!texture.generate_mipmaps());
    }

    #[test]
    fn mipmaps_refused_when_task_queue_is_full() {
        let task = GpuTask::new(TaskConfig::default().with_queue_capacity(1), || {
            Ok(SoftwareDevice::new(Capabilities::full()))
        })
        .unwrap();
        let desc = PixmapDesc::new(Size::new(64, 64), PixelFormat::RGBA8888);
        let mut texture = Texture::new(&task, TextureConfig::new(desc)).unwrap();
        let generated = Arc::new(Mutex::new(None));
        let move_generated = generated.clone();
        let move_task = task.clone();
        task.run(
            move |_| {
                move_task.run(|_| {}, false).unwrap();
                *move_generated.lock().unwrap() = Some(texture.generate_mipmaps());
            },
            true,
        )
        .unwrap();
        assert_eq!(*generated.lock().unwrap(), Some(false));
    }

    #[test]
    fn types_follow_format() {
        let task = task(Capabilities::full());
        let desc = PixmapDesc::new(Size::new(4, 4), PixelFormat::A8);
        let texture = Texture::new(&task, TextureConfig::new(desc)).unwrap();
        assert_eq!(texture.texture_type(), TextureType::OneChannel);
    }
}
