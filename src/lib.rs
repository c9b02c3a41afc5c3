/*! imagine_gpu runs a graphics device on a thread of its own and manages textures through it.

Graphics contexts on most platforms may only be used from the thread that made them current.
Emulator front-ends, on the other hand, produce frames and images on whatever thread is
convenient. This crate bridges the two:

* A [`task::GpuTask`] owns a [`device::Device`] on one dedicated thread and runs closures
  submitted from anywhere, in order, with several ways to wait for them.
* A [`texture::Texture`] drives the lifecycle of a device image object through that task: format
  changes on mutable and immutable storage, uploads with and without a staging buffer, locking a
  region for direct writes, mipmap generation and deletion.
* A [`pixmap_texture::PixmapTexture`] stores an image of any size on devices restricted to
  power-of-two or square textures, and reports the texture coordinates covering it.

# Backends

Device backends implement the [`device::Device`] trait. The crate ships
[`imp::SoftwareDevice`], an in-memory device that enforces thread affinity and records every
call, which makes the rest of the crate testable without graphics hardware.

```
use imagine_gpu::capabilities::Capabilities;
use imagine_gpu::imp::SoftwareDevice;
use imagine_gpu::pixel_formats::{PixelFormat, PixmapDesc, Size};
use imagine_gpu::pixmap_texture::PixmapTexture;
use imagine_gpu::task::{GpuTask, TaskConfig};
use imagine_gpu::texture::TextureConfig;

let task = GpuTask::new(TaskConfig::default().with_label("video"), || {
    Ok(SoftwareDevice::new(Capabilities::minimal()))
})
.unwrap();
let frame = PixmapDesc::new(Size::new(256, 224), PixelFormat::RGB565);
let texture = PixmapTexture::new(&task, TextureConfig::new(frame)).unwrap();
assert_eq!(texture.size(0), Size::new(256, 256));
assert_eq!(texture.uv_bounds(), (1.0, 224.0 / 256.0));
```
*/

pub mod bittricks;
pub mod capabilities;
pub mod device;
mod error;
pub mod image_source;
pub mod imp;
pub mod pixel_formats;
pub mod pixmap;
pub mod pixmap_texture;
pub mod task;
pub mod texture;

pub use error::Error;

logwise::declare_logging_domain!();

pub type Priority = some_executor::Priority;
