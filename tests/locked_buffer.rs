// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Locking texture regions through heap and mapped staging memory.

use imagine_gpu::Error;
use imagine_gpu::capabilities::Capabilities;
use imagine_gpu::device::ExternalImage;
use imagine_gpu::imp::{DeviceCall, Journal, SoftwareDevice};
use imagine_gpu::pixel_formats::{PixelFormat, PixmapDesc, Point, Rect, Size};
use imagine_gpu::pixmap::Pixmap;
use imagine_gpu::task::{GpuTask, TaskConfig};
use imagine_gpu::texture::{BufferFlags, Texture, TextureConfig, WriteFlags};

fn task_with(caps: Capabilities, config: TaskConfig) -> (GpuTask, Journal) {
    let journal = Journal::new();
    let device_journal = journal.clone();
    let task = GpuTask::new(config.with_stream_buffers(0), move || {
        Ok(SoftwareDevice::with_journal(caps, device_journal))
    })
    .unwrap();
    (task, journal)
}

fn ia88(width: u32, height: u32) -> PixmapDesc {
    PixmapDesc::new(Size::new(width, height), PixelFormat::IA88)
}

fn fill_rows(texture: &mut Texture, rect: Rect, flags: BufferFlags) -> Vec<u8> {
    let mut locked = texture.lock(0, rect, flags).unwrap();
    let mut pixmap = locked.pixmap_mut();
    for y in 0..rect.size.height {
        pixmap.row_mut(y).fill(0x10 + y as u8);
    }
    let written = locked.pixmap().span().to_vec();
    texture.unlock(locked, WriteFlags::empty()).unwrap();
    written
}

#[test]
fn mapped_buffer_uploads_from_transfer_buffer() {
    let (task, journal) = task_with(Capabilities::full(), TaskConfig::default());
    let mut texture = Texture::new(&task, TextureConfig::new(ia88(8, 8)).with_levels(1)).unwrap();
    let rect = Rect::new(Point::new(2, 3), Size::new(4, 2));

    let locked = texture.lock(0, rect, BufferFlags::empty()).unwrap();
    assert!(locked.is_mapped());
    assert_eq!(locked.dirty_rect(), rect);
    assert_eq!(locked.desc(), ia88(4, 2));
    drop(locked);

    let written = fill_rows(&mut texture, rect, BufferFlags::empty());
    assert_eq!(texture.read(0, rect).unwrap(), written);
    assert_eq!(
        journal.count(|c| matches!(c, DeviceCall::Upload { from_transfer: true, .. })),
        1
    );
    assert_eq!(
        journal.count(|c| matches!(c, DeviceCall::UnbindTransferBuffer(_))),
        1
    );
}

#[test]
fn heap_buffer_without_mappable_transfers() {
    let caps = Capabilities {
        //mapping alone isn't enough; transfer uploads also need row length control
        unpack_row_length: false,
        ..Capabilities::full()
    };
    let (task, journal) = task_with(caps, TaskConfig::default());
    let mut texture = Texture::new(&task, TextureConfig::new(ia88(8, 8)).with_levels(1)).unwrap();
    let rect = Rect::new(Point::new(1, 1), Size::new(3, 3));
    let locked = texture.lock(0, rect, BufferFlags::empty()).unwrap();
    assert!(!locked.is_mapped());
    drop(locked);

    let written = fill_rows(&mut texture, rect, BufferFlags::empty());
    assert_eq!(texture.read(0, rect).unwrap(), written);
    assert_eq!(
        journal.count(|c| matches!(c, DeviceCall::MapTransferBuffer { .. })),
        0
    );
}

#[test]
fn failed_mapping_falls_back_to_heap() {
    let (task, journal) = task_with(
        Capabilities::full(),
        TaskConfig::default().with_fatal_device_errors(false),
    );
    let mut texture = Texture::new(&task, TextureConfig::new(ia88(4, 4)).with_levels(1)).unwrap();
    journal.fail_next("map_transfer_buffer");
    let locked = texture
        .lock_level(0, BufferFlags::CLEARED)
        .unwrap();
    assert!(!locked.is_mapped());
    texture.unlock(locked, WriteFlags::empty()).unwrap();
    assert_eq!(
        texture.read(0, Rect::from_size(Size::new(4, 4))).unwrap(),
        vec![0; 32]
    );
}

#[test]
fn cleared_lock_zeroes_region_on_both_paths() {
    for caps in [Capabilities::full(), Capabilities::minimal()] {
        let (task, _journal) = task_with(caps, TaskConfig::default());
        let desc = ia88(4, 4);
        let mut texture = Texture::new(&task, TextureConfig::new(desc).with_levels(1)).unwrap();
        let pixels = vec![0xFF; desc.bytes()];
        texture
            .write(0, Pixmap::new(desc, &pixels), Point::ZERO, WriteFlags::empty())
            .unwrap();

        let rect = Rect::new(Point::new(1, 1), Size::new(2, 2));
        let locked = texture.lock(0, rect, BufferFlags::CLEARED).unwrap();
        assert!(locked.pixmap().span().iter().all(|b| *b == 0));
        texture.unlock(locked, WriteFlags::empty()).unwrap();

        let back = texture.read(0, Rect::from_size(desc.size())).unwrap();
        for y in 0..4usize {
            for x in 0..4usize {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if inside { 0 } else { 0xFF };
                assert_eq!(back[(y * 4 + x) * 2], expected, "pixel ({x},{y})");
            }
        }
    }
}

#[test]
fn locked_buffer_can_be_filled_on_another_thread() {
    let (task, _journal) = task_with(Capabilities::full(), TaskConfig::default());
    let mut texture = Texture::new(&task, TextureConfig::new(ia88(2, 2)).with_levels(1)).unwrap();
    let mut locked = texture.lock_level(0, BufferFlags::empty()).unwrap();
    let locked = std::thread::spawn(move || {
        locked.pixmap_mut().row_mut(0).copy_from_slice(&[1, 2, 3, 4]);
        locked.pixmap_mut().row_mut(1).copy_from_slice(&[5, 6, 7, 8]);
        locked
    })
    .join()
    .unwrap();
    texture.unlock(locked, WriteFlags::empty()).unwrap();
    assert_eq!(
        texture.read(0, Rect::from_size(Size::new(2, 2))).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
}

#[test]
#[should_panic]
fn lock_outside_level_panics() {
    let (task, _journal) = task_with(Capabilities::full(), TaskConfig::default());
    let mut texture = Texture::new(&task, TextureConfig::new(ia88(4, 4))).unwrap();
    let _ = texture.lock(1, Rect::from_size(Size::new(3, 3)), BufferFlags::empty());
}

#[test]
fn heap_allocation_failure_is_returned() {
    let task = GpuTask::new(TaskConfig::default().with_stream_buffers(0), || {
        Ok(SoftwareDevice::new(Capabilities::minimal()).with_external_image(
            ExternalImage(1),
            Size::new(1, 1),
            &[0; 4],
        ))
    })
    .unwrap();
    let mut texture = Texture::uninitialized(&task);
    //an external image can be larger than any client allocation
    let huge = PixmapDesc::new(Size::new(u32::MAX, u32::MAX), PixelFormat::I8);
    texture.set_from_external(ExternalImage(1), huge).unwrap();
    let result = texture.lock_level(0, BufferFlags::empty());
    assert!(matches!(result, Err(Error::Allocation { bytes }) if bytes == huge.bytes()));
}
