// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::device::DeviceError;

/// Errors reported to callers of this crate.
///
/// Contract violations (writing a different pixel format, writing outside a level) are not
/// represented here; they panic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the GPU task has shut down")]
    TaskClosed,
    #[error("blocking submission from the GPU task's own thread")]
    WouldDeadlock,
    /// The queue was full when the task's own thread submitted to it; the command was not queued.
    #[error("the GPU task's queue is full")]
    QueueFull,
    #[error("texture has no format")]
    Uninitialized,
    #[error("failed allocating {bytes} bytes for pixel buffer")]
    Allocation { bytes: usize },
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("failed decoding image: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("failed to spawn GPU task thread: {0}")]
    Spawn(#[from] std::io::Error),
}
