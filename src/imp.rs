// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device backends.
//!
//! Platform backends implement [`crate::device::Device`] outside this crate; the in-memory
//! backend ships here.

pub mod software;

pub use software::{DeviceCall, Journal, JournalEntry, SoftwareDevice};
