// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! backend: The capabilities a buffer allocator has to provide.  Modeled on libgbm.

use std::os::raw::c_void;
use std::ptr::NonNull;

use crate::formats::DrmFormat;
use crate::gralloc_os::RawDescriptor;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_utils::GrallocResult;
use crate::usage::GbmBoFlags;
use crate::usage::TransferFlags;

/// Parameters for importing a buffer from its prime fd.  Width and height are physical.
#[derive(Copy, Clone, Debug)]
pub struct ImportData {
    pub width: u32,
    pub height: u32,
    pub format: DrmFormat,
    pub fd: RawDescriptor,
    pub stride: u32,
    pub modifier: Option<u64>,
}

/// An active CPU mapping of a buffer object, as returned by `GbmBuffer::map`.
#[derive(Debug)]
pub struct BoMapping {
    pub addr: NonNull<u8>,
    pub stride: u32,
    /// Opaque token handed back to `GbmBuffer::unmap`.
    pub map_data: *mut c_void,
}

// Safe because the mapping is only touched through the buffer object that owns it.
unsafe impl Send for BoMapping {}

/// A connection to an allocator, shared by every buffer object of the process.
pub trait GbmDevice: Send + Sync {
    /// Name of the backend driver, for logging.
    fn name(&self) -> &str;

    /// Allocates a new buffer object.  Width and height are physical.
    fn create_buffer(
        &self,
        width: u32,
        height: u32,
        format: DrmFormat,
        flags: GbmBoFlags,
    ) -> GrallocResult<Box<dyn GbmBuffer>>;

    /// Wraps memory exported by another process (or another handle) in a new buffer object.
    fn import_buffer(&self, data: &ImportData) -> GrallocResult<Box<dyn GbmBuffer>>;
}

/// A buffer object owned by a `GbmDevice`.  Dropping it destroys the backend object.
pub trait GbmBuffer: Send {
    /// Exports a new prime fd for the buffer.
    fn export(&self) -> GrallocResult<SafeDescriptor>;

    /// Length in bytes of one row.
    fn stride(&self) -> u32;

    /// Layout modifier, if the backend can report one.
    fn modifier(&self) -> Option<u64>;

    /// Maps the region `(x, y)`-`(x + width, y + height)` for CPU access.  The backend waits
    /// for pending device access before returning.
    fn map(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        flags: TransferFlags,
    ) -> GrallocResult<BoMapping>;

    /// Releases a mapping returned by `map`.
    fn unmap(&mut self, mapping: BoMapping);

    /// The backend's native object (`struct gbm_bo *` for libgbm), or null if there is none.
    fn as_raw_bo(&self) -> *mut c_void;
}
