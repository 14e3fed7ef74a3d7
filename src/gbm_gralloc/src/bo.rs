// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! bo: Creation, import and destruction of buffer objects.

use std::os::raw::c_void;

use log::debug;
use log::error;

use crate::backend::BoMapping;
use crate::backend::GbmBuffer;
use crate::backend::GbmDevice;
use crate::backend::ImportData;
use crate::gralloc_utils::*;
use crate::handle::GrallocHandle;
use crate::usage::GbmBoFlags;
use crate::usage::GrallocUsage;
use crate::usage::CURSOR_MIN_EXTENT;

/// A live buffer in this process: the backend object plus its lock state.
pub struct BufferObject {
    pub(crate) buffer: Box<dyn GbmBuffer>,
    pub(crate) mapping: Option<BoMapping>,
    /// Physical `(right, bottom)` covered by `mapping`.
    pub(crate) mapped_extent: (u32, u32),
    pub(crate) lock_count: u32,
    pub(crate) locked_for: GrallocUsage,
}

impl BufferObject {
    fn new(buffer: Box<dyn GbmBuffer>) -> BufferObject {
        BufferObject {
            buffer,
            mapping: None,
            mapped_extent: (0, 0),
            lock_count: 0,
            locked_for: GrallocUsage::empty(),
        }
    }

    /// Allocates a buffer for `handle` and fills in its prime fd, stride and modifier.
    pub fn allocate(device: &dyn GbmDevice, handle: &mut GrallocHandle) -> GrallocResult<BufferObject> {
        let format = handle.format.backend_format()?;
        let flags = handle.usage.to_backend_bind_flags();

        let mut width = handle.width;
        let mut height = handle.height;
        if flags.contains(GbmBoFlags::CURSOR) {
            width = width.max(CURSOR_MIN_EXTENT);
            height = height.max(CURSOR_MIN_EXTENT);
        }

        let (width, height) = handle.format.physical_extent(width, height)?;

        debug!(
            "create BO, size={}x{}, fmt={:?}, usage={:#x}",
            handle.width,
            handle.height,
            handle.format,
            flags.bits()
        );
        let buffer = device
            .create_buffer(width, height, format, flags)
            .map_err(|e| {
                error!(
                    "failed to create BO, size={}x{}, fmt={:?}, usage={:#x}: {}",
                    handle.width,
                    handle.height,
                    handle.format,
                    flags.bits(),
                    e
                );
                GrallocError::AllocationFailed {
                    width: handle.width,
                    height: handle.height,
                    format: handle.format.0,
                    usage: handle.usage.bits(),
                }
            })?;

        handle.prime_fd = Some(buffer.export()?);
        handle.stride = buffer.stride();
        if let Some(modifier) = buffer.modifier() {
            handle.modifier = modifier;
        }

        Ok(BufferObject::new(buffer))
    }

    /// Imports the buffer described by `handle` from its prime fd.
    ///
    /// The physical geometry is derived from the logical width, height and format of the handle
    /// exactly as `allocate` does.
    pub fn import(device: &dyn GbmDevice, handle: &GrallocHandle) -> GrallocResult<BufferObject> {
        let fd = handle.prime_fd();
        if fd < 0 {
            return Err(GrallocError::MissingPrimeFd);
        }

        let format = handle.format.backend_format()?;
        let (width, height) = handle.format.physical_extent(handle.width, handle.height)?;

        debug!("import BO, pfd={}, size={}x{}, fmt={:?}", fd, width, height, format);
        let data = ImportData {
            width,
            height,
            format,
            fd,
            stride: handle.stride,
            modifier: handle.modifier(),
        };
        let buffer = device.import_buffer(&data).map_err(|e| {
            error!("failed to import BO, pfd={}: {}", fd, e);
            GrallocError::ImportFailed {
                width: handle.width,
                height: handle.height,
                format: handle.format.0,
            }
        })?;

        Ok(BufferObject::new(buffer))
    }

    /// The backend's native buffer object, for submission paths that need it.
    pub fn raw_bo(&self) -> *mut c_void {
        self.buffer.as_raw_bo()
    }

    /// Number of outstanding locks.
    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    /// Usage the buffer is currently locked for.
    pub fn locked_for(&self) -> GrallocUsage {
        self.locked_for
    }

    /// True while a CPU mapping is active.
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }
}

impl Drop for BufferObject {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            error!("destroying BO with {} lock(s) outstanding", self.lock_count);
            self.buffer.unmap(mapping);
        }
    }
}
