// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Utility file for allocating exportable system memory.  On Linux systems,
//! this is is often done with memfd.  Used when no render node is available.

use std::fs::File;
use std::io::Seek;
use std::io::SeekFrom;
use std::os::raw::c_void;
use std::os::unix::io::BorrowedFd;
use std::ptr::null_mut;

use crate::backend::BoMapping;
use crate::backend::GbmBuffer;
use crate::backend::GbmDevice;
use crate::backend::ImportData;
use crate::checked_arithmetic;
use crate::formats::DrmFormat;
use crate::gralloc_os::round_up_to_page_size;
use crate::gralloc_os::MemoryMapping;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_os::SharedMemory;
use crate::gralloc_utils::*;
use crate::usage::GbmBoFlags;
use crate::usage::TransferFlags;

/// A gralloc implementation capable of allocation from system memory.
pub struct SystemGralloc(());

impl SystemGralloc {
    fn new() -> Self {
        SystemGralloc(())
    }

    /// Returns a new `SystemGralloc` instance.
    pub fn init() -> GrallocResult<Box<dyn GbmDevice>> {
        Ok(Box::new(SystemGralloc::new()))
    }
}

fn buffer_size(stride: u32, height: u32) -> GrallocResult<u64> {
    let stride = stride as u64;
    let height = height as u64;
    let size = checked_arithmetic!(stride * height)?;
    round_up_to_page_size(size)
}

impl GbmDevice for SystemGralloc {
    fn name(&self) -> &str {
        "system"
    }

    fn create_buffer(
        &self,
        width: u32,
        height: u32,
        format: DrmFormat,
        _flags: GbmBoFlags,
    ) -> GrallocResult<Box<dyn GbmBuffer>> {
        if width == 0 || height == 0 {
            return Err(GrallocError::InvalidMapping("zero sized buffer"));
        }

        let bytes_per_pixel = format.bytes_per_pixel()?;
        let stride = checked_arithmetic!(width * bytes_per_pixel)?;
        let size = buffer_size(stride, height)?;
        let shm = SharedMemory::new("gbm_gralloc", size)?;

        Ok(Box::new(SystemBuffer {
            shm: shm.into(),
            size,
            width,
            height,
            bytes_per_pixel,
            stride,
            mapping: None,
        }))
    }

    fn import_buffer(&self, data: &ImportData) -> GrallocResult<Box<dyn GbmBuffer>> {
        if data.fd < 0 {
            return Err(GrallocError::MissingPrimeFd);
        }

        // Safe because the caller keeps `data.fd` open for the duration of the call; it is
        // duplicated before being stored.
        let borrowed = unsafe { BorrowedFd::borrow_raw(data.fd) };
        let shm: SafeDescriptor = borrowed.try_clone_to_owned()?.into();

        let bytes_per_pixel = data.format.bytes_per_pixel()?;
        let width = data.width;
        let min_stride = checked_arithmetic!(width * bytes_per_pixel)?;
        if data.stride < min_stride {
            return Err(GrallocError::InvalidMapping("stride too small for width"));
        }

        let mut file: File = shm.try_clone()?.into();
        let size = file.seek(SeekFrom::End(0))?;
        if size < buffer_size(data.stride, data.height)? {
            return Err(GrallocError::InvalidMapping("imported memory is too small"));
        }

        Ok(Box::new(SystemBuffer {
            shm,
            size,
            width: data.width,
            height: data.height,
            bytes_per_pixel,
            stride: data.stride,
            mapping: None,
        }))
    }
}

/// A memfd backed buffer.
pub struct SystemBuffer {
    shm: SafeDescriptor,
    size: u64,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    stride: u32,
    mapping: Option<MemoryMapping>,
}

impl GbmBuffer for SystemBuffer {
    fn export(&self) -> GrallocResult<SafeDescriptor> {
        Ok(self.shm.try_clone()?)
    }

    fn stride(&self) -> u32 {
        self.stride
    }

    fn modifier(&self) -> Option<u64> {
        None
    }

    fn map(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        flags: TransferFlags,
    ) -> GrallocResult<BoMapping> {
        if self.mapping.is_some() {
            return Err(GrallocError::DoubleMapping);
        }

        let right = checked_arithmetic!(x + width)?;
        let bottom = checked_arithmetic!(y + height)?;
        if right > self.width || bottom > self.height {
            return Err(GrallocError::InvalidMapping("region outside of buffer"));
        }

        let mapping = MemoryMapping::from_safe_descriptor(&self.shm, self.size.try_into()?, flags)?;
        let offset = y as usize * self.stride as usize + x as usize * self.bytes_per_pixel as usize;
        // Safe because the region was checked against the buffer, which the mapping covers.
        let addr = unsafe { mapping.as_ptr().add(offset) };
        self.mapping = Some(mapping);

        Ok(BoMapping {
            addr,
            stride: self.stride,
            map_data: null_mut(),
        })
    }

    fn unmap(&mut self, _mapping: BoMapping) {
        self.mapping = None;
    }

    fn as_raw_bo(&self) -> *mut c_void {
        null_mut()
    }
}
