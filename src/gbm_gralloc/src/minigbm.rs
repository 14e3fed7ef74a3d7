// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! minigbm: Buffer objects backed by libgbm on a DRM render node.

#![cfg(feature = "minigbm")]

use std::ffi::CStr;
use std::fs::File;
use std::io::Error;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_void;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr::null_mut;
use std::ptr::NonNull;
use std::sync::Arc;

use log::debug;
use log::error;
use log::info;

use crate::backend::BoMapping;
use crate::backend::GbmBuffer;
use crate::backend::GbmDevice;
use crate::backend::ImportData;
use crate::formats::DrmFormat;
use crate::gralloc_os::FromRawDescriptor;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_utils::*;
use crate::minigbm_bindings::*;
use crate::rendernode;
use crate::usage::GbmBoFlags;
use crate::usage::TransferFlags;

struct MinigbmDeviceInner {
    gbm: *mut gbm_device,
    // Closed after `gbm` is destroyed.
    _fd: File,
}

// Safe because libgbm handles synchronization internally.
unsafe impl Send for MinigbmDeviceInner {}
unsafe impl Sync for MinigbmDeviceInner {}

impl Drop for MinigbmDeviceInner {
    fn drop(&mut self) {
        // Safe because MinigbmDeviceInner is only constructed with a valid gbm_device.
        unsafe {
            gbm_device_destroy(self.gbm);
        }
    }
}

/// A device capable of allocating `MinigbmBuffer`.
#[derive(Clone)]
pub struct MinigbmDevice {
    minigbm_device: Arc<MinigbmDeviceInner>,
    device_name: String,
}

impl MinigbmDevice {
    /// Opens the render node at `path` and creates a GBM device on it.
    pub fn open(path: &Path) -> GrallocResult<Box<dyn GbmDevice>> {
        let fd = rendernode::open_device(path)?;
        match rendernode::drm_device_name(&fd) {
            Ok(name) => info!("opened {:?}, driver {}", path, name),
            Err(e) => error!("failed to query driver of {:?}: {}", path, e),
        }

        // gbm_create_device is safe to call with a valid fd, and we check that a valid one is
        // returned.  If the fd does not refer to a DRM device, gbm_create_device will reject it.
        let gbm = unsafe { gbm_create_device(fd.as_raw_fd()) };
        if gbm.is_null() {
            error!("failed to create gbm device on {:?}", path);
            return Err(GrallocError::DeviceCreateFailed(path.to_path_buf()));
        }

        let minigbm_device = Arc::new(MinigbmDeviceInner { gbm, _fd: fd });

        // Safe because a valid gbm device has a statically allocated string associated with
        // it, which is valid for the lifetime of the process.
        let backend_name: *const c_char = unsafe { gbm_device_get_backend_name(gbm) };
        let device_name = if backend_name.is_null() {
            String::from("gbm")
        } else {
            let c_str: &CStr = unsafe { CStr::from_ptr(backend_name) };
            c_str.to_string_lossy().into_owned()
        };

        Ok(Box::new(MinigbmDevice {
            minigbm_device,
            device_name,
        }))
    }

    fn wrap(&self, bo: *mut gbm_bo) -> GrallocResult<Box<dyn GbmBuffer>> {
        if bo.is_null() {
            return Err(GrallocError::IoError(Error::last_os_error()));
        }

        Ok(Box::new(MinigbmBuffer(bo, self.clone())))
    }
}

impl GbmDevice for MinigbmDevice {
    fn name(&self) -> &str {
        &self.device_name
    }

    fn create_buffer(
        &self,
        width: u32,
        height: u32,
        format: DrmFormat,
        flags: GbmBoFlags,
    ) -> GrallocResult<Box<dyn GbmBuffer>> {
        // Safe because the device is valid and libgbm checks the remaining arguments.
        let bo = unsafe {
            gbm_bo_create(
                self.minigbm_device.gbm,
                width,
                height,
                format.0,
                flags.bits(),
            )
        };
        self.wrap(bo)
    }

    fn import_buffer(&self, data: &ImportData) -> GrallocResult<Box<dyn GbmBuffer>> {
        let bo = match data.modifier {
            Some(modifier) => {
                let mut import = gbm_import_fd_modifier_data {
                    width: data.width,
                    height: data.height,
                    format: data.format.0,
                    num_fds: 1,
                    fds: [data.fd, 0, 0, 0],
                    strides: [data.stride as c_int, 0, 0, 0],
                    offsets: [0; GBM_MAX_PLANES],
                    modifier,
                };

                // Safe because `import` outlives the call and libgbm duplicates what it keeps.
                unsafe {
                    gbm_bo_import(
                        self.minigbm_device.gbm,
                        GBM_BO_IMPORT_FD_MODIFIER,
                        &mut import as *mut gbm_import_fd_modifier_data as *mut c_void,
                        0,
                    )
                }
            }
            None => {
                let mut import = gbm_import_fd_data {
                    fd: data.fd,
                    width: data.width,
                    height: data.height,
                    stride: data.stride,
                    format: data.format.0,
                };

                // Safe because `import` outlives the call and libgbm duplicates what it keeps.
                unsafe {
                    gbm_bo_import(
                        self.minigbm_device.gbm,
                        GBM_BO_IMPORT_FD,
                        &mut import as *mut gbm_import_fd_data as *mut c_void,
                        0,
                    )
                }
            }
        };
        self.wrap(bo)
    }
}

/// An allocation from a `MinigbmDevice`.
pub struct MinigbmBuffer(*mut gbm_bo, MinigbmDevice);

// Safe because libgbm handles synchronization internally.
unsafe impl Send for MinigbmBuffer {}

impl MinigbmBuffer {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { gbm_bo_get_width(self.0) }
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { gbm_bo_get_height(self.0) }
    }

    /// `DrmFormat` of the buffer.
    pub fn format(&self) -> DrmFormat {
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { DrmFormat(gbm_bo_get_format(self.0)) }
    }
}

impl std::fmt::Debug for MinigbmBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MinigbmBuffer({}x{} {:?} on {})",
            self.width(),
            self.height(),
            self.format(),
            self.1.device_name
        )
    }
}

impl GbmBuffer for MinigbmBuffer {
    fn export(&self) -> GrallocResult<SafeDescriptor> {
        // This is always safe to call with a valid gbm_bo pointer.
        match unsafe { gbm_bo_get_fd(self.0) } {
            fd if fd >= 0 => {
                // Safe because gbm_bo_get_fd returns a new fd owned by the caller.
                let dmabuf = unsafe { SafeDescriptor::from_raw_descriptor(fd) };
                Ok(dmabuf)
            }
            _ => Err(GrallocError::IoError(Error::last_os_error())),
        }
    }

    fn stride(&self) -> u32 {
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { gbm_bo_get_stride(self.0) }
    }

    fn modifier(&self) -> Option<u64> {
        // This is always safe to call with a valid gbm_bo pointer.
        match unsafe { gbm_bo_get_modifier(self.0) } {
            DRM_FORMAT_MOD_INVALID => None,
            modifier => Some(modifier),
        }
    }

    fn map(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        flags: TransferFlags,
    ) -> GrallocResult<BoMapping> {
        let mut stride: u32 = 0;
        let mut map_data: *mut c_void = null_mut();

        // Safe because the out pointers are valid and libgbm checks the region.  gbm_bo_map
        // waits for pending rendering before returning.
        let addr = unsafe {
            gbm_bo_map(
                self.0,
                x,
                y,
                width,
                height,
                flags.bits(),
                &mut stride,
                &mut map_data,
            )
        };
        let addr = NonNull::new(addr as *mut u8).ok_or(GrallocError::MappingFailed)?;
        debug!("gbm_bo_map returned {:p}, stride {}", addr, stride);

        Ok(BoMapping {
            addr,
            stride,
            map_data,
        })
    }

    fn unmap(&mut self, mapping: BoMapping) {
        // Safe because `map_data` came from gbm_bo_map on this bo.
        unsafe { gbm_bo_unmap(self.0, mapping.map_data) }
    }

    fn as_raw_bo(&self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl Drop for MinigbmBuffer {
    fn drop(&mut self) {
        // This is always safe to call with a valid gbm_bo pointer.
        unsafe { gbm_bo_destroy(self.0) }
    }
}
