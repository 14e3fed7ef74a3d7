// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#![cfg(feature = "minigbm")]

use std::ffi::CString;
use std::fs::File;
use std::fs::OpenOptions;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_uint;
#[cfg(target_pointer_width = "64")]
use std::os::raw::c_ulong;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr::null_mut;

use nix::ioctl_readwrite;

use crate::gralloc_utils::GrallocError;
use crate::gralloc_utils::GrallocResult;

// Consistent with __kernel_size_t in include/uapi/asm-generic/posix_types.h.
#[cfg(not(target_pointer_width = "64"))]
#[allow(non_camel_case_types)]
type __kernel_size_t = c_uint;
#[cfg(target_pointer_width = "64")]
#[allow(non_camel_case_types)]
type __kernel_size_t = c_ulong;

const DRM_IOCTL_BASE: c_uint = 0x64;
const DRM_IOCTL_VERSION: c_uint = 0x00;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct drm_version {
    version_major: c_int,
    version_minor: c_int,
    version_patchlevel: c_int,
    name_len: __kernel_size_t,
    name: *mut c_char,
    date_len: __kernel_size_t,
    date: *mut c_char,
    desc_len: __kernel_size_t,
    desc: *mut c_char,
}

impl Default for drm_version {
    fn default() -> Self {
        drm_version {
            version_major: 0,
            version_minor: 0,
            version_patchlevel: 0,
            name_len: 0,
            name: null_mut(),
            date_len: 0,
            date: null_mut(),
            desc_len: 0,
            desc: null_mut(),
        }
    }
}

ioctl_readwrite!(
    drm_get_version,
    DRM_IOCTL_BASE,
    DRM_IOCTL_VERSION,
    drm_version
);

/// Returns the name of the kernel driver behind `fd`, e.g. "i915" or "amdgpu".
pub fn drm_device_name(fd: &File) -> GrallocResult<String> {
    let mut version: drm_version = Default::default();

    // Get the length of the device name.
    unsafe {
        drm_get_version(fd.as_raw_fd(), &mut version)?;
    }

    // Enough bytes to hold the device name and terminating null character.
    let mut name_bytes: Vec<u8> = vec![0; (version.name_len + 1) as usize];
    let mut version = drm_version {
        name_len: name_bytes.len() as __kernel_size_t,
        name: name_bytes.as_mut_ptr() as *mut c_char,
        ..Default::default()
    };

    // Safe as no more than name_len + 1 bytes will be written to name.
    unsafe {
        drm_get_version(fd.as_raw_fd(), &mut version)?;
    }

    let name = CString::new(&name_bytes[..(version.name_len as usize)])?;
    Ok(name.to_string_lossy().into_owned())
}

/// Opens the DRM node at `path` for reading and writing.
pub fn open_device(path: &Path) -> GrallocResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_CLOEXEC)
        .open(path)
        .map_err(|e| GrallocError::DeviceOpenFailed(path.to_path_buf(), e))
}
