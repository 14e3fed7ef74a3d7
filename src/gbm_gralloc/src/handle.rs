// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! handle: The buffer handle passed between processes.
//!
//! On the wire a handle is a `native_handle_t` style record: a header with the counts of fds and
//! ints, the single prime fd, and the ints laid out in `GrallocHandleWire`.  The owner pid and
//! data key are only meaningful inside the process that registered the handle and are zeroed
//! whenever the handle is flattened.

use std::mem::size_of;

use zerocopy::AsBytes;
use zerocopy::FromBytes;

use crate::formats::HalFormat;
use crate::gralloc_os::AsRawDescriptor;
use crate::gralloc_os::RawDescriptor;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_utils::*;
use crate::usage::GrallocUsage;

/// Identifies a handle created by this crate ("_GBM").
pub const GRALLOC_GBM_HANDLE_MAGIC: u32 = 0x5f47_424d;

/// Size of the `native_handle_t` header: version, numFds, numInts.
pub const NATIVE_HANDLE_HEADER_SIZE: u32 = 12;

/// Number of fds attached to a handle.
pub const GRALLOC_GBM_HANDLE_NUM_FDS: u32 = 1;

/// Number of ints following the header.
pub const GRALLOC_GBM_HANDLE_NUM_INTS: u32 =
    (size_of::<GrallocHandleWire>() as u32 - NATIVE_HANDLE_HEADER_SIZE) / 4;

/// Flattened form of a `GrallocHandle`, excluding the fd.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, AsBytes, FromBytes)]
pub struct GrallocHandleWire {
    pub version: u32,
    pub num_fds: u32,
    pub num_ints: u32,
    pub magic: u32,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub usage: u32,
    pub stride: u32,
    pub data_owner: i32,
    pub modifier: u64,
    pub data: u64,
}

/// A buffer handle.  Describes the shape of a buffer and carries its prime fd.
///
/// `data_owner` and `data` tie the handle to the `BufferObject` of the process that last created
/// or imported it.  They are never trusted in any other process.
#[derive(Debug)]
pub struct GrallocHandle {
    pub width: u32,
    pub height: u32,
    pub format: HalFormat,
    pub usage: GrallocUsage,
    pub stride: u32,
    pub modifier: u64,
    pub(crate) prime_fd: Option<SafeDescriptor>,
    pub(crate) data_owner: i32,
    pub(crate) data: u64,
}

impl GrallocHandle {
    /// Returns a handle describing a buffer that has not been allocated yet.
    pub fn new(width: u32, height: u32, format: HalFormat, usage: GrallocUsage) -> GrallocHandle {
        GrallocHandle {
            width,
            height,
            format,
            usage,
            stride: 0,
            modifier: DRM_FORMAT_MOD_INVALID,
            prime_fd: None,
            data_owner: 0,
            data: 0,
        }
    }

    /// The layout modifier, if the allocator reported one.
    pub fn modifier(&self) -> Option<u64> {
        match self.modifier {
            DRM_FORMAT_MOD_INVALID => None,
            m => Some(m),
        }
    }

    /// The prime fd backing the buffer, or a negative value if there is none.
    pub fn prime_fd(&self) -> RawDescriptor {
        self.prime_fd
            .as_ref()
            .map(|fd| fd.as_raw_descriptor())
            .unwrap_or(-1)
    }

    /// Pid of the process holding the live buffer, or 0.
    pub fn owner(&self) -> i32 {
        self.data_owner
    }

    pub(crate) fn set_owner(&mut self, owner: i32, data: u64) {
        self.data_owner = owner;
        self.data = data;
    }

    pub(crate) fn clear_owner(&mut self) {
        self.set_owner(0, 0);
    }

    /// Duplicates the handle and its fd.  The copy is not registered anywhere.
    pub fn try_clone(&self) -> GrallocResult<GrallocHandle> {
        let prime_fd = match &self.prime_fd {
            Some(fd) => Some(fd.try_clone()?),
            None => None,
        };

        Ok(GrallocHandle {
            width: self.width,
            height: self.height,
            format: self.format,
            usage: self.usage,
            stride: self.stride,
            modifier: self.modifier,
            prime_fd,
            data_owner: 0,
            data: 0,
        })
    }

    /// Flattens the handle for transport.  The returned fd stays owned by `self`.
    pub fn to_wire(&self) -> (GrallocHandleWire, RawDescriptor) {
        let wire = GrallocHandleWire {
            version: NATIVE_HANDLE_HEADER_SIZE,
            num_fds: GRALLOC_GBM_HANDLE_NUM_FDS,
            num_ints: GRALLOC_GBM_HANDLE_NUM_INTS,
            magic: GRALLOC_GBM_HANDLE_MAGIC,
            width: self.width,
            height: self.height,
            format: self.format.0,
            usage: self.usage.bits(),
            stride: self.stride,
            data_owner: 0,
            modifier: self.modifier,
            data: 0,
        };

        (wire, self.prime_fd())
    }

    /// Rebuilds a handle from its flattened form, taking ownership of `prime_fd`.
    ///
    /// The magic is checked before anything else is looked at.  Owner and data fields from the
    /// wire are dropped; the handle has to be registered in this process before use.
    pub fn from_wire(bytes: &[u8], prime_fd: Option<SafeDescriptor>) -> GrallocResult<GrallocHandle> {
        let wire = GrallocHandleWire::read_from(bytes)
            .ok_or(GrallocError::InvalidHandle("wrong handle size"))?;

        if wire.magic != GRALLOC_GBM_HANDLE_MAGIC {
            return Err(GrallocError::InvalidHandle("bad magic"));
        }

        if wire.version != NATIVE_HANDLE_HEADER_SIZE
            || wire.num_fds != GRALLOC_GBM_HANDLE_NUM_FDS
            || wire.num_ints != GRALLOC_GBM_HANDLE_NUM_INTS
        {
            return Err(GrallocError::InvalidHandle("unexpected native handle layout"));
        }

        Ok(GrallocHandle {
            width: wire.width,
            height: wire.height,
            format: HalFormat(wire.format),
            usage: GrallocUsage::from_raw(wire.usage),
            stride: wire.stride,
            modifier: wire.modifier,
            prime_fd,
            data_owner: 0,
            data: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gralloc_os::SharedMemory;

    fn shm_fd() -> SafeDescriptor {
        SharedMemory::new("handle_test", 4096).unwrap().into()
    }

    #[test]
    fn wire_layout() {
        assert_eq!(size_of::<GrallocHandleWire>(), 56);
        assert_eq!(GRALLOC_GBM_HANDLE_NUM_INTS, 11);
    }

    #[test]
    fn flatten_and_rebuild() {
        let mut handle = GrallocHandle::new(
            64,
            32,
            HalFormat::RGBX_8888,
            GrallocUsage::HW_TEXTURE | GrallocUsage::SW_READ_RARELY,
        );
        handle.stride = 256;
        handle.prime_fd = Some(shm_fd());
        handle.set_owner(1234, 7);

        let (wire, fd) = handle.to_wire();
        assert_eq!(wire.magic, GRALLOC_GBM_HANDLE_MAGIC);
        assert_eq!(wire.data_owner, 0);
        assert_eq!(wire.data, 0);
        assert!(fd >= 0);

        let received = handle.prime_fd.as_ref().unwrap().try_clone().unwrap();
        let rebuilt = GrallocHandle::from_wire(wire.as_bytes(), Some(received)).unwrap();
        assert_eq!(rebuilt.width, 64);
        assert_eq!(rebuilt.height, 32);
        assert_eq!(rebuilt.format, HalFormat::RGBX_8888);
        assert_eq!(rebuilt.usage, handle.usage);
        assert_eq!(rebuilt.stride, 256);
        assert_eq!(rebuilt.modifier(), None);
        assert_eq!(rebuilt.owner(), 0);
        assert_ne!(rebuilt.prime_fd(), fd);
    }

    #[test]
    fn reject_foreign_handles() {
        let handle = GrallocHandle::new(1, 1, HalFormat::RGB_565, GrallocUsage::HW_RENDER);
        let (mut wire, _) = handle.to_wire();

        assert!(matches!(
            GrallocHandle::from_wire(&wire.as_bytes()[..40], None),
            Err(GrallocError::InvalidHandle(_))
        ));

        wire.magic = 0xdead_beef;
        assert!(matches!(
            GrallocHandle::from_wire(wire.as_bytes(), None),
            Err(GrallocError::InvalidHandle("bad magic"))
        ));

        wire.magic = GRALLOC_GBM_HANDLE_MAGIC;
        wire.num_fds = 2;
        assert!(GrallocHandle::from_wire(wire.as_bytes(), None).is_err());
    }

    #[test]
    fn clone_is_unowned() {
        let mut handle = GrallocHandle::new(8, 8, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER);
        handle.prime_fd = Some(shm_fd());
        handle.set_owner(42, 3);

        let copy = handle.try_clone().unwrap();
        assert_eq!(copy.owner(), 0);
        assert_eq!(copy.data, 0);
        assert!(copy.prime_fd() >= 0);
        assert_ne!(copy.prime_fd(), handle.prime_fd());
    }
}
