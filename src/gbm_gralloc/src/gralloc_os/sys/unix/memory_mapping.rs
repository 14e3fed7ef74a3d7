// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::num::NonZeroUsize;
use std::ptr::NonNull;

use libc::c_void;
use log::error;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;

use crate::gralloc_os::descriptor::SafeDescriptor;
use crate::gralloc_utils::GrallocError;
use crate::gralloc_utils::GrallocResult;
use crate::usage::TransferFlags;

/// Wraps a shared memory mapping in the current process. Provides
/// RAII semantics including munmap when no longer needed.
#[derive(Debug)]
pub struct MemoryMapping {
    pub addr: NonNull<c_void>,
    pub size: usize,
}

// Safe because the mapping is owned exclusively and only unmapped on drop.
unsafe impl Send for MemoryMapping {}

impl Drop for MemoryMapping {
    fn drop(&mut self) {
        // This is safe because we mmap the area at addr ourselves, and nobody
        // else is holding a reference to it.
        if let Err(e) = unsafe { munmap(self.addr, self.size) } {
            error!("failed to unmap {:p}: {}", self.addr, e);
        }
    }
}

impl MemoryMapping {
    pub fn from_safe_descriptor(
        descriptor: &SafeDescriptor,
        size: usize,
        access: TransferFlags,
    ) -> GrallocResult<MemoryMapping> {
        let mut prot = ProtFlags::empty();
        if access.contains(TransferFlags::READ) {
            prot |= ProtFlags::PROT_READ;
        }
        if access.contains(TransferFlags::WRITE) {
            prot |= ProtFlags::PROT_WRITE;
        }
        if prot.is_empty() {
            return Err(GrallocError::InvalidMapping("incorrect access flags"));
        }

        let non_zero_size =
            NonZeroUsize::new(size).ok_or(GrallocError::InvalidMapping("zero size mapping"))?;
        let addr = unsafe {
            mmap(
                None,
                non_zero_size,
                prot,
                MapFlags::MAP_SHARED,
                descriptor,
                0,
            )?
        };
        Ok(MemoryMapping { addr, size })
    }
}
