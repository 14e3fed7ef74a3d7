// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ptr::NonNull;

use crate::gralloc_os::sys::platform::MemoryMapping as PlatformMapping;
use crate::gralloc_os::SafeDescriptor;
use crate::gralloc_utils::GrallocResult;
use crate::usage::TransferFlags;

/// A CPU mapping of a whole shareable buffer.  Unmapped on drop.
pub struct MemoryMapping {
    mapping: PlatformMapping,
}

impl MemoryMapping {
    pub fn from_safe_descriptor(
        descriptor: &SafeDescriptor,
        size: usize,
        access: TransferFlags,
    ) -> GrallocResult<MemoryMapping> {
        let mapping = PlatformMapping::from_safe_descriptor(descriptor, size, access)?;
        Ok(MemoryMapping { mapping })
    }

    pub fn as_ptr(&self) -> NonNull<u8> {
        self.mapping.addr.cast()
    }
}
