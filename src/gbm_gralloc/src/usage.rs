// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! usage: gralloc usage bits and their translation to GBM allocation and transfer flags.

use bitflags::bitflags;

bitflags! {
    /// Android `GRALLOC_USAGE_*` bits describing how a buffer will be accessed.
    ///
    /// The SW read/write values are small enumerations inside their masks, so `*_OFTEN` share
    /// bits with `*_RARELY`.
    #[derive(Default)]
    pub struct GrallocUsage: u32 {
        const SW_READ_RARELY = 0x0000_0002;
        const SW_READ_OFTEN = 0x0000_0003;
        const SW_READ_MASK = 0x0000_000f;
        const SW_WRITE_RARELY = 0x0000_0020;
        const SW_WRITE_OFTEN = 0x0000_0030;
        const SW_WRITE_MASK = 0x0000_00f0;
        const HW_TEXTURE = 0x0000_0100;
        const HW_RENDER = 0x0000_0200;
        const HW_2D = 0x0000_0400;
        const HW_COMPOSER = 0x0000_0800;
        const HW_FB = 0x0000_1000;
        const EXTERNAL_DISP = 0x0000_2000;
        const PROTECTED = 0x0000_4000;
        const CURSOR = 0x0000_8000;
        const HW_VIDEO_ENCODER = 0x0001_0000;
        const HW_CAMERA_WRITE = 0x0002_0000;
        const HW_CAMERA_READ = 0x0004_0000;
        const HW_CAMERA_ZSL = 0x0006_0000;
        const HW_CAMERA_MASK = 0x0006_0000;
        const HW_MASK = 0x0007_1f00;
        const RENDERSCRIPT = 0x0010_0000;
        const FOREIGN_BUFFERS = 0x0020_0000;
        const PRIVATE_0 = 0x1000_0000;
        const PRIVATE_1 = 0x2000_0000;
        const PRIVATE_2 = 0x4000_0000;
        const PRIVATE_3 = 0x8000_0000;
        const PRIVATE_MASK = 0xf000_0000;
    }
}

bitflags! {
    /// `GBM_BO_USE_*` flags passed to the allocator.
    #[derive(Default)]
    pub struct GbmBoFlags: u32 {
        const SCANOUT = 1 << 0;
        const CURSOR = 1 << 1;
        const RENDERING = 1 << 2;
        const WRITE = 1 << 3;
        const LINEAR = 1 << 4;
    }
}

bitflags! {
    /// `GBM_BO_TRANSFER_*` flags used when mapping.
    pub struct TransferFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits | Self::WRITE.bits;
    }
}

/// Cursor planes are never smaller than this in either dimension.
pub const CURSOR_MIN_EXTENT: u32 = 64;

impl GrallocUsage {
    /// Builds usage from raw bits, keeping bits this crate does not know about out of the way.
    pub fn from_raw(raw: u32) -> GrallocUsage {
        GrallocUsage::from_bits_truncate(raw)
    }

    /// Returns the GBM allocation flags implied by this usage.
    pub fn to_backend_bind_flags(self) -> GbmBoFlags {
        let mut bind = GbmBoFlags::empty();

        if self.intersects(GrallocUsage::SW_READ_OFTEN | GrallocUsage::SW_WRITE_OFTEN) {
            bind |= GbmBoFlags::LINEAR;
        }
        // CURSOR usage never requests GBM_BO_USE_CURSOR.
        if self.intersects(GrallocUsage::HW_RENDER | GrallocUsage::HW_TEXTURE) {
            bind |= GbmBoFlags::RENDERING;
        }
        if self.intersects(GrallocUsage::HW_FB) {
            bind |= GbmBoFlags::SCANOUT;
        }

        bind
    }

    /// True if the CPU reads or writes the buffer.
    pub fn cpu_access(self) -> bool {
        self.intersects(GrallocUsage::SW_READ_MASK | GrallocUsage::SW_WRITE_MASK)
    }

    /// Transfer flags for a CPU mapping with this usage.  Mappings are always readable.
    pub fn transfer_flags(self) -> TransferFlags {
        if self.intersects(GrallocUsage::SW_WRITE_MASK) {
            TransferFlags::READ_WRITE
        } else {
            TransferFlags::READ
        }
    }
}
