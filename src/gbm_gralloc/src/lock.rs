// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! lock: Arbitrates CPU and device access to a buffer object.
//!
//! A buffer is either unlocked, or locked `lock_count` times for the union of the usages in
//! `locked_for`.  Nested locks must ask for a subset of what the buffer is already locked for.
//! A CPU mapping exists exactly while the buffer is locked with SW read or write usage.  Nested
//! SW locks share that mapping and must stay inside the region it covers.

use std::ptr::NonNull;

use log::debug;
use log::error;
use log::info;

use crate::backend::BoMapping;
use crate::bo::BufferObject;
use crate::checked_arithmetic;
use crate::gralloc_utils::*;
use crate::handle::GrallocHandle;
use crate::usage::GrallocUsage;
use crate::usage::TransferFlags;

/// Allocation usages that may be locked for any usage.  Lets software renderers draw into
/// framebuffers and textures.
const ANY_LOCK_USAGE: GrallocUsage = GrallocUsage::from_bits_truncate(
    GrallocUsage::SW_READ_OFTEN.bits()
        | GrallocUsage::HW_FB.bits()
        | GrallocUsage::HW_TEXTURE.bits(),
);

impl BufferObject {
    /// Locks the buffer described by `handle` for `usage`.
    ///
    /// Returns the CPU address of the buffer if the lock involves SW access, `None` when the
    /// kernel synchronizes device access on its own.  On error the lock state is unchanged.
    pub fn lock(
        &mut self,
        handle: &GrallocHandle,
        usage: GrallocUsage,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> GrallocResult<Option<NonNull<u8>>> {
        info!("lock bo, cnt={}, usage={:#x}", self.lock_count, usage.bits());

        if !handle.usage.contains(usage) && !handle.usage.intersects(ANY_LOCK_USAGE) {
            error!(
                "bo.usage:{:#x}/usage:{:#x} is not HW_FB or HW_TEXTURE",
                handle.usage.bits(),
                usage.bits()
            );
            return Err(GrallocError::UsageNotPermitted {
                allowed: handle.usage.bits(),
                requested: usage.bits(),
            });
        }

        if self.lock_count > 0 && !self.locked_for.contains(usage) {
            return Err(GrallocError::IncompatibleLock {
                locked_for: self.locked_for.bits(),
                requested: usage.bits(),
            });
        }

        let requested = usage;
        let usage = usage | self.locked_for;
        if usage.cpu_access() {
            let extent = map_extent(handle, x, y, width, height)?;
            if self.mapping.is_none() {
                // The backend waits for the device to be done with the buffer.
                let mapping = self.map(handle, x, y, extent, usage.transfer_flags())?;
                self.mapping = Some(mapping);
                self.mapped_extent = extent;
            } else if requested.cpu_access()
                && (extent.0 > self.mapped_extent.0 || extent.1 > self.mapped_extent.1)
            {
                error!(
                    "bo mapped up to {:?}, can not map up to {:?}",
                    self.mapped_extent, extent
                );
                return Err(GrallocError::DoubleMapping);
            }
        }

        self.lock_count += 1;
        self.locked_for |= usage;

        Ok(self.mapping.as_ref().map(|m| m.addr))
    }

    /// Drops one lock.  Unlocking an unlocked buffer does nothing.
    pub fn unlock(&mut self) {
        if self.lock_count == 0 {
            return;
        }

        self.lock_count -= 1;
        if self.lock_count == 0 {
            if let Some(mapping) = self.mapping.take() {
                self.buffer.unmap(mapping);
            }
            self.mapped_extent = (0, 0);
            self.locked_for = GrallocUsage::empty();
        }
    }

    fn map(
        &mut self,
        handle: &GrallocHandle,
        x: u32,
        y: u32,
        (right, bottom): (u32, u32),
        flags: TransferFlags,
    ) -> GrallocResult<BoMapping> {
        if self.mapping.is_some() {
            return Err(GrallocError::DoubleMapping);
        }

        if handle.format.is_planar() && (x != 0 || y != 0) {
            error!(
                "can't map with offset for planar bo - fmt {:?}",
                handle.format
            );
        }

        let mapping = self.buffer.map(0, 0, right, bottom, flags).map_err(|e| {
            error!("failed to map bo ({}, {})-({}, {}): {}", x, y, right, bottom, e);
            GrallocError::MappingFailed
        })?;
        debug!(
            "mapped bo ({}, {})-({}, {}) at {:p}",
            x, y, right, bottom, mapping.addr
        );

        assert_eq!(
            mapping.stride, handle.stride,
            "mapped stride differs from allocated stride"
        );

        Ok(mapping)
    }
}

/// Physical `(right, bottom)` a lock of `(x, y)`-`(x + width, y + height)` has to map.
fn map_extent(
    handle: &GrallocHandle,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> GrallocResult<(u32, u32)> {
    let (width, height) = handle.format.physical_extent(width, height)?;
    let right = checked_arithmetic!(x + width)?;
    let bottom = checked_arithmetic!(y + height)?;
    Ok((right, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::HalFormat;
    use crate::system_gralloc::SystemGralloc;

    fn allocate(
        width: u32,
        height: u32,
        format: HalFormat,
        usage: GrallocUsage,
    ) -> (GrallocHandle, BufferObject) {
        let device = SystemGralloc::init().unwrap();
        let mut handle = GrallocHandle::new(width, height, format, usage);
        let bo = BufferObject::allocate(device.as_ref(), &mut handle).unwrap();
        (handle, bo)
    }

    #[test]
    fn device_lock_skips_mapping() {
        let (handle, mut bo) = allocate(1920, 1080, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER);

        let addr = bo
            .lock(&handle, GrallocUsage::HW_RENDER, 0, 0, 1920, 1080)
            .unwrap();
        assert!(addr.is_none());
        assert!(!bo.is_mapped());
        assert_eq!(bo.lock_count(), 1);

        bo.unlock();
        assert_eq!(bo.lock_count(), 0);
        assert_eq!(bo.locked_for(), GrallocUsage::empty());
    }

    #[test]
    fn cpu_lock_maps() {
        let (handle, mut bo) = allocate(64, 64, HalFormat::RGBX_8888, GrallocUsage::SW_WRITE_OFTEN);

        let addr = bo
            .lock(&handle, GrallocUsage::SW_WRITE_OFTEN, 0, 0, 64, 64)
            .unwrap()
            .unwrap();
        assert!(bo.is_mapped());
        // Safe because the buffer is mapped read/write and holds 64 * 64 * 4 bytes.
        unsafe { addr.as_ptr().write_bytes(0xff, 64 * 64 * 4) };

        bo.unlock();
        assert!(!bo.is_mapped());
    }

    #[test]
    fn paired_locks_return_to_unlocked() {
        let (handle, mut bo) = allocate(32, 32, HalFormat::RGB_565, GrallocUsage::SW_READ_OFTEN);

        for _ in 0..5 {
            bo.lock(&handle, GrallocUsage::SW_READ_OFTEN, 0, 0, 32, 32)
                .unwrap();
            bo.unlock();
        }

        assert_eq!(bo.lock_count(), 0);
        assert_eq!(bo.locked_for(), GrallocUsage::empty());
        assert!(!bo.is_mapped());
    }

    #[test]
    fn nested_locks_must_be_compatible() {
        let usage = GrallocUsage::SW_READ_OFTEN | GrallocUsage::HW_TEXTURE;
        let (handle, mut bo) = allocate(16, 16, HalFormat::RGBA_8888, usage);

        let first = bo.lock(&handle, usage, 0, 0, 16, 16).unwrap();
        assert!(matches!(
            bo.lock(&handle, GrallocUsage::SW_WRITE_OFTEN, 0, 0, 16, 16),
            Err(GrallocError::IncompatibleLock { .. })
        ));
        assert_eq!(bo.lock_count(), 1);

        let second = bo
            .lock(&handle, GrallocUsage::HW_TEXTURE, 0, 0, 16, 16)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(bo.lock_count(), 2);

        bo.unlock();
        assert!(bo.is_mapped());
        assert_eq!(bo.locked_for(), usage);
        bo.unlock();
        assert!(!bo.is_mapped());
    }

    #[test]
    fn nested_locks_stay_inside_mapping() {
        let (handle, mut bo) = allocate(64, 64, HalFormat::RGBA_8888, GrallocUsage::SW_READ_OFTEN);

        let first = bo
            .lock(&handle, GrallocUsage::SW_READ_OFTEN, 0, 0, 8, 8)
            .unwrap();
        assert!(first.is_some());

        let err = bo
            .lock(&handle, GrallocUsage::SW_READ_OFTEN, 0, 0, 64, 64)
            .unwrap_err();
        assert!(matches!(err, GrallocError::DoubleMapping));
        assert_eq!(err.status(), GrallocStatus::InvalidArgument);
        assert_eq!(bo.lock_count(), 1);

        let inner = bo
            .lock(&handle, GrallocUsage::SW_READ_OFTEN, 2, 2, 4, 4)
            .unwrap();
        assert_eq!(inner, first);
        assert_eq!(bo.lock_count(), 2);

        bo.unlock();
        bo.unlock();
        assert!(!bo.is_mapped());

        // A fresh lock may map a larger region again.
        assert!(bo
            .lock(&handle, GrallocUsage::SW_READ_OFTEN, 0, 0, 64, 64)
            .unwrap()
            .is_some());
        bo.unlock();
    }

    #[test]
    fn unlock_is_idempotent() {
        let (_handle, mut bo) = allocate(8, 8, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER);

        bo.unlock();
        bo.unlock();
        assert_eq!(bo.lock_count(), 0);
    }

    #[test]
    fn usage_must_be_allocated() {
        let (handle, mut bo) = allocate(8, 8, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER);

        let err = bo
            .lock(&handle, GrallocUsage::SW_READ_OFTEN, 0, 0, 8, 8)
            .unwrap_err();
        assert!(matches!(err, GrallocError::UsageNotPermitted { .. }));
        assert_eq!(err.status(), GrallocStatus::InvalidArgument);
        assert_eq!(bo.lock_count(), 0);
    }

    #[test]
    fn framebuffers_lock_for_anything() {
        let (handle, mut bo) = allocate(8, 8, HalFormat::BGRA_8888, GrallocUsage::HW_FB);

        assert!(bo
            .lock(&handle, GrallocUsage::SW_WRITE_OFTEN, 0, 0, 8, 8)
            .unwrap()
            .is_some());
        bo.unlock();
    }

    #[test]
    fn planar_lock() {
        let (handle, mut bo) = allocate(640, 480, HalFormat::YV12, GrallocUsage::SW_WRITE_OFTEN);

        let addr = bo
            .lock(&handle, GrallocUsage::SW_WRITE_OFTEN, 0, 0, 640, 480)
            .unwrap();
        assert!(addr.is_some());
        bo.unlock();
        assert!(!bo.is_mapped());
    }

    #[test]
    fn failed_map_leaves_state() {
        let (handle, mut bo) = allocate(16, 16, HalFormat::RGBA_8888, GrallocUsage::SW_READ_OFTEN);

        let err = bo
            .lock(&handle, GrallocUsage::SW_READ_OFTEN, 8, 8, 16, 16)
            .unwrap_err();
        assert_eq!(err.status(), GrallocStatus::OutOfMemory);
        assert_eq!(bo.lock_count(), 0);
        assert_eq!(bo.locked_for(), GrallocUsage::empty());
        assert!(!bo.is_mapped());
    }
}
