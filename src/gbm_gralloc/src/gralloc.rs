// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! gralloc: Entry points of the buffer manager, as called by the HAL glue.

use std::env;
use std::path::PathBuf;
use std::ptr::NonNull;

use log::debug;
use log::info;

use crate::backend::GbmDevice;
use crate::bo::BufferObject;
use crate::formats::HalFormat;
use crate::gralloc_utils::*;
use crate::handle::GrallocHandle;
#[cfg(feature = "minigbm")]
use crate::minigbm::MinigbmDevice;
use crate::registry::lock_bo;
use crate::registry::HandleRegistry;
use crate::registry::SharedBufferObject;
#[cfg(not(feature = "minigbm"))]
use crate::system_gralloc::SystemGralloc;
use crate::usage::GrallocUsage;

/// Settings read once when the buffer manager starts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GrallocConfig {
    /// DRM node to allocate from.
    pub device_path: PathBuf,
}

impl Default for GrallocConfig {
    fn default() -> Self {
        GrallocConfig {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
        }
    }
}

impl GrallocConfig {
    /// Reads the device path from the environment, falling back to the default render node.
    pub fn from_env() -> GrallocConfig {
        match env::var_os(DEVICE_PATH_PROPERTY) {
            Some(path) if !path.is_empty() => GrallocConfig {
                device_path: PathBuf::from(path),
            },
            _ => GrallocConfig::default(),
        }
    }
}

/// A buffer manager: one device plus the buffer objects this process has created or imported.
pub struct GbmGralloc {
    device: Box<dyn GbmDevice>,
    registry: HandleRegistry,
}

impl GbmGralloc {
    /// Opens the device named by `config`.  Failure here is fatal to the buffer manager.
    pub fn new(config: &GrallocConfig) -> GrallocResult<GbmGralloc> {
        debug!("opening {:?}", config.device_path);

        #[cfg(feature = "minigbm")]
        let device = MinigbmDevice::open(&config.device_path)?;

        // Without gbm there is no device node to open.
        #[cfg(not(feature = "minigbm"))]
        let device = SystemGralloc::init()?;

        Ok(GbmGralloc::with_device(device))
    }

    /// Returns a buffer manager allocating from `device`.
    pub fn with_device(device: Box<dyn GbmDevice>) -> GbmGralloc {
        info!("using {} allocator", device.name());
        GbmGralloc {
            device,
            registry: HandleRegistry::new(),
        }
    }

    /// The allocator in use.
    pub fn device(&self) -> &dyn GbmDevice {
        self.device.as_ref()
    }

    /// Allocates a buffer and returns a handle registered in this process.
    pub fn create(
        &self,
        width: u32,
        height: u32,
        format: HalFormat,
        usage: GrallocUsage,
    ) -> GrallocResult<GrallocHandle> {
        let mut handle = GrallocHandle::new(width, height, format, usage);
        let bo = BufferObject::allocate(self.device(), &mut handle)?;
        self.registry.insert(&mut handle, bo);
        Ok(handle)
    }

    /// Makes a handle received from elsewhere usable in this process.  Registering a handle
    /// this process already owns does nothing.
    pub fn register(&self, handle: &mut GrallocHandle) -> GrallocResult<()> {
        self.registry.register(handle, self.device())
    }

    /// Releases this process' buffer object behind `handle`.
    pub fn unregister(&self, handle: &mut GrallocHandle) -> GrallocResult<()> {
        self.registry.unregister(handle)
    }

    /// Locks the buffer for `usage`.  Returns its CPU address for SW usage.
    pub fn lock(
        &self,
        handle: &GrallocHandle,
        usage: GrallocUsage,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> GrallocResult<Option<NonNull<u8>>> {
        let shared = self.buffer_object(handle)?;
        let mut bo = lock_bo(&shared);
        bo.lock(handle, usage, x, y, width, height)
    }

    /// Drops one lock taken with `lock`.
    pub fn unlock(&self, handle: &GrallocHandle) -> GrallocResult<()> {
        let bo = self.buffer_object(handle)?;
        lock_bo(&bo).unlock();
        Ok(())
    }

    /// The buffer object behind a handle registered with this manager.  Its `raw_bo()` is the
    /// backend object for submission paths.  Holding on to the result keeps the buffer object
    /// alive past `unregister`.
    pub fn buffer_object(&self, handle: &GrallocHandle) -> GrallocResult<SharedBufferObject> {
        self.registry
            .lookup(handle)
            .ok_or(GrallocError::NotRegistered)
    }

    /// Number of buffer objects alive in this process.
    pub fn num_buffers(&self) -> usize {
        self.registry.len()
    }
}
