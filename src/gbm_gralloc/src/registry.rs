// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! registry: Maps buffer handles to the buffer objects of this process.
//!
//! A handle owned by this process carries our pid and a key into `buffers`.  A handle from
//! anywhere else is imported on registration and then claimed with a fresh key.  Keys are unique
//! across every registry of the process, so a handle only resolves in the registry that issued
//! its key.

use std::collections::BTreeMap as Map;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use log::debug;

use crate::backend::GbmDevice;
use crate::bo::BufferObject;
use crate::gralloc_os::process_id;
use crate::gralloc_utils::*;
use crate::handle::GrallocHandle;

/// Key 0 marks a handle without a buffer.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// A buffer object shared between the registry and its current users.
pub type SharedBufferObject = Arc<Mutex<BufferObject>>;

/// Locks a buffer object.  A panic while holding the lock does not make the buffer unusable.
pub fn lock_bo(bo: &SharedBufferObject) -> MutexGuard<'_, BufferObject> {
    match bo.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The live buffer objects of this process.
pub struct HandleRegistry {
    buffers: Mutex<Map<u64, SharedBufferObject>>,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        HandleRegistry::new()
    }
}

impl HandleRegistry {
    pub fn new() -> HandleRegistry {
        HandleRegistry {
            buffers: Mutex::new(Map::new()),
        }
    }

    fn buffers(&self) -> MutexGuard<'_, Map<u64, SharedBufferObject>> {
        match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records `bo` as the buffer of `handle` in this process.
    pub fn insert(&self, handle: &mut GrallocHandle, bo: BufferObject) -> SharedBufferObject {
        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        let bo = Arc::new(Mutex::new(bo));
        self.buffers().insert(key, bo.clone());
        handle.set_owner(process_id(), key);
        bo
    }

    /// Returns the buffer object of `handle` if this process owns it.  Never imports.
    pub fn lookup(&self, handle: &GrallocHandle) -> Option<SharedBufferObject> {
        if handle.owner() != process_id() {
            return None;
        }

        self.buffers().get(&handle.data).cloned()
    }

    /// Resolves `handle` to a buffer object of this process.
    ///
    /// Without a device this only checks whether the handle is already owned here.  With a
    /// device, foreign handles are imported and claimed by this process.
    pub fn resolve(
        &self,
        handle: &mut GrallocHandle,
        device: Option<&dyn GbmDevice>,
    ) -> GrallocResult<Option<SharedBufferObject>> {
        if handle.owner() == process_id() {
            return Ok(self.lookup(handle));
        }

        let device = match device {
            Some(device) => device,
            None => return Ok(None),
        };

        debug!(
            "handle: pfd={}, data_owner={}, pid={}",
            handle.prime_fd(),
            handle.owner(),
            process_id()
        );
        let bo = BufferObject::import(device, handle)?;
        Ok(Some(self.insert(handle, bo)))
    }

    /// Makes `handle` usable in this process, importing it if needed.
    pub fn register(&self, handle: &mut GrallocHandle, device: &dyn GbmDevice) -> GrallocResult<()> {
        match self.resolve(handle, Some(device))? {
            Some(_) => Ok(()),
            None => Err(GrallocError::NotRegistered),
        }
    }

    /// Destroys the buffer object of `handle` and detaches the handle from it.
    ///
    /// Fails if the handle is not owned by this registry or the buffer is still locked.  The
    /// buffer object is freed once the last `SharedBufferObject` handed out by `lookup` is dropped.
    pub fn unregister(&self, handle: &mut GrallocHandle) -> GrallocResult<()> {
        let shared = self
            .resolve(handle, None)?
            .ok_or(GrallocError::NotRegistered)?;

        // Held until the entry is gone so nobody can lock the buffer in between.
        let bo = lock_bo(&shared);
        if bo.lock_count() > 0 {
            return Err(GrallocError::BufferLocked(bo.lock_count()));
        }

        self.buffers().remove(&handle.data);
        drop(bo);
        handle.clear_owner();
        Ok(())
    }

    /// Number of live buffer objects.
    pub fn len(&self) -> usize {
        self.buffers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
