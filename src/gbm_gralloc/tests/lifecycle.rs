// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::env;
use std::fs::File;
use std::os::raw::c_void;
use std::os::unix::io::BorrowedFd;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use gbm_gralloc::*;
use zerocopy::AsBytes;

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    imported: AtomicUsize,
    destroyed: AtomicUsize,
    extents: Mutex<Vec<(&'static str, u32, u32)>>,
}

impl Counters {
    fn record(&self, what: &'static str, width: u32, height: u32) {
        self.extents.lock().unwrap().push((what, width, height));
    }

    fn extents(&self, what: &'static str) -> Vec<(u32, u32)> {
        self.extents
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.0 == what)
            .map(|e| (e.1, e.2))
            .collect()
    }

    fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) + self.imported.load(Ordering::SeqCst)
            - self.destroyed.load(Ordering::SeqCst)
    }
}

/// Wraps the system allocator and counts what is asked of it.
struct CountingDevice {
    inner: Box<dyn GbmDevice>,
    counters: Arc<Counters>,
}

impl GbmDevice for CountingDevice {
    fn name(&self) -> &str {
        "counting"
    }

    fn create_buffer(
        &self,
        width: u32,
        height: u32,
        format: DrmFormat,
        flags: GbmBoFlags,
    ) -> GrallocResult<Box<dyn GbmBuffer>> {
        self.counters.record("create", width, height);
        let inner = self.inner.create_buffer(width, height, format, flags)?;
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingBuffer {
            inner,
            counters: self.counters.clone(),
        }))
    }

    fn import_buffer(&self, data: &ImportData) -> GrallocResult<Box<dyn GbmBuffer>> {
        self.counters.record("import", data.width, data.height);
        let inner = self.inner.import_buffer(data)?;
        self.counters.imported.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingBuffer {
            inner,
            counters: self.counters.clone(),
        }))
    }
}

struct CountingBuffer {
    inner: Box<dyn GbmBuffer>,
    counters: Arc<Counters>,
}

impl GbmBuffer for CountingBuffer {
    fn export(&self) -> GrallocResult<GrallocDescriptor> {
        self.inner.export()
    }

    fn stride(&self) -> u32 {
        self.inner.stride()
    }

    fn modifier(&self) -> Option<u64> {
        self.inner.modifier()
    }

    fn map(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        flags: TransferFlags,
    ) -> GrallocResult<BoMapping> {
        self.counters.record("map", width, height);
        self.inner.map(x, y, width, height, flags)
    }

    fn unmap(&mut self, mapping: BoMapping) {
        self.counters.record("unmap", 0, 0);
        self.inner.unmap(mapping)
    }

    fn as_raw_bo(&self) -> *mut c_void {
        self.inner.as_raw_bo()
    }
}

impl Drop for CountingBuffer {
    fn drop(&mut self) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_gralloc() -> (GbmGralloc, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let device = CountingDevice {
        inner: SystemGralloc::init().unwrap(),
        counters: counters.clone(),
    };
    (GbmGralloc::with_device(Box::new(device)), counters)
}

/// Flattens `handle` the way it would cross a binder transaction.
fn transfer(handle: &GrallocHandle) -> (Vec<u8>, GrallocDescriptor) {
    let (wire, fd) = handle.to_wire();
    // Safe because `handle` keeps `fd` open while it is duplicated.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) }
        .try_clone_to_owned()
        .unwrap();
    (wire.as_bytes().to_vec(), fd.into())
}

#[test]
fn allocate_and_destroy_balance() {
    let (gralloc, counters) = counting_gralloc();
    let formats = [
        HalFormat::RGBA_8888,
        HalFormat::RGBX_8888,
        HalFormat::RGB_888,
        HalFormat::RGB_565,
        HalFormat::BGRA_8888,
    ];
    let usages = [
        GrallocUsage::HW_RENDER,
        GrallocUsage::HW_TEXTURE | GrallocUsage::SW_READ_OFTEN,
        GrallocUsage::SW_WRITE_RARELY,
        GrallocUsage::HW_FB | GrallocUsage::HW_COMPOSER,
        GrallocUsage::CURSOR,
    ];

    for format in formats {
        for usage in usages {
            let mut handle = gralloc.create(33, 17, format, usage).unwrap();
            gralloc.unregister(&mut handle).unwrap();
        }
    }

    let total = formats.len() * usages.len();
    assert_eq!(counters.created.load(Ordering::SeqCst), total);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), total);
    assert_eq!(gralloc.num_buffers(), 0);
}

#[test]
fn planar_geometry_matches_everywhere() {
    let (gralloc, counters) = counting_gralloc();

    let handle = gralloc
        .create(640, 480, HalFormat::YV12, GrallocUsage::SW_WRITE_OFTEN)
        .unwrap();
    assert_eq!(counters.extents("create"), vec![(320, 720)]);

    let (bytes, fd) = transfer(&handle);
    let mut remote = GrallocHandle::from_wire(&bytes, Some(fd)).unwrap();
    gralloc.register(&mut remote).unwrap();
    assert_eq!(counters.extents("import"), vec![(320, 720)]);

    gralloc
        .lock(&remote, GrallocUsage::SW_WRITE_OFTEN, 0, 0, 640, 480)
        .unwrap()
        .unwrap();
    assert_eq!(counters.extents("map"), vec![(320, 720)]);
    gralloc.unlock(&remote).unwrap();
    assert_eq!(counters.extents("unmap").len(), 1);
}

#[test]
fn owned_handle_is_not_imported() {
    let (gralloc, counters) = counting_gralloc();

    let mut handle = gralloc
        .create(64, 64, HalFormat::RGBA_8888, GrallocUsage::HW_TEXTURE)
        .unwrap();
    gralloc.register(&mut handle).unwrap();
    gralloc
        .lock(&handle, GrallocUsage::HW_TEXTURE, 0, 0, 64, 64)
        .unwrap();
    gralloc.unlock(&handle).unwrap();

    assert_eq!(counters.imported.load(Ordering::SeqCst), 0);
    assert_eq!(counters.live(), 1);
}

#[test]
fn cross_process_import() {
    let (gralloc, counters) = counting_gralloc();

    let usage = GrallocUsage::SW_READ_OFTEN | GrallocUsage::SW_WRITE_OFTEN;
    let handle = gralloc
        .create(100, 20, HalFormat::RGB_565, usage)
        .unwrap();

    // What another process would see: a descriptor whose owner fields are not ours.
    let (bytes, fd) = transfer(&handle);
    let mut wire = GrallocHandleWire::default();
    wire.as_bytes_mut().copy_from_slice(&bytes);
    assert_eq!(wire.data_owner, 0);
    assert_eq!(wire.data, 0);
    wire.data_owner = process_id().wrapping_add(1);
    wire.data = 0xdead_beef;

    let mut remote = GrallocHandle::from_wire(wire.as_bytes(), Some(fd)).unwrap();
    assert_eq!(remote.owner(), 0);
    assert!(gralloc.buffer_object(&remote).is_err());

    gralloc.register(&mut remote).unwrap();
    assert_eq!(remote.owner(), process_id());
    assert_eq!(
        (remote.width, remote.height, remote.format, remote.stride),
        (handle.width, handle.height, handle.format, handle.stride)
    );
    assert_eq!(counters.imported.load(Ordering::SeqCst), 1);

    let local = gralloc.buffer_object(&handle).unwrap();
    let imported = gralloc.buffer_object(&remote).unwrap();
    assert!(!Arc::ptr_eq(&local, &imported));

    let src = gralloc
        .lock(&handle, GrallocUsage::SW_WRITE_OFTEN, 0, 0, 100, 20)
        .unwrap()
        .unwrap();
    // Safe because the lock mapped the buffer for writing.
    unsafe { src.as_ptr().write_bytes(0x3c, 200) };
    gralloc.unlock(&handle).unwrap();

    let dst = gralloc
        .lock(&remote, GrallocUsage::SW_READ_OFTEN, 0, 0, 100, 20)
        .unwrap()
        .unwrap();
    // Safe because the lock mapped the buffer for reading.
    assert_eq!(unsafe { dst.as_ptr().add(199).read() }, 0x3c);
    gralloc.unlock(&remote).unwrap();
}

#[test]
fn register_without_memory_fails() {
    let (gralloc, counters) = counting_gralloc();
    let handle = gralloc
        .create(16, 16, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER)
        .unwrap();
    let (bytes, _) = transfer(&handle);

    let mut remote = GrallocHandle::from_wire(&bytes, None).unwrap();
    assert!(remote.prime_fd() < 0);
    let err = gralloc.register(&mut remote).unwrap_err();
    assert_eq!(err.status(), GrallocStatus::InvalidArgument);
    assert_eq!(remote.owner(), 0);

    let null = GrallocDescriptor::from(File::open("/dev/null").unwrap());
    let mut remote = GrallocHandle::from_wire(&bytes, Some(null)).unwrap();
    let err = gralloc.register(&mut remote).unwrap_err();
    assert_eq!(err.status(), GrallocStatus::AllocationFailed);
    assert_eq!(remote.owner(), 0);

    assert_eq!(counters.imported.load(Ordering::SeqCst), 0);
    assert_eq!(gralloc.num_buffers(), 1);
}

#[test]
fn descriptor_magic_is_checked() {
    let (gralloc, _) = counting_gralloc();
    let handle = gralloc
        .create(16, 16, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER)
        .unwrap();
    let (mut bytes, fd) = transfer(&handle);

    bytes[12] ^= 0xff;
    let err = GrallocHandle::from_wire(&bytes, Some(fd)).unwrap_err();
    assert!(matches!(err, GrallocError::InvalidHandle(_)));
    assert_eq!(err.errno(), -libc::EINVAL);
}

#[test]
fn render_target_scenario() {
    let (gralloc, counters) = counting_gralloc();

    let mut handle = gralloc
        .create(1920, 1080, HalFormat::RGBA_8888, GrallocUsage::HW_RENDER)
        .unwrap();
    assert_eq!((handle.width, handle.height), (1920, 1080));
    assert!(handle.stride >= 1920 * 4);

    gralloc
        .lock(&handle, GrallocUsage::HW_RENDER, 0, 0, 1920, 1080)
        .unwrap();
    {
        let bo = gralloc.buffer_object(&handle).unwrap();
        assert_eq!(lock_bo(&bo).lock_count(), 1);
    }
    assert!(matches!(
        gralloc.unregister(&mut handle),
        Err(GrallocError::BufferLocked(1))
    ));

    gralloc.unlock(&handle).unwrap();
    gralloc.unlock(&handle).unwrap();
    {
        let bo = gralloc.buffer_object(&handle).unwrap();
        assert_eq!(lock_bo(&bo).lock_count(), 0);
    }
    assert!(counters.extents("map").is_empty());

    gralloc.unregister(&mut handle).unwrap();
    assert_eq!(counters.live(), 0);
}

#[test]
fn config_from_env() {
    env::set_var(DEVICE_PATH_PROPERTY, "/dev/dri/renderD129");
    assert_eq!(
        GrallocConfig::from_env().device_path.to_str(),
        Some("/dev/dri/renderD129")
    );

    env::remove_var(DEVICE_PATH_PROPERTY);
    assert_eq!(GrallocConfig::from_env(), GrallocConfig::default());

    // Only succeeds where a render node is present when built with gbm.
    if let Ok(gralloc) = GbmGralloc::new(&GrallocConfig::default()) {
        let mut handle = gralloc
            .create(64, 64, HalFormat::RGBA_8888, GrallocUsage::HW_TEXTURE)
            .unwrap();
        gralloc.unregister(&mut handle).unwrap();
    }
}
