// Copyright 2020 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! gralloc_utils: Error taxonomy, status codes and shared constants needed by the rest of the
//! crate.

use std::ffi::NulError;
use std::io::Error as IoError;
use std::num::TryFromIntError;
use std::path::PathBuf;

#[cfg(unix)]
use nix::Error as NixError;
use remain::sorted;
use thiserror::Error;

/// Layout modifier value meaning "no explicit modifier", as defined by drm_fourcc.h.
pub const DRM_FORMAT_MOD_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

/// Device used when nothing else is configured.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/dri/renderD128";

/// Environment variable overriding the device path, the process-wide equivalent of the
/// `gralloc.gbm.device` property.
pub const DEVICE_PATH_PROPERTY: &str = "GRALLOC_GBM_DEVICE";

/// An error generated while using this crate.
#[sorted]
#[derive(Error, Debug)]
pub enum GrallocError {
    /// The backend refused to create a buffer object.
    #[error("failed to create bo, size={width}x{height}, fmt={format:#x}, usage={usage:#x}")]
    AllocationFailed {
        width: u32,
        height: u32,
        format: u32,
        usage: u32,
    },
    /// The buffer is still locked and can not be released.
    #[error("buffer is locked {0} time(s)")]
    BufferLocked(u32),
    /// Checked Arithmetic error
    #[error("arithmetic failed: {}({}) {op} {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedArithmetic {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
        op: &'static str,
    },
    /// The device node was opened but no GBM device could be created on it.
    #[error("failed to create gbm device on {0:?}")]
    DeviceCreateFailed(PathBuf),
    /// The device node could not be opened.
    #[error("failed to open {0:?}: {1}")]
    DeviceOpenFailed(PathBuf, IoError),
    /// A second mapping was requested while one is active.
    #[error("buffer is already mapped")]
    DoubleMapping,
    /// The backend rejected the shareable memory reference.
    #[error("failed to import bo, size={width}x{height}, fmt={format:#x}")]
    ImportFailed { width: u32, height: u32, format: u32 },
    /// A nested lock asked for usage bits the buffer is not locked for.
    #[error("buffer locked for {locked_for:#x}, can not lock for {requested:#x}")]
    IncompatibleLock { locked_for: u32, requested: u32 },
    /// The descriptor is malformed.
    #[error("invalid buffer handle: {0}")]
    InvalidHandle(&'static str),
    /// A mapping request that the backend can not satisfy.
    #[error("invalid mapping: {0}")]
    InvalidMapping(&'static str),
    /// An input/output error occured.
    #[error("an input/output error occur: {0}")]
    IoError(IoError),
    /// The backend returned no address for a mapping.
    #[error("failed to map buffer object")]
    MappingFailed,
    /// The descriptor has no valid shareable memory reference.
    #[error("buffer handle carries no prime fd")]
    MissingPrimeFd,
    /// Nix crate error.
    #[cfg(unix)]
    #[error("The errno is {0}")]
    NixError(NixError),
    /// The descriptor does not resolve to a live buffer in this process.
    #[error("buffer handle is not registered in this process")]
    NotRegistered,
    #[error("Nul Error occured {0}")]
    NulError(NulError),
    /// An attempted integer conversion failed.
    #[error("int conversion failed: {0}")]
    TryFromIntError(TryFromIntError),
    /// The pixel format has no backend representation.
    #[error("unsupported pixel format {0:#x}")]
    UnsupportedFormat(u32),
    /// Lock usage outside of what the buffer was allocated for.
    #[error("bo.usage:{allowed:#x}/usage:{requested:#x} is not HW_FB or HW_TEXTURE")]
    UsageNotPermitted { allowed: u32, requested: u32 },
}

#[cfg(unix)]
impl From<NixError> for GrallocError {
    fn from(e: NixError) -> GrallocError {
        GrallocError::NixError(e)
    }
}

impl From<NulError> for GrallocError {
    fn from(e: NulError) -> GrallocError {
        GrallocError::NulError(e)
    }
}

impl From<IoError> for GrallocError {
    fn from(e: IoError) -> GrallocError {
        GrallocError::IoError(e)
    }
}

impl From<TryFromIntError> for GrallocError {
    fn from(e: TryFromIntError) -> GrallocError {
        GrallocError::TryFromIntError(e)
    }
}

/// The failure classes reported to the HAL layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrallocStatus {
    InvalidArgument,
    OutOfMemory,
    AllocationFailed,
    DeviceOpenFailed,
}

impl GrallocStatus {
    /// Negative status code returned from the HAL entry points.
    pub fn errno(self) -> i32 {
        match self {
            GrallocStatus::InvalidArgument => -libc::EINVAL,
            GrallocStatus::OutOfMemory | GrallocStatus::AllocationFailed => -libc::ENOMEM,
            GrallocStatus::DeviceOpenFailed => -libc::ENODEV,
        }
    }
}

impl GrallocError {
    /// Classifies the error for callers that only understand status codes.
    pub fn status(&self) -> GrallocStatus {
        use GrallocError::*;

        match self {
            BufferLocked(_)
            | DoubleMapping
            | IncompatibleLock { .. }
            | InvalidHandle(_)
            | InvalidMapping(_)
            | MissingPrimeFd
            | NotRegistered
            | UsageNotPermitted { .. } => GrallocStatus::InvalidArgument,
            MappingFailed => GrallocStatus::OutOfMemory,
            DeviceCreateFailed(_) | DeviceOpenFailed(..) => GrallocStatus::DeviceOpenFailed,
            AllocationFailed { .. }
            | CheckedArithmetic { .. }
            | ImportFailed { .. }
            | IoError(_)
            | NulError(_)
            | TryFromIntError(_)
            | UnsupportedFormat(_) => GrallocStatus::AllocationFailed,
            #[cfg(unix)]
            NixError(_) => GrallocStatus::AllocationFailed,
        }
    }

    /// Shorthand for `self.status().errno()`.
    pub fn errno(&self) -> i32 {
        self.status().errno()
    }
}

/// The result of an operation in this crate.
pub type GrallocResult<T> = std::result::Result<T, GrallocError>;
