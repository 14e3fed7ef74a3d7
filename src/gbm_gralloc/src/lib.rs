// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A crate for allocating, sharing and CPU mapping Android graphics buffers on top of GBM.
//! This is based on "gralloc", a well-known Android hardware abstaction layer (HAL).
//!
//! <https://source.android.com/devices/graphics/arch-bq-gralloc>

mod backend;
mod bo;
mod formats;
mod gralloc;
mod gralloc_os;
mod gralloc_utils;
mod handle;
mod lock;
mod macros;
mod minigbm;
mod minigbm_bindings;
mod registry;
mod rendernode;
mod system_gralloc;
mod usage;

pub use crate::backend::BoMapping;
pub use crate::backend::GbmBuffer;
pub use crate::backend::GbmDevice;
pub use crate::backend::ImportData;
pub use crate::bo::BufferObject;
pub use crate::formats::DrmFormat;
pub use crate::formats::HalFormat;
pub use crate::gralloc::GbmGralloc;
pub use crate::gralloc::GrallocConfig;
pub use crate::gralloc_os::process_id;
pub use crate::gralloc_os::AsRawDescriptor;
pub use crate::gralloc_os::FromRawDescriptor as GrallocFromRawDescriptor;
pub use crate::gralloc_os::IntoRawDescriptor as GrallocIntoRawDescriptor;
pub use crate::gralloc_os::RawDescriptor;
pub use crate::gralloc_os::SafeDescriptor as GrallocDescriptor;
pub use crate::gralloc_utils::*;
pub use crate::handle::GrallocHandle;
pub use crate::handle::GrallocHandleWire;
pub use crate::handle::GRALLOC_GBM_HANDLE_MAGIC;
pub use crate::handle::GRALLOC_GBM_HANDLE_NUM_FDS;
pub use crate::handle::GRALLOC_GBM_HANDLE_NUM_INTS;
#[cfg(feature = "minigbm")]
pub use crate::minigbm::MinigbmDevice;
pub use crate::registry::lock_bo;
pub use crate::registry::HandleRegistry;
pub use crate::registry::SharedBufferObject;
pub use crate::system_gralloc::SystemGralloc;
pub use crate::usage::GbmBoFlags;
pub use crate::usage::GrallocUsage;
pub use crate::usage::TransferFlags;
