// Copyright 2021 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! formats: Android HAL pixel formats, the DRM fourcc formats GBM understands, and the geometry
//! adjustments needed to express one in terms of the other.

use std::fmt;

use crate::checked_arithmetic;
use crate::gralloc_utils::*;

/*
 * Only formats that gralloc callers request are listed.  Everything else is treated as
 * unsupported by the backend.
 */

pub const DRM_FORMAT_RGB565: [u8; 4] = [b'R', b'G', b'1', b'6'];
pub const DRM_FORMAT_RGB888: [u8; 4] = [b'R', b'G', b'2', b'4'];
pub const DRM_FORMAT_GR88: [u8; 4] = [b'G', b'R', b'8', b'8'];

pub const DRM_FORMAT_XBGR8888: [u8; 4] = [b'X', b'B', b'2', b'4'];
pub const DRM_FORMAT_ABGR8888: [u8; 4] = [b'A', b'B', b'2', b'4'];
pub const DRM_FORMAT_ARGB8888: [u8; 4] = [b'A', b'R', b'2', b'4'];

/// A [fourcc](https://en.wikipedia.org/wiki/FourCC) format identifier.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct DrmFormat(pub u32);

impl DrmFormat {
    /// Constructs a format identifer using a fourcc byte sequence.
    #[inline(always)]
    pub fn new(a: u8, b: u8, c: u8, d: u8) -> DrmFormat {
        DrmFormat(a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24)
    }

    #[inline(always)]
    pub fn from_bytes(b: [u8; 4]) -> DrmFormat {
        DrmFormat::new(b[0], b[1], b[2], b[3])
    }

    /// Returns the fourcc code as a sequence of bytes.
    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; 4] {
        let f = self.0;
        [f as u8, (f >> 8) as u8, (f >> 16) as u8, (f >> 24) as u8]
    }

    /// Bytes per pixel of the (single plane) format.
    pub fn bytes_per_pixel(&self) -> GrallocResult<u32> {
        match self.to_bytes() {
            DRM_FORMAT_RGB565 | DRM_FORMAT_GR88 => Ok(2),
            DRM_FORMAT_RGB888 => Ok(3),
            DRM_FORMAT_XBGR8888 | DRM_FORMAT_ABGR8888 | DRM_FORMAT_ARGB8888 => Ok(4),
            _ => Err(GrallocError::UnsupportedFormat(self.0)),
        }
    }
}

impl From<u32> for DrmFormat {
    fn from(u: u32) -> DrmFormat {
        DrmFormat(u)
    }
}

impl From<DrmFormat> for u32 {
    fn from(f: DrmFormat) -> u32 {
        f.0
    }
}

impl fmt::Debug for DrmFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.to_bytes();
        if b.iter().all(u8::is_ascii_graphic) {
            write!(
                f,
                "fourcc({}{}{}{})",
                b[0] as char, b[1] as char, b[2] as char, b[3] as char
            )
        } else {
            write!(
                f,
                "fourcc(0x{:02x}{:02x}{:02x}{:02x})",
                b[0], b[1], b[2], b[3]
            )
        }
    }
}

/// An Android `HAL_PIXEL_FORMAT_*` code, as carried in buffer handles.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct HalFormat(pub u32);

impl HalFormat {
    pub const RGBA_8888: HalFormat = HalFormat(1);
    pub const RGBX_8888: HalFormat = HalFormat(2);
    pub const RGB_888: HalFormat = HalFormat(3);
    pub const RGB_565: HalFormat = HalFormat(4);
    pub const BGRA_8888: HalFormat = HalFormat(5);
    pub const YCBCR_422_SP: HalFormat = HalFormat(0x10);
    pub const YCRCB_420_SP: HalFormat = HalFormat(0x11);
    /// Y plane followed by Cr and Cb planes, 4:2:0 subsampled.
    pub const YV12: HalFormat = HalFormat(0x3231_5659);

    /// Returns the GBM format used to back buffers of this format, or `None` if GBM has no way
    /// of representing it.
    pub fn to_backend_format(self) -> Option<DrmFormat> {
        let fourcc = match self {
            HalFormat::RGBA_8888 => DRM_FORMAT_ABGR8888,
            HalFormat::RGBX_8888 => DRM_FORMAT_XBGR8888,
            HalFormat::RGB_888 => DRM_FORMAT_RGB888,
            HalFormat::RGB_565 => DRM_FORMAT_RGB565,
            HalFormat::BGRA_8888 => DRM_FORMAT_ARGB8888,
            // YV12 is planar, but must be a single buffer so ask for GR88.
            HalFormat::YV12 => DRM_FORMAT_GR88,
            HalFormat::YCBCR_422_SP | HalFormat::YCRCB_420_SP => return None,
            _ => return None,
        };

        Some(DrmFormat::from_bytes(fourcc))
    }

    /// Same as `to_backend_format`, but unsupported formats are an error.
    pub fn backend_format(self) -> GrallocResult<DrmFormat> {
        self.to_backend_format()
            .ok_or(GrallocError::UnsupportedFormat(self.0))
    }

    /// True for formats stored as one backend allocation with a different layout.
    pub fn is_planar(self) -> bool {
        self == HalFormat::YV12
    }

    /// Translates a logical `width` x `height` into the geometry of the backend allocation.
    ///
    /// YV12 is allocated as GR88, so the width is halved since each texel is 16 bits, and the
    /// height grows by half for the U and V planes.  Allocation, import and mapping must all go
    /// through here with the logical values.
    pub fn physical_extent(self, width: u32, height: u32) -> GrallocResult<(u32, u32)> {
        if !self.is_planar() {
            return Ok((width, height));
        }

        let chroma_height = height / 2;
        let physical_height = checked_arithmetic!(height + chroma_height)?;
        Ok((width / 2, physical_height))
    }
}

impl From<u32> for HalFormat {
    fn from(u: u32) -> HalFormat {
        HalFormat(u)
    }
}

impl fmt::Debug for HalFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            HalFormat::RGBA_8888 => "RGBA_8888",
            HalFormat::RGBX_8888 => "RGBX_8888",
            HalFormat::RGB_888 => "RGB_888",
            HalFormat::RGB_565 => "RGB_565",
            HalFormat::BGRA_8888 => "BGRA_8888",
            HalFormat::YCBCR_422_SP => "YCbCr_422_SP",
            HalFormat::YCRCB_420_SP => "YCrCb_420_SP",
            HalFormat::YV12 => "YV12",
            _ => return write!(f, "HalFormat({:#x})", self.0),
        };
        f.write_str(name)
    }
}
