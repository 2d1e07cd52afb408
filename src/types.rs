//! Core data types: device descriptors, pixel formats, resolutions, frames.

use std::fmt;
use std::sync::Arc;

/// Opaque handle identifying a device within its transport.
///
/// Identifiers are stable while no hardware change occurs; unplugging and
/// replugging a device may yield a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Information about an attached UVC-capable device.
///
/// Immutable once enumerated. A descriptor whose backing device has vanished
/// is stale: later operations on it fail with `DeviceNotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Transport-assigned device handle
    pub id: DeviceId,
    /// Human-readable device name
    pub name: String,
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:04x}:{:04x})",
            self.id, self.name, self.vendor_id, self.product_id
        )
    }
}

/// Pixel format of a decoded frame (or of the wire payload a device emits).
///
/// Each variant fixes the bit depth and channel layout the decoder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit RGBX, 4 bytes per pixel, X byte ignored
    Rgbx,
    /// 16-bit RGB565, little-endian, 2 bytes per pixel
    Rgb565,
    /// Unmodified wire payload, passed through (16 bits per pixel on UVC
    /// uncompressed streams)
    Raw,
    /// Packed YUV 4:2:2 (YUYV byte order), 2 bytes per pixel
    Yuv,
    /// Planar Y followed by interleaved UV (NV12), 12 bits per pixel
    Yuv420sp,
    /// Planar Y followed by interleaved VU, 12 bits per pixel
    Nv21,
}

impl PixelFormat {
    /// All formats a session can request, in the order the original device
    /// interface advertised them.
    pub const ALL: [PixelFormat; 6] = [
        PixelFormat::Rgbx,
        PixelFormat::Rgb565,
        PixelFormat::Raw,
        PixelFormat::Yuv,
        PixelFormat::Yuv420sp,
        PixelFormat::Nv21,
    ];

    /// Bits per pixel for this format.
    ///
    /// The planar 4:2:0 formats carry 12 bits per pixel, so sizes are
    /// computed in bits to keep the math exact.
    pub fn bits_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgbx => 32,
            PixelFormat::Rgb565 => 16,
            PixelFormat::Raw => 16,
            PixelFormat::Yuv => 16,
            PixelFormat::Yuv420sp => 12,
            PixelFormat::Nv21 => 12,
        }
    }

    /// Whole bytes per pixel for the packed formats.
    ///
    /// Returns `None` for the planar 4:2:0 formats, which do not have an
    /// integral per-pixel byte count.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        let bits = self.bits_per_pixel();
        if bits % 8 == 0 {
            Some(bits / 8)
        } else {
            None
        }
    }

    /// Total byte length of one frame at `resolution` in this format.
    pub fn frame_bytes(&self, resolution: Resolution) -> usize {
        resolution.pixel_count() * self.bits_per_pixel() / 8
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgbx => "RGBX",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Raw => "RAW",
            PixelFormat::Yuv => "YUV",
            PixelFormat::Yuv420sp => "YUV420SP",
            PixelFormat::Nv21 => "NV21",
        };
        f.write_str(name)
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// 640x480, the common UVC baseline mode
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// 1280x720, the original interface's default preview size
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::HD
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A published, fully-decoded frame.
///
/// Cloning is cheap: the pixel data is shared and immutable, so a reader can
/// hold a view for as long as it likes without blocking the writer or racing
/// a buffer reuse.
#[derive(Debug, Clone)]
pub struct FrameView {
    /// Monotonically increasing publish counter; identifies a frame version
    pub generation: u64,
    /// Decoded pixel format of `data`
    pub format: PixelFormat,
    /// Frame dimensions
    pub resolution: Resolution,
    /// Decoded pixel data, exactly `format.frame_bytes(resolution)` long
    pub data: Arc<[u8]>,
}

impl FrameView {
    /// Byte length of the pixel data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
