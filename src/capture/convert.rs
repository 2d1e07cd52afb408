//! Fixed per-format pixel conversion routines.
//!
//! The capture pipeline decodes each completed wire frame into the session's
//! requested output format using one of these routines. Every routine
//! validates the payload length first and returns `None` on truncated or
//! malformed input; the caller drops the frame and keeps going.

use crate::types::{PixelFormat, Resolution};

/// Whether a conversion routine exists from `wire` to `out`.
///
/// RAW output is a pass-through and is only offered for 16-bit wire formats,
/// so the published buffer length always matches the RAW layout.
pub fn supported(wire: PixelFormat, out: PixelFormat) -> bool {
    use PixelFormat::*;
    if wire == out {
        return true;
    }
    match (wire, out) {
        (_, Raw) => wire.bits_per_pixel() == 16,
        (Yuv420sp, Rgbx) | (Nv21, Rgbx) | (Yuv, Rgbx) | (Rgb565, Rgbx) => true,
        (Rgbx, Rgb565) => true,
        (Yuv420sp, Nv21) | (Nv21, Yuv420sp) => true,
        _ => false,
    }
}

/// Whether `resolution` is legal geometry for `format`'s chroma subsampling:
/// packed 4:2:2 needs an even width, planar 4:2:0 needs both dimensions even.
pub fn geometry_ok(format: PixelFormat, resolution: Resolution) -> bool {
    match format {
        PixelFormat::Yuv => resolution.width % 2 == 0,
        PixelFormat::Yuv420sp | PixelFormat::Nv21 => {
            resolution.width % 2 == 0 && resolution.height % 2 == 0
        }
        PixelFormat::Rgbx | PixelFormat::Rgb565 | PixelFormat::Raw => true,
    }
}

/// Convert one complete wire frame into the output format.
///
/// Returns `None` when the payload length does not match the wire layout,
/// the dimensions are illegal for a subsampled format, or no routine exists
/// for the pair.
pub fn convert(
    wire: PixelFormat,
    out: PixelFormat,
    resolution: Resolution,
    payload: &[u8],
) -> Option<Vec<u8>> {
    use PixelFormat::*;

    if payload.len() != wire.frame_bytes(resolution) {
        return None;
    }
    if !geometry_ok(wire, resolution) || !geometry_ok(out, resolution) {
        return None;
    }

    if wire == out {
        return Some(payload.to_vec());
    }

    match (wire, out) {
        (_, Raw) if wire.bits_per_pixel() == 16 => Some(payload.to_vec()),
        (Yuv420sp, Rgbx) => Some(planar420_to_rgbx(payload, resolution, UvOrder::UFirst)),
        (Nv21, Rgbx) => Some(planar420_to_rgbx(payload, resolution, UvOrder::VFirst)),
        (Yuv, Rgbx) => Some(yuyv_to_rgbx(payload, resolution)),
        (Rgb565, Rgbx) => Some(rgb565_to_rgbx(payload)),
        (Rgbx, Rgb565) => Some(rgbx_to_rgb565(payload)),
        (Yuv420sp, Nv21) | (Nv21, Yuv420sp) => Some(swap_chroma_order(payload, resolution)),
        _ => None,
    }
}

enum UvOrder {
    UFirst,
    VFirst,
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// BT.601 limited-range YUV to RGB, integer form.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        clamp_u8((298 * c + 409 * e + 128) >> 8),
        clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp_u8((298 * c + 516 * d + 128) >> 8),
    ]
}

/// Y plane followed by interleaved chroma pairs (NV12 when U first, NV21
/// when V first) to 32-bit RGBX.
fn planar420_to_rgbx(payload: &[u8], resolution: Resolution, order: UvOrder) -> Vec<u8> {
    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let y_plane = &payload[..width * height];
    let uv_plane = &payload[width * height..];

    let mut out = Vec::with_capacity(width * height * 4);
    for row in 0..height {
        for col in 0..width {
            let y = y_plane[row * width + col];
            let uv_index = (row / 2) * width + (col / 2) * 2;
            let (u, v) = match order {
                UvOrder::UFirst => (uv_plane[uv_index], uv_plane[uv_index + 1]),
                UvOrder::VFirst => (uv_plane[uv_index + 1], uv_plane[uv_index]),
            };
            let [r, g, b] = yuv_to_rgb(y, u, v);
            out.extend_from_slice(&[r, g, b, 0xff]);
        }
    }
    out
}

/// Packed YUYV 4:2:2 to 32-bit RGBX. Each 4-byte group carries two pixels
/// sharing one chroma pair.
fn yuyv_to_rgbx(payload: &[u8], resolution: Resolution) -> Vec<u8> {
    let mut out = Vec::with_capacity(resolution.pixel_count() * 4);
    for group in payload.chunks_exact(4) {
        let (y0, u, y1, v) = (group[0], group[1], group[2], group[3]);
        let [r, g, b] = yuv_to_rgb(y0, u, v);
        out.extend_from_slice(&[r, g, b, 0xff]);
        let [r, g, b] = yuv_to_rgb(y1, u, v);
        out.extend_from_slice(&[r, g, b, 0xff]);
    }
    out
}

/// Little-endian RGB565 to 32-bit RGBX, replicating the high bits into the
/// low bits so full-scale values map to 255.
fn rgb565_to_rgbx(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() * 2);
    for pair in payload.chunks_exact(2) {
        let pixel = u16::from_le_bytes([pair[0], pair[1]]);
        let r5 = ((pixel >> 11) & 0x1f) as u8;
        let g6 = ((pixel >> 5) & 0x3f) as u8;
        let b5 = (pixel & 0x1f) as u8;
        out.extend_from_slice(&[
            (r5 << 3) | (r5 >> 2),
            (g6 << 2) | (g6 >> 4),
            (b5 << 3) | (b5 >> 2),
            0xff,
        ]);
    }
    out
}

/// 32-bit RGBX to little-endian RGB565.
fn rgbx_to_rgb565(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() / 2);
    for pixel in payload.chunks_exact(4) {
        let r = (pixel[0] as u16 >> 3) << 11;
        let g = (pixel[1] as u16 >> 2) << 5;
        let b = pixel[2] as u16 >> 3;
        out.extend_from_slice(&(r | g | b).to_le_bytes());
    }
    out
}

/// Swap the interleaved chroma byte order of a 4:2:0 planar frame,
/// converting between NV12-style and NV21-style layouts.
fn swap_chroma_order(payload: &[u8], resolution: Resolution) -> Vec<u8> {
    let luma_len = resolution.pixel_count();
    let mut out = payload.to_vec();
    for pair in out[luma_len..].chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}
