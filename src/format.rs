//! Format negotiation against a device's declared capability set.
//!
//! A device advertises (wire format, resolutions) entries; the session asks
//! for an output format. A pair is supported when some capability covers the
//! resolution and a conversion routine exists from its wire format to the
//! requested output. The negotiator is a pure query layer: it never touches
//! the device.

use crate::capture::convert;
use crate::transport::StreamCapability;
use crate::types::{PixelFormat, Resolution};

/// Query layer over an opened device's capability set.
#[derive(Debug, Clone)]
pub struct FormatNegotiator {
    capabilities: Vec<StreamCapability>,
}

impl FormatNegotiator {
    pub fn new(capabilities: Vec<StreamCapability>) -> Self {
        Self { capabilities }
    }

    /// The raw capability set, as declared by the device.
    pub fn capabilities(&self) -> &[StreamCapability] {
        &self.capabilities
    }

    /// All resolutions available for the requested output format, sorted
    /// and deduplicated across capability entries.
    pub fn supported_resolutions(&self, format: PixelFormat) -> Vec<Resolution> {
        let mut resolutions: Vec<Resolution> = self
            .capabilities
            .iter()
            .filter(|cap| convert::supported(cap.wire_format, format))
            .flat_map(|cap| {
                let wire = cap.wire_format;
                cap.resolutions
                    .iter()
                    .copied()
                    .filter(move |&res| serveable(wire, format, res))
            })
            .collect();
        resolutions.sort();
        resolutions.dedup();
        resolutions
    }

    /// Whether the (output format, resolution) pair can be served.
    pub fn is_supported(&self, format: PixelFormat, resolution: Resolution) -> bool {
        self.select(format, resolution).is_some()
    }

    /// Pick the capability entry serving the pair: the first declared entry
    /// covering the resolution whose wire format converts to the output at
    /// that geometry.
    pub fn select(&self, format: PixelFormat, resolution: Resolution) -> Option<&StreamCapability> {
        self.capabilities
            .iter()
            .find(|cap| cap.supports(resolution) && serveable(cap.wire_format, format, resolution))
    }

    /// Whether a live format change is legal: the running stream's wire
    /// format must convert to the new output at the current resolution. The
    /// wire stream keeps running; only the decoder is reconfigured.
    pub fn supports_live_change(
        &self,
        wire_format: PixelFormat,
        new_format: PixelFormat,
        resolution: Resolution,
    ) -> bool {
        serveable(wire_format, new_format, resolution)
    }
}

/// A pair is serveable when a conversion routine exists and the geometry is
/// legal for both ends; the conversion would reject the frame otherwise, so
/// the negotiator must not offer the pair in the first place.
fn serveable(wire: PixelFormat, out: PixelFormat, resolution: Resolution) -> bool {
    convert::supported(wire, out)
        && convert::geometry_ok(wire, resolution)
        && convert::geometry_ok(out, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator() -> FormatNegotiator {
        FormatNegotiator::new(vec![
            StreamCapability::new(
                PixelFormat::Yuv,
                vec![Resolution::VGA, Resolution::HD],
            ),
            StreamCapability::new(PixelFormat::Nv21, vec![Resolution::VGA]),
        ])
    }

    #[test]
    fn test_supported_resolutions_union() {
        let neg = negotiator();
        // Both wire formats convert to RGBX
        assert_eq!(
            neg.supported_resolutions(PixelFormat::Rgbx),
            vec![Resolution::VGA, Resolution::HD]
        );
    }

    #[test]
    fn test_supported_resolutions_filters_by_conversion() {
        let neg = negotiator();
        // Only the NV21 entry can serve YUV420SP output (chroma swap);
        // there is no YUYV -> YUV420SP routine
        assert_eq!(
            neg.supported_resolutions(PixelFormat::Yuv420sp),
            vec![Resolution::VGA]
        );
    }

    #[test]
    fn test_is_supported() {
        let neg = negotiator();
        assert!(neg.is_supported(PixelFormat::Rgbx, Resolution::HD));
        assert!(neg.is_supported(PixelFormat::Yuv, Resolution::HD));
        assert!(!neg.is_supported(PixelFormat::Yuv420sp, Resolution::HD));
        assert!(!neg.is_supported(PixelFormat::Rgbx, Resolution::new(99, 99)));
    }

    #[test]
    fn test_select_prefers_first_declared_entry() {
        let neg = negotiator();
        let cap = neg.select(PixelFormat::Rgbx, Resolution::VGA).unwrap();
        assert_eq!(cap.wire_format, PixelFormat::Yuv);
    }

    #[test]
    fn test_live_change_follows_wire_format() {
        let neg = negotiator();
        // A YUYV stream can switch its decoder to RAW or RGBX output
        assert!(neg.supports_live_change(PixelFormat::Yuv, PixelFormat::Raw, Resolution::HD));
        assert!(neg.supports_live_change(PixelFormat::Yuv, PixelFormat::Rgbx, Resolution::HD));
        // ...but not to RGB565 (no YUYV -> RGB565 routine)
        assert!(!neg.supports_live_change(
            PixelFormat::Yuv,
            PixelFormat::Rgb565,
            Resolution::HD
        ));
    }

    #[test]
    fn test_odd_width_not_offered_for_packed_wire() {
        // A device advertising an odd-width mode on a YUYV wire must not be
        // offered: the 4:2:2 decoder cannot fill the output buffer
        let neg = FormatNegotiator::new(vec![StreamCapability::new(
            PixelFormat::Yuv,
            vec![Resolution::new(3, 1), Resolution::VGA],
        )]);
        assert!(!neg.is_supported(PixelFormat::Rgbx, Resolution::new(3, 1)));
        assert_eq!(
            neg.supported_resolutions(PixelFormat::Rgbx),
            vec![Resolution::VGA]
        );
    }

    #[test]
    fn test_live_change_rejects_odd_geometry_for_planar() {
        let neg = negotiator();
        assert!(!neg.supports_live_change(
            PixelFormat::Nv21,
            PixelFormat::Rgbx,
            Resolution::new(3, 3)
        ));
    }

    #[test]
    fn test_empty_capability_set() {
        let neg = FormatNegotiator::new(Vec::new());
        assert!(neg.supported_resolutions(PixelFormat::Rgbx).is_empty());
        assert!(!neg.is_supported(PixelFormat::Rgbx, Resolution::VGA));
    }
}
