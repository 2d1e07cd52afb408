//! Error types shared across the crate.

use crate::session::SessionState;
use crate::types::{DeviceId, PixelFormat, Resolution};

/// Errors surfaced by registry, session, and negotiator operations.
///
/// Per-frame capture problems (dropped or undecodable frames) are not errors:
/// they are recovered locally inside the capture loop and recorded as
/// [`CaptureEvent`](crate::events::CaptureEvent)s. Only the exhaustion of the
/// transport retry budget escalates, as [`UvcError::DeviceLost`].
#[derive(Debug, thiserror::Error)]
pub enum UvcError {
    /// The descriptor is stale or the device was never attached.
    #[error("device {0} not found (stale descriptor or device unplugged)")]
    DeviceNotFound(DeviceId),

    /// Another session already holds the device.
    #[error("device {0} is busy: already held by another session")]
    DeviceBusy(DeviceId),

    /// The operation is not legal in the session's current state.
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation
        operation: &'static str,
        /// The session state at the time of the call
        state: SessionState,
    },

    /// The (resolution, format) pair is not in the device's supported set.
    #[error("unsupported format: {format} at {resolution}")]
    UnsupportedFormat {
        format: PixelFormat,
        resolution: Resolution,
    },

    /// The transport failed repeatedly and the session was force-dropped to
    /// Disconnected.
    #[error("device lost after {attempts} consecutive failed transfers")]
    DeviceLost {
        /// Reads attempted before giving up
        attempts: u32,
    },

    /// The transport rejected an operation outright (open or stream start).
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UvcError::DeviceBusy(DeviceId(2));
        assert_eq!(
            format!("{}", err),
            "device #2 is busy: already held by another session"
        );

        let err = UvcError::UnsupportedFormat {
            format: PixelFormat::Nv21,
            resolution: Resolution::HD,
        };
        assert_eq!(format!("{}", err), "unsupported format: NV21 at 1280x720");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = UvcError::InvalidState {
            operation: "start_preview",
            state: SessionState::Previewing,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("start_preview"));
        assert!(msg.contains("Previewing"));
    }
}
