//! Observability events recorded by the capture pipeline.
//!
//! Per-frame problems never interrupt the capture loop; they are recorded
//! here so callers can inspect what happened after the fact.

use std::fmt;
use std::sync::Mutex;

/// Why a frame was discarded instead of published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A frame-start marker arrived while the previous frame was incomplete
    RestartMarker,
    /// Payload exceeded the expected frame size for the current layout
    Overrun,
    /// The wire payload could not be converted to the requested format
    ConversionFailed,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DropReason::RestartMarker => "restart marker before completion",
            DropReason::Overrun => "payload overran frame size",
            DropReason::ConversionFailed => "pixel conversion failed",
        };
        f.write_str(name)
    }
}

/// A non-fatal event observed by the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A frame was discarded without being published
    FrameDropped(DropReason),
    /// `stop()` timed out waiting for the capture thread and forcibly
    /// released the transport
    ForcedStopTimeout,
    /// The transport retry budget was exhausted and the session dropped to
    /// Disconnected
    DeviceLost,
}

/// Shared event recorder, written by the capture thread and read by callers.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<CaptureEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Never blocks the capture loop for long: the lock is
    /// only held for the push.
    pub fn record(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::FrameDropped(reason) => log::debug!("frame dropped: {}", reason),
            CaptureEvent::ForcedStopTimeout => {
                log::warn!("capture thread did not quiesce in time; transport force-released")
            }
            CaptureEvent::DeviceLost => log::warn!("transport retry budget exhausted; device lost"),
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Take all recorded events, clearing the log.
    pub fn drain(&self) -> Vec<CaptureEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }

    /// Number of recorded events matching `event`.
    pub fn count(&self, event: CaptureEvent) -> usize {
        match self.events.lock() {
            Ok(events) => events.iter().filter(|e| **e == event).count(),
            Err(_) => 0,
        }
    }

    /// Number of dropped frames, regardless of reason.
    pub fn dropped_frames(&self) -> usize {
        match self.events.lock() {
            Ok(events) => events
                .iter()
                .filter(|e| matches!(e, CaptureEvent::FrameDropped(_)))
                .count(),
            Err(_) => 0,
        }
    }
}
