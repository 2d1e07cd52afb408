//! Session lifecycle for one physical device.
//!
//! A session owns the open/connect/preview lifecycle:
//! `Disconnected -> Connected -> Previewing -> Connected -> Disconnected`.
//! State transitions are the only synchronization exposed to callers; the
//! capture thread is signalled and joined inside `stop_preview`/`disconnect`,
//! bounded by the configured stop timeout.

use std::fmt;
use std::sync::Arc;

use crate::capture::CapturePipeline;
use crate::config::Config;
use crate::error::UvcError;
use crate::events::EventLog;
use crate::format::FormatNegotiator;
use crate::registry::DeviceRegistry;
use crate::sink::{FrameSink, SinkSet};
use crate::slot::FrameSlot;
use crate::transport::DeviceHandle;
use crate::types::{DeviceDescriptor, PixelFormat, Resolution};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Previewing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connected => "Connected",
            SessionState::Previewing => "Previewing",
        };
        f.write_str(name)
    }
}

/// An open connection to one UVC device.
///
/// Created via [`DeviceRegistry::connect`]. Holds the device claim and the
/// transport handle; both are released on every exit path, including error
/// paths and drop. A failed operation leaves the state unchanged, with one
/// exception: once the capture loop declares the device lost, the next
/// operation force-transitions the session to `Disconnected` and returns
/// `DeviceLost`.
pub struct Session {
    registry: DeviceRegistry,
    descriptor: DeviceDescriptor,
    config: Config,
    state: SessionState,
    device: Option<Box<dyn DeviceHandle>>,
    negotiator: FormatNegotiator,
    pipeline: Option<CapturePipeline>,
    slot: Arc<FrameSlot>,
    sinks: SinkSet,
    events: Arc<EventLog>,
    /// Requested output layout; while Previewing this matches the frames
    /// being published
    resolution: Resolution,
    format: PixelFormat,
    /// Wire format of the running stream, while Previewing
    wire_format: Option<PixelFormat>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state)
            .field("resolution", &self.resolution)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect to the device, claiming it for exclusive use.
    ///
    /// # Errors
    /// * `UvcError::DeviceBusy` - another session holds the device
    /// * `UvcError::DeviceNotFound` - the descriptor is stale
    /// * `UvcError::Transport` - the transport rejected the open
    pub(crate) fn connect(
        registry: &DeviceRegistry,
        descriptor: &DeviceDescriptor,
        config: Config,
    ) -> Result<Self, UvcError> {
        registry.claim(descriptor.id)?;

        // From here on the claim must not leak: release it on every error.
        let device = match registry.transport().open(descriptor) {
            Ok(device) => device,
            Err(e) => {
                registry.release(descriptor.id);
                return Err(e);
            }
        };

        let negotiator = FormatNegotiator::new(device.capabilities());
        let resolution = config.preview.resolution();
        let format = config.preview.pixel_format().unwrap_or(PixelFormat::Rgbx);

        log::debug!("connected to {}", descriptor);
        Ok(Self {
            registry: registry.clone(),
            descriptor: descriptor.clone(),
            config,
            state: SessionState::Connected,
            device: Some(device),
            negotiator,
            pipeline: None,
            slot: FrameSlot::new(),
            sinks: SinkSet::new(),
            events: Arc::new(EventLog::new()),
            resolution,
            format,
            wire_format: None,
        })
    }

    /// Start previewing at the given resolution and output format.
    ///
    /// # Errors
    /// * `UvcError::InvalidState` - already Previewing, or Disconnected
    /// * `UvcError::UnsupportedFormat` - the pair is not in the supported set
    /// * `UvcError::DeviceLost` - the device was lost since the last call
    pub fn start_preview(
        &mut self,
        resolution: Resolution,
        format: PixelFormat,
    ) -> Result<(), UvcError> {
        self.check_lost()?;
        if self.state != SessionState::Connected {
            return Err(UvcError::InvalidState {
                operation: "start_preview",
                state: self.state,
            });
        }

        let wire_format = match self.negotiator.select(format, resolution) {
            Some(cap) => cap.wire_format,
            None => return Err(UvcError::UnsupportedFormat { format, resolution }),
        };

        let device = self.device.as_mut().ok_or(UvcError::InvalidState {
            operation: "start_preview",
            state: SessionState::Disconnected,
        })?;
        // On failure nothing was started: state stays Connected.
        let stream = device.start_stream(wire_format, resolution)?;

        self.pipeline = Some(CapturePipeline::spawn(
            stream,
            wire_format,
            format,
            resolution,
            Arc::clone(&self.slot),
            self.sinks.clone(),
            Arc::clone(&self.events),
            &self.config.capture,
        ));
        self.state = SessionState::Previewing;
        self.resolution = resolution;
        self.format = format;
        self.wire_format = Some(wire_format);
        log::debug!(
            "preview started: {} {} over {} wire",
            resolution,
            format,
            wire_format
        );
        Ok(())
    }

    /// Stop previewing. A no-op when not previewing; always succeeds.
    ///
    /// Signals the capture thread and joins it, bounded by the stop timeout;
    /// on timeout the transport is forcibly released and `ForcedStopTimeout`
    /// is recorded, but the session still drops cleanly to Connected. A
    /// pending device loss is absorbed here rather than returned: the caller
    /// wants the preview gone, and teardown delivers exactly that, ending
    /// Disconnected.
    pub fn stop_preview(&mut self) -> Result<(), UvcError> {
        if self.lost_pending() {
            self.teardown();
            return Ok(());
        }
        if self.state != SessionState::Previewing {
            return Ok(());
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        self.wire_format = None;
        self.state = SessionState::Connected;
        log::debug!("preview stopped");
        Ok(())
    }

    /// Change the output pixel format.
    ///
    /// While Previewing this is a live switch: the wire stream keeps
    /// running and only the decoder is reconfigured. While Connected it is
    /// a configuration change recorded for the next preview. On error the
    /// prior format stays active.
    pub fn change_format(&mut self, format: PixelFormat) -> Result<(), UvcError> {
        self.check_lost()?;
        match self.state {
            SessionState::Disconnected => Err(UvcError::InvalidState {
                operation: "change_format",
                state: self.state,
            }),
            SessionState::Connected => {
                if !self.negotiator.is_supported(format, self.resolution) {
                    return Err(UvcError::UnsupportedFormat {
                        format,
                        resolution: self.resolution,
                    });
                }
                self.format = format;
                Ok(())
            }
            SessionState::Previewing => {
                let wire = self.wire_format.expect("previewing implies a wire format");
                if !self
                    .negotiator
                    .supports_live_change(wire, format, self.resolution)
                {
                    return Err(UvcError::UnsupportedFormat {
                        format,
                        resolution: self.resolution,
                    });
                }
                if let Some(pipeline) = &self.pipeline {
                    pipeline.change_format(format);
                }
                self.format = format;
                Ok(())
            }
        }
    }

    /// Change the configured resolution for the next preview.
    ///
    /// Resolution changes are only offered while not previewing; attempting
    /// one while Previewing fails with `InvalidState`.
    pub fn change_resolution(&mut self, resolution: Resolution) -> Result<(), UvcError> {
        self.check_lost()?;
        match self.state {
            SessionState::Connected => {
                if !self.negotiator.is_supported(self.format, resolution) {
                    return Err(UvcError::UnsupportedFormat {
                        format: self.format,
                        resolution,
                    });
                }
                self.resolution = resolution;
                Ok(())
            }
            _ => Err(UvcError::InvalidState {
                operation: "change_resolution",
                state: self.state,
            }),
        }
    }

    /// Resolutions available for the requested output format. A pure query;
    /// legal while Connected or Previewing.
    pub fn supported_resolutions(
        &mut self,
        format: PixelFormat,
    ) -> Result<Vec<Resolution>, UvcError> {
        self.check_lost()?;
        if self.state == SessionState::Disconnected {
            return Err(UvcError::InvalidState {
                operation: "supported_resolutions",
                state: self.state,
            });
        }
        Ok(self.negotiator.supported_resolutions(format))
    }

    /// Disconnect, releasing the capture thread, the transport handle, and
    /// the device claim. Idempotent: always succeeds.
    pub fn disconnect(&mut self) {
        self.teardown();
    }

    /// True while Connected or Previewing and the device has not been lost.
    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected && !self.lost_pending()
    }

    /// True while Previewing and the device has not been lost.
    pub fn is_previewing(&self) -> bool {
        self.state == SessionState::Previewing && !self.lost_pending()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Currently configured output resolution (the active one while
    /// Previewing).
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Currently configured output format (the active one while Previewing).
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The frame handoff slot readers consume. Valid for the lifetime of
    /// the session; empty until the first frame is published.
    pub fn frame_slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    /// Observability events recorded by the capture pipeline.
    pub fn events(&self) -> Arc<EventLog> {
        Arc::clone(&self.events)
    }

    /// Register a consumer that receives every published frame, effective
    /// from the next frame.
    pub fn register_sink(&self, sink: Arc<dyn FrameSink>) {
        self.sinks.register(sink);
    }

    /// Whether the capture loop has declared the device lost but the
    /// session has not yet transitioned.
    fn lost_pending(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| p.is_lost())
    }

    /// Surface a pending device loss: force the transition to Disconnected
    /// and return `DeviceLost`.
    fn check_lost(&mut self) -> Result<(), UvcError> {
        if self.lost_pending() {
            let attempts = self
                .pipeline
                .as_ref()
                .map(|p| p.failed_reads())
                .unwrap_or(0);
            self.teardown();
            return Err(UvcError::DeviceLost { attempts });
        }
        Ok(())
    }

    /// Release everything: pipeline, transport handle, device claim.
    fn teardown(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        self.device = None;
        self.wire_format = None;
        if self.state != SessionState::Disconnected {
            self.registry.release(self.descriptor.id);
            log::debug!("disconnected from {}", self.descriptor);
        }
        self.state = SessionState::Disconnected;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
