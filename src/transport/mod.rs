//! The USB/UVC transport seam.
//!
//! The transport is a resource provider: it lists attached devices, opens
//! them, and exposes raw transfer chunks from a started stream. Everything
//! protocol-shaped above that (frame assembly, pixel conversion, publishing)
//! lives in the capture pipeline. Keeping this a trait boundary lets the
//! tests drive the whole pipeline through [`mock::MockTransport`].

pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use crate::error::UvcError;
use crate::types::{DeviceDescriptor, PixelFormat, Resolution};

/// One raw transfer completion from the device.
#[derive(Debug, Clone)]
pub struct TransferChunk {
    /// True when this chunk begins a new frame (protocol frame-start marker)
    pub frame_start: bool,
    /// Payload bytes in the stream's wire format
    pub data: Vec<u8>,
}

impl TransferChunk {
    pub fn start(data: Vec<u8>) -> Self {
        Self {
            frame_start: true,
            data,
        }
    }

    pub fn continuation(data: Vec<u8>) -> Self {
        Self {
            frame_start: false,
            data,
        }
    }
}

/// Result of a blocking chunk read that did not fail.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A transfer completed
    Chunk(TransferChunk),
    /// No transfer completed within the timeout (or the wait was
    /// interrupted); the caller should recheck its stop flag
    TimedOut,
}

/// Transfer-level read failures.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A retryable failure (bus error, short transfer); the stream may
    /// still recover
    #[error("transient transfer failure: {0}")]
    Transient(String),

    /// The stream is gone: device unplugged or transfer handle released
    #[error("stream disconnected")]
    Disconnected,
}

/// One (wire format, resolutions) entry of a device's declared capability set.
#[derive(Debug, Clone)]
pub struct StreamCapability {
    /// Format the device emits on the wire for this entry
    pub wire_format: PixelFormat,
    /// Frame sizes the device offers in that format
    pub resolutions: Vec<Resolution>,
}

impl StreamCapability {
    pub fn new(wire_format: PixelFormat, resolutions: Vec<Resolution>) -> Self {
        Self {
            wire_format,
            resolutions,
        }
    }

    pub fn supports(&self, resolution: Resolution) -> bool {
        self.resolutions.contains(&resolution)
    }
}

/// Device listing and opening.
pub trait UsbTransport: Send + Sync {
    /// Enumerate currently attached devices.
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, UvcError>;

    /// Open a device for exclusive use.
    ///
    /// # Errors
    /// * `UvcError::DeviceNotFound` - the descriptor is stale
    /// * `UvcError::Transport` - the transport rejected the open
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, UvcError>;
}

/// An opened device: capability queries and stream start.
///
/// Dropping the handle releases the device.
pub trait DeviceHandle: Send {
    /// The device's declared (wire format, resolutions) capability set.
    fn capabilities(&self) -> Vec<StreamCapability>;

    /// Start the transfer stream in the given wire format and resolution.
    ///
    /// # Errors
    /// * `UvcError::UnsupportedFormat` - the pair is not in the capability set
    /// * `UvcError::Transport` - the stream could not be started
    fn start_stream(
        &mut self,
        wire_format: PixelFormat,
        resolution: Resolution,
    ) -> Result<Box<dyn StreamHandle>, UvcError>;
}

/// A running transfer stream, read from the capture thread.
///
/// Dropping the handle stops the stream and releases the transfer resources.
pub trait StreamHandle: Send {
    /// Block until the next transfer completes, the timeout elapses, or the
    /// wait is interrupted via [`StreamControl::interrupt`].
    fn read_chunk(&mut self, timeout: Duration) -> Result<ReadOutcome, TransferError>;

    /// A control handle usable from outside the capture thread.
    fn control(&self) -> Arc<dyn StreamControl>;
}

/// Out-of-thread control over a blocked stream read.
pub trait StreamControl: Send + Sync {
    /// Wake a read blocked in [`StreamHandle::read_chunk`]; the read returns
    /// [`ReadOutcome::TimedOut`] so the loop can observe its stop flag.
    fn interrupt(&self);

    /// Forcibly release the underlying transfer. Any current or later read
    /// returns [`TransferError::Disconnected`]. Used when the capture thread
    /// fails to quiesce within the stop timeout.
    fn force_release(&self);
}
