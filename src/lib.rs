//! UVC frame-acquisition and buffer-handoff pipeline.
//!
//! This crate implements the capture core a camera preview UI sits on top
//! of: enumerate UVC devices, connect to one, negotiate a (resolution,
//! pixel format) pair, run a capture thread that reassembles and decodes
//! raw transfer chunks, and hand completed frames to consumers through a
//! latest-wins [`FrameSlot`].
//!
//! ```no_run
//! use uvc_stream::transport::mock::MockTransport;
//! use uvc_stream::{DeviceRegistry, PixelFormat, Resolution};
//!
//! # fn main() -> Result<(), uvc_stream::UvcError> {
//! let transport = MockTransport::new();
//! let registry = DeviceRegistry::new(transport);
//!
//! let devices = registry.enumerate()?;
//! let mut session = registry.connect(&devices[0])?;
//! session.start_preview(Resolution::HD, PixelFormat::Rgbx)?;
//!
//! let slot = session.frame_slot();
//! if let Some(frame) = slot.read_latest() {
//!     println!("generation {}: {} bytes", frame.generation, frame.len());
//! }
//!
//! session.stop_preview()?;
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod registry;
pub mod session;
pub mod sink;
pub mod slot;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::UvcError;
pub use events::{CaptureEvent, DropReason, EventLog};
pub use format::FormatNegotiator;
pub use registry::DeviceRegistry;
pub use session::{Session, SessionState};
pub use sink::FrameSink;
pub use slot::FrameSlot;
pub use types::{DeviceDescriptor, DeviceId, FrameView, PixelFormat, Resolution};
