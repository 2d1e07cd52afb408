//! Scripted in-memory transport for tests.
//!
//! `MockTransport` plays the role of the USB stack: tests attach devices
//! with declared capabilities, feed transfer chunks or injected errors
//! through a [`MockDeviceControl`], unplug devices to make descriptors
//! stale, and switch a stream into an unresponsive mode that ignores both
//! read timeouts and interrupts to exercise the forced-stop path.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{
    DeviceHandle, ReadOutcome, StreamCapability, StreamControl, StreamHandle, TransferChunk,
    TransferError, UsbTransport,
};
use crate::error::UvcError;
use crate::types::{DeviceDescriptor, DeviceId, PixelFormat, Resolution};

/// One scripted read result.
#[derive(Debug)]
enum ScriptItem {
    Chunk(TransferChunk),
    TransientError(String),
}

#[derive(Debug, Default)]
struct StreamQueue {
    script: VecDeque<ScriptItem>,
    /// One-shot wake flag set by `interrupt`
    interrupted: bool,
    /// Set by `force_release` or by dropping the stream handle
    closed: bool,
    /// While set, reads ignore timeouts and interrupts entirely
    unresponsive: bool,
}

#[derive(Debug, Default)]
struct StreamShared {
    queue: Mutex<StreamQueue>,
    cond: Condvar,
}

/// Per-device state shared by open handles and the test-side control.
///
/// `current` always points at the queue of the most recently started stream;
/// a stale handle from an earlier stream keeps (and closes) its own queue.
#[derive(Debug, Default)]
struct DeviceShared {
    current: Mutex<Arc<StreamShared>>,
}

struct MockDevice {
    descriptor: DeviceDescriptor,
    capabilities: Vec<StreamCapability>,
    shared: Arc<DeviceShared>,
}

/// In-memory transport holding scripted devices.
#[derive(Default)]
pub struct MockTransport {
    devices: Mutex<Vec<MockDevice>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a device and get the control used to feed its stream.
    pub fn add_device(
        &self,
        id: u64,
        name: &str,
        capabilities: Vec<StreamCapability>,
    ) -> MockDeviceControl {
        let shared = Arc::new(DeviceShared::default());
        let control = MockDeviceControl {
            shared: Arc::clone(&shared),
        };
        let mut devices = self.devices.lock().unwrap();
        devices.push(MockDevice {
            descriptor: DeviceDescriptor {
                id: DeviceId(id),
                name: name.to_string(),
                vendor_id: 0x1d6b,
                product_id: 0x0102,
            },
            capabilities,
            shared,
        });
        control
    }

    /// Unplug a device: descriptors pointing at it become stale.
    pub fn remove_device(&self, id: DeviceId) {
        let mut devices = self.devices.lock().unwrap();
        devices.retain(|d| d.descriptor.id != id);
    }
}

impl UsbTransport for MockTransport {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, UvcError> {
        let devices = self.devices.lock().unwrap();
        Ok(devices.iter().map(|d| d.descriptor.clone()).collect())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, UvcError> {
        let devices = self.devices.lock().unwrap();
        let device = devices
            .iter()
            .find(|d| d.descriptor.id == descriptor.id)
            .ok_or(UvcError::DeviceNotFound(descriptor.id))?;
        Ok(Box::new(MockDeviceHandle {
            capabilities: device.capabilities.clone(),
            shared: Arc::clone(&device.shared),
        }))
    }
}

struct MockDeviceHandle {
    capabilities: Vec<StreamCapability>,
    shared: Arc<DeviceShared>,
}

impl DeviceHandle for MockDeviceHandle {
    fn capabilities(&self) -> Vec<StreamCapability> {
        self.capabilities.clone()
    }

    fn start_stream(
        &mut self,
        wire_format: PixelFormat,
        resolution: Resolution,
    ) -> Result<Box<dyn StreamHandle>, UvcError> {
        let supported = self
            .capabilities
            .iter()
            .any(|c| c.wire_format == wire_format && c.supports(resolution));
        if !supported {
            return Err(UvcError::UnsupportedFormat {
                format: wire_format,
                resolution,
            });
        }
        // Each started stream gets a fresh queue so a stale handle from an
        // earlier (possibly force-stopped) stream cannot close it. Chunks
        // fed before the start carry over.
        let stream = Arc::new(StreamShared::default());
        {
            let mut current = self.shared.current.lock().unwrap();
            let script = std::mem::take(&mut current.queue.lock().unwrap().script);
            stream.queue.lock().unwrap().script = script;
            *current = Arc::clone(&stream);
        }
        Ok(Box::new(MockStream { shared: stream }))
    }
}

struct MockStream {
    shared: Arc<StreamShared>,
}

impl StreamHandle for MockStream {
    fn read_chunk(&mut self, timeout: Duration) -> Result<ReadOutcome, TransferError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock().unwrap();
        loop {
            if queue.closed {
                return Err(TransferError::Disconnected);
            }
            if !queue.unresponsive {
                if let Some(item) = queue.script.pop_front() {
                    return match item {
                        ScriptItem::Chunk(chunk) => Ok(ReadOutcome::Chunk(chunk)),
                        ScriptItem::TransientError(msg) => Err(TransferError::Transient(msg)),
                    };
                }
                if queue.interrupted {
                    queue.interrupted = false;
                    return Ok(ReadOutcome::TimedOut);
                }
                let now = Instant::now();
                if now >= deadline {
                    return Ok(ReadOutcome::TimedOut);
                }
                let (guard, _) = self
                    .shared
                    .cond
                    .wait_timeout(queue, deadline - now)
                    .unwrap();
                queue = guard;
            } else {
                // Simulates a transfer that never completes: only
                // force_release (or leaving unresponsive mode) gets us out.
                queue = self.shared.cond.wait(queue).unwrap();
            }
        }
    }

    fn control(&self) -> Arc<dyn StreamControl> {
        Arc::new(MockStreamControl {
            shared: Arc::clone(&self.shared),
        })
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        // A dropped handle releases the transfer.
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.closed = true;
        }
        self.shared.cond.notify_all();
    }
}

struct MockStreamControl {
    shared: Arc<StreamShared>,
}

impl StreamControl for MockStreamControl {
    fn interrupt(&self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.interrupted = true;
        }
        self.shared.cond.notify_all();
    }

    fn force_release(&self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.closed = true;
            queue.unresponsive = false;
        }
        self.shared.cond.notify_all();
    }
}

/// Test-side control over one device's stream.
///
/// Always targets the most recently started stream.
#[derive(Clone)]
pub struct MockDeviceControl {
    shared: Arc<DeviceShared>,
}

impl MockDeviceControl {
    fn current(&self) -> Arc<StreamShared> {
        Arc::clone(&self.shared.current.lock().unwrap())
    }

    /// Feed one raw chunk.
    pub fn push_chunk(&self, chunk: TransferChunk) {
        let shared = self.current();
        let mut queue = shared.queue.lock().unwrap();
        queue.script.push_back(ScriptItem::Chunk(chunk));
        drop(queue);
        shared.cond.notify_all();
    }

    /// Feed a complete frame as a start chunk plus continuations of at most
    /// `chunk_size` bytes.
    pub fn push_frame(&self, payload: &[u8], chunk_size: usize) {
        let chunk_size = chunk_size.max(1);
        let mut first = true;
        let mut offset = 0;
        while offset < payload.len() {
            let end = (offset + chunk_size).min(payload.len());
            let data = payload[offset..end].to_vec();
            self.push_chunk(if first {
                TransferChunk::start(data)
            } else {
                TransferChunk::continuation(data)
            });
            first = false;
            offset = end;
        }
        if first {
            // Zero-length frame: still a frame-start marker
            self.push_chunk(TransferChunk::start(Vec::new()));
        }
    }

    /// Inject a transient read error.
    pub fn push_transient_error(&self, msg: &str) {
        let shared = self.current();
        let mut queue = shared.queue.lock().unwrap();
        queue
            .script
            .push_back(ScriptItem::TransientError(msg.to_string()));
        drop(queue);
        shared.cond.notify_all();
    }

    /// Make reads block forever, ignoring timeouts and interrupts, until
    /// force-released.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        let shared = self.current();
        let mut queue = shared.queue.lock().unwrap();
        queue.unresponsive = unresponsive;
        drop(queue);
        shared.cond.notify_all();
    }

    /// True once the current stream's transfer has been released, either by
    /// a clean stream shutdown or by a forced release.
    pub fn is_released(&self) -> bool {
        self.current().queue.lock().unwrap().closed
    }
}
