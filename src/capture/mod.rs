//! The capture pipeline: a dedicated thread per previewing session.
//!
//! [`CapturePipeline`] owns the thread running
//! [`capture_loop::run_capture_loop`]: it spawns it with a started stream,
//! forwards live format changes, and stops it within a bounded timeout,
//! forcibly releasing the transport if the thread fails to quiesce.

pub mod assembler;
pub mod convert;
mod capture_loop;

pub(crate) use capture_loop::{LoopCommand, PipelineShared};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::events::{CaptureEvent, EventLog};
use crate::sink::SinkSet;
use crate::slot::FrameSlot;
use crate::transport::{StreamControl, StreamHandle};
use crate::types::{PixelFormat, Resolution};

use capture_loop::LoopContext;

/// Handle to a running capture thread.
pub(crate) struct CapturePipeline {
    stop: Arc<AtomicBool>,
    command_tx: Sender<LoopCommand>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
    control: Arc<dyn StreamControl>,
    shared: Arc<PipelineShared>,
    events: Arc<EventLog>,
    stop_timeout: Duration,
}

impl CapturePipeline {
    /// Spawn the capture thread over an already-started stream.
    pub fn spawn(
        stream: Box<dyn StreamHandle>,
        wire_format: PixelFormat,
        out_format: PixelFormat,
        resolution: Resolution,
        slot: Arc<FrameSlot>,
        sinks: SinkSet,
        events: Arc<EventLog>,
        config: &CaptureConfig,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(PipelineShared::default());
        let control = stream.control();
        let (command_tx, command_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let ctx = LoopContext {
            stream,
            wire_format,
            out_format,
            resolution,
            read_timeout: config.read_timeout(),
            read_retries: config.read_retries,
            slot,
            sinks,
            events: Arc::clone(&events),
            stop: Arc::clone(&stop),
            shared: Arc::clone(&shared),
            rx: command_rx,
            done_tx,
        };

        let thread = thread::spawn(move || capture_loop::run_capture_loop(ctx));

        Self {
            stop,
            command_tx,
            done_rx,
            thread: Some(thread),
            control,
            shared,
            events,
            stop_timeout: config.stop_timeout(),
        }
    }

    /// Forward a live output-format change to the loop and wake it so the
    /// switch takes effect before the next frame completes.
    pub fn change_format(&self, format: PixelFormat) {
        let _ = self.command_tx.send(LoopCommand::ChangeFormat(format));
        self.control.interrupt();
    }

    /// Whether the loop declared the device lost.
    pub fn is_lost(&self) -> bool {
        self.shared.lost.load(Ordering::SeqCst)
    }

    /// Consecutive failed reads at the time the device was declared lost.
    pub fn failed_reads(&self) -> u32 {
        self.shared.failed_reads.load(Ordering::SeqCst)
    }

    /// Stop the capture thread, bounded by the configured timeout.
    ///
    /// Signals the stop flag, interrupts the blocking read, and joins. If
    /// the thread does not quiesce in time the transport is forcibly
    /// released, `ForcedStopTimeout` is recorded, and the thread is left to
    /// unwind on its own (the forced release unblocks it).
    ///
    /// Returns true on a clean join.
    pub fn stop(&mut self) -> bool {
        let Some(thread) = self.thread.take() else {
            return true;
        };

        self.stop.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(LoopCommand::Stop);
        self.control.interrupt();

        match self.done_rx.recv_timeout(self.stop_timeout) {
            Ok(()) => {
                let _ = thread.join();
                true
            }
            Err(_) => {
                self.control.force_release();
                self.events.record(CaptureEvent::ForcedStopTimeout);
                // Do not join: the thread exits once the forced release
                // unblocks its read. Dropping the handle detaches it.
                drop(thread);
                false
            }
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
