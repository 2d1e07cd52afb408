//! Background capture thread implementation.
//!
//! The loop pulls raw transfer chunks from the stream, reassembles them into
//! complete wire frames, decodes into the requested output format, and
//! publishes to the frame slot and registered sinks. Per-frame problems are
//! recorded and skipped; only repeated transport failures end the loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use super::assembler::FrameAssembler;
use super::convert;
use crate::events::{CaptureEvent, DropReason, EventLog};
use crate::sink::SinkSet;
use crate::slot::FrameSlot;
use crate::transport::{ReadOutcome, StreamHandle, TransferError};
use crate::types::{PixelFormat, Resolution};

/// Commands sent to the capture thread.
pub(crate) enum LoopCommand {
    /// Live decoder reconfiguration: drain the partial frame and switch the
    /// output format
    ChangeFormat(PixelFormat),
    Stop,
}

/// State shared between the capture thread and the owning session.
#[derive(Debug, Default)]
pub(crate) struct PipelineShared {
    /// Set when the transport retry budget is exhausted
    pub lost: AtomicBool,
    /// Consecutive failed reads at the time the device was declared lost
    pub failed_reads: AtomicU32,
}

/// Everything the capture thread needs, handed over at spawn.
pub(crate) struct LoopContext {
    pub stream: Box<dyn StreamHandle>,
    pub wire_format: PixelFormat,
    pub out_format: PixelFormat,
    pub resolution: Resolution,
    pub read_timeout: Duration,
    pub read_retries: u32,
    pub slot: Arc<FrameSlot>,
    pub sinks: SinkSet,
    pub events: Arc<EventLog>,
    pub stop: Arc<AtomicBool>,
    pub shared: Arc<PipelineShared>,
    pub rx: Receiver<LoopCommand>,
    pub done_tx: Sender<()>,
}

/// Run the capture loop until stopped, the stream disconnects, or the retry
/// budget runs out.
pub(crate) fn run_capture_loop(ctx: LoopContext) {
    let LoopContext {
        mut stream,
        wire_format,
        mut out_format,
        resolution,
        read_timeout,
        read_retries,
        slot,
        sinks,
        events,
        stop,
        shared,
        rx,
        done_tx,
    } = ctx;

    let mut assembler = FrameAssembler::new(wire_format.frame_bytes(resolution));
    let mut consecutive_failures = 0u32;

    'outer: while !stop.load(Ordering::Relaxed) {
        // Drain pending commands (non-blocking)
        while let Ok(command) = rx.try_recv() {
            match command {
                LoopCommand::ChangeFormat(format) => {
                    assembler.reset();
                    out_format = format;
                    log::debug!("live decoder switch to {}", format);
                }
                LoopCommand::Stop => break 'outer,
            }
        }

        match stream.read_chunk(read_timeout) {
            Ok(ReadOutcome::Chunk(chunk)) => {
                consecutive_failures = 0;
                let outcome = assembler.push(&chunk);
                if let Some(reason) = outcome.dropped {
                    events.record(CaptureEvent::FrameDropped(reason));
                }
                if let Some(wire_frame) = outcome.completed {
                    match convert::convert(wire_format, out_format, resolution, &wire_frame) {
                        Some(decoded) => {
                            let view = slot.publish(out_format, resolution, decoded.into());
                            sinks.publish(&view);
                        }
                        None => {
                            events.record(CaptureEvent::FrameDropped(DropReason::ConversionFailed));
                        }
                    }
                }
            }
            Ok(ReadOutcome::TimedOut) => {
                // Nothing arrived (or the wait was interrupted); loop back to
                // observe the stop flag
            }
            Err(TransferError::Transient(msg)) => {
                consecutive_failures += 1;
                log::debug!(
                    "transient transfer failure ({} of {}): {}",
                    consecutive_failures,
                    read_retries,
                    msg
                );
                if consecutive_failures >= read_retries {
                    shared
                        .failed_reads
                        .store(consecutive_failures, Ordering::SeqCst);
                    shared.lost.store(true, Ordering::SeqCst);
                    events.record(CaptureEvent::DeviceLost);
                    break;
                }
            }
            Err(TransferError::Disconnected) => {
                if !stop.load(Ordering::Relaxed) {
                    shared
                        .failed_reads
                        .store(consecutive_failures.max(1), Ordering::SeqCst);
                    shared.lost.store(true, Ordering::SeqCst);
                    events.record(CaptureEvent::DeviceLost);
                }
                break;
            }
        }
    }

    // Release the transfer resources before signalling completion so a
    // joined stop() can rely on the handle being gone.
    drop(stream);
    let _ = done_tx.send(());
}
