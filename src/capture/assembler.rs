//! Frame reassembly from raw transfer chunks.
//!
//! USB transfers deliver a frame as a sequence of payload chunks; the first
//! chunk of each frame carries a frame-start marker. The assembler
//! accumulates chunks into a buffer sized to one full wire frame and never
//! emits a partial frame: a new frame-start before completion, or payload
//! overrunning the expected size, discards the work in progress.

use crate::events::DropReason;
use crate::transport::TransferChunk;

/// Outcome of feeding one chunk into the assembler.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AssemblyOutcome {
    /// A fully assembled wire frame, if this chunk completed one
    pub completed: Option<Vec<u8>>,
    /// An in-progress frame was discarded, and why
    pub dropped: Option<DropReason>,
}

/// Reassembles complete wire frames of a fixed expected size.
#[derive(Debug)]
pub struct FrameAssembler {
    expected_len: usize,
    buffer: Vec<u8>,
    in_frame: bool,
}

impl FrameAssembler {
    /// Create an assembler for frames of exactly `expected_len` bytes.
    pub fn new(expected_len: usize) -> Self {
        Self {
            expected_len,
            buffer: Vec::with_capacity(expected_len),
            in_frame: false,
        }
    }

    /// Discard any partial frame, e.g. after a live decoder reconfiguration.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
    }

    /// Bytes accumulated toward the current frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one transfer chunk.
    ///
    /// At most one frame completes per chunk (UVC payloads do not cross
    /// frame boundaries); a chunk that would overrun the expected size
    /// drops the frame instead.
    pub fn push(&mut self, chunk: &TransferChunk) -> AssemblyOutcome {
        let mut outcome = AssemblyOutcome::default();

        if chunk.frame_start {
            if self.in_frame && !self.buffer.is_empty() {
                outcome.dropped = Some(DropReason::RestartMarker);
            }
            self.buffer.clear();
            self.in_frame = true;
        } else if !self.in_frame {
            // Mid-frame join: no start marker seen yet, skip until one arrives
            return outcome;
        }

        if self.buffer.len() + chunk.data.len() > self.expected_len {
            self.reset();
            outcome.dropped = Some(DropReason::Overrun);
            return outcome;
        }

        self.buffer.extend_from_slice(&chunk.data);

        if self.buffer.len() == self.expected_len {
            outcome.completed = Some(std::mem::take(&mut self.buffer));
            self.in_frame = false;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(data: &[u8]) -> TransferChunk {
        TransferChunk::start(data.to_vec())
    }

    fn cont(data: &[u8]) -> TransferChunk {
        TransferChunk::continuation(data.to_vec())
    }

    #[test]
    fn test_single_chunk_frame() {
        let mut asm = FrameAssembler::new(4);
        let outcome = asm.push(&start(&[1, 2, 3, 4]));
        assert_eq!(outcome.completed, Some(vec![1, 2, 3, 4]));
        assert_eq!(outcome.dropped, None);
    }

    #[test]
    fn test_multi_chunk_frame() {
        let mut asm = FrameAssembler::new(5);
        assert_eq!(asm.push(&start(&[1, 2])).completed, None);
        assert_eq!(asm.push(&cont(&[3, 4])).completed, None);
        let outcome = asm.push(&cont(&[5]));
        assert_eq!(outcome.completed, Some(vec![1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_restart_marker_drops_partial_frame() {
        let mut asm = FrameAssembler::new(4);
        asm.push(&start(&[1, 2]));

        // New frame begins before the previous one completed
        let outcome = asm.push(&start(&[9, 9, 9, 9]));
        assert_eq!(outcome.dropped, Some(DropReason::RestartMarker));
        // The interrupted frame is never emitted; the new one is
        assert_eq!(outcome.completed, Some(vec![9, 9, 9, 9]));
    }

    #[test]
    fn test_overrun_drops_frame() {
        let mut asm = FrameAssembler::new(4);
        asm.push(&start(&[1, 2, 3]));
        let outcome = asm.push(&cont(&[4, 5]));
        assert_eq!(outcome.dropped, Some(DropReason::Overrun));
        assert_eq!(outcome.completed, None);

        // The assembler recovers on the next frame-start
        let outcome = asm.push(&start(&[1, 2, 3, 4]));
        assert_eq!(outcome.completed, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_mid_frame_join_ignored() {
        let mut asm = FrameAssembler::new(4);
        // Continuations arriving before any start marker are skipped
        assert_eq!(asm.push(&cont(&[1, 2])), AssemblyOutcome::default());
        assert_eq!(asm.pending_len(), 0);

        let outcome = asm.push(&start(&[5, 6, 7, 8]));
        assert_eq!(outcome.completed, Some(vec![5, 6, 7, 8]));
    }

    #[test]
    fn test_reset_discards_progress() {
        let mut asm = FrameAssembler::new(4);
        asm.push(&start(&[1, 2]));
        asm.reset();
        assert_eq!(asm.pending_len(), 0);

        // A continuation after reset is a mid-frame join, not appended
        assert_eq!(asm.push(&cont(&[3, 4])).completed, None);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut asm = FrameAssembler::new(2);
        assert_eq!(asm.push(&start(&[1, 2])).completed, Some(vec![1, 2]));
        assert_eq!(asm.push(&start(&[3, 4])).completed, Some(vec![3, 4]));
    }

    #[test]
    fn test_empty_start_chunk_restarts_without_drop_of_nothing() {
        let mut asm = FrameAssembler::new(2);
        // An empty start marker right after a completed frame drops nothing
        asm.push(&start(&[1, 2]));
        let outcome = asm.push(&start(&[]));
        assert_eq!(outcome.dropped, None);
        assert_eq!(outcome.completed, None);
    }
}
