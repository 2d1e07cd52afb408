//! Latest-wins frame handoff between the capture thread and consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::{FrameView, PixelFormat, Resolution};

/// Single-writer, multi-reader slot holding the most recent decoded frame.
///
/// The writer replaces the stored view wholesale on each publish; readers
/// clone the shared view under a short lock hold, so neither side ever
/// blocks the other for longer than the swap/clone itself. A frame that was
/// never read is simply replaced: staleness is worse than memory growth for
/// a live preview.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<FrameView>>,
    generation: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish a decoded frame, assigning it the next generation.
    ///
    /// Returns the published view so the caller can fan it out to sinks
    /// without re-reading the slot.
    pub fn publish(
        &self,
        format: PixelFormat,
        resolution: Resolution,
        data: Arc<[u8]>,
    ) -> FrameView {
        debug_assert_eq!(data.len(), format.frame_bytes(resolution));
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let view = FrameView {
            generation,
            format,
            resolution,
            data,
        };
        if let Ok(mut latest) = self.latest.lock() {
            if let Some(prev) = latest.replace(view.clone()) {
                log::trace!("replaced frame generation {}", prev.generation);
            }
        }
        view
    }

    /// Get the most recently published frame, if any.
    ///
    /// Never blocks on the writer beyond the swap itself. A reader may see
    /// the same generation twice (no new frame) or skip generations (missed
    /// frames); both are fine under the latest-wins policy.
    pub fn read_latest(&self) -> Option<FrameView> {
        self.latest.lock().ok()?.clone()
    }

    /// The generation of the most recent publish, 0 before any frame.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}
