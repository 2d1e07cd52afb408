//! Consumer-side frame delivery.
//!
//! The capture pipeline publishes every decoded frame to the session's
//! [`FrameSlot`](crate::slot::FrameSlot) and to any registered sink. A
//! rendering sink and an image-processing sink can coexist this way without
//! conditional branches inside the pipeline.

use std::sync::{Arc, Mutex};

use crate::types::FrameView;

/// A consumer that accepts decoded frames as they are published.
///
/// `accept` is called from the capture thread; implementations should hand
/// the view off quickly (it is cheap to clone) rather than do heavy work
/// inline.
pub trait FrameSink: Send + Sync {
    fn accept(&self, frame: &FrameView);
}

/// Live-updatable set of sinks shared between the session and the capture
/// thread. Registration takes effect on the next published frame.
#[derive(Default, Clone)]
pub struct SinkSet {
    sinks: Arc<Mutex<Vec<Arc<dyn FrameSink>>>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn FrameSink>) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(sink);
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a frame to every registered sink.
    pub fn publish(&self, frame: &FrameView) {
        let sinks: Vec<Arc<dyn FrameSink>> = match self.sinks.lock() {
            Ok(sinks) => sinks.clone(),
            Err(_) => return,
        };
        for sink in sinks {
            sink.accept(frame);
        }
    }
}
