//! Conditional frame rendering

use bytes::Bytes;
use tracing::{debug, trace};

use super::lease::{FrameId, LeaseTracker};
use super::sink::FrameSink;

/// What happened to a frame handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Assigned as display source
    Rendered(FrameId),
    /// Rendering inactive, frame dropped without allocating
    Discarded,
}

/// Shows frames while rendering is active, drops them otherwise
pub struct FrameRenderer {
    active: bool,
    sink: Box<dyn FrameSink>,
    tracker: LeaseTracker,
    /// Current display source
    source: Option<FrameId>,
    rendered: u64,
    discarded: u64,
}

impl FrameRenderer {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            active: false,
            sink,
            tracker: LeaseTracker::new(),
            source: None,
            rendered: 0,
            discarded: 0,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            debug!(active, "frame rendering toggled");
        }
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Render a frame if active
    ///
    /// A frame arriving while an earlier one is still being consumed simply
    /// replaces the display source; the earlier lease is released by whoever
    /// holds it.
    pub fn render(&mut self, payload: Bytes) -> RenderOutcome {
        if !self.active {
            self.discarded += 1;
            trace!(bytes = payload.len(), "frame discarded, rendering inactive");
            return RenderOutcome::Discarded;
        }

        let lease = self.tracker.acquire(payload);
        let id = lease.id();
        self.source = Some(id);
        self.sink.present(lease);
        self.rendered += 1;

        trace!(frame = %id, "frame rendered");
        RenderOutcome::Rendered(id)
    }

    pub fn source(&self) -> Option<FrameId> {
        self.source
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn tracker(&self) -> &LeaseTracker {
        &self.tracker
    }
}
