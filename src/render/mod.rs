//! Frame rendering
//!
//! Binary frames from the signal feed are opaque encoded images. The renderer
//! decides whether a frame is shown at all; the sink decides how it reaches
//! the display. Every shown frame is backed by a `FrameLease` that is released
//! only once the display has consumed it.

mod lease;
mod renderer;
mod sink;

pub use lease::{FrameId, FrameLease, LeaseTracker};
pub use renderer::{FrameRenderer, RenderOutcome};
pub use sink::{FileFrameSink, FrameSink, RenderError};
