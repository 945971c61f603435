//! Signal feed transport
//!
//! Owns the websocket to the presence-detection server and classifies each
//! frame as text or binary before handing it to the state machine.

mod listener;
mod message;

pub use listener::{SignalConnection, SignalTransport, TransportError};
pub use message::InboundMessage;
