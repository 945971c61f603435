//! State machine module for the kiosk game
//!
//! Provides an explicit state machine with four states:
//! - Idle: Nobody in front of the camera, attract image shown
//! - SellerPrompt: Someone is there but has not raised their arms yet
//! - Active: Game running, live video shown
//! - Congratulating: Game won, overlay shown for a fixed time

mod machine;
mod timers;

pub use machine::{GameState, GameStateMachine, Timings, Trigger};
pub use timers::{PendingTimers, TimerSlot};
