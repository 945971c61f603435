//! Events module for the kiosk event loop
//!
//! `Input` is everything the state machine consumes, funnelled through one
//! queue so transport frames, timer expiries and session callbacks share a
//! single total order. `KioskEvent` is what the state machine publishes to
//! the display front-end.

use serde::{Deserialize, Serialize};

use crate::session::{SessionError, SessionEvent, SessionId, VoiceConnection};
use crate::state::{GameState, TimerSlot};
use crate::transport::InboundMessage;
use crate::ui::UiSnapshot;

/// Inputs delivered to the state machine
#[derive(Debug)]
pub enum Input {
    /// Classified frame from the signal server
    Signal(InboundMessage),

    /// Lifecycle callback from a voice session
    Session {
        id: SessionId,
        event: SessionEvent,
    },

    /// A session start attempt resolved
    SessionReady {
        id: SessionId,
        result: Result<Box<dyn VoiceConnection>, SessionError>,
    },

    /// A named timer expired
    TimerFired {
        slot: TimerSlot,
        /// Arming generation, used to drop expiries of cancelled timers
        generation: u64,
    },
}

/// Notifications published by the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KioskEvent {
    /// The game state changed
    StateChanged { from: GameState, to: GameState },

    /// Region visibility or status indicators changed
    UiChanged { ui: UiSnapshot },

    /// A voice session became live or went away
    SessionChanged { live: bool },

    /// Blocking alert for whoever is in front of the kiosk
    Alert { message: String },
}

impl std::fmt::Display for KioskEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KioskEvent::StateChanged { from, to } => write!(f, "STATE_CHANGED ({} -> {})", from, to),
            KioskEvent::UiChanged { .. } => write!(f, "UI_CHANGED"),
            KioskEvent::SessionChanged { live } => write!(f, "SESSION_CHANGED (live={})", live),
            KioskEvent::Alert { message } => write!(f, "ALERT ({})", message),
        }
    }
}
