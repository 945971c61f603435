//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::KioskEvent;
use crate::state::GameState;
use crate::ui::UiSnapshot;

/// Largest message either side will accept
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from the display to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current kiosk status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to kiosk event notifications
    Subscribe,
}

/// Messages from the daemon to the display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current kiosk status
    Status(KioskStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Notification { event: KioskEvent },

    /// Error response
    Error { code: String, message: String },
}

/// Full kiosk status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskStatus {
    /// Daemon version
    pub version: String,

    /// Current game state
    pub state: GameState,

    /// Region visibility and indicators
    pub ui: UiSnapshot,

    /// Whether a voice session is live
    pub session_live: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for KioskStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: GameState::default(),
            ui: UiSnapshot::default(),
            session_live: false,
            uptime_secs: 0,
        }
    }
}

impl KioskStatus {
    /// Fold a published event into the snapshot
    pub fn apply(&mut self, event: &KioskEvent) {
        match event {
            KioskEvent::StateChanged { to, .. } => self.state = *to,
            KioskEvent::UiChanged { ui } => self.ui = *ui,
            KioskEvent::SessionChanged { live } => self.session_live = *live,
            KioskEvent::Alert { .. } => {}
        }
    }
}
