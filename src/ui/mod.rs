//! Kiosk UI surface
//!
//! The display front-end owns the markup; the daemon owns which regions are
//! visible and what the status indicators say. Every change is published as
//! a `KioskEvent` for IPC subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::KioskEvent;

/// Regions the state machine shows and hides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Live game video
    VideoContainer,
    /// Seller prompt shown while a person waits
    SellerPrompt,
    /// Attract image shown when nobody is playing
    IdleImage,
    /// Congratulations overlay
    CongratulationsOverlay,
}

/// Visibility of every region plus the two status indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSnapshot {
    /// Connection status: voice session connected
    pub connected: bool,
    /// Speaking status: agent speaking (false = listening)
    pub speaking: bool,
    pub video: bool,
    pub seller: bool,
    pub idle_image: bool,
    pub congratulations: bool,
}

impl Default for UiSnapshot {
    fn default() -> Self {
        Self {
            connected: false,
            speaking: false,
            video: false,
            seller: false,
            idle_image: true,
            congratulations: false,
        }
    }
}

impl UiSnapshot {
    pub fn is_visible(&self, region: Region) -> bool {
        match region {
            Region::VideoContainer => self.video,
            Region::SellerPrompt => self.seller,
            Region::IdleImage => self.idle_image,
            Region::CongratulationsOverlay => self.congratulations,
        }
    }

    fn set_visible(&mut self, region: Region, visible: bool) {
        match region {
            Region::VideoContainer => self.video = visible,
            Region::SellerPrompt => self.seller = visible,
            Region::IdleImage => self.idle_image = visible,
            Region::CongratulationsOverlay => self.congratulations = visible,
        }
    }
}

/// Current UI state, published on change
pub struct Ui {
    snapshot: UiSnapshot,
    event_tx: broadcast::Sender<KioskEvent>,
}

impl Ui {
    pub fn new(event_tx: broadcast::Sender<KioskEvent>) -> Self {
        Self {
            snapshot: UiSnapshot::default(),
            event_tx,
        }
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.snapshot
    }

    /// Show and hide several regions as one change
    pub fn layout(&mut self, show: &[Region], hide: &[Region]) {
        self.update(|ui| {
            for region in hide {
                ui.set_visible(*region, false);
            }
            for region in show {
                ui.set_visible(*region, true);
            }
        });
    }

    pub fn show(&mut self, region: Region) {
        self.layout(&[region], &[]);
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.update(|ui| ui.connected = connected);
    }

    pub fn set_speaking(&mut self, speaking: bool) {
        self.update(|ui| ui.speaking = speaking);
    }

    /// Raise a blocking alert on the display
    pub fn alert(&self, message: &str) {
        warn!(message, "alert");
        let _ = self.event_tx.send(KioskEvent::Alert {
            message: message.to_owned(),
        });
    }

    fn update(&mut self, change: impl FnOnce(&mut UiSnapshot)) {
        let before = self.snapshot;
        change(&mut self.snapshot);

        if before != self.snapshot {
            debug!(ui = ?self.snapshot, "ui updated");
            let _ = self.event_tx.send(KioskEvent::UiChanged { ui: self.snapshot });
        }
    }
}
