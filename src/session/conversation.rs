//! Session lifecycle and the single session slot
//!
//! A start attempt occupies the slot as `Pending` until it resolves, so a
//! second trigger arriving mid-start is a no-op rather than a second session.
//! Lifecycle events carry the session id; events from anything but the
//! current occupant are dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::events::Input;

use super::credentials::CredentialProvider;
use super::error::SessionError;
use super::microphone::MicrophoneGate;
use super::voice::{SessionEvent, SessionEvents, SessionId, VoiceBackend, VoiceConnection};

/// Runs the start sequence: microphone, signed URL, voice connection
pub struct SessionLauncher {
    microphone: Arc<dyn MicrophoneGate>,
    credentials: Arc<dyn CredentialProvider>,
    voice: Arc<dyn VoiceBackend>,
}

impl SessionLauncher {
    pub fn new(
        microphone: Arc<dyn MicrophoneGate>,
        credentials: Arc<dyn CredentialProvider>,
        voice: Arc<dyn VoiceBackend>,
    ) -> Self {
        Self {
            microphone,
            credentials,
            voice,
        }
    }

    /// Open a session; no network traffic happens without microphone access
    pub async fn launch(
        &self,
        events: SessionEvents,
    ) -> Result<Box<dyn VoiceConnection>, SessionError> {
        if !self.microphone.request().await {
            return Err(SessionError::PermissionDenied);
        }

        let signed_url = self.credentials.signed_url().await?;
        self.voice.establish(&signed_url, events).await
    }
}

enum Slot {
    Vacant,
    Pending {
        id: SessionId,
        stop_requested: bool,
    },
    Live {
        id: SessionId,
        connection: Box<dyn VoiceConnection>,
    },
}

/// Result of resolving a start attempt
#[derive(Debug, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// The session now occupies the slot
    Live,
    /// Superseded or stopped while starting; the connection was ended
    Discarded,
    Failed(SessionError),
}

/// Owner of the process-wide session slot
pub struct ConversationSession {
    slot: Slot,
    last_id: u64,
    launcher: Arc<SessionLauncher>,
    input_tx: mpsc::Sender<Input>,
}

impl ConversationSession {
    pub fn new(launcher: SessionLauncher, input_tx: mpsc::Sender<Input>) -> Self {
        Self {
            slot: Slot::Vacant,
            last_id: 0,
            launcher: Arc::new(launcher),
            input_tx,
        }
    }

    /// Id of the session occupying the slot, live or still starting
    pub fn current(&self) -> Option<SessionId> {
        match &self.slot {
            Slot::Vacant => None,
            Slot::Pending { id, .. } | Slot::Live { id, .. } => Some(*id),
        }
    }

    pub fn exists(&self) -> bool {
        self.current().is_some()
    }

    pub fn is_live(&self) -> bool {
        matches!(self.slot, Slot::Live { .. })
    }

    /// Begin a start attempt; `None` when the slot is already occupied
    ///
    /// The outcome comes back through the input queue as `Input::SessionReady`.
    pub fn start(&mut self) -> Option<SessionId> {
        if let Some(current) = self.current() {
            info!(session = %current, "a conversation is already active");
            return None;
        }

        self.last_id += 1;
        let id = SessionId(self.last_id);
        self.slot = Slot::Pending {
            id,
            stop_requested: false,
        };

        let launcher = Arc::clone(&self.launcher);
        let tx = self.input_tx.clone();
        tokio::spawn(async move {
            let result = launcher.launch(SessionEvents::new(id, tx.clone())).await;
            if tx.send(Input::SessionReady { id, result }).await.is_err() {
                debug!(session = %id, "state machine gone before session resolved");
            }
        });

        info!(session = %id, "starting conversation");
        Some(id)
    }

    /// End the current session, if any; returns whether there was one
    ///
    /// A live session is ended in the background. A session still starting
    /// is ended as soon as it resolves.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.slot, Slot::Vacant) {
            Slot::Vacant => false,
            Slot::Pending { id, .. } => {
                info!(session = %id, "stop requested while conversation is starting");
                self.slot = Slot::Pending {
                    id,
                    stop_requested: true,
                };
                true
            }
            Slot::Live { id, connection } => {
                info!(session = %id, "ending conversation");
                end_in_background(id, connection);
                true
            }
        }
    }

    /// End the current session and wait for it to close
    ///
    /// A start still in flight is only marked stopped.
    pub async fn end(&mut self) -> bool {
        match std::mem::replace(&mut self.slot, Slot::Vacant) {
            Slot::Live { id, mut connection } => {
                info!(session = %id, "ending conversation");
                connection.end().await;
                debug!(session = %id, "conversation ended");
                true
            }
            other => {
                self.slot = other;
                self.stop()
            }
        }
    }

    /// Resolve a start attempt
    pub fn on_ready(
        &mut self,
        id: SessionId,
        result: Result<Box<dyn VoiceConnection>, SessionError>,
    ) -> ReadyOutcome {
        let stop_requested = match &self.slot {
            Slot::Pending {
                id: pending,
                stop_requested,
            } if *pending == id => *stop_requested,
            _ => {
                debug!(session = %id, "start resolved for a session no longer current");
                if let Ok(connection) = result {
                    end_in_background(id, connection);
                }
                return ReadyOutcome::Discarded;
            }
        };

        match result {
            Ok(connection) if stop_requested => {
                self.slot = Slot::Vacant;
                end_in_background(id, connection);
                ReadyOutcome::Discarded
            }
            Ok(connection) => {
                info!(session = %id, "conversation started");
                self.slot = Slot::Live { id, connection };
                ReadyOutcome::Live
            }
            Err(e) => {
                error!(session = %id, error = %e, "error starting conversation");
                self.slot = Slot::Vacant;
                ReadyOutcome::Failed(e)
            }
        }
    }

    /// Filter a lifecycle event; terminal events free the slot
    pub fn on_event(&mut self, id: SessionId, event: SessionEvent) -> Option<SessionEvent> {
        if self.current() != Some(id) {
            debug!(session = %id, ?event, "ignoring event from superseded session");
            return None;
        }

        if matches!(
            self.slot,
            Slot::Pending {
                stop_requested: true,
                ..
            }
        ) {
            debug!(session = %id, ?event, "ignoring event from a start already stopped");
            return None;
        }

        if matches!(event, SessionEvent::Disconnected | SessionEvent::Error(_)) {
            // A pending start resolving later finds the slot vacant and is discarded
            self.slot = Slot::Vacant;
        }

        Some(event)
    }
}

fn end_in_background(id: SessionId, mut connection: Box<dyn VoiceConnection>) {
    tokio::spawn(async move {
        connection.end().await;
        debug!(session = %id, "conversation ended");
    });
}
