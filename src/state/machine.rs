//! Core state machine implementation
//!
//! Consumes the single input queue: control strings and frames from the
//! signal feed, timer expiries, and voice session callbacks. Handlers never
//! await; anything slow (session start/stop, timers) runs as a task that
//! reports back through the queue.

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::events::{Input, KioskEvent};
use crate::render::FrameRenderer;
use crate::session::{
    ConversationSession, ReadyOutcome, SessionError, SessionEvent, SessionId, VoiceConnection,
};
use crate::transport::InboundMessage;
use crate::ui::{Region, Ui, UiSnapshot};

use super::timers::{PendingTimers, TimerSlot};

/// The four states of the kiosk game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    /// Nobody playing, attract image shown
    Idle,
    /// Game running, live video shown
    Active,
    /// Person detected but arms not raised
    SellerPrompt,
    /// Game won, overlay shown
    Congratulating,
}

impl Default for GameState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameState::Idle => write!(f, "Idle"),
            GameState::Active => write!(f, "Active"),
            GameState::SellerPrompt => write!(f, "SellerPrompt"),
            GameState::Congratulating => write!(f, "Congratulating"),
        }
    }
}

/// Control strings sent by the detection server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    GameStarted,
    Congratulations,
    PersonDetected,
    /// Anything else, including garbled input, means idle
    Other,
}

impl Trigger {
    pub const GAME_STARTED: &'static str = "Game Started";
    pub const CONGRATULATIONS: &'static str = "Congratulations";
    pub const PERSON_DETECTED: &'static str = "Person detected but arms not raised";

    /// Exact match, no trimming or case folding
    pub fn classify(text: &str) -> Self {
        match text {
            Self::GAME_STARTED => Trigger::GameStarted,
            Self::CONGRATULATIONS => Trigger::Congratulations,
            Self::PERSON_DETECTED => Trigger::PersonDetected,
            _ => Trigger::Other,
        }
    }
}

/// Timer durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Quiet period before a presence-triggered session start
    pub session_debounce: Duration,
    /// How long the congratulations overlay stays up
    pub congrats_display: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            session_debounce: Duration::from_millis(3000),
            congrats_display: Duration::from_millis(4000),
        }
    }
}

/// The orchestrator: owns game state, UI, renderer, session slot and timers
pub struct GameStateMachine {
    /// Current state
    state: GameState,
    /// Time when the current state was entered
    state_entered_at: Instant,
    timings: Timings,
    ui: Ui,
    renderer: FrameRenderer,
    session: ConversationSession,
    timers: PendingTimers,
    /// Channel for publishing kiosk events
    event_tx: broadcast::Sender<KioskEvent>,
}

impl GameStateMachine {
    /// Create a new state machine
    ///
    /// `input_tx` must feed the receiver later passed to `run`; timers post
    /// their expiries through it.
    pub fn new(
        timings: Timings,
        renderer: FrameRenderer,
        session: ConversationSession,
        input_tx: mpsc::Sender<Input>,
        event_tx: broadcast::Sender<KioskEvent>,
    ) -> Self {
        Self {
            state: GameState::Idle,
            state_entered_at: Instant::now(),
            timings,
            ui: Ui::new(event_tx.clone()),
            renderer,
            session,
            timers: PendingTimers::new(input_tx),
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn ui(&self) -> UiSnapshot {
        self.ui.snapshot()
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    pub fn session_exists(&self) -> bool {
        self.session.exists()
    }

    pub fn session_live(&self) -> bool {
        self.session.is_live()
    }

    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.timers.is_armed(slot)
    }

    /// Run the state machine until the input queue closes
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<Input>) {
        info!(state = %self.state, "state machine started");

        while let Some(input) = input_rx.recv().await {
            self.handle(input);
        }

        info!("state machine stopped");
    }

    /// Drop pending timers and end any live session before returning
    pub async fn shutdown(&mut self) {
        self.timers.cancel(TimerSlot::SessionStartDebounce);
        self.timers.cancel(TimerSlot::CongratsDisplay);
        self.renderer.set_active(false);
        if self.session.end().await {
            self.ui.set_connected(false);
            self.ui.set_speaking(false);
            self.publish(KioskEvent::SessionChanged { live: false });
        }
    }

    /// Handle one input to completion
    pub fn handle(&mut self, input: Input) {
        match input {
            Input::Signal(InboundMessage::Text(text)) => self.handle_text(&text),
            Input::Signal(InboundMessage::Binary(payload)) => self.handle_frame(payload),
            Input::TimerFired { slot, generation } => self.handle_timer(slot, generation),
            Input::SessionReady { id, result } => self.handle_session_ready(id, result),
            Input::Session { id, event } => self.handle_session_event(id, event),
        }
    }

    /// Handle a control string from the detection server
    fn handle_text(&mut self, text: &str) {
        info!(message = text, "signal state received");

        // Any control string preempts a pending session start
        self.timers.cancel(TimerSlot::SessionStartDebounce);

        let trigger = Trigger::classify(text);
        if trigger != Trigger::Congratulations {
            self.timers.cancel(TimerSlot::CongratsDisplay);
        }

        match trigger {
            Trigger::GameStarted => {
                self.renderer.set_active(true);
                self.ui.layout(
                    &[Region::VideoContainer],
                    &[
                        Region::SellerPrompt,
                        Region::IdleImage,
                        Region::CongratulationsOverlay,
                    ],
                );
                self.transition_to(GameState::Active);
                self.stop_conversation();
            }
            Trigger::Congratulations => {
                self.ui.show(Region::CongratulationsOverlay);
                self.timers
                    .arm(TimerSlot::CongratsDisplay, self.timings.congrats_display);
                self.transition_to(GameState::Congratulating);
            }
            Trigger::PersonDetected => {
                self.renderer.set_active(false);
                self.ui.layout(
                    &[Region::SellerPrompt],
                    &[
                        Region::VideoContainer,
                        Region::IdleImage,
                        Region::CongratulationsOverlay,
                    ],
                );
                self.transition_to(GameState::SellerPrompt);
                if !self.session.exists() {
                    self.timers
                        .arm(TimerSlot::SessionStartDebounce, self.timings.session_debounce);
                }
            }
            Trigger::Other => {
                self.renderer.set_active(false);
                self.ui.layout(
                    &[Region::IdleImage],
                    &[
                        Region::SellerPrompt,
                        Region::VideoContainer,
                        Region::CongratulationsOverlay,
                    ],
                );
                self.transition_to(GameState::Idle);
                self.stop_conversation();
            }
        }
    }

    /// Frames render only while the game video is up
    fn handle_frame(&mut self, payload: Bytes) {
        self.renderer.render(payload);
    }

    fn handle_timer(&mut self, slot: TimerSlot, generation: u64) {
        if !self.timers.fire(slot, generation) {
            debug!(?slot, generation, "ignoring stale timer expiry");
            return;
        }

        match slot {
            TimerSlot::SessionStartDebounce => self.start_conversation(),
            TimerSlot::CongratsDisplay => self.finish_congratulations(),
        }
    }

    /// Congratulations display elapsed: back to the attract screen
    fn finish_congratulations(&mut self) {
        self.renderer.set_active(false);
        self.ui.layout(
            &[Region::IdleImage],
            &[Region::CongratulationsOverlay, Region::VideoContainer],
        );
        self.transition_to(GameState::Idle);
    }

    fn start_conversation(&mut self) {
        self.session.start();
    }

    /// Fire-and-continue: the session ends in the background
    fn stop_conversation(&mut self) {
        if self.session.stop() {
            // The ended session's own disconnect callback is stale by now
            self.ui.set_connected(false);
            self.ui.set_speaking(false);
            self.publish(KioskEvent::SessionChanged { live: false });
        }
    }

    fn handle_session_ready(
        &mut self,
        id: SessionId,
        result: Result<Box<dyn VoiceConnection>, SessionError>,
    ) {
        match self.session.on_ready(id, result) {
            ReadyOutcome::Live => self.publish(KioskEvent::SessionChanged { live: true }),
            ReadyOutcome::Discarded => {}
            ReadyOutcome::Failed(e) => self.ui.alert(e.alert_message()),
        }
    }

    fn handle_session_event(&mut self, id: SessionId, event: SessionEvent) {
        let Some(event) = self.session.on_event(id, event) else {
            return;
        };

        match event {
            SessionEvent::Connected => {
                info!(session = %id, "conversation connected");
                self.ui.set_connected(true);
            }
            SessionEvent::Disconnected => {
                info!(session = %id, "conversation disconnected");
                self.ui.set_connected(false);
                self.ui.set_speaking(false);
                self.publish(KioskEvent::SessionChanged { live: false });
            }
            SessionEvent::Error(message) => {
                let e = SessionError::SessionRuntimeError(message);
                error!(session = %id, error = %e, "conversation error");
                self.ui.set_connected(false);
                self.ui.set_speaking(false);
                self.ui.alert(e.alert_message());
                self.publish(KioskEvent::SessionChanged { live: false });
            }
            SessionEvent::ModeChanged(mode) => {
                info!(session = %id, %mode, "conversation mode changed");
                self.ui.set_speaking(mode == "speaking");
            }
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: GameState) {
        let old_state = self.state;
        if new_state == old_state {
            return;
        }

        let duration_ms = self.state_entered_at.elapsed().as_millis() as u64;
        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state = new_state;
        self.state_entered_at = Instant::now();
        self.publish(KioskEvent::StateChanged {
            from: old_state,
            to: new_state,
        });
    }

    fn publish(&self, event: KioskEvent) {
        debug!(%event, "publishing kiosk event");
        let _ = self.event_tx.send(event);
    }
}
