//! presence-kiosk: Kiosk daemon for an arm-raise detection game
//!
//! This daemon runs next to the display and provides:
//! - A websocket client for the presence-detection feed (control strings and frames)
//! - Explicit state machine for the game screens
//! - A voice conversation session that greets people who have not started playing
//! - IPC server for the display front-end
//!
//! Not in scope:
//! - Pose detection itself, which lives in the detection server
//! - Drawing pixels; the front-end reads the frame file and region flags

mod config;
mod events;
mod ipc;
mod lifecycle;
mod render;
mod session;
mod state;
mod transport;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::{Input, KioskEvent};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::render::{FileFrameSink, FrameRenderer};
use crate::session::{
    ConversationSession, DeviceMicrophone, HttpCredentialProvider, SessionLauncher,
    SignedUrlVoiceBackend,
};
use crate::state::GameStateMachine;
use crate::transport::SignalTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "presence-kiosk starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        signal_url = %config.signal_url,
        socket_path = ?config.socket_path,
        frame_path = ?config.frame_path,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Signal feed, timers and session callbacks -> State machine
    let (input_tx, input_rx) = mpsc::channel::<Input>(256);
    // State machine -> IPC server
    let (event_tx, _event_rx) = broadcast::channel::<KioskEvent>(64);

    let credentials = Arc::new(HttpCredentialProvider::new(&config.api_base_url));
    match credentials.agent_id().await {
        Ok(agent_id) => info!(%agent_id, "voice agent configured"),
        Err(e) => warn!(error = %e, "could not fetch agent id"),
    }

    let launcher = SessionLauncher::new(
        Arc::new(DeviceMicrophone::new(&config.mic_device)),
        credentials,
        Arc::new(SignedUrlVoiceBackend),
    );
    let session = ConversationSession::new(launcher, input_tx.clone());
    let renderer = FrameRenderer::new(Box::new(FileFrameSink::new(&config.frame_path)?));

    let mut state_machine = GameStateMachine::new(
        config.timings(),
        renderer,
        session,
        input_tx.clone(),
        event_tx.clone(),
    );

    // Connect to the detection server; the kiosk stays up without it
    let mut signal = match SignalTransport::connect(&config.signal_url, input_tx).await {
        Ok(connection) => Some(connection),
        Err(e) => {
            error!(error = %e, "failed to connect to signal server");
            warn!("continuing without signal feed - the kiosk will stay idle");
            None
        }
    };

    // Create IPC server
    let server = Server::new(&config.socket_path, event_tx.clone())?;

    // Subscribe to kiosk events for IPC status updates
    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the state machine (processes signal, timer and session input)
        _ = state_machine.run(input_rx) => {
            info!("state machine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the IPC status in step with the state machine
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "kiosk event");
                        server_for_events.apply(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "kiosk event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("kiosk event handler exited");
        }

        // Wait for shutdown signal
        result = shutdown.wait() => {
            match result {
                Ok(name) => info!(signal = name, "shutdown signal received"),
                Err(e) => error!(?e, "signal handling failed"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    if let Some(connection) = signal.as_mut() {
        connection.close().await;
    }
    state_machine.shutdown().await;
    server.shutdown().await;

    info!("presence-kiosk stopped");

    Ok(())
}
