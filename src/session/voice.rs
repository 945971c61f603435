//! Voice agent connection
//!
//! The voice agent speaks a JSON protocol over a websocket opened with the
//! signed URL. We only track what the kiosk shows: whether the agent is
//! connected and whether it is speaking or listening. Audio itself is
//! handled by the playback stack, not here.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::events::Input;

use super::error::SessionError;

type VoiceStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `end()` waits for the session task before aborting it
const END_TIMEOUT: Duration = Duration::from_secs(1);

/// Identifies one start attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle callbacks of a voice session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Error(String),
    /// Agent mode, `"speaking"` or `"listening"`
    ModeChanged(String),
}

/// Delivers a session's callbacks into the state machine queue
#[derive(Debug, Clone)]
pub struct SessionEvents {
    id: SessionId,
    tx: mpsc::Sender<Input>,
}

impl SessionEvents {
    pub fn new(id: SessionId, tx: mpsc::Sender<Input>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns false once the state machine is gone
    pub async fn emit(&self, event: SessionEvent) -> bool {
        self.tx
            .send(Input::Session { id: self.id, event })
            .await
            .is_ok()
    }
}

/// Opens voice sessions
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    async fn establish(
        &self,
        signed_url: &str,
        events: SessionEvents,
    ) -> Result<Box<dyn VoiceConnection>, SessionError>;
}

/// A live voice session
#[async_trait]
pub trait VoiceConnection: Send + std::fmt::Debug {
    /// End the session; safe to call more than once
    async fn end(&mut self);
}

/// Voice backend speaking the agent websocket protocol
#[derive(Debug, Default)]
pub struct SignedUrlVoiceBackend;

#[async_trait]
impl VoiceBackend for SignedUrlVoiceBackend {
    async fn establish(
        &self,
        signed_url: &str,
        events: SessionEvents,
    ) -> Result<Box<dyn VoiceConnection>, SessionError> {
        let (ws_stream, _) = connect_async(signed_url)
            .await
            .map_err(|e| SessionError::SessionEstablishFailed(e.to_string()))?;
        let (mut sink, stream) = ws_stream.split();

        let init = json!({ "type": "conversation_initiation_client_data" });
        sink.send(Message::Text(init.to_string().into()))
            .await
            .map_err(|e| SessionError::SessionEstablishFailed(e.to_string()))?;

        let id = events.id();
        info!(session = %id, "voice session established");

        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_session(sink, stream, events, close_rx));

        Ok(Box::new(WsVoiceConnection {
            id,
            close_tx: Some(close_tx),
            task: Some(task),
        }))
    }
}

/// Websocket-backed voice session
#[derive(Debug)]
struct WsVoiceConnection {
    id: SessionId,
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl VoiceConnection for WsVoiceConnection {
    async fn end(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(END_TIMEOUT, &mut task).await.is_err() {
                warn!(session = %self.id, "voice session did not close in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for WsVoiceConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentMode {
    Speaking,
    Listening,
}

impl AgentMode {
    fn as_str(self) -> &'static str {
        match self {
            AgentMode::Speaking => "speaking",
            AgentMode::Listening => "listening",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    ping_event: Option<PingEvent>,
}

#[derive(Debug, Deserialize)]
struct PingEvent {
    event_id: u64,
}

/// What to do about one frame from the agent
#[derive(Debug, PartialEq, Eq)]
enum Reaction {
    Emit(SessionEvent),
    Reply(String),
    Nothing,
}

fn react(frame: &str, mode: &mut AgentMode) -> Reaction {
    let frame: AgentFrame = match serde_json::from_str(frame) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(?e, "unreadable agent frame");
            return Reaction::Nothing;
        }
    };

    let next_mode = match frame.kind.as_str() {
        "conversation_initiation_metadata" => return Reaction::Emit(SessionEvent::Connected),
        "ping" => {
            return match frame.ping_event {
                Some(ping) => {
                    Reaction::Reply(json!({ "type": "pong", "event_id": ping.event_id }).to_string())
                }
                None => Reaction::Nothing,
            };
        }
        "audio" => AgentMode::Speaking,
        "interruption" | "user_transcript" => AgentMode::Listening,
        other => {
            trace!(kind = other, "agent frame ignored");
            return Reaction::Nothing;
        }
    };

    if next_mode == *mode {
        return Reaction::Nothing;
    }
    *mode = next_mode;
    Reaction::Emit(SessionEvent::ModeChanged(next_mode.as_str().to_owned()))
}

async fn run_session(
    mut sink: SplitSink<VoiceStream, Message>,
    mut stream: SplitStream<VoiceStream>,
    events: SessionEvents,
    mut close_rx: oneshot::Receiver<()>,
) {
    let mut mode = AgentMode::Listening;

    let terminal = loop {
        tokio::select! {
            _ = &mut close_rx => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(?e, "close frame not sent");
                }
                debug!(session = %events.id(), "voice session ended locally");
                break SessionEvent::Disconnected;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match react(text.as_str(), &mut mode) {
                    Reaction::Emit(event) => {
                        if !events.emit(event).await {
                            return;
                        }
                    }
                    Reaction::Reply(reply) => {
                        if let Err(e) = sink.send(Message::Text(reply.into())).await {
                            break SessionEvent::Error(e.to_string());
                        }
                    }
                    Reaction::Nothing => {}
                },
                Some(Ok(Message::Close(reason))) => {
                    info!(session = %events.id(), ?reason, "voice agent closed session");
                    break SessionEvent::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(session = %events.id(), ?e, "voice session error");
                    break SessionEvent::Error(e.to_string());
                }
                None => break SessionEvent::Disconnected,
            }
        }
    };

    events.emit(terminal).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_metadata_connects() {
        let mut mode = AgentMode::Listening;
        let frame = r#"{"type":"conversation_initiation_metadata","conversation_initiation_metadata_event":{"conversation_id":"c1"}}"#;
        assert_eq!(react(frame, &mut mode), Reaction::Emit(SessionEvent::Connected));
    }

    #[test]
    fn test_mode_changes_only_on_transition() {
        let mut mode = AgentMode::Listening;
        let audio = r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA","event_id":3}}"#;

        assert_eq!(
            react(audio, &mut mode),
            Reaction::Emit(SessionEvent::ModeChanged("speaking".into()))
        );
        assert_eq!(react(audio, &mut mode), Reaction::Nothing);
        assert_eq!(
            react(r#"{"type":"interruption"}"#, &mut mode),
            Reaction::Emit(SessionEvent::ModeChanged("listening".into()))
        );
        assert_eq!(react(r#"{"type":"user_transcript"}"#, &mut mode), Reaction::Nothing);
    }

    #[test]
    fn test_ping_answered() {
        let mut mode = AgentMode::Listening;
        let reaction = react(r#"{"type":"ping","ping_event":{"event_id":7,"ping_ms":20}}"#, &mut mode);
        let Reaction::Reply(reply) = reaction else {
            panic!("expected pong, got {:?}", reaction);
        };
        let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["type"], "pong");
        assert_eq!(reply["event_id"], 7);
    }

    #[test]
    fn test_garbage_ignored() {
        let mut mode = AgentMode::Speaking;
        assert_eq!(react("not json", &mut mode), Reaction::Nothing);
        assert_eq!(react(r#"{"type":"agent_response"}"#, &mut mode), Reaction::Nothing);
        assert_eq!(mode, AgentMode::Speaking);
    }

    async fn next_event(rx: &mut mpsc::Receiver<Input>) -> SessionEvent {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(Input::Session { event, .. })) => event,
            other => panic!("expected session input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_against_agent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let init = ws.next().await.unwrap().unwrap();
            assert!(init.to_text().unwrap().contains("conversation_initiation_client_data"));

            for frame in [
                r#"{"type":"conversation_initiation_metadata"}"#,
                r#"{"type":"audio"}"#,
                r#"{"type":"ping","ping_event":{"event_id":1}}"#,
            ] {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }

            let pong = ws.next().await.unwrap().unwrap();
            assert!(pong.to_text().unwrap().contains("pong"));
            ws.close(None).await.unwrap();
        });

        let (tx, mut rx) = mpsc::channel(8);
        let events = SessionEvents::new(SessionId(1), tx);
        let backend = SignedUrlVoiceBackend;
        let _connection = backend
            .establish(&format!("ws://{}", addr), events)
            .await
            .unwrap();

        assert_eq!(next_event(&mut rx).await, SessionEvent::Connected);
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::ModeChanged("speaking".into())
        );
        assert_eq!(next_event(&mut rx).await, SessionEvent::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_establish_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, _rx) = mpsc::channel(8);
        let result = SignedUrlVoiceBackend
            .establish(&format!("ws://{}", addr), SessionEvents::new(SessionId(1), tx))
            .await;
        assert!(matches!(result, Err(SessionError::SessionEstablishFailed(_))));
    }
}
