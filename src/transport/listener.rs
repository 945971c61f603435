//! Signal server connection
//!
//! Runs a reader task that forwards classified frames into the state
//! machine's input queue in arrival order. When the server goes away the
//! task logs it and stops; nothing is reported to the state machine.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::events::Input;

use super::message::InboundMessage;

type SignalStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close()` waits for the reader task before aborting it
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors that can occur while connecting to the signal server
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to signal server at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
}

/// Entry point for the signal feed
pub struct SignalTransport;

impl SignalTransport {
    /// Connect to the signal server and start delivering messages
    pub async fn connect(
        url: &str,
        input_tx: mpsc::Sender<Input>,
    ) -> Result<SignalConnection, TransportError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_owned(),
                source,
            })?;

        info!(url, "connected to signal server");

        let (sink, stream) = ws_stream.split();
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(read_loop(stream, sink, input_tx, close_rx));

        Ok(SignalConnection {
            close_tx: Some(close_tx),
            task: Some(task),
        })
    }
}

/// Handle to a live signal connection
pub struct SignalConnection {
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SignalConnection {
    /// Whether the reader task has stopped (server closed, error, or `close()`)
    pub fn is_closed(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Send a close frame and stop delivering messages
    pub async fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                warn!("signal reader did not stop in time, aborting");
                task.abort();
            }
        }

        info!("signal connection closed");
    }
}

impl Drop for SignalConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Forward frames until the server closes, an error occurs, or we are told to stop
async fn read_loop(
    mut stream: SplitStream<SignalStream>,
    mut sink: SplitSink<SignalStream, Message>,
    input_tx: mpsc::Sender<Input>,
    mut close_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut close_rx => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(?e, "close frame not sent");
                }
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(reason))) => {
                    info!(?reason, "signal server closed connection");
                    return;
                }
                Some(Ok(message)) => {
                    let Some(inbound) = InboundMessage::classify(message) else {
                        continue;
                    };
                    debug!(kind = inbound.kind(), "signal message received");
                    if input_tx.send(Input::Signal(inbound)).await.is_err() {
                        warn!("state machine gone, dropping signal feed");
                        return;
                    }
                }
                Some(Err(e)) => {
                    error!(?e, "signal connection error");
                    return;
                }
                None => {
                    info!("signal connection ended");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    /// Serve one websocket client with the given frames, then close
    async fn serve(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            let _ = ws.close(None).await;
        });

        format!("ws://{}", addr)
    }

    async fn next_signal(rx: &mut mpsc::Receiver<Input>) -> InboundMessage {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(Input::Signal(msg))) => msg,
            other => panic!("expected signal input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_messages_delivered_in_order() {
        let url = serve(vec![
            Message::Text("Person detected but arms not raised".into()),
            Message::Binary(Bytes::from_static(b"jpeg-1")),
            Message::Text("Game Started".into()),
        ])
        .await;

        let (tx, mut rx) = mpsc::channel(8);
        let connection = SignalTransport::connect(&url, tx).await.unwrap();

        assert_eq!(
            next_signal(&mut rx).await,
            InboundMessage::Text("Person detected but arms not raised".to_string())
        );
        assert_eq!(
            next_signal(&mut rx).await,
            InboundMessage::Binary(Bytes::from_static(b"jpeg-1"))
        );
        assert_eq!(
            next_signal(&mut rx).await,
            InboundMessage::Text("Game Started".to_string())
        );

        // Server close stops delivery without an error input
        tokio::time::timeout(Duration::from_secs(5), async {
            while !connection.is_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, _rx) = mpsc::channel(8);
        let result = SignalTransport::connect(&format!("ws://{}", addr), tx).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (tx, _rx) = mpsc::channel(8);
        let mut connection = SignalTransport::connect(&format!("ws://{}", addr), tx)
            .await
            .unwrap();
        assert!(!connection.is_closed());

        connection.close().await;
        assert!(connection.is_closed());
        connection.close().await;
    }
}
