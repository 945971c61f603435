//! Inbound message classification

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// A frame from the signal server, as the state machine sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// UTF-8 control string, exactly as sent
    Text(String),
    /// Complete encoded image, opaque
    Binary(Bytes),
}

impl InboundMessage {
    /// Classify a websocket frame
    ///
    /// Control frames (ping, pong, close) carry nothing for the state machine
    /// and yield `None`.
    pub fn classify(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            Message::Binary(payload) => Some(Self::Binary(payload)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }

    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Text(_) => "text",
            InboundMessage::Binary(_) => "binary",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_kept_verbatim() {
        let msg = InboundMessage::classify(Message::Text(" Game Started ".into())).unwrap();
        assert_eq!(msg, InboundMessage::Text(" Game Started ".to_string()));
        assert_eq!(msg.kind(), "text");
    }

    #[test]
    fn test_binary_passthrough() {
        let payload = Bytes::from_static(&[0xff, 0xd8, 0xff, 0xe0]);
        let msg = InboundMessage::classify(Message::Binary(payload.clone())).unwrap();
        assert_eq!(msg, InboundMessage::Binary(payload));
        assert_eq!(msg.kind(), "binary");
    }

    #[test]
    fn test_control_frames_dropped() {
        assert!(InboundMessage::classify(Message::Ping(Bytes::new())).is_none());
        assert!(InboundMessage::classify(Message::Pong(Bytes::new())).is_none());
        assert!(InboundMessage::classify(Message::Close(None)).is_none());
    }
}
