//! Voice conversation session
//!
//! Starting a session is a three step affair (microphone, signed URL, voice
//! connection) that runs off the event loop. `ConversationSession` owns the
//! single session slot; everything else here is a seam to the outside world.

mod conversation;
mod credentials;
mod error;
mod microphone;
mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::{ConversationSession, ReadyOutcome, SessionLauncher};
pub use credentials::{CredentialProvider, HttpCredentialProvider};
pub use error::SessionError;
pub use microphone::{DeviceMicrophone, MicrophoneGate};
pub use voice::{
    SessionEvent, SessionEvents, SessionId, SignedUrlVoiceBackend, VoiceBackend, VoiceConnection,
};
