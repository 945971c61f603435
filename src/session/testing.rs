//! In-process stand-ins for the session collaborators

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::conversation::SessionLauncher;
use super::credentials::CredentialProvider;
use super::error::SessionError;
use super::microphone::MicrophoneGate;
use super::voice::{SessionEvent, SessionEvents, VoiceBackend, VoiceConnection};

/// Shared switches and counters for the fakes
#[derive(Debug)]
pub(crate) struct Fakes {
    microphone_granted: AtomicBool,
    credentials_fail: AtomicBool,
    mic_requests: AtomicUsize,
    fetches: AtomicUsize,
    establishes: AtomicUsize,
    ended: AtomicUsize,
}

impl Fakes {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            microphone_granted: AtomicBool::new(true),
            credentials_fail: AtomicBool::new(false),
            mic_requests: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            establishes: AtomicUsize::new(0),
            ended: AtomicUsize::new(0),
        })
    }

    pub(crate) fn launcher(self: &Arc<Self>) -> SessionLauncher {
        SessionLauncher::new(
            Arc::new(FakeMicrophone(Arc::clone(self))),
            Arc::new(FakeCredentials(Arc::clone(self))),
            Arc::new(FakeVoice(Arc::clone(self))),
        )
    }

    pub(crate) fn deny_microphone(&self) {
        self.microphone_granted.store(false, Ordering::SeqCst);
    }

    pub(crate) fn grant_microphone(&self) {
        self.microphone_granted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_credentials(&self) {
        self.credentials_fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mic_requests(&self) -> usize {
        self.mic_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn establishes(&self) -> usize {
        self.establishes.load(Ordering::SeqCst)
    }

    pub(crate) fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

struct FakeMicrophone(Arc<Fakes>);

#[async_trait]
impl MicrophoneGate for FakeMicrophone {
    async fn request(&self) -> bool {
        self.0.mic_requests.fetch_add(1, Ordering::SeqCst);
        self.0.microphone_granted.load(Ordering::SeqCst)
    }
}

struct FakeCredentials(Arc<Fakes>);

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn signed_url(&self) -> Result<String, SessionError> {
        self.0.fetches.fetch_add(1, Ordering::SeqCst);
        if self.0.credentials_fail.load(Ordering::SeqCst) {
            return Err(SessionError::CredentialFetchFailed(
                "HTTP status server error (503 Service Unavailable)".into(),
            ));
        }
        Ok("wss://agent.test/convai?token=signed".into())
    }
}

/// Establishes instantly and reports `Connected` right away
struct FakeVoice(Arc<Fakes>);

#[async_trait]
impl VoiceBackend for FakeVoice {
    async fn establish(
        &self,
        _signed_url: &str,
        events: SessionEvents,
    ) -> Result<Box<dyn VoiceConnection>, SessionError> {
        self.0.establishes.fetch_add(1, Ordering::SeqCst);
        events.emit(SessionEvent::Connected).await;
        Ok(Box::new(FakeConnection::new(&self.0)))
    }
}

#[derive(Debug)]
pub(crate) struct FakeConnection {
    fakes: Arc<Fakes>,
    ended: bool,
}

impl FakeConnection {
    pub(crate) fn new(fakes: &Arc<Fakes>) -> Self {
        Self {
            fakes: Arc::clone(fakes),
            ended: false,
        }
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.fakes.ended.fetch_add(1, Ordering::SeqCst);
        }
    }
}
