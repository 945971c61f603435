//! Microphone capability check

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, warn};

/// Grants or denies access to the microphone
#[async_trait]
pub trait MicrophoneGate: Send + Sync {
    /// Ask for capture access; `false` means denied
    async fn request(&self) -> bool;
}

/// Grants access when the capture device node is present
#[derive(Debug, Clone)]
pub struct DeviceMicrophone {
    device: PathBuf,
}

impl DeviceMicrophone {
    pub fn new(device: &Path) -> Self {
        Self {
            device: device.to_owned(),
        }
    }
}

#[async_trait]
impl MicrophoneGate for DeviceMicrophone {
    async fn request(&self) -> bool {
        match tokio::fs::try_exists(&self.device).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(device = ?self.device, "microphone permission denied: capture device missing");
                false
            }
            Err(e) => {
                error!(?e, device = ?self.device, "microphone permission denied");
                false
            }
        }
    }
}
