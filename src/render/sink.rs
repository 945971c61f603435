//! Frame sinks
//!
//! The display front-end polls a single image file. Writes go through a
//! temporary file and a rename so a reader never sees half a frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{trace, warn};

use super::lease::FrameLease;

/// Errors that can occur while setting up a frame sink
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create frame directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for rendered frames
pub trait FrameSink: Send {
    /// Take a frame for display
    ///
    /// The sink owns the lease and must drop it only after the display has
    /// consumed the frame.
    fn present(&mut self, frame: FrameLease);
}

/// Writes the latest frame to a file
pub struct FileFrameSink {
    path: PathBuf,
    latest: Arc<AtomicU64>,
    write_lock: Arc<Mutex<()>>,
}

impl FileFrameSink {
    pub fn new(path: &Path) -> Result<Self, RenderError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| RenderError::CreateDir {
                path: parent.to_owned(),
                source,
            })?;
        }

        Ok(Self {
            path: path.to_owned(),
            latest: Arc::new(AtomicU64::new(0)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for FileFrameSink {
    fn present(&mut self, frame: FrameLease) {
        let id = frame.id().0;
        self.latest.store(id, Ordering::Release);

        let path = self.path.clone();
        let latest = Arc::clone(&self.latest);
        let write_lock = Arc::clone(&self.write_lock);

        tokio::task::spawn_blocking(move || {
            let _guard = match write_lock.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            if latest.load(Ordering::Acquire) != id {
                trace!(frame = %frame.id(), "frame superseded before write");
                return;
            }

            if let Err(e) = write_replace(&path, frame.payload()) {
                warn!(?e, frame = %frame.id(), "failed to write frame");
            }
            // Lease drops here, after the display file has been replaced
        });
    }
}

fn write_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
