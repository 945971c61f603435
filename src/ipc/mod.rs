//! IPC module for daemon-display communication

mod protocol;
mod server;

pub use protocol::{KioskStatus, Request, Response};
pub use server::Server;
