//! The session contract the bridge runs over.
//!
//! A session is a message-framed duplex channel owned by the transport layer
//! (a browser WebSocket in production). The bridge only needs to receive one
//! frame, send one frame, and close the channel once.

use std::future::Future;
use std::io;

use tracing::warn;

use crate::error::SessionError;

/// Status code and reason sent when the bridge closes a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseStatus {
    pub code: u16,
    pub reason: String,
}

impl Default for CloseStatus {
    fn default() -> Self {
        Self {
            code: 1000,
            reason: "exit close 0".to_string(),
        }
    }
}

pub trait Session: Send + Sync {
    /// Waits for the next inbound frame payload.
    fn receive(&self) -> impl Future<Output = Result<Vec<u8>, SessionError>> + Send;

    /// Sends `payload` as a single outbound frame.
    fn send(&self, payload: &[u8]) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Closes the session. Implementations ignore calls after the first.
    fn close(&self, status: &CloseStatus) -> impl Future<Output = ()> + Send;

    /// Terminal mode control for transports backed by a file descriptor.
    fn raw_mode(&self) -> Option<&dyn RawModeControl> {
        None
    }
}

/// Capture and restore of terminal mode on a session's underlying handle.
pub trait RawModeControl: Send + Sync {
    /// Captures the current mode. Dropping the returned guard restores it.
    fn save(&self) -> io::Result<SavedMode>;
}

/// RAII guard that runs its restore action exactly once.
pub struct SavedMode {
    restore: Option<Box<dyn FnOnce() -> io::Result<()> + Send>>,
}

impl SavedMode {
    pub fn new(restore: impl FnOnce() -> io::Result<()> + Send + 'static) -> Self {
        Self {
            restore: Some(Box::new(restore)),
        }
    }

    /// Restores now and reports the outcome.
    pub fn restore(mut self) -> io::Result<()> {
        match self.restore.take() {
            Some(restore) => restore(),
            None => Ok(()),
        }
    }
}

impl Drop for SavedMode {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            if let Err(e) = restore() {
                warn!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

#[cfg(unix)]
pub use fd::FdTerminal;

#[cfg(unix)]
mod fd {
    use std::io;
    use std::os::fd::OwnedFd;
    use std::sync::Arc;

    use nix::sys::termios::{self, SetArg};

    use super::{RawModeControl, SavedMode};

    /// Terminal mode control over an owned file descriptor.
    #[derive(Clone)]
    pub struct FdTerminal {
        fd: Arc<OwnedFd>,
    }

    impl FdTerminal {
        pub fn new(fd: OwnedFd) -> Self {
            Self { fd: Arc::new(fd) }
        }
    }

    impl RawModeControl for FdTerminal {
        fn save(&self) -> io::Result<SavedMode> {
            let original = termios::tcgetattr(self.fd.as_ref()).map_err(io::Error::from)?;
            let fd = self.fd.clone();
            Ok(SavedMode::new(move || {
                termios::tcsetattr(fd.as_ref(), SetArg::TCSANOW, &original).map_err(io::Error::from)
            }))
        }
    }
}
