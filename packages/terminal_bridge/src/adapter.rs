//! Duplex stream view of a [`Session`].
//!
//! The exec transport reads terminal input and writes process output through
//! this adapter. Resize frames are diverted into the [`TerminalSizeQueue`]
//! on the read path and never reach the input stream.

use std::sync::Mutex;

use tracing::{debug, trace};

use crate::error::SessionError;
use crate::frame::{FrameProtocol, InboundFrame};
use crate::resize_queue::{TerminalSize, TerminalSizeQueue};
use crate::session::Session;

pub struct StreamAdapter<S> {
    session: S,
    sizes: TerminalSizeQueue,
    protocol: FrameProtocol,
    /// Input bytes received but not yet handed to a reader.
    pending: Mutex<Vec<u8>>,
}

impl<S: Session> StreamAdapter<S> {
    pub fn new(session: S, sizes: TerminalSizeQueue, protocol: FrameProtocol) -> Self {
        Self {
            session,
            sizes,
            protocol,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn sizes(&self) -> &TerminalSizeQueue {
        &self.sizes
    }

    /// Reads terminal input into `buf`.
    ///
    /// `Ok(0)` means a resize frame was consumed and queued; call again for
    /// input. End of session is reported as an error, never as `Ok(0)`.
    /// A payload larger than `buf` is delivered across consecutive reads.
    /// An empty `buf` returns `Ok(0)` without polling the session.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(n) = self.drain_pending(buf) {
            return Ok(n);
        }

        let payload = self.session.receive().await?;
        match self.protocol.decode(payload) {
            InboundFrame::Resize(size) => {
                self.push_resize(size).await;
                Ok(0)
            }
            InboundFrame::Input(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.lock_pending().extend_from_slice(&bytes[n..]);
                }
                trace!(bytes = n, "terminal input");
                Ok(n)
            }
        }
    }

    /// Sends `buf` as exactly one frame.
    ///
    /// The frame is the unit of delivery: on success the whole buffer counts
    /// as written. Errors are returned as-is and not retried.
    pub async fn write(&self, buf: &[u8]) -> Result<usize, SessionError> {
        self.session.send(buf).await?;
        Ok(buf.len())
    }

    async fn push_resize(&self, size: TerminalSize) {
        debug!(
            cols = size.width,
            rows = size.height,
            "resize frame received"
        );
        self.sizes.push(size).await;
    }

    fn drain_pending(&self, buf: &mut [u8]) -> Option<usize> {
        let mut pending = self.lock_pending();
        if pending.is_empty() {
            return None;
        }
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        pending.drain(..n);
        Some(n)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
