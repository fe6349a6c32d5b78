use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Default number of resize events buffered before `push` waits for the consumer.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// Dimensions the remote pseudo-terminal should be resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub width: u16,
    pub height: u16,
}

/// Single-producer/single-consumer queue of resize events.
///
/// The queue owns both ends of its channel, so the consumer never sees the
/// channel close while the queue is alive. The receiver sits behind an async
/// mutex: only one stream loop drains it at a time.
pub struct TerminalSizeQueue {
    tx: mpsc::Sender<TerminalSize>,
    rx: Mutex<mpsc::Receiver<TerminalSize>>,
}

impl TerminalSizeQueue {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_QUEUE_DEPTH)
    }

    /// `depth` of zero is bumped to one; tokio channels need capacity.
    pub fn with_depth(depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Waits for room and enqueues `size`.
    pub async fn push(&self, size: TerminalSize) {
        // Both ends live in `self`, the send cannot observe a closed channel.
        let _ = self.tx.send(size).await;
    }

    /// Waits for the next resize event.
    pub async fn next(&self) -> Option<TerminalSize> {
        let size = self.rx.lock().await.recv().await?;
        debug!(width = size.width, height = size.height, "terminal size changed");
        Some(size)
    }

    #[cfg(test)]
    pub(crate) fn try_next(&self) -> Option<TerminalSize> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for TerminalSizeQueue {
    fn default() -> Self {
        Self::new()
    }
}
