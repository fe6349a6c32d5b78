//! Per-session terminal state and close handling.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::session::{CloseStatus, SavedMode, Session};

pub struct SessionLifecycle {
    cancel: CancellationToken,
    close_status: CloseStatus,
    closed: AtomicBool,
}

impl SessionLifecycle {
    pub fn new(cancel: CancellationToken, close_status: CloseStatus) -> Self {
        Self {
            cancel,
            close_status,
            closed: AtomicBool::new(false),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs one attempt with the session's terminal mode saved around it.
    ///
    /// The saved mode is restored when the attempt returns, fails, or is
    /// cut short by cancellation.
    pub async fn guard<S, F>(&self, session: &S, attempt: F) -> Result<(), BridgeError>
    where
        S: Session,
        F: Future<Output = Result<(), BridgeError>>,
    {
        let saved = save_mode(session);

        let result = tokio::select! {
            res = attempt => res,
            _ = self.cancel.cancelled() => {
                info!("Session interrupted");
                Err(BridgeError::Cancelled)
            }
        };

        if let Some(saved) = saved {
            match saved.restore() {
                Ok(()) => debug!("Terminal mode restored"),
                Err(e) => warn!("Failed to restore terminal mode: {}", e),
            }
        }
        result
    }

    /// Closes the session with the configured status. Only the first call
    /// reaches the session.
    pub async fn close<S: Session>(&self, session: &S) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let status = &self.close_status;
        debug!(code = status.code, reason = %status.reason, "Closing session");
        session.close(status).await;
    }
}

fn save_mode<S: Session>(session: &S) -> Option<SavedMode> {
    let control = session.raw_mode()?;
    match control.save() {
        Ok(saved) => Some(saved),
        Err(e) => {
            debug!("Terminal mode not captured: {}", e);
            None
        }
    }
}
