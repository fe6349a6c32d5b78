//! Scripted fakes shared by the unit tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::session::{CloseStatus, RawModeControl, SavedMode, Session};

/// In-memory session fed from a script.
///
/// `receive` waits once the script runs dry, like an idle browser.
pub struct ScriptedSession {
    inbound_tx: mpsc::UnboundedSender<Result<Vec<u8>, SessionError>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Vec<u8>, SessionError>>>,
    sent: Mutex<Vec<Vec<u8>>>,
    send_attempts: AtomicUsize,
    send_error: Mutex<Option<SessionError>>,
    closes: Mutex<Vec<CloseStatus>>,
    terminal: Option<RecordingTerminal>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            send_error: Mutex::new(None),
            closes: Mutex::new(Vec::new()),
            terminal: None,
        }
    }

    pub fn with_terminal(terminal: RecordingTerminal) -> Self {
        Self {
            terminal: Some(terminal),
            ..Self::new()
        }
    }

    pub fn push_inbound(&self, text: &str) {
        self.push_inbound_bytes(text.as_bytes().to_vec());
    }

    pub fn push_inbound_bytes(&self, payload: Vec<u8>) {
        let _ = self.inbound_tx.send(Ok(payload));
    }

    pub fn push_receive_error(&self, err: SessionError) {
        let _ = self.inbound_tx.send(Err(err));
    }

    pub fn fail_sends(&self, err: SessionError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> Vec<CloseStatus> {
        self.closes.lock().unwrap().clone()
    }
}

impl Session for ScriptedSession {
    async fn receive(&self) -> Result<Vec<u8>, SessionError> {
        match self.inbound_rx.lock().await.recv().await {
            Some(frame) => frame,
            None => Err(SessionError::Closed),
        }
    }

    async fn send(&self, payload: &[u8]) -> Result<(), SessionError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    async fn close(&self, status: &CloseStatus) {
        self.closes.lock().unwrap().push(status.clone());
    }

    fn raw_mode(&self) -> Option<&dyn RawModeControl> {
        self.terminal.as_ref().map(|t| t as &dyn RawModeControl)
    }
}

/// Terminal that counts captures and restores.
#[derive(Clone, Default)]
pub struct RecordingTerminal {
    saves: Arc<AtomicUsize>,
    restores: Arc<AtomicUsize>,
    fail_save: bool,
}

impl RecordingTerminal {
    pub fn failing() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl RawModeControl for RecordingTerminal {
    fn save(&self) -> io::Result<SavedMode> {
        if self.fail_save {
            return Err(io::Error::other("not a terminal"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        let restores = self.restores.clone();
        Ok(SavedMode::new(move || {
            restores.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }
}
