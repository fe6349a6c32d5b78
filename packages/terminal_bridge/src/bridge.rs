//! Per-session state and the primary/fallback shell policy.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::adapter::StreamAdapter;
use crate::error::BridgeError;
use crate::exec::{ConnectionResolver, ExecTarget, ExecTransport, Orchestrator};
use crate::frame::FrameProtocol;
use crate::lifecycle::SessionLifecycle;
use crate::resize_queue::{DEFAULT_QUEUE_DEPTH, TerminalSizeQueue};
use crate::session::Session;

/// Session-level knobs applied when a [`BridgeState`] is created.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub protocol: FrameProtocol,
    pub resize_queue_depth: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            protocol: FrameProtocol::default(),
            resize_queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Everything one browser session needs across its exec attempts.
pub struct BridgeState<S> {
    adapter: StreamAdapter<S>,
    target: ExecTarget,
}

impl<S: Session> BridgeState<S> {
    pub fn new(session: S, target: ExecTarget, options: &BridgeOptions) -> Self {
        let sizes = TerminalSizeQueue::with_depth(options.resize_queue_depth);
        Self {
            adapter: StreamAdapter::new(session, sizes, options.protocol),
            target,
        }
    }

    pub fn adapter(&self) -> &StreamAdapter<S> {
        &self.adapter
    }

    pub fn session(&self) -> &S {
        self.adapter.session()
    }

    pub fn target(&self) -> &ExecTarget {
        &self.target
    }
}

/// Shell tried first, and the one tried if it fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellCommands {
    pub primary: Vec<String>,
    pub fallback: Vec<String>,
}

impl Default for ShellCommands {
    fn default() -> Self {
        Self {
            primary: vec!["/bin/bash".to_string()],
            fallback: vec!["/bin/sh".to_string()],
        }
    }
}

/// Outcome of both attempts for one session.
#[derive(Debug)]
pub struct Attempts {
    pub primary: Result<(), BridgeError>,
    /// `None` when the primary succeeded or its failure was final.
    pub fallback: Option<Result<(), BridgeError>>,
}

impl Attempts {
    pub fn succeeded(&self) -> bool {
        match &self.fallback {
            Some(fallback) => fallback.is_ok(),
            None => self.primary.is_ok(),
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &BridgeError> {
        let fallback = self.fallback.as_ref().and_then(|r| r.as_ref().err());
        self.primary.as_ref().err().into_iter().chain(fallback)
    }
}

/// Runs the primary shell, falls back once, then closes the session.
pub async fn run_session<S, R, T>(
    state: &BridgeState<S>,
    orchestrator: &Orchestrator<R, T>,
    commands: &ShellCommands,
    lifecycle: &SessionLifecycle,
) -> Attempts
where
    S: Session,
    R: ConnectionResolver,
    T: ExecTransport<R::Connection>,
{
    let primary = lifecycle
        .guard(state.session(), orchestrator.run(state, &commands.primary))
        .await;

    let fallback = match &primary {
        Ok(()) => {
            info!(command = ?commands.primary, "Shell exited");
            None
        }
        Err(e) if e.should_fall_back() => {
            error!(command = ?commands.primary, "Shell failed: {}", e);
            let fallback = lifecycle
                .guard(state.session(), orchestrator.run(state, &commands.fallback))
                .await;
            match &fallback {
                Ok(()) => info!(command = ?commands.fallback, "Fallback shell exited"),
                Err(e) => error!(command = ?commands.fallback, "Fallback shell failed: {}", e),
            }
            Some(fallback)
        }
        Err(e) => {
            warn!(command = ?commands.primary, "Shell failed, not falling back: {}", e);
            None
        }
    };

    lifecycle.close(state.session()).await;
    Attempts { primary, fallback }
}
