//! Terminal Bridge - connects a browser terminal session to a remote exec stream
//!
//! This crate carries no HTTP or cluster client dependencies. The session
//! transport, the cluster connection resolver and the exec transport are
//! supplied by the embedding application through the [`Session`],
//! [`ConnectionResolver`] and [`ExecTransport`] traits.
//!
//! # Example
//!
//! ```ignore
//! use terminal_bridge::{
//!     BridgeOptions, BridgeState, CloseStatus, Orchestrator, OrchestratorConfig,
//!     SessionLifecycle, ShellCommands, run_session,
//! };
//!
//! let state = BridgeState::new(session, target, &BridgeOptions::default());
//! let orchestrator = Orchestrator::new(resolver, transport, OrchestratorConfig::default());
//! let lifecycle = SessionLifecycle::new(cancel, CloseStatus::default());
//!
//! let attempts = run_session(&state, &orchestrator, &ShellCommands::default(), &lifecycle).await;
//! for err in attempts.errors() {
//!     eprintln!("{err}");
//! }
//! ```

pub mod adapter;
pub mod bridge;
mod error;
pub mod exec;
pub mod frame;
pub mod lifecycle;
pub mod pump;
pub mod resize_queue;
pub mod session;

#[cfg(test)]
mod test_support;

pub use adapter::StreamAdapter;
pub use bridge::{Attempts, BridgeOptions, BridgeState, ShellCommands, run_session};
pub use error::{BridgeError, SessionError};
pub use exec::{
    ConnectionResolver, ExecRequest, ExecTarget, ExecTransport, Orchestrator, OrchestratorConfig,
    StreamOptions,
};
pub use frame::{ControlMessage, FrameProtocol, InboundFrame};
pub use lifecycle::SessionLifecycle;
pub use pump::{RemoteStreams, run_stream};
pub use resize_queue::{TerminalSize, TerminalSizeQueue};
pub use session::{CloseStatus, RawModeControl, SavedMode, Session};

#[cfg(unix)]
pub use session::FdTerminal;
