//! Kube Terminal - browser terminal sessions into Kubernetes pods
//!
//! Serves a WebSocket endpoint that bridges each browser connection to an
//! interactive shell running in a pod through the `exec` subresource. The
//! bridging logic lives in `terminal_bridge`; this crate supplies the
//! WebSocket session, the kube-rs resolver and transport, configuration
//! and the HTTP server.

pub mod cluster;
pub mod config;
pub mod server;
pub mod ws_session;

pub use cluster::{KubeExecTransport, KubeconfigResolver};
pub use config::{CliOverrides, FileConfig, ServerConfig, load_config};
pub use server::{AppState, router};
pub use ws_session::WsSession;
