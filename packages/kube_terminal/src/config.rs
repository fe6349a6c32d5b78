use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use terminal_bridge::{
    BridgeOptions, CloseStatus, FrameProtocol, OrchestratorConfig, ShellCommands,
};

// =============================================================================
// File config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [session]
//                    protocol = "tagged"
//
//   env var:         KUBE_TERMINAL_SESSION__PROTOCOL=tagged   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub kube: KubeFileConfig,
    #[serde(default)]
    pub shell: ShellCommands,
    #[serde(default)]
    pub session: SessionFileConfig,
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path the terminal WebSocket is served on.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

/// Cluster access (lives under `[kube]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KubeFileConfig {
    /// Kubeconfig file. When unset the default kubeconfig or in-cluster
    /// service account is used.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

/// Per-session behavior (lives under `[session]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionFileConfig {
    #[serde(default)]
    pub protocol: FrameProtocol,
    #[serde(default = "default_close_code")]
    pub close_code: u16,
    #[serde(default = "default_close_reason")]
    pub close_reason: String,
    #[serde(default = "default_resize_queue_depth")]
    pub resize_queue_depth: usize,
}

impl Default for SessionFileConfig {
    fn default() -> Self {
        Self {
            protocol: FrameProtocol::default(),
            close_code: default_close_code(),
            close_reason: default_close_reason(),
            resize_queue_depth: default_resize_queue_depth(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_path() -> String {
    "/terminal/ws".to_string()
}
fn default_close_code() -> u16 {
    CloseStatus::default().code
}
fn default_close_reason() -> String {
    CloseStatus::default().reason
}
fn default_resize_queue_depth() -> usize {
    1
}

/// Build a figment that layers: defaults → config file → KUBE_TERMINAL_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `KUBE_TERMINAL_SERVER__PORT=9000`  →  `server.port = 9000`
///   `KUBE_TERMINAL_KUBE__KUBECONFIG=/etc/kube/config`  →  `kube.kubeconfig = ...`
pub fn load_config(config_file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("KUBE_TERMINAL_").split("__"))
}

/// Values given on the command line; they win over every figment layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub kubeconfig: Option<PathBuf>,
}

impl FileConfig {
    pub fn apply(&mut self, overrides: CliOverrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(kubeconfig) = overrides.kubeconfig {
            self.kube.kubeconfig = Some(kubeconfig);
        }
    }
}

// =============================================================================
// Runtime config (derived from FileConfig, used by the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub path: String,
    pub orchestrator: OrchestratorConfig,
    pub commands: ShellCommands,
    pub bridge: BridgeOptions,
    pub close: CloseStatus,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let addr = format!("{}:{}", fc.server.host, fc.server.port)
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "Invalid listen address: {}:{}",
                    fc.server.host, fc.server.port
                )
            })?;

        if fc.shell.primary.is_empty() || fc.shell.fallback.is_empty() {
            anyhow::bail!("shell.primary and shell.fallback must name a command");
        }

        let path = if fc.server.path.starts_with('/') {
            fc.server.path.clone()
        } else {
            format!("/{}", fc.server.path)
        };

        Ok(Self {
            addr,
            path,
            orchestrator: OrchestratorConfig {
                kubeconfig: fc.kube.kubeconfig.clone(),
            },
            commands: fc.shell.clone(),
            bridge: BridgeOptions {
                protocol: fc.session.protocol,
                resize_queue_depth: fc.session.resize_queue_depth,
            },
            close: CloseStatus {
                code: fc.session.close_code,
                reason: fc.session.close_reason.clone(),
            },
        })
    }
}
