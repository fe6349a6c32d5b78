//! kube-rs backed connection resolver and pod exec transport.

use std::path::Path;

use futures::SinkExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams, TerminalSize as KubeTerminalSize};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use terminal_bridge::{
    BridgeError, ConnectionResolver, ExecRequest, ExecTransport, RemoteStreams, Session,
    StreamOptions, TerminalSize, run_stream,
};
use tracing::{debug, info};

/// Resolves a kubeconfig context into a [`kube::Client`].
///
/// With an explicit kubeconfig path the file is read and the context picked
/// from it. Without one, a named context is looked up in the default
/// kubeconfig and an empty context falls back to `Config::infer`, which also
/// covers in-cluster service accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeconfigResolver;

impl ConnectionResolver for KubeconfigResolver {
    type Connection = Client;

    async fn resolve(
        &self,
        context: &str,
        kubeconfig: Option<&Path>,
    ) -> Result<Client, BridgeError> {
        let fail = |message: String| BridgeError::Resolve {
            context: context.to_string(),
            message,
        };
        let options = KubeConfigOptions {
            context: (!context.is_empty()).then(|| context.to_string()),
            ..Default::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let file = Kubeconfig::read_from(path)
                    .map_err(|e| fail(format!("reading {}: {e}", path.display())))?;
                Config::from_custom_kubeconfig(file, &options)
                    .await
                    .map_err(|e| fail(e.to_string()))?
            }
            None if options.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| fail(e.to_string()))?,
            None => Config::infer().await.map_err(|e| fail(e.to_string()))?,
        };
        debug!(cluster = %config.cluster_url, "Resolved cluster connection");

        Client::try_from(config).map_err(|e| fail(e.to_string()))
    }
}

/// Runs exec requests through the pod `exec` subresource.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeExecTransport;

impl ExecTransport<Client> for KubeExecTransport {
    async fn stream<S: Session>(
        &self,
        client: Client,
        request: &ExecRequest,
        options: StreamOptions<'_, S>,
    ) -> Result<(), BridgeError> {
        let pods: Api<Pod> = Api::namespaced(client, &request.namespace);
        let params = attach_params(request);

        let mut process = pods
            .exec(&request.pod, request.command.clone(), &params)
            .await
            .map_err(|e| BridgeError::Setup(e.to_string()))?;
        info!(pod = %request.pod, command = ?request.command, "Exec stream established");

        let stdin = process
            .stdin()
            .ok_or_else(|| BridgeError::Setup("exec stream has no stdin".into()))?;
        let stdout = process
            .stdout()
            .ok_or_else(|| BridgeError::Setup("exec stream has no stdout".into()))?;
        let stderr = process.stderr();
        let resize_tx = process
            .terminal_size()
            .ok_or_else(|| BridgeError::Setup("exec stream has no terminal size channel".into()))?;
        let status = process.take_status();

        let remote = RemoteStreams {
            stdin,
            stdout,
            stderr,
        };
        run_stream(options, remote, |size: TerminalSize| {
            let mut resize_tx = resize_tx.clone();
            async move {
                resize_tx
                    .send(KubeTerminalSize {
                        width: size.width,
                        height: size.height,
                    })
                    .await
                    .map_err(|e| BridgeError::Stream(format!("terminal size channel: {e}")))
            }
        })
        .await?;

        if let Some(status) = status {
            if let Some(status) = status.await {
                debug!(?status, "Exec finished");
                if status.status.as_deref() == Some("Failure") {
                    let message = status.message.as_deref().unwrap_or("remote command failed");
                    return Err(BridgeError::Stream(message.to_string()));
                }
            }
        }

        if let Err(e) = process.join().await {
            return Err(BridgeError::Stream(e.to_string()));
        }
        Ok(())
    }
}

/// Maps an exec request onto attach parameters. The API server rejects
/// stderr alongside a TTY, where it is merged into stdout.
fn attach_params(request: &ExecRequest) -> AttachParams {
    let params = AttachParams::default()
        .stdin(request.stdin)
        .stdout(request.stdout)
        .stderr(request.stderr && !request.tty)
        .tty(request.tty);
    if request.container.is_empty() {
        params
    } else {
        params.container(request.container.clone())
    }
}
