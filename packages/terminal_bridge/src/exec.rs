//! Execution orchestration against a cluster's pod exec endpoint.
//!
//! Cluster connection resolution and the exec wire protocol are collaborators
//! behind [`ConnectionResolver`] and [`ExecTransport`]; the orchestrator wires
//! the session adapter and resize queue into them for one attempt.

use std::future::Future;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapter::StreamAdapter;
use crate::bridge::BridgeState;
use crate::error::BridgeError;
use crate::resize_queue::TerminalSizeQueue;
use crate::session::Session;

/// Bytes escaped inside one path segment: the URL path set plus `/` and `%`.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Which container a session execs into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTarget {
    /// Kubeconfig context; empty selects the current context.
    #[serde(default)]
    pub context: String,
    pub namespace: String,
    pub pod: String,
    /// Empty selects the pod's default container.
    #[serde(default)]
    pub container: String,
}

/// One exec call against the pod `exec` subresource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub command: Vec<String>,
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
    pub tty: bool,
}

impl ExecRequest {
    /// Interactive TTY request: stdin, stdout, stderr and tty all enabled.
    pub fn interactive(target: &ExecTarget, command: &[String]) -> Self {
        Self {
            namespace: target.namespace.clone(),
            pod: target.pod.clone(),
            container: target.container.clone(),
            command: command.to_vec(),
            stdin: true,
            stdout: true,
            stderr: true,
            tty: true,
        }
    }

    /// Core API (`/api`, group "", version `v1`) path with query parameters.
    /// Namespace and pod are percent-encoded as single path segments.
    pub fn path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if !self.container.is_empty() {
            query.append_pair("container", &self.container);
        }
        for arg in &self.command {
            query.append_pair("command", arg);
        }
        query
            .append_pair("stdin", bool_param(self.stdin))
            .append_pair("stdout", bool_param(self.stdout))
            .append_pair("stderr", bool_param(self.stderr))
            .append_pair("tty", bool_param(self.tty));

        format!(
            "/api/v1/namespaces/{}/pods/{}/exec?{}",
            utf8_percent_encode(&self.namespace, PATH_SEGMENT),
            utf8_percent_encode(&self.pod, PATH_SEGMENT),
            query.finish()
        )
    }
}

fn bool_param(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Streams handed to the exec transport for one attempt.
pub struct StreamOptions<'a, S> {
    pub stdin: &'a StreamAdapter<S>,
    pub stdout: &'a StreamAdapter<S>,
    pub stderr: &'a StreamAdapter<S>,
    pub tty: bool,
    pub sizes: &'a TerminalSizeQueue,
}

/// Turns a kubeconfig context into a ready-to-use cluster connection.
pub trait ConnectionResolver: Send + Sync {
    type Connection: Send;

    fn resolve(
        &self,
        context: &str,
        kubeconfig: Option<&Path>,
    ) -> impl Future<Output = Result<Self::Connection, BridgeError>> + Send;
}

/// Runs an exec request over a resolved connection until the remote
/// process exits or the stream fails.
pub trait ExecTransport<C>: Send + Sync {
    fn stream<S: Session>(
        &self,
        connection: C,
        request: &ExecRequest,
        options: StreamOptions<'_, S>,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

/// Settings fixed when the orchestrator is built.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Explicit kubeconfig file; `None` lets the resolver infer one.
    pub kubeconfig: Option<PathBuf>,
}

pub struct Orchestrator<R, T> {
    resolver: R,
    transport: T,
    config: OrchestratorConfig,
}

impl<R, T> Orchestrator<R, T>
where
    R: ConnectionResolver,
    T: ExecTransport<R::Connection>,
{
    pub fn new(resolver: R, transport: T, config: OrchestratorConfig) -> Self {
        Self {
            resolver,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One orchestration attempt: resolve, build the request, stream.
    pub async fn run<S: Session>(
        &self,
        state: &BridgeState<S>,
        command: &[String],
    ) -> Result<(), BridgeError> {
        let target = state.target();
        let connection = self
            .resolver
            .resolve(&target.context, self.config.kubeconfig.as_deref())
            .await?;

        let request = ExecRequest::interactive(target, command);
        info!(path = %request.path(), "Opening exec stream");

        let adapter = state.adapter();
        let options = StreamOptions {
            stdin: adapter,
            stdout: adapter,
            stderr: adapter,
            tty: request.tty,
            sizes: adapter.sizes(),
        };
        self.transport.stream(connection, &request, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeOptions;
    use crate::test_support::ScriptedSession;
    use std::sync::Mutex;

    fn target() -> ExecTarget {
        ExecTarget {
            context: "staging".into(),
            namespace: "default".into(),
            pod: "web-0".into(),
            container: "app".into(),
        }
    }

    #[test]
    fn interactive_request_enables_all_streams() {
        let request = ExecRequest::interactive(&target(), &["/bin/bash".to_string()]);
        assert!(request.stdin && request.stdout && request.stderr && request.tty);
        assert_eq!(request.command, vec!["/bin/bash"]);
        assert_eq!(request.container, "app");
    }

    #[test]
    fn request_path() {
        let request = ExecRequest::interactive(&target(), &["/bin/bash".to_string()]);
        assert_eq!(
            request.path(),
            "/api/v1/namespaces/default/pods/web-0/exec?container=app&command=%2Fbin%2Fbash\
             &stdin=true&stdout=true&stderr=true&tty=true"
        );
    }

    #[test]
    fn request_path_without_container_repeats_command() {
        let target = ExecTarget {
            container: String::new(),
            ..target()
        };
        let command = vec!["sh".to_string(), "-c".to_string(), "echo a b".to_string()];
        let path = ExecRequest::interactive(&target, &command).path();
        assert!(!path.contains("container="));
        assert!(path.contains("command=sh&command=-c&command=echo+a+b"));
    }

    #[test]
    fn request_path_escapes_namespace_and_pod() {
        let target = ExecTarget {
            namespace: "team a".into(),
            pod: "web/0?x#y%".into(),
            ..target()
        };
        let path = ExecRequest::interactive(&target, &["sh".to_string()]).path();
        let prefix = "/api/v1/namespaces/team%20a/pods/web%2F0%3Fx%23y%25/exec?";
        assert!(path.starts_with(prefix), "{path}");
        assert!(path.contains("container=app&command=sh"));
    }

    #[derive(Default)]
    struct RecordingResolver {
        calls: Mutex<Vec<(String, Option<PathBuf>)>>,
        fail: bool,
    }

    impl ConnectionResolver for RecordingResolver {
        type Connection = String;

        async fn resolve(
            &self,
            context: &str,
            kubeconfig: Option<&Path>,
        ) -> Result<String, BridgeError> {
            self.calls
                .lock()
                .unwrap()
                .push((context.to_string(), kubeconfig.map(Path::to_path_buf)));
            if self.fail {
                return Err(BridgeError::Resolve {
                    context: context.to_string(),
                    message: "no such context".into(),
                });
            }
            Ok(format!("conn:{context}"))
        }
    }

    /// Echoes one input chunk back as output and forwards one resize.
    #[derive(Default)]
    struct EchoTransport {
        seen: Mutex<Vec<(String, ExecRequest)>>,
    }

    impl ExecTransport<String> for EchoTransport {
        async fn stream<S: Session>(
            &self,
            connection: String,
            request: &ExecRequest,
            options: StreamOptions<'_, S>,
        ) -> Result<(), BridgeError> {
            self.seen
                .lock()
                .unwrap()
                .push((connection, request.clone()));
            assert!(options.tty);

            let mut buf = [0u8; 32];
            let n = loop {
                let n = options.stdin.read(&mut buf).await?;
                if n > 0 {
                    break n;
                }
            };
            options.stdout.write(&buf[..n]).await?;
            let size = options.sizes.next().await;
            options.stderr.write(format!("{size:?}").as_bytes()).await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_wires_adapter_and_queue_into_transport() {
        let session = ScriptedSession::new();
        session.push_inbound(r#"{"cols":80,"rows":24}"#);
        session.push_inbound("ls\n");
        let state = BridgeState::new(session, target(), &BridgeOptions::default());

        let orchestrator = Orchestrator::new(
            RecordingResolver::default(),
            EchoTransport::default(),
            OrchestratorConfig {
                kubeconfig: Some(PathBuf::from("/etc/kube/config")),
            },
        );
        orchestrator
            .run(&state, &["/bin/bash".to_string()])
            .await
            .unwrap();

        let resolves = orchestrator.resolver.calls.lock().unwrap().clone();
        assert_eq!(
            resolves,
            vec![(
                "staging".to_string(),
                Some(PathBuf::from("/etc/kube/config"))
            )]
        );
        let seen = orchestrator.transport.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "conn:staging");
        assert_eq!(seen[0].1.pod, "web-0");

        let sent = state.adapter().session().sent();
        assert_eq!(sent[0], b"ls\n".to_vec());
        assert_eq!(
            sent[1],
            b"Some(TerminalSize { width: 80, height: 24 })".to_vec()
        );
    }

    #[tokio::test]
    async fn resolve_failure_skips_transport() {
        let state = BridgeState::new(ScriptedSession::new(), target(), &BridgeOptions::default());
        let orchestrator = Orchestrator::new(
            RecordingResolver {
                fail: true,
                ..Default::default()
            },
            EchoTransport::default(),
            OrchestratorConfig::default(),
        );

        let err = orchestrator
            .run(&state, &["/bin/bash".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Resolve { ref context, .. } if context == "staging"));
        assert!(orchestrator.transport.seen.lock().unwrap().is_empty());
    }
}
