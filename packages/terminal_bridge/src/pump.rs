//! Stream loop shared by exec transports.
//!
//! Three pumps run concurrently for the life of a remote process: session
//! input into the remote stdin, remote output into the session, and queued
//! resize events into the transport's size channel. The loop ends when the
//! remote output reaches EOF or any pump fails.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::adapter::StreamAdapter;
use crate::error::BridgeError;
use crate::exec::StreamOptions;
use crate::resize_queue::{TerminalSize, TerminalSizeQueue};
use crate::session::Session;

const PUMP_BUFFER_BYTES: usize = 4096;

/// Remote ends of an exec stream, as provided by a transport.
pub struct RemoteStreams<W, R, E> {
    pub stdin: W,
    pub stdout: R,
    /// Absent when the remote merges stderr into a TTY.
    pub stderr: Option<E>,
}

pub async fn run_stream<S, W, R, E, F, Fut>(
    options: StreamOptions<'_, S>,
    remote: RemoteStreams<W, R, E>,
    deliver_size: F,
) -> Result<(), BridgeError>
where
    S: Session,
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    F: FnMut(TerminalSize) -> Fut,
    Fut: Future<Output = Result<(), BridgeError>>,
{
    let RemoteStreams {
        stdin,
        stdout,
        stderr,
    } = remote;

    let stderr_pump = async {
        match stderr {
            Some(stderr) => {
                pump_output(stderr, options.stderr).await?;
                // stdout decides when the process is done
                std::future::pending::<Result<(), BridgeError>>().await
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        res = pump_output(stdout, options.stdout) => res,
        res = pump_input(options.stdin, stdin) => res,
        res = stderr_pump => res,
        res = pump_sizes(options.sizes, deliver_size) => res,
    }
}

/// Copies remote output into the session until EOF.
pub async fn pump_output<S, R>(mut reader: R, adapter: &StreamAdapter<S>) -> Result<(), BridgeError>
where
    S: Session,
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_BYTES];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| BridgeError::Stream(format!("reading remote output: {e}")))?;
        if n == 0 {
            debug!("Remote output reached EOF");
            return Ok(());
        }
        adapter.write(&buf[..n]).await?;
    }
}

/// Copies session input into the remote stdin. Returns only on failure.
pub async fn pump_input<S, W>(adapter: &StreamAdapter<S>, mut writer: W) -> Result<(), BridgeError>
where
    S: Session,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_BYTES];
    loop {
        let n = adapter.read(&mut buf).await?;
        if n == 0 {
            continue;
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| BridgeError::Stream(format!("writing remote stdin: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| BridgeError::Stream(format!("flushing remote stdin: {e}")))?;
    }
}

/// Forwards queued resize events, in order, for the life of the stream.
pub async fn pump_sizes<F, Fut>(
    sizes: &TerminalSizeQueue,
    mut deliver: F,
) -> Result<(), BridgeError>
where
    F: FnMut(TerminalSize) -> Fut,
    Fut: Future<Output = Result<(), BridgeError>>,
{
    while let Some(size) = sizes.next().await {
        deliver(size).await?;
    }
    Ok(())
}
