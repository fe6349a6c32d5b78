use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use terminal_bridge::{CloseStatus, Session, SessionError};
use tokio::sync::Mutex;
use tracing::debug;

/// [`Session`] over an upgraded browser WebSocket.
///
/// Text and binary frames are both terminal payloads. Outbound payloads go
/// out as text frames when they are valid UTF-8 and as binary otherwise.
pub struct WsSession {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: AtomicBool,
}

impl WsSession {
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }
}

impl Session for WsSession {
    async fn receive(&self) -> Result<Vec<u8>, SessionError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by peer");
                    return Err(SessionError::Closed);
                }
                Some(Err(e)) => return Err(SessionError::Transport(e.to_string())),
                None => return Err(SessionError::Closed),
            }
        }
    }

    async fn send(&self, payload: &[u8]) -> Result<(), SessionError> {
        let msg = match std::str::from_utf8(payload) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(payload.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn close(&self, status: &CloseStatus) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let frame = CloseFrame {
            code: status.code,
            reason: status.reason.clone().into(),
        };
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame not delivered: {}", e);
        }
        let _ = sink.close().await;
    }
}
