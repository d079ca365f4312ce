//! Chrome DevTools Protocol Client
//!
//! One browser-level WebSocket. Commands are JSON-RPC frames tagged with an id; a
//! reader task routes each reply to the caller waiting on that id. Page-level commands
//! travel over the same socket with a `sessionId` (flattened sessions).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::error::CdpError;

type Reply = Result<Value, CdpError>;
type PendingMap = HashMap<u64, oneshot::Sender<Reply>>;

#[derive(Default)]
struct Pending {
    waiting: Mutex<PendingMap>,
    closed: AtomicBool,
}

impl Pending {
    fn map(&self) -> MutexGuard<'_, PendingMap> {
        self.waiting.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn resolve(&self, id: u64, reply: Reply) {
        match self.map().remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(reply);
            }
            None => trace!(id, "Reply for abandoned command"),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for (_, waiter) in self.map().drain() {
            let _ = waiter.send(Err(CdpError::ConnectionClosed));
        }
    }
}

pub struct CdpClient {
    ws_endpoint: String,
    next_id: AtomicU64,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: Arc<Pending>,
    timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a browser endpoint (`ws://host:port/devtools/browser/<id>`).
    pub async fn connect(ws_endpoint: &str, timeout: Duration) -> Result<Self, CdpError> {
        info!("Connecting to CDP websocket at {}", ws_endpoint);
        let (stream, _) = tokio_tungstenite::connect_async(ws_endpoint)
            .await
            .map_err(|e| CdpError::Transport(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "CDP write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let pending = Arc::new(Pending::default());
        let routes = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match parse_reply(&text) {
                        Ok(Some((id, reply))) => routes.resolve(id, reply),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Dropping unreadable CDP frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "CDP read failed");
                        break;
                    }
                }
            }
            debug!("CDP connection closed");
            routes.close();
        });

        Ok(Self {
            ws_endpoint: ws_endpoint.to_string(),
            next_id: AtomicU64::new(0),
            outgoing,
            pending,
            timeout,
            reader,
            writer,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.ws_endpoint
    }

    /// Browser-level command.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        self.send(None, method, params).await
    }

    /// Command routed to an attached page session.
    pub async fn send_session_command(
        &self,
        session_id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, CdpError> {
        self.send(Some(session_id), method, params).await
    }

    async fn send(&self, session_id: Option<&str>, method: &str, params: Value) -> Result<Value, CdpError> {
        if self.pending.closed.load(Ordering::SeqCst) {
            return Err(CdpError::ConnectionClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = command_frame(id, session_id, method, params);

        let (waiter, reply) = oneshot::channel();
        self.pending.map().insert(id, waiter);
        debug!(id, method, session = session_id.unwrap_or("-"), "Sending CDP command");

        if self.outgoing.send(Message::Text(frame.to_string())).is_err() {
            self.pending.map().remove(&id);
            return Err(CdpError::ConnectionClosed);
        }

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::ConnectionClosed),
            Err(_) => {
                self.pending.map().remove(&id);
                Err(CdpError::Timeout {
                    method: method.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn command_frame(id: u64, session_id: Option<&str>, method: &str, params: Value) -> Value {
    let mut frame = json!({ "id": id, "method": method, "params": params });
    if let Some(session_id) = session_id {
        frame["sessionId"] = json!(session_id);
    }
    frame
}

/// Split an incoming frame into `(id, reply)`. Events (no id) yield `None`.
fn parse_reply(text: &str) -> Result<Option<(u64, Reply)>, CdpError> {
    let message: Value = serde_json::from_str(text).map_err(|e| CdpError::Malformed(e.to_string()))?;
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        return Ok(None);
    };
    if let Some(error) = message.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let text = error.get("message").and_then(Value::as_str).unwrap_or("CDP error");
        let message = match error.get("data").and_then(Value::as_str) {
            Some(data) => format!("{text}: {data}"),
            None => text.to_string(),
        };
        return Ok(Some((id, Err(CdpError::Protocol { code, message }))));
    }
    let result = message.get("result").cloned().unwrap_or_else(|| json!({}));
    Ok(Some((id, Ok(result))))
}
