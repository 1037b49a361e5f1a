//! A long-lived CDP connection to a single page target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{FplabError, Result};

type PageSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct PageConnection {
    ws_url: String,
    socket: Mutex<PageSocket>,
    next_id: AtomicU64,
}

impl PageConnection {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (socket, _) = connect_async(ws_url).await.map_err(|e| {
            FplabError::CdpConnectionFailed(format!("WebSocket connection failed: {}", e))
        })?;

        tracing::debug!("Connected to page {}", ws_url);

        Ok(Self {
            ws_url: ws_url.to_string(),
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Sends one CDP command and returns its `result` object.
    ///
    /// Events and replies to other ids are skipped, so a reply left over from
    /// an abandoned command never answers a later one.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cmd = serde_json::json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let mut socket = self.socket.lock().await;
        socket
            .send(Message::Text(cmd.to_string().into()))
            .await
            .map_err(|e| FplabError::Other(format!("Failed to send command: {}", e)))?;

        while let Some(msg) = socket.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let response: Value = serde_json::from_str(text.as_str())?;
                    if response.get("id").and_then(|v| v.as_u64()) != Some(id) {
                        continue;
                    }
                    if let Some(error) = response.get("error") {
                        return Err(FplabError::CdpConnectionFailed(format!(
                            "{} failed: {}",
                            method, error
                        )));
                    }
                    return Ok(response.get("result").cloned().unwrap_or(Value::Null));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(FplabError::Other(format!("WebSocket error: {}", e))),
            }
        }

        Err(FplabError::Other("No response received".to_string()))
    }

    /// Evaluates `expression`, awaiting a returned promise.
    ///
    /// `Ok(None)` means the expression produced `undefined`.
    pub async fn evaluate(&self, expression: &str) -> Result<Option<Value>> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                serde_json::json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| details.get("text").and_then(|t| t.as_str()))
                .unwrap_or("Uncaught exception");
            return Err(FplabError::JavaScriptError(message.to_string()));
        }

        let remote = result.get("result").cloned().unwrap_or(Value::Null);
        if remote.get("type").and_then(|t| t.as_str()) == Some("undefined") {
            return Ok(None);
        }
        Ok(Some(remote.get("value").cloned().unwrap_or(Value::Null)))
    }

    /// Polls `document.readyState` until the page has finished loading.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.evaluate("document.readyState").await?;
            if state.as_ref().and_then(|s| s.as_str()) == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FplabError::Timeout(format!(
                    "page did not finish loading within {} ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
