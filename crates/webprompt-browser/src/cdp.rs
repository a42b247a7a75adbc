//! Minimal Chrome DevTools Protocol client over a single page websocket.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use webprompt_core::{Error, Result};

/// A request/response CDP session. Calls are strictly sequential, so the
/// reply to a request is the first frame carrying its id; event frames
/// arriving in between are dropped.
pub struct CdpConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl CdpConnection {
    /// Connect to a target's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Driver(format!("DevTools connect failed: {}", e)))?;
        debug!("Connected to DevTools target {}", ws_url);
        Ok(Self { ws, next_id: 1 })
    }

    /// Send one protocol command and wait for its result.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = json!({ "id": id, "method": method, "params": params });
        trace!("CDP -> {}", request);
        self.ws
            .send(Message::Text(request.to_string().into()))
            .await
            .map_err(|e| Error::Driver(format!("{} send failed: {}", method, e)))?;

        while let Some(frame) = self.ws.next().await {
            let frame = frame.map_err(|e| Error::Driver(format!("{} read failed: {}", method, e)))?;
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let message: Value = serde_json::from_str(&text)?;
            if let Some(result) = match_response(method, id, &message)? {
                return Ok(result);
            }
        }

        Err(Error::Driver(format!(
            "DevTools connection closed while waiting for {}",
            method
        )))
    }

    /// Evaluate a JavaScript expression in the page and return its value.
    pub async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        evaluation_value(result)
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// `Some(result)` when `message` is the reply to request `id`.
fn match_response(method: &str, id: u64, message: &Value) -> Result<Option<Value>> {
    if message.get("id").and_then(Value::as_u64) != Some(id) {
        if let Some(event) = message.get("method").and_then(Value::as_str) {
            trace!("CDP event skipped: {}", event);
        }
        return Ok(None);
    }
    if let Some(error) = message.get("error") {
        let detail = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown protocol error");
        return Err(Error::Driver(format!("{} failed: {}", method, detail)));
    }
    Ok(Some(message.get("result").cloned().unwrap_or(Value::Null)))
}

fn evaluation_value(result: Value) -> Result<Value> {
    if let Some(details) = result.get("exceptionDetails") {
        let description = details
            .pointer("/exception/description")
            .and_then(Value::as_str)
            .or_else(|| details.get("text").and_then(Value::as_str))
            .unwrap_or("script threw");
        return Err(Error::Driver(format!("page script failed: {}", description)));
    }
    Ok(result
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}
