use anyhow::{anyhow, bail, Context};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal client for the `/ws` protocol: numbered requests, acks matched by
/// `requestId`, and events buffered until asked for.
pub struct SocketClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_request_id: u64,
    events: VecDeque<Value>,
}

impl SocketClient {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let (stream, _) = connect_async(format!("ws://{}/ws", addr))
            .await
            .context("websocket handshake failed")?;

        Ok(SocketClient {
            stream,
            next_request_id: 1,
            events: VecDeque::new(),
        })
    }

    /// Sends `frame` with a fresh request id and waits for its ack.
    pub async fn request(&mut self, mut frame: Value) -> anyhow::Result<Value> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        frame["requestId"] = Value::from(request_id);

        self.send_raw(&frame.to_string()).await?;

        loop {
            let frame = self.read_frame().await?;
            if frame["type"] == "ack" && frame["requestId"] == Value::from(request_id) {
                return Ok(frame);
            }
            if frame["type"] == "event" {
                self.events.push_back(frame);
            }
        }
    }

    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Next server frame of any type.
    pub async fn read_frame(&mut self) -> anyhow::Result<Value> {
        loop {
            let message = tokio::time::timeout(READ_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for a frame"))?
                .ok_or_else(|| anyhow!("socket closed"))??;

            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => bail!("socket closed"),
                _ => continue,
            }
        }
    }

    /// Waits for the named event, discarding events before it.
    pub async fn expect_event(&mut self, name: &str) -> anyhow::Result<Value> {
        while let Some(event) = self.events.pop_front() {
            if event["event"] == name {
                return Ok(event["data"].clone());
            }
        }

        loop {
            let frame = self.read_frame().await?;
            if frame["type"] == "event" && frame["event"] == name {
                return Ok(frame["data"].clone());
            }
        }
    }

    /// Forgets events read so far.
    pub fn discard_events(&mut self) {
        self.events.clear();
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
