//! WebSocket write half as a subscriber connection.

use crate::error::{HubError, Result};
use crate::subscribers::Connection;
use crate::types::Payload;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

pub struct WsConnection {
    sink: SplitSink<WebSocket, Message>,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, payload: &Payload) -> Result<()> {
        self.sink
            .send(Message::Text(payload.as_str().to_owned().into()))
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!(error = %e, "error closing websocket");
        }
    }
}
