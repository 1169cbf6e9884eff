//! WebSocket upgrade endpoint and per-connection read loop.

use crate::error::{HubError, Result};
use crate::subscribers::SubscriberRegistry;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::ws::WsConnection;

#[derive(Clone)]
struct ListenerState {
    registry: Arc<SubscriberRegistry>,
    shutdown: CancellationToken,
}

/// Build the router serving the upgrade endpoint.
///
/// `endpoint` must start with `/`.
pub fn router(
    endpoint: &str,
    registry: Arc<SubscriberRegistry>,
    shutdown: CancellationToken,
) -> Result<Router> {
    if !endpoint.starts_with('/') {
        return Err(HubError::InvalidConfig(format!(
            "endpoint must start with '/': {endpoint}"
        )));
    }

    Ok(Router::new()
        .route(endpoint, get(upgrade))
        .with_state(ListenerState { registry, shutdown }))
}

/// Serve `router` until `shutdown` fires. New connections stop being
/// accepted as soon as it does.
pub async fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "accepting subscribers");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    })
    .await?;

    tracing::info!(%addr, "listener stopped");
    Ok(())
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<ListenerState>,
) -> Response {
    ws.on_failed_upgrade(move |e| tracing::warn!(%peer, error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Register the connection, then read until the peer goes away or the hub
/// stops. Inbound frames carry no commands and are only logged.
async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: ListenerState) {
    let (sink, mut stream) = socket.split();

    let Some(subscriber) = state
        .registry
        .register(WsConnection::new(sink), Some(peer.to_string()))
        .await
    else {
        tracing::debug!(%peer, "hub is shutting down, connection refused");
        return;
    };
    tracing::info!(subscriber = %subscriber.id(), %peer, "subscriber connected");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(
                        subscriber = %subscriber.id(),
                        message = text.as_str(),
                        "ignoring inbound message"
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(subscriber = %subscriber.id(), ?frame, "peer closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %subscriber.id(), error = %e, "read failed");
                    break;
                }
                None => break,
            }
        }
    }

    state.registry.remove(&subscriber).await;
    tracing::info!(subscriber = %subscriber.id(), %peer, "subscriber disconnected");
}
