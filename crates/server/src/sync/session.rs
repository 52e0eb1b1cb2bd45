//! Per-viewer WebSocket session.
//!
//! The socket splits into a writer task draining the hub's outbound
//! channel and a reader loop feeding inbound packets back to the hub.
//! Whatever side ends first tears the session down and unregisters the
//! viewer exactly once.

use std::net::IpAddr;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use protocol::Packet;

use crate::sync::hub::SyncHub;

/// Drive one viewer connection to completion.
pub async fn run_session(socket: WebSocket, hub: SyncHub, client_ip: IpAddr) {
    let (id, mut outbound) = match hub.register().await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(%client_ip, error = %e, "viewer registration failed");
            return;
        }
    };
    tracing::info!(viewer_id = %id, %client_ip, "viewer connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            let text = match packet.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "dropping unserializable packet");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match Packet::from_json(&text) {
                Ok(packet) => {
                    if hub.handle_packet(id, packet).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(viewer_id = %id, error = %e, "ignoring malformed packet");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(viewer_id = %id, error = %e, "socket read error");
                break;
            }
        }
    }

    // Unregistering drops the hub's sender; the writer drains and exits.
    hub.unregister(id).await;
    writer.abort();
    tracing::info!(viewer_id = %id, %client_ip, "viewer disconnected");
}
