use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::{ClientFrame, OutboundFrame, ServerMessage};
use crate::server::QuizServer;

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<QuizServer>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let queue_capacity = server.tuning().send_queue_capacity.max(1);
    let (tx, mut rx) = mpsc::channel::<Arc<OutboundFrame>>(queue_capacity);

    let session_id = server.register_session(tx);
    tracing::info!(%session_id, client_addr = %addr, "WebSocket connection established");

    // One sender worker per connection keeps frames from interleaving on the
    // socket when several lobby events broadcast concurrently.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match &*frame {
                OutboundFrame::Close { code, reason } => {
                    let _ = sender
                        .send(Message::Close(Some(CloseFrame {
                            code: *code,
                            reason: reason.clone().into(),
                        })))
                        .await;
                    break;
                }
                frame => match serde_json::to_string(frame) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize outbound frame: {e}");
                    }
                },
            }
        }
    });

    let server_for_recv = server.clone();
    let max_message_size = server.tuning().max_message_size;
    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(%session_id, "WebSocket error: {e}");
                    break;
                }
            };

            match message {
                Message::Text(text) => {
                    if text.len() > max_message_size {
                        tracing::warn!(
                            %session_id,
                            size = text.len(),
                            max = max_message_size,
                            "Frame exceeds size limit"
                        );
                        server_for_recv.send_to_session(
                            &session_id,
                            ServerMessage::Error {
                                message: format!(
                                    "Message too large ({} bytes, max {} bytes)",
                                    text.len(),
                                    max_message_size
                                ),
                            }
                            .into(),
                        );
                        continue;
                    }

                    match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => server_for_recv.handle_frame(session_id, frame).await,
                        Err(e) => {
                            tracing::warn!(%session_id, error = %e, "Rejected malformed frame");
                            server_for_recv.send_to_session(
                                &session_id,
                                ServerMessage::Error {
                                    message: format!("Invalid message format: {e}"),
                                }
                                .into(),
                            );
                        }
                    }
                }
                Message::Binary(_) => {
                    server_for_recv.send_to_session(
                        &session_id,
                        ServerMessage::Error {
                            message: "Binary frames are not supported".to_string(),
                        }
                        .into(),
                    );
                }
                Message::Close(_) => {
                    tracing::info!(%session_id, "WebSocket connection closed");
                    break;
                }
                _ => {
                    // Ping/Pong are handled by the transport.
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            receive_task.abort();
        }
        _ = (&mut receive_task) => {
            send_task.abort();
        }
    }

    server.disconnect_session(session_id).await;
    tracing::info!(%session_id, client_addr = %addr, "WebSocket connection cleaned up");
}
