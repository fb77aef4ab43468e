//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! A connection joins lecture rooms, receives their events, and may submit
//! questions and answers through the same services the REST handlers use.

use crate::{
    error::ApiError,
    web::{
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use crate::adapters::broadcaster::ConnectionId;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use classroom_core::{Caller, NewQuestion, ServiceError};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, caller))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, caller: Caller) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbound) = app_state.rooms.connect();
    info!("New WebSocket connection {} for user {}", conn, caller.user_id);

    // --- 1. Writer Task ---
    // Room events and direct replies share one queue, so the client sees them
    // in the order the registry accepted them.
    let shutdown = CancellationToken::new();
    let writer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = outbound.recv() => {
                        let Some(msg) = next else { break };
                        let json = match msg.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize server message: {:?}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = sender.close().await;
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_text_message(text.as_str(), &app_state, &caller, conn).await;
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error on {}: {:?}", conn, e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    // A mutation already committed stays committed; the client catches up on
    // whatever it misses by resyncing after it reconnects.
    app_state.rooms.disconnect(conn);
    shutdown.cancel();
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {:?}", conn, e);
    }
    info!("WebSocket connection {} closed.", conn);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
pub async fn handle_text_message(text: &str, app_state: &AppState, caller: &Caller, conn: ConnectionId) {
    let rooms = &app_state.rooms;
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            rooms.send_to(
                conn,
                ServerMessage::ProtocolError {
                    error: format!("Unrecognised message: {}", e),
                },
            );
            return;
        }
    };

    match client_msg {
        ClientMessage::JoinRoom { lecture_id } => {
            rooms.join(conn, lecture_id);
            info!("Connection {} joined lecture room {}", conn, lecture_id);
            rooms.send_to(conn, ServerMessage::RoomJoined { lecture_id });
        }
        ClientMessage::LeaveRoom { lecture_id } => {
            rooms.leave(conn, lecture_id);
            info!("Connection {} left lecture room {}", conn, lecture_id);
            rooms.send_to(conn, ServerMessage::RoomLeft { lecture_id });
        }
        ClientMessage::SubmitQuestion {
            text,
            lecture_id,
            author_id,
            is_important,
        } => {
            let result = if author_id != caller.user_id {
                Err(ServiceError::Forbidden(
                    "author_id does not match the connected user".to_string(),
                ))
            } else {
                app_state
                    .questions
                    .create(
                        caller,
                        NewQuestion {
                            lecture_id,
                            text,
                            is_important,
                        },
                    )
                    .await
            };
            // Success is announced by the room event, not by a reply.
            if let Err(e) = result {
                warn!("submit_question from {} rejected: {}", conn, e);
                let error = ApiError::from(e).public_message();
                rooms.send_to(conn, ServerMessage::QuestionError { error });
            }
        }
        ClientMessage::SubmitAnswer {
            question_id,
            answer,
            lecture_id,
        } => {
            let result = app_state
                .questions
                .answer(caller, question_id, lecture_id, answer)
                .await;
            if let Err(e) = result {
                warn!("submit_answer from {} rejected: {}", conn, e);
                let error = ApiError::from(e).public_message();
                rooms.send_to(conn, ServerMessage::AnswerError { error });
            }
        }
    }
}
