use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::events::{ClientEvent, ServerEvent};
use crate::{
    domain::model::User,
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws?token=…`. Browsers cannot set headers on the upgrade request, so
/// the token travels in the query string. The token is checked before the
/// upgrade headers.
pub async fn upgrade(
    Query(params): Query<SocketParams>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(AppError::unauthorized)?;
    let user = state.auth.authenticate(&token).await?;
    match ws {
        Ok(ws) => Ok(ws.on_upgrade(move |socket| serve(socket, state, user))),
        Err(rejection) => Ok(rejection.into_response()),
    }
}

async fn serve(socket: WebSocket, state: AppState, user: User) {
    let user_id = user.id;
    let (connection, mut outbox) = state.hub.register(user_id);
    let (mut sink, mut stream) = socket.split();
    info!(user_id, %connection, "socket connected");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "could not encode event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_state = state.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            let text = match frame {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => break,
                _ => continue,
            };
            let outcome = match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => reader_state
                    .messages
                    .handle_client_event(user_id, event)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("malformed event: {e}")),
            };
            if let Err(error) = outcome {
                debug!(user_id, %error, "socket event rejected");
                reader_state
                    .hub
                    .send_to_connection(user_id, connection, ServerEvent::Error { error });
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.hub.unregister(user_id, connection);
    info!(user_id, %connection, "socket disconnected");
}
