use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::{Payload, parse_id};
use crate::{
    auth::AuthUser,
    domain::model::Message,
    error::AppResult,
    service::messages::SendMessage,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    limit: Option<i64>,
}

pub async fn send(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<SendMessage>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = state
        .messages
        .send(user.id, req.receiver_id, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn conversation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(other): Path<String>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<Vec<Message>>> {
    let other = parse_id(&other)?;
    Ok(Json(
        state.messages.conversation(&user, other, params.limit).await?,
    ))
}
