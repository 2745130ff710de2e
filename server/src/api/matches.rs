use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::{Payload, parse_id};
use crate::{
    auth::AuthUser,
    domain::model::{Interest, InterestDirection, UserId},
    error::AppResult,
    service::matches::MatchCard,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DailyParams {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InterestsParams {
    direction: Option<InterestDirection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRequest {
    receiver_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    accept: bool,
}

pub async fn daily(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<DailyParams>,
) -> AppResult<Json<Vec<MatchCard>>> {
    Ok(Json(state.matches.daily(&user, params.limit).await?))
}

pub async fn send_interest(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<InterestRequest>,
) -> AppResult<(StatusCode, Json<Interest>)> {
    let interest = state.matches.send_interest(&user, req.receiver_id).await?;
    Ok((StatusCode::CREATED, Json(interest)))
}

/// Received interests unless `?direction=sent`.
pub async fn list_interests(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<InterestsParams>,
) -> AppResult<Json<Vec<Interest>>> {
    let direction = params.direction.unwrap_or(InterestDirection::Received);
    Ok(Json(state.matches.list_interests(&user, direction).await?))
}

pub async fn respond(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(req): Payload<RespondRequest>,
) -> AppResult<Json<Interest>> {
    let interest = state.matches.respond(&user, parse_id(&id)?, req.accept).await?;
    Ok(Json(interest))
}
