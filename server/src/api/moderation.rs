use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use super::Payload;
use crate::{
    auth::AuthUser,
    domain::model::{Report, SuccessStory, UserId},
    error::AppResult,
    service::moderation::{ReportRequest, StoryRequest},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequest {
    user_id: UserId,
}

pub async fn block(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<TargetRequest>,
) -> AppResult<StatusCode> {
    state.moderation.block(&user, req.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unblock(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<TargetRequest>,
) -> AppResult<StatusCode> {
    state.moderation.unblock(&user, req.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<ReportRequest>,
) -> AppResult<(StatusCode, Json<Report>)> {
    let report = state.moderation.report(&user, req).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn submit_story(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<StoryRequest>,
) -> AppResult<(StatusCode, Json<SuccessStory>)> {
    let story = state.moderation.submit_success_story(&user, req).await?;
    Ok((StatusCode::CREATED, Json(story)))
}

/// Public: approved stories only.
pub async fn stories(State(state): State<AppState>) -> AppResult<Json<Vec<SuccessStory>>> {
    Ok(Json(state.moderation.approved_stories().await?))
}
