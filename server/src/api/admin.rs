use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::parse_id;
use crate::{
    auth::AdminUser,
    domain::model::{Report, ReportStatus, SuccessStory, TextEnum, User},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    status: Option<String>,
}

pub async fn users(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.moderation.list_users(page.limit, page.offset).await?))
}

pub async fn deactivate_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.moderation.deactivate_user(&admin, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reports(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> AppResult<Json<Vec<Report>>> {
    let status = params
        .status
        .map(|raw| {
            ReportStatus::parse_text(&raw)
                .ok_or_else(|| AppError::Validation(format!("status: unknown value '{raw}'")))
        })
        .transpose()?;
    Ok(Json(state.moderation.list_reports(status).await?))
}

pub async fn resolve_report(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Report>> {
    Ok(Json(state.moderation.resolve_report(&admin, parse_id(&id)?).await?))
}

pub async fn approve_story(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SuccessStory>> {
    Ok(Json(state.moderation.approve_story(&admin, parse_id(&id)?).await?))
}
