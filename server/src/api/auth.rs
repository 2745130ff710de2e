use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use super::Payload;
use crate::{
    auth::AuthUser,
    domain::model::User,
    error::AppResult,
    service::auth::{Credentials, PasswordChange, Registration, Session},
    state::AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Payload(req): Payload<Registration>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let session = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<AppState>,
    Payload(req): Payload<Credentials>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.auth.login(req).await?))
}

pub async fn change_password(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<PasswordChange>,
) -> AppResult<Json<Value>> {
    state.auth.change_password(&user, req).await?;
    Ok(Json(json!({ "message": "password updated" })))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
