use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use super::{Payload, parse_id};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    domain::{
        model::{Draft, Photo},
        privacy::PrivacyOverrides,
        wizard::{HoroscopeStep, ProfilePatchRequest},
    },
    error::{AppError, AppResult},
    service::{
        draft::SaveDraft,
        profile::{OwnProfile, ProfileView, StepCommit, Upload},
    },
    state::AppState,
};

pub async fn get_own(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<OwnProfile>> {
    Ok(Json(state.profiles.get_own(&user).await?))
}

pub async fn get_public(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.profiles.get_public(&id, caller.as_ref()).await?))
}

pub async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(patch): Payload<ProfilePatchRequest>,
) -> AppResult<Json<OwnProfile>> {
    Ok(Json(state.profiles.update(&user, patch).await?))
}

pub async fn commit_step(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(commit): Payload<StepCommit>,
) -> AppResult<Json<OwnProfile>> {
    Ok(Json(state.profiles.commit_step(&user, commit).await?))
}

pub async fn update_privacy(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(patch): Payload<PrivacyOverrides>,
) -> AppResult<Json<Value>> {
    let privacy = state.profiles.update_privacy(&user, patch).await?;
    Ok(Json(json!({ "privacy": privacy })))
}

pub async fn get_draft(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Draft>> {
    Ok(Json(state.drafts.get(user.id).await?))
}

pub async fn save_draft(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<SaveDraft>,
) -> AppResult<Json<Draft>> {
    Ok(Json(state.drafts.save(user.id, req).await?))
}

/// Expects a single file part named `photo`.
pub async fn upload_photo(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Photo>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("photo") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();
        let photo = state
            .profiles
            .add_photo(
                &user,
                Upload {
                    file_name,
                    content_type,
                    bytes,
                },
            )
            .await?;
        return Ok((StatusCode::CREATED, Json(photo)));
    }
    Err(AppError::Validation("photo: no file uploaded".into()))
}

pub async fn delete_photo(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.profiles.delete_photo(&user, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upsert_horoscope(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Payload(step): Payload<HoroscopeStep>,
) -> AppResult<Json<Value>> {
    let horoscope = state.profiles.upsert_horoscope(&user, step).await?;
    Ok(Json(json!({ "horoscope": horoscope })))
}

pub async fn delete_horoscope(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.profiles.delete_horoscope(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}
