//! HTTP surface: routes, the JSON body extractor, and cross-cutting layers.
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest},
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tracing::warn;

use crate::{
    error::{AppError, error_details},
    realtime::socket,
    state::AppState,
};

mod admin;
mod auth;
mod master;
mod matches;
mod messages;
mod moderation;
mod profile;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// `Json` whose rejections render as `{"error": ...}` like every other failure.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct Payload<T>(pub T);

/// Ids in paths are parsed by hand so a bad one is a plain 400 "invalid id".
fn parse_id(raw: &str) -> Result<i64, AppError> {
    crate::service::profile::parse_target_id(raw)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors(state: &AppState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let origin = state.config.frontend_url.origin().ascii_serialization();
    match HeaderValue::from_str(&origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(error = %e, %origin, "FRONTEND_URL is not a valid origin, CORS disabled");
            layer
        }
    }
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let photo_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/me", get(auth::me))
        .route("/profile", get(profile::get_own).patch(profile::update))
        .route("/profile/steps", post(profile::commit_step))
        .route("/profile/privacy", patch(profile::update_privacy))
        .route("/profile/draft", get(profile::get_draft).post(profile::save_draft))
        .route(
            "/profile/photos",
            post(profile::upload_photo).layer(DefaultBodyLimit::max(photo_limit)),
        )
        .route("/profile/photos/{id}", delete(profile::delete_photo))
        .route(
            "/profile/horoscope",
            post(profile::upsert_horoscope).delete(profile::delete_horoscope),
        )
        .route("/profile/{id}", get(profile::get_public))
        .route("/master/{kind}", get(master::list))
        .route("/matches/daily", get(matches::daily))
        .route("/matches/interest", post(matches::send_interest))
        .route("/matches/interests", get(matches::list_interests))
        .route("/matches/interests/{id}/respond", post(matches::respond))
        .route("/messages", post(messages::send))
        .route("/messages/{user_id}", get(messages::conversation))
        .route("/moderation/block", post(moderation::block))
        .route("/moderation/unblock", post(moderation::unblock))
        .route("/moderation/report", post(moderation::report))
        .route("/moderation/success-story", post(moderation::submit_story))
        .route("/moderation/success-stories", get(moderation::stories))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/{id}", delete(admin::deactivate_user))
        .route("/admin/reports", get(admin::reports))
        .route("/admin/reports/{id}/resolve", post(admin::resolve_report))
        .route(
            "/admin/success-stories/{id}/approve",
            post(admin::approve_story),
        )
}

pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .nest("/api", api_routes(&state))
        .route("/health", get(health))
        .route("/ws", get(socket::upgrade))
        .nest_service("/uploads", uploads)
        .layer(middleware::from_fn_with_state(
            state.config.expose_error_details,
            error_details,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state))
        .with_state(state)
}
