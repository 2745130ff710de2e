use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{domain::model::MasterEntry, error::AppResult, state::AppState};

/// `GET /api/master/{kind}?countryId=…` and friends. No login required.
pub async fn list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<MasterEntry>>> {
    Ok(Json(state.master.list(&kind, &params).await?))
}
