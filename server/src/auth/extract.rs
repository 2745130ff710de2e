use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::{
    domain::model::{Role, User},
    error::AppError,
    state::AppState,
};

/// A caller holding a valid token for an active account.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Anonymous when no `Authorization` header is sent. A header that does not
/// verify is still a 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<User>);

#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

fn bearer(headers: &HeaderMap) -> Option<Result<&str, AppError>> {
    let value = headers.get(AUTHORIZATION)?;
    Some(
        value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("malformed authorization header".into())),
    )
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(&parts.headers).ok_or_else(AppError::unauthorized)??;
        state.auth.authenticate(token).await.map(AuthUser)
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer(&parts.headers) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let user = state.auth.authenticate(token?).await?;
                Ok(MaybeAuthUser(Some(user)))
            }
        }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden("admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}
