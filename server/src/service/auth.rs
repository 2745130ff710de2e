use std::{num::NonZeroU32, sync::Arc, time::Duration};

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use validator::{Validate, ValidationError};

use crate::{
    auth::{JwtKeys, password},
    config::Config,
    db::repo::UserRepository,
    domain::model::{Gender, NewUser, Role, TextEnum, User, is_valid_mobile},
    error::{AppError, AppResult},
};

fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    if is_valid_mobile(mobile) {
        Ok(())
    } else {
        Err(ValidationError::new("mobile").with_message("must be 7 to 15 digits".into()))
    }
}

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    Gender::parse_text(gender)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("gender").with_message("is not recognised".into()))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub last_name: String,
    #[validate(custom(function = "validate_gender"))]
    pub gender: String,
    #[validate(custom(function = "validate_mobile"))]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Registration {
    fn trimmed(self) -> Self {
        Self {
            email: self.email.trim().to_lowercase(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            mobile: self
                .mobile
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            ..self
        }
    }
}

/// Attempt budget per email address, shared by login and registration.
#[derive(Clone)]
pub struct AuthThrottle {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl AuthThrottle {
    pub fn new(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    fn check(&self, email: &str) -> AppResult<()> {
        self.limiter
            .check_key(&email.trim().to_lowercase())
            .map_err(|_| {
                warn!("auth rate limit hit");
                AppError::TooManyRequests
            })
    }

    /// Forgets addresses whose budget has fully refilled and returns how many
    /// are still tracked.
    pub fn prune(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }

    pub fn spawn_pruning(&self, every: Duration) -> JoinHandle<()> {
        let throttle = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let tracked = throttle.prune();
                debug!(tracked, "auth throttle pruned");
            }
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    keys: Arc<JwtKeys>,
    throttle: AuthThrottle,
    config: Arc<Config>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, config: Arc<Config>) -> Self {
        let per_minute = NonZeroU32::new(config.auth_rate_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            users,
            keys: Arc::new(JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours)),
            throttle: AuthThrottle::new(Quota::per_minute(per_minute)),
            config,
        }
    }

    pub fn throttle(&self) -> &AuthThrottle {
        &self.throttle
    }

    fn session(&self, user: User) -> AppResult<Session> {
        let token = self
            .keys
            .issue(user.id, user.role)
            .map_err(|e| AppError::internal("Internal server error", e))?;
        Ok(Session { token, user })
    }

    #[instrument(name = "vivaha.auth.register", skip_all)]
    pub async fn register(&self, req: Registration) -> AppResult<Session> {
        let req = req.trimmed();
        req.validate()?;
        self.throttle.check(&req.email)?;

        let password_hash = password::hash(&req.password)
            .map_err(|e| AppError::internal("Internal server error", e))?;
        let role = if self.config.is_admin_email(&req.email) {
            Role::Admin
        } else {
            Role::User
        };
        let user = self
            .users
            .create(NewUser {
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                gender: Gender::parse_or_default(&req.gender),
                mobile: req.mobile,
                role,
            })
            .await?;
        info!(user_id = user.id, role = %user.role, "user registered");
        self.session(user)
    }

    #[instrument(name = "vivaha.auth.login", skip_all)]
    pub async fn login(&self, req: Credentials) -> AppResult<Session> {
        req.validate()?;
        self.throttle.check(&req.email)?;

        let invalid = || AppError::Unauthorized("invalid email or password".into());
        let user = self
            .users
            .find_by_email(req.email.trim())
            .await?
            .filter(User::is_active)
            .ok_or_else(invalid)?;
        if !password::verify(&req.password, &user.password_hash) {
            return Err(invalid());
        }
        info!(user_id = user.id, "user logged in");
        self.session(user)
    }

    #[instrument(name = "vivaha.auth.change_password", skip_all, fields(user_id = user.id))]
    pub async fn change_password(&self, user: &User, req: PasswordChange) -> AppResult<()> {
        req.validate()?;
        if !password::verify(&req.current_password, &user.password_hash) {
            return Err(AppError::Unauthorized("current password is incorrect".into()));
        }
        let hash = password::hash(&req.new_password)
            .map_err(|e| AppError::internal("Internal server error", e))?;
        self.users.update_password(user.id, &hash).await?;
        info!("password changed");
        Ok(())
    }

    /// Resolves a bearer token to an active account.
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let claims = self
            .keys
            .verify(token)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        let id = claims.user_id().ok_or_else(AppError::unauthorized)?;
        self.users
            .find_by_id(id)
            .await?
            .filter(User::is_active)
            .ok_or_else(|| AppError::Unauthorized("account is not active".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_rules() {
        let ok = Registration {
            email: "asha@example.com".into(),
            password: "longenough".into(),
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            gender: "female".into(),
            mobile: Some("+919876543210".into()),
        };
        assert!(ok.validate().is_ok());

        let bad = Registration {
            email: "nope".into(),
            password: "short".into(),
            mobile: Some("12ab".into()),
            gender: "robot".into(),
            ..ok
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["email", "password", "mobile", "gender"] {
            assert!(fields.contains_key(field), "{field} should fail");
        }
    }

    #[test]
    fn blank_names_fail_once_trimmed() {
        let req = Registration {
            email: "  Asha@Example.com ".into(),
            password: "longenough".into(),
            first_name: "   ".into(),
            last_name: "\t".into(),
            gender: "female".into(),
            mobile: Some("  ".into()),
        }
        .trimmed();
        assert_eq!(req.email, "asha@example.com");
        assert_eq!(req.mobile, None);
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("last_name"));
    }

    #[test]
    fn pruning_forgets_refilled_addresses_only() {
        let throttle = AuthThrottle::new(Quota::per_second(NonZeroU32::new(1000).unwrap()));
        for i in 0..32 {
            throttle.check(&format!("user{i}@example.com")).unwrap();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(throttle.prune(), 0);

        let strict = AuthThrottle::new(Quota::per_minute(NonZeroU32::MIN));
        strict.check("a@example.com").unwrap();
        assert!(strict.check("a@example.com").is_err());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(strict.prune(), 1);
        assert!(strict.check("A@example.com").is_err());
    }
}
