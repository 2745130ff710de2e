//! Storage ports. Services depend on these traits only; `PgStore` and
//! `MemoryStore` implement all of them.
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    model::{
        Candidate, CandidateQuery, Draft, Interest, InterestDirection, InterestStatus,
        MasterEntry, MasterKind, Message, NewReport, NewStory, NewUser, Photo, ProfileAggregate,
        PublicUser, Report, ReportStatus, SuccessStory, User, UserId,
    },
    privacy::PrivacyOverrides,
    wizard::{ProfileWrite, WriteTable},
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("write to {table} failed: {message}")]
    WriteFailed { table: WriteTable, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create(&self, new_user: NewUser) -> RepoResult<User>;
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Active users only, without email, mobile or password hash.
    async fn find_public(&self, id: UserId) -> RepoResult<Option<PublicUser>>;
    async fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    /// Sets `deleted_at`. Returns false if the user was missing or already deleted.
    async fn soft_delete(&self, id: UserId) -> RepoResult<bool>;
    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn load(&self, user_id: UserId) -> RepoResult<Option<ProfileAggregate>>;
    /// All seven upserts commit or none do.
    async fn apply_write(&self, user_id: UserId, write: &ProfileWrite) -> RepoResult<()>;
    /// Replaces the stored sparse overrides, creating the profile if needed.
    async fn set_privacy(&self, user_id: UserId, overrides: &PrivacyOverrides) -> RepoResult<()>;
    /// Appends a photo; the first one becomes main.
    async fn add_photo(&self, user_id: UserId, url: &str) -> RepoResult<Photo>;
    /// Removes a photo and promotes the next one if it was main.
    async fn remove_photo(&self, user_id: UserId, photo_id: i64) -> RepoResult<Option<Photo>>;
    async fn delete_horoscope(&self, user_id: UserId) -> RepoResult<bool>;
    async fn candidates(&self, query: &CandidateQuery) -> RepoResult<Vec<Candidate>>;
}

#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn get(&self, user_id: UserId) -> RepoResult<Option<Draft>>;
    /// Full overwrite; last writer wins.
    async fn save(&self, user_id: UserId, step_data: &Value, last_step: i32) -> RepoResult<Draft>;
    /// Drops the checkpoint so `get` returns `None` again.
    async fn clear(&self, user_id: UserId) -> RepoResult<()>;
}

#[async_trait]
pub trait MasterRepository: Send + Sync {
    /// Active rows of `kind`, optionally filtered by parent, in sort order.
    async fn list(&self, kind: MasterKind, parent_id: Option<i64>) -> RepoResult<Vec<MasterEntry>>;
    async fn labels(
        &self,
        keys: &[(MasterKind, i64)],
    ) -> RepoResult<HashMap<(MasterKind, i64), String>>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn create_interest(&self, sender: UserId, receiver: UserId) -> RepoResult<Interest>;
    async fn find_interest(&self, id: i64) -> RepoResult<Option<Interest>>;
    async fn interests(
        &self,
        user_id: UserId,
        direction: InterestDirection,
    ) -> RepoResult<Vec<Interest>>;
    /// Moves a pending interest to `status`. `None` when it is missing or no
    /// longer pending.
    async fn answer_interest(
        &self,
        id: i64,
        status: InterestStatus,
    ) -> RepoResult<Option<Interest>>;

    async fn save_message(&self, sender: UserId, receiver: UserId, body: &str)
    -> RepoResult<Message>;
    async fn conversation(&self, a: UserId, b: UserId, limit: i64) -> RepoResult<Vec<Message>>;

    /// Idempotent.
    async fn block(&self, blocker: UserId, blocked: UserId) -> RepoResult<()>;
    async fn unblock(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool>;
    /// True if either user blocked the other.
    async fn is_blocked_between(&self, a: UserId, b: UserId) -> RepoResult<bool>;
    /// Everyone `user_id` blocked or was blocked by.
    async fn blocked_ids(&self, user_id: UserId) -> RepoResult<Vec<UserId>>;

    async fn create_report(&self, report: NewReport) -> RepoResult<Report>;
    async fn reports(&self, status: Option<ReportStatus>) -> RepoResult<Vec<Report>>;
    async fn resolve_report(&self, id: i64) -> RepoResult<Option<Report>>;

    async fn create_story(&self, story: NewStory) -> RepoResult<SuccessStory>;
    async fn stories(&self, approved_only: bool) -> RepoResult<Vec<SuccessStory>>;
    async fn approve_story(&self, id: i64) -> RepoResult<Option<SuccessStory>>;
}

/// One handle per entity, built once at start-up and handed to services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub drafts: Arc<dyn DraftRepository>,
    pub master: Arc<dyn MasterRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserRepository
            + ProfileRepository
            + DraftRepository
            + MasterRepository
            + InteractionRepository
            + 'static,
    {
        Self {
            users: backend.clone(),
            profiles: backend.clone(),
            drafts: backend.clone(),
            master: backend.clone(),
            interactions: backend,
        }
    }
}
