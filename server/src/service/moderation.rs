use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    db::repo::{InteractionRepository, UserRepository},
    domain::model::{NewReport, NewStory, Report, ReportStatus, SuccessStory, User, UserId},
    error::{AppError, AppResult},
};

const MAX_PAGE: i64 = 100;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub user_id: UserId,
    #[validate(length(min = 3, max = 200, message = "must be 3 to 200 characters"))]
    pub reason: String,
    #[validate(length(max = 2000))]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    #[validate(length(min = 1, max = 120, message = "is required"))]
    pub partner_name: String,
    #[validate(length(min = 20, max = 5000, message = "must be 20 to 5000 characters"))]
    pub story: String,
    pub wedding_date: Option<NaiveDate>,
}

/// Blocking, reports and success stories, plus the admin side of each.
#[derive(Clone)]
pub struct ModerationService {
    users: Arc<dyn UserRepository>,
    interactions: Arc<dyn InteractionRepository>,
}

impl ModerationService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        interactions: Arc<dyn InteractionRepository>,
    ) -> Self {
        Self {
            users,
            interactions,
        }
    }

    async fn require_user(&self, id: UserId) -> AppResult<()> {
        match self.users.find_public(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("user".into())),
        }
    }

    #[instrument(
        name = "vivaha.moderation.block",
        skip_all,
        fields(user_id = user.id, target = target)
    )]
    pub async fn block(&self, user: &User, target: UserId) -> AppResult<()> {
        if target == user.id {
            return Err(AppError::Validation("cannot block yourself".into()));
        }
        self.require_user(target).await?;
        self.interactions.block(user.id, target).await?;
        info!("member blocked");
        Ok(())
    }

    #[instrument(
        name = "vivaha.moderation.unblock",
        skip_all,
        fields(user_id = user.id, target = target)
    )]
    pub async fn unblock(&self, user: &User, target: UserId) -> AppResult<()> {
        if !self.interactions.unblock(user.id, target).await? {
            return Err(AppError::NotFound("block".into()));
        }
        info!("member unblocked");
        Ok(())
    }

    #[instrument(
        name = "vivaha.moderation.report",
        skip_all,
        fields(user_id = user.id, target = req.user_id)
    )]
    pub async fn report(&self, user: &User, req: ReportRequest) -> AppResult<Report> {
        req.validate()?;
        if req.user_id == user.id {
            return Err(AppError::Validation("cannot report yourself".into()));
        }
        self.require_user(req.user_id).await?;
        let report = self
            .interactions
            .create_report(NewReport {
                reporter_id: user.id,
                reported_id: req.user_id,
                reason: req.reason.trim().to_string(),
                details: req.details.filter(|d| !d.trim().is_empty()),
            })
            .await?;
        warn!(report_id = report.id, "member reported");
        Ok(report)
    }

    #[instrument(name = "vivaha.moderation.submit_story", skip_all, fields(user_id = user.id))]
    pub async fn submit_success_story(
        &self,
        user: &User,
        req: StoryRequest,
    ) -> AppResult<SuccessStory> {
        req.validate()?;
        let story = self
            .interactions
            .create_story(NewStory {
                user_id: user.id,
                partner_name: req.partner_name.trim().to_string(),
                story: req.story.trim().to_string(),
                wedding_date: req.wedding_date,
            })
            .await?;
        info!(story_id = story.id, "success story submitted");
        Ok(story)
    }

    pub async fn approved_stories(&self) -> AppResult<Vec<SuccessStory>> {
        Ok(self.interactions.stories(true).await?)
    }

    pub async fn list_reports(&self, status: Option<ReportStatus>) -> AppResult<Vec<Report>> {
        Ok(self.interactions.reports(status).await?)
    }

    #[instrument(
        name = "vivaha.admin.resolve_report",
        skip_all,
        fields(admin = admin.id, report_id = id)
    )]
    pub async fn resolve_report(&self, admin: &User, id: i64) -> AppResult<Report> {
        let report = self
            .interactions
            .resolve_report(id)
            .await?
            .ok_or_else(|| AppError::NotFound("report".into()))?;
        info!("report resolved");
        Ok(report)
    }

    #[instrument(
        name = "vivaha.admin.deactivate_user",
        skip_all,
        fields(admin = admin.id, target = id)
    )]
    pub async fn deactivate_user(&self, admin: &User, id: UserId) -> AppResult<()> {
        if id == admin.id {
            return Err(AppError::Validation("cannot deactivate your own account".into()));
        }
        if !self.users.soft_delete(id).await? {
            return Err(AppError::NotFound("user".into()));
        }
        info!("user deactivated");
        Ok(())
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<User>> {
        let limit = limit.unwrap_or(50).clamp(1, MAX_PAGE);
        let offset = offset.unwrap_or(0).max(0);
        Ok(self.users.list(limit, offset).await?)
    }

    #[instrument(
        name = "vivaha.admin.approve_story",
        skip_all,
        fields(admin = admin.id, story_id = id)
    )]
    pub async fn approve_story(&self, admin: &User, id: i64) -> AppResult<SuccessStory> {
        let story = self
            .interactions
            .approve_story(id)
            .await?
            .ok_or_else(|| AppError::NotFound("success story".into()))?;
        info!("success story approved");
        Ok(story)
    }
}
