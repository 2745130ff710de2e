use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    db::repo::{InteractionRepository, ProfileRepository, UserRepository},
    domain::model::{
        Candidate, CandidateQuery, Interest, InterestDirection, InterestStatus, User, UserId,
        age_on,
    },
    error::{AppError, AppResult},
    realtime::{Hub, ServerEvent},
};

const DEFAULT_DAILY: i64 = 10;
const MAX_DAILY: i64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCard {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub age: Option<u32>,
    /// Placeholder; no compatibility model backs it.
    pub score: u8,
}

#[derive(Clone)]
pub struct MatchService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    interactions: Arc<dyn InteractionRepository>,
    hub: Hub,
}

impl MatchService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        interactions: Arc<dyn InteractionRepository>,
        hub: Hub,
    ) -> Self {
        Self {
            users,
            profiles,
            interactions,
            hub,
        }
    }

    #[instrument(name = "vivaha.matches.daily", skip_all, fields(user_id = user.id))]
    pub async fn daily(&self, user: &User, limit: Option<i64>) -> AppResult<Vec<MatchCard>> {
        let limit = limit.unwrap_or(DEFAULT_DAILY).clamp(1, MAX_DAILY);
        let exclude = self.interactions.blocked_ids(user.id).await?;
        let candidates = self
            .profiles
            .candidates(&CandidateQuery {
                viewer: user.id,
                viewer_gender: user.gender,
                exclude,
                limit,
            })
            .await?;

        let today = Utc::now().date_naive();
        let mut rng = rand::rng();
        Ok(candidates
            .into_iter()
            .map(|candidate| MatchCard {
                age: candidate.date_of_birth.and_then(|dob| age_on(dob, today)),
                score: rng.random_range(60..=99),
                candidate,
            })
            .collect())
    }

    #[instrument(
        name = "vivaha.matches.send_interest",
        skip_all,
        fields(user_id = user.id, target = target)
    )]
    pub async fn send_interest(&self, user: &User, target: UserId) -> AppResult<Interest> {
        if target == user.id {
            return Err(AppError::Validation("cannot send interest to yourself".into()));
        }
        if self.users.find_public(target).await?.is_none() {
            return Err(AppError::NotFound("user".into()));
        }
        if self.profiles.load(target).await?.is_none() {
            return Err(AppError::NotFound("profile".into()));
        }
        if self.interactions.is_blocked_between(user.id, target).await? {
            return Err(AppError::Forbidden("you cannot contact this member".into()));
        }

        let interest = self.interactions.create_interest(user.id, target).await?;
        info!(interest_id = interest.id, "interest sent");
        self.hub.send_to(
            target,
            ServerEvent::InterestReceived {
                interest: interest.clone(),
            },
        );
        Ok(interest)
    }

    #[instrument(
        name = "vivaha.matches.list_interests",
        skip_all,
        fields(user_id = user.id, direction = ?direction)
    )]
    pub async fn list_interests(
        &self,
        user: &User,
        direction: InterestDirection,
    ) -> AppResult<Vec<Interest>> {
        Ok(self.interactions.interests(user.id, direction).await?)
    }

    /// Only the receiver may answer, and only once.
    #[instrument(
        name = "vivaha.matches.respond",
        skip_all,
        fields(user_id = user.id, interest_id = id, accept = accept)
    )]
    pub async fn respond(&self, user: &User, id: i64, accept: bool) -> AppResult<Interest> {
        let interest = self
            .interactions
            .find_interest(id)
            .await?
            .ok_or_else(|| AppError::NotFound("interest".into()))?;
        if interest.receiver_id != user.id {
            return Err(AppError::Forbidden(
                "only the receiver can respond to an interest".into(),
            ));
        }
        if interest.status != InterestStatus::Pending {
            return Err(AppError::Conflict("interest was already answered".into()));
        }

        let status = if accept {
            InterestStatus::Accepted
        } else {
            InterestStatus::Declined
        };
        let updated = self
            .interactions
            .answer_interest(id, status)
            .await?
            .ok_or_else(|| AppError::Conflict("interest was already answered".into()))?;
        info!(status = %updated.status, "interest answered");
        self.hub.send_to(
            updated.sender_id,
            ServerEvent::InterestAnswered {
                interest: updated.clone(),
            },
        );
        Ok(updated)
    }
}
