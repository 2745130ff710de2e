use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    db::repo::DraftRepository,
    domain::model::{Draft, UserId},
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraft {
    pub step_data: Value,
    #[serde(default)]
    pub last_step: i32,
}

/// Wizard checkpoints. Each save replaces the previous one wholesale.
#[derive(Clone)]
pub struct DraftService {
    drafts: Arc<dyn DraftRepository>,
}

impl DraftService {
    pub fn new(drafts: Arc<dyn DraftRepository>) -> Self {
        Self { drafts }
    }

    #[instrument(name = "vivaha.draft.save", skip(self, req), fields(last_step = req.last_step))]
    pub async fn save(&self, user_id: UserId, req: SaveDraft) -> AppResult<Draft> {
        if !req.step_data.is_object() {
            return Err(AppError::Validation("stepData: must be an object".into()));
        }
        if req.last_step < 0 {
            return Err(AppError::Validation("lastStep: must not be negative".into()));
        }
        let draft = self.drafts.save(user_id, &req.step_data, req.last_step).await?;
        debug!("draft saved");
        Ok(draft)
    }

    /// The stored draft, or an empty one at step 0.
    #[instrument(name = "vivaha.draft.get", skip(self))]
    pub async fn get(&self, user_id: UserId) -> AppResult<Draft> {
        Ok(self.drafts.get(user_id).await?.unwrap_or_default())
    }

    #[instrument(name = "vivaha.draft.clear", skip(self))]
    pub async fn clear(&self, user_id: UserId) -> AppResult<()> {
        self.drafts.clear(user_id).await?;
        Ok(())
    }
}
