use std::{collections::HashMap, sync::Arc};

use tracing::instrument;

use crate::{
    db::repo::MasterRepository,
    domain::model::{MasterEntry, MasterKind},
    error::{AppError, AppResult},
};

/// Read-only lookups over the reference tables.
#[derive(Clone)]
pub struct MasterService {
    master: Arc<dyn MasterRepository>,
}

impl MasterService {
    pub fn new(master: Arc<dyn MasterRepository>) -> Self {
        Self { master }
    }

    /// `params` is the raw query string map; only the kind's parent key is read.
    #[instrument(name = "vivaha.master.list", skip(self, params))]
    pub async fn list(
        &self,
        slug: &str,
        params: &HashMap<String, String>,
    ) -> AppResult<Vec<MasterEntry>> {
        let kind = MasterKind::from_slug(slug)
            .ok_or_else(|| AppError::NotFound(format!("reference list '{slug}'")))?;

        let parent = match kind.parent_key().and_then(|key| params.get(key)) {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or(AppError::InvalidId)?,
            ),
            _ => None,
        };

        self.master
            .list(kind, parent)
            .await
            .map_err(|e| AppError::internal(format!("error fetching {}", kind.label()), e))
    }
}
