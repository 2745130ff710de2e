use std::sync::Arc;

use crate::{
    config::Config,
    db::repo::Stores,
    realtime::Hub,
    service::{
        AuthService, DraftService, MasterService, MatchService, MessageService, ModerationService,
        ProfileService,
    },
};

/// Shared by every handler. Cloning is cheap: everything inside is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Hub,
    pub auth: AuthService,
    pub profiles: ProfileService,
    pub drafts: DraftService,
    pub master: MasterService,
    pub matches: MatchService,
    pub moderation: ModerationService,
    pub messages: MessageService,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let config = Arc::new(config);
        let hub = Hub::new();
        Self {
            auth: AuthService::new(stores.users.clone(), config.clone()),
            profiles: ProfileService::new(
                stores.users.clone(),
                stores.profiles.clone(),
                stores.drafts.clone(),
                stores.master.clone(),
                config.upload_dir.clone(),
                config.max_upload_bytes,
            ),
            drafts: DraftService::new(stores.drafts.clone()),
            master: MasterService::new(stores.master.clone()),
            matches: MatchService::new(
                stores.users.clone(),
                stores.profiles.clone(),
                stores.interactions.clone(),
                hub.clone(),
            ),
            moderation: ModerationService::new(stores.users.clone(), stores.interactions.clone()),
            messages: MessageService::new(stores.users, stores.interactions, hub.clone()),
            hub,
            config,
        }
    }
}
