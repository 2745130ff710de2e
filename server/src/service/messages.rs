use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::{
    db::repo::{InteractionRepository, UserRepository},
    domain::model::{Message, User, UserId},
    error::{AppError, AppResult},
    realtime::{ClientEvent, Hub, ServerEvent},
};

const MAX_BODY_CHARS: usize = 4000;
const DEFAULT_HISTORY: i64 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub receiver_id: UserId,
    pub body: String,
}

/// Direct messages and the signaling relay between two members.
#[derive(Clone)]
pub struct MessageService {
    users: Arc<dyn UserRepository>,
    interactions: Arc<dyn InteractionRepository>,
    hub: Hub,
}

impl MessageService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        interactions: Arc<dyn InteractionRepository>,
        hub: Hub,
    ) -> Self {
        Self {
            users,
            interactions,
            hub,
        }
    }

    async fn check_reachable(&self, sender: UserId, receiver: UserId) -> AppResult<()> {
        if sender == receiver {
            return Err(AppError::Validation("cannot message yourself".into()));
        }
        if self.users.find_public(receiver).await?.is_none() {
            return Err(AppError::NotFound("user".into()));
        }
        if self.interactions.is_blocked_between(sender, receiver).await? {
            return Err(AppError::Forbidden("you cannot contact this member".into()));
        }
        Ok(())
    }

    /// Persists, then pushes to the receiver's open sockets.
    #[instrument(
        name = "vivaha.messages.send",
        skip_all,
        fields(sender = sender, receiver = receiver)
    )]
    pub async fn send(&self, sender: UserId, receiver: UserId, body: &str) -> AppResult<Message> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("body: must not be empty".into()));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(AppError::Validation(format!(
                "body: must be at most {MAX_BODY_CHARS} characters"
            )));
        }
        self.check_reachable(sender, receiver).await?;

        let message = self.interactions.save_message(sender, receiver, body).await?;
        let delivered = self.hub.send_to(
            receiver,
            ServerEvent::NewMessage {
                message: message.clone(),
            },
        );
        info!(message_id = message.id, delivered, "message sent");
        Ok(message)
    }

    #[instrument(
        name = "vivaha.messages.conversation",
        skip_all,
        fields(user_id = user.id, other = other)
    )]
    pub async fn conversation(
        &self,
        user: &User,
        other: UserId,
        limit: Option<i64>,
    ) -> AppResult<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY).clamp(1, 500);
        Ok(self.interactions.conversation(user.id, other, limit).await?)
    }

    /// Handles one socket frame from `sender`. Signaling frames are relayed
    /// as-is; chat frames go through [`MessageService::send`].
    pub async fn handle_client_event(&self, sender: UserId, event: ClientEvent) -> AppResult<()> {
        let receiver = event.receiver_id();
        let relayed = match event {
            ClientEvent::SendMessage { body, .. } => {
                self.send(sender, receiver, &body).await?;
                return Ok(());
            }
            ClientEvent::VideoInvite { payload, .. } => ServerEvent::VideoInvite {
                sender_id: sender,
                payload,
            },
            ClientEvent::WebrtcOffer { payload, .. } => ServerEvent::WebrtcOffer {
                sender_id: sender,
                payload,
            },
            ClientEvent::WebrtcAnswer { payload, .. } => ServerEvent::WebrtcAnswer {
                sender_id: sender,
                payload,
            },
            ClientEvent::IceCandidate { payload, .. } => ServerEvent::IceCandidate {
                sender_id: sender,
                payload,
            },
        };
        self.check_reachable(sender, receiver).await?;
        let delivered = self.hub.send_to(receiver, relayed);
        debug!(sender, receiver, delivered, "signal relayed");
        Ok(())
    }
}
