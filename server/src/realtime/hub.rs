//! Per-user registry of live socket connections.
//!
//! Every event is addressed to one user and fanned out to that user's open
//! connections only. Nothing is broadcast. A send to an offline user is a
//! no-op; delivery is best-effort with no acknowledgement.
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

use super::events::ServerEvent;
use crate::domain::model::UserId;

#[derive(Debug)]
struct Connection {
    id: Uuid,
    tx: UnboundedSender<ServerEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct Hub {
    connections: Arc<DashMap<UserId, Vec<Connection>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: UserId) -> (Uuid, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections
            .entry(user_id)
            .or_default()
            .push(Connection { id, tx });
        debug!(user_id, connection = %id, "socket registered");
        (id, rx)
    }

    pub fn unregister(&self, user_id: UserId, connection: Uuid) {
        let now_empty = match self.connections.get_mut(&user_id) {
            Some(mut conns) => {
                conns.retain(|c| c.id != connection);
                conns.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.connections.remove_if(&user_id, |_, conns| conns.is_empty());
        }
        debug!(user_id, %connection, "socket unregistered");
    }

    /// Delivers to every live connection of `user_id`. Returns how many took it.
    pub fn send_to(&self, user_id: UserId, event: ServerEvent) -> usize {
        let Some(mut conns) = self.connections.get_mut(&user_id) else {
            return 0;
        };
        conns.retain(|c| !c.tx.is_closed());
        conns
            .iter()
            .filter(|c| c.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Replies on one connection, e.g. an error for the socket that caused it.
    pub fn send_to_connection(&self, user_id: UserId, connection: Uuid, event: ServerEvent) {
        if let Some(conns) = self.connections.get(&user_id) {
            if let Some(conn) = conns.iter().find(|c| c.id == connection) {
                let _ = conn.tx.send(event);
            }
        }
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections
            .get(&user_id)
            .is_some_and(|conns| !conns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn invite(sender_id: UserId) -> ServerEvent {
        ServerEvent::VideoInvite {
            sender_id,
            payload: json!({ "room": "r1" }),
        }
    }

    #[test]
    fn events_reach_only_the_addressed_user() {
        let hub = Hub::new();
        let (_, mut alice) = hub.register(1);
        let (_, mut bob_phone) = hub.register(2);
        let (_, mut bob_laptop) = hub.register(2);
        let (_, mut carol) = hub.register(3);

        assert_eq!(hub.send_to(2, invite(1)), 2);

        assert_eq!(bob_phone.try_recv().unwrap(), invite(1));
        assert_eq!(bob_laptop.try_recv().unwrap(), invite(1));
        assert!(alice.try_recv().is_err());
        assert!(carol.try_recv().is_err());
    }

    #[test]
    fn offline_users_receive_nothing() {
        let hub = Hub::new();
        assert_eq!(hub.send_to(9, invite(1)), 0);
        assert!(!hub.is_online(9));
    }

    #[test]
    fn unregister_drops_the_connection() {
        let hub = Hub::new();
        let (first, _rx1) = hub.register(5);
        let (second, mut rx2) = hub.register(5);
        hub.unregister(5, first);
        assert!(hub.is_online(5));
        assert_eq!(hub.send_to(5, invite(1)), 1);
        assert!(rx2.try_recv().is_ok());

        hub.unregister(5, second);
        assert!(!hub.is_online(5));
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let hub = Hub::new();
        let (_, rx) = hub.register(7);
        drop(rx);
        assert_eq!(hub.send_to(7, invite(1)), 0);
        assert!(!hub.is_online(7));
    }

    #[test]
    fn replies_target_a_single_connection() {
        let hub = Hub::new();
        let (first, mut rx1) = hub.register(4);
        let (_, mut rx2) = hub.register(4);
        hub.send_to_connection(4, first, ServerEvent::Error { error: "nope".into() });
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }
}
