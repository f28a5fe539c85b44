// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live connections by user id.
//!
//! A user may hold several connections at once (two browser tabs); each is
//! registered under its own id and removed by that id alone, so a late
//! disconnect never evicts a newer connection.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

struct Registration {
    id: Uuid,
    sender: EventSender,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Vec<Registration>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id` that delivers through `sender`.
    pub async fn register(&self, user_id: &str, id: Uuid, sender: EventSender) {
        let mut connections = self.connections.write().await;
        connections
            .entry(user_id.to_string())
            .or_default()
            .push(Registration { id, sender });
    }

    /// Remove connection `id` of `user_id`. Returns false if it was not
    /// registered.
    pub async fn unregister(&self, user_id: &str, id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        let Some(list) = connections.get_mut(user_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            connections.remove(user_id);
        }
        removed
    }

    /// Queue `event` on every live connection of `user_id`. Returns how many
    /// connections accepted it; zero means the user is offline.
    pub async fn try_send(&self, user_id: &str, event: &ServerEvent) -> usize {
        let connections = self.connections.read().await;
        connections
            .get(user_id)
            .map(|list| {
                list.iter()
                    .filter(|r| r.sender.send(event.clone()).is_ok())
                    .count()
            })
            .unwrap_or(0)
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.connections.read().await.contains_key(user_id)
    }

    /// Total number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> ServerEvent {
        ServerEvent::error("Test", "ping")
    }

    #[tokio::test]
    async fn delivers_to_every_connection_of_a_user() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("alice", Uuid::new_v4(), tx1).await;
        registry.register("alice", Uuid::new_v4(), tx2).await;

        assert_eq!(registry.try_send("alice", &ping()).await, 2);
        assert_eq!(rx1.recv().await, Some(ping()));
        assert_eq!(rx2.recv().await, Some(ping()));
        assert_eq!(registry.try_send("bob", &ping()).await, 0);
    }

    #[tokio::test]
    async fn unregister_only_removes_the_matching_connection() {
        let registry = ConnectionRegistry::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        registry.register("alice", old, old_tx).await;
        registry.register("alice", new, new_tx).await;

        assert!(registry.unregister("alice", old).await);
        assert!(!registry.unregister("alice", old).await);
        assert!(registry.is_online("alice").await);
        assert_eq!(registry.connection_count().await, 1);

        assert!(registry.unregister("alice", new).await);
        assert!(!registry.is_online("alice").await);
    }

    #[tokio::test]
    async fn closed_receiver_does_not_count_as_delivered() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("alice", Uuid::new_v4(), tx).await;
        drop(rx);
        assert_eq!(registry.try_send("alice", &ping()).await, 0);
    }
}
