//! Registry of live sockets per user.
//!
//! Game fan-out is owned by each game's actor; this registry covers the
//! game-independent surface: out-of-band notifications and deletion pushes,
//! delivered to every socket a user currently holds. Senders are handed out
//! by the socket endpoint at `hello` time and pruned when their channel
//! closes.

use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::game::entities::UserId;
use crate::net::messages::ServerMessage;

/// Identifies one socket for the lifetime of its connection.
pub type ConnId = u64;

#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    inner: Mutex<HashMap<UserId, HashMap<ConnId, mpsc::Sender<ServerMessage>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an authenticated socket to its user. Returns the connection id
    /// used to unregister later.
    pub fn register(&self, user_id: UserId, sender: mpsc::Sender<ServerMessage>) -> ConnId {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().expect("connection registry lock");
        inner.entry(user_id).or_default().insert(conn_id, sender);
        debug!("user {user_id}: socket {conn_id} registered");
        conn_id
    }

    pub fn unregister(&self, user_id: UserId, conn_id: ConnId) {
        let mut inner = self.inner.lock().expect("connection registry lock");
        if let Some(sockets) = inner.get_mut(&user_id) {
            sockets.remove(&conn_id);
            if sockets.is_empty() {
                inner.remove(&user_id);
            }
        }
        debug!("user {user_id}: socket {conn_id} unregistered");
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        let inner = self.inner.lock().expect("connection registry lock");
        inner.get(&user_id).is_some_and(|s| !s.is_empty())
    }

    /// Best-effort send to every live socket of a user. Closed sockets are
    /// pruned; a full queue drops the message for that socket only. Returns
    /// how many sockets accepted the message.
    pub fn send_to_user(&self, user_id: UserId, message: ServerMessage) -> usize {
        let mut inner = self.inner.lock().expect("connection registry lock");
        let Some(sockets) = inner.get_mut(&user_id) else {
            return 0;
        };
        let mut delivered = 0;
        sockets.retain(|conn_id, sender| match sender.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("user {user_id}: socket {conn_id} queue full, dropping push");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if sockets.is_empty() {
            inner.remove(&user_id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshotless_message() -> ServerMessage {
        ServerMessage::GameDeleted { game_id: 1 }
    }

    #[tokio::test]
    async fn delivers_to_every_socket_of_a_user() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(9, tx1);
        registry.register(9, tx2);

        assert_eq!(registry.send_to_user(9, snapshotless_message()), 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
        assert_eq!(registry.send_to_user(8, snapshotless_message()), 0);
    }

    #[tokio::test]
    async fn prunes_closed_sockets() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::channel(4);
        let conn = registry.register(3, tx);
        assert!(registry.is_online(3));

        drop(rx);
        assert_eq!(registry.send_to_user(3, snapshotless_message()), 0);
        assert!(!registry.is_online(3));

        // Unregistering after the prune is a no-op.
        registry.unregister(3, conn);
    }
}
