use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast, mpsc};

use courier_types::events::GatewayEvent;
use courier_types::models::UserId;

/// The notification boundary of the messaging core: components hand events
/// here after a successful commit and move on. Delivery is best-effort —
/// a failed or missing subscriber never fails the request that emitted.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for global events (presence updates)
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<UserId, (u64, mpsc::UnboundedSender<GatewayEvent>)>>,

    /// Users with a live gateway connection, replayed to new clients
    online_users: RwLock<HashSet<UserId>>,

    next_conn_id: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
                online_users: RwLock::new(HashSet::new()),
                next_conn_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to globally broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver);
    /// a newer connection for the same user replaces the older channel.
    pub async fn register_user_channel(
        &self,
        user_id: UserId,
    ) -> (u64, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Send a targeted event to a specific user. Dropped silently when the
    /// user has no live connection.
    pub async fn send_to_user(&self, user_id: UserId, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Mark the user online and tell everyone. Idempotent across parallel
    /// connections from the same user.
    pub async fn user_online(&self, user_id: UserId) {
        let newly = self.inner.online_users.write().await.insert(user_id);
        if newly {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                online: true,
            });
        }
    }

    /// Tear down a connection's channel, but only if conn_id still matches —
    /// a reconnect may already have replaced it.
    pub async fn user_offline(&self, user_id: UserId, conn_id: u64) {
        let mut channels = self.inner.user_channels.write().await;
        let current = channels.get(&user_id).map(|(id, _)| *id);
        if current != Some(conn_id) {
            return;
        }
        channels.remove(&user_id);
        drop(channels);

        self.inner.online_users.write().await.remove(&user_id);
        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            online: false,
        });
    }

    /// Snapshot of users with a live connection, for replay on connect.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.inner.online_users.read().await.iter().copied().collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.broadcast(GatewayEvent::PresenceUpdate {
            user_id: 7,
            online: true,
        });

        match rx.recv().await.unwrap() {
            GatewayEvent::PresenceUpdate { user_id, online } => {
                assert_eq!(user_id, 7);
                assert!(online);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn targeted_send_only_reaches_the_target() {
        let dispatcher = Dispatcher::new();
        let (_, mut rx_a) = dispatcher.register_user_channel(1).await;
        let (_, mut rx_b) = dispatcher.register_user_channel(2).await;

        dispatcher
            .send_to_user(
                1,
                GatewayEvent::TypingStart {
                    conversation_id: 10,
                    user_id: 2,
                },
            )
            .await;

        assert!(matches!(
            rx_a.recv().await,
            Some(GatewayEvent::TypingStart { .. })
        ));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_conn_id_does_not_tear_down_a_reconnect() {
        let dispatcher = Dispatcher::new();
        let (old_conn, _old_rx) = dispatcher.register_user_channel(5).await;
        dispatcher.user_online(5).await;

        // Reconnect replaces the channel; the old connection's teardown
        // must not remove it.
        let (_new_conn, mut new_rx) = dispatcher.register_user_channel(5).await;
        dispatcher.user_offline(5, old_conn).await;

        dispatcher
            .send_to_user(
                5,
                GatewayEvent::ConversationRead {
                    conversation_id: 3,
                    user_id: 9,
                },
            )
            .await;
        assert!(matches!(
            new_rx.recv().await,
            Some(GatewayEvent::ConversationRead { .. })
        ));
        assert_eq!(dispatcher.online_users().await, vec![5]);
    }
}
