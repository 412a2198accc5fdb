//! In-process notification fan-out. Rooms are named broadcast channels in a
//! shared registry; sockets join a room and forward whatever is published
//! there. Delivery is best-effort: no persistence, no retry, and a slow
//! consumer that overruns the channel capacity simply misses events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

const ROOM_CAPACITY: usize = 64;

pub fn user_room(user_id: Uuid) -> String {
    format!("user_{user_id}")
}

pub fn guest_room(session_key: &str) -> String {
    format!("guest_{session_key}")
}

pub fn is_guest_room(room: &str) -> bool {
    room.starts_with("guest_")
}

pub fn is_user_room(room: &str) -> bool {
    room.starts_with("user_")
}

/// Client -> server events on the notification socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    #[serde(rename = "join-notification-room")]
    JoinRoom { room: String },
    #[serde(rename = "leave-notification-room")]
    LeaveRoom { room: String },
}

/// Server -> client events. Payloads stay loose JSON so persisted
/// notifications and ephemeral guest pushes share one envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    #[serde(rename = "notification:new")]
    NotificationNew { payload: serde_json::Value },
    #[serde(rename = "notification:count")]
    NotificationCount { payload: serde_json::Value },
}

impl ServerEvent {
    pub fn new_notification(payload: serde_json::Value) -> Self {
        Self::NotificationNew { payload }
    }

    pub fn unread_count(count: i64) -> Self {
        Self::NotificationCount {
            payload: serde_json::json!({ "count": count }),
        }
    }
}

#[derive(Default)]
pub struct NotificationHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<ServerEvent>>>,
}

impl NotificationHub {
    /// Subscribe to a room, creating it on first join.
    pub async fn join(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Push an event to one room. Returns how many sockets received it;
    /// an empty room is pruned and counts as zero.
    pub async fn publish(&self, room: &str, event: ServerEvent) -> usize {
        let mut rooms = self.rooms.lock().await;
        match rooms.get(room) {
            Some(tx) => match tx.send(event) {
                Ok(n) => n,
                Err(_) => {
                    rooms.remove(room);
                    0
                }
            },
            None => 0,
        }
    }

    /// Push an event to every open room (global broadcast).
    pub async fn publish_global(&self, event: ServerEvent) -> usize {
        let mut rooms = self.rooms.lock().await;
        let mut delivered = 0;
        let mut dead: Vec<String> = Vec::new();
        for (name, tx) in rooms.iter() {
            match tx.send(event.clone()) {
                Ok(n) => delivered += n,
                Err(_) => dead.push(name.clone()),
            }
        }
        for name in dead {
            rooms.remove(&name);
        }
        delivered
    }

    pub async fn open_rooms(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names() {
        let id = Uuid::nil();
        assert_eq!(
            user_room(id),
            "user_00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(guest_room("abc123"), "guest_abc123");
        assert!(is_guest_room("guest_abc123"));
        assert!(is_user_room(&user_room(id)));
        assert!(!is_guest_room(&user_room(id)));
    }

    #[test]
    fn client_event_wire_format() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"join-notification-room","room":"user_1"}"#).unwrap();
        match event {
            ClientEvent::JoinRoom { room } => assert_eq!(room, "user_1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_event_wire_format() {
        let json = serde_json::to_value(ServerEvent::unread_count(3)).unwrap();
        assert_eq!(json["event"], "notification:count");
        assert_eq!(json["payload"]["count"], 3);
    }

    #[tokio::test]
    async fn publish_reaches_joined_room_only() {
        let hub = NotificationHub::default();
        let mut rx = hub.join("user_1").await;

        assert_eq!(hub.publish("user_1", ServerEvent::unread_count(1)).await, 1);
        assert_eq!(hub.publish("user_2", ServerEvent::unread_count(1)).await, 0);

        match rx.recv().await.unwrap() {
            ServerEvent::NotificationCount { payload } => assert_eq!(payload["count"], 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_rooms_are_pruned_on_publish() {
        let hub = NotificationHub::default();
        let rx = hub.join("user_1").await;
        drop(rx);

        assert_eq!(hub.open_rooms().await, 1);
        assert_eq!(hub.publish("user_1", ServerEvent::unread_count(0)).await, 0);
        assert_eq!(hub.open_rooms().await, 0);
    }

    #[tokio::test]
    async fn global_broadcast_hits_every_room() {
        let hub = NotificationHub::default();
        let mut user_rx = hub.join("user_1").await;
        let mut guest_rx = hub.join("guest_k").await;

        assert_eq!(hub.publish_global(ServerEvent::unread_count(9)).await, 2);
        assert!(user_rx.recv().await.is_ok());
        assert!(guest_rx.recv().await.is_ok());
    }
}
