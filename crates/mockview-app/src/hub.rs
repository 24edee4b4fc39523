// Room-based publish/subscribe for server events.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use mockview_core::model::InterviewSession;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered events per room before slow subscribers start lagging.
pub const DEFAULT_ROOM_CAPACITY: usize = 64;

/// Events pushed to clients subscribed to a session room.
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "session:update")]
    SessionUpdate(InterviewSession),

    #[serde(rename = "session:hint", rename_all = "camelCase")]
    SessionHint { hint: String, hints_used: u32 },

    #[serde(rename = "session:submitted")]
    SessionSubmitted(InterviewSession),

    #[serde(rename = "timer:tick", rename_all = "camelCase")]
    TimerTick { remaining_sec: u64 },

    #[serde(rename = "session:joined", rename_all = "camelCase")]
    SessionJoined { session_id: String },

    #[serde(rename = "session:error")]
    SessionError { message: String },
}

/// Room name for a session id.
pub fn session_room(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Rooms are created on first subscribe. They go away when their session
/// finishes ([`EventHub::close`]), when the last subscriber leaves
/// ([`EventHub::release`]), or when a publish finds no receivers left.
pub struct EventHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<ServerEvent>>>,
    capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        EventHub {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ServerEvent>>> {
        self.rooms.lock().expect("event hub mutex poisoned")
    }

    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        let mut rooms = self.rooms();
        match rooms.get(room) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                rooms.insert(room.to_string(), tx);
                rx
            }
        }
    }

    /// Send `event` to everyone in `room`. Returns how many subscribers
    /// received it; zero if the room is empty or unknown.
    pub fn publish(&self, room: &str, event: ServerEvent) -> usize {
        let mut rooms = self.rooms();
        let Some(tx) = rooms.get(room) else {
            return 0;
        };
        match tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                debug!("Room {room} has no subscribers left, dropping it");
                rooms.remove(room);
                0
            }
        }
    }

    /// Drop `room` and its sender. Subscribers receive anything already
    /// published, then `RecvError::Closed`. Returns whether the room existed.
    pub fn close(&self, room: &str) -> bool {
        self.rooms().remove(room).is_some()
    }

    /// Drop `room` if nobody is subscribed to it any more.
    pub fn release(&self, room: &str) -> bool {
        let mut rooms = self.rooms();
        match rooms.get(room) {
            Some(tx) if tx.receiver_count() == 0 => {
                rooms.remove(room);
                true
            }
            _ => false,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_reaches_all_room_subscribers() {
        let hub = EventHub::default();
        let mut a = hub.subscribe("session:1");
        let mut b = hub.subscribe("session:1");
        let mut other = hub.subscribe("session:2");

        let sent = hub.publish("session:1", ServerEvent::TimerTick { remaining_sec: 5 });
        assert_eq!(sent, 2);

        assert_eq!(a.recv().await.unwrap(), ServerEvent::TimerTick { remaining_sec: 5 });
        assert_eq!(b.recv().await.unwrap(), ServerEvent::TimerTick { remaining_sec: 5 });
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn publish_to_unknown_room_is_noop() {
        let hub = EventHub::default();
        assert_eq!(hub.publish("session:none", ServerEvent::TimerTick { remaining_sec: 1 }), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn abandoned_room_is_dropped_on_publish() {
        let hub = EventHub::default();
        let rx = hub.subscribe("session:1");
        assert_eq!(hub.room_count(), 1);
        drop(rx);

        assert_eq!(hub.publish("session:1", ServerEvent::TimerTick { remaining_sec: 1 }), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn close_delivers_pending_events_then_ends_the_room() {
        let hub = EventHub::default();
        let mut rx = hub.subscribe("session:1");
        hub.publish("session:1", ServerEvent::TimerTick { remaining_sec: 0 });

        assert!(hub.close("session:1"));
        assert!(!hub.close("session:1"));
        assert_eq!(hub.room_count(), 0);

        assert_eq!(rx.recv().await.unwrap(), ServerEvent::TimerTick { remaining_sec: 0 });
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));

        // Publishing to a closed room does not bring it back.
        assert_eq!(hub.publish("session:1", ServerEvent::TimerTick { remaining_sec: 0 }), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn release_only_drops_rooms_without_subscribers() {
        let hub = EventHub::default();
        let a = hub.subscribe("session:1");
        let b = hub.subscribe("session:1");

        drop(a);
        assert!(!hub.release("session:1"));
        assert_eq!(hub.room_count(), 1);

        drop(b);
        assert!(hub.release("session:1"));
        assert_eq!(hub.room_count(), 0);
        assert!(!hub.release("session:unknown"));
    }

    #[test]
    fn events_serialize_with_wire_names() {
        let tick = serde_json::to_value(ServerEvent::TimerTick { remaining_sec: 42 }).unwrap();
        assert_eq!(tick, json!({"event": "timer:tick", "data": {"remainingSec": 42}}));

        let hint = serde_json::to_value(ServerEvent::SessionHint {
            hint: "Use a map".into(),
            hints_used: 2,
        })
        .unwrap();
        assert_eq!(
            hint,
            json!({"event": "session:hint", "data": {"hint": "Use a map", "hintsUsed": 2}})
        );

        let joined = serde_json::to_value(ServerEvent::SessionJoined {
            session_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(joined["event"], "session:joined");
        assert_eq!(joined["data"]["sessionId"], "abc");
    }

    #[test]
    fn room_name_format() {
        assert_eq!(session_room("abc"), "session:abc");
    }
}
