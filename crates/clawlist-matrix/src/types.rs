//! Wire types for the subset of the client-server API the agents use.
//!
//! Only the fields the marketplace reads are modelled; everything else in
//! the homeserver's responses is ignored by serde.

use std::collections::HashMap;

use clawlist_types::RoomEvent;
use serde::{Deserialize, Serialize};

/// Timeline event as delivered by `/sync` and `/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub origin_server_ts: Option<i64>,
}

impl RawEvent {
    /// Text body from `content.body`, or empty when absent or not a string.
    pub fn body(&self) -> &str {
        self.content
            .get("body")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }

    /// Converts to the marketplace event model. Missing fields become empty.
    pub fn into_room_event(self) -> RoomEvent {
        let body = self.body().to_string();
        RoomEvent {
            event_id: self.event_id.unwrap_or_default(),
            sender: self.sender.unwrap_or_default(),
            body,
            kind: self.kind,
            origin_server_ts: self.origin_server_ts.unwrap_or(0),
        }
    }
}

/// Response of `GET /sync`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    /// Continuation token for the next `since`.
    pub next_batch: String,
    #[serde(default)]
    pub rooms: Option<SyncRooms>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl SyncResponse {
    /// Timeline events of `room_id`, in delivery order. Empty when the room
    /// had no activity in this batch.
    pub fn room_events(&self, room_id: &str) -> Vec<RoomEvent> {
        self.rooms
            .as_ref()
            .and_then(|rooms| rooms.join.get(room_id))
            .map(|room| {
                room.timeline
                    .events
                    .iter()
                    .cloned()
                    .map(RawEvent::into_room_event)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Response of `GET /rooms/{room}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub chunk: Vec<RawEvent>,
    #[serde(default)]
    pub start: Option<String>,
    /// Token for the next page; absent once history is exhausted.
    #[serde(default)]
    pub end: Option<String>,
}

/// Response of `PUT /rooms/{room}/send/...`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    pub event_id: String,
}

/// Sync filter restricting the response to a set of rooms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFilter {
    room: RoomFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct RoomFilter {
    rooms: Vec<String>,
    timeline: TimelineFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct TimelineFilter {
    limit: u32,
}

impl SyncFilter {
    /// Filter for a single room returning at most `timeline_limit` events.
    pub fn for_room(room_id: impl Into<String>, timeline_limit: u32) -> Self {
        Self {
            room: RoomFilter {
                rooms: vec![room_id.into()],
                timeline: TimelineFilter {
                    limit: timeline_limit,
                },
            },
        }
    }

    /// Inline JSON form passed as the `filter` query parameter.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
