use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Protocol version reported during logon.
pub const PROTOCOL_VERSION: &str = "25.5";

/// Method tags used on the wire.
pub mod method {
    pub const LOGON: &str = "logon";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const ENTER_ROOM: &str = "enter_room";
    pub const MOVE: &str = "move";
    pub const CHAT: &str = "chat";
    pub const OKAY: &str = "okay";
    pub const USER_CHAT: &str = "user_chat";
    pub const USER_MOVED: &str = "user_moved";
    pub const USER_LEAVE: &str = "user_leave";
}

#[derive(Debug, Error)]
pub enum WireError {
    /// The line was not a valid JSON object or lacked a `method` field.
    /// Lines that fail to decode are dropped; they never tear down the
    /// connection.
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One protocol message: a method tag plus a method-specific payload.
///
/// Payload shape correctness is each listener's responsibility; the codec
/// only guarantees valid JSON with a `method` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub method: String,
    #[serde(default)]
    pub data: Value,
}

impl Message {
    pub fn new(method: impl Into<String>, data: Value) -> Self {
        Self {
            method: method.into(),
            data,
        }
    }

    pub fn is_okay(&self) -> bool {
        self.method == method::OKAY
    }

    /// View this message as a `user_chat` payload, if it is one.
    pub fn as_user_chat(&self) -> Option<UserChat> {
        (self.method == method::USER_CHAT)
            .then(|| serde_json::from_value(self.data.clone()).ok())
            .flatten()
    }

    /// View this message as a `user_moved` payload, if it is one.
    pub fn as_user_moved(&self) -> Option<UserMoved> {
        (self.method == method::USER_MOVED)
            .then(|| serde_json::from_value(self.data.clone()).ok())
            .flatten()
    }

    /// View this message as a `user_leave` payload, if it is one.
    pub fn as_user_leave(&self) -> Option<UserLeave> {
        (self.method == method::USER_LEAVE)
            .then(|| serde_json::from_value(self.data.clone()).ok())
            .flatten()
    }
}

/// A chat line spoken by some user in the room.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserChat {
    pub user_id: String,
    pub message: String,
}

/// A position update from some user. `position` carries the full avatar
/// wire string (pose, separator, markup).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserMoved {
    pub user_id: String,
    pub position: String,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// A user leaving the room, possibly for another one.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLeave {
    pub user_id: String,
    #[serde(default)]
    pub new_room_id: Option<String>,
}

/// Encode a message as one newline-free JSON line.
pub fn encode(msg: &Message) -> Result<String, WireError> {
    serde_json::to_string(msg).map_err(WireError::Encode)
}

/// Decode one received line into a message.
pub fn decode(line: &str) -> Result<Message, WireError> {
    serde_json::from_str(line).map_err(|e| WireError::Malformed(e.to_string()))
}

pub fn logon(user_id: &str, room_id: &str) -> Message {
    Message::new(
        method::LOGON,
        json!({ "userId": user_id, "version": PROTOCOL_VERSION, "roomId": room_id }),
    )
}

pub fn subscribe(room_id: &str) -> Message {
    Message::new(method::SUBSCRIBE, json!({ "roomId": room_id }))
}

pub fn enter_room(room_id: &str) -> Message {
    Message::new(method::ENTER_ROOM, json!({ "roomId": room_id }))
}

pub fn move_to(avatar: &str) -> Message {
    Message::new(method::MOVE, Value::String(avatar.to_string()))
}

pub fn chat(text: &str) -> Message {
    Message::new(method::CHAT, Value::String(text.to_string()))
}
