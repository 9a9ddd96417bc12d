use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

use ghostbot::wire::{self, Message};
use ghostbot::{Transport, TransportError};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Channel-backed transport: the test plays the server on the other end.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.sent
            .send(line.to_string())
            .map_err(|_| TransportError::Closed)
    }

    async fn recv_line(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.incoming.recv().await)
    }
}

/// The test's half of the connection.
pub struct ServerHarness {
    to_bot: mpsc::UnboundedSender<String>,
    from_bot: mpsc::UnboundedReceiver<String>,
}

/// Build a connected transport/harness pair.
pub fn transport_pair() -> (MockTransport, ServerHarness) {
    let (to_bot, incoming) = mpsc::unbounded_channel();
    let (sent, from_bot) = mpsc::unbounded_channel();
    (
        MockTransport { incoming, sent },
        ServerHarness { to_bot, from_bot },
    )
}

impl ServerHarness {
    pub fn send_line(&self, line: &str) {
        self.to_bot
            .send(line.to_string())
            .expect("bot hung up unexpectedly");
    }

    fn send_message(&self, msg: &Message) {
        self.send_line(&wire::encode(msg).expect("encodable message"));
    }

    pub fn send_okay(&self) {
        self.send_message(&Message::new("okay", json!({})));
    }

    pub fn send_chat(&self, user_id: &str, text: &str) {
        self.send_message(&Message::new(
            "user_chat",
            json!({ "userId": user_id, "message": text }),
        ));
    }

    pub fn send_moved(&self, user_id: &str, position: &str, room_id: &str) {
        self.send_message(&Message::new(
            "user_moved",
            json!({ "userId": user_id, "position": position, "roomId": room_id }),
        ));
    }

    pub fn send_leave(&self, user_id: &str, new_room_id: Option<&str>) {
        let data = match new_room_id {
            Some(room) => json!({ "userId": user_id, "newRoomId": room }),
            None => json!({ "userId": user_id }),
        };
        self.send_message(&Message::new("user_leave", data));
    }

    /// Next message sent by the bot. Bounded so a wedged bot fails the test
    /// instead of hanging it.
    pub async fn next_message(&mut self) -> Message {
        let line = tokio::time::timeout(Duration::from_secs(60), self.from_bot.recv())
            .await
            .expect("timed out waiting for a message from the bot")
            .expect("bot hung up unexpectedly");
        wire::decode(&line).expect("bot sent an undecodable line")
    }

    /// Next message, asserting its method.
    pub async fn expect_method(&mut self, method: &str) -> Message {
        let msg = self.next_message().await;
        assert_eq!(msg.method, method, "unexpected message: {msg:?}");
        msg
    }

    /// Next `chat` message, skipping heartbeat `move` traffic.
    pub async fn next_chat(&mut self) -> String {
        loop {
            let msg = self.next_message().await;
            match msg.method.as_str() {
                "chat" => {
                    return msg
                        .data
                        .as_str()
                        .expect("chat payload is a string")
                        .to_string()
                }
                "move" => continue,
                other => panic!("unexpected {other} while waiting for chat: {msg:?}"),
            }
        }
    }

    /// Next `move` message's avatar string.
    pub async fn next_move(&mut self) -> String {
        let msg = self.expect_method("move").await;
        msg.data
            .as_str()
            .expect("move payload is a string")
            .to_string()
    }

    /// Drive the logon/subscribe/enter_room sequence to completion.
    pub async fn complete_handshake(&mut self, name: &str, room_id: &str) {
        let logon = self.expect_method("logon").await;
        assert_eq!(logon.data["userId"], name);
        assert_eq!(logon.data["roomId"], room_id);
        self.send_okay();

        let subscribe = self.expect_method("subscribe").await;
        assert_eq!(subscribe.data["roomId"], room_id);
        self.send_okay();

        let enter = self.expect_method("enter_room").await;
        assert_eq!(enter.data["roomId"], room_id);
    }
}
