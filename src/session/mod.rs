pub mod engine;

use tracing::info;

use crate::avatar::{Avatar, Pose};

/// Connection phase of the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    /// Pre-connect.
    Sleeping,
    /// Handshake in flight.
    LoggingIn,
    /// Idle; the heartbeat rebroadcasts the current pose.
    Staying,
    /// Tracking another user; movement is event-driven.
    Following,
}

/// Construction-time configuration for one bot session.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub name: String,
    pub room_id: String,
    pub owner: Option<String>,
    pub markup: Option<String>,
}

impl BotConfig {
    pub fn new(name: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            room_id: room_id.into(),
            owner: None,
            markup: None,
        }
    }

    /// Restrict commands to the given owner. Without an owner, anyone may
    /// issue commands.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Use externally supplied avatar markup instead of the default ghost.
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }
}

/// Mutable state of one connection. Created at connection start, mutated
/// only from the session loop, gone on disconnect.
#[derive(Debug)]
pub struct Session {
    pub state: BotState,
    pub name: String,
    pub room_id: String,
    pub owner: Option<String>,
    pub avatar: Avatar,
    /// User currently being followed. May linger while `state` is no longer
    /// `Following`; follow actions treat that as a no-op.
    pub following: Option<String>,
    /// Latest pose reported by the follow target, compared against our own
    /// position when the settle timer fires.
    pub latest_follow_pose: Option<Pose>,
}

impl Session {
    pub fn new(config: BotConfig) -> Self {
        let avatar = match &config.markup {
            Some(markup) => Avatar::with_markup(markup.clone()),
            None => Avatar::ghost(&config.name),
        };
        Self {
            state: BotState::Sleeping,
            name: config.name,
            room_id: config.room_id,
            owner: config.owner,
            avatar,
            following: None,
            latest_follow_pose: None,
        }
    }

    pub fn set_state(&mut self, state: BotState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "State transition");
        }
        self.state = state;
    }

    /// Whether a chat sender may issue commands: no owner configured, the
    /// owner themselves, or the bot's own name (self-issued commands echoed
    /// back through chat).
    pub fn is_authorized(&self, sender: &str) -> bool {
        match &self.owner {
            None => true,
            Some(owner) => owner == sender || sender == self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyone_is_authorized_without_an_owner() {
        let session = Session::new(BotConfig::new("bot", "room1"));
        assert!(session.is_authorized("stranger"));
    }

    #[test]
    fn only_owner_and_self_are_authorized() {
        let session = Session::new(BotConfig::new("bot", "room1").with_owner("alice"));
        assert!(session.is_authorized("alice"));
        assert!(session.is_authorized("bot"));
        assert!(!session.is_authorized("bob"));
    }

    #[test]
    fn config_markup_overrides_default_ghost() {
        let session = Session::new(BotConfig::new("bot", "room1").with_markup("<Room>|</Room>|"));
        assert_eq!(session.avatar.markup, "<Room>|</Room>|");

        let default = Session::new(BotConfig::new("bot", "room1"));
        assert!(default.avatar.markup.contains("Ghost~id=&bot&"));
    }
}
