use thiserror::Error;
use tracing::{debug, info, warn};

use crate::avatar;
use crate::listener::{Disposition, Listener, SessionCx};
use crate::session::engine::{Task, COME_REVERT_DELAY};
use crate::session::BotState;
use crate::wire::{Message, UserChat};

/// All commands start with this.
pub const COMMAND_PREFIX: char = '!';

/// A failure while executing a recognized command. Caught at the dispatcher
/// boundary and reported back to chat; never tears down the connection.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Permanent listener that turns authorized chat commands into session
/// operations.
pub struct ChatCommandListener;

impl Listener for ChatCommandListener {
    fn on_message(&mut self, msg: &Message, cx: &mut SessionCx<'_>) -> Disposition {
        let Some(chat) = msg.as_user_chat() else {
            return Disposition::Keep;
        };

        info!(user_id = %chat.user_id, message = %chat.message, "Chat received");

        if !chat.message.starts_with(COMMAND_PREFIX) {
            return Disposition::Keep;
        }
        if !cx.session.is_authorized(&chat.user_id) {
            debug!(user_id = %chat.user_id, "Ignoring command from unauthorized sender");
            return Disposition::Keep;
        }

        if let Err(e) = run_command(&chat, cx) {
            warn!(error = %e, command = %chat.message, "Command failed");
            cx.send_chat(&format!("ERROR!{e}"));
        }

        Disposition::Keep
    }
}

fn run_command(chat: &UserChat, cx: &mut SessionCx<'_>) -> Result<(), CommandError> {
    let mut parts = chat.message.split_whitespace();
    let command = parts.next().unwrap_or_default();

    match command {
        "!echo" => {
            let text = chat.message.strip_prefix("!echo").unwrap_or_default();
            cx.send_chat(text);
        }
        "!follow" => {
            let target = parts.next().unwrap_or(&chat.user_id).to_string();
            cx.session.following = Some(target.clone());
            cx.session.set_state(BotState::Following);
            cx.send_chat(&format!("Following: {target}"));
        }
        "!stay" => {
            cx.session.set_state(BotState::Staying);
        }
        "!come" => {
            // A timed gesture, not a persistent follow.
            cx.session.following = Some(chat.user_id.clone());
            cx.session.set_state(BotState::Following);
            cx.schedule(Task::RevertToStaying, COME_REVERT_DELAY);
        }
        "!scale" => {
            let arg = parts.next().ok_or(CommandError::MissingArgument("scale factor"))?;
            let scale: f64 = arg
                .parse()
                .map_err(|_| CommandError::InvalidArgument(arg.to_string()))?;
            if scale <= 0.0 || !scale.is_finite() {
                return Err(CommandError::InvalidArgument(arg.to_string()));
            }
            cx.session.avatar.set_scale(scale);
        }
        "!owner" => {
            let owner = parts
                .next()
                .ok_or(CommandError::MissingArgument("owner name"))?
                .to_string();
            cx.session.owner = Some(owner.clone());
            cx.send_chat(&format!("Owner changed to {owner}. Your wish is my command"));
        }
        "!clone" => {
            let target = parts
                .next()
                .ok_or(CommandError::MissingArgument("user to clone"))?
                .to_string();
            info!(user_id = %target, "Waiting for a move to clone their avatar");
            cx.register(Box::new(CloneListener { target }));
        }
        // Unknown commands are silently ignored.
        _ => {}
    }

    Ok(())
}

/// One-shot listener installed by `!clone`: on the next `user_moved` from
/// the target, copies their avatar markup (but not pose) into this bot's
/// own markup, then self-removes.
struct CloneListener {
    target: String,
}

impl Listener for CloneListener {
    fn on_message(&mut self, msg: &Message, cx: &mut SessionCx<'_>) -> Disposition {
        let Some(moved) = msg.as_user_moved() else {
            return Disposition::Keep;
        };
        if moved.user_id != self.target {
            return Disposition::Keep;
        }
        let Some((_, markup)) = avatar::split_wire(&moved.position) else {
            warn!(user_id = %self.target, "Position update without markup, still waiting");
            return Disposition::Keep;
        };

        info!(user_id = %self.target, "Cloned avatar markup");
        cx.session.avatar.markup = markup.to_string();
        Disposition::Remove
    }
}
