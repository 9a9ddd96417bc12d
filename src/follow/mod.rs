use tracing::{debug, info, warn};

use crate::avatar::{self, Pose};
use crate::listener::{Disposition, Listener, SessionCx};
use crate::session::engine::{Task, FOLLOW_SETTLE_DELAY};
use crate::session::{BotState, Session};
use crate::wire::{self, Message, UserLeave, UserMoved};

/// Hysteresis threshold: the bot repositions only when the target has moved
/// further than `avatar_scale * FOLLOW_DIST` away, preventing jitter and
/// clipping on small deltas.
pub const FOLLOW_DIST: f64 = 1.5;

/// Permanent listener that tracks the follow target's movements and room
/// changes, and keeps visibility into the owner's room.
pub struct FollowListener;

impl Listener for FollowListener {
    fn on_message(&mut self, msg: &Message, cx: &mut SessionCx<'_>) -> Disposition {
        if let Some(moved) = msg.as_user_moved() {
            on_user_moved(&moved, cx);
        } else if let Some(leave) = msg.as_user_leave() {
            on_user_leave(&leave, cx);
        }
        // Permanent for the connection's lifetime.
        Disposition::Keep
    }
}

fn is_follow_target(session: &Session, user_id: &str) -> bool {
    session.state == BotState::Following && session.following.as_deref() == Some(user_id)
}

fn on_user_moved(moved: &UserMoved, cx: &mut SessionCx<'_>) {
    if !is_follow_target(cx.session, &moved.user_id) {
        return;
    }

    let Some((pose_part, _)) = avatar::split_wire(&moved.position) else {
        warn!(user_id = %moved.user_id, "Position update without pose separator");
        return;
    };
    let Some(pose) = Pose::parse(pose_part) else {
        warn!(user_id = %moved.user_id, "Unparsable pose in position update");
        return;
    };

    cx.session.latest_follow_pose = Some(pose);

    if let Some(room_id) = &moved.room_id {
        if *room_id != cx.session.room_id {
            info!(room_id = %room_id, "Follow target changed rooms, moving with them");
            cx.enter_room(room_id);
        }
    }

    // Let the position settle before deciding whether to move.
    cx.schedule(Task::SettleFollow, FOLLOW_SETTLE_DELAY);
}

fn on_user_leave(leave: &UserLeave, cx: &mut SessionCx<'_>) {
    // Owner room tracking is independent of the follow target and of the
    // current state: wherever the owner goes, keep a subscription there.
    if cx.session.owner.as_deref() == Some(leave.user_id.as_str()) {
        if let Some(room_id) = &leave.new_room_id {
            info!(room_id = %room_id, "Owner moved to another room, subscribing");
            cx.send(wire::subscribe(room_id));
        }
    }

    if !is_follow_target(cx.session, &leave.user_id) {
        return;
    }

    match &leave.new_room_id {
        Some(room_id) => {
            info!(room_id = %room_id, "Follow target left for another room, following");
            cx.enter_room(room_id);
        }
        None => {
            info!(user_id = %leave.user_id, "Follow target left, staying put");
            cx.session.set_state(BotState::Staying);
        }
    }
}

/// The settle check, run on the session loop when the 0.5 s timer fires:
/// move to the target's latest reported pose only if it is further away
/// than the hysteresis threshold, otherwise re-broadcast the unchanged
/// pose.
pub fn settle(session: &mut Session) -> Vec<Message> {
    if session.state != BotState::Following || session.following.is_none() {
        return Vec::new();
    }
    let Some(target) = session.latest_follow_pose else {
        return Vec::new();
    };

    let distance = session.avatar.pose.distance_to(&target);
    let threshold = session.avatar.scale * FOLLOW_DIST;
    if distance > threshold {
        debug!(distance, threshold, "Target out of range, moving");
        session.avatar.pose = target;
    } else {
        debug!(distance, threshold, "Target within range, holding position");
    }

    vec![wire::move_to(&session.avatar.wire_string())]
}
