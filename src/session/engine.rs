use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::commands::ChatCommandListener;
use crate::error::BotError;
use crate::follow::{self, FollowListener};
use crate::listener::{Disposition, Listener, ListenerRegistry, SessionCx};
use crate::session::{BotConfig, BotState, Session};
use crate::transport::Transport;
use crate::wire::{self, Message};

/// Fixed heartbeat period. The ticker lives for the whole connection; its
/// effect depends solely on the current state.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(1500);

/// How long a `!come` gesture stays in `Following` before reverting.
pub const COME_REVERT_DELAY: Duration = Duration::from_secs(1);

/// Settling delay between a follow target's position report and the
/// hysteresis check.
pub const FOLLOW_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Bounded wait for each handshake acknowledgment. Proceeding without an
/// `okay` would violate the protocol, so exceeding this is fatal.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A deferred action marshaled back onto the session loop. Timers never
/// touch session state directly; they send one of these instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// End a `!come` gesture.
    RevertToStaying,
    /// Run the follow hysteresis check against the latest reported pose.
    SettleFollow,
}

/// Clonable handle for scheduling delayed tasks onto the session loop.
#[derive(Clone)]
pub struct TaskScheduler {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver `task` to the session loop after `delay`.
    pub fn schedule(&self, task: Task, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the connection is down; nothing to do.
            let _ = tx.send(task);
        });
    }
}

/// One-shot listener fulfilling a pending handshake acknowledgment.
struct AckListener {
    slot: Option<oneshot::Sender<()>>,
}

impl AckListener {
    fn new(slot: oneshot::Sender<()>) -> Self {
        Self { slot: Some(slot) }
    }
}

impl Listener for AckListener {
    fn on_message(&mut self, msg: &Message, _cx: &mut SessionCx<'_>) -> Disposition {
        if !msg.is_okay() {
            return Disposition::Keep;
        }
        if let Some(tx) = self.slot.take() {
            let _ = tx.send(());
        }
        Disposition::Remove
    }
}

/// The connection engine: owns the transport, the session state, and the
/// listener registry, and runs the single-task event loop.
pub struct BotEngine<T: Transport> {
    transport: T,
    session: Session,
    listeners: ListenerRegistry,
    tasks: TaskScheduler,
    task_rx: mpsc::UnboundedReceiver<Task>,
}

impl<T: Transport> BotEngine<T> {
    pub fn new(config: BotConfig, transport: T) -> Self {
        let (tasks, task_rx) = TaskScheduler::new();
        let mut listeners = ListenerRegistry::new();
        listeners.register(Box::new(ChatCommandListener));
        listeners.register(Box::new(FollowListener));

        Self {
            transport,
            session: Session::new(config),
            listeners,
            tasks,
            task_rx,
        }
    }

    /// Log in, then run until the server closes the connection or a fatal
    /// error occurs.
    pub async fn run(mut self) -> Result<(), BotError> {
        self.login().await?;

        let Self {
            mut transport,
            mut session,
            mut listeners,
            tasks,
            mut task_rx,
        } = self;

        let mut heartbeat = interval(HEARTBEAT_PERIOD);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = transport.recv_line() => match line? {
                    Some(line) => {
                        let outbound = dispatch_line(&line, &mut listeners, &mut session, &tasks);
                        send_all(&mut transport, outbound).await?;
                    }
                    None => {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                },
                Some(task) = task_rx.recv() => {
                    let outbound = apply_task(task, &mut session);
                    send_all(&mut transport, outbound).await?;
                }
                _ = heartbeat.tick() => {
                    if let Some(msg) = heartbeat_message(&session) {
                        send_all(&mut transport, vec![msg]).await?;
                    }
                }
            }
        }
    }

    /// The login handshake: each step suspends until the server's `okay`.
    ///
    /// Strictly sequential, one outstanding acknowledgment at a time.
    async fn login(&mut self) -> Result<(), BotError> {
        self.session.set_state(BotState::LoggingIn);
        info!(name = %self.session.name, room_id = %self.session.room_id, "Logging in");

        let logon = wire::logon(&self.session.name, &self.session.room_id);
        self.send(logon).await?;
        self.await_okay().await?;

        let subscribe = wire::subscribe(&self.session.room_id);
        self.send(subscribe).await?;
        self.await_okay().await?;

        // Fire-and-forget; the server sends no acknowledgment for this one.
        let enter = wire::enter_room(&self.session.room_id);
        self.send(enter).await?;

        self.session.set_state(BotState::Staying);
        info!("Login complete");
        Ok(())
    }

    /// Pump inbound messages until a one-shot listener sees an `okay`.
    async fn await_okay(&mut self) -> Result<(), BotError> {
        let (tx, mut rx) = oneshot::channel();
        self.listeners.register(Box::new(AckListener::new(tx)));

        let pump = async {
            loop {
                if rx.try_recv().is_ok() {
                    return Ok(());
                }
                match self.transport.recv_line().await? {
                    Some(line) => {
                        let outbound =
                            dispatch_line(&line, &mut self.listeners, &mut self.session, &self.tasks);
                        send_all(&mut self.transport, outbound).await?;
                    }
                    None => {
                        return Err(BotError::HandshakeFailed(
                            "connection closed before acknowledgment".to_string(),
                        ))
                    }
                }
            }
        };

        match timeout(HANDSHAKE_TIMEOUT, pump).await {
            Ok(result) => result,
            Err(_) => Err(BotError::HandshakeTimeout),
        }
    }

    async fn send(&mut self, msg: Message) -> Result<(), BotError> {
        send_all(&mut self.transport, vec![msg]).await
    }
}

/// Decode one line and run it through the registry. Malformed lines are
/// logged and dropped; the connection continues.
fn dispatch_line(
    line: &str,
    listeners: &mut ListenerRegistry,
    session: &mut Session,
    tasks: &TaskScheduler,
) -> Vec<Message> {
    match wire::decode(line) {
        Ok(msg) => listeners.dispatch(&msg, session, tasks),
        Err(e) => {
            warn!(error = %e, "Dropping undecodable line");
            Vec::new()
        }
    }
}

/// Apply a scheduled task on the session loop.
fn apply_task(task: Task, session: &mut Session) -> Vec<Message> {
    debug!(task = ?task, "Applying scheduled task");
    match task {
        Task::RevertToStaying => {
            session.set_state(BotState::Staying);
            Vec::new()
        }
        Task::SettleFollow => follow::settle(session),
    }
}

/// What the heartbeat sends, if anything: while `Staying`, the current pose
/// as a `move`; while `Following`, nothing (movement is event-driven).
fn heartbeat_message(session: &Session) -> Option<Message> {
    match session.state {
        BotState::Staying => Some(wire::move_to(&session.avatar.wire_string())),
        _ => None,
    }
}

async fn send_all<T: Transport>(transport: &mut T, outbound: Vec<Message>) -> Result<(), BotError> {
    for msg in outbound {
        let line = wire::encode(&msg)?;
        transport.send_line(&line).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BotConfig;
    use serde_json::Value;

    fn session_in(state: BotState) -> Session {
        let mut session = Session::new(BotConfig::new("bot", "room1"));
        session.state = state;
        session
    }

    #[test]
    fn heartbeat_broadcasts_pose_only_while_staying() {
        let msg = heartbeat_message(&session_in(BotState::Staying)).expect("move while staying");
        assert_eq!(msg.method, "move");

        assert!(heartbeat_message(&session_in(BotState::Following)).is_none());
        assert!(heartbeat_message(&session_in(BotState::Sleeping)).is_none());
        assert!(heartbeat_message(&session_in(BotState::LoggingIn)).is_none());
    }

    #[test]
    fn revert_task_moves_back_to_staying() {
        let mut session = session_in(BotState::Following);
        session.following = Some("alice".to_string());

        let outbound = apply_task(Task::RevertToStaying, &mut session);
        assert_eq!(session.state, BotState::Staying);
        assert!(outbound.is_empty());
    }

    #[test]
    fn ack_listener_ignores_other_methods_and_fires_once() {
        let mut session = session_in(BotState::LoggingIn);
        let (tasks, _rx) = TaskScheduler::new();
        let mut registry = ListenerRegistry::new();

        let (tx, mut rx) = oneshot::channel();
        registry.register(Box::new(AckListener::new(tx)));

        registry.dispatch(&Message::new("user_chat", Value::Null), &mut session, &tasks);
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.len(), 1);

        registry.dispatch(&Message::new("okay", Value::Null), &mut session, &tasks);
        assert!(rx.try_recv().is_ok());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn malformed_lines_are_dropped_without_output() {
        let mut session = session_in(BotState::Staying);
        let (tasks, _rx) = TaskScheduler::new();
        let mut registry = ListenerRegistry::new();
        registry.register(Box::new(ChatCommandListener));

        let outbound = dispatch_line("{{nonsense", &mut registry, &mut session, &tasks);
        assert!(outbound.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
