use tracing::debug;

use crate::session::engine::{Task, TaskScheduler};
use crate::session::Session;
use crate::wire::{self, Message};

/// What a listener wants done with itself after seeing a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Stay registered.
    Keep,
    /// Remove after this dispatch pass ("one-shot" contract).
    Remove,
}

/// A callback over every inbound message.
///
/// Listeners mutate the session and queue outbound messages through the
/// dispatch context; they never touch the socket or the registry directly.
pub trait Listener: Send {
    fn on_message(&mut self, msg: &Message, cx: &mut SessionCx<'_>) -> Disposition;
}

/// Context handed to a listener during dispatch.
pub struct SessionCx<'a> {
    pub session: &'a mut Session,
    pub tasks: &'a TaskScheduler,
    outbound: &'a mut Vec<Message>,
    added: &'a mut Vec<Box<dyn Listener>>,
}

impl SessionCx<'_> {
    /// Queue a message for sending once the dispatch pass completes.
    pub fn send(&mut self, msg: Message) {
        self.outbound.push(msg);
    }

    pub fn send_chat(&mut self, text: &str) {
        self.send(wire::chat(text));
    }

    /// Broadcast the session's current avatar as a `move`.
    pub fn send_move(&mut self) {
        let avatar = self.session.avatar.wire_string();
        self.send(wire::move_to(&avatar));
    }

    /// Subscribe to and enter a room, retargeting the session's tracked room.
    pub fn enter_room(&mut self, room_id: &str) {
        self.send(wire::subscribe(room_id));
        self.send(wire::enter_room(room_id));
        self.session.room_id = room_id.to_string();
    }

    /// Register a listener. Deferred to the next dispatch pass; a listener
    /// registered here never sees the message currently being dispatched.
    pub fn register(&mut self, listener: Box<dyn Listener>) {
        self.added.push(listener);
    }

    /// Schedule a task back onto the session loop after a delay.
    pub fn schedule(&self, task: Task, delay: std::time::Duration) {
        self.tasks.schedule(task, delay);
    }
}

/// Ordered collection of listeners, mutation-safe under iteration.
///
/// Registrations are queued and join the active list at the start of the
/// next dispatch pass; removals signalled during a pass are applied as a
/// batch after the full pass. No listener ever observes the registry
/// mutated mid-pass.
#[derive(Default)]
pub struct ListenerRegistry {
    active: Vec<Box<dyn Listener>>,
    pending: Vec<Box<dyn Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a listener; it starts receiving messages from the next
    /// dispatched message.
    pub fn register(&mut self, listener: Box<dyn Listener>) {
        self.pending.push(listener);
    }

    /// Number of listeners that will participate in the next pass.
    pub fn len(&self) -> usize {
        self.active.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered listener in registration order, returning the
    /// outbound messages they queued.
    pub fn dispatch(
        &mut self,
        msg: &Message,
        session: &mut Session,
        tasks: &TaskScheduler,
    ) -> Vec<Message> {
        self.active.append(&mut self.pending);

        debug!(method = %msg.method, listeners = self.active.len(), "Dispatching message");

        let mut outbound = Vec::new();
        let mut added = Vec::new();
        let mut removals = Vec::with_capacity(self.active.len());

        for listener in self.active.iter_mut() {
            let mut cx = SessionCx {
                session,
                tasks,
                outbound: &mut outbound,
                added: &mut added,
            };
            removals.push(listener.on_message(msg, &mut cx) == Disposition::Remove);
        }

        let mut flags = removals.into_iter();
        self.active.retain(|_| !flags.next().unwrap_or(false));
        self.pending.append(&mut added);

        outbound
    }
}
