// Library crate for the ghostbot presence client
// This file exposes the public API for integration tests

pub mod avatar;
pub mod commands;
pub mod error;
pub mod follow;
pub mod listener;
pub mod session;
pub mod transport;
pub mod wire;

// Re-export commonly used types for easier access in tests
pub use avatar::{Avatar, Pose};
pub use error::BotError;
pub use follow::FOLLOW_DIST;
pub use listener::{Disposition, Listener, ListenerRegistry};
pub use session::engine::{BotEngine, Task, TaskScheduler};
pub use session::{BotConfig, BotState, Session};
pub use transport::{TcpTransport, Transport, TransportError};
pub use wire::{Message, WireError};
