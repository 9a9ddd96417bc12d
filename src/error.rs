use thiserror::Error;

use crate::transport::TransportError;
use crate::wire::WireError;

/// Fatal session errors. Command failures and malformed inbound lines are
/// handled in place and never surface here.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("handshake timed out waiting for okay")]
    HandshakeTimeout,

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] WireError),
}
