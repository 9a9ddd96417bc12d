use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed")]
    Closed,
}

/// Line-oriented transport abstraction - all the engine cares about is
/// sending and receiving newline-delimited lines.
#[async_trait]
pub trait Transport: Send {
    /// Send one line (the delimiter is appended here).
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Receive the next line (None once the peer closes the connection).
    async fn recv_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// TCP implementation used against a real server.
pub struct TcpTransport {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        info!(addr = %addr, "Connecting");
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half).lines(),
            writer,
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv_line(&mut self) -> Result<Option<String>, TransportError> {
        self.reader
            .next_line()
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))
    }
}
