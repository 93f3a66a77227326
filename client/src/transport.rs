use system::IdentifiableCommand;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound queue is full; the command was dropped.
    Full,
    /// The socket side has gone away.
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Full => f.write_str("outbound queue is full"),
            TransportError::Closed => f.write_str("transport is closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Carries commands to the relay server. Implementations must not block.
pub trait Transport {
    fn send(&mut self, command: IdentifiableCommand) -> Result<(), TransportError>;
}

/// Hands commands to whatever pumps the socket, through a bounded queue.
pub struct ChannelTransport {
    tx: Sender<IdentifiableCommand>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, Receiver<IdentifiableCommand>) {
        let (tx, rx) = channel(capacity);
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, command: IdentifiableCommand) -> Result<(), TransportError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Full,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
