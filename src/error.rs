//! Error types for the Truth or Trick client.

use thiserror::Error;

use crate::sequencer::TurnPhase;

/// Errors that can occur when using the Truth or Trick client.
#[derive(Debug, Error)]
pub enum TruthOrTrickError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// A turn action was attempted in a phase that does not accept it.
    #[error("turn is in phase {actual:?}, expected {expected:?}")]
    InvalidPhase {
        /// Phase the action requires.
        expected: TurnPhase,
        /// Phase the sequencer was actually in.
        actual: TurnPhase,
    },

    /// The local player tried to answer a prompt during someone else's turn.
    #[error("it is not the local player's turn")]
    NotYourTurn,

    /// A profile update was rejected before being sent.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// The session driver has stopped and can no longer take commands.
    #[error("session closed")]
    SessionClosed,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Truth or Trick client operations.
pub type Result<T> = std::result::Result<T, TruthOrTrickError>;
