//! Transport abstraction for the Truth or Trick room connection.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and the room server. Every frame is one JSON text message, so
//! implementations handle framing internally (WebSocket frames, a
//! length-prefixed TCP stream, an in-memory channel in tests).
//!
//! # Connection Setup
//!
//! Connection setup is not part of this trait. Construct a connected
//! transport externally, then pass it to `TruthOrTrickClient::start` (or
//! `PartySession::start`). Reconnecting means building a fresh transport and
//! sending a `Reconnect` message over it.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use truth_or_trick_client::error::TruthOrTrickError;
//! use truth_or_trick_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), TruthOrTrickError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::TruthOrTrickError;

/// A bidirectional text message transport to the room server.
///
/// One call to [`send`](Transport::send) writes one complete JSON frame and
/// one call to [`recv`](Transport::recv) yields one complete JSON frame.
/// The trait is object-safe, so `Box<dyn Transport>` works as well.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is polled inside `tokio::select!` and **MUST** be
/// cancel-safe: dropping the future before it resolves must not lose a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::TransportSend`] (or
    /// [`TruthOrTrickError::TransportClosed`]) if the frame could not be written.
    async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError>;

    /// Receive the next JSON text frame.
    ///
    /// `None` means the server closed the connection cleanly; `Some(Err(_))`
    /// is a transport failure.
    async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>>;

    /// Close the connection. Must release resources even if the close
    /// handshake fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake itself fails.
    async fn close(&mut self) -> Result<(), TruthOrTrickError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), TruthOrTrickError> {
        (**self).close().await
    }
}
