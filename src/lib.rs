//! # Truth or Trick Client
//!
//! Async client and turn choreography for the Truth or Trick party game.
//!
//! Players join a room on a game server, the host starts a round, and the
//! server picks players one at a time. Each pick is presented as a spinning
//! wheel, a winner popup and a truth/trick chooser. This crate handles the
//! connection, caches the server's room state and sequences that
//! presentation on deadlines.
//!
//! ## Layers
//!
//! - [`TruthOrTrickClient`] owns a [`Transport`] and turns JSON frames into
//!   typed [`TruthOrTrickEvent`]s
//! - [`RoomStore`] keeps the last room state the server pushed
//! - [`TurnSequencer`] is a pure state machine for one turn's presentation
//! - [`PartySession`] wires the three together and drives the sequencer's timers
//! - [`view`] turns room and turn state into lobby, dashboard, wheel, popup
//!   and prompt-card models
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn run() -> truth_or_trick_client::error::Result<()> {
//! use truth_or_trick_client::{
//!     ClientConfig, JoinRoomParams, PartySession, SessionConfig, WebSocketTransport,
//! };
//!
//! let config = ClientConfig::from_env();
//! let transport = WebSocketTransport::connect_with_config(&config).await?;
//! let (session, mut updates) = PartySession::start(transport, config, SessionConfig::default());
//! session.join_room(JoinRoomParams::new("Ada"))?;
//!
//! while let Some(update) = updates.recv().await {
//!     let snapshot = session.snapshot().await;
//!     println!("{update:?} -> {} players", snapshot.room.players().len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod protocol;
pub mod sequencer;
pub mod store;
pub mod transport;
pub mod transports;
pub mod view;

#[cfg(feature = "tokio-runtime")]
pub mod client;
#[cfg(feature = "tokio-runtime")]
pub mod session;

// Re-export primary types for ergonomic imports.
pub use error::TruthOrTrickError;
pub use event::TruthOrTrickEvent;
pub use protocol::{ClientMessage, PromptKind, ServerMessage};
pub use sequencer::{SequencerConfig, TurnSequencer};
pub use store::RoomStore;
pub use transport::Transport;

#[cfg(feature = "tokio-runtime")]
pub use client::{ClientConfig, JoinRoomParams, ProfileUpdate, TruthOrTrickClient};
#[cfg(feature = "tokio-runtime")]
pub use session::{PartySession, SessionConfig};

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
