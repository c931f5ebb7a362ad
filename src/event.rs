//! High-level events emitted by the client's transport loop.
//!
//! Most variants map one-to-one onto a [`ServerMessage`]. Three are
//! synthetic: [`Connected`](TruthOrTrickEvent::Connected) and
//! [`Disconnected`](TruthOrTrickEvent::Disconnected) bracket the lifetime of the
//! transport, and [`UnexpectedPayload`](TruthOrTrickEvent::UnexpectedPayload)
//! reports an inbound frame that failed to decode or validate.

use crate::protocol::{Announcement, PlayerId, PromptKind, RoomState, ServerMessage};

/// An event delivered on the receiver returned by `TruthOrTrickClient::start`.
#[derive(Debug, Clone)]
pub enum TruthOrTrickEvent {
    /// The transport loop is running. Always the first event.
    Connected,
    /// The transport loop has exited. Always the last event.
    Disconnected {
        /// Why the connection ended, when known.
        reason: Option<String>,
    },
    /// An inbound frame was rejected and ignored.
    UnexpectedPayload {
        /// What was wrong with it.
        reason: String,
    },
    /// The server seated us in a room.
    RoomJoined {
        room_id: String,
        session_id: PlayerId,
        reconnection_token: Option<String>,
    },
    /// New player list and room metadata.
    RoomUpdated(RoomState),
    GameStarted,
    /// A player was selected for the next turn.
    PlayerSelected(Box<Announcement>),
    /// The prompt chooser may be shown.
    PickPrompt,
    /// The server confirmed the prompt for this turn.
    PromptSelected { kind: PromptKind, content: String },
    TurnEnded,
    GameEnded { reason: Option<String> },
    RoomLeft,
    /// The server reported an error.
    ServerError { message: String },
}

impl From<ServerMessage> for TruthOrTrickEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::RoomJoined {
                room_id,
                session_id,
                reconnection_token,
            } => Self::RoomJoined {
                room_id,
                session_id,
                reconnection_token,
            },
            ServerMessage::RoomUpdate(room) => Self::RoomUpdated(room),
            ServerMessage::GameStarted => Self::GameStarted,
            ServerMessage::PlayerSelected(announcement) => Self::PlayerSelected(announcement),
            ServerMessage::PickPrompt => Self::PickPrompt,
            ServerMessage::PromptSelected { kind, content } => Self::PromptSelected { kind, content },
            ServerMessage::EndTurn => Self::TurnEnded,
            ServerMessage::GameEnded { reason } => Self::GameEnded { reason },
            ServerMessage::RoomLeft => Self::RoomLeft,
            ServerMessage::Error { message } => Self::ServerError { message },
        }
    }
}
