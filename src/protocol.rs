//! Wire types for the Truth or Trick room server.
//!
//! Every frame is a JSON text message, adjacently tagged as
//! `{"type": "<Variant>", "data": {...}}`. Unit variants carry no `data`.
//!
//! Inbound frames are decoded into [`ServerMessage`] and then shape-checked
//! with [`ServerMessage::validate`] before anything downstream trusts them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Identifiers ─────────────────────────────────────────────────────

/// Server-assigned identifier for a player (the room session id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wrap a raw session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the server sent an empty id.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Enums ───────────────────────────────────────────────────────────

/// Where a player is in the current round of turns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    /// Has not been selected yet this round.
    #[default]
    NotStarted,
    /// Currently taking a turn.
    InProgress,
    /// Already had a turn this round.
    Completed,
}

/// The two kinds of prompt a selected player can pick from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Truth,
    Trick,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truth => f.write_str("truth"),
            Self::Trick => f.write_str("trick"),
        }
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// A player as last pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default)]
    pub avatar_id: Option<String>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub round_state: RoundState,
}

/// Free-form room metadata. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    /// Round number, starting at 1 once the game has begun.
    #[serde(default)]
    pub round: u32,
}

/// Full room snapshot. Replaces any previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomState {
    pub players: Vec<Player>,
    #[serde(default)]
    pub host_id: Option<PlayerId>,
    #[serde(default)]
    pub meta: RoomMeta,
}

/// The two prompt texts offered to the selected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOptions {
    pub truth: String,
    pub trick: String,
}

impl PromptOptions {
    /// The option text for the given kind.
    pub fn get(&self, kind: PromptKind) -> &str {
        match kind {
            PromptKind::Truth => &self.truth,
            PromptKind::Trick => &self.trick,
        }
    }
}

/// Payload naming the player selected for the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub player: Player,
    /// Players still waiting for a turn this round, the selected one excluded.
    pub remaining_count: u32,
    pub total_players: u32,
    /// Every player has now had a turn this round.
    #[serde(default)]
    pub exhausted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_options: Option<PromptOptions>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Join a room by code, or let the server pick/create one.
    JoinRoom {
        room_code: Option<String>,
        display_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        avatar_id: Option<String>,
    },
    /// Host only: leave the lobby and start spinning turns.
    StartGame,
    /// The selected player picked truth or trick.
    PromptChosen {
        #[serde(rename = "type")]
        kind: PromptKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// The selected player is done with their prompt.
    FinishTurn,
    /// Rename and/or change avatar.
    UpdateProfile {
        display_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        avatar_id: Option<String>,
    },
    /// Start another game in the same room after the last one ended.
    PlayAgain,
    /// Leave the current room.
    LeaveRoom,
    /// Resume a seat in a room after the connection dropped.
    Reconnect {
        room_id: String,
        reconnection_token: String,
    },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Seat confirmed; `session_id` is the local player's id.
    RoomJoined {
        room_id: String,
        session_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reconnection_token: Option<String>,
    },
    /// Full player list and room metadata.
    RoomUpdate(RoomState),
    /// The host started the game.
    GameStarted,
    /// The wheel landed on a player (boxed to reduce enum size).
    PlayerSelected(Box<Announcement>),
    /// Show the truth/trick chooser for the current turn.
    PickPrompt,
    /// Server-confirmed prompt for the current turn.
    PromptSelected {
        #[serde(rename = "type")]
        kind: PromptKind,
        content: String,
    },
    /// The current turn is over.
    EndTurn,
    /// The game is over.
    GameEnded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Successfully left the room.
    RoomLeft,
    /// Error message.
    Error { message: String },
}

impl ServerMessage {
    /// Check the decoded payload for values the type system cannot rule out.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::RoomJoined {
                room_id,
                session_id,
                ..
            } => {
                if room_id.is_empty() {
                    return Err("RoomJoined with empty room_id".into());
                }
                if session_id.is_empty() {
                    return Err("RoomJoined with empty session_id".into());
                }
                Ok(())
            }
            Self::RoomUpdate(room) => {
                if let Some(player) = room.players.iter().find(|p| p.id.is_empty()) {
                    return Err(format!(
                        "RoomUpdate contains player '{}' with empty id",
                        player.display_name
                    ));
                }
                Ok(())
            }
            Self::PlayerSelected(announcement) => {
                if announcement.player.id.is_empty() {
                    return Err("PlayerSelected with empty player id".into());
                }
                if announcement.remaining_count > announcement.total_players {
                    return Err(format!(
                        "PlayerSelected remaining_count {} exceeds total_players {}",
                        announcement.remaining_count, announcement.total_players
                    ));
                }
                Ok(())
            }
            Self::PromptSelected { content, .. } => {
                if content.trim().is_empty() {
                    return Err("PromptSelected with empty content".into());
                }
                Ok(())
            }
            Self::GameStarted
            | Self::PickPrompt
            | Self::EndTurn
            | Self::GameEnded { .. }
            | Self::RoomLeft
            | Self::Error { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn player(id: &str) -> Player {
        Player {
            id: PlayerId::from(id),
            display_name: "Alice".into(),
            avatar_id: None,
            is_host: false,
            round_state: RoundState::NotStarted,
        }
    }

    #[test]
    fn validate_rejects_remaining_above_total() {
        let msg = ServerMessage::PlayerSelected(Box::new(Announcement {
            player: player("p1"),
            remaining_count: 5,
            total_players: 3,
            exhausted: false,
            prompt_options: None,
        }));
        let err = msg.validate().unwrap_err();
        assert!(err.contains("exceeds"));
    }

    #[test]
    fn validate_rejects_empty_player_id_in_room_update() {
        let msg = ServerMessage::RoomUpdate(RoomState {
            players: vec![player("")],
            host_id: None,
            meta: RoomMeta::default(),
        });
        assert!(msg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_prompt_content() {
        let msg = ServerMessage::PromptSelected {
            kind: PromptKind::Trick,
            content: "   ".into(),
        };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn validate_accepts_unit_messages() {
        assert!(ServerMessage::PickPrompt.validate().is_ok());
        assert!(ServerMessage::EndTurn.validate().is_ok());
        assert!(ServerMessage::GameStarted.validate().is_ok());
    }

    #[test]
    fn prompt_options_lookup_by_kind() {
        let options = PromptOptions {
            truth: "What scares you?".into(),
            trick: "Sing a song".into(),
        };
        assert_eq!(options.get(PromptKind::Truth), "What scares you?");
        assert_eq!(options.get(PromptKind::Trick), "Sing a song");
    }
}
