//! Last-known room state, as pushed by the server.
//!
//! The server is authoritative: every `RoomUpdate` replaces the cached
//! [`RoomState`] wholesale, with no merging. The store also tracks which
//! player we are, the game lifecycle and the status banner the UI shows.

use tracing::debug;

use crate::event::TruthOrTrickEvent;
use crate::protocol::{Player, PlayerId, RoomState, RoundState};

/// Fewest players a game can start with.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Where the room is in its game lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    Lobby,
    InProgress,
    Ended { reason: Option<String> },
}

/// One-line connection status for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusBanner {
    /// Connecting, or connected but not seated yet.
    #[default]
    Waiting,
    Connected,
    Disconnected { reason: Option<String> },
    /// The last inbound frame was rejected.
    UnexpectedPayload { detail: String },
    ServerError { message: String },
}

impl std::fmt::Display for StatusBanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => f.write_str("Waiting for the server…"),
            Self::Connected => f.write_str("Connected"),
            Self::Disconnected { reason: Some(reason) } => write!(f, "Disconnected: {reason}"),
            Self::Disconnected { reason: None } => f.write_str("Disconnected"),
            Self::UnexpectedPayload { .. } => f.write_str("Received an unexpected payload"),
            Self::ServerError { message } => write!(f, "Server error: {message}"),
        }
    }
}

/// Read-only cache of server-owned room state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStore {
    room: Option<RoomState>,
    session_id: Option<PlayerId>,
    room_id: Option<String>,
    reconnection_token: Option<String>,
    game_status: GameStatus,
    status: StatusBanner,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the store. Returns `true` if anything changed.
    pub fn apply(&mut self, event: &TruthOrTrickEvent) -> bool {
        let before = self.clone();
        match event {
            TruthOrTrickEvent::Connected => {
                self.status = StatusBanner::Waiting;
            }
            TruthOrTrickEvent::Disconnected { reason } => {
                self.status = StatusBanner::Disconnected {
                    reason: reason.clone(),
                };
            }
            TruthOrTrickEvent::UnexpectedPayload { reason } => {
                self.status = StatusBanner::UnexpectedPayload {
                    detail: reason.clone(),
                };
            }
            TruthOrTrickEvent::RoomJoined {
                room_id,
                session_id,
                reconnection_token,
            } => {
                self.room_id = Some(room_id.clone());
                self.session_id = Some(session_id.clone());
                self.reconnection_token = reconnection_token.clone();
                self.status = StatusBanner::Connected;
            }
            TruthOrTrickEvent::RoomUpdated(room) => {
                self.room = Some(room.clone());
                if matches!(self.status, StatusBanner::UnexpectedPayload { .. }) {
                    self.status = StatusBanner::Connected;
                }
            }
            TruthOrTrickEvent::GameStarted => {
                self.game_status = GameStatus::InProgress;
            }
            TruthOrTrickEvent::GameEnded { reason } => {
                self.game_status = GameStatus::Ended {
                    reason: reason.clone(),
                };
            }
            TruthOrTrickEvent::RoomLeft => {
                self.room = None;
                self.room_id = None;
                self.reconnection_token = None;
                self.game_status = GameStatus::Lobby;
                self.status = StatusBanner::Waiting;
            }
            TruthOrTrickEvent::ServerError { message } => {
                self.status = StatusBanner::ServerError {
                    message: message.clone(),
                };
            }
            TruthOrTrickEvent::PlayerSelected(_)
            | TruthOrTrickEvent::PickPrompt
            | TruthOrTrickEvent::PromptSelected { .. }
            | TruthOrTrickEvent::TurnEnded => {}
        }
        let changed = *self != before;
        if changed {
            debug!(status = ?self.status, game = ?self.game_status, "room store updated");
        }
        changed
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn room(&self) -> Option<&RoomState> {
        self.room.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        self.room
            .as_ref()
            .map(|room| room.players.as_slice())
            .unwrap_or_default()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players().iter().find(|p| p.id == *id)
    }

    /// The host, by `host_id` when present, otherwise by the `is_host` flag.
    pub fn host(&self) -> Option<&Player> {
        let room = self.room.as_ref()?;
        match &room.host_id {
            Some(host_id) => room.players.iter().find(|p| p.id == *host_id),
            None => room.players.iter().find(|p| p.is_host),
        }
    }

    pub fn session_id(&self) -> Option<&PlayerId> {
        self.session_id.as_ref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn reconnection_token(&self) -> Option<&str> {
        self.reconnection_token.as_deref()
    }

    /// The local player, once seated and listed.
    pub fn me(&self) -> Option<&Player> {
        self.player(self.session_id.as_ref()?)
    }

    pub fn is_host(&self) -> bool {
        match (self.host(), &self.session_id) {
            (Some(host), Some(me)) => host.id == *me,
            _ => false,
        }
    }

    /// Players who have not finished their turn this round.
    pub fn remaining_players(&self) -> impl Iterator<Item = &Player> {
        self.players()
            .iter()
            .filter(|p| p.round_state != RoundState::Completed)
    }

    pub fn game_status(&self) -> &GameStatus {
        &self.game_status
    }

    pub fn status(&self) -> &StatusBanner {
        &self.status
    }

    /// The local player may press "start": host, in the lobby, enough players.
    pub fn can_start_game(&self) -> bool {
        self.is_host()
            && !matches!(self.game_status, GameStatus::InProgress)
            && self.players().len() >= MIN_PLAYERS_TO_START
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
    use crate::protocol::RoomMeta;

    fn player(id: &str, is_host: bool, round_state: RoundState) -> Player {
        Player {
            id: PlayerId::from(id),
            display_name: id.to_uppercase(),
            avatar_id: None,
            is_host,
            round_state,
        }
    }

    fn joined(id: &str) -> TruthOrTrickEvent {
        TruthOrTrickEvent::RoomJoined {
            room_id: "room".into(),
            session_id: PlayerId::from(id),
            reconnection_token: Some("token".into()),
        }
    }

    fn room(players: Vec<Player>, host: Option<&str>) -> TruthOrTrickEvent {
        TruthOrTrickEvent::RoomUpdated(RoomState {
            players,
            host_id: host.map(PlayerId::from),
            meta: RoomMeta::default(),
        })
    }

    #[test]
    fn room_update_replaces_wholesale() {
        let mut store = RoomStore::new();
        store.apply(&room(
            vec![
                player("a", true, RoundState::NotStarted),
                player("b", false, RoundState::NotStarted),
            ],
            Some("a"),
        ));
        assert_eq!(store.players().len(), 2);

        store.apply(&room(vec![player("c", true, RoundState::NotStarted)], Some("c")));
        assert_eq!(store.players().len(), 1);
        assert!(store.player(&PlayerId::from("a")).is_none());
        assert_eq!(store.host().unwrap().id, PlayerId::from("c"));
    }

    #[test]
    fn identifies_local_host() {
        let mut store = RoomStore::new();
        store.apply(&joined("a"));
        store.apply(&room(
            vec![
                player("a", false, RoundState::NotStarted),
                player("b", false, RoundState::NotStarted),
            ],
            Some("a"),
        ));
        assert_eq!(store.me().unwrap().display_name, "A");
        assert!(store.is_host());
        assert!(store.can_start_game());

        store.apply(&TruthOrTrickEvent::GameStarted);
        assert!(!store.can_start_game());
    }

    #[test]
    fn host_falls_back_to_flag() {
        let mut store = RoomStore::new();
        store.apply(&room(
            vec![
                player("a", false, RoundState::NotStarted),
                player("b", true, RoundState::NotStarted),
            ],
            None,
        ));
        assert_eq!(store.host().unwrap().id, PlayerId::from("b"));
    }

    #[test]
    fn lone_host_cannot_start() {
        let mut store = RoomStore::new();
        store.apply(&joined("a"));
        store.apply(&room(vec![player("a", true, RoundState::NotStarted)], None));
        assert!(store.is_host());
        assert!(!store.can_start_game());
    }

    #[test]
    fn remaining_players_skip_completed() {
        let mut store = RoomStore::new();
        store.apply(&room(
            vec![
                player("a", true, RoundState::Completed),
                player("b", false, RoundState::InProgress),
                player("c", false, RoundState::NotStarted),
            ],
            None,
        ));
        let remaining: Vec<_> = store.remaining_players().map(|p| p.id.as_str()).collect();
        assert_eq!(remaining, vec!["b", "c"]);
    }

    #[test]
    fn status_banner_tracks_connection_and_bad_payloads() {
        let mut store = RoomStore::new();
        store.apply(&TruthOrTrickEvent::Connected);
        assert_eq!(*store.status(), StatusBanner::Waiting);
        store.apply(&joined("a"));
        assert_eq!(*store.status(), StatusBanner::Connected);

        assert!(store.apply(&TruthOrTrickEvent::UnexpectedPayload {
            reason: "missing field".into()
        }));
        assert_eq!(store.status().to_string(), "Received an unexpected payload");

        store.apply(&room(vec![], None));
        assert_eq!(*store.status(), StatusBanner::Connected);

        store.apply(&TruthOrTrickEvent::Disconnected { reason: None });
        assert_eq!(store.status().to_string(), "Disconnected");
    }

    #[test]
    fn game_lifecycle_and_leave() {
        let mut store = RoomStore::new();
        store.apply(&joined("a"));
        store.apply(&TruthOrTrickEvent::GameStarted);
        assert_eq!(*store.game_status(), GameStatus::InProgress);
        store.apply(&TruthOrTrickEvent::GameEnded {
            reason: Some("everyone played".into()),
        });
        assert!(matches!(store.game_status(), GameStatus::Ended { .. }));

        store.apply(&TruthOrTrickEvent::RoomLeft);
        assert_eq!(*store.game_status(), GameStatus::Lobby);
        assert!(store.room_id().is_none());
        assert!(store.reconnection_token().is_none());
        assert_eq!(store.session_id(), Some(&PlayerId::from("a")));
    }

    #[test]
    fn turn_events_do_not_touch_store() {
        let mut store = RoomStore::new();
        assert!(!store.apply(&TruthOrTrickEvent::PickPrompt));
        assert!(!store.apply(&TruthOrTrickEvent::TurnEnded));
    }
}
