//! View models for the game screens.
//!
//! Each view is built from the [`RoomStore`] and the sequencer's [`TurnView`]
//! and renders itself as text through `Display`. Views only format what the
//! store and the sequencer already decided.

use std::fmt;

use crate::protocol::{Player, PromptKind, RoundState};
use crate::sequencer::{PromptContent, TurnPhase, TurnView};
use crate::store::{GameStatus, RoomStore};

/// One row of a player list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRow {
    pub display_name: String,
    pub is_host: bool,
    pub is_me: bool,
    pub done_this_round: bool,
}

impl PlayerRow {
    fn new(player: &Player, store: &RoomStore) -> Self {
        let host_id = store.host().map(|h| &h.id);
        Self {
            display_name: player.display_name.clone(),
            is_host: host_id == Some(&player.id),
            is_me: store.session_id() == Some(&player.id),
            done_this_round: player.round_state == RoundState::Completed,
        }
    }
}

impl fmt::Display for PlayerRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)?;
        if self.is_host {
            f.write_str(" (host)")?;
        }
        if self.is_me {
            f.write_str(" (you)")?;
        }
        Ok(())
    }
}

fn rows(store: &RoomStore) -> Vec<PlayerRow> {
    store
        .players()
        .iter()
        .map(|p| PlayerRow::new(p, store))
        .collect()
}

/// Waiting room: who is here and whether the game can start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyView {
    pub room_code: Option<String>,
    pub players: Vec<PlayerRow>,
    pub status: String,
    pub can_start: bool,
}

impl LobbyView {
    pub fn new(store: &RoomStore) -> Self {
        Self {
            room_code: store.room().and_then(|r| r.meta.room_code.clone()),
            players: rows(store),
            status: store.status().to_string(),
            can_start: store.can_start_game(),
        }
    }
}

impl fmt::Display for LobbyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.room_code {
            Some(code) => writeln!(f, "Room {code}")?,
            None => writeln!(f, "Lobby")?,
        }
        writeln!(f, "[{}]", self.status)?;
        for row in &self.players {
            writeln!(f, "  {row}")?;
        }
        if self.can_start {
            writeln!(f, "Ready to start")?;
        } else {
            writeln!(f, "Waiting for the host")?;
        }
        Ok(())
    }
}

fn status_line(status: &GameStatus) -> String {
    match status {
        GameStatus::Lobby => "In the lobby".to_string(),
        GameStatus::InProgress => "Game in progress".to_string(),
        GameStatus::Ended { reason: Some(reason) } => format!("Game over: {reason}"),
        GameStatus::Ended { reason: None } => "Game over".to_string(),
    }
}

/// The host's screen: roster, round progress and the start control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDashboard {
    pub round: u32,
    pub game: String,
    pub players: Vec<PlayerRow>,
    pub remaining: usize,
    pub can_start: bool,
    pub can_play_again: bool,
}

impl HostDashboard {
    pub fn new(store: &RoomStore) -> Self {
        Self {
            round: store.room().map_or(0, |r| r.meta.round),
            game: status_line(store.game_status()),
            players: rows(store),
            remaining: store.remaining_players().count(),
            can_start: store.can_start_game(),
            can_play_again: matches!(store.game_status(), GameStatus::Ended { .. }),
        }
    }
}

impl fmt::Display for HostDashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (round {})", self.game, self.round)?;
        for row in &self.players {
            let mark = if row.done_this_round { "x" } else { " " };
            writeln!(f, "  [{mark}] {row}")?;
        }
        writeln!(f, "{} still to play", self.remaining)?;
        if self.can_start {
            writeln!(f, "> start game")?;
        }
        if self.can_play_again {
            writeln!(f, "> play again")?;
        }
        Ok(())
    }
}

/// A non-host player's screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerDashboard {
    pub me: Option<String>,
    pub host: Option<String>,
    pub game: String,
    pub my_turn: bool,
}

impl PlayerDashboard {
    pub fn new(store: &RoomStore, turn: &TurnView) -> Self {
        Self {
            me: store.me().map(|p| p.display_name.clone()),
            host: store.host().map(|p| p.display_name.clone()),
            game: status_line(store.game_status()),
            my_turn: turn.is_local_turn,
        }
    }
}

impl fmt::Display for PlayerDashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.me.as_deref().unwrap_or("Joining…"))?;
        if let Some(host) = &self.host {
            writeln!(f, "Host: {host}")?;
        }
        writeln!(f, "{}", self.game)?;
        if self.my_turn {
            writeln!(f, "It's your turn!")?;
        }
        Ok(())
    }
}

/// The selection wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelView {
    /// Names on the wheel, in roster order.
    pub segments: Vec<String>,
    pub spinning: bool,
    /// Where the wheel stopped, once revealed.
    pub landed_on: Option<String>,
    pub remaining_count: u32,
    pub total_players: u32,
}

impl WheelView {
    pub fn new(store: &RoomStore, turn: &TurnView) -> Self {
        let spinning = turn.phase == TurnPhase::Spinning;
        let landed_on = match turn.phase {
            TurnPhase::Idle | TurnPhase::Spinning => None,
            TurnPhase::Revealed | TurnPhase::PromptPending | TurnPhase::PromptAnswered => turn
                .announcement
                .as_ref()
                .map(|a| a.player.display_name.clone()),
        };
        let (remaining_count, total_players) = turn
            .announcement
            .as_ref()
            .map_or((0, 0), |a| (a.remaining_count, a.total_players));
        Self {
            segments: store
                .players()
                .iter()
                .map(|p| p.display_name.clone())
                .collect(),
            spinning,
            landed_on,
            remaining_count,
            total_players,
        }
    }
}

impl fmt::Display for WheelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.segments.join(" | "))?;
        if self.spinning {
            write!(f, " spinning…")?;
        } else if let Some(name) = &self.landed_on {
            write!(f, " -> {name}")?;
        }
        if self.total_players > 0 {
            write!(f, " [{}/{} left]", self.remaining_count, self.total_players)?;
        }
        Ok(())
    }
}

/// "It's X's turn!" overlay, present only while the popup is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerPopupView {
    pub display_name: String,
    pub is_me: bool,
}

impl WinnerPopupView {
    pub fn new(turn: &TurnView) -> Option<Self> {
        let player = turn.popup.as_ref()?;
        Some(Self {
            display_name: player.display_name.clone(),
            is_me: turn.is_local_turn,
        })
    }
}

impl fmt::Display for WinnerPopupView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_me {
            write!(f, "It's your turn, {}!", self.display_name)
        } else {
            write!(f, "It's {}'s turn!", self.display_name)
        }
    }
}

/// What the prompt card currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFace {
    /// The selected player is shown; no chooser yet.
    Selected,
    /// Truth/trick buttons. Only the selected player can press them.
    Choosing {
        truth: Option<String>,
        trick: Option<String>,
        can_choose: bool,
    },
    /// Chosen, waiting for the server.
    Pending { kind: PromptKind },
    /// The prompt to act on, confirmed or placeholder.
    Revealed { kind: PromptKind, text: String },
}

/// The card area under the wheel, for the selected player's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptCardView {
    pub player: String,
    pub face: CardFace,
    pub can_finish: bool,
}

impl PromptCardView {
    /// `None` between turns and while the wheel is still spinning.
    pub fn new(turn: &TurnView) -> Option<Self> {
        let announcement = turn.announcement.as_ref()?;
        let face = match (turn.phase, &turn.choice) {
            (TurnPhase::Idle | TurnPhase::Spinning, _) => return None,
            (_, Some(choice)) => match &choice.content {
                PromptContent::Pending => CardFace::Pending { kind: choice.kind },
                PromptContent::Confirmed(text) | PromptContent::Placeholder(text) => {
                    CardFace::Revealed {
                        kind: choice.kind,
                        text: text.clone(),
                    }
                }
            },
            (TurnPhase::PromptPending, None) => {
                let options = announcement.prompt_options.as_ref();
                CardFace::Choosing {
                    truth: options.map(|o| o.truth.clone()),
                    trick: options.map(|o| o.trick.clone()),
                    can_choose: turn.is_local_turn,
                }
            }
            (TurnPhase::Revealed | TurnPhase::PromptAnswered, None) => CardFace::Selected,
        };
        let can_finish = turn.is_local_turn && matches!(face, CardFace::Revealed { .. });
        Some(Self {
            player: announcement.player.display_name.clone(),
            face,
            can_finish,
        })
    }
}

impl fmt::Display for PromptCardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.player)?;
        match &self.face {
            CardFace::Selected => writeln!(f, "…")?,
            CardFace::Choosing {
                truth,
                trick,
                can_choose,
            } => {
                if *can_choose {
                    writeln!(f, "[truth] {}", truth.as_deref().unwrap_or(""))?;
                    writeln!(f, "[trick] {}", trick.as_deref().unwrap_or(""))?;
                } else {
                    writeln!(f, "Choosing truth or trick…")?;
                }
            }
            CardFace::Pending { kind } => writeln!(f, "{kind}, pending")?,
            CardFace::Revealed { kind, text } => writeln!(f, "{kind}: {text}")?,
        }
        if self.can_finish {
            writeln!(f, "> finish turn")?;
        }
        Ok(())
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
    use crate::event::TruthOrTrickEvent;
    use crate::protocol::{Announcement, PlayerId, PromptOptions, RoomMeta, RoomState};
    use crate::sequencer::{PromptChoice, TurnSequencer};
    use std::time::Duration;
    use tokio::time::Instant;

    fn player(id: &str, name: &str) -> Player {
        Player {
            id: PlayerId::from(id),
            display_name: name.into(),
            avatar_id: None,
            is_host: false,
            round_state: RoundState::NotStarted,
        }
    }

    fn store(me: &str) -> RoomStore {
        let mut store = RoomStore::new();
        store.apply(&TruthOrTrickEvent::RoomJoined {
            room_id: "room".into(),
            session_id: PlayerId::from(me),
            reconnection_token: None,
        });
        store.apply(&TruthOrTrickEvent::RoomUpdated(RoomState {
            players: vec![player("p1", "Ada"), player("p2", "Bob")],
            host_id: Some(PlayerId::from("p1")),
            meta: RoomMeta {
                room_code: Some("ABCD".into()),
                round: 1,
            },
        }));
        store
    }

    fn announcement() -> Announcement {
        Announcement {
            player: player("p1", "Ada"),
            remaining_count: 1,
            total_players: 2,
            exhausted: false,
            prompt_options: Some(PromptOptions {
                truth: "Worst haircut?".into(),
                trick: "Do a handstand".into(),
            }),
        }
    }

    #[test]
    fn lobby_marks_host_and_self() {
        let lobby = LobbyView::new(&store("p2"));
        let text = lobby.to_string();
        assert!(text.starts_with("Room ABCD"));
        assert!(text.contains("Ada (host)"));
        assert!(text.contains("Bob (you)"));
        assert!(!lobby.can_start);
        assert!(LobbyView::new(&store("p1")).can_start);
    }

    #[test]
    fn host_dashboard_offers_start() {
        let dashboard = HostDashboard::new(&store("p1"));
        assert_eq!(dashboard.remaining, 2);
        assert!(dashboard.to_string().contains("> start game"));
    }

    #[test]
    fn wheel_hides_winner_until_revealed() {
        let store = store("p2");
        let mut seq = TurnSequencer::default();
        let t0 = Instant::now();
        seq.on_player_selected(announcement(), t0);

        let wheel = WheelView::new(&store, &seq.view());
        assert!(wheel.spinning);
        assert!(wheel.landed_on.is_none());
        assert!(PromptCardView::new(&seq.view()).is_none());

        seq.poll(t0 + Duration::from_secs(7));
        let wheel = WheelView::new(&store, &seq.view());
        assert_eq!(wheel.to_string(), "(Ada | Bob) -> Ada [1/2 left]");
        let popup = WinnerPopupView::new(&seq.view()).unwrap();
        assert_eq!(popup.to_string(), "It's Ada's turn!");
    }

    #[test]
    fn card_walks_through_choice() {
        let mut seq = TurnSequencer::default();
        seq.set_local_player(Some(PlayerId::from("p1")));
        let t0 = Instant::now();
        seq.on_player_selected(announcement(), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + Duration::from_secs(7));

        let card = PromptCardView::new(&seq.view()).unwrap();
        assert!(matches!(card.face, CardFace::Choosing { can_choose: true, .. }));
        assert!(card.to_string().contains("[truth] Worst haircut?"));

        seq.choose(PromptKind::Truth, t0 + Duration::from_secs(8))
            .unwrap();
        let card = PromptCardView::new(&seq.view()).unwrap();
        assert_eq!(card.face, CardFace::Pending { kind: PromptKind::Truth });
        assert!(card.to_string().contains("truth, pending"));

        seq.on_prompt_selected(PromptKind::Truth, "Worst haircut?".into());
        let card = PromptCardView::new(&seq.view()).unwrap();
        assert!(card.can_finish);
        assert!(card.to_string().contains("truth: Worst haircut?"));
    }

    #[test]
    fn spectator_card_has_no_buttons() {
        let turn = TurnView {
            turn: 1,
            phase: TurnPhase::PromptPending,
            announcement: Some(announcement()),
            popup: None,
            chooser_visible: true,
            choice: None,
            is_local_turn: false,
        };
        let card = PromptCardView::new(&turn).unwrap();
        assert_eq!(card.to_string(), "Ada\nChoosing truth or trick…\n");

        let answered = TurnView {
            phase: TurnPhase::PromptAnswered,
            choice: Some(PromptChoice {
                kind: PromptKind::Trick,
                content: PromptContent::Confirmed("Do a handstand".into()),
            }),
            ..turn
        };
        let card = PromptCardView::new(&answered).unwrap();
        assert!(!card.can_finish);
        assert!(card.to_string().contains("trick: Do a handstand"));
    }

    #[test]
    fn player_dashboard_flags_own_turn() {
        let store = store("p1");
        let turn = TurnView {
            is_local_turn: true,
            ..TurnView::default()
        };
        let text = PlayerDashboard::new(&store, &turn).to_string();
        assert!(text.contains("Host: Ada"));
        assert!(text.contains("It's your turn!"));
    }
}
