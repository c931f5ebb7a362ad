//! Turn announcement sequencer.
//!
//! The server only announces outcomes ("this player was selected", "show the
//! chooser", "here is the prompt", "turn over"); the pacing of what the table
//! sees is decided here. [`TurnSequencer`] is a pure state machine: every
//! operation takes the current [`Instant`] and returns the
//! [`SequencerUpdate`]s it produced. Timers are deadlines kept inside the
//! sequencer. The owner sleeps until [`TurnSequencer::next_deadline`] and
//! then calls [`TurnSequencer::poll`]; nothing is spawned, so a cancelled
//! timer can never fire later.
//!
//! ```text
//! Idle ──selected──▶ Spinning ──spin elapsed──▶ Revealed ──pick-prompt──▶ PromptPending
//!   ▲                                                                         │ choose
//!   └──────────────── end-turn (from any phase) ◀── PromptAnswered ◀──────────┘
//! ```

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, TruthOrTrickError};
use crate::protocol::{Announcement, Player, PlayerId, PromptKind};

const DEFAULT_SPIN_DURATION: Duration = Duration::from_secs(7);

const DEFAULT_POPUP_DURATION: Duration = Duration::from_secs(3);

const DEFAULT_PROMPT_FALLBACK: Duration = Duration::from_secs(5);

const DEFAULT_PLACEHOLDER_TEXT: &str = "The prompt is on its way. Make something up!";

/// Timing for one turn's presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    /// How long the wheel spins before the winner is revealed. Defaults to 7s.
    pub spin_duration: Duration,
    /// How long the winner popup stays up. Defaults to 3s.
    pub popup_duration: Duration,
    /// How long a local choice waits for server confirmation before a
    /// placeholder is shown. Defaults to 5s.
    pub prompt_fallback: Duration,
    /// Text shown when the confirmation never arrives.
    pub placeholder_text: String,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            spin_duration: DEFAULT_SPIN_DURATION,
            popup_duration: DEFAULT_POPUP_DURATION,
            prompt_fallback: DEFAULT_PROMPT_FALLBACK,
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
        }
    }
}

impl SequencerConfig {
    #[must_use]
    pub fn with_spin_duration(mut self, duration: Duration) -> Self {
        self.spin_duration = duration;
        self
    }

    #[must_use]
    pub fn with_popup_duration(mut self, duration: Duration) -> Self {
        self.popup_duration = duration;
        self
    }

    #[must_use]
    pub fn with_prompt_fallback(mut self, duration: Duration) -> Self {
        self.prompt_fallback = duration;
        self
    }

    #[must_use]
    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }
}

// ── State ───────────────────────────────────────────────────────────

/// Presentation phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    /// The wheel is spinning towards the selected player.
    Spinning,
    /// The wheel stopped; the selected player is shown.
    Revealed,
    /// The truth/trick chooser is up.
    PromptPending,
    /// A prompt was picked (locally echoed or server-confirmed).
    PromptAnswered,
}

/// What is currently known about the turn's prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptContent {
    /// Chosen locally, waiting for the server.
    Pending,
    /// Text confirmed by the server.
    Confirmed(String),
    /// Synthesized after the confirmation window elapsed.
    Placeholder(String),
}

impl PromptContent {
    /// The text to display, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Confirmed(text) | Self::Placeholder(text) => Some(text),
        }
    }
}

/// The prompt picked for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptChoice {
    pub kind: PromptKind,
    pub content: PromptContent,
}

/// Something the views should react to.
///
/// `turn` is the sequencer's local turn counter, so consumers can tell
/// updates of consecutive turns apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerUpdate {
    SpinStarted { turn: u64, player: Player },
    WinnerPopupShown { turn: u64, player: Player },
    WinnerPopupHidden { turn: u64 },
    PromptChooserShown { turn: u64, announcement: Announcement },
    PromptEchoed { turn: u64, kind: PromptKind },
    PromptRevealed { turn: u64, choice: PromptChoice },
    TurnReset { turn: u64 },
}

/// Read-only snapshot of the sequencer for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnView {
    pub turn: u64,
    pub phase: TurnPhase,
    pub announcement: Option<Announcement>,
    /// Player shown in the winner popup, while it is up.
    pub popup: Option<Player>,
    pub chooser_visible: bool,
    pub choice: Option<PromptChoice>,
    /// The local player is the one who picks this turn.
    pub is_local_turn: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    SpinComplete,
    PopupDismiss,
    PromptFallback,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    kind: TimerKind,
    deadline: Instant,
}

/// Pending deadlines of the current turn.
#[derive(Debug, Default)]
struct Timers {
    pending: Vec<Timer>,
}

impl Timers {
    fn schedule(&mut self, kind: TimerKind, deadline: Instant) {
        self.cancel(kind);
        self.pending.push(Timer { kind, deadline });
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.pending.retain(|t| t.kind != kind);
    }

    fn cancel_all(&mut self) {
        self.pending.clear();
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|t| t.deadline).min()
    }

    /// Remove and return the earliest timer due at `now`.
    fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        let (idx, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| t.deadline)?;
        Some(self.pending.swap_remove(idx))
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

// ── Sequencer ───────────────────────────────────────────────────────

/// Client-local state machine choreographing one turn at a time.
#[derive(Debug)]
pub struct TurnSequencer {
    config: SequencerConfig,
    local_player: Option<PlayerId>,
    turn: u64,
    phase: TurnPhase,
    announcement: Option<Announcement>,
    /// Pick-prompt received for the current (or, while Idle, the next) turn.
    prompt_requested: bool,
    chooser_shown: bool,
    /// Pick-prompt received after this turn's chooser was shown. Belongs to
    /// the next selection if the end of this turn never arrives.
    next_prompt_requested: bool,
    popup: Option<Player>,
    /// Idempotency guard: the player whose winner popup was already shown this turn.
    popup_shown_for: Option<PlayerId>,
    choice: Option<PromptChoice>,
    timers: Timers,
}

impl TurnSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            local_player: None,
            turn: 0,
            phase: TurnPhase::Idle,
            announcement: None,
            prompt_requested: false,
            chooser_shown: false,
            next_prompt_requested: false,
            popup: None,
            popup_shown_for: None,
            choice: None,
            timers: Timers::default(),
        }
    }

    /// Record who "we" are, so [`choose`](Self::choose) can refuse answers
    /// during other players' turns. Unknown local player means no check.
    pub fn set_local_player(&mut self, player: Option<PlayerId>) {
        self.local_player = player;
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn announcement(&self) -> Option<&Announcement> {
        self.announcement.as_ref()
    }

    pub fn choice(&self) -> Option<&PromptChoice> {
        self.choice.as_ref()
    }

    /// Number of timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Earliest pending deadline; `None` when nothing is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn is_local_turn(&self) -> bool {
        match (&self.local_player, &self.announcement) {
            (Some(me), Some(announcement)) => announcement.player.id == *me,
            _ => false,
        }
    }

    pub fn view(&self) -> TurnView {
        TurnView {
            turn: self.turn,
            phase: self.phase,
            announcement: self.announcement.clone(),
            popup: self.popup.clone(),
            chooser_visible: self.chooser_shown && self.phase == TurnPhase::PromptPending,
            choice: self.choice.clone(),
            is_local_turn: self.is_local_turn(),
        }
    }

    // ── Inputs ──────────────────────────────────────────────────────

    /// A player was selected.
    ///
    /// A new player id (or any selection while Idle) begins a new turn and
    /// cancels everything left over from the previous one. The same id again
    /// is a redelivery: its data replaces the stored announcement, nothing
    /// restarts.
    pub fn on_player_selected(
        &mut self,
        announcement: Announcement,
        now: Instant,
    ) -> Vec<SequencerUpdate> {
        let redelivery = self.phase != TurnPhase::Idle
            && self
                .announcement
                .as_ref()
                .is_some_and(|current| current.player.id == announcement.player.id);
        if redelivery {
            debug!(turn = self.turn, player = %announcement.player.id, "selection redelivered");
            self.announcement = Some(announcement);
            return Vec::new();
        }

        let mut updates = Vec::new();
        if self.phase != TurnPhase::Idle {
            debug!(turn = self.turn, "new selection interrupts unfinished turn");
            let carried =
                (self.prompt_requested && !self.chooser_shown) || self.next_prompt_requested;
            self.clear_turn();
            // A pick-prompt the old turn never got to use belongs to the new one.
            self.prompt_requested = carried;
        }

        self.turn += 1;
        self.phase = TurnPhase::Spinning;
        let player = announcement.player.clone();
        self.announcement = Some(announcement);
        self.timers
            .schedule(TimerKind::SpinComplete, now + self.config.spin_duration);
        debug!(turn = self.turn, player = %player.id, "spin started");
        updates.push(SequencerUpdate::SpinStarted {
            turn: self.turn,
            player,
        });
        updates
    }

    /// The server allowed the prompt chooser for this turn.
    ///
    /// May arrive before the selection; it is held until the wheel has
    /// revealed the selected player.
    pub fn on_pick_prompt(&mut self) -> Vec<SequencerUpdate> {
        if self.chooser_shown {
            debug!(turn = self.turn, "pick-prompt after chooser, held for the next selection");
            self.next_prompt_requested = true;
            return Vec::new();
        }
        self.prompt_requested = true;
        self.try_show_chooser().into_iter().collect()
    }

    /// The local player picked a prompt. Shows an optimistic echo and starts
    /// the confirmation fallback timer.
    ///
    /// # Errors
    ///
    /// [`TruthOrTrickError::InvalidPhase`] unless the chooser is up, and
    /// [`TruthOrTrickError::NotYourTurn`] if the local player is known and is
    /// not the selected one.
    pub fn choose(&mut self, kind: PromptKind, now: Instant) -> Result<Vec<SequencerUpdate>> {
        if self.phase != TurnPhase::PromptPending {
            return Err(TruthOrTrickError::InvalidPhase {
                expected: TurnPhase::PromptPending,
                actual: self.phase,
            });
        }
        if self.local_player.is_some() && !self.is_local_turn() {
            return Err(TruthOrTrickError::NotYourTurn);
        }

        self.phase = TurnPhase::PromptAnswered;
        self.choice = Some(PromptChoice {
            kind,
            content: PromptContent::Pending,
        });
        self.timers
            .schedule(TimerKind::PromptFallback, now + self.config.prompt_fallback);
        debug!(turn = self.turn, %kind, "prompt chosen locally");
        Ok(vec![SequencerUpdate::PromptEchoed {
            turn: self.turn,
            kind,
        }])
    }

    /// The text for the chosen prompt of the local turn, when the
    /// announcement carried the options.
    pub fn option_text(&self, kind: PromptKind) -> Option<String> {
        self.announcement
            .as_ref()?
            .prompt_options
            .as_ref()
            .map(|options| options.get(kind).to_string())
    }

    /// The server confirmed this turn's prompt.
    ///
    /// Replaces a local echo or a placeholder. Spectators reach
    /// `PromptAnswered` this way without choosing.
    pub fn on_prompt_selected(&mut self, kind: PromptKind, content: String) -> Vec<SequencerUpdate> {
        if self.phase == TurnPhase::Idle {
            warn!("prompt confirmation outside of a turn ignored");
            return Vec::new();
        }
        self.timers.cancel(TimerKind::PromptFallback);
        let choice = PromptChoice {
            kind,
            content: PromptContent::Confirmed(content),
        };
        if self.choice.as_ref() == Some(&choice) {
            return Vec::new();
        }
        self.choice = Some(choice.clone());
        if self.phase != TurnPhase::Spinning {
            self.phase = TurnPhase::PromptAnswered;
        }
        debug!(turn = self.turn, %kind, "prompt confirmed");
        vec![SequencerUpdate::PromptRevealed {
            turn: self.turn,
            choice,
        }]
    }

    /// End of turn. Returns to Idle from any phase.
    pub fn end_turn(&mut self) -> Vec<SequencerUpdate> {
        debug!(turn = self.turn, phase = ?self.phase, "turn reset");
        self.clear_turn();
        vec![SequencerUpdate::TurnReset { turn: self.turn }]
    }

    /// Back to Idle without emitting anything, dropping any buffered
    /// pick-prompt. Used when a game starts or ends between turns.
    pub fn reset_idle(&mut self) {
        debug!(turn = self.turn, "sequencer reset between turns");
        self.clear_turn();
    }

    /// Drop every pending timer.
    pub fn cancel_all(&mut self) {
        self.timers.cancel_all();
    }

    /// Fire every timer due at `now`, earliest first.
    ///
    /// Follow-up timers are scheduled from the deadline that fired, not from
    /// `now`, so a late poll does not stretch the turn.
    pub fn poll(&mut self, now: Instant) -> Vec<SequencerUpdate> {
        let mut updates = Vec::new();
        while let Some(timer) = self.timers.pop_due(now) {
            match timer.kind {
                TimerKind::SpinComplete => self.on_spin_complete(timer.deadline, &mut updates),
                TimerKind::PopupDismiss => {
                    if self.popup.take().is_some() {
                        updates.push(SequencerUpdate::WinnerPopupHidden { turn: self.turn });
                    }
                }
                TimerKind::PromptFallback => self.on_prompt_fallback(&mut updates),
            }
        }
        updates
    }

    // ── Internals ───────────────────────────────────────────────────

    fn on_spin_complete(&mut self, fired_at: Instant, updates: &mut Vec<SequencerUpdate>) {
        if self.phase == TurnPhase::Spinning {
            // the confirmation may have beaten the wheel
            self.phase = if self.choice.is_some() {
                TurnPhase::PromptAnswered
            } else {
                TurnPhase::Revealed
            };
        }
        let Some(player) = self.announcement.as_ref().map(|a| a.player.clone()) else {
            return;
        };
        if self.popup_shown_for.as_ref() != Some(&player.id) {
            self.popup_shown_for = Some(player.id.clone());
            self.popup = Some(player.clone());
            self.timers
                .schedule(TimerKind::PopupDismiss, fired_at + self.config.popup_duration);
            updates.push(SequencerUpdate::WinnerPopupShown {
                turn: self.turn,
                player,
            });
        }
        updates.extend(self.try_show_chooser());
    }

    fn on_prompt_fallback(&mut self, updates: &mut Vec<SequencerUpdate>) {
        let Some(choice) = self.choice.as_mut() else {
            return;
        };
        if choice.content != PromptContent::Pending {
            return;
        }
        warn!(turn = self.turn, "no prompt confirmation received, showing placeholder");
        choice.content = PromptContent::Placeholder(self.config.placeholder_text.clone());
        updates.push(SequencerUpdate::PromptRevealed {
            turn: self.turn,
            choice: choice.clone(),
        });
    }

    /// Render the chooser once both the selection and the pick-prompt
    /// signal are in and the wheel has stopped.
    fn try_show_chooser(&mut self) -> Option<SequencerUpdate> {
        if self.chooser_shown || !self.prompt_requested || self.phase != TurnPhase::Revealed {
            return None;
        }
        let announcement = self.announcement.clone()?;
        self.chooser_shown = true;
        self.phase = TurnPhase::PromptPending;
        debug!(turn = self.turn, "prompt chooser shown");
        Some(SequencerUpdate::PromptChooserShown {
            turn: self.turn,
            announcement,
        })
    }

    fn clear_turn(&mut self) {
        self.timers.cancel_all();
        self.phase = TurnPhase::Idle;
        self.announcement = None;
        self.prompt_requested = false;
        self.chooser_shown = false;
        self.next_prompt_requested = false;
        self.popup = None;
        self.popup_shown_for = None;
        self.choice = None;
    }
}

impl Default for TurnSequencer {
    fn default() -> Self {
        Self::new(SequencerConfig::default())
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
    use crate::protocol::{PromptOptions, RoundState};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn announcement(id: &str) -> Announcement {
        Announcement {
            player: Player {
                id: PlayerId::from(id),
                display_name: format!("player {id}"),
                avatar_id: None,
                is_host: false,
                round_state: RoundState::InProgress,
            },
            remaining_count: 2,
            total_players: 4,
            exhausted: false,
            prompt_options: Some(PromptOptions {
                truth: "Biggest fear?".into(),
                trick: "Do ten push-ups".into(),
            }),
        }
    }

    fn count_choosers(updates: &[SequencerUpdate]) -> usize {
        updates
            .iter()
            .filter(|u| matches!(u, SequencerUpdate::PromptChooserShown { .. }))
            .count()
    }

    fn count_popups(updates: &[SequencerUpdate]) -> usize {
        updates
            .iter()
            .filter(|u| matches!(u, SequencerUpdate::WinnerPopupShown { .. }))
            .count()
    }

    #[test]
    fn selection_spins_then_reveals_with_popup() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        let updates = seq.on_player_selected(announcement("p1"), t0);
        assert!(matches!(updates[..], [SequencerUpdate::SpinStarted { turn: 1, .. }]));
        assert_eq!(seq.phase(), TurnPhase::Spinning);
        assert_eq!(seq.next_deadline(), Some(t0 + secs(7)));

        assert!(seq.poll(t0 + secs(6)).is_empty());

        let updates = seq.poll(t0 + secs(7));
        assert_eq!(count_popups(&updates), 1);
        assert_eq!(seq.phase(), TurnPhase::Revealed);
        assert!(seq.view().popup.is_some());

        let updates = seq.poll(t0 + secs(10));
        assert_eq!(updates, vec![SequencerUpdate::WinnerPopupHidden { turn: 1 }]);
        let view = seq.view();
        assert!(view.popup.is_none());
        assert_eq!(
            view.announcement.unwrap().player.id,
            PlayerId::from("p1"),
            "card area keeps the selected player"
        );
    }

    #[test]
    fn pick_prompt_before_selection_renders_chooser_once_on_reveal() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        assert!(seq.on_pick_prompt().is_empty());
        let mut all = seq.on_player_selected(announcement("p1"), t0);
        all.extend(seq.poll(t0 + secs(7)));
        all.extend(seq.on_pick_prompt());
        all.extend(seq.poll(t0 + secs(20)));

        assert_eq!(count_choosers(&all), 1);
        assert_eq!(seq.phase(), TurnPhase::PromptPending);
    }

    #[test]
    fn pick_prompt_after_reveal_renders_chooser_once() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        let mut all = seq.on_player_selected(announcement("p1"), t0);
        all.extend(seq.poll(t0 + secs(8)));
        assert_eq!(count_choosers(&all), 0);
        all.extend(seq.on_pick_prompt());
        all.extend(seq.on_pick_prompt());

        assert_eq!(count_choosers(&all), 1);
    }

    #[test]
    fn pick_prompt_for_next_turn_survives_lost_end_turn() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        assert_eq!(count_choosers(&seq.poll(t0 + secs(7))), 1);

        // end-turn lost; next turn's pick-prompt beats its selection
        assert!(seq.on_pick_prompt().is_empty());
        let t1 = t0 + secs(8);
        let updates = seq.on_player_selected(announcement("p2"), t1);
        assert!(matches!(updates[..], [SequencerUpdate::SpinStarted { turn: 2, .. }]));

        let updates = seq.poll(t1 + secs(60));
        assert_eq!(count_choosers(&updates), 1);
        assert_eq!(seq.turn(), 2);
        assert_eq!(seq.phase(), TurnPhase::PromptPending);
    }

    #[test]
    fn repeated_pick_prompt_is_dropped_at_end_turn() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + secs(7));
        seq.on_pick_prompt();
        seq.end_turn();

        seq.on_player_selected(announcement("p2"), t0 + secs(20));
        assert_eq!(count_choosers(&seq.poll(t0 + secs(90))), 0);
        assert_eq!(seq.phase(), TurnPhase::Revealed);
    }

    #[test]
    fn reset_idle_drops_buffered_pick_prompt_silently() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        assert!(seq.on_pick_prompt().is_empty());
        seq.reset_idle();
        assert_eq!(seq.phase(), TurnPhase::Idle);

        seq.on_player_selected(announcement("p1"), t0);
        assert_eq!(count_choosers(&seq.poll(t0 + secs(60))), 0);
        assert_eq!(seq.phase(), TurnPhase::Revealed);
    }

    #[test]
    fn chooser_uses_most_recent_announcement() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        seq.on_player_selected(announcement("p1"), t0);
        let mut newer = announcement("p1");
        newer.remaining_count = 1;
        newer.player.display_name = "Renamed".into();
        assert!(seq.on_player_selected(newer.clone(), t0 + secs(1)).is_empty());
        seq.on_pick_prompt();

        let updates = seq.poll(t0 + secs(7));
        let shown = updates
            .iter()
            .find_map(|u| match u {
                SequencerUpdate::PromptChooserShown { announcement, .. } => Some(announcement),
                _ => None,
            })
            .unwrap();
        assert_eq!(*shown, newer);
    }

    #[test]
    fn redelivered_selection_shows_popup_once() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        let mut all = seq.on_player_selected(announcement("p1"), t0);
        all.extend(seq.poll(t0 + secs(7)));
        all.extend(seq.on_player_selected(announcement("p1"), t0 + secs(8)));
        all.extend(seq.poll(t0 + secs(30)));
        all.extend(seq.on_player_selected(announcement("p1"), t0 + secs(31)));
        all.extend(seq.poll(t0 + secs(60)));

        assert_eq!(count_popups(&all), 1);
        assert_eq!(seq.turn(), 1);
    }

    #[test]
    fn new_selection_cancels_previous_turn_timers() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        let updates = seq.on_player_selected(announcement("p2"), t0 + secs(3));
        assert!(matches!(updates[..], [SequencerUpdate::SpinStarted { turn: 2, .. }]));
        assert_eq!(seq.pending_timers(), 1);
        assert_eq!(seq.next_deadline(), Some(t0 + secs(10)));

        // turn 1's spin would have ended at t0+7s
        assert!(seq.poll(t0 + secs(7)).is_empty());

        let updates = seq.poll(t0 + secs(10));
        assert!(updates.iter().all(|u| match u {
            SequencerUpdate::WinnerPopupShown { turn, player } => {
                *turn == 2 && player.id == PlayerId::from("p2")
            }
            SequencerUpdate::PromptChooserShown { turn, .. } => *turn == 2,
            _ => false,
        }));
        // the unused pick-prompt carries into the interrupting turn
        assert_eq!(count_choosers(&updates), 1);
    }

    #[test]
    fn interrupted_turn_drops_pending_fallback() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();

        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + secs(7));
        seq.choose(PromptKind::Truth, t0 + secs(8)).unwrap();

        seq.on_player_selected(announcement("p2"), t0 + secs(9));
        let updates = seq.poll(t0 + secs(14));
        assert!(!updates
            .iter()
            .any(|u| matches!(u, SequencerUpdate::PromptRevealed { .. })));
        assert!(seq.choice().is_none());
    }

    #[test]
    fn choose_echoes_then_confirmation_overwrites() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + secs(7));

        let updates = seq.choose(PromptKind::Truth, t0 + secs(8)).unwrap();
        assert_eq!(
            updates,
            vec![SequencerUpdate::PromptEchoed {
                turn: 1,
                kind: PromptKind::Truth
            }]
        );
        assert_eq!(seq.choice().unwrap().content, PromptContent::Pending);

        let updates = seq.on_prompt_selected(PromptKind::Truth, "X".into());
        assert_eq!(updates.len(), 1);
        assert_eq!(
            seq.choice().unwrap().content,
            PromptContent::Confirmed("X".into())
        );
        assert!(!seq
            .poll(t0 + secs(60))
            .iter()
            .any(|u| matches!(u, SequencerUpdate::PromptRevealed { .. })));
    }

    #[test]
    fn missing_confirmation_shows_placeholder_exactly_once() {
        let t0 = Instant::now();
        let config = SequencerConfig::default().with_placeholder_text("…");
        let mut seq = TurnSequencer::new(config);
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + secs(7));
        seq.poll(t0 + secs(10));
        seq.choose(PromptKind::Trick, t0 + secs(11)).unwrap();

        assert!(seq.poll(t0 + secs(15)).is_empty());
        let first = seq.poll(t0 + secs(16));
        let second = seq.poll(t0 + secs(100));

        let revealed = first
            .iter()
            .filter(|u| matches!(u, SequencerUpdate::PromptRevealed { .. }))
            .count();
        assert_eq!(revealed, 1);
        assert!(second.is_empty());
        assert_eq!(
            seq.choice().unwrap().content,
            PromptContent::Placeholder("…".into())
        );
    }

    #[test]
    fn choose_outside_chooser_is_rejected() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        let err = seq.choose(PromptKind::Truth, t0).unwrap_err();
        assert!(matches!(
            err,
            TruthOrTrickError::InvalidPhase {
                expected: TurnPhase::PromptPending,
                actual: TurnPhase::Idle
            }
        ));

        seq.on_player_selected(announcement("p1"), t0);
        assert!(seq.choose(PromptKind::Truth, t0).is_err());
    }

    #[test]
    fn choose_during_someone_elses_turn_is_rejected() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.set_local_player(Some(PlayerId::from("me")));
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + secs(7));

        assert!(!seq.is_local_turn());
        assert!(matches!(
            seq.choose(PromptKind::Truth, t0 + secs(8)),
            Err(TruthOrTrickError::NotYourTurn)
        ));
    }

    #[test]
    fn spectator_sees_confirmation_without_choosing() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.poll(t0 + secs(7));

        let updates = seq.on_prompt_selected(PromptKind::Trick, "Dance".into());
        assert_eq!(updates.len(), 1);
        assert_eq!(seq.phase(), TurnPhase::PromptAnswered);
    }

    #[test]
    fn confirmation_during_spin_skips_chooser() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.on_player_selected(announcement("p1"), t0);
        seq.on_pick_prompt();
        seq.on_prompt_selected(PromptKind::Truth, "Early".into());
        assert_eq!(seq.phase(), TurnPhase::Spinning);

        let updates = seq.poll(t0 + secs(7));
        assert_eq!(count_popups(&updates), 1);
        assert_eq!(count_choosers(&updates), 0);
        assert_eq!(seq.phase(), TurnPhase::PromptAnswered);
    }

    #[test]
    fn confirmation_while_idle_is_ignored() {
        let mut seq = TurnSequencer::default();
        assert!(seq
            .on_prompt_selected(PromptKind::Truth, "late".into())
            .is_empty());
        assert!(seq.choice().is_none());
    }

    #[test]
    fn end_turn_resets_from_every_phase() {
        let t0 = Instant::now();

        let drive_to = |target: TurnPhase| {
            let mut seq = TurnSequencer::default();
            if target == TurnPhase::Idle {
                return seq;
            }
            seq.on_player_selected(announcement("p1"), t0);
            if target == TurnPhase::Spinning {
                return seq;
            }
            seq.poll(t0 + secs(7));
            if target == TurnPhase::Revealed {
                return seq;
            }
            seq.on_pick_prompt();
            if target == TurnPhase::PromptPending {
                return seq;
            }
            seq.choose(PromptKind::Truth, t0 + secs(8)).unwrap();
            seq
        };

        for phase in [
            TurnPhase::Idle,
            TurnPhase::Spinning,
            TurnPhase::Revealed,
            TurnPhase::PromptPending,
            TurnPhase::PromptAnswered,
        ] {
            let mut seq = drive_to(phase);
            assert_eq!(seq.phase(), phase);

            let updates = seq.end_turn();
            assert!(matches!(updates[..], [SequencerUpdate::TurnReset { .. }]));
            assert_eq!(seq.phase(), TurnPhase::Idle);
            assert_eq!(seq.pending_timers(), 0, "timers left after reset from {phase:?}");
            assert!(seq.poll(t0 + secs(120)).is_empty());
            let view = seq.view();
            assert!(view.announcement.is_none());
            assert!(view.choice.is_none());
            assert!(view.popup.is_none());
        }
    }

    #[test]
    fn same_player_after_end_turn_is_a_new_turn() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        let mut all = seq.on_player_selected(announcement("p1"), t0);
        all.extend(seq.poll(t0 + secs(7)));
        seq.end_turn();
        all.extend(seq.on_player_selected(announcement("p1"), t0 + secs(20)));
        all.extend(seq.poll(t0 + secs(27)));

        assert_eq!(seq.turn(), 2);
        assert_eq!(count_popups(&all), 2);
    }

    #[test]
    fn late_poll_fires_cascading_timers_in_order() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        seq.on_player_selected(announcement("p1"), t0);

        let updates = seq.poll(t0 + secs(60));
        assert!(matches!(
            updates[..],
            [
                SequencerUpdate::WinnerPopupShown { .. },
                SequencerUpdate::WinnerPopupHidden { .. }
            ]
        ));
    }

    #[test]
    fn option_text_comes_from_announcement() {
        let t0 = Instant::now();
        let mut seq = TurnSequencer::default();
        assert_eq!(seq.option_text(PromptKind::Truth), None);
        seq.on_player_selected(announcement("p1"), t0);
        assert_eq!(
            seq.option_text(PromptKind::Trick).as_deref(),
            Some("Do ten push-ups")
        );
    }
}
