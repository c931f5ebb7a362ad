//! One party-game session: connection, room store and turn sequencer wired
//! together behind a single handle.
//!
//! [`PartySession::start`] spawns a driver task that owns the
//! [`TruthOrTrickClient`] and multiplexes, with `tokio::select!`:
//!
//! - events from the connection (folded into [`RoomStore`] and [`TurnSequencer`]),
//! - commands from the handle (`choose_prompt`, `start_game`, …),
//! - the sequencer's next timer deadline,
//! - the shutdown signal.
//!
//! Every state change is reported as a [`SessionUpdate`] on the receiver
//! returned from `start`, and the whole state can be read at any time with
//! [`PartySession::snapshot`]. Shutting the session down cancels every
//! pending sequencer timer before the connection is closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::{ClientConfig, JoinRoomParams, ProfileUpdate, TruthOrTrickClient};
use crate::error::{Result, TruthOrTrickError};
use crate::event::TruthOrTrickEvent;
use crate::protocol::PromptKind;
use crate::sequencer::{SequencerConfig, SequencerUpdate, TurnPhase, TurnSequencer, TurnView};
use crate::store::{RoomStore, StatusBanner};
use crate::transport::Transport;

const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Configuration for a [`PartySession`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Turn presentation timing.
    pub sequencer: SequencerConfig,
    /// Capacity of the update channel. Defaults to **256**; clamped to 1.
    pub update_channel_capacity: Option<usize>,
}

impl SessionConfig {
    #[must_use]
    pub fn with_sequencer(mut self, sequencer: SequencerConfig) -> Self {
        self.sequencer = sequencer;
        self
    }

    #[must_use]
    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        self.update_channel_capacity = Some(capacity.max(1));
        self
    }
}

/// Something the views should redraw for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Player list, local identity or game lifecycle changed.
    Room,
    /// The status banner changed.
    Status(StatusBanner),
    /// The turn choreography moved on.
    Turn(SequencerUpdate),
}

/// Everything a view needs, cloned out of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub room: RoomStore,
    pub turn: TurnView,
}

/// State owned by the driver and readable through the handle.
struct SessionState {
    store: RoomStore,
    sequencer: TurnSequencer,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            room: self.store.clone(),
            turn: self.sequencer.view(),
        }
    }

    /// Fold one connection event into the store and the sequencer.
    fn apply_event(&mut self, event: TruthOrTrickEvent, now: Instant) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        let status_before = self.store.status().clone();
        if self.store.apply(&event) {
            if *self.store.status() != status_before {
                updates.push(SessionUpdate::Status(self.store.status().clone()));
            }
            updates.push(SessionUpdate::Room);
        }

        let turn_updates = match event {
            TruthOrTrickEvent::RoomJoined { session_id, .. } => {
                self.sequencer.set_local_player(Some(session_id));
                Vec::new()
            }
            TruthOrTrickEvent::PlayerSelected(announcement) => {
                self.sequencer.on_player_selected(*announcement, now)
            }
            TruthOrTrickEvent::PickPrompt => self.sequencer.on_pick_prompt(),
            TruthOrTrickEvent::PromptSelected { kind, content } => {
                self.sequencer.on_prompt_selected(kind, content)
            }
            TruthOrTrickEvent::TurnEnded => self.sequencer.end_turn(),
            TruthOrTrickEvent::GameStarted
            | TruthOrTrickEvent::GameEnded { .. }
            | TruthOrTrickEvent::RoomLeft => {
                if self.sequencer.phase() == TurnPhase::Idle {
                    self.sequencer.reset_idle();
                    Vec::new()
                } else {
                    self.sequencer.end_turn()
                }
            }
            TruthOrTrickEvent::Connected
            | TruthOrTrickEvent::Disconnected { .. }
            | TruthOrTrickEvent::UnexpectedPayload { .. }
            | TruthOrTrickEvent::RoomUpdated(_)
            | TruthOrTrickEvent::ServerError { .. } => Vec::new(),
        };
        updates.extend(turn_updates.into_iter().map(SessionUpdate::Turn));
        updates
    }
}

/// Requests from the handle to the driver.
enum SessionCommand {
    JoinRoom(JoinRoomParams),
    StartGame,
    ChoosePrompt {
        kind: PromptKind,
        reply: oneshot::Sender<Result<()>>,
    },
    FinishTurn,
    UpdateProfile(ProfileUpdate),
    PlayAgain,
    LeaveRoom,
    Reconnect {
        room_id: String,
        reconnection_token: String,
    },
}

/// Handle to a running party session.
///
/// This is the explicitly constructed context object views are given; there
/// is no global connection or store.
pub struct PartySession {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    state: Arc<Mutex<SessionState>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl PartySession {
    /// Start the connection and the session driver.
    #[must_use = "the update receiver must be used to receive updates"]
    pub fn start(
        transport: impl Transport,
        client_config: ClientConfig,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionUpdate>) {
        let shutdown_timeout = client_config.shutdown_timeout;
        let (client, events) = TruthOrTrickClient::start(transport, client_config);

        let capacity = config
            .update_channel_capacity
            .unwrap_or(DEFAULT_UPDATE_CHANNEL_CAPACITY)
            .max(1);
        let (update_tx, update_rx) = mpsc::channel(capacity);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state = Arc::new(Mutex::new(SessionState {
            store: RoomStore::new(),
            sequencer: TurnSequencer::new(config.sequencer),
        }));

        let task = tokio::spawn(drive(
            client,
            events,
            cmd_rx,
            update_tx,
            Arc::clone(&state),
            shutdown_rx,
        ));

        let session = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (session, update_rx)
    }

    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn join_room(&self, params: JoinRoomParams) -> Result<()> {
        self.command(SessionCommand::JoinRoom(params))
    }

    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn start_game(&self) -> Result<()> {
        self.command(SessionCommand::StartGame)
    }

    /// Pick truth or trick for the local player's turn.
    ///
    /// The echo is applied before this returns; the server is then told,
    /// with the option text when the announcement carried it.
    ///
    /// # Errors
    ///
    /// [`TruthOrTrickError::InvalidPhase`] or [`TruthOrTrickError::NotYourTurn`]
    /// from the sequencer, [`TruthOrTrickError::NotConnected`] if the
    /// connection is gone, [`TruthOrTrickError::SessionClosed`] if the
    /// driver has stopped.
    pub async fn choose_prompt(&self, kind: PromptKind) -> Result<()> {
        let (reply, verdict) = oneshot::channel();
        self.command(SessionCommand::ChoosePrompt { kind, reply })?;
        verdict.await.map_err(|_| TruthOrTrickError::SessionClosed)?
    }

    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn finish_turn(&self) -> Result<()> {
        self.command(SessionCommand::FinishTurn)
    }

    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn update_profile(&self, profile: ProfileUpdate) -> Result<()> {
        self.command(SessionCommand::UpdateProfile(profile))
    }

    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn play_again(&self) -> Result<()> {
        self.command(SessionCommand::PlayAgain)
    }

    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn leave_room(&self) -> Result<()> {
        self.command(SessionCommand::LeaveRoom)
    }

    /// Resume a seat from an earlier connection.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::SessionClosed`] if the driver has stopped.
    pub fn reconnect(&self, room_id: String, reconnection_token: String) -> Result<()> {
        self.command(SessionCommand::Reconnect {
            room_id,
            reconnection_token,
        })
    }

    /// Clone the current room and turn state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Cancel all turn timers, close the connection and stop the driver.
    pub async fn shutdown(&mut self) {
        debug!("PartySession: shutdown requested");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            // the driver also closes the client, which has its own timeout
            let budget = self.shutdown_timeout.saturating_mul(2);
            match tokio::time::timeout(budget, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("session driver terminated with join error: {join_err}"),
                Err(_) => {
                    warn!("session driver did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session driver aborted: {join_err}");
                    }
                }
            }
        }
        self.state.lock().await.sequencer.cancel_all();
    }

    fn command(&self, cmd: SessionCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| TruthOrTrickError::SessionClosed)
    }
}

impl std::fmt::Debug for PartySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartySession")
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PartySession {
    fn drop(&mut self) {
        // Aborting drops the driver, its client and every pending deadline.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Driver ──────────────────────────────────────────────────────────

async fn drive(
    mut client: TruthOrTrickClient,
    mut events: mpsc::Receiver<TruthOrTrickEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    update_tx: mpsc::Sender<SessionUpdate>,
    state: Arc<Mutex<SessionState>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("session driver started");
    let mut connection_open = true;

    loop {
        let deadline = state.lock().await.sequencer.next_deadline();
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = events.recv(), if connection_open => {
                let Some(event) = event else {
                    connection_open = false;
                    continue;
                };
                let updates = state.lock().await.apply_event(event, Instant::now());
                publish(&update_tx, updates);
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("session handle dropped");
                    break;
                };
                handle_command(&client, &state, &update_tx, cmd).await;
            }

            () = timer => {
                let updates = state.lock().await.sequencer.poll(Instant::now());
                publish(&update_tx, updates.into_iter().map(SessionUpdate::Turn).collect());
            }

            _ = &mut shutdown_rx => {
                debug!("session shutdown signal received");
                break;
            }
        }
    }

    state.lock().await.sequencer.cancel_all();
    client.shutdown().await;
    debug!("session driver exited");
}

async fn handle_command(
    client: &TruthOrTrickClient,
    state: &Mutex<SessionState>,
    update_tx: &mpsc::Sender<SessionUpdate>,
    cmd: SessionCommand,
) {
    let sent = match cmd {
        SessionCommand::JoinRoom(params) => client.join_room(params),
        SessionCommand::StartGame => client.start_game(),
        SessionCommand::FinishTurn => client.finish_turn(),
        SessionCommand::UpdateProfile(profile) => client.update_profile(profile),
        SessionCommand::PlayAgain => client.play_again(),
        SessionCommand::LeaveRoom => client.leave_room(),
        SessionCommand::Reconnect {
            room_id,
            reconnection_token,
        } => client.reconnect(room_id, reconnection_token),
        SessionCommand::ChoosePrompt { kind, reply } => {
            let verdict = {
                let mut state = state.lock().await;
                state
                    .sequencer
                    .choose(kind, Instant::now())
                    .map(|updates| (updates, state.sequencer.option_text(kind)))
            };
            let result = match verdict {
                Ok((updates, content)) => {
                    publish(update_tx, updates.into_iter().map(SessionUpdate::Turn).collect());
                    client.choose_prompt(kind, content)
                }
                Err(e) => Err(e),
            };
            if reply.send(result).is_err() {
                debug!("choose_prompt caller went away before the reply");
            }
            return;
        }
    };
    if let Err(e) = sent {
        warn!("session command not sent: {e}");
    }
}

/// Publish without blocking the driver; a full channel drops with a warning.
fn publish(update_tx: &mpsc::Sender<SessionUpdate>, updates: Vec<SessionUpdate>) {
    for update in updates {
        match update_tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("update channel full, dropping update: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("update channel closed, receiver dropped");
                return;
            }
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
    use crate::protocol::{Announcement, Player, PlayerId, RoundState};

    fn selected(id: &str) -> TruthOrTrickEvent {
        TruthOrTrickEvent::PlayerSelected(Box::new(Announcement {
            player: Player {
                id: PlayerId::from(id),
                display_name: id.into(),
                avatar_id: None,
                is_host: false,
                round_state: RoundState::InProgress,
            },
            remaining_count: 0,
            total_players: 2,
            exhausted: true,
            prompt_options: None,
        }))
    }

    fn state() -> SessionState {
        SessionState {
            store: RoomStore::new(),
            sequencer: TurnSequencer::default(),
        }
    }

    #[test]
    fn room_joined_sets_local_player() {
        let mut state = state();
        let updates = state.apply_event(
            TruthOrTrickEvent::RoomJoined {
                room_id: "r".into(),
                session_id: PlayerId::from("me"),
                reconnection_token: None,
            },
            Instant::now(),
        );
        assert!(updates.contains(&SessionUpdate::Room));
        assert!(updates.contains(&SessionUpdate::Status(StatusBanner::Connected)));

        state.apply_event(selected("me"), Instant::now());
        assert!(state.sequencer.is_local_turn());
    }

    #[test]
    fn game_end_resets_active_turn() {
        let mut state = state();
        let t0 = Instant::now();
        state.apply_event(selected("p1"), t0);
        let updates = state.apply_event(TruthOrTrickEvent::GameEnded { reason: None }, t0);
        assert!(updates
            .iter()
            .any(|u| matches!(u, SessionUpdate::Turn(SequencerUpdate::TurnReset { .. }))));
        assert_eq!(state.sequencer.pending_timers(), 0);
    }

    #[test]
    fn game_start_drops_stale_pick_prompt() {
        let mut state = state();
        let t0 = Instant::now();
        state.apply_event(TruthOrTrickEvent::PickPrompt, t0);
        let updates = state.apply_event(TruthOrTrickEvent::GameStarted, t0);
        assert!(!updates
            .iter()
            .any(|u| matches!(u, SessionUpdate::Turn(_))));

        state.apply_event(selected("p1"), t0);
        let fired = state.sequencer.poll(t0 + Duration::from_secs(60));
        assert!(!fired
            .iter()
            .any(|u| matches!(u, SequencerUpdate::PromptChooserShown { .. })));
        assert_eq!(state.sequencer.phase(), TurnPhase::Revealed);
    }

    #[test]
    fn unexpected_payload_surfaces_as_status() {
        let mut state = state();
        let updates = state.apply_event(
            TruthOrTrickEvent::UnexpectedPayload {
                reason: "bad".into(),
            },
            Instant::now(),
        );
        assert_eq!(
            updates[0],
            SessionUpdate::Status(StatusBanner::UnexpectedPayload {
                detail: "bad".into()
            })
        );
    }
}
