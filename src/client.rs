//! Connection adapter for the Truth or Trick room server.
//!
//! [`TruthOrTrickClient`] is a thin handle that talks to a background
//! transport loop over an unbounded MPSC channel. Inbound frames are decoded,
//! shape-checked and emitted as [`TruthOrTrickEvent`]s on the bounded channel
//! returned from [`TruthOrTrickClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env();
//! let transport = WebSocketTransport::connect_with_config(&config).await?;
//! let (client, mut events) = TruthOrTrickClient::start(transport, config);
//!
//! client.join_room(JoinRoomParams::new("Alice").with_room_code("QX7P"))?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TruthOrTrickEvent::RoomUpdated(room) => { /* … */ }
//!         TruthOrTrickEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::{Result, TruthOrTrickError};
use crate::event::TruthOrTrickEvent;
use crate::protocol::{ClientMessage, PlayerId, PromptKind, ServerMessage};
use crate::transport::Transport;

/// Environment variable holding the room server address.
pub const SERVER_URL_ENV: &str = "TRUTH_OR_TRICK_SERVER_URL";

/// Server address used when [`SERVER_URL_ENV`] is unset.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:2567";

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest display name the lobby accepts.
pub const MAX_DISPLAY_NAME_CHARS: usize = 24;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`TruthOrTrickClient`] connection.
///
/// Only the server address comes from the environment; everything else is
/// set through the builder methods.
///
/// ```
/// use truth_or_trick_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("ws://party.example:2567")
///     .with_event_channel_capacity(64)
///     .with_shutdown_timeout(Duration::from_millis(500));
/// assert_eq!(config.server_url, "ws://party.example:2567");
/// assert_eq!(config.event_channel_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket address of the room server.
    pub server_url: String,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped with a warning so
    /// the transport loop never blocks. `Disconnected` is always delivered.
    /// Defaults to **256**; values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`TruthOrTrickClient::shutdown`] waits for the transport loop
    /// before aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Deadline for establishing the connection. Defaults to **10 seconds**.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given server address with default values.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Read the server address from `TRUTH_OR_TRICK_SERVER_URL`, falling back
    /// to [`DEFAULT_SERVER_URL`].
    pub fn from_env() -> Self {
        let url = std::env::var(SERVER_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Self::new(url)
    }

    /// Set the capacity of the bounded event channel (clamped to at least 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the graceful shutdown timeout. Zero aborts the loop immediately.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the connection deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

// ── Request parameters ──────────────────────────────────────────────

/// Parameters for joining a room.
///
/// Leave `room_code` as `None` to let the server create or pick a room.
///
/// ```
/// use truth_or_trick_client::client::JoinRoomParams;
///
/// let params = JoinRoomParams::new("Alice").with_room_code("QX7P").with_avatar("fox");
/// assert_eq!(params.room_code.as_deref(), Some("QX7P"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct JoinRoomParams {
    pub display_name: String,
    pub room_code: Option<String>,
    pub avatar_id: Option<String>,
}

impl JoinRoomParams {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_room_code(mut self, room_code: impl Into<String>) -> Self {
        self.room_code = Some(room_code.into());
        self
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar_id: impl Into<String>) -> Self {
        self.avatar_id = Some(avatar_id.into());
        self
    }
}

/// A validated rename / avatar change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    display_name: String,
    avatar_id: Option<String>,
}

impl ProfileUpdate {
    /// Trim and check a new display name.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::InvalidProfile`] if the trimmed name is
    /// empty or longer than [`MAX_DISPLAY_NAME_CHARS`].
    pub fn new(display_name: &str, avatar_id: Option<String>) -> Result<Self> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(TruthOrTrickError::InvalidProfile(
                "display name is empty".into(),
            ));
        }
        let chars = display_name.chars().count();
        if chars > MAX_DISPLAY_NAME_CHARS {
            return Err(TruthOrTrickError::InvalidProfile(format!(
                "display name has {chars} characters, at most {MAX_DISPLAY_NAME_CHARS} allowed"
            )));
        }
        Ok(Self {
            display_name: display_name.to_string(),
            avatar_id: avatar_id.filter(|a| !a.trim().is_empty()),
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn avatar_id(&self) -> Option<&str> {
        self.avatar_id.as_deref()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
    session_id: Mutex<Option<PlayerId>>,
    room_id: Mutex<Option<String>>,
    reconnection_token: Mutex<Option<String>>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            session_id: Mutex::new(None),
            room_id: Mutex::new(None),
            reconnection_token: Mutex::new(None),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async handle to the room server connection.
///
/// Every request method serializes a [`ClientMessage`] and queues it for the
/// transport loop; they return as soon as the message is queued.
pub struct TruthOrTrickClient {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    state: Arc<ClientState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl TruthOrTrickClient {
    /// Spawn the transport loop and return the handle plus event receiver.
    ///
    /// The receiver yields [`TruthOrTrickEvent::Connected`] first and
    /// [`TruthOrTrickEvent::Disconnected`] last.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<TruthOrTrickEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<TruthOrTrickEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new());

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            Arc::clone(&state),
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Requests ────────────────────────────────────────────────────

    /// Join a room, or let the server pick one.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn join_room(&self, params: JoinRoomParams) -> Result<()> {
        self.send(ClientMessage::JoinRoom {
            room_code: params.room_code,
            display_name: params.display_name,
            avatar_id: params.avatar_id,
        })
    }

    /// Ask the server to start the game. Only the host's request is honored.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn start_game(&self) -> Result<()> {
        self.send(ClientMessage::StartGame)
    }

    /// Tell the server which prompt the selected player picked.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn choose_prompt(&self, kind: PromptKind, content: Option<String>) -> Result<()> {
        self.send(ClientMessage::PromptChosen { kind, content })
    }

    /// Signal that the selected player is done with their prompt.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn finish_turn(&self) -> Result<()> {
        self.send(ClientMessage::FinishTurn)
    }

    /// Rename and/or change avatar.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn update_profile(&self, profile: ProfileUpdate) -> Result<()> {
        self.send(ClientMessage::UpdateProfile {
            display_name: profile.display_name,
            avatar_id: profile.avatar_id,
        })
    }

    /// Ask for another game in the same room.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn play_again(&self) -> Result<()> {
        self.send(ClientMessage::PlayAgain)
    }

    /// Leave the current room.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn leave_room(&self) -> Result<()> {
        self.send(ClientMessage::LeaveRoom)
    }

    /// Resume a seat after a dropped connection, using the token from an
    /// earlier `RoomJoined`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthOrTrickError::NotConnected`] if the transport has closed.
    pub fn reconnect(&self, room_id: String, reconnection_token: String) -> Result<()> {
        self.send(ClientMessage::Reconnect {
            room_id,
            reconnection_token,
        })
    }

    /// Close the transport and stop the background task.
    ///
    /// The event receiver yields `None` once the loop has exited.
    pub async fn shutdown(&mut self) {
        debug!("TruthOrTrickClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// The local player's id, once the server has seated us.
    pub async fn session_id(&self) -> Option<PlayerId> {
        self.state.session_id.lock().await.clone()
    }

    /// The current room id, if in a room.
    pub async fn room_id(&self) -> Option<String> {
        self.state.room_id.lock().await.clone()
    }

    /// Token for [`reconnect`](Self::reconnect), if the server issued one.
    pub async fn reconnection_token(&self) -> Option<String> {
        self.state.reconnection_token.lock().await.clone()
    }

    fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(TruthOrTrickError::NotConnected);
        }
        self.cmd_tx
            .send(msg)
            .map_err(|_| TruthOrTrickError::NotConnected)
    }
}

impl std::fmt::Debug for TruthOrTrickClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruthOrTrickClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for TruthOrTrickClient {
    fn drop(&mut self) {
        // No executor to drive a graceful close from a synchronous drop.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Multiplexes outgoing commands, the shutdown signal and inbound frames.
///
/// Exits when the command channel closes, shutdown is requested, the server
/// closes the connection or the transport fails.
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<TruthOrTrickEvent>,
    state: Arc<ClientState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    emit_event(&event_tx, TruthOrTrickEvent::Connected).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(msg) = cmd else {
                    debug!("command channel closed, shutting down transport loop");
                    let _ = transport.close().await;
                    emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                    break;
                };
                debug!("sending client message: {:?}", std::mem::discriminant(&msg));
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            emit_disconnected(
                                &event_tx,
                                &state,
                                Some(format!("transport send error: {e}")),
                            ).await;
                            break;
                        }
                    }
                    Err(e) => error!("failed to serialize ClientMessage: {e}"),
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match decode_server_message(&text) {
                        Ok(server_msg) => {
                            update_state(&state, &server_msg).await;
                            emit_event(&event_tx, TruthOrTrickEvent::from(server_msg)).await;
                        }
                        Err(reason) => {
                            warn!(raw = %text, "ignoring unexpected payload: {reason}");
                            emit_event(&event_tx, TruthOrTrickEvent::UnexpectedPayload { reason }).await;
                        }
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Decode one inbound frame and run its shape checks.
fn decode_server_message(text: &str) -> std::result::Result<ServerMessage, String> {
    let msg = serde_json::from_str::<ServerMessage>(text).map_err(|e| e.to_string())?;
    msg.validate()?;
    Ok(msg)
}

async fn update_state(state: &ClientState, msg: &ServerMessage) {
    match msg {
        ServerMessage::RoomJoined {
            room_id,
            session_id,
            reconnection_token,
        } => {
            *state.session_id.lock().await = Some(session_id.clone());
            *state.room_id.lock().await = Some(room_id.clone());
            *state.reconnection_token.lock().await = reconnection_token.clone();
            debug!(room = %room_id, session = %session_id, "state: joined room");
        }
        ServerMessage::RoomLeft => {
            *state.room_id.lock().await = None;
            *state.reconnection_token.lock().await = None;
            debug!("state: left room");
        }
        _ => {}
    }
}

/// Emit without blocking; a full channel drops the event with a warning.
async fn emit_event(event_tx: &mpsc::Sender<TruthOrTrickEvent>, event: TruthOrTrickEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// `Disconnected` is the last event and is awaited rather than dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<TruthOrTrickEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    if event_tx
        .send(TruthOrTrickEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    type Script = Vec<Option<std::result::Result<String, TruthOrTrickError>>>;

    /// Replays scripted frames, records sent frames, then hangs.
    struct ScriptedTransport {
        incoming: VecDeque<Option<std::result::Result<String, TruthOrTrickError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        fn new(incoming: Script) -> (Self, Arc<StdMutex<Vec<String>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
            };
            (transport, sent)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), TruthOrTrickError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, TruthOrTrickError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), TruthOrTrickError> {
            Ok(())
        }
    }

    fn frame(msg: &ServerMessage) -> Option<std::result::Result<String, TruthOrTrickError>> {
        Some(Ok(serde_json::to_string(msg).unwrap()))
    }

    #[tokio::test]
    async fn room_joined_records_session_and_token() {
        let (transport, _sent) = ScriptedTransport::new(vec![frame(&ServerMessage::RoomJoined {
            room_id: "room-1".into(),
            session_id: PlayerId::from("p-1"),
            reconnection_token: Some("tok".into()),
        })]);
        let (mut client, mut events) = TruthOrTrickClient::start(transport, ClientConfig::default());

        assert!(matches!(events.recv().await, Some(TruthOrTrickEvent::Connected)));
        assert!(matches!(
            events.recv().await,
            Some(TruthOrTrickEvent::RoomJoined { .. })
        ));

        assert_eq!(client.session_id().await, Some(PlayerId::from("p-1")));
        assert_eq!(client.room_id().await.as_deref(), Some("room-1"));
        assert_eq!(client.reconnection_token().await.as_deref(), Some("tok"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_frame_is_reported_and_loop_survives() {
        let (transport, _sent) = ScriptedTransport::new(vec![
            Some(Ok(r#"{"type":"PlayerSelected","data":{"nope":1}}"#.into())),
            frame(&ServerMessage::PickPrompt),
        ]);
        let (mut client, mut events) = TruthOrTrickClient::start(transport, ClientConfig::default());

        let _ = events.recv().await; // Connected
        assert!(matches!(
            events.recv().await,
            Some(TruthOrTrickEvent::UnexpectedPayload { .. })
        ));
        assert!(matches!(events.recv().await, Some(TruthOrTrickEvent::PickPrompt)));
        assert!(client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn choose_prompt_serializes_type_field() {
        let (transport, sent) = ScriptedTransport::new(vec![]);
        let (mut client, mut events) = TruthOrTrickClient::start(transport, ClientConfig::default());
        let _ = events.recv().await; // Connected

        client
            .choose_prompt(PromptKind::Truth, Some("Who do you admire?".into()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let value: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(value["type"], "PromptChosen");
            assert_eq!(value["data"]["type"], "truth");
            assert_eq!(value["data"]["content"], "Who do you admire?");
        }

        client.shutdown().await;
    }

    #[test]
    fn profile_update_trims_and_validates() {
        let profile = ProfileUpdate::new("  Bob  ", Some(String::new())).unwrap();
        assert_eq!(profile.display_name(), "Bob");
        assert_eq!(profile.avatar_id(), None);

        assert!(matches!(
            ProfileUpdate::new("   ", None),
            Err(TruthOrTrickError::InvalidProfile(_))
        ));
        let long = "x".repeat(MAX_DISPLAY_NAME_CHARS + 1);
        assert!(ProfileUpdate::new(&long, None).is_err());
    }

    #[test]
    fn config_defaults_and_clamping() {
        let config = ClientConfig::default().with_event_channel_capacity(0);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
