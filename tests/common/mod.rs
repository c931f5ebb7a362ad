#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Truth or Trick Client integration tests.
//!
//! Provides two transports and helpers for building server frames:
//!
//! - [`MockTransport`] replays a fixed script, then hangs.
//! - [`LiveTransport`] is fed frame by frame from the test through a
//!   [`ServerHandle`], for tests that interleave server pushes with time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use truth_or_trick_client::protocol::{
    Announcement, Player, PlayerId, PromptKind, PromptOptions, RoomMeta, RoomState, RoundState,
    ServerMessage,
};
use truth_or_trick_client::{ClientMessage, Transport, TruthOrTrickError};

// ── MockTransport ───────────────────────────────────────────────────

/// Scripted server responses are consumed in order by `recv()`.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, TruthOrTrickError>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, TruthOrTrickError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Out of script: stay open until shutdown.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), TruthOrTrickError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── LiveTransport ───────────────────────────────────────────────────

/// Transport whose inbound frames are pushed by a [`ServerHandle`].
///
/// Dropping the handle closes the connection from the server side.
pub struct LiveTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

/// The test's side of a [`LiveTransport`].
pub struct ServerHandle {
    push: mpsc::UnboundedSender<String>,
    received: mpsc::UnboundedReceiver<String>,
}

impl LiveTransport {
    pub fn pair() -> (Self, ServerHandle) {
        let (push, incoming) = mpsc::unbounded_channel();
        let (outgoing, received) = mpsc::unbounded_channel();
        (Self { incoming, outgoing }, ServerHandle { push, received })
    }
}

#[async_trait]
impl Transport for LiveTransport {
    async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError> {
        self.outgoing
            .send(message)
            .map_err(|e| TruthOrTrickError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TruthOrTrickError> {
        self.incoming.close();
        Ok(())
    }
}

impl ServerHandle {
    /// Push a typed message to the client.
    pub fn push(&self, msg: &ServerMessage) {
        self.push_raw(serde_json::to_string(msg).unwrap());
    }

    /// Push an arbitrary text frame.
    pub fn push_raw(&self, frame: impl Into<String>) {
        self.push.send(frame.into()).unwrap();
    }

    /// Next message the client sent, decoded.
    pub async fn next_sent(&mut self) -> ClientMessage {
        let text = self.received.recv().await.expect("client closed");
        serde_json::from_str(&text).unwrap()
    }

    /// Next raw frame the client sent, as JSON.
    pub async fn next_sent_json(&mut self) -> serde_json::Value {
        let text = self.received.recv().await.expect("client closed");
        serde_json::from_str(&text).unwrap()
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn player(id: &str, name: &str) -> Player {
    Player {
        id: PlayerId::from(id),
        display_name: name.into(),
        avatar_id: None,
        is_host: false,
        round_state: RoundState::NotStarted,
    }
}

/// A two-player room hosted by `p1` ("Ada"), with `p2` ("Bob").
pub fn two_player_room() -> RoomState {
    let mut host = player("p1", "Ada");
    host.is_host = true;
    RoomState {
        players: vec![host, player("p2", "Bob")],
        host_id: Some(PlayerId::from("p1")),
        meta: RoomMeta {
            room_code: Some("FISH".into()),
            round: 1,
        },
    }
}

pub fn announcement(id: &str, name: &str) -> Announcement {
    Announcement {
        player: player(id, name),
        remaining_count: 1,
        total_players: 2,
        exhausted: false,
        prompt_options: Some(PromptOptions {
            truth: "What's your worst habit?".into(),
            trick: "Sing the chorus of a song".into(),
        }),
    }
}

// ── JSON helper functions ───────────────────────────────────────────

pub fn room_joined(session_id: &str) -> ServerMessage {
    ServerMessage::RoomJoined {
        room_id: "room-1".into(),
        session_id: PlayerId::from(session_id),
        reconnection_token: Some("tok-1".into()),
    }
}

pub fn room_joined_json(session_id: &str) -> String {
    serde_json::to_string(&room_joined(session_id)).expect("room_joined_json serialization")
}

pub fn room_update_json() -> String {
    serde_json::to_string(&ServerMessage::RoomUpdate(two_player_room()))
        .expect("room_update_json serialization")
}

pub fn player_selected(id: &str, name: &str) -> ServerMessage {
    ServerMessage::PlayerSelected(Box::new(announcement(id, name)))
}

pub fn player_selected_json(id: &str, name: &str) -> String {
    serde_json::to_string(&player_selected(id, name)).expect("player_selected_json serialization")
}

pub fn pick_prompt_json() -> String {
    serde_json::to_string(&ServerMessage::PickPrompt).expect("pick_prompt_json serialization")
}

pub fn prompt_selected(kind: PromptKind, content: &str) -> ServerMessage {
    ServerMessage::PromptSelected {
        kind,
        content: content.into(),
    }
}

pub fn end_turn_json() -> String {
    serde_json::to_string(&ServerMessage::EndTurn).expect("end_turn_json serialization")
}

pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::Error {
        message: message.into(),
    })
    .expect("error_json serialization")
}
