//! # Scripted Turn Example
//!
//! Plays one turn against an in-process fake room server, with the wheel
//! and popup sped up so the whole choreography runs in a few seconds.
//! The fake server talks to the client through a loopback [`Transport`];
//! the same approach works for any I/O layer.
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --example scripted_turn
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use truth_or_trick_client::protocol::PromptKind;
use truth_or_trick_client::sequencer::SequencerUpdate;
use truth_or_trick_client::session::SessionUpdate;
use truth_or_trick_client::view::{PromptCardView, WheelView, WinnerPopupView};
use truth_or_trick_client::{
    ClientConfig, JoinRoomParams, PartySession, SequencerConfig, SessionConfig, Transport,
    TruthOrTrickError,
};

// ── Loopback transport ──────────────────────────────────────────────

/// Client half: handed to `PartySession::start`.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: reads what the client sent and pushes frames back.
struct LoopbackServer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), TruthOrTrickError> {
        self.tx
            .send(message)
            .map_err(|e| TruthOrTrickError::TransportSend(e.to_string()))
    }

    // `UnboundedReceiver::recv` is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, TruthOrTrickError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TruthOrTrickError> {
        Ok(())
    }
}

// ── Fake room server ────────────────────────────────────────────────

/// Seat the player, select them, and confirm whatever prompt they choose.
async fn fake_server(mut server: LoopbackServer) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    while let Some(frame) = server.rx.recv().await {
        let msg: serde_json::Value = serde_json::from_str(&frame)?;
        tracing::info!("server received {}", msg["type"]);
        match msg["type"].as_str() {
            Some("JoinRoom") => {
                let players = json!([
                    {"id": "s-1", "display_name": msg["data"]["display_name"], "is_host": true},
                    {"id": "s-2", "display_name": "Bot"}
                ]);
                for reply in [
                    json!({"type": "RoomJoined", "data": {"room_id": "r-1", "session_id": "s-1"}}),
                    json!({"type": "RoomUpdate", "data": {"players": players, "host_id": "s-1"}}),
                    json!({"type": "GameStarted"}),
                    json!({"type": "PickPrompt"}),
                    json!({"type": "PlayerSelected", "data": {
                        "player": players[0],
                        "remaining_count": 1,
                        "total_players": 2,
                        "prompt_options": {
                            "truth": "What's the last lie you told?",
                            "trick": "Talk like a pirate until your next turn"
                        }
                    }}),
                ] {
                    server.tx.send(reply.to_string())?;
                }
            }
            Some("PromptChosen") => {
                let reply = json!({"type": "PromptSelected", "data": {
                    "type": msg["data"]["type"],
                    "content": msg["data"]["content"],
                }});
                server.tx.send(reply.to_string())?;
            }
            Some("FinishTurn") => {
                server.tx.send(json!({"type": "EndTurn"}).to_string())?;
                server
                    .tx
                    .send(json!({"type": "GameEnded", "data": {"reason": "demo over"}}).to_string())?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, server) = loopback_pair();
    let server_task = tokio::spawn(fake_server(server));

    let sequencer = SequencerConfig::default()
        .with_spin_duration(Duration::from_millis(700))
        .with_popup_duration(Duration::from_millis(300));
    let (mut session, mut updates) = PartySession::start(
        transport,
        ClientConfig::default(),
        SessionConfig::default().with_sequencer(sequencer),
    );
    session.join_room(JoinRoomParams::new("Ada"))?;

    while let Some(update) = updates.recv().await {
        let SessionUpdate::Turn(turn_update) = update else {
            continue;
        };
        let snapshot = session.snapshot().await;
        println!("{}", WheelView::new(&snapshot.room, &snapshot.turn));
        if let Some(popup) = WinnerPopupView::new(&snapshot.turn) {
            println!("{popup}");
        }
        if let Some(card) = PromptCardView::new(&snapshot.turn) {
            println!("{card}");
        }

        match turn_update {
            SequencerUpdate::PromptChooserShown { .. } => {
                session.choose_prompt(PromptKind::Trick).await?;
            }
            SequencerUpdate::PromptRevealed { .. } => session.finish_turn()?,
            SequencerUpdate::TurnReset { .. } => break,
            _ => {}
        }
    }

    session.shutdown().await;
    server_task.abort();
    tracing::info!("Turn complete.");
    Ok(())
}
