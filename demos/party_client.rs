//! # Party Client Example
//!
//! Plays Truth or Trick from a terminal:
//!
//! 1. Connect to the room server via WebSocket
//! 2. Join (or create) a room
//! 3. Render the lobby, wheel, popup and prompt card as the game goes
//! 4. Pick "truth" automatically when it is our turn, then finish the turn
//! 5. Resume the seat with the reconnection token if the connection drops
//! 6. Shut down on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start a room server on localhost:2567, then:
//! cargo run --example party_client -- Ada
//!
//! # Join an existing room on another server:
//! TRUTH_OR_TRICK_SERVER_URL=ws://party.local:2567 cargo run --example party_client -- Bob FISH
//! ```

use std::time::Duration;

use truth_or_trick_client::protocol::PromptKind;
use truth_or_trick_client::sequencer::SequencerUpdate;
use truth_or_trick_client::session::{SessionSnapshot, SessionUpdate};
use truth_or_trick_client::store::StatusBanner;
use truth_or_trick_client::view::{
    HostDashboard, LobbyView, PlayerDashboard, PromptCardView, WheelView, WinnerPopupView,
};
use truth_or_trick_client::{
    ClientConfig, JoinRoomParams, PartySession, SessionConfig, WebSocketTransport,
};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// How a session ended.
enum Exit {
    Quit,
    Dropped {
        room_id: String,
        reconnection_token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` to watch the sequencer's transitions.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "RustPlayer".to_string());
    let room_code = args.next();
    let config = ClientConfig::from_env();

    let mut join = JoinRoomParams::new(name);
    if let Some(code) = room_code {
        join = join.with_room_code(code);
    }

    let mut resume: Option<(String, String)> = None;
    let mut attempts = 0;

    loop {
        tracing::info!("Connecting to {}", config.server_url);
        let transport = match WebSocketTransport::connect_with_config(&config).await {
            Ok(transport) => transport,
            Err(e) if resume.is_some() && attempts < MAX_RECONNECT_ATTEMPTS => {
                attempts += 1;
                tracing::warn!("Reconnect attempt {attempts} failed: {e}");
                tokio::time::sleep(Duration::from_secs(u64::from(attempts))).await;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let (mut session, updates) =
            PartySession::start(transport, config.clone(), SessionConfig::default());
        match resume.take() {
            Some((room_id, token)) => session.reconnect(room_id, token)?,
            None => session.join_room(join.clone())?,
        }

        let exit = play(&session, updates).await;
        session.shutdown().await;

        match exit {
            Exit::Quit => break,
            Exit::Dropped {
                room_id,
                reconnection_token,
            } => {
                attempts = 0;
                resume = Some((room_id, reconnection_token));
            }
        }
    }

    tracing::info!("Goodbye!");
    Ok(())
}

async fn play(
    session: &PartySession,
    mut updates: tokio::sync::mpsc::Receiver<SessionUpdate>,
) -> Exit {
    // A late confirmation reveals the same turn a second time.
    let mut finished_turn: Option<u64> = None;
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else {
                    return Exit::Quit;
                };
                let snapshot = session.snapshot().await;
                render(&update, &snapshot);

                match update {
                    SessionUpdate::Turn(SequencerUpdate::PromptChooserShown { .. })
                        if snapshot.turn.is_local_turn =>
                    {
                        if let Err(e) = session.choose_prompt(PromptKind::Truth).await {
                            tracing::warn!("Could not choose: {e}");
                        }
                    }
                    SessionUpdate::Turn(SequencerUpdate::PromptRevealed { turn, .. })
                        if snapshot.turn.is_local_turn && finished_turn != Some(turn) =>
                    {
                        finished_turn = Some(turn);
                        if let Err(e) = session.finish_turn() {
                            tracing::warn!("Could not finish the turn: {e}");
                        }
                    }
                    SessionUpdate::Status(StatusBanner::Disconnected { reason }) => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        let room = snapshot.room;
                        return match (room.room_id(), room.reconnection_token()) {
                            (Some(room_id), Some(token)) => Exit::Dropped {
                                room_id: room_id.to_string(),
                                reconnection_token: token.to_string(),
                            },
                            _ => Exit::Quit,
                        };
                    }
                    _ => {}
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                if let Err(e) = session.leave_room() {
                    tracing::debug!("leave_room: {e}");
                }
                return Exit::Quit;
            }
        }
    }
}

fn render(update: &SessionUpdate, snapshot: &SessionSnapshot) {
    match update {
        SessionUpdate::Room | SessionUpdate::Status(_) => {
            if snapshot.room.is_host() {
                println!("{}", HostDashboard::new(&snapshot.room));
            } else {
                println!("{}", LobbyView::new(&snapshot.room));
                println!("{}", PlayerDashboard::new(&snapshot.room, &snapshot.turn));
            }
        }
        SessionUpdate::Turn(_) => {
            println!("{}", WheelView::new(&snapshot.room, &snapshot.turn));
            if let Some(popup) = WinnerPopupView::new(&snapshot.turn) {
                println!("{popup}");
            }
            if let Some(card) = PromptCardView::new(&snapshot.turn) {
                println!("{card}");
            }
        }
    }
}
