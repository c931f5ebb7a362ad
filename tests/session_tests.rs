#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! End-to-end tests for `PartySession`: server frames in, turn choreography
//! out, on a paused clock so every spin, popup and fallback deadline is
//! deterministic.

mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use truth_or_trick_client::protocol::{PlayerId, PromptKind, ServerMessage};
use truth_or_trick_client::sequencer::{PromptContent, SequencerUpdate, TurnPhase};
use truth_or_trick_client::session::SessionUpdate;
use truth_or_trick_client::store::StatusBanner;
use truth_or_trick_client::{
    ClientConfig, ClientMessage, JoinRoomParams, PartySession, SessionConfig, TruthOrTrickError,
};

use common::{
    end_turn_json, pick_prompt_json, player_selected, prompt_selected, room_joined,
    two_player_room, LiveTransport, ServerHandle,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn start_session() -> (PartySession, mpsc::Receiver<SessionUpdate>, ServerHandle) {
    let (transport, server) = LiveTransport::pair();
    let (session, updates) =
        PartySession::start(transport, ClientConfig::default(), SessionConfig::default());
    (session, updates, server)
}

/// Seat the local player as `me` in the two-player room.
async fn seat(server: &ServerHandle, updates: &mut mpsc::Receiver<SessionUpdate>, me: &str) {
    server.push(&room_joined(me));
    server.push(&ServerMessage::RoomUpdate(two_player_room()));
    next_room(updates).await;
    next_room(updates).await;
}

async fn next_room(rx: &mut mpsc::Receiver<SessionUpdate>) {
    loop {
        if rx.recv().await.expect("session ended") == SessionUpdate::Room {
            return;
        }
    }
}

async fn next_turn(rx: &mut mpsc::Receiver<SessionUpdate>) -> SequencerUpdate {
    loop {
        if let SessionUpdate::Turn(update) = rx.recv().await.expect("session ended") {
            return update;
        }
    }
}

async fn next_status(rx: &mut mpsc::Receiver<SessionUpdate>) -> StatusBanner {
    loop {
        if let SessionUpdate::Status(status) = rx.recv().await.expect("session ended") {
            return status;
        }
    }
}

/// Assert the turn is quiet for a full minute of paused time.
async fn assert_no_turn_update(rx: &mut mpsc::Receiver<SessionUpdate>) {
    let quiet = tokio::time::timeout(Duration::from_secs(60), next_turn(rx)).await;
    assert!(quiet.is_err(), "unexpected turn update: {quiet:?}");
}

fn assert_elapsed(t0: Instant, secs: u64) {
    let elapsed = t0.elapsed();
    assert!(
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
        "expected ~{secs}s, got {elapsed:?}"
    );
}

// ════════════════════════════════════════════════════════════════════
// The full turn
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn full_turn_with_confirmation() {
    let (mut session, mut updates, mut server) = start_session();
    seat(&server, &mut updates, "p1").await;

    server.push(&player_selected("p1", "Ada"));
    let t0 = Instant::now();
    let update = next_turn(&mut updates).await;
    assert!(matches!(update, SequencerUpdate::SpinStarted { turn: 1, ref player } if player.id.as_str() == "p1"));

    server.push_raw(pick_prompt_json());

    let update = next_turn(&mut updates).await;
    assert!(matches!(update, SequencerUpdate::WinnerPopupShown { turn: 1, .. }));
    assert_elapsed(t0, 7);
    let update = next_turn(&mut updates).await;
    assert!(matches!(update, SequencerUpdate::PromptChooserShown { turn: 1, .. }));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.turn.phase, TurnPhase::PromptPending);
    assert!(snapshot.turn.chooser_visible);
    assert!(snapshot.turn.is_local_turn);
    assert!(snapshot.turn.popup.is_some());

    session.choose_prompt(PromptKind::Truth).await.unwrap();
    let update = next_turn(&mut updates).await;
    assert_eq!(
        update,
        SequencerUpdate::PromptEchoed {
            turn: 1,
            kind: PromptKind::Truth
        }
    );
    let sent = server.next_sent().await;
    if let ClientMessage::PromptChosen { kind, content } = sent {
        assert_eq!(kind, PromptKind::Truth);
        assert_eq!(content.as_deref(), Some("What's your worst habit?"));
    } else {
        panic!("expected PromptChosen, got {sent:?}");
    }
    let choice = session.snapshot().await.turn.choice.unwrap();
    assert_eq!(choice.content, PromptContent::Pending);

    server.push(&prompt_selected(PromptKind::Truth, "X"));
    let update = next_turn(&mut updates).await;
    let SequencerUpdate::PromptRevealed { choice, .. } = update else {
        panic!("expected PromptRevealed, got {update:?}");
    };
    assert_eq!(choice.content, PromptContent::Confirmed("X".into()));

    let update = next_turn(&mut updates).await;
    assert_eq!(update, SequencerUpdate::WinnerPopupHidden { turn: 1 });
    assert_elapsed(t0, 10);

    let snapshot = session.snapshot().await;
    assert!(snapshot.turn.popup.is_none());
    assert_eq!(
        snapshot.turn.announcement.unwrap().player.id,
        PlayerId::from("p1")
    );

    server.push_raw(end_turn_json());
    assert_eq!(
        next_turn(&mut updates).await,
        SequencerUpdate::TurnReset { turn: 1 }
    );
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.turn.phase, TurnPhase::Idle);
    assert!(snapshot.turn.announcement.is_none());
    assert!(snapshot.turn.choice.is_none());

    assert_no_turn_update(&mut updates).await;
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn placeholder_shown_once_when_confirmation_is_late() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p1").await;

    server.push_raw(pick_prompt_json());
    server.push(&player_selected("p1", "Ada"));
    let t0 = Instant::now();
    next_turn(&mut updates).await; // spin
    next_turn(&mut updates).await; // popup
    next_turn(&mut updates).await; // chooser

    session.choose_prompt(PromptKind::Trick).await.unwrap();
    next_turn(&mut updates).await; // echo
    assert_eq!(
        next_turn(&mut updates).await,
        SequencerUpdate::WinnerPopupHidden { turn: 1 }
    );

    let update = next_turn(&mut updates).await;
    let SequencerUpdate::PromptRevealed { choice, .. } = update else {
        panic!("expected PromptRevealed, got {update:?}");
    };
    assert!(matches!(choice.content, PromptContent::Placeholder(_)));
    assert_elapsed(t0, 12);

    assert_no_turn_update(&mut updates).await;

    server.push(&prompt_selected(PromptKind::Trick, "Sing the chorus of a song"));
    let update = next_turn(&mut updates).await;
    let SequencerUpdate::PromptRevealed { choice, .. } = update else {
        panic!("expected PromptRevealed, got {update:?}");
    };
    assert_eq!(
        choice.content,
        PromptContent::Confirmed("Sing the chorus of a song".into())
    );

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Ordering and redelivery
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn spectator_sees_chooser_and_popup_once() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p1").await;

    // pick-prompt before the selection, then both redelivered
    server.push_raw(pick_prompt_json());
    server.push(&player_selected("p2", "Bob"));
    assert!(matches!(
        next_turn(&mut updates).await,
        SequencerUpdate::SpinStarted { turn: 1, .. }
    ));
    server.push(&player_selected("p2", "Bob"));
    server.push_raw(pick_prompt_json());

    assert!(matches!(
        next_turn(&mut updates).await,
        SequencerUpdate::WinnerPopupShown { turn: 1, .. }
    ));
    assert!(matches!(
        next_turn(&mut updates).await,
        SequencerUpdate::PromptChooserShown { turn: 1, .. }
    ));

    server.push(&player_selected("p2", "Bob"));
    server.push_raw(pick_prompt_json());
    assert_eq!(
        next_turn(&mut updates).await,
        SequencerUpdate::WinnerPopupHidden { turn: 1 }
    );

    let err = session.choose_prompt(PromptKind::Truth).await.unwrap_err();
    assert!(matches!(err, TruthOrTrickError::NotYourTurn));
    assert!(!session.snapshot().await.turn.is_local_turn);

    server.push(&prompt_selected(PromptKind::Truth, "Biggest fear?"));
    assert!(matches!(
        next_turn(&mut updates).await,
        SequencerUpdate::PromptRevealed { turn: 1, .. }
    ));

    assert_no_turn_update(&mut updates).await;
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn new_selection_cancels_previous_turn() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p1").await;

    server.push(&player_selected("p1", "Ada"));
    next_turn(&mut updates).await;
    server.push(&player_selected("p2", "Bob"));
    let t1 = Instant::now();
    assert!(matches!(
        next_turn(&mut updates).await,
        SequencerUpdate::SpinStarted { turn: 2, ref player } if player.id.as_str() == "p2"
    ));

    let update = next_turn(&mut updates).await;
    let SequencerUpdate::WinnerPopupShown { turn, player } = update else {
        panic!("expected WinnerPopupShown, got {update:?}");
    };
    assert_eq!(turn, 2);
    assert_eq!(player.id, PlayerId::from("p2"));
    assert_elapsed(t1, 7);

    assert_eq!(
        next_turn(&mut updates).await,
        SequencerUpdate::WinnerPopupHidden { turn: 2 }
    );
    assert_no_turn_update(&mut updates).await;
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn choosing_while_spinning_is_rejected() {
    let (mut session, mut updates, mut server) = start_session();
    seat(&server, &mut updates, "p1").await;

    server.push(&player_selected("p1", "Ada"));
    next_turn(&mut updates).await;

    let err = session.choose_prompt(PromptKind::Truth).await.unwrap_err();
    assert!(matches!(
        err,
        TruthOrTrickError::InvalidPhase {
            expected: TurnPhase::PromptPending,
            actual: TurnPhase::Spinning
        }
    ));

    // nothing went out for the refused choice
    session.finish_turn().unwrap();
    assert!(matches!(server.next_sent().await, ClientMessage::FinishTurn));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn game_end_resets_mid_spin() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p1").await;

    server.push(&player_selected("p1", "Ada"));
    next_turn(&mut updates).await;
    server.push(&ServerMessage::GameEnded {
        reason: Some("host ended the game".into()),
    });
    assert_eq!(
        next_turn(&mut updates).await,
        SequencerUpdate::TurnReset { turn: 1 }
    );
    assert_no_turn_update(&mut updates).await;

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Room and status
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn host_can_start_game() {
    let (mut session, mut updates, mut server) = start_session();

    session
        .join_room(JoinRoomParams::new("Ada").with_room_code("FISH"))
        .unwrap();
    assert!(matches!(
        server.next_sent().await,
        ClientMessage::JoinRoom { .. }
    ));

    seat(&server, &mut updates, "p1").await;
    let snapshot = session.snapshot().await;
    assert!(snapshot.room.is_host());
    assert!(snapshot.room.can_start_game());
    assert_eq!(*snapshot.room.status(), StatusBanner::Connected);

    session.start_game().unwrap();
    assert_eq!(
        server.next_sent_json().await,
        serde_json::json!({"type": "StartGame"})
    );

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_sets_status_and_keeps_session() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p2").await;

    server.push_raw(r#"{"type":"PlayerSelected","data":{"nope":1}}"#);
    let status = next_status(&mut updates).await;
    assert!(matches!(status, StatusBanner::UnexpectedPayload { .. }));

    server.push(&player_selected("p1", "Ada"));
    assert!(matches!(
        next_turn(&mut updates).await,
        SequencerUpdate::SpinStarted { .. }
    ));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_disconnect_surfaces_status() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p1").await;

    drop(server);
    let status = next_status(&mut updates).await;
    assert_eq!(status, StatusBanner::Disconnected { reason: None });
    assert!(matches!(
        session.snapshot().await.room.status(),
        StatusBanner::Disconnected { .. }
    ));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_turn_and_closes_session() {
    let (mut session, mut updates, server) = start_session();
    seat(&server, &mut updates, "p1").await;

    server.push(&player_selected("p1", "Ada"));
    next_turn(&mut updates).await;

    session.shutdown().await;

    while let Some(update) = updates.recv().await {
        assert!(
            !matches!(update, SessionUpdate::Turn(SequencerUpdate::WinnerPopupShown { .. })),
            "timer fired after shutdown"
        );
    }
    assert!(matches!(
        session.choose_prompt(PromptKind::Truth).await,
        Err(TruthOrTrickError::SessionClosed)
    ));
    assert!(matches!(
        session.finish_turn(),
        Err(TruthOrTrickError::SessionClosed)
    ));
}
