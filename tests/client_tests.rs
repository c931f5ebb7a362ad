#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style tests for `TruthOrTrickClient`.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! frames and checks the events delivered, the state tracked and the JSON
//! the client puts on the wire.

mod common;

use std::sync::atomic::Ordering;

use truth_or_trick_client::protocol::{PlayerId, PromptKind};
use truth_or_trick_client::{
    ClientConfig, ClientMessage, JoinRoomParams, ProfileUpdate, TruthOrTrickClient,
    TruthOrTrickError, TruthOrTrickEvent,
};

use common::{
    end_turn_json, error_json, pick_prompt_json, player_selected_json, room_joined_json,
    room_update_json, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helper: start a mock client with scripted responses
// ════════════════════════════════════════════════════════════════════

#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, TruthOrTrickError>>>,
) -> (
    TruthOrTrickClient,
    tokio::sync::mpsc::Receiver<TruthOrTrickEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let (client, events) = TruthOrTrickClient::start(transport, ClientConfig::default());
    (client, events, sent, closed)
}

async fn expect_connected(rx: &mut tokio::sync::mpsc::Receiver<TruthOrTrickEvent>) {
    let ev = rx.recv().await.expect("expected Connected event");
    assert!(
        matches!(ev, TruthOrTrickEvent::Connected),
        "first event should be Connected, got {ev:?}"
    );
}

/// Wait until `n` messages were sent and decode them.
async fn sent_messages(
    sent: &std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    n: usize,
) -> Vec<serde_json::Value> {
    for _ in 0..100 {
        if sent.lock().unwrap().len() >= n {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    sent.lock()
        .unwrap()
        .iter()
        .map(|m| serde_json::from_str(m).unwrap())
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Joining
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_room_sends_params_and_tracks_seat() {
    let (mut client, mut events, sent, _closed) =
        start_client(vec![Some(Ok(room_joined_json("p2")))]);
    expect_connected(&mut events).await;

    client
        .join_room(
            JoinRoomParams::new("Bob")
                .with_room_code("FISH")
                .with_avatar("cat"),
        )
        .unwrap();

    let ev = events.recv().await.expect("event");
    if let TruthOrTrickEvent::RoomJoined {
        room_id,
        session_id,
        reconnection_token,
    } = ev
    {
        assert_eq!(room_id, "room-1");
        assert_eq!(session_id, PlayerId::from("p2"));
        assert_eq!(reconnection_token.as_deref(), Some("tok-1"));
    } else {
        panic!("expected RoomJoined, got {ev:?}");
    }

    assert_eq!(client.session_id().await, Some(PlayerId::from("p2")));
    assert_eq!(client.room_id().await.as_deref(), Some("room-1"));
    assert_eq!(client.reconnection_token().await.as_deref(), Some("tok-1"));

    let messages = sent_messages(&sent, 1).await;
    assert_eq!(messages[0]["type"], "JoinRoom");
    assert_eq!(messages[0]["data"]["display_name"], "Bob");
    assert_eq!(messages[0]["data"]["room_code"], "FISH");
    assert_eq!(messages[0]["data"]["avatar_id"], "cat");

    client.shutdown().await;
}

#[tokio::test]
async fn join_without_code_sends_null_room_code() {
    let (mut client, mut events, sent, _closed) = start_client(vec![]);
    expect_connected(&mut events).await;

    client.join_room(JoinRoomParams::new("Ada")).unwrap();
    let messages = sent_messages(&sent, 1).await;
    assert!(messages[0]["data"]["room_code"].is_null());
    assert!(messages[0]["data"].get("avatar_id").is_none());

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Turn events
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn turn_events_arrive_in_order() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_update_json())),
        Some(Ok(player_selected_json("p1", "Ada"))),
        Some(Ok(pick_prompt_json())),
        Some(Ok(end_turn_json())),
    ]);
    expect_connected(&mut events).await;

    let ev = events.recv().await.unwrap();
    let TruthOrTrickEvent::RoomUpdated(room) = ev else {
        panic!("expected RoomUpdated, got {ev:?}");
    };
    assert_eq!(room.players.len(), 2);

    let ev = events.recv().await.unwrap();
    let TruthOrTrickEvent::PlayerSelected(announcement) = ev else {
        panic!("expected PlayerSelected, got {ev:?}");
    };
    assert_eq!(announcement.player.display_name, "Ada");

    assert!(matches!(
        events.recv().await.unwrap(),
        TruthOrTrickEvent::PickPrompt
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        TruthOrTrickEvent::TurnEnded
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn server_error_event_received() {
    let (mut client, mut events, _sent, _closed) =
        start_client(vec![Some(Ok(error_json("room is full")))]);
    expect_connected(&mut events).await;

    let ev = events.recv().await.unwrap();
    if let TruthOrTrickEvent::ServerError { message } = ev {
        assert_eq!(message, "room is full");
    } else {
        panic!("expected ServerError, got {ev:?}");
    }
    assert!(client.is_connected());

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Malformed payloads
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn malformed_payloads_are_reported_and_skipped() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok("not json at all".into())),
        Some(Ok(r#"{"type":"TeleportPlayer","data":{}}"#.into())),
        Some(Ok(
            r#"{"type":"PromptSelected","data":{"type":"truth","content":"   "}}"#.into(),
        )),
        Some(Ok(pick_prompt_json())),
    ]);
    expect_connected(&mut events).await;

    for _ in 0..3 {
        let ev = events.recv().await.unwrap();
        assert!(
            matches!(ev, TruthOrTrickEvent::UnexpectedPayload { .. }),
            "expected UnexpectedPayload, got {ev:?}"
        );
    }
    assert!(matches!(
        events.recv().await.unwrap(),
        TruthOrTrickEvent::PickPrompt
    ));
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn selection_with_impossible_counts_is_rejected() {
    let frame = r#"{"type":"PlayerSelected","data":{
        "player":{"id":"p1","display_name":"Ada"},
        "remaining_count":4,"total_players":2}}"#;
    let (mut client, mut events, _sent, _closed) = start_client(vec![Some(Ok(frame.into()))]);
    expect_connected(&mut events).await;

    let ev = events.recv().await.unwrap();
    let TruthOrTrickEvent::UnexpectedPayload { reason } = ev else {
        panic!("expected UnexpectedPayload, got {ev:?}");
    };
    assert!(reason.contains("exceeds"));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Outbound messages
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn turn_actions_produce_correct_json() {
    let (mut client, mut events, sent, _closed) = start_client(vec![]);
    expect_connected(&mut events).await;

    client.start_game().unwrap();
    client
        .choose_prompt(PromptKind::Trick, Some("Sing the chorus of a song".into()))
        .unwrap();
    client.finish_turn().unwrap();
    client.play_again().unwrap();

    let messages = sent_messages(&sent, 4).await;
    assert_eq!(messages[0], serde_json::json!({"type": "StartGame"}));
    assert_eq!(
        messages[1],
        serde_json::json!({
            "type": "PromptChosen",
            "data": {"type": "trick", "content": "Sing the chorus of a song"}
        })
    );
    assert_eq!(messages[2], serde_json::json!({"type": "FinishTurn"}));
    assert_eq!(messages[3], serde_json::json!({"type": "PlayAgain"}));

    client.shutdown().await;
}

#[tokio::test]
async fn update_profile_sends_trimmed_name() {
    let (mut client, mut events, sent, _closed) = start_client(vec![]);
    expect_connected(&mut events).await;

    let profile = ProfileUpdate::new("  Captain Ada  ", Some("owl".into())).unwrap();
    client.update_profile(profile).unwrap();

    let messages = sent_messages(&sent, 1).await;
    let msg: ClientMessage = serde_json::from_value(messages[0].clone()).unwrap();
    if let ClientMessage::UpdateProfile {
        display_name,
        avatar_id,
    } = msg
    {
        assert_eq!(display_name, "Captain Ada");
        assert_eq!(avatar_id.as_deref(), Some("owl"));
    } else {
        panic!("expected UpdateProfile, got {msg:?}");
    }

    client.shutdown().await;
}

#[tokio::test]
async fn reconnect_sends_stored_token() {
    let (mut client, mut events, sent, _closed) = start_client(vec![]);
    expect_connected(&mut events).await;

    client.reconnect("room-1".into(), "tok-1".into()).unwrap();
    let messages = sent_messages(&sent, 1).await;
    assert_eq!(
        messages[0],
        serde_json::json!({
            "type": "Reconnect",
            "data": {"room_id": "room-1", "reconnection_token": "tok-1"}
        })
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Disconnect handling
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn disconnect_on_transport_close() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![None]);
    expect_connected(&mut events).await;

    let ev = events.recv().await.unwrap();
    assert!(matches!(ev, TruthOrTrickEvent::Disconnected { reason: None }));
    assert!(events.recv().await.is_none());
    assert!(!client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn disconnect_on_transport_error() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![Some(Err(
        TruthOrTrickError::TransportReceive("connection reset".into()),
    ))]);
    expect_connected(&mut events).await;

    let ev = events.recv().await.unwrap();
    if let TruthOrTrickEvent::Disconnected { reason: Some(reason) } = ev {
        assert!(reason.contains("connection reset"));
    } else {
        panic!("expected Disconnected with reason, got {ev:?}");
    }

    client.shutdown().await;
}

#[tokio::test]
async fn operations_fail_after_disconnect() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![None]);
    expect_connected(&mut events).await;
    let _ = events.recv().await;

    assert!(matches!(
        client.finish_turn(),
        Err(TruthOrTrickError::NotConnected)
    ));
    assert!(matches!(
        client.join_room(JoinRoomParams::new("Ada")),
        Err(TruthOrTrickError::NotConnected)
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_transport_and_emits_disconnected() {
    let (mut client, mut events, _sent, closed) = start_client(vec![]);
    expect_connected(&mut events).await;

    client.shutdown().await;
    assert!(closed.load(Ordering::Relaxed));
    let ev = events.recv().await.unwrap();
    assert!(matches!(ev, TruthOrTrickEvent::Disconnected { .. }));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn left_room_clears_room_but_keeps_session() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_joined_json("p1"))),
        Some(Ok(r#"{"type":"RoomLeft"}"#.into())),
    ]);
    expect_connected(&mut events).await;
    let _ = events.recv().await;
    assert!(matches!(
        events.recv().await.unwrap(),
        TruthOrTrickEvent::RoomLeft
    ));

    assert!(client.room_id().await.is_none());
    assert!(client.reconnection_token().await.is_none());
    assert_eq!(client.session_id().await, Some(PlayerId::from("p1")));

    client.shutdown().await;
}
