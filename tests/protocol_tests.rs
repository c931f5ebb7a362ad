#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Truth or Trick protocol.
//!
//! Decodes JSON fixtures shaped like real room-server output and checks the
//! exact JSON produced for each outbound message.

use serde_json::json;
use truth_or_trick_client::protocol::{
    ClientMessage, PlayerId, PromptKind, RoundState, ServerMessage,
};

// ════════════════════════════════════════════════════════════════════
// Server fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn room_update_fixture_decodes() {
    let fixture = r#"{
        "type": "RoomUpdate",
        "data": {
            "players": [
                {"id": "s-1", "display_name": "Ada", "avatar_id": "owl",
                 "is_host": true, "round_state": "COMPLETED"},
                {"id": "s-2", "display_name": "Bob", "round_state": "IN_PROGRESS"},
                {"id": "s-3", "display_name": "Cy"}
            ],
            "host_id": "s-1",
            "meta": {"room_code": "FISH", "round": 2, "theme": "ignored"}
        }
    }"#;
    let msg: ServerMessage = serde_json::from_str(fixture).unwrap();
    msg.validate().unwrap();
    let ServerMessage::RoomUpdate(room) = msg else {
        panic!("expected RoomUpdate");
    };
    assert_eq!(room.players.len(), 3);
    assert_eq!(room.players[0].round_state, RoundState::Completed);
    assert_eq!(room.players[0].avatar_id.as_deref(), Some("owl"));
    assert_eq!(room.players[1].round_state, RoundState::InProgress);
    assert!(!room.players[2].is_host);
    assert_eq!(room.players[2].round_state, RoundState::NotStarted);
    assert_eq!(room.host_id, Some(PlayerId::from("s-1")));
    assert_eq!(room.meta.room_code.as_deref(), Some("FISH"));
    assert_eq!(room.meta.round, 2);
}

#[test]
fn room_update_without_meta_uses_defaults() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"RoomUpdate","data":{"players":[]}}"#).unwrap();
    let ServerMessage::RoomUpdate(room) = msg else {
        panic!("expected RoomUpdate");
    };
    assert!(room.host_id.is_none());
    assert_eq!(room.meta.round, 0);
}

#[test]
fn player_selected_fixture_decodes() {
    let fixture = r#"{
        "type": "PlayerSelected",
        "data": {
            "player": {"id": "s-2", "display_name": "Bob", "round_state": "IN_PROGRESS"},
            "remaining_count": 1,
            "total_players": 3,
            "prompt_options": {"truth": "Biggest fear?", "trick": "Moonwalk"}
        }
    }"#;
    let msg: ServerMessage = serde_json::from_str(fixture).unwrap();
    msg.validate().unwrap();
    let ServerMessage::PlayerSelected(announcement) = msg else {
        panic!("expected PlayerSelected");
    };
    assert_eq!(announcement.player.id.as_str(), "s-2");
    assert!(!announcement.exhausted);
    let options = announcement.prompt_options.unwrap();
    assert_eq!(options.get(PromptKind::Truth), "Biggest fear?");
    assert_eq!(options.get(PromptKind::Trick), "Moonwalk");
}

#[test]
fn prompt_selected_uses_type_field_for_kind() {
    let msg: ServerMessage = serde_json::from_str(
        r#"{"type":"PromptSelected","data":{"type":"trick","content":"Moonwalk"}}"#,
    )
    .unwrap();
    assert!(matches!(
        msg,
        ServerMessage::PromptSelected { kind: PromptKind::Trick, ref content } if content == "Moonwalk"
    ));
}

#[test]
fn unit_server_messages_decode_without_data() {
    for (frame, expected) in [
        (r#"{"type":"GameStarted"}"#, "GameStarted"),
        (r#"{"type":"PickPrompt"}"#, "PickPrompt"),
        (r#"{"type":"EndTurn"}"#, "EndTurn"),
        (r#"{"type":"RoomLeft"}"#, "RoomLeft"),
    ] {
        let msg: ServerMessage = serde_json::from_str(frame).unwrap();
        assert!(format!("{msg:?}").starts_with(expected), "{frame}");
    }
}

#[test]
fn game_ended_reason_is_optional() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"GameEnded","data":{}}"#).unwrap();
    assert!(matches!(msg, ServerMessage::GameEnded { reason: None }));

    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"GameEnded","data":{"reason":"host left"}}"#).unwrap();
    assert!(matches!(msg, ServerMessage::GameEnded { reason: Some(ref r) } if r == "host left"));
}

#[test]
fn room_joined_without_token_decodes() {
    let msg: ServerMessage = serde_json::from_str(
        r#"{"type":"RoomJoined","data":{"room_id":"r-9","session_id":"s-1"}}"#,
    )
    .unwrap();
    msg.validate().unwrap();
    assert!(matches!(
        msg,
        ServerMessage::RoomJoined { reconnection_token: None, .. }
    ));
}

// ════════════════════════════════════════════════════════════════════
// Rejected server payloads
// ════════════════════════════════════════════════════════════════════

#[test]
fn unknown_type_is_rejected() {
    assert!(serde_json::from_str::<ServerMessage>(r#"{"type":"Explode","data":{}}"#).is_err());
}

#[test]
fn unknown_round_state_is_rejected() {
    let frame = r#"{"type":"RoomUpdate","data":{"players":[
        {"id":"s-1","display_name":"Ada","round_state":"SLEEPING"}]}}"#;
    assert!(serde_json::from_str::<ServerMessage>(frame).is_err());
}

#[test]
fn unknown_prompt_kind_is_rejected() {
    let frame = r#"{"type":"PromptSelected","data":{"type":"dare","content":"x"}}"#;
    assert!(serde_json::from_str::<ServerMessage>(frame).is_err());
}

#[test]
fn validation_rejects_empty_ids() {
    let msg: ServerMessage = serde_json::from_str(
        r#"{"type":"RoomJoined","data":{"room_id":"r-9","session_id":""}}"#,
    )
    .unwrap();
    assert!(msg.validate().unwrap_err().contains("session_id"));

    let msg: ServerMessage = serde_json::from_str(
        r#"{"type":"PlayerSelected","data":{"player":{"id":"","display_name":"?"},
            "remaining_count":0,"total_players":1}}"#,
    )
    .unwrap();
    assert!(msg.validate().is_err());
}

// ════════════════════════════════════════════════════════════════════
// Client messages on the wire
// ════════════════════════════════════════════════════════════════════

#[test]
fn join_room_wire_format() {
    let msg = ClientMessage::JoinRoom {
        room_code: Some("FISH".into()),
        display_name: "Ada".into(),
        avatar_id: None,
    };
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({"type": "JoinRoom", "data": {"room_code": "FISH", "display_name": "Ada"}})
    );
}

#[test]
fn prompt_chosen_without_content_omits_it() {
    let msg = ClientMessage::PromptChosen {
        kind: PromptKind::Truth,
        content: None,
    };
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({"type": "PromptChosen", "data": {"type": "truth"}})
    );
}

#[test]
fn unit_client_messages_have_no_data() {
    for (msg, tag) in [
        (ClientMessage::StartGame, "StartGame"),
        (ClientMessage::FinishTurn, "FinishTurn"),
        (ClientMessage::PlayAgain, "PlayAgain"),
        (ClientMessage::LeaveRoom, "LeaveRoom"),
    ] {
        assert_eq!(serde_json::to_value(&msg).unwrap(), json!({"type": tag}));
    }
}

#[test]
fn update_profile_wire_format() {
    let msg = ClientMessage::UpdateProfile {
        display_name: "Bob".into(),
        avatar_id: Some("fox".into()),
    };
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({"type": "UpdateProfile", "data": {"display_name": "Bob", "avatar_id": "fox"}})
    );
}
