#![no_main]

use libfuzzer_sys::fuzz_target;
use truth_or_trick_client::protocol::ServerMessage;

fuzz_target!(|data: &[u8]| {
    // Decoding and validation must reject garbage without panicking.
    if let Ok(msg) = serde_json::from_slice::<ServerMessage>(data) {
        let _ = msg.validate();
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(msg) = serde_json::from_str::<ServerMessage>(s) {
            let _ = msg.validate();
        }
    }
});
